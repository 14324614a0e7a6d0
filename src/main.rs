// ============================================
// src/main.rs (メインファイル)
// ============================================

use std::io::{self, Result, stdout};
use std::time::Duration;

mod card;
mod config;
mod gemini;
mod generator;
mod logging;
mod score;
mod session;
mod speech;
mod storage;
mod ui;
mod worker;

use clap::Parser;
use config::{Cli, Commands};
use gemini::GeminiClient;
use generator::Generator;
use score::ScoreStore;
use session::{Phase, Session};
use speech::SpeechConfig;
use storage::KeyValueStore;
use ui::{ScreenState, ui};
use worker::CardWorker;

use crossterm::{
    ExecutableCommand,
    cursor::{Hide, Show},
    event::{self, Event, KeyCode},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use tracing::{info, warn};

// --------------------------------------------------
// アプリ本体（セッション + 画面状態 + 生成ワーカー）
// --------------------------------------------------

struct App<S> {
    session: Session<S>,
    screen: ScreenState,
    worker: CardWorker,
    speech: SpeechConfig,
    should_quit: bool,
}

impl<S: KeyValueStore> App<S> {
    fn new(session: Session<S>, worker: CardWorker) -> Self {
        let mut app = Self {
            session,
            screen: ScreenState::default(),
            worker,
            speech: SpeechConfig::default(),
            should_quit: false,
        };
        app.fetch_card(); // 起動時に最初のカードを読み込む
        app
    }

    /// カードの読み込みを開始する（読み込み中なら何もしない）
    fn fetch_card(&mut self) {
        if let Some(exclude) = self.session.begin_fetch() {
            self.worker.request(exclude);
        }
    }

    /// 「次へ」
    fn next(&mut self) {
        if let Some(exclude) = self.session.request_next() {
            self.worker.request(exclude);
        }
    }

    /// 選択肢を番号で選ぶ
    fn select_index(&mut self, index: usize) {
        let Some(id) = self
            .session
            .card()
            .and_then(|card| card.options.get(index))
            .map(|option| option.id.clone())
        else {
            return;
        };
        if self.session.select_option(&id) {
            self.screen.cursor = index;
        }
    }

    /// 毎フレーム呼ぶ：生成が終わっていれば反映する
    fn on_tick(&mut self) {
        if let Some(card) = self.worker.poll() {
            self.session.finish_fetch(card);
            self.screen.reset_for_card();
        }
        self.screen.tick = self.screen.tick.wrapping_add(1);
    }

    /// キー入力の処理
    fn handle_key(&mut self, code: KeyCode) {
        // リセット確認中は y/n だけ受け付ける
        if self.screen.confirm_reset {
            match code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.session.reset_progress();
                    self.screen.confirm_reset = false;
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.screen.confirm_reset = false;
                }
                _ => {}
            }
            return;
        }

        let option_count = self.session.card().map_or(0, |card| card.options.len());
        match code {
            KeyCode::Esc | KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('r') => self.screen.confirm_reset = true,
            KeyCode::Char('d') => {
                if self.session.card().is_some() {
                    self.screen.show_definition = !self.screen.show_definition;
                }
            }
            KeyCode::Char('l') => {
                if let Some(card) = self.session.card() {
                    speech::speak(&card.word, &self.speech);
                }
            }
            KeyCode::Up | KeyCode::Char('k') => self.screen.move_cursor(-1, option_count),
            KeyCode::Down | KeyCode::Char('j') => self.screen.move_cursor(1, option_count),
            KeyCode::Char(c) if c.is_ascii_digit() => {
                if let Some(n) = c.to_digit(10).filter(|&n| n > 0) {
                    self.select_index(n as usize - 1);
                }
            }
            KeyCode::Enter => {
                if self.session.is_submitted() {
                    self.next();
                } else {
                    self.select_index(self.screen.cursor);
                }
            }
            KeyCode::Char('n') => self.next(),
            KeyCode::Char('t') => {
                // カードが無いまま止まってしまったときの再試行
                if self.session.phase() != Phase::Loading && self.session.card().is_none() {
                    self.fetch_card();
                }
            }
            _ => {}
        }
    }
}

// --------------------------------------------------
// メイン関数 (TUIセットアップと実行ループ)
// --------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init_tracing(&cli.log_level, &cli.log_dir());

    let scores = ScoreStore::load(storage::open_or_memory(&cli.data_dir()));

    match cli.command() {
        Commands::Play => play(&cli, scores),
        Commands::Stats => {
            print_stats(&scores);
            Ok(())
        }
        Commands::Reset { yes } => reset(scores, yes),
    }
}

fn play<S: KeyValueStore>(cli: &Cli, scores: ScoreStore<S>) -> Result<()> {
    let api_key = cli.resolved_api_key();
    if api_key.is_none() {
        warn!("no API key configured, every card will be the fallback card");
    }
    let client = GeminiClient::new(api_key, cli.text_model.clone(), cli.image_model());
    let generator = Generator::new(client).shuffle_options(!cli.no_shuffle);
    let worker = CardWorker::spawn(generator)?;

    info!(score = scores.score(), streak = scores.streak(), "starting session");
    let app = App::new(Session::new(scores, cli.rounds), worker);

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, app);
    restore_terminal(&mut terminal)?;
    result
}

fn print_stats<S: KeyValueStore>(scores: &ScoreStore<S>) {
    println!(
        "{} {}",
        console::style("Score: ").bold(),
        console::style(scores.score()).cyan()
    );
    println!(
        "{} {}",
        console::style("Streak:").bold(),
        console::style(scores.streak()).yellow()
    );
}

fn reset<S: KeyValueStore>(mut scores: ScoreStore<S>, yes: bool) -> Result<()> {
    let confirmed = yes
        || dialoguer::Confirm::new()
            .with_prompt("Reset score and streak?")
            .default(false)
            .interact()
            .map_err(io::Error::other)?;

    if confirmed {
        scores.reset();
        println!("{}", console::style("Progress reset.").green());
    } else {
        println!("{}", console::style("Nothing changed.").dim());
    }
    Ok(())
}

fn setup_terminal() -> Result<Terminal<impl Backend>> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?; // 代替スクリーンを使用
    stdout().execute(Hide)?; // カーソルを非表示
    let backend = CrosstermBackend::new(stdout());
    Terminal::new(backend)
}

fn restore_terminal(_terminal: &mut Terminal<impl Backend>) -> Result<()> {
    stdout().execute(Show)?; // カーソルを再表示
    stdout().execute(LeaveAlternateScreen)?; // 代替スクリーンを終了
    disable_raw_mode()?;
    Ok(())
}

fn run_app<S: KeyValueStore>(terminal: &mut Terminal<impl Backend>, mut app: App<S>) -> Result<()> {
    loop {
        app.on_tick();
        terminal.draw(|f| ui(f, &app.session, &app.screen))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == event::KeyEventKind::Press {
                    app.handle_key(key.code);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    info!(
        score = app.session.score(),
        streak = app.session.streak(),
        words = app.session.history().len(),
        "session ended"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use super::*;
    use crate::card::LearningCard;
    use crate::card::tests::umbrella;
    use crate::generator::CardSource;
    use crate::storage::MemoryStore;

    struct UmbrellaSource;

    impl CardSource for UmbrellaSource {
        fn next_card(&self, _exclude_words: &[String]) -> LearningCard {
            umbrella()
        }
    }

    fn app() -> App<MemoryStore> {
        let session = Session::new(ScoreStore::load(MemoryStore::default()), None);
        App::new(session, CardWorker::spawn(UmbrellaSource).unwrap())
    }

    fn wait_until_playing(app: &mut App<MemoryStore>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.session.phase() != Phase::Playing {
            assert!(Instant::now() < deadline, "card never arrived");
            app.on_tick();
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn loads_first_card_on_start() {
        let mut app = app();
        assert_eq!(app.session.phase(), Phase::Loading);
        wait_until_playing(&mut app);
        assert_eq!(app.session.card().unwrap().word, "Umbrella");
    }

    #[test]
    fn number_keys_answer_and_enter_moves_on() {
        let mut app = app();
        wait_until_playing(&mut app);

        app.handle_key(KeyCode::Char('1'));
        assert_eq!(app.session.phase(), Phase::Success);
        assert_eq!(app.session.score(), 10);

        // 回答後の数字キーは無視される
        app.handle_key(KeyCode::Char('2'));
        assert_eq!(app.session.phase(), Phase::Success);

        app.handle_key(KeyCode::Enter);
        assert_eq!(app.session.phase(), Phase::Loading);
        wait_until_playing(&mut app);
        assert_eq!(app.session.history().len(), 2);
    }

    #[test]
    fn cursor_and_enter_select_option() {
        let mut app = app();
        wait_until_playing(&mut app);

        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.session.phase(), Phase::Error);
        assert_eq!(app.session.selected_option_id(), Some("b"));
    }

    #[test]
    fn reset_requires_confirmation() {
        let mut app = app();
        wait_until_playing(&mut app);
        app.handle_key(KeyCode::Char('1'));
        assert_eq!(app.session.score(), 10);

        app.handle_key(KeyCode::Char('r'));
        app.handle_key(KeyCode::Char('n'));
        assert_eq!(app.session.score(), 10);

        app.handle_key(KeyCode::Char('r'));
        // 確認中は他のキーが効かない
        app.handle_key(KeyCode::Char('q'));
        assert!(!app.should_quit);
        app.handle_key(KeyCode::Char('y'));
        assert_eq!((app.session.score(), app.session.streak()), (0, 0));
        assert!(!app.screen.confirm_reset);
    }

    #[test]
    fn definition_toggle_resets_on_new_card() {
        let mut app = app();
        wait_until_playing(&mut app);
        app.handle_key(KeyCode::Char('d'));
        assert!(app.screen.show_definition);

        app.handle_key(KeyCode::Char('3'));
        app.handle_key(KeyCode::Char('n'));
        wait_until_playing(&mut app);
        assert!(!app.screen.show_definition);
    }

    #[test]
    fn quit_key_stops_loop() {
        let mut app = app();
        app.handle_key(KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}
