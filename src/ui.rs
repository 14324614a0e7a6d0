// ============================================
// src/ui.rs
// 画面描画（状態を受け取って描くだけ）
// ============================================

use ratatui::{
    prelude::*,
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use crate::card::{CardOption, LearningCard};
use crate::session::{Phase, Session};
use crate::storage::KeyValueStore;

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

// --------------------------------------------------
// 画面だけが持つ状態
// --------------------------------------------------

/// セッションとは別に、表示のためだけに持つ状態
#[derive(Debug, Default)]
pub struct ScreenState {
    /// 定義（ヒント）を表示するか
    pub show_definition: bool,
    /// カーソル位置（選択肢のインデックス）
    pub cursor: usize,
    /// リセット確認ダイアログを表示中か
    pub confirm_reset: bool,
    /// スピナー用のフレームカウンタ
    pub tick: usize,
}

impl ScreenState {
    /// 新しいカードが来たら表示状態を戻す
    pub fn reset_for_card(&mut self) {
        self.show_definition = false;
        self.cursor = 0;
    }

    pub fn move_cursor(&mut self, delta: isize, option_count: usize) {
        if option_count == 0 {
            return;
        }
        let count = option_count as isize;
        self.cursor = (self.cursor as isize + delta).rem_euclid(count) as usize;
    }
}

/// 選択肢1つの見た目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionLook {
    /// 未選択（選べる）
    Selectable,
    /// カーソルが乗っている（まだ確定していない）
    Pending,
    /// 回答後：正解
    RevealedCorrect,
    /// 回答後：選んだ不正解
    RevealedWrongSelected,
    /// 回答後：選ばなかった不正解
    RevealedWrongUnselected,
}

pub fn option_look(
    option: &CardOption,
    selected_id: Option<&str>,
    submitted: bool,
    under_cursor: bool,
) -> OptionLook {
    let is_selected = selected_id == Some(option.id.as_str());
    if submitted {
        if option.is_correct {
            OptionLook::RevealedCorrect
        } else if is_selected {
            OptionLook::RevealedWrongSelected
        } else {
            OptionLook::RevealedWrongUnselected
        }
    } else if under_cursor || is_selected {
        OptionLook::Pending
    } else {
        OptionLook::Selectable
    }
}

impl OptionLook {
    fn marker(self) -> &'static str {
        match self {
            OptionLook::Selectable => "( )",
            OptionLook::Pending => "(•)",
            OptionLook::RevealedCorrect => "(✓)",
            OptionLook::RevealedWrongSelected => "(✗)",
            OptionLook::RevealedWrongUnselected => "   ",
        }
    }

    fn style(self) -> Style {
        match self {
            OptionLook::Selectable => Style::default().fg(Color::White),
            OptionLook::Pending => Style::default().fg(Color::Indexed(105)).bold(),
            OptionLook::RevealedCorrect => Style::default().fg(Color::Green).bold(),
            OptionLook::RevealedWrongSelected => Style::default().fg(Color::Red),
            OptionLook::RevealedWrongUnselected => Style::default().fg(Color::DarkGray),
        }
    }
}

/// "ice cream" -> "Ice Cream"
pub fn capitalize(word: &str) -> String {
    word.split(' ')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 画像の状態を1行で表す（端末では画像そのものは描けない）
pub fn image_caption(card: &LearningCard) -> String {
    match card.image_url.as_deref() {
        Some(url) if url.starts_with("data:") => {
            let payload = url.split_once(',').map(|(_, d)| d.len()).unwrap_or(0);
            let kb = (payload * 3 / 4).div_ceil(1024);
            format!("[illustration generated, {} KB]", kb)
        }
        Some(url) => format!("[illustration: {}]", url),
        None => "[No image]".to_string(),
    }
}

// --------------------------------------------------
// 描画
// --------------------------------------------------

pub fn ui<S: KeyValueStore>(f: &mut Frame, session: &Session<S>, screen: &ScreenState) {
    let size = f.area();
    let block = Block::default().borders(Borders::ALL).title("Immerse");
    let inner_area = block.inner(size);
    f.render_widget(block, size);

    let footer_height = if session.is_submitted() { 3 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),             // [0] ストリークとスコア
            Constraint::Length(2),             // [1] 見出し
            Constraint::Min(1),                // [2] カード
            Constraint::Length(footer_height), // [3] 結果と「次へ」
            Constraint::Length(1),             // [4] キー操作の説明
        ])
        .split(inner_area);

    render_status(f, session, chunks[0]);

    f.render_widget(
        Paragraph::new("MATCH THE SITUATION")
            .style(Style::default().fg(Color::Gray).bold())
            .centered(),
        chunks[1],
    );

    match (session.phase(), session.card()) {
        (Phase::Loading, _) => render_loading(f, screen, chunks[2]),
        (Phase::Finished, _) => render_finished(f, session, chunks[2]),
        (_, Some(card)) => render_card(f, session, screen, card, chunks[2]),
        (_, None) => render_empty(f, chunks[2]),
    }

    if session.is_submitted() {
        render_footer(f, session.phase(), session.card(), chunks[3]);
    }
    render_help(f, session, chunks[4]);

    if screen.confirm_reset {
        render_confirm_reset(f, size);
    }
}

fn render_status<S: KeyValueStore>(f: &mut Frame, session: &Session<S>, area: Rect) {
    let mut spans = vec![
        Span::styled(
            format!(" {} Streak ", session.streak()),
            Style::default().fg(Color::Black).bg(Color::Yellow),
        ),
        Span::raw("  "),
        Span::styled(
            format!("Score: {}", session.score()),
            Style::default().fg(Color::Gray),
        ),
    ];
    if let Some(limit) = session.round_limit() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("Round {}/{}", session.rounds_answered().min(limit), limit),
            Style::default().fg(Color::DarkGray),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)).right_aligned(), area);
}

fn render_loading(f: &mut Frame, screen: &ScreenState, area: Rect) {
    let frame = SPINNER[screen.tick % SPINNER.len()];
    let text = vec![
        Line::from(""),
        Line::from(frame).style(Style::default().fg(Color::Indexed(105)).bold()),
        Line::from(""),
        Line::from("Creating visual context & scenarios...")
            .style(Style::default().fg(Color::Indexed(105))),
    ];
    f.render_widget(Paragraph::new(text).centered(), area);
}

fn render_empty(f: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from("Something went wrong loading the card."),
        Line::from(""),
        Line::from("[t] Try Again").style(Style::default().fg(Color::Indexed(105)).underlined()),
    ];
    f.render_widget(Paragraph::new(text).centered(), area);
}

fn render_finished<S: KeyValueStore>(f: &mut Frame, session: &Session<S>, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from("Session complete!").style(Style::default().fg(Color::Green).bold()),
        Line::from(""),
        Line::from(format!("Rounds played: {}", session.rounds_answered())),
        Line::from(format!("Score: {}", session.score())),
        Line::from(format!("Streak: {}", session.streak())),
    ];
    f.render_widget(Paragraph::new(text).centered(), area);
}

fn render_card<S: KeyValueStore>(
    f: &mut Frame,
    session: &Session<S>,
    screen: &ScreenState,
    card: &LearningCard,
    area: Rect,
) {
    let header_height = if screen.show_definition { 10 } else { 8 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(header_height), Constraint::Min(1)])
        .split(area);

    render_word_header(f, screen, card, chunks[0]);
    render_options(f, session, screen, card, chunks[1]);
}

fn render_word_header(f: &mut Frame, screen: &ScreenState, card: &LearningCard, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Indexed(105)));

    let mut lines = vec![
        Line::from("TARGET WORD").style(Style::default().fg(Color::Indexed(105)).bold()),
        Line::from(image_caption(card)).style(Style::default().fg(Color::DarkGray)),
        Line::from(capitalize(&card.word))
            .style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
    ];
    if let Some(phonetic) = &card.phonetic {
        lines.push(Line::from(phonetic.as_str()).style(Style::default().fg(Color::Gray)));
    }
    lines.push(Line::from("[l] Listen   [d] Definition").style(Style::default().fg(Color::DarkGray)));
    if screen.show_definition {
        lines.push(Line::from(""));
        lines.push(
            Line::from(format!("\"{}\"", card.definition))
                .style(Style::default().fg(Color::Gray).italic()),
        );
    }

    f.render_widget(
        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: true })
            .centered(),
        area,
    );
}

fn render_options<S: KeyValueStore>(
    f: &mut Frame,
    session: &Session<S>,
    screen: &ScreenState,
    card: &LearningCard,
    area: Rect,
) {
    let submitted = session.is_submitted();
    let mut lines = Vec::new();

    for (i, option) in card.options.iter().enumerate() {
        let look = option_look(
            option,
            session.selected_option_id(),
            submitted,
            !submitted && i == screen.cursor,
        );
        lines.push(Line::from(vec![
            Span::styled(format!("{} {}. ", look.marker(), i + 1), look.style()),
            Span::styled(option.text.as_str(), look.style()),
        ]));

        // 正解と自分が選んだものだけ解説を出す
        if matches!(
            look,
            OptionLook::RevealedCorrect | OptionLook::RevealedWrongSelected
        ) {
            let (label, color) = if option.is_correct {
                ("Match!", Color::Green)
            } else {
                ("Not quite.", Color::Red)
            };
            lines.push(Line::from(vec![
                Span::raw("       "),
                Span::styled(format!("{} ", label), Style::default().fg(color).bold()),
                Span::styled(option.explanation.as_str(), Style::default().fg(color)),
            ]));
        }
        lines.push(Line::from(""));
    }

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

fn render_footer(f: &mut Frame, phase: Phase, card: Option<&LearningCard>, area: Rect) {
    let (headline, color) = if phase == Phase::Success {
        ("Excellent!", Color::Green)
    } else {
        ("Check the answer above.", Color::Gray)
    };
    let block = Block::default().borders(Borders::TOP);
    let text = vec![
        Line::from(vec![
            Span::styled(headline, Style::default().fg(color).bold()),
            Span::raw("   "),
            Span::styled(
                " [n] Next Word → ",
                Style::default().fg(Color::Black).bg(color).bold(),
            ),
        ]),
        Line::from(subline(phase, card)).style(Style::default().fg(Color::DarkGray)),
    ];
    f.render_widget(Paragraph::new(text).block(block), area);
}

/// 不正解のときは正解の番号も添える
fn subline(phase: Phase, card: Option<&LearningCard>) -> String {
    let answer = card
        .filter(|_| phase == Phase::Error)
        .and_then(|card| {
            let correct = card.correct_option()?;
            card.options.iter().position(|o| o.id == correct.id)
        });
    match answer {
        Some(index) => format!("Continue learning · The answer was option {}.", index + 1),
        None => "Continue learning".to_string(),
    }
}

fn render_help<S: KeyValueStore>(f: &mut Frame, session: &Session<S>, area: Rect) {
    let help = match session.phase() {
        Phase::Playing => "[1-3/↑↓+Enter] answer  [d] definition  [l] listen  [r] reset  [q] quit",
        Phase::Success | Phase::Error => "[n/Enter] next  [d] definition  [l] listen  [r] reset  [q] quit",
        Phase::Loading | Phase::Finished => "[r] reset  [q] quit",
    };
    f.render_widget(
        Paragraph::new(help)
            .style(Style::default().fg(Color::DarkGray))
            .centered(),
        area,
    );
}

fn render_confirm_reset(f: &mut Frame, area: Rect) {
    let popup = centered_rect(40, 5, area);
    f.render_widget(Clear, popup);
    f.render_widget(
        Paragraph::new(vec![
            Line::from("Reset score and streak?"),
            Line::from(""),
            Line::from("[y] Yes   [n] No").style(Style::default().fg(Color::Gray)),
        ])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title("Reset"),
        )
        .centered(),
        popup,
    );
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use ratatui::backend::TestBackend;

    use super::*;
    use crate::card::tests::umbrella;
    use crate::score::ScoreStore;
    use crate::storage::MemoryStore;

    fn draw(session: &Session<MemoryStore>, screen: &ScreenState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(90, 40)).unwrap();
        terminal.draw(|f| ui(f, session, screen)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn playing_session() -> Session<MemoryStore> {
        let mut session = Session::new(ScoreStore::load(MemoryStore::default()), None);
        session.begin_fetch();
        session.finish_fetch(umbrella());
        session
    }

    #[test]
    fn option_looks_cover_every_state() {
        let card = umbrella();
        let (right, wrong_a, wrong_b) = (&card.options[0], &card.options[1], &card.options[2]);

        assert_eq!(option_look(wrong_a, None, false, false), OptionLook::Selectable);
        assert_eq!(option_look(wrong_a, None, false, true), OptionLook::Pending);
        assert_eq!(option_look(right, Some("b"), true, false), OptionLook::RevealedCorrect);
        assert_eq!(
            option_look(wrong_a, Some("b"), true, false),
            OptionLook::RevealedWrongSelected
        );
        assert_eq!(
            option_look(wrong_b, Some("b"), true, false),
            OptionLook::RevealedWrongUnselected
        );
    }

    #[test]
    fn capitalizes_each_word() {
        assert_eq!(capitalize("umbrella"), "Umbrella");
        assert_eq!(capitalize("ice cream"), "Ice Cream");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn image_caption_variants() {
        let mut card = umbrella();
        assert_eq!(image_caption(&card), "[No image]");
        card.image_url = Some("data:image/png;base64,aGVsbG8=".to_string());
        assert_eq!(image_caption(&card), "[illustration generated, 1 KB]");
        card.image_url = Some("https://example.com/a.png".to_string());
        assert_eq!(image_caption(&card), "[illustration: https://example.com/a.png]");
    }

    #[test]
    fn cursor_wraps_around() {
        let mut screen = ScreenState::default();
        screen.move_cursor(-1, 3);
        assert_eq!(screen.cursor, 2);
        screen.move_cursor(1, 3);
        assert_eq!(screen.cursor, 0);
    }

    #[test]
    fn loading_screen_shows_message() {
        let session = Session::new(ScoreStore::load(MemoryStore::default()), None);
        let screen = draw(&session, &ScreenState::default());
        assert!(screen.contains("Creating visual context & scenarios..."));
    }

    #[test]
    fn definition_is_hidden_until_toggled() {
        let session = playing_session();
        let mut screen = ScreenState::default();
        let hidden = draw(&session, &screen);
        assert!(hidden.contains("Umbrella"));
        assert!(!hidden.contains("stay dry"));
        assert!(!hidden.contains("Next Word"));

        screen.show_definition = true;
        let shown = draw(&session, &screen);
        assert!(shown.contains("stay dry"));
    }

    #[test]
    fn success_shows_feedback_and_next() {
        let mut session = playing_session();
        session.select_option("a");
        let screen = draw(&session, &ScreenState::default());
        assert!(screen.contains("Excellent!"));
        assert!(screen.contains("Match!"));
        assert!(screen.contains("Next Word"));
        assert!(screen.contains("Score: 10"));
        assert!(!screen.contains("The answer was"));
    }

    #[test]
    fn error_shows_both_explanations() {
        let mut session = playing_session();
        session.select_option("b");
        let screen = draw(&session, &ScreenState::default());
        assert!(screen.contains("Check the answer above."));
        assert!(screen.contains("Not quite."));
        assert!(screen.contains("Match!"));
        assert!(screen.contains("The answer was option 1."));
    }

    #[test]
    fn confirm_dialog_is_drawn() {
        let session = playing_session();
        let screen = ScreenState {
            confirm_reset: true,
            ..ScreenState::default()
        };
        assert!(draw(&session, &screen).contains("Reset score and streak?"));
    }
}
