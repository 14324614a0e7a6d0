// ============================================
// src/session.rs
// 1セッションの状態遷移（読み込み → 回答 → 結果 → 次へ）
// ============================================

use tracing::{debug, info};

use crate::card::LearningCard;
#[cfg(test)]
use crate::generator::CardSource;
use crate::score::ScoreStore;
use crate::storage::KeyValueStore;

/// 除外リストとして生成器に渡す直近の単語数
pub const HISTORY_WINDOW: usize = 10;

/// 画面のフェーズ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Playing,
    Success,
    Error,
    /// ラウンド上限に達した（上限を設定したときだけ到達する）
    Finished,
}

/// アプリ全体の状態を管理する
pub struct Session<S> {
    phase: Phase,
    current_card: Option<LearningCard>,
    selected_option_id: Option<String>,
    /// これまでに出た単語（追記のみ）
    history: Vec<String>,
    scores: ScoreStore<S>,

    /// None なら無制限
    round_limit: Option<u32>,
    rounds_answered: u32,
    fetch_in_flight: bool,
}

impl<S: KeyValueStore> Session<S> {
    pub fn new(scores: ScoreStore<S>, round_limit: Option<u32>) -> Self {
        Self {
            phase: Phase::Loading,
            current_card: None,
            selected_option_id: None,
            history: Vec::new(),
            scores,
            round_limit: round_limit.filter(|&n| n > 0),
            rounds_answered: 0,
            fetch_in_flight: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn card(&self) -> Option<&LearningCard> {
        self.current_card.as_ref()
    }

    pub fn selected_option_id(&self) -> Option<&str> {
        self.selected_option_id.as_deref()
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn score(&self) -> u32 {
        self.scores.score()
    }

    pub fn streak(&self) -> u32 {
        self.scores.streak()
    }

    pub fn rounds_answered(&self) -> u32 {
        self.rounds_answered
    }

    pub fn round_limit(&self) -> Option<u32> {
        self.round_limit
    }

    /// 回答済み（結果表示中）か
    pub fn is_submitted(&self) -> bool {
        matches!(self.phase, Phase::Success | Phase::Error)
    }

    /// 直近 `HISTORY_WINDOW` 件の単語
    pub fn exclusion_window(&self) -> Vec<String> {
        let start = self.history.len().saturating_sub(HISTORY_WINDOW);
        self.history[start..].to_vec()
    }

    // --------------------------------------------------
    // カードの読み込み
    // --------------------------------------------------

    /// 読み込みを開始する。すでに読み込み中なら None
    pub fn begin_fetch(&mut self) -> Option<Vec<String>> {
        if self.fetch_in_flight || self.phase == Phase::Finished {
            debug!(phase = ?self.phase, "ignoring fetch request");
            return None;
        }
        self.fetch_in_flight = true;
        self.phase = Phase::Loading;
        self.selected_option_id = None;
        Some(self.exclusion_window())
    }

    /// 生成されたカードを反映する
    pub fn finish_fetch(&mut self, card: LearningCard) {
        self.history.push(card.word.clone());
        self.current_card = Some(card);
        self.selected_option_id = None;
        self.fetch_in_flight = false;
        self.phase = Phase::Playing;
    }

    /// 読み込みを同期的に行う（アプリ本体はワーカー経由で begin/finish を使う）
    #[cfg(test)]
    pub fn fetch_card(&mut self, source: &impl CardSource) {
        if let Some(exclude) = self.begin_fetch() {
            let card = source.next_card(&exclude);
            self.finish_fetch(card);
        }
    }

    // --------------------------------------------------
    // ユーザー操作
    // --------------------------------------------------

    /// 選択肢を選ぶ。受け付けたら true
    pub fn select_option(&mut self, option_id: &str) -> bool {
        if self.phase != Phase::Playing {
            return false;
        }
        let Some(is_correct) = self
            .current_card
            .as_ref()
            .and_then(|card| card.option(option_id))
            .map(|option| option.is_correct)
        else {
            return false;
        };

        self.selected_option_id = Some(option_id.to_string());
        self.rounds_answered += 1;

        if is_correct {
            self.scores.record_correct();
            self.phase = Phase::Success;
        } else {
            self.scores.record_incorrect();
            self.phase = Phase::Error;
        }
        info!(
            option = option_id,
            correct = is_correct,
            score = self.scores.score(),
            streak = self.scores.streak(),
            "option selected"
        );
        true
    }

    /// 「次へ」。ラウンド上限に達していれば Finished に入り None
    pub fn request_next(&mut self) -> Option<Vec<String>> {
        if !self.is_submitted() {
            return None;
        }
        if self
            .round_limit
            .is_some_and(|limit| self.rounds_answered >= limit)
        {
            info!(rounds = self.rounds_answered, score = self.score(), "session finished");
            self.phase = Phase::Finished;
            return None;
        }
        self.begin_fetch()
    }

    /// 「次へ」を同期的に行う
    #[cfg(test)]
    pub fn next(&mut self, source: &impl CardSource) {
        if let Some(exclude) = self.request_next() {
            let card = source.next_card(&exclude);
            self.finish_fetch(card);
        }
    }

    /// スコアとストリークを 0 に戻す（確認はUI側で行う）
    pub fn reset_progress(&mut self) {
        info!(score = self.score(), streak = self.streak(), "resetting progress");
        self.scores.reset();
    }
}
