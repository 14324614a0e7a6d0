// ============================================
// src/score.rs
// スコアとストリーク（連続正解数）の管理
// ============================================

use tracing::warn;

use crate::storage::KeyValueStore;

pub const SCORE_KEY: &str = "immerse_score";
pub const STREAK_KEY: &str = "immerse_streak";
/// 正解1回あたりの加点
pub const POINTS_PER_CORRECT: u32 = 10;

/// 2つのカウンタを保存先と一緒に持つ
pub struct ScoreStore<S> {
    store: S,
    score: u32,
    streak: u32,
}

impl<S: KeyValueStore> ScoreStore<S> {
    /// 起動時に読み込む（無い・壊れている場合は 0）
    pub fn load(store: S) -> Self {
        let score = read_counter(&store, SCORE_KEY);
        let streak = read_counter(&store, STREAK_KEY);
        Self {
            store,
            score,
            streak,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// 正解：スコア +10、ストリーク +1
    pub fn record_correct(&mut self) {
        self.set_score(self.score.saturating_add(POINTS_PER_CORRECT));
        self.set_streak(self.streak.saturating_add(1));
    }

    /// 不正解：ストリークだけリセット
    pub fn record_incorrect(&mut self) {
        self.set_streak(0);
    }

    /// 両方 0 に戻す
    pub fn reset(&mut self) {
        self.set_score(0);
        self.set_streak(0);
    }

    fn set_score(&mut self, value: u32) {
        if self.score != value {
            self.score = value;
            write_counter(&mut self.store, SCORE_KEY, value);
        }
    }

    fn set_streak(&mut self, value: u32) {
        if self.streak != value {
            self.streak = value;
            write_counter(&mut self.store, STREAK_KEY, value);
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }
}

fn read_counter<S: KeyValueStore>(store: &S, key: &str) -> u32 {
    let Some(raw) = store.get(key) else {
        return 0;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(err) => {
            warn!(key, value = %raw, error = %err, "stored counter is not a number, using 0");
            0
        }
    }
}

// 書き込み失敗はメモリ上の値には影響させない
fn write_counter<S: KeyValueStore>(store: &mut S, key: &str, value: u32) {
    if let Err(err) = store.set(key, &value.to_string()) {
        warn!(key, value, error = %err, "failed to persist counter");
    }
}
