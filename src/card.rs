// ============================================
// src/card.rs
// 学習カードのデータ構造と検証ロジック
// ============================================

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 1枚のカードが持つ選択肢の数
pub const OPTIONS_PER_CARD: usize = 3;

/// カードの選択肢（シチュエーション文）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardOption {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
    /// 回答後に表示する解説
    pub explanation: String,
}

/// 学習カード（単語 + 定義 + 選択肢 + 画像）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningCard {
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phonetic: Option<String>,
    pub definition: String,
    pub options: Vec<CardOption>,
    /// data URI またはリモートURL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// カードの検証エラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CardError {
    #[error("word is empty")]
    EmptyWord,
    #[error("definition is empty")]
    EmptyDefinition,
    #[error("expected 3 options, got {0}")]
    OptionCount(usize),
    #[error("expected exactly one correct option, got {0}")]
    CorrectCount(usize),
    #[error("option has an empty id")]
    EmptyOptionId,
    #[error("option {0} has empty text")]
    EmptyOptionText(String),
    #[error("duplicate option id {0}")]
    DuplicateOptionId(String),
    #[error("word {0:?} was requested to be excluded")]
    ExcludedWord(String),
}

impl LearningCard {
    /// 正解の選択肢
    pub fn correct_option(&self) -> Option<&CardOption> {
        self.options.iter().find(|o| o.is_correct)
    }

    /// id から選択肢を探す
    pub fn option(&self, id: &str) -> Option<&CardOption> {
        self.options.iter().find(|o| o.id == id)
    }

    /// 構造チェック（モデルの出力をそのまま信用しない）
    pub fn validate(&self) -> Result<(), CardError> {
        if self.word.trim().is_empty() {
            return Err(CardError::EmptyWord);
        }
        if self.definition.trim().is_empty() {
            return Err(CardError::EmptyDefinition);
        }
        if self.options.len() != OPTIONS_PER_CARD {
            return Err(CardError::OptionCount(self.options.len()));
        }

        let correct = self.options.iter().filter(|o| o.is_correct).count();
        if correct != 1 {
            return Err(CardError::CorrectCount(correct));
        }

        let mut seen = HashSet::new();
        for option in &self.options {
            if option.id.trim().is_empty() {
                return Err(CardError::EmptyOptionId);
            }
            if option.text.trim().is_empty() {
                return Err(CardError::EmptyOptionText(option.id.clone()));
            }
            if !seen.insert(option.id.as_str()) {
                return Err(CardError::DuplicateOptionId(option.id.clone()));
            }
        }
        Ok(())
    }

    /// 除外リストに入っている単語ではないか（大文字小文字は無視）
    pub fn check_not_excluded(&self, exclude_words: &[String]) -> Result<(), CardError> {
        let word = self.word.trim().to_lowercase();
        if exclude_words
            .iter()
            .any(|w| w.trim().to_lowercase() == word)
        {
            return Err(CardError::ExcludedWord(self.word.clone()));
        }
        Ok(())
    }

    /// 生成に失敗したときの固定カード
    pub fn fallback() -> Self {
        Self {
            word: "Apple".to_string(),
            phonetic: Some("/ˈæp.əl/".to_string()),
            definition: "A round fruit with red or green skin and a white inside.".to_string(),
            image_url: Some(
                "https://images.unsplash.com/photo-1560806887-1e4cd0b6cbd6?w=400&h=400&fit=crop"
                    .to_string(),
            ),
            options: vec![
                CardOption {
                    id: "1".to_string(),
                    text: "You wear this on your feet.".to_string(),
                    is_correct: false,
                    explanation: "This describes shoes.".to_string(),
                },
                CardOption {
                    id: "2".to_string(),
                    text: "A healthy snack that keeps the doctor away.".to_string(),
                    is_correct: true,
                    explanation: "Correct! Apples are a healthy fruit.".to_string(),
                },
                CardOption {
                    id: "3".to_string(),
                    text: "You use this to type on a computer.".to_string(),
                    is_correct: false,
                    explanation: "This describes a keyboard.".to_string(),
                },
            ],
        }
    }
}
