// ============================================
// src/generator.rs
// カード生成：プロンプトとスキーマの組み立て、検証、フォールバック
// ============================================

use rand::seq::SliceRandom;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::card::{CardError, LearningCard};
use crate::gemini::InlineImage;

/// 生成処理のエラー（Generator の外には出さない）
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("API key is not configured")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Request(#[from] ureq::Error),
    #[error("empty response from model")]
    EmptyResponse,
    #[error("malformed card JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid card: {0}")]
    InvalidCard(#[from] CardError),
    #[error("image data is not valid base64: {0}")]
    ImageData(#[from] base64::DecodeError),
}

/// 生成AIサービスとの境界
pub trait GenerativeModel {
    /// スキーマに沿った JSON テキストを生成する
    fn generate_json(&self, prompt: &str, schema: &Value) -> Result<String, GenerationError>;
    /// 画像を生成する。画像パートが無ければ `Ok(None)`
    fn generate_image(&self, prompt: &str) -> Result<Option<InlineImage>, GenerationError>;
}

/// セッションから見たカードの供給元。必ずカードを返す
pub trait CardSource {
    fn next_card(&self, exclude_words: &[String]) -> LearningCard;
}

/// モデルに要求するカードの形（これが唯一の定義）
pub fn card_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "word": {
                "type": "STRING",
                "description": "The target English word (noun, verb, or adjective) for the user to learn. Common daily words."
            },
            "phonetic": {
                "type": "STRING",
                "description": "Simple phonetic pronunciation string."
            },
            "definition": {
                "type": "STRING",
                "description": "A simple, clear definition in English using basic vocabulary."
            },
            "options": {
                "type": "ARRAY",
                "description": "3 distinct situations or phrases. Only ONE matches the target word concept.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "STRING" },
                        "text": {
                            "type": "STRING",
                            "description": "A scenario, phrase, or related concept description. e.g., for 'Car', 'I need to drive to the supermarket'."
                        },
                        "isCorrect": { "type": "BOOLEAN" },
                        "explanation": {
                            "type": "STRING",
                            "description": "Brief explanation in English why this is right or wrong."
                        }
                    },
                    "required": ["id", "text", "isCorrect", "explanation"],
                    "propertyOrdering": ["id", "text", "isCorrect", "explanation"]
                }
            }
        },
        "required": ["word", "definition", "options"],
        "propertyOrdering": ["word", "phonetic", "definition", "options"]
    })
}

/// カード生成の指示文
pub fn build_prompt(exclude_words: &[String]) -> String {
    let excluded = if exclude_words.is_empty() {
        "(none)".to_string()
    } else {
        exclude_words.join(", ")
    };

    format!(
        "Generate a learning card for an English student.
Objective: Learn English by association (Immersion), NOT translation.

1. Select a common, useful English word (CEFR level A2 or B1).
2. Do NOT use these words: {excluded}.
3. The 'options' should be scenarios or situational sentences that help the user associate the concept.
   - If the word is 'Umbrella', the correct option could be 'It is raining outside and I don't want to get wet.'
   - The distractors should be scenarios for completely different concepts (e.g., 'I am hungry', 'I am tired').
   - Exactly ONE option must have isCorrect set to true.
4. Keep the English simple and clear."
    )
}

/// 画像生成の指示文
pub fn image_prompt(word: &str) -> String {
    format!(
        "Create a simple, cheerful, flat vector-style illustration of the word \"{word}\". White background, minimalist design, high contrast."
    )
}

/// モデルの出力をカードとして読み込み、検証する
pub fn parse_card(text: &str, exclude_words: &[String]) -> Result<LearningCard, GenerationError> {
    if text.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    let mut card: LearningCard = serde_json::from_str(text)?;
    // 画像は自前で生成したものだけを使う
    card.image_url = None;
    card.word = card.word.trim().to_string();

    card.validate()?;
    card.check_not_excluded(exclude_words)?;
    Ok(card)
}

/// カード生成器
pub struct Generator<M> {
    model: M,
    shuffle_options: bool,
}

impl<M: GenerativeModel> Generator<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            shuffle_options: true,
        }
    }

    /// 選択肢のシャッフルを切り替える
    pub fn shuffle_options(mut self, enabled: bool) -> Self {
        self.shuffle_options = enabled;
        self
    }

    /// 次のカードを生成する。失敗しても必ず固定カードを返す
    pub fn generate_next_card(&self, exclude_words: &[String]) -> LearningCard {
        match self.try_generate(exclude_words) {
            Ok(card) => {
                info!(word = %card.word, has_image = card.image_url.is_some(), "generated card");
                card
            }
            Err(err) => {
                error!(error = %err, "card generation failed, using fallback card");
                LearningCard::fallback()
            }
        }
    }

    fn try_generate(&self, exclude_words: &[String]) -> Result<LearningCard, GenerationError> {
        // 1. テキスト (JSON)
        let text = self
            .model
            .generate_json(&build_prompt(exclude_words), &card_schema())?;
        let mut card = parse_card(&text, exclude_words)?;

        if self.shuffle_options {
            card.options.shuffle(&mut rand::rng());
        }

        // 2. 画像（単語が決まってから）
        card.image_url = self.illustrate(&card.word);
        Ok(card)
    }

    /// 画像生成。失敗しても画像なしで続行する
    fn illustrate(&self, word: &str) -> Option<String> {
        match self.model.generate_image(&image_prompt(word)) {
            Ok(Some(image)) => match image.to_data_uri() {
                Ok(uri) => Some(uri),
                Err(err) => {
                    warn!(word, error = %err, "discarding unusable image data");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(word, error = %err, "failed to generate image");
                None
            }
        }
    }
}

impl<M: GenerativeModel> CardSource for Generator<M> {
    fn next_card(&self, exclude_words: &[String]) -> LearningCard {
        self.generate_next_card(exclude_words)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::io;

    use super::*;
    use crate::card::tests::umbrella;

    /// 決まった応答を返すテスト用モデル
    pub(crate) struct ScriptedModel {
        pub text: Option<String>,
        pub image: Option<InlineImage>,
        pub image_fails: bool,
        pub prompts: RefCell<Vec<String>>,
    }

    impl ScriptedModel {
        pub(crate) fn returning(card: &LearningCard) -> Self {
            Self {
                text: Some(serde_json::to_string(card).unwrap()),
                image: None,
                image_fails: false,
                prompts: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn unreachable() -> Self {
            Self {
                text: None,
                image: None,
                image_fails: true,
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl GenerativeModel for ScriptedModel {
        fn generate_json(&self, prompt: &str, _schema: &Value) -> Result<String, GenerationError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            match &self.text {
                Some(text) => Ok(text.clone()),
                None => Err(GenerationError::Request(ureq::Error::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "service unreachable",
                )))),
            }
        }

        fn generate_image(&self, prompt: &str) -> Result<Option<InlineImage>, GenerationError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            if self.image_fails {
                return Err(GenerationError::EmptyResponse);
            }
            Ok(self.image.clone())
        }
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn unreachable_service_yields_fallback_card() {
        let generator = Generator::new(ScriptedModel::unreachable());
        let card = generator.generate_next_card(&words(&["Apple", "Car"]));
        assert_eq!(card, LearningCard::fallback());
        assert_eq!(card.word, "Apple");
    }

    #[test]
    fn valid_response_becomes_card_with_image() {
        let mut model = ScriptedModel::returning(&umbrella());
        model.image = Some(InlineImage {
            mime_type: "image/png".to_string(),
            data: "aGVsbG8=".to_string(),
        });
        let generator = Generator::new(model);

        let card = generator.generate_next_card(&[]);
        assert_eq!(card.word, "Umbrella");
        assert_eq!(card.options.iter().filter(|o| o.is_correct).count(), 1);
        assert_eq!(card.image_url.as_deref(), Some("data:image/png;base64,aGVsbG8="));
    }

    #[test]
    fn image_failure_keeps_card_without_image() {
        let mut model = ScriptedModel::returning(&umbrella());
        model.image_fails = true;
        let generator = Generator::new(model).shuffle_options(false);

        let card = generator.generate_next_card(&[]);
        let mut expected = umbrella();
        expected.image_url = None;
        assert_eq!(card, expected);
    }

    #[test]
    fn excluded_word_falls_back() {
        let generator = Generator::new(ScriptedModel::returning(&umbrella()));
        let card = generator.generate_next_card(&words(&["umbrella"]));
        assert_eq!(card, LearningCard::fallback());
    }

    #[test]
    fn invalid_responses_fall_back() {
        let mut two_correct = umbrella();
        two_correct.options[2].is_correct = true;

        for text in [
            String::new(),
            "not json".to_string(),
            r#"{"word":"Car"}"#.to_string(),
            serde_json::to_string(&two_correct).unwrap(),
        ] {
            let mut model = ScriptedModel::returning(&umbrella());
            model.text = Some(text);
            let card = Generator::new(model).generate_next_card(&[]);
            assert_eq!(card, LearningCard::fallback());
        }
    }

    #[test]
    fn image_is_requested_for_the_resolved_word() {
        let generator = Generator::new(ScriptedModel::returning(&umbrella()));
        generator.generate_next_card(&words(&["Car"]));

        let prompts = generator.model.prompts.borrow();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("Do NOT use these words: Car."));
        assert!(prompts[1].contains("\"Umbrella\""));
    }

    #[test]
    fn shuffled_options_keep_the_same_set() {
        let generator = Generator::new(ScriptedModel::returning(&umbrella()));
        let card = generator.generate_next_card(&[]);

        let mut ids: Vec<_> = card.options.iter().map(|o| o.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(card.correct_option().map(|o| o.id.as_str()), Some("a"));
    }

    #[test]
    fn model_supplied_image_url_is_ignored() {
        let mut card = umbrella();
        card.image_url = Some("https://example.com/x.png".to_string());
        let text = serde_json::to_string(&card).unwrap();
        let parsed = parse_card(&text, &[]).unwrap();
        assert_eq!(parsed.image_url, None);
    }

    #[test]
    fn schema_requires_core_fields() {
        let schema = card_schema();
        assert_eq!(schema["required"], json!(["word", "definition", "options"]));
        assert_eq!(
            schema["properties"]["options"]["items"]["required"],
            json!(["id", "text", "isCorrect", "explanation"])
        );
    }
}
