// ============================================
// src/gemini.rs
// Gemini REST API クライアント（テキスト生成 + 画像生成）
// ============================================

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::generator::{GenerationError, GenerativeModel};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const TEMPERATURE: f64 = 0.7;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// レスポンスに含まれるインライン画像（base64）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    /// `data:<mime>;base64,<data>` 形式に変換する。中身が壊れていればエラー
    pub fn to_data_uri(&self) -> Result<String, GenerationError> {
        let bytes = STANDARD.decode(self.data.trim())?;
        if bytes.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(format!("data:{};base64,{}", self.mime_type, self.data.trim()))
    }
}

// --------------------------------------------------
// generateContent のレスポンス
// --------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineImage>,
    #[serde(default)]
    thought: bool,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }

    /// 思考パートを除いたテキストを連結して返す
    fn text(&self) -> String {
        self.first_parts()
            .iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text.as_deref())
            .collect()
    }

    /// 最初のインライン画像
    fn inline_image(&self) -> Option<InlineImage> {
        self.first_parts()
            .iter()
            .find_map(|p| p.inline_data.clone())
    }
}

/// Gemini API を叩くクライアント
pub struct GeminiClient {
    agent: ureq::Agent,
    api_key: Option<String>,
    text_model: String,
    /// None なら画像生成をしない
    image_model: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, text_model: String, image_model: Option<String>) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .into();
        Self {
            agent,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            text_model,
            image_model,
        }
    }

    fn api_key(&self) -> Result<&str, GenerationError> {
        self.api_key
            .as_deref()
            .ok_or(GenerationError::MissingApiKey)
    }

    fn generate_content(
        &self,
        model: &str,
        payload: Value,
    ) -> Result<GenerateContentResponse, GenerationError> {
        let api_key = self.api_key()?;
        let url = format!("{}/{}:generateContent", API_BASE, model);
        debug!(model, "sending generateContent request");

        let response = self
            .agent
            .post(&url)
            .header("x-goog-api-key", api_key)
            .send_json(payload)?
            .into_body()
            .read_json::<GenerateContentResponse>()?;
        Ok(response)
    }
}

impl GenerativeModel for GeminiClient {
    fn generate_json(&self, prompt: &str, schema: &Value) -> Result<String, GenerationError> {
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema,
                "temperature": TEMPERATURE
            }
        });
        let response = self.generate_content(&self.text_model, payload)?;
        Ok(response.text())
    }

    fn generate_image(&self, prompt: &str) -> Result<Option<InlineImage>, GenerationError> {
        let Some(model) = self.image_model.as_deref() else {
            return Ok(None);
        };
        let payload = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        });
        let response = self.generate_content(model, payload)?;
        Ok(response.inline_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerateContentResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn text_skips_thought_parts() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[
                {"text":"thinking...","thought":true},
                {"text":"{\"word\":"},
                {"text":"\"Car\"}"}
            ]}}]}"#,
        );
        assert_eq!(response.text(), r#"{"word":"Car"}"#);
    }

    #[test]
    fn empty_candidates_give_empty_text() {
        let response = parse(r#"{"candidates":[]}"#);
        assert_eq!(response.text(), "");
        assert_eq!(response.inline_image(), None);

        let response = parse(r#"{}"#);
        assert_eq!(response.text(), "");
    }

    #[test]
    fn finds_first_inline_image() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[
                {"text":"Here is your picture"},
                {"inlineData":{"mimeType":"image/png","data":"aGVsbG8="}}
            ]}}]}"#,
        );
        let image = response.inline_image().unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.to_data_uri().unwrap(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn broken_image_data_is_an_error() {
        let image = InlineImage {
            mime_type: "image/png".to_string(),
            data: "not base64!!".to_string(),
        };
        assert!(matches!(
            image.to_data_uri(),
            Err(GenerationError::ImageData(_))
        ));

        let empty = InlineImage {
            mime_type: "image/png".to_string(),
            data: String::new(),
        };
        assert!(matches!(
            empty.to_data_uri(),
            Err(GenerationError::EmptyResponse)
        ));
    }

    #[test]
    fn missing_api_key_fails_before_network() {
        let client = GeminiClient::new(Some("  ".to_string()), DEFAULT_TEXT_MODEL.to_string(), None);
        assert!(matches!(
            client.generate_json("prompt", &json!({})),
            Err(GenerationError::MissingApiKey)
        ));
        // 画像モデル未設定なら何もしない
        assert!(matches!(client.generate_image("prompt"), Ok(None)));
    }
}
