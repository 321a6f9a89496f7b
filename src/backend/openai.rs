use std::fs;
use std::path::Path;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use super::prompts::{self, REWRITER_SYSTEM_PROMPT};
use super::{BackendError, ModelBackend};
use crate::schema::{BackendConfig, ScoreVector};

/// Backend speaking the OpenAI chat-completions protocol.
///
/// One client serves all three roles; each role picks its own model and
/// temperature from [`BackendConfig`].
#[derive(Clone)]
pub struct OpenAiCompatibleBackend {
    config: BackendConfig,
    api_key: String,
    client: Client,
}

impl OpenAiCompatibleBackend {
    /// Build a backend, reading the API key from `config.api_key_env`.
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            BackendError::Config(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(
        config: BackendConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, BackendError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(BackendError::Config("API key is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// POST a chat completion and return the first choice's content.
    fn complete(&self, payload: &Value) -> Result<String, BackendError> {
        let res = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().unwrap_or_default();
            return Err(BackendError::Api { status, body });
        }

        let parsed: ChatCompletionResponse = res.json()?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BackendError::InvalidResponse("no choices in response".to_string()))?;
        Ok(content.trim().to_string())
    }

    fn vision_payload(
        &self,
        model: &str,
        temperature: f32,
        image: &Path,
        text: String,
    ) -> Result<Value, BackendError> {
        let image_url = image_data_url(image)?;
        Ok(json!({
            "model": model,
            "temperature": temperature,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "image_url", "image_url": { "url": image_url } },
                    { "type": "text", "text": text }
                ]
            }]
        }))
    }
}

impl ModelBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    fn generate(
        &self,
        image: &Path,
        definition: &str,
        instruction: &str,
    ) -> Result<String, BackendError> {
        let payload = self.vision_payload(
            &self.config.generator_model,
            self.config.generator_temperature,
            image,
            prompts::generation_prompt(definition, instruction),
        )?;
        let content = self.complete(&payload)?;
        Ok(prompts::clean_generated(&content))
    }

    fn score(
        &self,
        image: &Path,
        text: &str,
        definition: &str,
    ) -> Result<ScoreVector, BackendError> {
        let mut payload = self.vision_payload(
            &self.config.evaluator_model,
            self.config.evaluator_temperature,
            image,
            prompts::scoring_prompt(definition, text),
        )?;
        payload["response_format"] = json!({ "type": "json_object" });
        let content = self.complete(&payload)?;
        debug!("scorer response: {content}");
        parse_scores(&content)
    }

    fn rewrite(&self, source: &str, instruction: &str) -> Result<String, BackendError> {
        let payload = json!({
            "model": self.config.optimizer_model,
            "temperature": self.config.optimizer_temperature,
            "messages": [
                { "role": "system", "content": REWRITER_SYSTEM_PROMPT },
                { "role": "user", "content": prompts::rewrite_prompt(source, instruction) }
            ]
        });
        self.complete(&payload)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Judge output. Missing keys fall back to the worst value for that metric.
#[derive(Debug, Deserialize)]
struct ScoreResponse {
    hate_score: Option<f64>,
    fluency_score: Option<f64>,
    relevance_score: Option<f64>,
    style_score: Option<f64>,
    preachiness_score: Option<f64>,
}

/// Parse a judge response into a clamped [`ScoreVector`].
///
/// Tolerates prose or code fences around the JSON object.
pub fn parse_scores(content: &str) -> Result<ScoreVector, BackendError> {
    let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) else {
        return Err(BackendError::InvalidResponse(format!(
            "no JSON object in scorer output: {content}"
        )));
    };
    if end < start {
        return Err(BackendError::InvalidResponse(format!(
            "malformed scorer output: {content}"
        )));
    }

    let parsed: ScoreResponse = serde_json::from_str(&content[start..=end])?;
    let worst = ScoreVector::WORST;
    Ok(ScoreVector {
        hate: parsed.hate_score.unwrap_or(worst.hate),
        fluency: parsed.fluency_score.unwrap_or(worst.fluency),
        relevance: parsed.relevance_score.unwrap_or(worst.relevance),
        style: parsed.style_score.unwrap_or(worst.style),
        preachiness: parsed.preachiness_score.unwrap_or(worst.preachiness),
    }
    .clamped())
}

/// Encode an image file as a `data:` URL, picking the MIME type by extension.
fn image_data_url(path: &Path) -> Result<String, BackendError> {
    let bytes = fs::read(path).map_err(|source| BackendError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let mime = match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        _ => "image/jpeg",
    };
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scores_plain() {
        let scores = parse_scores(
            r#"{"hate_score": 5, "fluency_score": 90, "relevance_score": 80, "style_score": 70, "preachiness_score": 10}"#,
        )
        .unwrap();
        assert_eq!(scores.hate, 5.0);
        assert_eq!(scores.style, 70.0);
        assert_eq!(scores.preachiness, 10.0);
    }

    #[test]
    fn test_parse_scores_fenced_missing_and_out_of_range() {
        let scores =
            parse_scores("```json\n{\"hate_score\": -3, \"fluency_score\": 250}\n```").unwrap();
        assert_eq!(scores.hate, 0.0);
        assert_eq!(scores.fluency, 100.0);
        assert_eq!(scores.relevance, ScoreVector::WORST.relevance);
        assert_eq!(scores.preachiness, ScoreVector::WORST.preachiness);
    }

    #[test]
    fn test_parse_scores_rejects_garbage() {
        assert!(matches!(
            parse_scores("I cannot rate this."),
            Err(BackendError::InvalidResponse(_))
        ));
        assert!(matches!(parse_scores("{not json}"), Err(BackendError::Serde(_))));
    }

    #[test]
    fn test_image_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.PNG");
        fs::write(&path, [1u8, 2, 3]).unwrap();

        assert_eq!(image_data_url(&path).unwrap(), "data:image/png;base64,AQID");
        assert!(matches!(
            image_data_url(&dir.path().join("missing.jpg")),
            Err(BackendError::Image { .. })
        ));
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = OpenAiCompatibleBackend::with_api_key(BackendConfig::default(), "  ");
        assert!(matches!(result, Err(BackendError::Config(_))));
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let config = BackendConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..BackendConfig::default()
        };
        let backend = OpenAiCompatibleBackend::with_api_key(config, "k").unwrap();
        assert_eq!(backend.endpoint(), "http://localhost:8080/v1/chat/completions");
    }
}
