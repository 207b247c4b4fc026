//! # AI Text Correction
//!
//! Sends transcripts to an OpenAI-compatible chat-completions backend for
//! punctuation and grammar fixes. Correction is strictly best-effort: every
//! failure path (disabled, unconfigured, timeout, bad response) returns the
//! input text with `applied = false`, and the pipeline carries on.

use crate::config::{CorrectionConfig, PLACEHOLDER_API_KEY};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

/// Best-effort transcript corrector.
pub struct TextCorrector {
    config: CorrectionConfig,
    client: reqwest::Client,
}

impl TextCorrector {
    /// Build the corrector with a client bounded by the configured timeout.
    pub fn new(config: CorrectionConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// Whether a correction call would actually reach the network.
    ///
    /// Checked in order: correction feature enabled, backend enabled,
    /// credential present and not the placeholder value.
    pub fn preconditions_met(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        if !self.config.backend.enabled {
            tracing::warn!("Correction requested but the backend is disabled");
            return false;
        }
        let api_key = self.config.backend.api_key.trim();
        if api_key.is_empty() || api_key == PLACEHOLDER_API_KEY {
            tracing::warn!("Correction requested but no API key is configured");
            return false;
        }
        true
    }

    /// Correct `text`, returning the corrected variant and whether the
    /// backend was actually applied.
    ///
    /// Never fails: a timeout or backend error logs and returns the input.
    pub async fn correct(&self, text: &str) -> (String, bool) {
        if !self.preconditions_met() {
            return (text.to_string(), false);
        }

        match self.request_correction(text).await {
            Ok(Some(corrected)) => {
                tracing::info!("AI correction applied");
                (corrected, true)
            }
            Ok(None) => {
                tracing::warn!("Correction backend returned an empty response");
                (text.to_string(), false)
            }
            Err(e) if e.is_timeout() => {
                tracing::warn!(
                    "Correction timed out after {}s, keeping uncorrected text",
                    self.config.timeout_seconds
                );
                (text.to_string(), false)
            }
            Err(e) => {
                tracing::warn!("Correction failed, keeping uncorrected text: {}", e);
                (text.to_string(), false)
            }
        }
    }

    async fn request_correction(&self, text: &str) -> Result<Option<String>, reqwest::Error> {
        let url = format!(
            "{}/chat/completions",
            self.config.backend.base_url.trim_end_matches('/')
        );
        let prompt = self.config.prompt_template.replace("{text}", text);

        let request_body = ChatCompletionRequest {
            model: self.config.backend.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.backend.api_key)
            .json(&request_body)
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .send()
            .await?
            .error_for_status()?;

        let completion: ChatCompletionResponse = response.json().await?;
        Ok(completion
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|content| content.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn correction_config() -> CorrectionConfig {
        AppConfig::default().correction
    }

    #[test]
    fn test_disabled_feature_short_circuits() {
        let corrector = TextCorrector::new(correction_config());
        assert!(!corrector.preconditions_met());
    }

    #[test]
    fn test_disabled_backend_short_circuits() {
        let mut config = correction_config();
        config.enabled = true;
        config.backend.enabled = false;
        config.backend.api_key = "sk-real-key".to_string();
        let corrector = TextCorrector::new(config);
        assert!(!corrector.preconditions_met());
    }

    #[test]
    fn test_placeholder_key_short_circuits() {
        let mut config = correction_config();
        config.enabled = true;
        config.backend.enabled = true;
        config.backend.api_key = PLACEHOLDER_API_KEY.to_string();
        let corrector = TextCorrector::new(config);
        assert!(!corrector.preconditions_met());
    }

    #[test]
    fn test_empty_key_short_circuits() {
        let mut config = correction_config();
        config.enabled = true;
        config.backend.enabled = true;
        config.backend.api_key = "  ".to_string();
        let corrector = TextCorrector::new(config);
        assert!(!corrector.preconditions_met());
    }

    #[test]
    fn test_configured_backend_passes_preconditions() {
        let mut config = correction_config();
        config.enabled = true;
        config.backend.enabled = true;
        config.backend.api_key = "sk-real-key".to_string();
        let corrector = TextCorrector::new(config);
        assert!(corrector.preconditions_met());
    }

    #[tokio::test]
    async fn test_correct_returns_input_unchanged_when_disabled() {
        let corrector = TextCorrector::new(correction_config());
        let (text, applied) = corrector.correct("今天天气很好").await;
        assert_eq!(text, "今天天气很好");
        assert!(!applied);
    }
}
