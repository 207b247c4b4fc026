//! # Configuration Management
//!
//! Loads application configuration from layered sources:
//! - Default values (built into the code)
//! - TOML configuration file (config.toml)
//! - Environment variables (with APP_ prefix)
//!
//! Configuration is loaded once at startup, validated, and treated as
//! read-only for the lifetime of the process.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Credential value shipped in the sample config; treated as "not configured".
pub const PLACEHOLDER_API_KEY: &str = "your_api_key_here";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub correction: CorrectionConfig,
}

/// HTTP server binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Recognition model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model size reported before any load and used by `preload`.
    pub default_model: String,
    /// Load `default_model` at startup instead of waiting for a request.
    pub preload: bool,
}

/// AI text-correction settings.
///
/// The correction step is strictly best-effort: when disabled, unconfigured,
/// or failing, transcription proceeds with the uncorrected text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// Master switch for the correction stage.
    pub enabled: bool,
    /// Prompt sent to the backend; `{text}` is replaced with the transcript.
    pub prompt_template: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Hard deadline for one correction call, in seconds.
    pub timeout_seconds: u64,
    pub backend: CorrectionBackendConfig,
}

/// OpenAI-compatible chat-completions backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionBackendConfig {
    pub enabled: bool,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
            },
            models: ModelsConfig {
                default_model: "base".to_string(),
                preload: false,
            },
            correction: CorrectionConfig {
                enabled: false,
                prompt_template: "请修正以下语音转录文本中的错误，包括标点符号、语法和用词，保持原意不变，只输出修正后的文本：\n\n{text}"
                    .to_string(),
                max_tokens: 2000,
                temperature: 0.1,
                timeout_seconds: 60,
                backend: CorrectionBackendConfig {
                    enabled: false,
                    api_key: PLACEHOLDER_API_KEY.to_string(),
                    base_url: "https://api.deepseek.com/v1".to_string(),
                    model: "deepseek-chat".to_string(),
                },
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config.toml, and APP_* environment
    /// variables, in that priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER_PORT=8080`: override server port
    /// - `APP_MODELS_DEFAULT_MODEL=small`: override default model
    /// - `HOST`/`PORT`: deployment-platform overrides
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }
        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        self.models
            .default_model
            .parse::<crate::transcription::ModelSize>()?;

        if !self.correction.prompt_template.contains("{text}") {
            return Err(anyhow::anyhow!(
                "Correction prompt template must contain a {{text}} placeholder"
            ));
        }

        if self.correction.max_tokens == 0 {
            return Err(anyhow::anyhow!("Correction max_tokens must be greater than 0"));
        }

        if self.correction.timeout_seconds == 0 {
            return Err(anyhow::anyhow!(
                "Correction timeout_seconds must be greater than 0"
            ));
        }

        if !(0.0..=2.0).contains(&self.correction.temperature) {
            return Err(anyhow::anyhow!(
                "Correction temperature must be between 0.0 and 2.0"
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.models.default_model, "base");
        assert!(!config.correction.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_prompt_has_substitution_point() {
        let config = AppConfig::default();
        assert!(config.correction.prompt_template.contains("{text}"));
    }

    #[test]
    fn test_validation_rejects_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_model() {
        let mut config = AppConfig::default();
        config.models.default_model = "gigantic".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_prompt_without_placeholder() {
        let mut config = AppConfig::default();
        config.correction.prompt_template = "fix this text".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_out_of_range_temperature() {
        let mut config = AppConfig::default();
        config.correction.temperature = 3.5;
        assert!(config.validate().is_err());
    }
}
