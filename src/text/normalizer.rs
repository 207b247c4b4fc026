//! # Script Normalization
//!
//! Converts traditional Chinese transcripts to simplified script using
//! OpenCC. The converter is built once at startup; when construction fails
//! the capability is simply absent and normalization becomes identity.

use ferrous_opencc::config::BuiltinConfig;
use ferrous_opencc::OpenCC;

/// Traditional→simplified converter with soft degradation.
pub struct TextNormalizer {
    converter: Option<OpenCC>,
}

impl TextNormalizer {
    /// Build the OpenCC t2s converter, degrading to identity on failure.
    pub fn new() -> Self {
        let converter = match OpenCC::from_config(BuiltinConfig::T2s) {
            Ok(converter) => Some(converter),
            Err(e) => {
                tracing::warn!("OpenCC unavailable, script conversion disabled: {}", e);
                None
            }
        };
        Self { converter }
    }

    /// Whether script conversion is actually available.
    pub fn available(&self) -> bool {
        self.converter.is_some()
    }

    /// Convert `text` to simplified script when `language` is Chinese.
    ///
    /// Pure and infallible: non-Chinese text, or a missing converter,
    /// yields the input unchanged.
    pub fn normalize(&self, text: &str, language: &str) -> String {
        if !is_chinese(language) {
            return text.to_string();
        }
        match &self.converter {
            Some(converter) => converter.convert(text),
            None => text.to_string(),
        }
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a language tag refers to Chinese in any script or region.
pub fn is_chinese(language: &str) -> bool {
    let lowered = language.to_lowercase();
    lowered == "zh" || lowered.starts_with("zh-") || lowered.starts_with("zh_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_chinese_tags() {
        assert!(is_chinese("zh"));
        assert!(is_chinese("ZH"));
        assert!(is_chinese("zh-CN"));
        assert!(is_chinese("zh_Hant"));
        assert!(!is_chinese("en"));
        assert!(!is_chinese("ja"));
        assert!(!is_chinese("zhx"));
    }

    #[test]
    fn test_normalize_passes_non_chinese_through() {
        let normalizer = TextNormalizer::new();
        assert_eq!(normalizer.normalize("hello world", "en"), "hello world");
    }

    #[test]
    fn test_normalize_converts_traditional() {
        let normalizer = TextNormalizer::new();
        if !normalizer.available() {
            // No conversion table on this host; identity is the contract.
            assert_eq!(normalizer.normalize("測試", "zh"), "測試");
            return;
        }
        assert_eq!(normalizer.normalize("漢語轉換", "zh"), "汉语转换");
    }

    #[test]
    fn test_normalize_is_stable_on_simplified_input() {
        let normalizer = TextNormalizer::new();
        let simplified = "今天天气很好";
        assert_eq!(normalizer.normalize(simplified, "zh"), simplified);
    }
}
