//! # Transcription Pipeline
//!
//! End-to-end orchestration of one transcription call:
//!
//! 1. Validate the source file exists
//! 2. Verify a model is loaded (never loads implicitly)
//! 3. Decode the audio and run deterministic recognition
//! 4. Normalize script (traditional → simplified) for Chinese audio
//! 5. Apply best-effort AI correction when requested
//! 6. Assemble the result carrying all three text stages side by side
//!
//! All three text variants are preserved so callers can show what each
//! stage changed. Failures are classified into `TranscribeError` before
//! they leave this module.

use crate::audio::AudioDecoder;
use crate::text::normalizer::is_chinese;
use crate::text::{TextCorrector, TextNormalizer};
use crate::transcription::error::TranscribeError;
use crate::transcription::manager::ModelManager;
use crate::transcription::model::DecodingOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Files above this size get a slow-transcription warning in the log.
const LARGE_FILE_BYTES: u64 = 100 * 1024 * 1024;

/// One transcription request. Immutable, constructed per call.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    /// Path to the audio file.
    pub source: PathBuf,
    /// Language hint; `None` means automatic detection.
    pub language: Option<String>,
    /// Whether to attempt AI correction on the normalized text.
    pub correction_enabled: bool,
}

impl TranscriptionRequest {
    /// Build a request, folding "auto" and empty hints into automatic
    /// detection.
    pub fn new(source: PathBuf, language: Option<String>, correction_enabled: bool) -> Self {
        let language = language.filter(|l| !l.is_empty() && l != "auto");
        Self {
            source,
            language,
            correction_enabled,
        }
    }
}

/// A successful transcription with every intermediate stage preserved.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TranscriptionSuccess {
    /// Unmodified recognizer output, kept for audit and comparison.
    pub raw_text: String,
    /// Raw text after script normalization.
    pub normalized_text: String,
    /// Normalized text after AI correction. Equals `normalized_text`
    /// whenever `correction_applied` is false.
    pub corrected_text: String,
    pub correction_applied: bool,
    pub detected_language: String,
    pub segment_count: usize,
    pub audio_duration_seconds: f64,
    pub processing_time_seconds: f64,
    pub file_size_bytes: u64,
}

/// Orchestrates decoder, model manager, normalizer, and corrector.
///
/// All collaborators are injected; the pipeline holds no mutable state of
/// its own and is freely shared across request handlers.
pub struct TranscriptionPipeline {
    models: Arc<ModelManager>,
    decoder: Arc<AudioDecoder>,
    normalizer: Arc<TextNormalizer>,
    corrector: Arc<TextCorrector>,
}

impl TranscriptionPipeline {
    pub fn new(
        models: Arc<ModelManager>,
        decoder: Arc<AudioDecoder>,
        normalizer: Arc<TextNormalizer>,
        corrector: Arc<TextCorrector>,
    ) -> Self {
        Self {
            models,
            decoder,
            normalizer,
            corrector,
        }
    }

    /// Transcribe one audio file.
    ///
    /// Steps run strictly in order; the first classified failure aborts the
    /// call. Correction failures never abort: they degrade to the
    /// uncorrected text inside the corrector.
    pub async fn transcribe(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<TranscriptionSuccess, TranscribeError> {
        let start_time = Instant::now();

        if !request.source.exists() {
            return Err(TranscribeError::FileNotFound(request.source.clone()));
        }

        let file_size_bytes = std::fs::metadata(&request.source)
            .map(|m| m.len())
            .unwrap_or(0);
        tracing::info!(
            "Transcribing {} ({:.2} MB)",
            request.source.display(),
            file_size_bytes as f64 / 1024.0 / 1024.0
        );
        if file_size_bytes > LARGE_FILE_BYTES {
            tracing::warn!(
                "Large file ({:.2} MB), transcription may take a while",
                file_size_bytes as f64 / 1024.0 / 1024.0
            );
        }

        // Fail before any decoding work when no model is active.
        self.models.ensure_loaded()?;

        let decoded = self.decoder.decode(&request.source)?;
        let options = DecodingOptions {
            language: request.language.clone(),
        };

        let recognition_start = Instant::now();
        let output = self.models.recognize(&decoded.samples, &options).await?;
        tracing::info!(
            "Recognition finished in {:.2}s ({} segments)",
            recognition_start.elapsed().as_secs_f64(),
            output.segments.len()
        );

        let raw_text = output.text.trim().to_string();
        if raw_text.is_empty() {
            return Err(TranscribeError::EmptyTranscript);
        }

        // Chinese may be requested explicitly or detected by the recognizer.
        let script_bearing = request
            .language
            .as_deref()
            .map(is_chinese)
            .unwrap_or(false)
            || is_chinese(&output.language);

        let normalized_text = if script_bearing {
            self.normalizer.normalize(&raw_text, "zh")
        } else {
            raw_text.clone()
        };

        let (corrected_text, correction_applied) =
            if request.correction_enabled && script_bearing {
                self.corrector.correct(&normalized_text).await
            } else {
                (normalized_text.clone(), false)
            };

        let processing_time_seconds = start_time.elapsed().as_secs_f64();
        tracing::info!(
            "Transcription completed in {:.2}s ({:.2}s of audio)",
            processing_time_seconds,
            decoded.duration_seconds
        );

        Ok(TranscriptionSuccess {
            raw_text,
            normalized_text,
            corrected_text,
            correction_applied,
            detected_language: output.language,
            segment_count: output.segments.len(),
            audio_duration_seconds: decoded.duration_seconds,
            processing_time_seconds,
            file_size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::transcription::model::ModelSize;
    use std::io::Write;

    fn pipeline_without_model() -> TranscriptionPipeline {
        let config = AppConfig::default();
        TranscriptionPipeline::new(
            Arc::new(ModelManager::new(ModelSize::Base)),
            Arc::new(AudioDecoder::default()),
            Arc::new(TextNormalizer::new()),
            Arc::new(TextCorrector::new(config.correction)),
        )
    }

    #[test]
    fn test_request_folds_auto_into_none() {
        let request =
            TranscriptionRequest::new(PathBuf::from("a.wav"), Some("auto".to_string()), false);
        assert_eq!(request.language, None);

        let request = TranscriptionRequest::new(PathBuf::from("a.wav"), None, false);
        assert_eq!(request.language, None);

        let request =
            TranscriptionRequest::new(PathBuf::from("a.wav"), Some("zh".to_string()), false);
        assert_eq!(request.language, Some("zh".to_string()));
    }

    #[tokio::test]
    async fn test_missing_file_fails_fast() {
        let pipeline = pipeline_without_model();
        let request = TranscriptionRequest::new(
            PathBuf::from("/nonexistent/audio/clip.wav"),
            Some("zh".to_string()),
            false,
        );

        let err = pipeline.transcribe(&request).await.unwrap_err();
        assert_eq!(err.kind(), "file_not_found");
    }

    #[tokio::test]
    async fn test_no_model_is_fatal_for_the_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"RIFF").unwrap();

        let pipeline = pipeline_without_model();
        let request = TranscriptionRequest::new(path, None, false);

        let err = pipeline.transcribe(&request).await.unwrap_err();
        assert_eq!(err, TranscribeError::ModelNotLoaded);
    }
}
