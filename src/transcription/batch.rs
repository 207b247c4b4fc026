//! # Batch Transcription
//!
//! Applies the transcription pipeline across every audio file under a
//! folder. Processing is best-effort per item: a failing file is logged and
//! omitted from the successes, but never aborts the rest of the batch.

use crate::transcription::error::TranscribeError;
use crate::transcription::pipeline::{TranscriptionPipeline, TranscriptionRequest};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Audio container extensions accepted for batch discovery.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "flac", "aac", "ogg", "wma"];

/// Per-file summary for a successfully transcribed item.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchItem {
    pub file: String,
    pub filename: String,
    pub language: String,
    /// Final text (corrected when correction was applied).
    pub text: String,
    pub normalized_text: String,
    pub raw_text: String,
    pub correction_applied: bool,
}

/// Aggregate outcome of one batch run.
///
/// `results` follows directory discovery order, which is stable within one
/// run but not guaranteed deterministic across filesystems.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchReport {
    pub total_files: usize,
    pub successful: usize,
    pub results: Vec<BatchItem>,
}

/// Folds per-file pipeline outcomes into a single report.
pub struct BatchCoordinator {
    pipeline: Arc<TranscriptionPipeline>,
}

impl BatchCoordinator {
    pub fn new(pipeline: Arc<TranscriptionPipeline>) -> Self {
        Self { pipeline }
    }

    /// Transcribe every audio file under `folder`, recursively.
    ///
    /// Fails as a whole only when the folder does not exist or contains no
    /// files matching the audio extension allow-list.
    pub async fn run(
        &self,
        folder: &Path,
        language: Option<String>,
        correction_enabled: bool,
    ) -> Result<BatchReport, TranscribeError> {
        if !folder.is_dir() {
            return Err(TranscribeError::FileNotFound(folder.to_path_buf()));
        }

        let audio_files = discover_audio_files(folder);
        if audio_files.is_empty() {
            return Err(TranscribeError::Generic(format!(
                "No audio files found under {}",
                folder.display()
            )));
        }

        tracing::info!(
            "Batch transcription of {} files under {}",
            audio_files.len(),
            folder.display()
        );

        let total_files = audio_files.len();
        let mut results = Vec::new();

        for file in audio_files {
            let request =
                TranscriptionRequest::new(file.clone(), language.clone(), correction_enabled);
            match self.pipeline.transcribe(&request).await {
                Ok(success) => {
                    results.push(BatchItem {
                        file: file.display().to_string(),
                        filename: file
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                        language: success.detected_language,
                        text: success.corrected_text,
                        normalized_text: success.normalized_text,
                        raw_text: success.raw_text,
                        correction_applied: success.correction_applied,
                    });
                }
                Err(e) => {
                    // Best-effort per item: record and move on.
                    tracing::warn!("Skipping {}: {}", file.display(), e);
                }
            }
        }

        tracing::info!(
            "Batch finished: {}/{} files transcribed",
            results.len(),
            total_files
        );

        Ok(BatchReport {
            total_files,
            successful: results.len(),
            results,
        })
    }
}

/// Recursively collect allow-listed audio files in traversal order.
fn discover_audio_files(folder: &Path) -> Vec<PathBuf> {
    WalkDir::new(folder)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioDecoder;
    use crate::config::AppConfig;
    use crate::text::{TextCorrector, TextNormalizer};
    use crate::transcription::manager::ModelManager;
    use crate::transcription::model::ModelSize;
    use std::fs;

    fn coordinator() -> BatchCoordinator {
        let config = AppConfig::default();
        let pipeline = TranscriptionPipeline::new(
            Arc::new(ModelManager::new(ModelSize::Base)),
            Arc::new(AudioDecoder::default()),
            Arc::new(TextNormalizer::new()),
            Arc::new(TextCorrector::new(config.correction)),
        );
        BatchCoordinator::new(Arc::new(pipeline))
    }

    #[test]
    fn test_discovery_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.wav"), b"x").unwrap();
        fs::write(dir.path().join("b.MP3"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/c.flac"), b"x").unwrap();

        let files = discover_audio_files(dir.path());
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| {
            let ext = f.extension().unwrap().to_string_lossy().to_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str())
        }));
    }

    #[tokio::test]
    async fn test_missing_folder_fails_as_a_whole() {
        let coordinator = coordinator();
        let err = coordinator
            .run(Path::new("/nonexistent/folder"), None, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "file_not_found");
    }

    #[tokio::test]
    async fn test_empty_folder_fails_as_a_whole() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.md"), b"x").unwrap();

        let coordinator = coordinator();
        let err = coordinator.run(dir.path(), None, false).await.unwrap_err();
        assert_eq!(err.kind(), "transcription_failed");
    }

    #[tokio::test]
    async fn test_item_failures_do_not_abort_the_batch() {
        // No model is loaded, so every file fails individually; the batch
        // itself still completes with zero successes.
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.wav"), b"x").unwrap();
        fs::write(dir.path().join("b.wav"), b"x").unwrap();
        fs::write(dir.path().join("c.wav"), b"x").unwrap();

        let coordinator = coordinator();
        let report = coordinator.run(dir.path(), None, false).await.unwrap();
        assert_eq!(report.total_files, 3);
        assert_eq!(report.successful, 0);
        assert!(report.results.is_empty());
    }
}
