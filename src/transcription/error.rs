//! # Transcription Error Taxonomy
//!
//! Classified failure categories for the transcription pipeline. Every
//! pipeline failure is folded into one of these variants before it reaches
//! a handler, so boundary responses can route operator guidance without
//! string-matching on messages.
//!
//! ## Categories:
//! - **FileNotFound / ModelNotLoaded**: fatal for the call, caller must fix
//! - **AlreadyLoading / LoadFailed**: model lifecycle failures
//! - **EmptyTranscript**: decodable audio that produced no text
//! - **MissingAudioCodec**: recoverable by the operator (install FFmpeg)
//! - **Generic**: everything else, reason preserved verbatim

use std::fmt;
use std::path::PathBuf;

/// A classified transcription failure.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscribeError {
    /// The requested audio file or folder does not exist.
    FileNotFound(PathBuf),

    /// No recognition model is loaded; the caller must load one first.
    ModelNotLoaded,

    /// Another model load is already in flight.
    AlreadyLoading,

    /// Model acquisition failed; the previous model (if any) is untouched.
    LoadFailed(String),

    /// Recognition succeeded but produced no text after trimming. Usually a
    /// corrupted or unsupported audio stream.
    EmptyTranscript,

    /// The audio container needs an external decoder that is not installed.
    MissingAudioCodec(String),

    /// Unclassified failure, reason preserved for the caller.
    Generic(String),
}

impl TranscribeError {
    /// Stable machine-readable tag for API responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TranscribeError::FileNotFound(_) => "file_not_found",
            TranscribeError::ModelNotLoaded => "model_not_loaded",
            TranscribeError::AlreadyLoading => "already_loading",
            TranscribeError::LoadFailed(_) => "load_failed",
            TranscribeError::EmptyTranscript => "empty_transcript",
            TranscribeError::MissingAudioCodec(_) => "missing_audio_codec",
            TranscribeError::Generic(_) => "transcription_failed",
        }
    }

    /// Classify a low-level recognizer or decoder failure by inspecting the
    /// error text. FFmpeg-shaped failures get their own category because the
    /// operator remediation (install the decoder) differs from a generic
    /// failure.
    pub fn classify(err: &anyhow::Error) -> Self {
        let text = format!("{:#}", err);
        let lowered = text.to_lowercase();
        if lowered.contains("ffmpeg") || lowered.contains("ffprobe") {
            TranscribeError::MissingAudioCodec(text)
        } else {
            TranscribeError::Generic(text)
        }
    }
}

impl fmt::Display for TranscribeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscribeError::FileNotFound(path) => {
                write!(f, "File not found: {}", path.display())
            }
            TranscribeError::ModelNotLoaded => {
                write!(f, "No model loaded; load a model before transcribing")
            }
            TranscribeError::AlreadyLoading => {
                write!(f, "A model load is already in progress")
            }
            TranscribeError::LoadFailed(reason) => {
                write!(f, "Model load failed: {}", reason)
            }
            TranscribeError::EmptyTranscript => {
                write!(
                    f,
                    "Transcription produced no text; the audio file may be corrupted or in an unsupported format"
                )
            }
            TranscribeError::MissingAudioCodec(reason) => {
                write!(
                    f,
                    "Audio decoding requires FFmpeg, which is not available ({}). \
                     Install FFmpeg and restart the server, or convert the file to WAV first",
                    reason
                )
            }
            TranscribeError::Generic(reason) => {
                write!(f, "Transcription failed: {}", reason)
            }
        }
    }
}

impl std::error::Error for TranscribeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_kind_tags_are_stable() {
        assert_eq!(TranscribeError::ModelNotLoaded.kind(), "model_not_loaded");
        assert_eq!(TranscribeError::AlreadyLoading.kind(), "already_loading");
        assert_eq!(TranscribeError::EmptyTranscript.kind(), "empty_transcript");
        assert_eq!(
            TranscribeError::FileNotFound(PathBuf::from("/tmp/a.wav")).kind(),
            "file_not_found"
        );
    }

    #[test]
    fn test_classify_detects_missing_codec() {
        let err = anyhow!("failed to spawn ffmpeg: No such file or directory");
        match TranscribeError::classify(&err) {
            TranscribeError::MissingAudioCodec(_) => {}
            other => panic!("expected MissingAudioCodec, got {:?}", other),
        }

        let err = anyhow!("tensor shape mismatch");
        match TranscribeError::classify(&err) {
            TranscribeError::Generic(_) => {}
            other => panic!("expected Generic, got {:?}", other),
        }
    }

    #[test]
    fn test_codec_error_mentions_remediation() {
        let err = TranscribeError::MissingAudioCodec("ffmpeg not found".to_string());
        let message = err.to_string();
        assert!(message.contains("FFmpeg"));
        assert!(message.contains("WAV"));
    }
}
