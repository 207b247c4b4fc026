//! # Transcription Module
//!
//! Speech-to-text orchestration built on Whisper models via Candle-rs.
//!
//! ## Key Components:
//! - **Model Management**: single-flight loading and atomic model switching
//! - **Recognition Model**: deterministic Whisper inference
//! - **Pipeline**: per-file orchestration of decode → recognize →
//!   normalize → correct, with failure classification
//! - **Batch**: best-effort fan-out over a directory of audio files

pub mod batch;
pub mod error;
pub mod manager;
pub mod model;
pub mod pipeline;

pub use batch::{BatchCoordinator, BatchReport};
pub use error::TranscribeError;
pub use manager::{ModelManager, ModelState};
pub use model::ModelSize;
pub use pipeline::{TranscriptionPipeline, TranscriptionRequest, TranscriptionSuccess};
