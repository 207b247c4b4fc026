//! # Model Lifecycle Management
//!
//! Owns the single recognition-model slot: loading, switching, and status
//! reporting. A model can occupy gigabytes of memory, so the slot is swapped
//! atomically and loads are serialized process-wide.
//!
//! ## Lifecycle Invariants:
//! - At most one load in flight; concurrent `load` calls fail fast with
//!   `AlreadyLoading` instead of queueing.
//! - Loading the size that is already loaded is an idempotent no-op.
//! - A failed load leaves the previously loaded model intact and usable.
//! - `ensure_loaded` never triggers an implicit load.

use crate::transcription::error::TranscribeError;
use crate::transcription::model::{DecodingOptions, ModelSize, RecognizerOutput, WhisperRecognizer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::RwLock as StdRwLock;
use tokio::sync::RwLock;

/// Snapshot of the model slot, as reported by the status endpoint.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ModelState {
    /// Size of the loaded model, or the default size when nothing is loaded.
    pub size: ModelSize,
    /// Whether a model is loaded and ready for inference.
    pub loaded: bool,
    /// Whether a load is currently in flight.
    pub loading: bool,
}

/// Acknowledgement returned by a successful `load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadAck {
    /// The requested size was already loaded; nothing was acquired.
    AlreadyLoaded,
    /// A new model was acquired and swapped in.
    Loaded,
}

/// Owner of the recognition-model slot.
///
/// The slot itself is behind an async `RwLock` so inference holds the model
/// for its duration while status reads stay cheap on the side channel.
pub struct ModelManager {
    /// The loaded model, if any. Write-held during inference and swaps.
    slot: Arc<RwLock<Option<WhisperRecognizer>>>,

    /// Size of the model currently in the slot. Kept outside the slot lock
    /// so `status()` never waits on a running inference.
    loaded_size: StdRwLock<Option<ModelSize>>,

    /// Single-flight load guard.
    loading: AtomicBool,

    /// Size reported before any model has been loaded.
    default_size: ModelSize,
}

impl ModelManager {
    /// Create a manager with an empty slot.
    pub fn new(default_size: ModelSize) -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
            loaded_size: StdRwLock::new(None),
            loading: AtomicBool::new(false),
            default_size,
        }
    }

    /// Non-blocking snapshot of the current model state.
    pub fn status(&self) -> ModelState {
        let loaded_size = *self.loaded_size.read().unwrap();
        ModelState {
            size: loaded_size.unwrap_or(self.default_size),
            loaded: loaded_size.is_some(),
            loading: self.loading.load(Ordering::SeqCst),
        }
    }

    /// Load (or switch to) the requested model size.
    ///
    /// Fails fast with `AlreadyLoading` when another load is in flight,
    /// regardless of the requested size. Succeeds immediately without
    /// re-acquiring when the requested size is already loaded.
    pub async fn load(&self, size: ModelSize) -> Result<LoadAck, TranscribeError> {
        if self.loading.load(Ordering::SeqCst) {
            return Err(TranscribeError::AlreadyLoading);
        }

        if self.current_size() == Some(size) {
            tracing::info!("Model {} already loaded, skipping acquisition", size);
            return Ok(LoadAck::AlreadyLoaded);
        }

        // Claim the single-flight guard. A losing racer fails fast here.
        if self
            .loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TranscribeError::AlreadyLoading);
        }

        let result = WhisperRecognizer::load(size).await;
        let outcome = match result {
            Ok(recognizer) => {
                let mut slot = self.slot.write().await;
                *slot = Some(recognizer);
                drop(slot);
                self.set_current_size(Some(size));
                tracing::info!("Model {} is now active", size);
                Ok(LoadAck::Loaded)
            }
            Err(e) => {
                // The previous model, if any, stays in the slot untouched.
                tracing::error!("Model {} load failed: {:#}", size, e);
                Err(TranscribeError::LoadFailed(format!("{:#}", e)))
            }
        };

        self.loading.store(false, Ordering::SeqCst);
        outcome
    }

    /// Verify a model is loaded, returning its size.
    ///
    /// Used by the pipeline before any decoding work. Never loads.
    pub fn ensure_loaded(&self) -> Result<ModelSize, TranscribeError> {
        self.current_size().ok_or(TranscribeError::ModelNotLoaded)
    }

    /// Run recognition on the loaded model.
    ///
    /// Holds the slot for the duration of inference; the slot cannot be
    /// swapped out from under a running recognition.
    pub async fn recognize(
        &self,
        samples: &[f32],
        options: &DecodingOptions,
    ) -> Result<RecognizerOutput, TranscribeError> {
        let mut slot = self.slot.write().await;
        match slot.as_mut() {
            Some(recognizer) => recognizer
                .transcribe(samples, options)
                .map_err(|e| TranscribeError::classify(&e)),
            None => Err(TranscribeError::ModelNotLoaded),
        }
    }

    fn current_size(&self) -> Option<ModelSize> {
        *self.loaded_size.read().unwrap()
    }

    fn set_current_size(&self, size: Option<ModelSize>) {
        *self.loaded_size.write().unwrap() = size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_before_any_load() {
        let manager = ModelManager::new(ModelSize::Base);
        let state = manager.status();
        assert!(!state.loaded);
        assert!(!state.loading);
        assert_eq!(state.size, ModelSize::Base);
    }

    #[test]
    fn test_ensure_loaded_fails_on_empty_slot() {
        let manager = ModelManager::new(ModelSize::Base);
        assert_eq!(
            manager.ensure_loaded(),
            Err(TranscribeError::ModelNotLoaded)
        );
    }

    #[tokio::test]
    async fn test_load_fails_fast_while_loading() {
        let manager = ModelManager::new(ModelSize::Base);
        manager.loading.store(true, Ordering::SeqCst);

        let result = manager.load(ModelSize::Tiny).await;
        assert_eq!(result, Err(TranscribeError::AlreadyLoading));

        // The rejected call must not have mutated the slot state.
        let state = manager.status();
        assert!(!state.loaded);
        assert!(state.loading);
    }

    #[tokio::test]
    async fn test_same_size_load_is_a_no_op() {
        let manager = ModelManager::new(ModelSize::Base);
        manager.set_current_size(Some(ModelSize::Tiny));

        // No acquisition happens, so this returns instantly even though the
        // slot holds no real recognizer in this test.
        let ack = manager.load(ModelSize::Tiny).await.unwrap();
        assert_eq!(ack, LoadAck::AlreadyLoaded);
        assert_eq!(manager.ensure_loaded().unwrap(), ModelSize::Tiny);
    }

    #[tokio::test]
    async fn test_recognize_without_model_reports_not_loaded() {
        let manager = ModelManager::new(ModelSize::Base);
        let result = manager
            .recognize(&[0.0f32; 16_000], &DecodingOptions::default())
            .await;
        assert_eq!(result.unwrap_err(), TranscribeError::ModelNotLoaded);
    }
}
