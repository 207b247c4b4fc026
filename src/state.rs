//! # Application State Management
//!
//! Shared state handed to every request handler: the immutable
//! configuration, the injected transcription components, and the request
//! metrics updated by the middleware.
//!
//! The model slot is the only piece of mutable domain state and lives
//! inside `ModelManager`; everything else here is either immutable after
//! startup (config, component graph) or simple counters behind a lock.

use crate::audio::AudioDecoder;
use crate::config::AppConfig;
use crate::text::{TextCorrector, TextNormalizer};
use crate::transcription::{BatchCoordinator, ModelManager, TranscriptionPipeline};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Shared application state.
///
/// Cloning is cheap: every field is an `Arc` (or `Copy`), so each worker
/// holds references to the same component graph.
#[derive(Clone)]
pub struct AppState {
    /// Configuration, loaded once at startup and read-only afterwards.
    pub config: Arc<AppConfig>,

    /// Recognition model lifecycle owner.
    pub models: Arc<ModelManager>,

    /// Per-file transcription orchestrator.
    pub pipeline: Arc<TranscriptionPipeline>,

    /// Directory fan-out over the pipeline.
    pub batch: Arc<BatchCoordinator>,

    /// Script-conversion capability, shared for status reporting.
    pub normalizer: Arc<TextNormalizer>,

    /// Audio decoding capability, shared for status reporting.
    pub decoder: Arc<AudioDecoder>,

    /// Request metrics updated by the middleware.
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// Server start time for uptime reporting.
    pub start_time: Instant,
}

/// Request counters collected across all handlers.
#[derive(Debug, Default)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,
    /// Per-endpoint statistics, keyed by "METHOD /path".
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Statistics for one endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    /// Build the full component graph from configuration.
    ///
    /// Capabilities (OpenCC tables, FFmpeg) are resolved once here; the
    /// pipeline and batch coordinator receive their collaborators by
    /// injection rather than reaching for globals.
    pub fn new(config: AppConfig) -> Self {
        let default_size = config
            .models
            .default_model
            .parse()
            .unwrap_or(crate::transcription::ModelSize::Base);

        let models = Arc::new(ModelManager::new(default_size));
        let decoder = Arc::new(AudioDecoder::new());
        let normalizer = Arc::new(TextNormalizer::new());
        let corrector = Arc::new(TextCorrector::new(config.correction.clone()));

        let pipeline = Arc::new(TranscriptionPipeline::new(
            Arc::clone(&models),
            Arc::clone(&decoder),
            Arc::clone(&normalizer),
            corrector,
        ));
        let batch = Arc::new(BatchCoordinator::new(Arc::clone(&pipeline)));

        Self {
            config: Arc::new(config),
            models,
            pipeline,
            batch,
            normalizer,
            decoder,
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    /// Record one finished request against its endpoint.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();
        let endpoint_metric = metrics
            .endpoint_metrics
            .entry(endpoint.to_string())
            .or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Consistent copy of the metrics for the reporting endpoints.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_builds_component_graph() {
        let state = AppState::new(AppConfig::default());
        let model_state = state.models.status();
        assert!(!model_state.loaded);
        assert!(!model_state.loading);
    }

    #[test]
    fn test_metrics_recording() {
        let state = AppState::new(AppConfig::default());

        state.increment_request_count();
        state.increment_request_count();
        state.increment_error_count();
        state.record_endpoint_request("POST /api/v1/transcribe/file", 120, false);
        state.record_endpoint_request("POST /api/v1/transcribe/file", 80, true);

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.request_count, 2);
        assert_eq!(snapshot.error_count, 1);

        let endpoint = &snapshot.endpoint_metrics["POST /api/v1/transcribe/file"];
        assert_eq!(endpoint.request_count, 2);
        assert_eq!(endpoint.average_duration_ms(), 100.0);
        assert_eq!(endpoint.error_rate(), 0.5);
    }
}
