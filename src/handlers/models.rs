//! # Model Management Handlers
//!
//! HTTP endpoints for the model lifecycle: status snapshot and explicit
//! model loading. Loading failures are returned as structured error bodies
//! rather than HTTP faults, so clients can route on the error kind.

use crate::error::AppError;
use crate::state::AppState;
use crate::transcription::{ModelSize, TranscribeError};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

/// Request body for loading a specific model.
#[derive(Debug, Deserialize)]
pub struct LoadModelRequest {
    /// Model size to load (tiny, base, small, medium, large).
    pub model_size: String,
}

/// Report the current model slot state.
///
/// ## Endpoint: `GET /api/v1/status`
pub async fn get_status(app_state: web::Data<AppState>) -> HttpResponse {
    let state = app_state.models.status();

    HttpResponse::Ok().json(json!({
        "status": "running",
        "model_loaded": state.loaded,
        "model_size": state.size.to_string(),
        "is_loading": state.loading,
    }))
}

/// Load (or switch to) a model.
///
/// ## Endpoint: `POST /api/v1/models/load`
///
/// Returns a structured `{status, message}` body. A concurrent load in
/// flight yields `status: "error"` with kind `already_loading` instead of
/// queueing behind the running load.
pub async fn load_model(
    app_state: web::Data<AppState>,
    request: web::Json<LoadModelRequest>,
) -> Result<HttpResponse, AppError> {
    let model_size: ModelSize = request
        .model_size
        .parse()
        .map_err(|e| AppError::ValidationError(format!("Invalid model size: {}", e)))?;

    let start_time = std::time::Instant::now();
    match app_state.models.load(model_size).await {
        Ok(_) => Ok(HttpResponse::Ok().json(json!({
            "status": "success",
            "message": format!("Model {} loaded", model_size),
            "model_size": model_size.to_string(),
            "load_time_seconds": start_time.elapsed().as_secs_f64(),
        }))),
        Err(e @ (TranscribeError::AlreadyLoading | TranscribeError::LoadFailed(_))) => {
            Ok(HttpResponse::Ok().json(json!({
                "status": "error",
                "error": e.kind(),
                "message": e.to_string(),
                "model_size": model_size.to_string(),
            })))
        }
        Err(e) => Err(AppError::Internal(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_model_request_parsing() {
        let json = r#"{"model_size": "medium"}"#;
        let request: LoadModelRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.model_size, "medium");
    }

    #[test]
    fn test_model_size_validation() {
        assert!("tiny".parse::<ModelSize>().is_ok());
        assert!("invalid".parse::<ModelSize>().is_err());
    }
}
