//! # Transcription Handlers
//!
//! HTTP endpoints for transcription: a local file by path, an uploaded
//! file, and a whole folder. Pipeline failures are serialized as structured
//! `{status: "error"}` bodies with a machine-readable kind; only malformed
//! requests surface as HTTP errors.

use crate::error::AppError;
use crate::state::AppState;
use crate::transcription::{TranscribeError, TranscriptionRequest, TranscriptionSuccess};
use actix_web::{web, HttpResponse};
use futures_util::stream::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Uploads above this size are rejected before spooling to disk.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Request body for transcribing a file already on the server.
#[derive(Debug, Deserialize)]
pub struct TranscribeFileRequest {
    pub file_path: String,
    /// Language hint; omitted or "auto" means automatic detection.
    pub language: Option<String>,
    #[serde(default = "default_correction")]
    pub enable_correction: bool,
}

/// Request body for transcribing a folder.
#[derive(Debug, Deserialize)]
pub struct TranscribeBatchRequest {
    pub folder_path: String,
    pub language: Option<String>,
    #[serde(default = "default_correction")]
    pub enable_correction: bool,
}

fn default_correction() -> bool {
    true
}

/// Transcribe a file on the server's filesystem.
///
/// ## Endpoint: `POST /api/v1/transcribe/file`
pub async fn transcribe_file(
    app_state: web::Data<AppState>,
    request: web::Json<TranscribeFileRequest>,
) -> Result<HttpResponse, AppError> {
    if request.file_path.is_empty() {
        return Err(AppError::ValidationError("file_path is required".to_string()));
    }

    let transcription = TranscriptionRequest::new(
        PathBuf::from(&request.file_path),
        request.language.clone(),
        request.enable_correction,
    );

    let result = app_state.pipeline.transcribe(&transcription).await;
    Ok(transcription_response(result))
}

/// Transcribe an uploaded audio file.
///
/// ## Endpoint: `POST /api/v1/transcribe/upload`
///
/// Multipart form with an `audio` file field plus optional `language` and
/// `enable_correction` text fields. The upload is spooled to a temp file
/// that is removed when the request finishes.
pub async fn transcribe_upload(
    app_state: web::Data<AppState>,
    mut payload: actix_multipart::Multipart,
) -> Result<HttpResponse, AppError> {
    let mut audio_data: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut language: Option<String> = None;
    let mut enable_correction = default_correction();

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::ValidationError(format!("Multipart error: {}", e)))?;

        let content_disposition = field.content_disposition().ok_or_else(|| {
            AppError::ValidationError("Missing content disposition".to_string())
        })?;
        let field_name = content_disposition
            .get_name()
            .ok_or_else(|| AppError::ValidationError("Missing field name".to_string()))?
            .to_string();

        if field_name == "audio" {
            filename = content_disposition.get_filename().map(|s| s.to_string());
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| AppError::ValidationError(format!("Chunk error: {}", e)))?;
            bytes.extend_from_slice(&chunk);
            if field_name == "audio" && bytes.len() > MAX_UPLOAD_BYTES {
                return Err(AppError::ValidationError(format!(
                    "File too large (max: {} bytes)",
                    MAX_UPLOAD_BYTES
                )));
            }
        }

        match field_name.as_str() {
            "audio" => audio_data = Some(bytes),
            "language" => {
                language = Some(String::from_utf8_lossy(&bytes).trim().to_string());
            }
            "enable_correction" => {
                enable_correction =
                    String::from_utf8_lossy(&bytes).trim().eq_ignore_ascii_case("true");
            }
            _ => {}
        }
    }

    let audio_bytes = audio_data
        .ok_or_else(|| AppError::ValidationError("No audio file provided".to_string()))?;
    let filename = filename.unwrap_or_else(|| "upload.wav".to_string());

    // Keep the original extension so the decoder picks the right path.
    let extension = Path::new(&filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("wav")
        .to_lowercase();

    let mut temp_file = tempfile::Builder::new()
        .prefix("transcribe-upload-")
        .suffix(&format!(".{}", extension))
        .tempfile()
        .map_err(|e| AppError::Internal(format!("Failed to create temp file: {}", e)))?;
    temp_file
        .write_all(&audio_bytes)
        .map_err(|e| AppError::Internal(format!("Failed to spool upload: {}", e)))?;

    let transcription = TranscriptionRequest::new(
        temp_file.path().to_path_buf(),
        language,
        enable_correction,
    );

    let result = app_state.pipeline.transcribe(&transcription).await;
    Ok(transcription_response(result))
}

/// Transcribe every audio file under a folder.
///
/// ## Endpoint: `POST /api/v1/transcribe/batch`
pub async fn transcribe_batch(
    app_state: web::Data<AppState>,
    request: web::Json<TranscribeBatchRequest>,
) -> Result<HttpResponse, AppError> {
    if request.folder_path.is_empty() {
        return Err(AppError::ValidationError("folder_path is required".to_string()));
    }

    let result = app_state
        .batch
        .run(
            Path::new(&request.folder_path),
            request.language.clone(),
            request.enable_correction,
        )
        .await;

    match result {
        Ok(report) => Ok(HttpResponse::Ok().json(json!({
            "status": "success",
            "total_files": report.total_files,
            "successful": report.successful,
            "results": report.results,
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}

/// Serialize a pipeline outcome as a structured success/error body.
fn transcription_response(result: Result<TranscriptionSuccess, TranscribeError>) -> HttpResponse {
    match result {
        Ok(success) => HttpResponse::Ok().json(json!({
            "status": "success",
            "text": success.corrected_text,
            "normalized_text": success.normalized_text,
            "raw_text": success.raw_text,
            "correction_applied": success.correction_applied,
            "language": success.detected_language,
            "segments": success.segment_count,
            "duration_seconds": success.audio_duration_seconds,
            "processing_time_seconds": success.processing_time_seconds,
            "file_size_bytes": success.file_size_bytes,
        })),
        Err(e) => error_response(&e),
    }
}

fn error_response(error: &TranscribeError) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "error",
        "error": error.kind(),
        "message": error.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_request_defaults_correction_on() {
        let json = r#"{"file_path": "/audio/clip.wav"}"#;
        let request: TranscribeFileRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.file_path, "/audio/clip.wav");
        assert_eq!(request.language, None);
        assert!(request.enable_correction);
    }

    #[test]
    fn test_batch_request_parsing() {
        let json = r#"{"folder_path": "/audio", "language": "zh", "enable_correction": false}"#;
        let request: TranscribeBatchRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.folder_path, "/audio");
        assert_eq!(request.language, Some("zh".to_string()));
        assert!(!request.enable_correction);
    }

    #[test]
    fn test_error_body_carries_kind_and_message() {
        let response = error_response(&TranscribeError::ModelNotLoaded);
        assert_eq!(response.status(), actix_web::http::StatusCode::OK);
    }
}
