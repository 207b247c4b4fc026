//! # Configuration Handler
//!
//! Read-only view of the running configuration. The correction API key is
//! masked; configuration changes require a restart (hot reload is out of
//! scope for this service).

use crate::error::AppError;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = &state.config;

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": {
            "server": {
                "host": config.server.host,
                "port": config.server.port
            },
            "models": {
                "default_model": config.models.default_model,
                "preload": config.models.preload
            },
            "correction": {
                "enabled": config.correction.enabled,
                "max_tokens": config.correction.max_tokens,
                "temperature": config.correction.temperature,
                "timeout_seconds": config.correction.timeout_seconds,
                "backend": {
                    "enabled": config.correction.backend.enabled,
                    "base_url": config.correction.backend.base_url,
                    "model": config.correction.backend.model,
                    "api_key_configured": !config.correction.backend.api_key.is_empty()
                        && config.correction.backend.api_key != crate::config::PLACEHOLDER_API_KEY
                }
            }
        }
    })))
}
