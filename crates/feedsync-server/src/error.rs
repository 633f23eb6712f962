//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use feedsync_engine::EngineError;
use serde_json::json;
use thiserror::Error;

/// Result type alias for handler operations
pub type AppResult<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("a sync run is already in progress")]
    AlreadyRunning,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("engine error: {0}")]
    Engine(EngineError),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::AlreadyRunning => AppError::AlreadyRunning,
            other => AppError::Engine(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::AlreadyRunning => {
                (StatusCode::CONFLICT, "ALREADY_RUNNING", self.to_string())
            },
            AppError::NotFound(ref message) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", message.clone())
            },
            AppError::Engine(ref e) => {
                tracing::error!("Engine error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "ENGINE_ERROR", e.to_string())
            },
            AppError::Internal(ref message) => {
                tracing::error!("Internal error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message.clone())
            },
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
