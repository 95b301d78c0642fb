//! Application-wide error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use wasteloop_engine::EngineError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            // Claim races are routine: surface them as "just taken", and
            // expired lots as "no longer available", distinct from each other.
            ApiError::Engine(EngineError::AlreadyClaimed(_)) => (
                StatusCode::CONFLICT,
                "this item was just taken".to_string(),
            ),
            ApiError::Engine(EngineError::Expired(_)) => (
                StatusCode::GONE,
                "no longer available".to_string(),
            ),
            ApiError::Engine(EngineError::NotFound(..)) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            ApiError::Engine(
                EngineError::InvalidTransition(_)
                | EngineError::InsufficientBalance { .. }
                | EngineError::InsufficientStock { .. },
            ) => (StatusCode::CONFLICT, self.to_string()),
            ApiError::Engine(EngineError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::Engine(EngineError::RoleMismatch { .. }) => {
                (StatusCode::FORBIDDEN, self.to_string())
            }
            ApiError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
