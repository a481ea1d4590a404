//! Error types for the PDF signing API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pdfsign_core::SignError;
use serde_json::json;
use sigmatte_core::MatteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing x-user-id header")]
    MissingIdentity,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error(transparent)]
    Matte(#[from] MatteError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Status code and client-facing message. Server-side failures get a
    /// generic message; the detail only goes to the log.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::MissingIdentity => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Sign(SignError::NotFound(what)) => {
                (StatusCode::NOT_FOUND, format!("Not found: {}", what))
            }
            ApiError::Sign(SignError::Unauthorized) => {
                (StatusCode::FORBIDDEN, "Not your document".to_string())
            }
            ApiError::Sign(SignError::ValidationError(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Matte(
                e @ (MatteError::DecodeError(_)
                | MatteError::InvalidStrength(_)
                | MatteError::EmptySignature),
            ) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Sign(e) => {
                tracing::error!("Signing error: {}", e);
                internal("Signing failed")
            }
            ApiError::Matte(e) => {
                tracing::error!("Matte error: {}", e);
                internal("Signature processing failed")
            }
            ApiError::Database(e) => {
                tracing::error!("Database error: {}", e);
                internal("Database error")
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                internal("Internal error")
            }
        }
    }
}

fn internal(message: &str) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
