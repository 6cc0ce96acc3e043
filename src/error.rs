use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::middleware::auth::AuthError;
use crate::ports::StoreError;
use crate::scoring::ScoringError;
use crate::validation::ValidationError;

/// Every way a pipeline operation can fail. The `Display` text is the internal
/// detail for logs; `public_message` is what callers get to see.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),

    #[error("authorization failed: {0}")]
    Authorization(String),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("scoring failed: {0}")]
    Scoring(#[from] ScoringError),

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Persistence(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Scoring(_) | AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short, non-technical description safe to return to the caller.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Authentication(_) => "Unauthorized".to_string(),
            AppError::Authorization(_) => "Unauthorized transaction".to_string(),
            AppError::Validation(e) => format!("Invalid transaction: {}", e),
            AppError::BadRequest(_) => "Invalid request body".to_string(),
            AppError::Scoring(_) => "Fraud check unavailable".to_string(),
            AppError::Persistence(StoreError::NotFound(_)) => "Transaction not found".to_string(),
            AppError::Persistence(_) => "Failed to store transaction".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = Json(json!({
            "error": self.public_message(),
        }));

        (status, body).into_response()
    }
}
