//! services/api/src/web/error.rs
//!
//! The error type returned by every HTTP handler, rendered as `{"error": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use docgen_core::ports::PortError;
use docgen_core::quota::QuotaViolation;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Internal server error")]
    Internal,
}

impl HttpError {
    fn status(&self) -> StatusCode {
        match self {
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::Unauthorized => StatusCode::UNAUTHORIZED,
            HttpError::Forbidden(_) => StatusCode::FORBIDDEN,
            HttpError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<PortError> for HttpError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(message) => HttpError::NotFound(message),
            PortError::Unauthorized => HttpError::Unauthorized,
            PortError::Unexpected(message) => {
                error!("Request failed: {}", message);
                HttpError::Internal
            }
        }
    }
}

impl From<QuotaViolation> for HttpError {
    fn from(violation: QuotaViolation) -> Self {
        HttpError::Forbidden(violation.to_string())
    }
}
