//! Maps store errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use devgate_store::StoreError;
use thiserror::Error;
use tracing::error;

/// Errors returned by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was malformed (e.g. empty device identifier).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or wrong admin credential.
    #[error("unauthorized")]
    Unauthorized,

    /// The store could not complete the operation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidInput(msg) => Self::BadRequest(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Internal(msg) = &self {
            error!("Request failed: {}", msg);
        }
        let body = serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
