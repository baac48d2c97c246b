//! API errors and their JSON rendering.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hubsearch_embed::http::ErrorBody;
use thiserror::Error;

/// Errors returned by the HTTP handlers.
///
/// Every variant renders as `{"detail": "..."}` with the matching status.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The embedding backend has not finished initializing.
    #[error("Model not loaded")]
    ModelNotLoaded,

    /// The request is well-formed JSON but not acceptable.
    #[error("{0}")]
    BadRequest(String),

    /// The body could not be decoded.
    #[error("{0}")]
    Unprocessable(String),

    /// Embedding generation failed.
    #[error("{0}")]
    Internal(String),
}

impl From<hubsearch_core::Error> for ApiError {
    fn from(err: hubsearch_core::Error) -> Self {
        if err.is_client_error() {
            Self::BadRequest(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            detail: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}

/// Result type for handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
