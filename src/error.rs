// User-visible error taxonomy with stable kind identifiers
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::session::SessionError;

/// Every failure surfaced to a client. Each variant carries a stable kind
/// string and maps to one HTTP status; messages never include server paths.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid session identifier")]
    InvalidSession,
    #[error("requested name escapes the session workspace")]
    PathEscape,
    #[error("only PDF uploads are accepted")]
    UnsupportedMediaType,
    #[error("file too large, the limit is {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("unknown or expired session")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidSession => "invalid_session",
            ApiError::PathEscape => "path_escape",
            ApiError::UnsupportedMediaType => "unsupported_media_type",
            ApiError::PayloadTooLarge { .. } => "payload_too_large",
            ApiError::NotFound => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::ExtractionFailed(_) => "extraction_failed",
            ApiError::Internal => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidSession => StatusCode::BAD_REQUEST,
            ApiError::PathEscape => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ExtractionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "kind": self.kind(),
            "error": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidSession => ApiError::InvalidSession,
            SessionError::PathEscape => ApiError::PathEscape,
            SessionError::NotFound => ApiError::NotFound,
            SessionError::Io(e) => {
                tracing::error!("session store io error: {e}");
                ApiError::Internal
            }
        }
    }
}
