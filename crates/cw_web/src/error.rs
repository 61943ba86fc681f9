use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cw_core::{Error, TARGET_WEB_REQUEST};
use serde_json::json;
use tracing::error;

/// JSON error body `{ "message": ... }` with its status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Client errors keep their own text. Anything else is logged and
    /// replaced by `generic`.
    pub fn from_error(err: Error, generic: &str) -> Self {
        match err {
            Error::Validation(message) => Self::new(StatusCode::BAD_REQUEST, message),
            Error::NotFound(message) => Self::new(StatusCode::NOT_FOUND, message),
            Error::Conflict(message) => Self::new(StatusCode::CONFLICT, message),
            other => {
                error!(target: TARGET_WEB_REQUEST, "{} {}", generic, other);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, generic)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

pub trait ResultExt<T> {
    fn or_api(self, generic: &str) -> Result<T, ApiError>;
}

impl<T> ResultExt<T> for cw_core::Result<T> {
    fn or_api(self, generic: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::from_error(e, generic))
    }
}
