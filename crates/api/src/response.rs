//! Standardized API error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// API error type carrying a stable error code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse::new(msg, code),
            retry_after: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, "VALID_001", msg)
    }

    pub fn session_not_found() -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, "SESSION_001", "session not found")
    }

    pub fn rate_limited(msg: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            response: ErrorResponse::new(msg, "RATE_001"),
            retry_after,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_001", msg)
    }

    pub fn code(&self) -> &str {
        &self.response.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.response)).into_response();

        if let Some(retry_after) = self.retry_after {
            if let Ok(value) = retry_after.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }

        response
    }
}

impl From<ingest_core::Error> for ApiError {
    fn from(err: ingest_core::Error) -> Self {
        match &err {
            ingest_core::Error::Validation { code, message, http_status } => {
                let status = StatusCode::from_u16(*http_status).unwrap_or(StatusCode::BAD_REQUEST);
                ApiError::with_code(status, *code, message)
            }
            ingest_core::Error::SessionNotFound => ApiError::session_not_found(),
            ingest_core::Error::Serialization(e) => ApiError::bad_request(e.to_string()),
            ingest_core::Error::Backend { code, http_status, .. } => {
                let status = StatusCode::from_u16(*http_status)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    error!(error = %err, "Backend error");
                }
                ApiError::with_code(status, *code, err.to_string())
            }
            ingest_core::Error::Config(_) | ingest_core::Error::Internal(_) => {
                error!(error = %err, "Internal error");
                ApiError::internal(err.to_string())
            }
        }
    }
}
