//! Unified error types for the ingestion service.
//!
//! Error codes:
//! - VALID_001-004: Validation errors
//! - SESSION_001: Session correlation errors
//! - BACKEND_001-002: Storage backend errors
//! - RATE_001: Rate limit errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    /// VALID_001: Malformed body or header
    InvalidFormat,
    /// VALID_002: Invalid or relative URI
    InvalidUri,
    /// VALID_003: Invalid custom event name
    InvalidEventName,
    /// VALID_004: Request rejected by traffic filters (bots, internal links)
    Filtered,
}

impl ValidationErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "VALID_001",
            Self::InvalidUri => "VALID_002",
            Self::InvalidEventName => "VALID_003",
            Self::Filtered => "VALID_004",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        400
    }
}

/// Backend error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorCode {
    /// BACKEND_001: Statement or insert failed
    Failed,
    /// BACKEND_002: Statement rejected because it would write
    ReadOnly,
}

impl BackendErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Failed => "BACKEND_001",
            Self::ReadOnly => "BACKEND_002",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Failed => 500,
            Self::ReadOnly => 400,
        }
    }
}

/// Unified error type for the ingestion service.
#[derive(Debug, Error)]
pub enum Error {
    /// Validation error with code.
    #[error("[{code}] {message}")]
    Validation {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Backend error with code.
    #[error("[{code}] {driver}: {message}")]
    Backend {
        code: &'static str,
        driver: &'static str,
        message: String,
        http_status: u16,
    },

    #[error("[SESSION_001] session not found")]
    SessionNotFound,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error with code.
    pub fn validation(code: ValidationErrorCode, msg: impl Into<String>) -> Self {
        Self::Validation {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::validation(ValidationErrorCode::InvalidFormat, msg)
    }

    pub fn invalid_uri(msg: impl Into<String>) -> Self {
        Self::validation(ValidationErrorCode::InvalidUri, msg)
    }

    pub fn filtered(msg: impl Into<String>) -> Self {
        Self::validation(ValidationErrorCode::Filtered, msg)
    }

    /// Create a backend error.
    pub fn backend(driver: &'static str, msg: impl Into<String>) -> Self {
        let code = BackendErrorCode::Failed;
        Self::Backend {
            code: code.code(),
            driver,
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Statement rejected by a read-only query path.
    pub fn read_only(driver: &'static str) -> Self {
        let code = BackendErrorCode::ReadOnly;
        Self::Backend {
            code: code.code(),
            driver,
            message: "only SELECT statements are allowed".to_string(),
            http_status: code.http_status(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation { http_status, .. } => *http_status,
            Self::Backend { http_status, .. } => *http_status,
            Self::SessionNotFound => 400,
            Self::Config(_) => 500,
            Self::Serialization(_) => 400,
            Self::Internal(_) => 500,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Validation { code, .. } => Some(code),
            Self::Backend { code, .. } => Some(code),
            Self::SessionNotFound => Some("SESSION_001"),
            _ => None,
        }
    }

    /// Whether this error was caused by a read-only violation.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Backend { code, .. } if *code == BackendErrorCode::ReadOnly.code())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Config(err.to_string())
    }
}
