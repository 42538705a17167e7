//! Unified error handling with Sentry integration.
//!
//! Every layer has its own `thiserror` enum; they all fold into [`AppError`],
//! which route handlers return. Responses carry a JSON body
//! `{"error": "<message>", "code": "<CODE>"}` and never include internal
//! details. Server-side failures are captured to Sentry before responding.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::convert::ConversionError;
use crate::storage::StorageError;

/// Machine-readable error category sent in the `code` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    Unauthorized,
    Forbidden,
    ValidationFailed,
    Conflict,
    StorageFailure,
    ConversionFailure,
    RateLimited,
    Internal,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::Conflict => "CONFLICT",
            Self::StorageFailure => "STORAGE_FAILURE",
            Self::ConversionFailure => "CONVERSION_FAILURE",
            Self::RateLimited => "RATE_LIMITED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Malformed or unacceptable client input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("no files were uploaded")]
    NoFiles,

    #[error("too many files: {count} (maximum {max})")]
    TooManyFiles { count: usize, max: usize },

    #[error("file '{name}' is too large: {size} bytes (maximum {max})")]
    PayloadTooLarge { name: String, size: u64, max: u64 },

    #[error("request body is too large")]
    BodyTooLarge,

    #[error("file '{name}' has unsupported type '{declared}'")]
    UnsupportedType { name: String, declared: String },

    #[error("malformed request: {0}")]
    Malformed(String),
}

impl ValidationError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::PayloadTooLarge { .. } | Self::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Content store operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Client input rejected.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Document conversion failed.
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Resource not found (or expired).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing, invalid or expired credential.
    #[error("Unauthorized")]
    Unauthorized,

    /// Valid credential for a different store.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Per-client request budget exhausted.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: ErrorCode,
}

impl AppError {
    /// The `code` reported to clients.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.classify().1
    }

    /// HTTP status, error code and client-safe message.
    fn classify(&self) -> (StatusCode, ErrorCode, String) {
        match self {
            Self::Repository(err) => classify_repository(err),
            Self::Storage(StorageError::NotFound(_)) => (
                StatusCode::NOT_FOUND,
                ErrorCode::NotFound,
                "File not found".to_string(),
            ),
            Self::Storage(_) => storage_unavailable(),
            Self::Auth(err) => classify_auth(err),
            Self::Validation(err) => (err.status(), ErrorCode::ValidationFailed, err.to_string()),
            Self::Conversion(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCode::ConversionFailure,
                "Document conversion failed".to_string(),
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NotFound, msg.clone()),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorCode::Unauthorized,
                "Unauthorized".to_string(),
            ),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, ErrorCode::Forbidden, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, ErrorCode::Conflict, msg.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorCode::RateLimited,
                "Too many requests, try again later".to_string(),
            ),
            Self::Internal(_) => internal(),
        }
    }
}

fn storage_unavailable() -> (StatusCode, ErrorCode, String) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::StorageFailure,
        "Storage temporarily unavailable".to_string(),
    )
}

fn internal() -> (StatusCode, ErrorCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::Internal,
        "Internal server error".to_string(),
    )
}

fn classify_repository(err: &RepositoryError) -> (StatusCode, ErrorCode, String) {
    match err {
        RepositoryError::NotFound => (
            StatusCode::NOT_FOUND,
            ErrorCode::NotFound,
            "Not found".to_string(),
        ),
        RepositoryError::Conflict(field) => (
            StatusCode::CONFLICT,
            ErrorCode::Conflict,
            format!("{field} already exists"),
        ),
        RepositoryError::Database(_) => storage_unavailable(),
        RepositoryError::DataCorruption(_) => internal(),
    }
}

fn classify_auth(err: &AuthError) -> (StatusCode, ErrorCode, String) {
    match err {
        AuthError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized,
            "Invalid credentials".to_string(),
        ),
        AuthError::InvalidToken => (
            StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized,
            "Unauthorized".to_string(),
        ),
        AuthError::EmailTaken => (
            StatusCode::CONFLICT,
            ErrorCode::Conflict,
            "A store with this email already exists".to_string(),
        ),
        AuthError::StoreCodeExhausted => (
            StatusCode::CONFLICT,
            ErrorCode::Conflict,
            "Unable to generate unique store ID".to_string(),
        ),
        AuthError::StoreInactive => (
            StatusCode::FORBIDDEN,
            ErrorCode::Forbidden,
            "Store is inactive".to_string(),
        ),
        AuthError::WeakPassword(msg) => (
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationFailed,
            msg.clone(),
        ),
        AuthError::InvalidEmail(_) => (
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationFailed,
            "Invalid email address".to_string(),
        ),
        AuthError::MissingField(field) => (
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationFailed,
            format!("missing required field: {field}"),
        ),
        AuthError::Repository(err) => classify_repository(err),
        AuthError::PasswordHash | AuthError::TokenIssue(_) => internal(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.classify();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                code = %code,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, code = %code, "Request rejected");
        }

        (
            status,
            Json(ErrorBody {
                error: message,
                code,
            }),
        )
            .into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context to the authenticated store.
pub fn set_sentry_store(store_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(store_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}
