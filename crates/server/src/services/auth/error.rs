//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during store registration, login and token checks.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] printdrop_core::EmailError),

    /// A required registration field is empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Wrong password or unknown email.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Bearer token missing, malformed, tampered with or expired.
    #[error("invalid token")]
    InvalidToken,

    /// Email already registered.
    #[error("store already exists for this email")]
    EmailTaken,

    /// Store is deactivated.
    #[error("store is inactive")]
    StoreInactive,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Every generated store code was already taken.
    #[error("unable to generate unique store ID")]
    StoreCodeExhausted,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Token signing error.
    #[error("token signing error: {0}")]
    TokenIssue(#[from] jsonwebtoken::errors::Error),
}
