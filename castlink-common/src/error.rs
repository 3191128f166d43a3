//! Common error types for CastLink

use thiserror::Error;

/// Common result type for CastLink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across CastLink services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored JSON payload failed to encode/decode (lookup cache name lists)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Candidate or input rejected by validation
    #[error("Validation rejected: {0}")]
    Validation(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}
