//! Error types for the database layer.

use std::time::Duration;
use thiserror::Error;

/// Database operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error (connection, query, etc.)
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Connection string could not be interpreted
    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    /// URL names a backend this build does not include
    #[error("Database type {0} not compiled in. Rebuild with the '{1}' feature.")]
    NotCompiled(String, String),

    /// A store round-trip exceeded its deadline
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl DbError {
    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl(url.into())
    }
}
