//! Store-level error type.

use thiserror::Error;

/// Errors surfaced by a store backend.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness or concurrent-modification conflict.
    #[error("Store conflict: {0}")]
    Conflict(String),

    /// The backend is temporarily unreachable; the call may be retried.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A bug or contract violation inside the backend.
    #[error("Store internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Returns true if retrying the same call can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "STORE_CONFLICT",
            Self::Unavailable(_) => "STORE_UNAVAILABLE",
            Self::Internal(_) => "STORE_INTERNAL",
        }
    }
}
