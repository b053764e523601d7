//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
///
/// These are the error kinds callers of the engine see: validation failures
/// are rejected before any write, consistency violations surface a warning
/// instead of crashing, and partial failures are reported distinctly from
/// plain missing documents.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing account, ledger, or transaction.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input (non-positive amount, same source/destination, missing field).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Conflict (duplicate ledger name, account still has transactions).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Replay diverged from stored running balances.
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    /// One side of a multi-document operation succeeded, the other did not.
    #[error("Partial failure: {0}")]
    PartialFailure(String),

    /// Document store error.
    #[error("Store error: {0}")]
    Store(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::Conflict(_) => "CONFLICT",
            Self::ConsistencyViolation(_) => "CONSISTENCY_VIOLATION",
            Self::PartialFailure(_) => "PARTIAL_FAILURE",
            Self::Store(_) => "STORE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if prior state is known to be unchanged.
    ///
    /// Validation and lookup failures are raised before any write; store and
    /// partial failures may have left documents behind.
    #[must_use]
    pub const fn rejected_before_write(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::InvalidArgument(_) | Self::Conflict(_)
        )
    }
}
