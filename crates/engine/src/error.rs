//! Engine-level error type and its mapping to the application error.

use tally_core::LedgerError;
use tally_shared::error::AppError;
use tally_shared::types::{AccountId, TransactionId};
use tally_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the engine services.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The referenced account does not exist.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// The referenced transaction does not exist.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// The referenced ledger does not exist.
    #[error("Ledger not found: {0}")]
    LedgerNotFound(String),

    /// Deleting an account that still has transactions.
    #[error("Account {0} still has {1} transactions")]
    AccountHasTransactions(AccountId, usize),

    /// A transfer operation was pointed at a non-transfer transaction.
    #[error("Transaction {0} is not a transfer leg")]
    NotATransfer(TransactionId),

    /// Transfer legs are immutable outside the coordinator.
    #[error("Transfer legs are managed by the transfer coordinator; delete and re-create the transfer")]
    TransferLegManaged,

    /// A transfer leg predating the paired format has no counterpart id.
    #[error("Transfer leg {0} has no stored counterpart id")]
    MissingTransferPeer(TransactionId),

    /// Stored balances disagree with the replay fold.
    #[error("Consistency violation: {0}")]
    Consistency(String),

    /// One side of a multi-document write landed without the other.
    #[error("Partial failure: {0}")]
    PartialFailure(String),

    /// Domain validation failed before any write.
    #[error(transparent)]
    Validation(#[from] LedgerError),

    /// The store backend failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::AccountNotFound(_)
            | EngineError::TransactionNotFound(_)
            | EngineError::LedgerNotFound(_) => Self::NotFound(err.to_string()),
            EngineError::AccountHasTransactions(..) => Self::Conflict(err.to_string()),
            EngineError::NotATransfer(_)
            | EngineError::TransferLegManaged
            | EngineError::Validation(_) => Self::InvalidArgument(err.to_string()),
            EngineError::MissingTransferPeer(_) | EngineError::Consistency(_) => {
                Self::ConsistencyViolation(err.to_string())
            }
            EngineError::PartialFailure(_) => Self::PartialFailure(err.to_string()),
            EngineError::Store(StoreError::Conflict(msg)) => Self::Conflict(msg),
            EngineError::Store(inner) => Self::Store(inner.to_string()),
        }
    }
}

/// Engine result alias.
pub type EngineResult<T> = Result<T, EngineError>;
