//! Validation error types for bookkeeping operations.
//!
//! These errors are raised by pure domain logic before anything is written
//! to the store.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::transaction::TransactionKind;

/// Errors that can occur while validating bookkeeping input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    // ========== Amount Errors ==========
    /// Transaction amount cannot be zero.
    #[error("Amount cannot be zero")]
    ZeroAmount,

    /// Transaction amount cannot be negative.
    #[error("Amount cannot be negative: {0}")]
    NegativeAmount(Decimal),

    /// Opening balance cannot be negative.
    #[error("Opening balance cannot be negative: {0}")]
    NegativeOpeningBalance(Decimal),

    // ========== Naming Errors ==========
    /// Account or ledger name must not be blank.
    #[error("Name must not be blank")]
    BlankName,

    // ========== Transfer Errors ==========
    /// Source and destination accounts must differ.
    #[error("Source and destination accounts must differ")]
    SameAccountTransfer,

    /// Transfer legs are created by the transfer coordinator only.
    #[error("{0} transactions are created by the transfer coordinator")]
    TransferKindNotAllowed(TransactionKind),

    // ========== Posting Errors ==========
    /// A posting batch must touch at least two ledgers.
    #[error("Posting batch must have at least 2 lines")]
    InsufficientLines,

    /// Posting batch debits and credits do not match.
    #[error("Posting batch is not balanced. Debit: {debit}, Credit: {credit}")]
    UnbalancedBatch {
        /// Sum of debit amounts.
        debit: Decimal,
        /// Sum of credit amounts.
        credit: Decimal,
    },

    /// A posting line must carry exactly one positive side.
    #[error("Posting line for '{0}' must have exactly one of debit or credit set")]
    InvalidLine(String),

    /// Cash movements are only recorded for deposits and withdrawals.
    #[error("Cannot record a cash movement for a {0} transaction")]
    UnsupportedCashMovement(TransactionKind),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ZeroAmount => "ZERO_AMOUNT",
            Self::NegativeAmount(_) => "NEGATIVE_AMOUNT",
            Self::NegativeOpeningBalance(_) => "NEGATIVE_OPENING_BALANCE",
            Self::BlankName => "BLANK_NAME",
            Self::SameAccountTransfer => "SAME_ACCOUNT_TRANSFER",
            Self::TransferKindNotAllowed(_) => "TRANSFER_KIND_NOT_ALLOWED",
            Self::InsufficientLines => "INSUFFICIENT_LINES",
            Self::UnbalancedBatch { .. } => "UNBALANCED_BATCH",
            Self::InvalidLine(_) => "INVALID_LINE",
            Self::UnsupportedCashMovement(_) => "UNSUPPORTED_CASH_MOVEMENT",
        }
    }
}
