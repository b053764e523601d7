//! Account transactions: monetary movements on a bank/cash account.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, TransactionId};
use uuid::Uuid;

use crate::error::LedgerError;

/// The kind of monetary movement.
///
/// Transfers always come in pairs: a `TransferOut` on the source account and
/// a `TransferIn` on the destination, created atomically and linked by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Money entering the account.
    Deposit,
    /// Money leaving the account.
    Withdrawal,
    /// The source leg of an inter-account transfer.
    TransferOut,
    /// The destination leg of an inter-account transfer.
    TransferIn,
}

impl TransactionKind {
    /// Returns the signed effect of `amount` on a running balance.
    ///
    /// Deposits and incoming transfers add; withdrawals and outgoing
    /// transfers subtract.
    #[must_use]
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            Self::Deposit | Self::TransferIn => amount,
            Self::Withdrawal | Self::TransferOut => -amount,
        }
    }

    /// Returns true for either leg of a transfer.
    #[must_use]
    pub const fn is_transfer(self) -> bool {
        matches!(self, Self::TransferOut | Self::TransferIn)
    }

    /// Returns the opposite transfer leg, if this is one.
    #[must_use]
    pub const fn transfer_counterpart(self) -> Option<Self> {
        match self {
            Self::TransferOut => Some(Self::TransferIn),
            Self::TransferIn => Some(Self::TransferOut),
            Self::Deposit | Self::Withdrawal => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::TransferOut => "transfer_out",
            Self::TransferIn => "transfer_in",
        };
        write!(f, "{s}")
    }
}

/// A monetary movement on one account.
///
/// `timestamp` is assigned by the store on insert and is strictly monotonic
/// per write. `amount_left` is the running balance after this transaction;
/// it is written only by the balance recomputer, never at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction id.
    pub id: TransactionId,
    /// The account this movement belongs to.
    pub account_id: AccountId,
    /// The kind of movement.
    pub kind: TransactionKind,
    /// Positive amount moved.
    pub amount: Decimal,
    /// Free-form description.
    pub description: String,
    /// Server-assigned write timestamp.
    pub timestamp: DateTime<Utc>,
    /// Running balance after this transaction (derived; `None` until the
    /// first recompute pass).
    pub amount_left: Option<Decimal>,
    /// The other account of a transfer pair.
    pub transfer_peer_account: Option<AccountId>,
    /// The counterpart transaction of a transfer pair, written at creation.
    pub transfer_peer_transaction: Option<TransactionId>,
    /// Caller-supplied key deduplicating retried appends.
    pub idempotency_key: Option<Uuid>,
}

impl Transaction {
    /// Returns the signed effect of this transaction on a running balance.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }
}

/// Validates a transaction amount: strictly positive.
///
/// # Errors
///
/// Returns `ZeroAmount` or `NegativeAmount`.
pub fn validate_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount.is_zero() {
        return Err(LedgerError::ZeroAmount);
    }
    if amount.is_sign_negative() {
        return Err(LedgerError::NegativeAmount(amount));
    }
    Ok(())
}
