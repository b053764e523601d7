//! Bank/cash account documents.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::AccountId;

use crate::error::LedgerError;

/// A bank or cash account.
///
/// `current_balance` is derived: it starts equal to `opening_balance` and is
/// afterwards written only by the balance recomputer, never by transaction
/// handlers directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account id.
    pub id: AccountId,
    /// Display name, e.g. "Equity Bank".
    pub name: String,
    /// Bank account number (free-form; cash boxes may leave it empty).
    pub account_number: String,
    /// Balance at account creation; the replay starting point.
    pub opening_balance: Decimal,
    /// Balance after the latest transaction (derived).
    pub current_balance: Decimal,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Opens a new account with `current_balance = opening_balance`.
    ///
    /// # Errors
    ///
    /// Returns `BlankName` if the name is empty or whitespace, and
    /// `NegativeOpeningBalance` for an opening balance below zero.
    pub fn open(
        name: impl Into<String>,
        account_number: impl Into<String>,
        opening_balance: Decimal,
    ) -> Result<Self, LedgerError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LedgerError::BlankName);
        }
        if opening_balance.is_sign_negative() {
            return Err(LedgerError::NegativeOpeningBalance(opening_balance));
        }

        Ok(Self {
            id: AccountId::new(),
            name,
            account_number: account_number.into(),
            opening_balance,
            current_balance: opening_balance,
            created_at: Utc::now(),
        })
    }
}
