//! Running-balance replay for accounts.
//!
//! Replay folds an account's transactions, ordered by server timestamp
//! ascending, over the opening balance. The fold yields the expected
//! `amount_left` for every row and the account's closing balance. Rows whose
//! stored `amount_left` differs are "stale" and are the only rows the
//! recomputer rewrites (write avoidance).

use rust_decimal::Decimal;
use tally_shared::types::TransactionId;

use crate::transaction::Transaction;

/// One replayed transaction: the stored running balance next to the computed
/// one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRow {
    /// The transaction this row describes.
    pub transaction_id: TransactionId,
    /// Running balance currently stored on the document, if any.
    pub stored: Option<Decimal>,
    /// Running balance the fold computed for this position.
    pub computed: Decimal,
}

impl ReplayRow {
    /// Returns true if the stored value is missing or differs from the fold.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stored != Some(self.computed)
    }
}

/// A stored running balance that disagrees with the replay fold.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Divergence {
    /// The diverging transaction.
    pub transaction_id: TransactionId,
    /// What the fold expected at this position.
    pub expected: Decimal,
    /// What the document actually stores.
    pub stored: Option<Decimal>,
}

impl std::fmt::Display for Divergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.stored {
            Some(stored) => write!(
                f,
                "transaction {}: stored {} expected {}",
                self.transaction_id, stored, self.expected
            ),
            None => write!(
                f,
                "transaction {}: no stored balance, expected {}",
                self.transaction_id, self.expected
            ),
        }
    }
}

/// The result of replaying an account's history.
#[derive(Debug, Clone)]
pub struct Replay {
    /// Per-transaction rows in timestamp order.
    pub rows: Vec<ReplayRow>,
    /// Balance after the last transaction (the opening balance if none).
    pub closing_balance: Decimal,
}

impl Replay {
    /// Rows whose stored balance disagrees with the fold.
    #[must_use]
    pub fn divergences(&self) -> Vec<Divergence> {
        self.rows
            .iter()
            .filter(|row| row.is_stale())
            .map(|row| Divergence {
                transaction_id: row.transaction_id,
                expected: row.computed,
                stored: row.stored,
            })
            .collect()
    }

    /// Returns true if every stored row matches the fold and the account's
    /// cached balance equals the closing balance.
    #[must_use]
    pub fn is_consistent(&self, current_balance: Decimal) -> bool {
        self.rows.iter().all(|row| !row.is_stale()) && current_balance == self.closing_balance
    }
}

/// Folds `transactions` (already ordered by timestamp ascending) over
/// `opening_balance`.
#[must_use]
pub fn replay(opening_balance: Decimal, transactions: &[Transaction]) -> Replay {
    let mut balance = opening_balance;
    let mut rows = Vec::with_capacity(transactions.len());

    for tx in transactions {
        balance += tx.signed_amount();
        rows.push(ReplayRow {
            transaction_id: tx.id,
            stored: tx.amount_left,
            computed: balance,
        });
    }

    Replay {
        rows,
        closing_balance: balance,
    }
}
