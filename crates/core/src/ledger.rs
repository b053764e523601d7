//! General ledgers and their append-only debit/credit entries.
//!
//! A ledger accumulates entries into a running balance. Entries are an audit
//! trail: once written they are never mutated, and their order is
//! `(date, seq)` where `seq` is the server-assigned creation order.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{EntryId, LedgerId};

use crate::error::LedgerError;

/// Ledger classification, determining the normal balance side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    /// Resources owned (cash, receivables). Debit-normal.
    Asset,
    /// Obligations owed. Credit-normal.
    Liability,
    /// Owner's stake. Credit-normal.
    Equity,
    /// Revenue earned. Credit-normal.
    Income,
    /// Costs incurred. Debit-normal.
    Expense,
}

impl LedgerKind {
    /// Returns true for debit-normal ledgers (Asset, Expense).
    #[must_use]
    pub const fn is_debit_normal(self) -> bool {
        matches!(self, Self::Asset | Self::Expense)
    }

    /// Returns the balance effect of an entry on this kind of ledger.
    ///
    /// Debit-normal ledgers grow with debits; credit-normal ledgers grow
    /// with credits, so income ledgers accumulate credits as positive
    /// activity.
    #[must_use]
    pub fn balance_change(self, debit: Decimal, credit: Decimal) -> Decimal {
        if self.is_debit_normal() {
            debit - credit
        } else {
            credit - debit
        }
    }
}

impl std::fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
            Self::Equity => "equity",
            Self::Income => "income",
            Self::Expense => "expense",
        };
        write!(f, "{s}")
    }
}

/// Canonicalizes a ledger name to title case: "accounts receivable" and
/// "ACCOUNTS  RECEIVABLE" both become "Accounts Receivable".
#[must_use]
pub fn canonical_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A named general ledger with a cached running balance.
///
/// `balance` is derived: it mirrors the `balance_after` of the newest entry
/// and is written together with each append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    /// Ledger id.
    pub id: LedgerId,
    /// Canonical (title-cased) unique name.
    pub name: String,
    /// Classification.
    pub kind: LedgerKind,
    /// Balance after the newest entry (derived; 0 if none).
    pub balance: Decimal,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Ledger {
    /// Creates a ledger with a canonicalized name and zero balance.
    ///
    /// # Errors
    ///
    /// Returns `BlankName` if the name is empty or whitespace.
    pub fn create(name: &str, kind: LedgerKind) -> Result<Self, LedgerError> {
        let name = canonical_name(name);
        if name.is_empty() {
            return Err(LedgerError::BlankName);
        }
        Ok(Self {
            id: LedgerId::new(),
            name,
            kind,
            balance: Decimal::ZERO,
            created_at: Utc::now(),
        })
    }
}

/// One debit/credit row in a ledger. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry id.
    pub id: EntryId,
    /// Owning ledger.
    pub ledger_id: LedgerId,
    /// Business date of the entry.
    pub date: NaiveDate,
    /// Free-form description, e.g. "Invoice INV-12 - Acme".
    pub description: String,
    /// Debit amount (>= 0).
    pub debit: Decimal,
    /// Credit amount (>= 0).
    pub credit: Decimal,
    /// Running balance after this entry, computed at append time.
    pub balance_after: Decimal,
    /// Server-assigned creation order, the `(date, seq)` tiebreaker.
    pub seq: u64,
}

impl LedgerEntry {
    /// The `(date, creation order)` sort key.
    #[must_use]
    pub const fn order_key(&self) -> (NaiveDate, u64) {
        (self.date, self.seq)
    }
}

/// A stored `balance_after` that disagrees with the ledger replay fold.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EntryDivergence {
    /// The diverging entry.
    pub entry_id: EntryId,
    /// What the fold expected.
    pub expected: Decimal,
    /// What the entry stores.
    pub stored: Decimal,
}

impl std::fmt::Display for EntryDivergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "entry {}: stored {} expected {}",
            self.entry_id, self.stored, self.expected
        )
    }
}

/// The result of replaying a ledger's entries in `(date, seq)` order.
#[derive(Debug, Clone)]
pub struct LedgerReplay {
    /// Entries whose stored `balance_after` disagrees with the fold.
    /// Backdated appends are the usual cause.
    pub divergences: Vec<EntryDivergence>,
    /// Balance after the last entry (0 if none).
    pub closing_balance: Decimal,
}

impl LedgerReplay {
    /// Returns true if every entry matches the fold and the ledger's cached
    /// balance equals the closing balance.
    #[must_use]
    pub fn is_consistent(&self, cached_balance: Decimal) -> bool {
        self.divergences.is_empty() && cached_balance == self.closing_balance
    }
}

/// Folds `entries` (already ordered by `(date, seq)` ascending) from zero,
/// applying the ledger kind's balance rule.
#[must_use]
pub fn replay_entries(kind: LedgerKind, entries: &[LedgerEntry]) -> LedgerReplay {
    let mut balance = Decimal::ZERO;
    let mut divergences = Vec::new();

    for entry in entries {
        balance += kind.balance_change(entry.debit, entry.credit);
        if entry.balance_after != balance {
            divergences.push(EntryDivergence {
                entry_id: entry.id,
                expected: balance,
                stored: entry.balance_after,
            });
        }
    }

    LedgerReplay {
        divergences,
        closing_balance: balance,
    }
}
