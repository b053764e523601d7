//! Core bookkeeping logic for Tally.
//!
//! This crate contains pure business logic with ZERO store or I/O
//! dependencies. All domain types, validation rules, and balance
//! calculations live here.
//!
//! # Modules
//!
//! - `account` - Bank/cash account documents
//! - `transaction` - Account transactions and transfer pairing
//! - `replay` - Running-balance replay for accounts
//! - `ledger` - General ledgers and append-only debit/credit entries
//! - `posting` - Double-entry posting batches for business events
//! - `error` - Validation error types

pub mod account;
pub mod error;
pub mod ledger;
pub mod posting;
pub mod replay;
pub mod transaction;

pub use account::Account;
pub use error::LedgerError;
pub use ledger::{
    canonical_name, replay_entries, EntryDivergence, Ledger, LedgerEntry, LedgerKind, LedgerReplay,
};
pub use posting::{Expense, Invoice, Payment, PostingBatch, PostingLine};
pub use replay::{replay, Divergence, Replay, ReplayRow};
pub use transaction::{Transaction, TransactionKind};
