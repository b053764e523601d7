//! Bookkeeping services for Tally.
//!
//! The engine orchestrates the pure domain logic in `tally-core` over a
//! `tally-store` backend:
//!
//! - [`AccountService`] - account lifecycle
//! - [`TransactionLog`] - deposits/withdrawals, always followed by recompute
//! - [`BalanceRecomputer`] - the single writer of derived balances
//! - [`TransferCoordinator`] - atomic two-legged transfers
//! - [`LedgerService`] - ledgers and append-only entries
//! - [`PostingEngine`] - balanced double-entry batches for business events
//! - [`StatementService`] - reconciled statements and reports
//!
//! Every mutating path takes the affected account/ledger locks first, so all
//! read-modify-write cycles on one key are serialized.

pub mod accounts;
pub mod error;
pub mod ledgers;
pub mod posting;
pub mod recompute;
mod retry;
pub mod statement;
pub mod transactions;
pub mod transfer;

use std::sync::Arc;

use tally_shared::config::AppConfig;
use tally_shared::types::AccountId;
use tally_store::{LockRegistry, Store};

pub use accounts::{AccountPatch, AccountService};
pub use error::{EngineError, EngineResult};
pub use ledgers::{LedgerAudit, LedgerService};
pub use posting::PostingEngine;
pub use recompute::{AccountAudit, BalanceRecomputer, RecomputeReport};
pub use statement::{LedgerReport, Statement, StatementService};
pub use transactions::{AppendRequest, TransactionLog, TransactionPatch};
pub use transfer::TransferCoordinator;

/// All services wired over one store and one pair of lock registries.
pub struct Engine<S> {
    /// Account lifecycle.
    pub accounts: AccountService<S>,
    /// Deposits and withdrawals.
    pub transactions: TransactionLog<S>,
    /// Derived-balance recompute and audit.
    pub recomputer: BalanceRecomputer<S>,
    /// Inter-account transfers.
    pub transfers: TransferCoordinator<S>,
    /// Ledgers and entries.
    pub ledgers: LedgerService<S>,
    /// Double-entry business events.
    pub postings: PostingEngine<S>,
    /// Reconciled reads.
    pub statements: StatementService<S>,
}

impl<S: Store> Engine<S> {
    /// Wires every service over `store`.
    pub fn new(store: Arc<S>, config: &AppConfig) -> Self {
        let account_locks = Arc::new(LockRegistry::<AccountId>::new());
        let ledger_locks = Arc::new(LockRegistry::<String>::new());

        let recomputer = BalanceRecomputer::new(
            Arc::clone(&store),
            Arc::clone(&account_locks),
            config.recompute,
        );
        let accounts = AccountService::new(Arc::clone(&store), Arc::clone(&account_locks));
        let transactions = TransactionLog::new(
            Arc::clone(&store),
            Arc::clone(&account_locks),
            recomputer.clone(),
            config.retry,
        );
        let transfers = TransferCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&account_locks),
            recomputer.clone(),
            config.retry,
        );
        let ledgers = LedgerService::new(Arc::clone(&store), Arc::clone(&ledger_locks));
        let postings = PostingEngine::new(
            Arc::clone(&store),
            Arc::clone(&ledger_locks),
            ledgers.clone(),
        );
        let statements = StatementService::new(
            Arc::clone(&store),
            recomputer.clone(),
            transactions.clone(),
            ledgers.clone(),
        );

        Self {
            accounts,
            transactions,
            recomputer,
            transfers,
            ledgers,
            postings,
            statements,
        }
    }
}
