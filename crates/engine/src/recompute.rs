//! Balance recomputation: the single writer of derived account balances.
//!
//! Every mutation of an account's history ends with a recompute pass: replay
//! the ordered transactions over the opening balance, rewrite `amount_left`
//! only where the stored value differs, then set `current_balance` to the
//! closing balance. Running it twice in a row rewrites nothing.

use std::sync::Arc;

use rust_decimal::Decimal;
use tally_core::replay::{replay, Divergence};
use tally_shared::config::RecomputeConfig;
use tally_shared::types::AccountId;
use tally_store::{LockRegistry, Store};

use crate::error::{EngineError, EngineResult};

/// What a recompute pass did.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RecomputeReport {
    /// Transactions replayed.
    pub scanned: usize,
    /// Rows whose `amount_left` had to be rewritten.
    pub rewritten: usize,
    /// The account's balance after the pass.
    pub current_balance: Decimal,
}

/// A read-only audit of an account's stored balances.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AccountAudit {
    /// Rows whose stored `amount_left` disagrees with the fold.
    pub divergences: Vec<Divergence>,
    /// The account's cached `current_balance`.
    pub cached_balance: Decimal,
    /// The closing balance the fold computed.
    pub computed_balance: Decimal,
}

impl AccountAudit {
    /// Returns true if nothing diverges.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.divergences.is_empty() && self.cached_balance == self.computed_balance
    }
}

/// Recomputes and audits account balances.
pub struct BalanceRecomputer<S> {
    store: Arc<S>,
    locks: Arc<LockRegistry<AccountId>>,
    config: RecomputeConfig,
}

impl<S> Clone for BalanceRecomputer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
            config: self.config,
        }
    }
}

impl<S: Store> BalanceRecomputer<S> {
    /// Creates a recomputer over `store`, serialized by `locks`.
    pub fn new(
        store: Arc<S>,
        locks: Arc<LockRegistry<AccountId>>,
        config: RecomputeConfig,
    ) -> Self {
        Self {
            store,
            locks,
            config,
        }
    }

    /// Recomputes one account under its lock.
    pub async fn recompute(&self, account_id: AccountId) -> EngineResult<RecomputeReport> {
        let _guard = self.locks.acquire(&account_id).await;
        self.recompute_locked(account_id).await
    }

    /// Recompute body; the caller must hold the account's lock.
    pub(crate) async fn recompute_locked(
        &self,
        account_id: AccountId,
    ) -> EngineResult<RecomputeReport> {
        let mut account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(EngineError::AccountNotFound(account_id))?;
        let transactions = self.store.list_by_account(account_id).await?;

        if transactions.len() > self.config.soft_limit {
            tracing::warn!(
                account_id = %account_id,
                count = transactions.len(),
                soft_limit = self.config.soft_limit,
                "full-history replay over a large account"
            );
        }

        let replayed = replay(account.opening_balance, &transactions);
        let mut rewritten = 0;
        for (row, tx) in replayed.rows.iter().zip(&transactions) {
            if row.is_stale() {
                let mut updated = tx.clone();
                updated.amount_left = Some(row.computed);
                self.store.update_transaction(&updated).await?;
                rewritten += 1;
            }
        }

        if account.current_balance != replayed.closing_balance {
            account.current_balance = replayed.closing_balance;
            self.store.update_account(&account).await?;
        }

        tracing::debug!(
            account_id = %account_id,
            scanned = replayed.rows.len(),
            rewritten,
            balance = %replayed.closing_balance,
            "recomputed account balances"
        );

        Ok(RecomputeReport {
            scanned: replayed.rows.len(),
            rewritten,
            current_balance: replayed.closing_balance,
        })
    }

    /// Replays without writing and reports every divergence.
    pub async fn verify(&self, account_id: AccountId) -> EngineResult<AccountAudit> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(EngineError::AccountNotFound(account_id))?;
        let transactions = self.store.list_by_account(account_id).await?;
        let replayed = replay(account.opening_balance, &transactions);

        let audit = AccountAudit {
            divergences: replayed.divergences(),
            cached_balance: account.current_balance,
            computed_balance: replayed.closing_balance,
        };
        if !audit.is_consistent() {
            tracing::warn!(
                account_id = %account_id,
                divergences = audit.divergences.len(),
                cached = %audit.cached_balance,
                computed = %audit.computed_balance,
                "stored balances diverge from replay"
            );
        }
        Ok(audit)
    }
}
