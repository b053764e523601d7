//! The transaction log: deposits and withdrawals on one account.
//!
//! Transfer legs never enter through here; the transfer coordinator owns
//! them. Every mutation ends with a recompute of the touched account, so
//! `amount_left` and `current_balance` are reconciled before the call
//! returns.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use tally_core::transaction::validate_amount;
use tally_core::{LedgerError, Transaction, TransactionKind};
use tally_shared::config::RetryConfig;
use tally_shared::types::{AccountId, TransactionId};
use tally_store::{LockRegistry, Store, TransactionDraft};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::recompute::BalanceRecomputer;
use crate::retry::with_retry;

/// Input for appending a deposit or withdrawal.
#[derive(Debug, Clone)]
pub struct AppendRequest {
    /// The account to append to.
    pub account_id: AccountId,
    /// `Deposit` or `Withdrawal`; transfer kinds are rejected.
    pub kind: TransactionKind,
    /// Positive amount.
    pub amount: Decimal,
    /// Free-form description.
    pub description: String,
    /// Dedup key for safe retries; generated when absent.
    pub idempotency_key: Option<Uuid>,
}

/// Fields of a transaction a caller may change.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    /// New amount (must stay positive).
    pub amount: Option<Decimal>,
    /// New description.
    pub description: Option<String>,
}

/// Appends, edits, and lists account transactions.
pub struct TransactionLog<S> {
    store: Arc<S>,
    locks: Arc<LockRegistry<AccountId>>,
    recomputer: BalanceRecomputer<S>,
    retry: RetryConfig,
}

impl<S> Clone for TransactionLog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
            recomputer: self.recomputer.clone(),
            retry: self.retry,
        }
    }
}

impl<S: Store> TransactionLog<S> {
    /// Creates the log.
    pub fn new(
        store: Arc<S>,
        locks: Arc<LockRegistry<AccountId>>,
        recomputer: BalanceRecomputer<S>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            locks,
            recomputer,
            retry,
        }
    }

    /// Appends a deposit or withdrawal and recomputes the account.
    pub async fn append(&self, request: AppendRequest) -> EngineResult<Transaction> {
        if request.kind.is_transfer() {
            return Err(LedgerError::TransferKindNotAllowed(request.kind).into());
        }
        validate_amount(request.amount)?;

        let account_id = request.account_id;
        let _guard = self.locks.acquire(&account_id).await;
        // Existence is checked under the lock: a concurrent delete holds the
        // same lock, so the account cannot vanish between this read and the
        // insert below.
        self.store
            .get_account(account_id)
            .await?
            .ok_or(EngineError::AccountNotFound(account_id))?;
        let key = request.idempotency_key.unwrap_or_else(Uuid::new_v4);
        let id = TransactionId::new();
        let tx = with_retry(&self.retry, "insert_transaction", || {
            self.store.insert_transaction(TransactionDraft {
                id,
                account_id,
                kind: request.kind,
                amount: request.amount,
                description: request.description.clone(),
                transfer_peer_account: None,
                transfer_peer_transaction: None,
                idempotency_key: Some(key),
            })
        })
        .await?;

        self.recomputer.recompute_locked(account_id).await?;
        tracing::info!(
            transaction_id = %tx.id,
            account_id = %account_id,
            kind = %tx.kind,
            amount = %tx.amount,
            "transaction appended"
        );
        Ok(tx)
    }

    /// Loads one transaction.
    pub async fn get(&self, id: TransactionId) -> EngineResult<Transaction> {
        self.store
            .get_transaction(id)
            .await?
            .ok_or(EngineError::TransactionNotFound(id))
    }

    /// Edits a deposit or withdrawal and recomputes the account.
    ///
    /// Transfer legs cannot be edited; delete and re-create the transfer.
    pub async fn update(
        &self,
        id: TransactionId,
        patch: TransactionPatch,
    ) -> EngineResult<Transaction> {
        let account_id = self.get(id).await?.account_id;
        let _guard = self.locks.acquire(&account_id).await;

        // Re-read under the lock; the row may have changed while unlocked.
        let mut tx = self.get(id).await?;
        if tx.kind.is_transfer() {
            return Err(EngineError::TransferLegManaged);
        }

        if let Some(amount) = patch.amount {
            validate_amount(amount)?;
            tx.amount = amount;
        }
        if let Some(description) = patch.description {
            tx.description = description;
        }

        self.store.update_transaction(&tx).await?;
        self.recomputer.recompute_locked(tx.account_id).await?;
        Ok(tx)
    }

    /// Deletes a deposit or withdrawal and recomputes the account.
    pub async fn delete(&self, id: TransactionId) -> EngineResult<()> {
        let account_id = self.get(id).await?.account_id;
        let _guard = self.locks.acquire(&account_id).await;

        let tx = self.get(id).await?;
        if tx.kind.is_transfer() {
            return Err(EngineError::TransferLegManaged);
        }

        self.store.delete_transaction(id).await?;
        self.recomputer.recompute_locked(tx.account_id).await?;
        tracing::info!(transaction_id = %id, account_id = %tx.account_id, "transaction deleted");
        Ok(())
    }

    /// Lists an account's transactions, oldest first.
    pub async fn list(&self, account_id: AccountId) -> EngineResult<Vec<Transaction>> {
        Ok(self.store.list_by_account(account_id).await?)
    }

    /// Lists an account's transactions within `[from, to]`, both days
    /// inclusive, oldest first.
    pub async fn list_between(
        &self,
        account_id: AccountId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<Transaction>> {
        let start = from.and_time(NaiveTime::MIN).and_utc();
        let end = to
            .and_hms_micro_opt(23, 59, 59, 999_999)
            .unwrap_or_else(|| to.and_time(NaiveTime::MIN))
            .and_utc();
        Ok(self
            .store
            .list_by_account_between(account_id, start, end)
            .await?)
    }
}
