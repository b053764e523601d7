//! In-memory store backend.
//!
//! `MemoryStore` is the reference implementation of the repository contract
//! and the backend the test suites run against. Documents live in `DashMap`
//! collections; a single internal write mutex serializes the multi-document
//! and check-then-insert paths, which is how the atomicity guarantees of
//! `insert_pair` and `append_batch` are kept.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use tally_core::{canonical_name, Account, Ledger, LedgerEntry, Transaction};
use tally_shared::types::{AccountId, EntryId, LedgerId, TransactionId};
use uuid::Uuid;

use crate::error::StoreError;
use crate::repo::{
    AccountRepo, EntryDraft, LedgerEntryRepo, LedgerRepo, TransactionDraft, TransactionRepo,
};

/// In-memory document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: DashMap<AccountId, Account>,
    transactions: DashMap<TransactionId, Transaction>,
    ledgers: DashMap<LedgerId, Ledger>,
    ledger_names: DashMap<String, LedgerId>,
    entries: DashMap<EntryId, LedgerEntry>,
    idempotency: DashMap<Uuid, TransactionId>,
    clock: Mutex<Option<DateTime<Utc>>>,
    seq: AtomicU64,
    // Serializes multi-document writes and check-then-insert paths.
    write: Mutex<()>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next write timestamp, strictly greater than every
    /// previously assigned one.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let mut clock = self.clock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = Utc::now();
        let next = match *clock {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        *clock = Some(next);
        next
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn materialize(&self, draft: TransactionDraft, timestamp: DateTime<Utc>) -> Transaction {
        Transaction {
            id: draft.id,
            account_id: draft.account_id,
            kind: draft.kind,
            amount: draft.amount,
            description: draft.description,
            timestamp,
            amount_left: None,
            transfer_peer_account: draft.transfer_peer_account,
            transfer_peer_transaction: draft.transfer_peer_transaction,
            idempotency_key: draft.idempotency_key,
        }
    }

    fn existing_by_key(&self, key: Option<Uuid>) -> Option<Transaction> {
        let key = key?;
        let id = *self.idempotency.get(&key)?;
        self.transactions.get(&id).map(|tx| tx.clone())
    }
}

#[async_trait]
impl AccountRepo for MemoryStore {
    async fn insert_account(&self, account: Account) -> Result<Account, StoreError> {
        let _write = self.write.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if self.accounts.contains_key(&account.id) {
            return Err(StoreError::Conflict(format!(
                "account {} already exists",
                account.id
            )));
        }
        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.get(&id).map(|a| a.clone()))
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let mut accounts: Vec<Account> =
            self.accounts.iter().map(|a| a.value().clone()).collect();
        accounts.sort_by_key(|a| (a.created_at, a.id));
        Ok(accounts)
    }

    async fn update_account(&self, account: &Account) -> Result<(), StoreError> {
        let _write = self.write.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !self.accounts.contains_key(&account.id) {
            return Err(StoreError::Conflict(format!(
                "account {} does not exist",
                account.id
            )));
        }
        self.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn delete_account(&self, id: AccountId) -> Result<(), StoreError> {
        let _write = self.write.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.accounts.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl TransactionRepo for MemoryStore {
    async fn insert_transaction(
        &self,
        draft: TransactionDraft,
    ) -> Result<Transaction, StoreError> {
        let _write = self.write.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(existing) = self.existing_by_key(draft.idempotency_key) {
            return Ok(existing);
        }

        let key = draft.idempotency_key;
        let tx = self.materialize(draft, self.next_timestamp());
        if let Some(key) = key {
            self.idempotency.insert(key, tx.id);
        }
        self.transactions.insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn insert_pair(
        &self,
        out: TransactionDraft,
        into: TransactionDraft,
    ) -> Result<(Transaction, Transaction), StoreError> {
        let _write = self.write.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(existing_out) = self.existing_by_key(out.idempotency_key) {
            let peer = existing_out
                .transfer_peer_transaction
                .and_then(|id| self.transactions.get(&id).map(|tx| tx.clone()))
                .ok_or_else(|| {
                    StoreError::Internal("transfer pair is missing its counterpart".into())
                })?;
            return Ok((existing_out, peer));
        }

        let out_key = out.idempotency_key;
        let out_tx = self.materialize(out, self.next_timestamp());
        let into_tx = self.materialize(into, self.next_timestamp());
        if let Some(key) = out_key {
            self.idempotency.insert(key, out_tx.id);
        }
        self.transactions.insert(out_tx.id, out_tx.clone());
        self.transactions.insert(into_tx.id, into_tx.clone());
        Ok((out_tx, into_tx))
    }

    async fn get_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(self.transactions.get(&id).map(|tx| tx.clone()))
    }

    async fn list_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut txs: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|tx| tx.account_id == account_id)
            .map(|tx| tx.value().clone())
            .collect();
        txs.sort_by_key(|tx| tx.timestamp);
        Ok(txs)
    }

    async fn list_by_account_between(
        &self,
        account_id: AccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut txs = self.list_by_account(account_id).await?;
        txs.retain(|tx| tx.timestamp >= from && tx.timestamp <= to);
        Ok(txs)
    }

    async fn update_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
        let _write = self.write.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !self.transactions.contains_key(&tx.id) {
            return Err(StoreError::Conflict(format!(
                "transaction {} does not exist",
                tx.id
            )));
        }
        self.transactions.insert(tx.id, tx.clone());
        Ok(())
    }

    async fn delete_transaction(&self, id: TransactionId) -> Result<(), StoreError> {
        let _write = self.write.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.transactions.remove(&id);
        Ok(())
    }

    async fn delete_pair(
        &self,
        first: TransactionId,
        second: TransactionId,
    ) -> Result<(), StoreError> {
        let _write = self.write.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !self.transactions.contains_key(&first) || !self.transactions.contains_key(&second) {
            return Err(StoreError::Conflict(
                "transfer pair is incomplete, nothing deleted".into(),
            ));
        }
        self.transactions.remove(&first);
        self.transactions.remove(&second);
        Ok(())
    }

    async fn count_by_account(&self, account_id: AccountId) -> Result<usize, StoreError> {
        Ok(self
            .transactions
            .iter()
            .filter(|tx| tx.account_id == account_id)
            .count())
    }

    async fn delete_by_account(&self, account_id: AccountId) -> Result<usize, StoreError> {
        let _write = self.write.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let ids: Vec<TransactionId> = self
            .transactions
            .iter()
            .filter(|tx| tx.account_id == account_id)
            .map(|tx| tx.id)
            .collect();
        for id in &ids {
            self.transactions.remove(id);
        }
        Ok(ids.len())
    }
}

#[async_trait]
impl LedgerRepo for MemoryStore {
    async fn insert_ledger(&self, ledger: Ledger) -> Result<Ledger, StoreError> {
        let _write = self.write.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if self.ledger_names.contains_key(&ledger.name) {
            return Err(StoreError::Conflict(format!(
                "ledger '{}' already exists",
                ledger.name
            )));
        }
        self.ledger_names.insert(ledger.name.clone(), ledger.id);
        self.ledgers.insert(ledger.id, ledger.clone());
        Ok(ledger)
    }

    async fn find_ledger_by_name(&self, name: &str) -> Result<Option<Ledger>, StoreError> {
        let id = match self.ledger_names.get(&canonical_name(name)) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.ledgers.get(&id).map(|l| l.clone()))
    }

    async fn get_ledger(&self, id: LedgerId) -> Result<Option<Ledger>, StoreError> {
        Ok(self.ledgers.get(&id).map(|l| l.clone()))
    }

    async fn list_ledgers(&self) -> Result<Vec<Ledger>, StoreError> {
        let mut ledgers: Vec<Ledger> = self.ledgers.iter().map(|l| l.value().clone()).collect();
        ledgers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ledgers)
    }

    async fn update_ledger_balance(
        &self,
        id: LedgerId,
        balance: Decimal,
    ) -> Result<(), StoreError> {
        let _write = self.write.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut ledger = self
            .ledgers
            .get_mut(&id)
            .ok_or_else(|| StoreError::Conflict(format!("ledger {id} does not exist")))?;
        ledger.balance = balance;
        Ok(())
    }
}

#[async_trait]
impl LedgerEntryRepo for MemoryStore {
    async fn append_batch(
        &self,
        drafts: Vec<EntryDraft>,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let _write = self.write.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        // Validate every target before writing anything, so the batch is
        // all-or-nothing.
        for draft in &drafts {
            if !self.ledgers.contains_key(&draft.ledger_id) {
                return Err(StoreError::Internal(format!(
                    "ledger {} does not exist",
                    draft.ledger_id
                )));
            }
        }

        let mut written = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let entry = LedgerEntry {
                id: EntryId::new(),
                ledger_id: draft.ledger_id,
                date: draft.date,
                description: draft.description,
                debit: draft.debit,
                credit: draft.credit,
                balance_after: draft.balance_after,
                seq: self.next_seq(),
            };
            self.entries.insert(entry.id, entry.clone());
            if let Some(mut ledger) = self.ledgers.get_mut(&entry.ledger_id) {
                ledger.balance = entry.balance_after;
            }
            written.push(entry);
        }
        Ok(written)
    }

    async fn list_entries(&self, ledger_id: LedgerId) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut entries: Vec<LedgerEntry> = self
            .entries
            .iter()
            .filter(|e| e.ledger_id == ledger_id)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(LedgerEntry::order_key);
        Ok(entries)
    }
}
