//! Async repository traits: the contract every backend implements.
//!
//! All calls are remote-I/O shaped (async, fallible). Backends own two
//! pieces of bookkeeping the engine must not fake client-side: strictly
//! monotonic write timestamps on transactions and a monotonic `seq` on
//! ledger entries.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tally_core::{Account, Ledger, LedgerEntry, Transaction, TransactionKind};
use tally_shared::types::{AccountId, LedgerId, TransactionId};
use uuid::Uuid;

use crate::error::StoreError;

/// Input for a transaction insert. The id is caller-generated so transfer
/// legs can cross-link before either is written; the backend assigns the
/// timestamp and leaves `amount_left` unset.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    /// Pre-generated transaction id.
    pub id: TransactionId,
    /// Owning account.
    pub account_id: AccountId,
    /// Kind of movement.
    pub kind: TransactionKind,
    /// Positive amount.
    pub amount: Decimal,
    /// Free-form description.
    pub description: String,
    /// Other account of a transfer pair.
    pub transfer_peer_account: Option<AccountId>,
    /// Counterpart transaction of a transfer pair.
    pub transfer_peer_transaction: Option<TransactionId>,
    /// Caller-supplied dedup key for retried appends.
    pub idempotency_key: Option<Uuid>,
}

/// Input for a ledger entry append. The backend assigns the id and `seq`.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    /// Target ledger.
    pub ledger_id: LedgerId,
    /// Business date.
    pub date: NaiveDate,
    /// Free-form description.
    pub description: String,
    /// Debit amount (>= 0).
    pub debit: Decimal,
    /// Credit amount (>= 0).
    pub credit: Decimal,
    /// Running balance after this entry, computed by the caller under the
    /// ledger lock.
    pub balance_after: Decimal,
}

/// Bank/cash account storage.
#[async_trait]
pub trait AccountRepo {
    /// Inserts a new account document.
    async fn insert_account(&self, account: Account) -> Result<Account, StoreError>;

    /// Loads an account by id.
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Lists all accounts, oldest first.
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Replaces an account document.
    async fn update_account(&self, account: &Account) -> Result<(), StoreError>;

    /// Deletes an account document. The engine decides what happens to the
    /// account's transactions first.
    async fn delete_account(&self, id: AccountId) -> Result<(), StoreError>;
}

/// Account transaction storage.
#[async_trait]
pub trait TransactionRepo {
    /// Inserts one transaction, assigning its timestamp.
    ///
    /// If the draft carries an `idempotency_key` already seen, the existing
    /// document is returned unchanged instead of a duplicate being written.
    async fn insert_transaction(
        &self,
        draft: TransactionDraft,
    ) -> Result<Transaction, StoreError>;

    /// Inserts both legs of a transfer atomically: both documents land with
    /// consecutive timestamps, or neither does.
    async fn insert_pair(
        &self,
        out: TransactionDraft,
        into: TransactionDraft,
    ) -> Result<(Transaction, Transaction), StoreError>;

    /// Loads a transaction by id.
    async fn get_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Lists an account's transactions, timestamp ascending.
    async fn list_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Lists an account's transactions within `[from, to]` inclusive,
    /// timestamp ascending.
    async fn list_by_account_between(
        &self,
        account_id: AccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Replaces a transaction document. The timestamp is not reassigned.
    async fn update_transaction(&self, tx: &Transaction) -> Result<(), StoreError>;

    /// Deletes one transaction.
    async fn delete_transaction(&self, id: TransactionId) -> Result<(), StoreError>;

    /// Deletes both legs of a transfer atomically.
    async fn delete_pair(
        &self,
        first: TransactionId,
        second: TransactionId,
    ) -> Result<(), StoreError>;

    /// Counts an account's transactions.
    async fn count_by_account(&self, account_id: AccountId) -> Result<usize, StoreError>;

    /// Deletes every transaction of an account, returning how many went.
    async fn delete_by_account(&self, account_id: AccountId) -> Result<usize, StoreError>;
}

/// General ledger storage.
#[async_trait]
pub trait LedgerRepo {
    /// Inserts a new ledger.
    ///
    /// The canonical name is unique; inserting a duplicate returns
    /// `StoreError::Conflict`.
    async fn insert_ledger(&self, ledger: Ledger) -> Result<Ledger, StoreError>;

    /// Finds a ledger by name. The lookup canonicalizes the input the same
    /// way ledger creation does.
    async fn find_ledger_by_name(&self, name: &str) -> Result<Option<Ledger>, StoreError>;

    /// Loads a ledger by id.
    async fn get_ledger(&self, id: LedgerId) -> Result<Option<Ledger>, StoreError>;

    /// Lists all ledgers, name ascending.
    async fn list_ledgers(&self) -> Result<Vec<Ledger>, StoreError>;

    /// Updates a ledger's cached balance.
    async fn update_ledger_balance(
        &self,
        id: LedgerId,
        balance: Decimal,
    ) -> Result<(), StoreError>;
}

/// Append-only ledger entry storage.
#[async_trait]
pub trait LedgerEntryRepo {
    /// Appends a batch of entries atomically: every entry lands with its
    /// assigned `seq`, and each touched ledger's cached balance is set to the
    /// `balance_after` of its last entry in the batch. All or nothing.
    async fn append_batch(
        &self,
        drafts: Vec<EntryDraft>,
    ) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Lists a ledger's entries ordered by `(date, seq)` ascending.
    async fn list_entries(&self, ledger_id: LedgerId) -> Result<Vec<LedgerEntry>, StoreError>;
}

/// The full store contract.
pub trait Store:
    AccountRepo + TransactionRepo + LedgerRepo + LedgerEntryRepo + Send + Sync
{
}

impl<T> Store for T where T: AccountRepo + TransactionRepo + LedgerRepo + LedgerEntryRepo + Send + Sync
{}
