//! Account lifecycle: create, update, list, delete.

use std::sync::Arc;

use rust_decimal::Decimal;
use tally_core::Account;
use tally_shared::types::AccountId;
use tally_store::{LockRegistry, Store};

use crate::error::{EngineError, EngineResult};
use crate::recompute::BalanceRecomputer;

/// Fields of an account a caller may change. Balances are derived and
/// cannot be patched.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    /// New display name.
    pub name: Option<String>,
    /// New bank account number.
    pub account_number: Option<String>,
}

/// Manages bank/cash accounts.
pub struct AccountService<S> {
    store: Arc<S>,
    locks: Arc<LockRegistry<AccountId>>,
}

impl<S> Clone for AccountService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S: Store> AccountService<S> {
    /// Creates the service.
    pub fn new(store: Arc<S>, locks: Arc<LockRegistry<AccountId>>) -> Self {
        Self { store, locks }
    }

    /// Opens a new account.
    pub async fn create(
        &self,
        name: &str,
        account_number: &str,
        opening_balance: Decimal,
    ) -> EngineResult<Account> {
        let account = Account::open(name, account_number, opening_balance)?;
        tracing::info!(account_id = %account.id, name = %account.name, "account created");
        Ok(self.store.insert_account(account).await?)
    }

    /// Loads an account.
    pub async fn get(&self, id: AccountId) -> EngineResult<Account> {
        self.store
            .get_account(id)
            .await?
            .ok_or(EngineError::AccountNotFound(id))
    }

    /// Lists all accounts, oldest first.
    pub async fn list(&self) -> EngineResult<Vec<Account>> {
        Ok(self.store.list_accounts().await?)
    }

    /// Updates an account's descriptive fields.
    pub async fn update(&self, id: AccountId, patch: AccountPatch) -> EngineResult<Account> {
        let _guard = self.locks.acquire(&id).await;
        let mut account = self.get(id).await?;

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(tally_core::LedgerError::BlankName.into());
            }
            account.name = name;
        }
        if let Some(number) = patch.account_number {
            account.account_number = number;
        }

        self.store.update_account(&account).await?;
        Ok(account)
    }

    /// Deletes an account with no transaction history.
    ///
    /// An account that still has transactions is not deleted; use
    /// [`delete_cascade`](Self::delete_cascade) to remove the history with it.
    pub async fn delete(&self, id: AccountId) -> EngineResult<()> {
        let _guard = self.locks.acquire(&id).await;
        self.get(id).await?;

        let remaining = self.store.count_by_account(id).await?;
        if remaining > 0 {
            return Err(EngineError::AccountHasTransactions(id, remaining));
        }
        self.store.delete_account(id).await?;
        tracing::info!(account_id = %id, "account deleted");
        Ok(())
    }

    /// Deletes an account together with its whole transaction history.
    ///
    /// Transfer legs in the history take their counterpart on the other
    /// account with them, so no account is left with a dangling half of a
    /// transfer. Returns how many transactions were removed in total.
    pub async fn delete_cascade(
        &self,
        id: AccountId,
        recomputer: &BalanceRecomputer<S>,
    ) -> EngineResult<usize> {
        let (mut removed, peers) = {
            let _guard = self.locks.acquire(&id).await;
            self.get(id).await?;

            let peers: Vec<_> = self
                .store
                .list_by_account(id)
                .await?
                .into_iter()
                .filter_map(|tx| tx.transfer_peer_transaction.zip(tx.transfer_peer_account))
                .collect();
            let removed = self.store.delete_by_account(id).await?;
            self.store.delete_account(id).await?;
            (removed, peers)
        };

        // Peer accounts are locked by their own recompute passes; taking
        // their locks while still holding this account's would invert the
        // sorted order the transfer coordinator uses.
        for (peer_tx, peer_account) in &peers {
            self.store.delete_transaction(*peer_tx).await?;
            removed += 1;
            recomputer.recompute(*peer_account).await?;
        }

        tracing::info!(account_id = %id, removed, "account deleted with history");
        Ok(removed)
    }
}
