//! Inter-account transfers.
//!
//! A transfer is two transactions created as one atomic write: a
//! `TransferOut` on the source and a `TransferIn` on the destination, each
//! storing the other's id. Deletion resolves the counterpart by that stored
//! id and removes both legs atomically, so no account ever holds half a
//! transfer.

use std::sync::Arc;

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

/// Creates and deletes transfer pairs.
pub struct TransferCoordinator<S> {
    store: Arc<S>,
    locks: Arc<LockRegistry<AccountId>>,
    recomputer: BalanceRecomputer<S>,
    retry: RetryConfig,
}

impl<S> Clone for TransferCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
            recomputer: self.recomputer.clone(),
            retry: self.retry,
        }
    }
}

impl<S: Store> TransferCoordinator<S> {
    /// Creates the coordinator.
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

    /// Moves `amount` from `source` to `dest`, returning the
    /// `(TransferOut, TransferIn)` legs.
    pub async fn transfer(
        &self,
        source: AccountId,
        dest: AccountId,
        amount: Decimal,
        description: &str,
    ) -> EngineResult<(Transaction, Transaction)> {
        if source == dest {
            return Err(LedgerError::SameAccountTransfer.into());
        }
        validate_amount(amount)?;

        let _guards = self.locks.acquire_many(&[source, dest]).await;
        // Both accounts are re-verified under their locks so a concurrent
        // delete cannot slip between the check and the paired insert.
        for id in [source, dest] {
            self.store
                .get_account(id)
                .await?
                .ok_or(EngineError::AccountNotFound(id))?;
        }

        let out_id = TransactionId::new();
        let in_id = TransactionId::new();
        let key = Uuid::new_v4();
        let (out_tx, in_tx) = with_retry(&self.retry, "insert_pair", || {
            self.store.insert_pair(
                TransactionDraft {
                    id: out_id,
                    account_id: source,
                    kind: TransactionKind::TransferOut,
                    amount,
                    description: description.to_string(),
                    transfer_peer_account: Some(dest),
                    transfer_peer_transaction: Some(in_id),
                    idempotency_key: Some(key),
                },
                TransactionDraft {
                    id: in_id,
                    account_id: dest,
                    kind: TransactionKind::TransferIn,
                    amount,
                    description: description.to_string(),
                    transfer_peer_account: Some(source),
                    transfer_peer_transaction: Some(out_id),
                    idempotency_key: None,
                },
            )
        })
        .await?;

        self.recomputer.recompute_locked(source).await?;
        self.recomputer.recompute_locked(dest).await?;

        tracing::info!(
            source = %source,
            dest = %dest,
            amount = %amount,
            out_id = %out_tx.id,
            in_id = %in_tx.id,
            "transfer created"
        );
        Ok((out_tx, in_tx))
    }

    /// Deletes a transfer given either of its legs. Both legs go atomically
    /// and both accounts are recomputed.
    pub async fn delete_transfer(&self, leg_id: TransactionId) -> EngineResult<()> {
        let leg = self
            .store
            .get_transaction(leg_id)
            .await?
            .ok_or(EngineError::TransactionNotFound(leg_id))?;
        if !leg.kind.is_transfer() {
            return Err(EngineError::NotATransfer(leg_id));
        }
        let peer_id = leg
            .transfer_peer_transaction
            .ok_or(EngineError::MissingTransferPeer(leg_id))?;

        // A leg whose counterpart is gone is a half-landed write; the leg is
        // left in place for repair rather than deleted on its own.
        let peer = self
            .store
            .get_transaction(peer_id)
            .await?
            .ok_or_else(|| {
                EngineError::PartialFailure(format!(
                    "transfer leg {leg_id} exists but its counterpart {peer_id} is missing"
                ))
            })?;

        let _guards = self
            .locks
            .acquire_many(&[leg.account_id, peer.account_id])
            .await;

        self.store.delete_pair(leg.id, peer.id).await?;
        self.recomputer.recompute_locked(leg.account_id).await?;
        self.recomputer.recompute_locked(peer.account_id).await?;

        tracing::info!(
            out_leg = %leg.id,
            in_leg = %peer.id,
            "transfer deleted from both accounts"
        );
        Ok(())
    }
}
