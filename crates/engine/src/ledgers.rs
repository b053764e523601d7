//! Ledger lifecycle and direct entry appends.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_core::ledger::{replay_entries, EntryDivergence};
use tally_core::{Ledger, LedgerEntry, LedgerError, LedgerKind};
use tally_store::{EntryDraft, LockRegistry, Store, StoreError};

use crate::error::{EngineError, EngineResult};

/// A read-only audit of a ledger's stored running balances.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LedgerAudit {
    /// Entries whose stored `balance_after` disagrees with the fold.
    /// Backdated appends are the usual cause.
    pub divergences: Vec<EntryDivergence>,
    /// The ledger's cached balance.
    pub cached_balance: Decimal,
    /// The closing balance the fold computed.
    pub computed_balance: Decimal,
}

impl LedgerAudit {
    /// Returns true if nothing diverges.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.divergences.is_empty() && self.cached_balance == self.computed_balance
    }
}

/// Manages ledgers and their append-only entries.
///
/// Ledger locks are keyed by canonical name so `ensure_ledger` can serialize
/// creation before an id exists.
pub struct LedgerService<S> {
    store: Arc<S>,
    locks: Arc<LockRegistry<String>>,
}

impl<S> Clone for LedgerService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S: Store> LedgerService<S> {
    /// Creates the service.
    pub fn new(store: Arc<S>, locks: Arc<LockRegistry<String>>) -> Self {
        Self { store, locks }
    }

    /// Finds the ledger with this (canonicalized) name, creating it if
    /// absent. Never duplicates: creation runs under the name lock and a
    /// unique-index conflict resolves by re-reading.
    pub async fn ensure_ledger(&self, name: &str, kind: LedgerKind) -> EngineResult<Ledger> {
        let ledger = Ledger::create(name, kind)?;
        let _guard = self.locks.acquire(&ledger.name).await;

        if let Some(existing) = self.store.find_ledger_by_name(&ledger.name).await? {
            return Ok(existing);
        }
        match self.store.insert_ledger(ledger.clone()).await {
            Ok(created) => {
                tracing::info!(ledger_id = %created.id, name = %created.name, kind = %created.kind, "ledger created");
                Ok(created)
            }
            // Another writer won the race on a different node; take theirs.
            Err(StoreError::Conflict(_)) => self
                .store
                .find_ledger_by_name(&ledger.name)
                .await?
                .ok_or_else(|| {
                    EngineError::Consistency(format!(
                        "ledger '{}' conflicted on insert but cannot be read back",
                        ledger.name
                    ))
                }),
            Err(err) => Err(err.into()),
        }
    }

    /// Loads a ledger by name.
    pub async fn get(&self, name: &str) -> EngineResult<Ledger> {
        self.store
            .find_ledger_by_name(name)
            .await?
            .ok_or_else(|| EngineError::LedgerNotFound(name.to_string()))
    }

    /// Lists all ledgers, name ascending.
    pub async fn list(&self) -> EngineResult<Vec<Ledger>> {
        Ok(self.store.list_ledgers().await?)
    }

    /// Appends one entry to the named ledger, creating the ledger with
    /// `kind` when it does not exist yet.
    ///
    /// Under the ledger lock: the running balance continues from the last
    /// entry in `(date, seq)` order, applying the ledger kind's normal-side
    /// rule. The entry is immutable once written.
    pub async fn append_entry(
        &self,
        ledger_name: &str,
        kind: LedgerKind,
        date: NaiveDate,
        description: &str,
        debit: Decimal,
        credit: Decimal,
    ) -> EngineResult<LedgerEntry> {
        validate_sides(ledger_name, debit, credit)?;

        let ledger = self.ensure_ledger(ledger_name, kind).await?;
        let _guard = self.locks.acquire(&ledger.name).await;

        let entries = self.store.list_entries(ledger.id).await?;
        let previous = entries
            .last()
            .map_or(Decimal::ZERO, |entry| entry.balance_after);
        let balance_after = previous + ledger.kind.balance_change(debit, credit);

        let mut written = self
            .store
            .append_batch(vec![EntryDraft {
                ledger_id: ledger.id,
                date,
                description: description.to_string(),
                debit,
                credit,
                balance_after,
            }])
            .await?;
        written
            .pop()
            .ok_or_else(|| EngineError::Consistency("append batch returned no entry".into()))
    }

    /// Lists a ledger's entries in `(date, seq)` order.
    pub async fn entries(&self, ledger_name: &str) -> EngineResult<Vec<LedgerEntry>> {
        let ledger = self.get(ledger_name).await?;
        Ok(self.store.list_entries(ledger.id).await?)
    }

    /// Replays a ledger's entries without writing and reports every
    /// divergence.
    pub async fn verify(&self, ledger_name: &str) -> EngineResult<LedgerAudit> {
        let ledger = self.get(ledger_name).await?;
        let entries = self.store.list_entries(ledger.id).await?;
        let replayed = replay_entries(ledger.kind, &entries);

        let audit = LedgerAudit {
            divergences: replayed.divergences,
            cached_balance: ledger.balance,
            computed_balance: replayed.closing_balance,
        };
        if !audit.is_consistent() {
            tracing::warn!(
                ledger = %ledger.name,
                divergences = audit.divergences.len(),
                cached = %audit.cached_balance,
                computed = %audit.computed_balance,
                "ledger balances diverge from replay"
            );
        }
        Ok(audit)
    }
}

/// An entry must carry exactly one positive side.
pub(crate) fn validate_sides(
    ledger_name: &str,
    debit: Decimal,
    credit: Decimal,
) -> Result<(), LedgerError> {
    if debit.is_sign_negative() {
        return Err(LedgerError::NegativeAmount(debit));
    }
    if credit.is_sign_negative() {
        return Err(LedgerError::NegativeAmount(credit));
    }
    let one_sided =
        (debit > Decimal::ZERO && credit.is_zero()) || (credit > Decimal::ZERO && debit.is_zero());
    if !one_sided {
        return Err(LedgerError::InvalidLine(ledger_name.to_string()));
    }
    Ok(())
}
