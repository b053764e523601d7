//! The posting engine: writes balanced batches for business events.
//!
//! Each recorder plans a `PostingBatch`, ensures its ledgers exist, then
//! writes every line in one atomic batch while holding all involved ledger
//! locks. Either the whole event is on the books or none of it is.

use std::sync::Arc;

use rust_decimal::Decimal;
use tally_core::{Expense, Invoice, LedgerEntry, Payment, PostingBatch, Transaction};
use tally_shared::types::LedgerId;
use tally_store::{EntryDraft, LockRegistry, Store};

use crate::error::{EngineError, EngineResult};
use crate::ledgers::LedgerService;

/// Records business events as double-entry postings.
pub struct PostingEngine<S> {
    store: Arc<S>,
    locks: Arc<LockRegistry<String>>,
    ledgers: LedgerService<S>,
}

impl<S> Clone for PostingEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
            ledgers: self.ledgers.clone(),
        }
    }
}

impl<S: Store> PostingEngine<S> {
    /// Creates the engine. `locks` must be the same registry the ledger
    /// service uses.
    pub fn new(store: Arc<S>, locks: Arc<LockRegistry<String>>, ledgers: LedgerService<S>) -> Self {
        Self {
            store,
            locks,
            ledgers,
        }
    }

    /// Validates and writes one posting batch atomically.
    pub async fn post(&self, batch: PostingBatch) -> EngineResult<Vec<LedgerEntry>> {
        batch.validate()?;

        // Find-or-create each ledger first; ensure_ledger takes the name
        // lock itself, so this happens before the batch locks are held.
        let mut planned = Vec::with_capacity(batch.lines.len());
        for line in &batch.lines {
            let ledger = self
                .ledgers
                .ensure_ledger(&line.ledger_name, line.ledger_kind)
                .await?;
            planned.push((ledger, line));
        }

        let names: Vec<String> = planned.iter().map(|(l, _)| l.name.clone()).collect();
        let _guards = self.locks.acquire_many(&names).await;

        // Continue each ledger's running balance from its last entry,
        // threading it through the batch when a ledger appears twice.
        let mut drafts = Vec::with_capacity(planned.len());
        let mut running: Vec<(LedgerId, Decimal)> = Vec::new();
        for (ledger, line) in planned {
            let previous = match running.iter().find(|(id, _)| *id == ledger.id) {
                Some(&(_, balance)) => balance,
                None => self
                    .store
                    .list_entries(ledger.id)
                    .await?
                    .last()
                    .map_or(Decimal::ZERO, |entry| entry.balance_after),
            };
            let balance_after = previous + ledger.kind.balance_change(line.debit, line.credit);
            running.retain(|(id, _)| *id != ledger.id);
            running.push((ledger.id, balance_after));

            drafts.push(EntryDraft {
                ledger_id: ledger.id,
                date: batch.date,
                description: line.description.clone(),
                debit: line.debit,
                credit: line.credit,
                balance_after,
            });
        }

        let written = self.store.append_batch(drafts).await?;
        tracing::info!(
            lines = written.len(),
            date = %batch.date,
            "posting batch written"
        );
        Ok(written)
    }

    /// Records an issued invoice: debit Accounts Receivable, credit Revenue.
    pub async fn record_invoice(&self, invoice: &Invoice) -> EngineResult<Vec<LedgerEntry>> {
        self.post(PostingBatch::for_invoice(invoice)?).await
    }

    /// Records a payment against an invoice: debit the paying account's
    /// ledger, credit Accounts Receivable.
    pub async fn record_payment(
        &self,
        invoice: &Invoice,
        payment: &Payment,
    ) -> EngineResult<Vec<LedgerEntry>> {
        self.post(PostingBatch::for_payment(invoice, payment)?).await
    }

    /// Records a deposit or withdrawal in the ledgers, counterbalanced
    /// against the Suspense ledger. The account's own ledger is named after
    /// the account.
    pub async fn record_cash_movement(&self, tx: &Transaction) -> EngineResult<Vec<LedgerEntry>> {
        let account = self
            .store
            .get_account(tx.account_id)
            .await?
            .ok_or(EngineError::AccountNotFound(tx.account_id))?;
        let batch = PostingBatch::for_cash_movement(
            &account.name,
            tx.kind,
            tx.amount,
            tx.timestamp.date_naive(),
            &tx.description,
        )?;
        self.post(batch).await
    }

    /// Records an expense: debit the expense-category ledger, credit the
    /// paying account's ledger.
    pub async fn record_expense(&self, expense: &Expense) -> EngineResult<Vec<LedgerEntry>> {
        self.post(PostingBatch::for_expense(expense)?).await
    }
}
