//! Reconciled reads: account statements and ledger reports.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_core::{Account, Ledger, LedgerEntry, Transaction};
use tally_shared::types::AccountId;
use tally_store::Store;

use crate::error::{EngineError, EngineResult};
use crate::ledgers::{LedgerAudit, LedgerService};
use crate::recompute::BalanceRecomputer;
use crate::transactions::TransactionLog;

/// An account statement over an inclusive date window.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Statement {
    /// The account, with its reconciled `current_balance`.
    pub account: Account,
    /// Window start (inclusive).
    pub from: NaiveDate,
    /// Window end (inclusive).
    pub to: NaiveDate,
    /// Balance going into the window.
    pub opening_balance: Decimal,
    /// Balance after the window's last row.
    pub closing_balance: Decimal,
    /// In-window rows, oldest first, each with a reconciled `amount_left`.
    pub rows: Vec<Transaction>,
}

/// A ledger's ordered entries plus its audit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LedgerReport {
    /// The ledger.
    pub ledger: Ledger,
    /// All entries in `(date, seq)` order.
    pub entries: Vec<LedgerEntry>,
    /// Replay audit; divergences indicate backdated appends.
    pub audit: LedgerAudit,
}

/// Builds statements and reports.
pub struct StatementService<S> {
    store: Arc<S>,
    recomputer: BalanceRecomputer<S>,
    transactions: TransactionLog<S>,
    ledgers: LedgerService<S>,
}

impl<S> Clone for StatementService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            recomputer: self.recomputer.clone(),
            transactions: self.transactions.clone(),
            ledgers: self.ledgers.clone(),
        }
    }
}

impl<S: Store> StatementService<S> {
    /// Creates the service.
    pub fn new(
        store: Arc<S>,
        recomputer: BalanceRecomputer<S>,
        transactions: TransactionLog<S>,
        ledgers: LedgerService<S>,
    ) -> Self {
        Self {
            store,
            recomputer,
            transactions,
            ledgers,
        }
    }

    /// Builds the statement for `[from, to]`, both days inclusive.
    ///
    /// Recomputes the account first, so every returned row carries a
    /// reconciled running balance.
    pub async fn statement(
        &self,
        account_id: AccountId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Statement> {
        self.recomputer.recompute(account_id).await?;
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(EngineError::AccountNotFound(account_id))?;

        // Opening balance = the running balance of the last row before the
        // window, or the account's opening balance if the window covers the
        // whole history.
        let all = self.store.list_by_account(account_id).await?;
        let window_start = from;
        let opening_balance = all
            .iter()
            .take_while(|tx| tx.timestamp.date_naive() < window_start)
            .last()
            .and_then(|tx| tx.amount_left)
            .unwrap_or(account.opening_balance);

        let rows = self.transactions.list_between(account_id, from, to).await?;
        let closing_balance = rows
            .last()
            .and_then(|tx| tx.amount_left)
            .unwrap_or(opening_balance);

        Ok(Statement {
            account,
            from,
            to,
            opening_balance,
            closing_balance,
            rows,
        })
    }

    /// Builds a ledger report: verify, then the ordered entries.
    pub async fn ledger_report(&self, ledger_name: &str) -> EngineResult<LedgerReport> {
        let audit = self.ledgers.verify(ledger_name).await?;
        let ledger = self.ledgers.get(ledger_name).await?;
        let entries = self.ledgers.entries(ledger_name).await?;
        Ok(LedgerReport {
            ledger,
            entries,
            audit,
        })
    }
}
