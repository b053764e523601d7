//! Double-entry posting batches for business events.
//!
//! A business event (invoice issued, payment received, cash moved, expense
//! paid) becomes one `PostingBatch`: a set of debit/credit lines across two
//! or more ledgers whose debits and credits sum to the same total. The batch
//! is planned here, validated here, and written atomically by the posting
//! engine.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::ledger::LedgerKind;
use crate::transaction::{validate_amount, TransactionKind};

/// Ledger that accumulates amounts owed by clients.
pub const ACCOUNTS_RECEIVABLE: &str = "Accounts Receivable";
/// Ledger that accumulates earned revenue.
pub const REVENUE: &str = "Revenue";
/// Counterbalance ledger for cash movements with no categorized source.
pub const SUSPENSE: &str = "Suspense";

/// An invoice issued to a client. Invoice lifecycle (status, reminders) is
/// the caller's business; the engine only posts its financial effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Human-facing invoice number, e.g. "INV-0042".
    pub invoice_number: String,
    /// The invoiced client's display name.
    pub client_name: String,
    /// Invoiced amount.
    pub amount: Decimal,
    /// Invoice date.
    pub date: NaiveDate,
}

/// A payment received against an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Name of the bank/cash account the money landed on.
    pub account_name: String,
    /// Amount paid.
    pub amount: Decimal,
    /// Payment date.
    pub date: NaiveDate,
}

/// An expense paid from a bank/cash account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    /// Expense category, becomes the expense ledger's name.
    pub category: String,
    /// Name of the paying account.
    pub account_name: String,
    /// What was paid for.
    pub description: String,
    /// Amount spent.
    pub amount: Decimal,
    /// Expense date.
    pub date: NaiveDate,
}

/// One debit-or-credit line of a posting batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingLine {
    /// Target ledger name (canonicalized by the ledger service).
    pub ledger_name: String,
    /// Kind used if the ledger has to be created.
    pub ledger_kind: LedgerKind,
    /// Line description.
    pub description: String,
    /// Debit amount (0 for credit lines).
    pub debit: Decimal,
    /// Credit amount (0 for debit lines).
    pub credit: Decimal,
}

impl PostingLine {
    /// A debit line.
    #[must_use]
    pub fn debit(
        ledger_name: impl Into<String>,
        ledger_kind: LedgerKind,
        description: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            ledger_name: ledger_name.into(),
            ledger_kind,
            description: description.into(),
            debit: amount,
            credit: Decimal::ZERO,
        }
    }

    /// A credit line.
    #[must_use]
    pub fn credit(
        ledger_name: impl Into<String>,
        ledger_kind: LedgerKind,
        description: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            ledger_name: ledger_name.into(),
            ledger_kind,
            description: description.into(),
            debit: Decimal::ZERO,
            credit: amount,
        }
    }
}

/// A balanced set of ledger lines for one business event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingBatch {
    /// Business date shared by every line.
    pub date: NaiveDate,
    /// The debit/credit lines.
    pub lines: Vec<PostingLine>,
}

impl PostingBatch {
    /// Sums of (debit, credit) across all lines.
    #[must_use]
    pub fn totals(&self) -> (Decimal, Decimal) {
        let debit = self.lines.iter().map(|l| l.debit).sum();
        let credit = self.lines.iter().map(|l| l.credit).sum();
        (debit, credit)
    }

    /// Validates the double-entry law for this batch.
    ///
    /// # Errors
    ///
    /// - `InsufficientLines` for fewer than two lines
    /// - `InvalidLine` if a line has both sides set, neither side set, or a
    ///   negative side
    /// - `UnbalancedBatch` if total debits differ from total credits
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.lines.len() < 2 {
            return Err(LedgerError::InsufficientLines);
        }

        for line in &self.lines {
            let one_sided = (line.debit > Decimal::ZERO && line.credit.is_zero())
                || (line.credit > Decimal::ZERO && line.debit.is_zero());
            if !one_sided {
                return Err(LedgerError::InvalidLine(line.ledger_name.clone()));
            }
        }

        let (debit, credit) = self.totals();
        if debit != credit {
            return Err(LedgerError::UnbalancedBatch { debit, credit });
        }
        Ok(())
    }

    /// Plans the postings for an issued invoice: debit Accounts Receivable,
    /// credit Revenue.
    ///
    /// # Errors
    ///
    /// Rejects non-positive amounts.
    pub fn for_invoice(invoice: &Invoice) -> Result<Self, LedgerError> {
        validate_amount(invoice.amount)?;
        Ok(Self {
            date: invoice.date,
            lines: vec![
                PostingLine::debit(
                    ACCOUNTS_RECEIVABLE,
                    LedgerKind::Asset,
                    format!("Invoice {} - {}", invoice.invoice_number, invoice.client_name),
                    invoice.amount,
                ),
                PostingLine::credit(
                    REVENUE,
                    LedgerKind::Income,
                    format!("Invoice {}", invoice.invoice_number),
                    invoice.amount,
                ),
            ],
        })
    }

    /// Plans the postings for a payment against an invoice: debit the paying
    /// account's ledger, credit Accounts Receivable.
    ///
    /// # Errors
    ///
    /// Rejects non-positive amounts and blank account names.
    pub fn for_payment(invoice: &Invoice, payment: &Payment) -> Result<Self, LedgerError> {
        validate_amount(payment.amount)?;
        if payment.account_name.trim().is_empty() {
            return Err(LedgerError::BlankName);
        }
        Ok(Self {
            date: payment.date,
            lines: vec![
                PostingLine::debit(
                    payment.account_name.clone(),
                    LedgerKind::Asset,
                    format!("Payment for {}", invoice.invoice_number),
                    payment.amount,
                ),
                PostingLine::credit(
                    ACCOUNTS_RECEIVABLE,
                    LedgerKind::Asset,
                    format!("Payment applied to {}", invoice.invoice_number),
                    payment.amount,
                ),
            ],
        })
    }

    /// Plans the postings for a bank/cash movement: the account's own ledger
    /// takes the debit (deposit) or credit (withdrawal), counterbalanced
    /// against the Suspense ledger.
    ///
    /// # Errors
    ///
    /// Rejects non-positive amounts, blank account names, and transfer kinds
    /// (transfers move money between accounts, not through the ledgers).
    pub fn for_cash_movement(
        account_name: &str,
        kind: TransactionKind,
        amount: Decimal,
        date: NaiveDate,
        description: &str,
    ) -> Result<Self, LedgerError> {
        validate_amount(amount)?;
        if account_name.trim().is_empty() {
            return Err(LedgerError::BlankName);
        }
        let description = if description.is_empty() {
            kind.to_string()
        } else {
            description.to_string()
        };

        let (account_line, suspense_line) = match kind {
            TransactionKind::Deposit => (
                PostingLine::debit(account_name, LedgerKind::Asset, description.clone(), amount),
                PostingLine::credit(SUSPENSE, LedgerKind::Equity, description, amount),
            ),
            TransactionKind::Withdrawal => (
                PostingLine::credit(account_name, LedgerKind::Asset, description.clone(), amount),
                PostingLine::debit(SUSPENSE, LedgerKind::Equity, description, amount),
            ),
            TransactionKind::TransferOut | TransactionKind::TransferIn => {
                return Err(LedgerError::UnsupportedCashMovement(kind));
            }
        };

        Ok(Self {
            date,
            lines: vec![account_line, suspense_line],
        })
    }

    /// Plans the postings for an expense: debit the expense-category ledger,
    /// credit the paying account's ledger.
    ///
    /// # Errors
    ///
    /// Rejects non-positive amounts and blank category/account names.
    pub fn for_expense(expense: &Expense) -> Result<Self, LedgerError> {
        validate_amount(expense.amount)?;
        if expense.category.trim().is_empty() || expense.account_name.trim().is_empty() {
            return Err(LedgerError::BlankName);
        }
        Ok(Self {
            date: expense.date,
            lines: vec![
                PostingLine::debit(
                    expense.category.clone(),
                    LedgerKind::Expense,
                    expense.description.clone(),
                    expense.amount,
                ),
                PostingLine::credit(
                    expense.account_name.clone(),
                    LedgerKind::Asset,
                    expense.description.clone(),
                    expense.amount,
                ),
            ],
        })
    }
}
