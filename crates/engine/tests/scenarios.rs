//! End-to-end bookkeeping scenarios against the in-memory store.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tally_core::{Expense, Invoice, LedgerKind, Payment, TransactionKind};
use tally_engine::{AppendRequest, Engine, EngineError, TransactionPatch};
use tally_shared::config::AppConfig;
use tally_shared::error::AppError;
use tally_store::{MemoryStore, TransactionDraft, TransactionRepo};
use uuid::Uuid;

fn engine() -> Engine<MemoryStore> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
    Engine::new(Arc::new(MemoryStore::new()), &AppConfig::default())
}

fn deposit(account_id: tally_shared::types::AccountId, amount: Decimal) -> AppendRequest {
    AppendRequest {
        account_id,
        kind: TransactionKind::Deposit,
        amount,
        description: String::new(),
        idempotency_key: None,
    }
}

#[tokio::test]
async fn test_deposit_and_withdrawal_running_balances() {
    let engine = engine();
    let equity = engine.accounts.create("Equity", "001", dec!(1000)).await.unwrap();

    // Opening 1000; deposit 500 reconciles to 1500.
    let tx = engine.transactions.append(deposit(equity.id, dec!(500))).await.unwrap();
    let tx = engine.transactions.get(tx.id).await.unwrap();
    assert_eq!(tx.amount_left, Some(dec!(1500)));
    assert_eq!(
        engine.accounts.get(equity.id).await.unwrap().current_balance,
        dec!(1500)
    );

    // Withdrawal 200 brings it to 1300.
    let tx = engine
        .transactions
        .append(AppendRequest {
            account_id: equity.id,
            kind: TransactionKind::Withdrawal,
            amount: dec!(200),
            description: "supplies".into(),
            idempotency_key: None,
        })
        .await
        .unwrap();
    let tx = engine.transactions.get(tx.id).await.unwrap();
    assert_eq!(tx.amount_left, Some(dec!(1300)));
    assert_eq!(
        engine.accounts.get(equity.id).await.unwrap().current_balance,
        dec!(1300)
    );
}

#[rstest]
#[case::delete_out_leg(true)]
#[case::delete_in_leg(false)]
#[tokio::test]
async fn test_transfer_and_delete_either_side_restores_both(#[case] delete_out: bool) {
    let engine = engine();
    let equity = engine.accounts.create("Equity", "001", dec!(1300)).await.unwrap();
    let cash = engine.accounts.create("Cash", "", dec!(0)).await.unwrap();

    let (out_leg, in_leg) = engine
        .transfers
        .transfer(equity.id, cash.id, dec!(300), "float")
        .await
        .unwrap();

    // Both legs are linked and reconciled.
    let out_leg = engine.transactions.get(out_leg.id).await.unwrap();
    let in_leg = engine.transactions.get(in_leg.id).await.unwrap();
    assert_eq!(out_leg.transfer_peer_transaction, Some(in_leg.id));
    assert_eq!(in_leg.transfer_peer_transaction, Some(out_leg.id));
    assert_eq!(out_leg.amount_left, Some(dec!(1000)));
    assert_eq!(in_leg.amount_left, Some(dec!(300)));
    assert_eq!(
        engine.accounts.get(equity.id).await.unwrap().current_balance,
        dec!(1000)
    );
    assert_eq!(
        engine.accounts.get(cash.id).await.unwrap().current_balance,
        dec!(300)
    );

    // Deleting either leg removes both and restores pre-transfer balances.
    let victim = if delete_out { out_leg.id } else { in_leg.id };
    engine.transfers.delete_transfer(victim).await.unwrap();

    assert!(matches!(
        engine.transactions.get(out_leg.id).await,
        Err(EngineError::TransactionNotFound(_))
    ));
    assert!(matches!(
        engine.transactions.get(in_leg.id).await,
        Err(EngineError::TransactionNotFound(_))
    ));
    assert_eq!(
        engine.accounts.get(equity.id).await.unwrap().current_balance,
        dec!(1300)
    );
    assert_eq!(
        engine.accounts.get(cash.id).await.unwrap().current_balance,
        dec!(0)
    );
}

#[tokio::test]
async fn test_transfer_validation() {
    let engine = engine();
    let a = engine.accounts.create("A", "", dec!(100)).await.unwrap();
    let b = engine.accounts.create("B", "", dec!(0)).await.unwrap();

    assert!(engine.transfers.transfer(a.id, a.id, dec!(10), "").await.is_err());
    assert!(engine.transfers.transfer(a.id, b.id, dec!(0), "").await.is_err());
    assert!(engine.transfers.transfer(a.id, b.id, dec!(-5), "").await.is_err());
    let missing = tally_shared::types::AccountId::new();
    assert!(matches!(
        engine.transfers.transfer(a.id, missing, dec!(10), "").await,
        Err(EngineError::AccountNotFound(_))
    ));
}

#[tokio::test]
async fn test_recompute_is_idempotent() {
    let engine = engine();
    let account = engine.accounts.create("Equity", "001", dec!(1000)).await.unwrap();
    for amount in [dec!(500), dec!(125), dec!(75)] {
        engine.transactions.append(deposit(account.id, amount)).await.unwrap();
    }

    let second = engine.recomputer.recompute(account.id).await.unwrap();
    assert_eq!(second.scanned, 3);
    assert_eq!(second.rewritten, 0, "no intervening writes, nothing stale");
    assert_eq!(second.current_balance, dec!(1700));

    let audit = engine.recomputer.verify(account.id).await.unwrap();
    assert!(audit.is_consistent());
}

#[tokio::test]
async fn test_editing_and_deleting_transactions_recomputes() {
    let engine = engine();
    let account = engine.accounts.create("Cash", "", dec!(100)).await.unwrap();
    let first = engine.transactions.append(deposit(account.id, dec!(50))).await.unwrap();
    let second = engine.transactions.append(deposit(account.id, dec!(20))).await.unwrap();

    engine
        .transactions
        .update(
            first.id,
            TransactionPatch {
                amount: Some(dec!(70)),
                description: None,
            },
        )
        .await
        .unwrap();
    let second_after = engine.transactions.get(second.id).await.unwrap();
    assert_eq!(second_after.amount_left, Some(dec!(190)), "later rows re-fold");

    engine.transactions.delete(first.id).await.unwrap();
    assert_eq!(
        engine.accounts.get(account.id).await.unwrap().current_balance,
        dec!(120)
    );
    assert!(engine.recomputer.verify(account.id).await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_transfer_legs_are_immutable_outside_the_coordinator() {
    let engine = engine();
    let a = engine.accounts.create("A", "", dec!(100)).await.unwrap();
    let b = engine.accounts.create("B", "", dec!(0)).await.unwrap();
    let (out_leg, _) = engine.transfers.transfer(a.id, b.id, dec!(40), "").await.unwrap();

    // Appending transfer kinds directly is rejected.
    let direct = engine
        .transactions
        .append(AppendRequest {
            account_id: a.id,
            kind: TransactionKind::TransferOut,
            amount: dec!(10),
            description: String::new(),
            idempotency_key: None,
        })
        .await;
    assert!(matches!(direct, Err(EngineError::Validation(_))));

    // So are edits and deletes of existing legs.
    let edit = engine
        .transactions
        .update(
            out_leg.id,
            TransactionPatch {
                amount: Some(dec!(99)),
                description: None,
            },
        )
        .await;
    assert!(matches!(edit, Err(EngineError::TransferLegManaged)));
    assert!(matches!(
        engine.transactions.delete(out_leg.id).await,
        Err(EngineError::TransferLegManaged)
    ));
}

#[tokio::test]
async fn test_invoice_posting_balances_both_ledgers() {
    let engine = engine();
    let invoice = Invoice {
        invoice_number: "INV-7".into(),
        client_name: "Acme".into(),
        amount: dec!(200),
        date: Utc::now().date_naive(),
    };
    let entries = engine.postings.record_invoice(&invoice).await.unwrap();

    let (debits, credits): (Decimal, Decimal) = (
        entries.iter().map(|e| e.debit).sum(),
        entries.iter().map(|e| e.credit).sum(),
    );
    assert_eq!(debits, credits);

    let receivable = engine.ledgers.get("Accounts Receivable").await.unwrap();
    assert_eq!(receivable.kind, LedgerKind::Asset);
    assert_eq!(receivable.balance, dec!(200));

    // Income ledgers accumulate credits as positive activity.
    let revenue = engine.ledgers.get("Revenue").await.unwrap();
    assert_eq!(revenue.kind, LedgerKind::Income);
    assert_eq!(revenue.balance, dec!(200));
    let revenue_entries = engine.ledgers.entries("Revenue").await.unwrap();
    assert_eq!(revenue_entries[0].credit, dec!(200));
    assert_eq!(revenue_entries[0].balance_after, dec!(200));
}

#[tokio::test]
async fn test_payment_settles_receivable() {
    let engine = engine();
    let invoice = Invoice {
        invoice_number: "INV-7".into(),
        client_name: "Acme".into(),
        amount: dec!(200),
        date: Utc::now().date_naive(),
    };
    engine.postings.record_invoice(&invoice).await.unwrap();
    engine
        .postings
        .record_payment(
            &invoice,
            &Payment {
                account_name: "Equity Bank".into(),
                amount: dec!(200),
                date: Utc::now().date_naive(),
            },
        )
        .await
        .unwrap();

    assert_eq!(
        engine.ledgers.get("Accounts Receivable").await.unwrap().balance,
        dec!(0)
    );
    assert_eq!(engine.ledgers.get("Equity Bank").await.unwrap().balance, dec!(200));
    assert!(engine.ledgers.verify("Accounts Receivable").await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_cash_movement_posts_against_suspense() {
    let engine = engine();
    let account = engine.accounts.create("Till", "", dec!(0)).await.unwrap();
    let tx = engine.transactions.append(deposit(account.id, dec!(500))).await.unwrap();

    let entries = engine.postings.record_cash_movement(&tx).await.unwrap();
    let (debits, credits): (Decimal, Decimal) = (
        entries.iter().map(|e| e.debit).sum(),
        entries.iter().map(|e| e.credit).sum(),
    );
    assert_eq!(debits, credits);

    assert_eq!(engine.ledgers.get("Till").await.unwrap().balance, dec!(500));
    let suspense = engine.ledgers.get("Suspense").await.unwrap();
    assert_eq!(suspense.kind, LedgerKind::Equity);
    assert_eq!(suspense.balance, dec!(500), "credit-normal counterweight");
}

#[tokio::test]
async fn test_expense_posting() {
    let engine = engine();
    let expense = Expense {
        category: "office supplies".into(),
        account_name: "Cash".into(),
        description: "Printer paper".into(),
        amount: dec!(45),
        date: Utc::now().date_naive(),
    };
    engine.postings.record_expense(&expense).await.unwrap();

    assert_eq!(engine.ledgers.get("Office Supplies").await.unwrap().balance, dec!(45));
    assert_eq!(engine.ledgers.get("Cash").await.unwrap().balance, dec!(-45));
}

#[tokio::test]
async fn test_concurrent_appends_reconcile_to_one_chain() {
    let engine = Arc::new(engine());
    let account = engine.accounts.create("Busy", "", dec!(0)).await.unwrap();

    let appends = (1..=20).map(|i| {
        let engine = Arc::clone(&engine);
        async move {
            engine
                .transactions
                .append(deposit(account.id, Decimal::from(i)))
                .await
                .unwrap();
        }
    });
    join_all(appends).await;

    let expected: Decimal = (1..=20).map(Decimal::from).sum();
    let audit = engine.recomputer.verify(account.id).await.unwrap();
    assert!(audit.is_consistent());
    assert_eq!(audit.computed_balance, expected);
    assert_eq!(
        engine.accounts.get(account.id).await.unwrap().current_balance,
        expected
    );
}

#[tokio::test]
async fn test_concurrent_ensure_ledger_never_duplicates() {
    let engine = Arc::new(engine());

    let calls = (0..16).map(|_| {
        let engine = Arc::clone(&engine);
        async move {
            engine
                .ledgers
                .ensure_ledger("accounts receivable", LedgerKind::Asset)
                .await
                .unwrap()
        }
    });
    let ledgers = join_all(calls).await;

    let first = ledgers[0].id;
    assert!(ledgers.iter().all(|l| l.id == first));
    assert_eq!(engine.ledgers.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_idempotency_key_dedups_retried_append() {
    let engine = engine();
    let account = engine.accounts.create("Cash", "", dec!(0)).await.unwrap();
    let key = Uuid::new_v4();

    let mut request = deposit(account.id, dec!(75));
    request.idempotency_key = Some(key);
    let first = engine.transactions.append(request.clone()).await.unwrap();
    let retried = engine.transactions.append(request).await.unwrap();

    assert_eq!(first.id, retried.id);
    assert_eq!(engine.transactions.list(account.id).await.unwrap().len(), 1);
    assert_eq!(
        engine.accounts.get(account.id).await.unwrap().current_balance,
        dec!(75)
    );
}

#[tokio::test]
async fn test_statement_covers_inclusive_day_bounds() {
    let engine = engine();
    let account = engine.accounts.create("Equity", "001", dec!(1000)).await.unwrap();
    engine.transactions.append(deposit(account.id, dec!(500))).await.unwrap();
    engine
        .transactions
        .append(AppendRequest {
            account_id: account.id,
            kind: TransactionKind::Withdrawal,
            amount: dec!(200),
            description: String::new(),
            idempotency_key: None,
        })
        .await
        .unwrap();

    let today = Utc::now().date_naive();
    let statement = engine.statements.statement(account.id, today, today).await.unwrap();
    assert_eq!(statement.rows.len(), 2, "same-day bounds are inclusive");
    assert_eq!(statement.opening_balance, dec!(1000));
    assert_eq!(statement.closing_balance, dec!(1300));
    assert_eq!(statement.account.current_balance, dec!(1300));

    let empty = engine
        .statements
        .statement(account.id, today.succ_opt().unwrap(), today.succ_opt().unwrap())
        .await
        .unwrap();
    assert!(empty.rows.is_empty());
    assert_eq!(empty.opening_balance, dec!(1300), "window after history");
    assert_eq!(empty.closing_balance, dec!(1300));
}

#[tokio::test]
async fn test_account_deletion_is_forbidden_or_cascades() {
    let engine = engine();
    let a = engine.accounts.create("A", "", dec!(100)).await.unwrap();
    let b = engine.accounts.create("B", "", dec!(0)).await.unwrap();
    engine.transactions.append(deposit(a.id, dec!(10))).await.unwrap();
    engine.transfers.transfer(a.id, b.id, dec!(30), "").await.unwrap();

    // Plain delete refuses while history exists.
    assert!(matches!(
        engine.accounts.delete(a.id).await,
        Err(EngineError::AccountHasTransactions(..))
    ));

    // Cascade removes the history, including the transfer leg on B.
    let removed = engine.accounts.delete_cascade(a.id, &engine.recomputer).await.unwrap();
    assert_eq!(removed, 3, "deposit, out leg, and the peer in leg");
    assert!(matches!(
        engine.accounts.get(a.id).await,
        Err(EngineError::AccountNotFound(_))
    ));
    assert!(engine.transactions.list(b.id).await.unwrap().is_empty());
    assert_eq!(
        engine.accounts.get(b.id).await.unwrap().current_balance,
        dec!(0),
        "B recomputed after losing its in leg"
    );
}

#[tokio::test]
async fn test_backdated_entry_is_surfaced_by_verify() {
    let engine = engine();
    let today = Utc::now().date_naive();
    let last_week = today - chrono::Days::new(7);

    engine
        .ledgers
        .append_entry("Rent", LedgerKind::Expense, today, "april", dec!(100), dec!(0))
        .await
        .unwrap();
    engine
        .ledgers
        .append_entry(
            "Rent",
            LedgerKind::Expense,
            last_week,
            "march, backdated",
            dec!(50),
            dec!(0),
        )
        .await
        .unwrap();

    // The audit trail stays append-only; the replay view reports the drift.
    let audit = engine.ledgers.verify("Rent").await.unwrap();
    assert!(!audit.is_consistent());
    assert_eq!(audit.computed_balance, dec!(150));

    let report = engine.statements.ledger_report("Rent").await.unwrap();
    assert_eq!(report.entries.len(), 2);
    assert_eq!(report.entries[0].description, "march, backdated");
    assert!(!report.audit.is_consistent());
}

#[tokio::test]
async fn test_append_entry_creates_the_ledger() {
    let engine = engine();
    let today = Utc::now().date_naive();

    let entry = engine
        .ledgers
        .append_entry("utilities", LedgerKind::Expense, today, "power bill", dec!(80), dec!(0))
        .await
        .unwrap();
    assert_eq!(entry.balance_after, dec!(80));

    let ledger = engine.ledgers.get("Utilities").await.unwrap();
    assert_eq!(ledger.kind, LedgerKind::Expense);
    assert_eq!(ledger.balance, dec!(80));
}

#[tokio::test]
async fn test_half_landed_transfer_surfaces_partial_failure() {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::new(Arc::clone(&store), &AppConfig::default());
    let a = engine.accounts.create("A", "", dec!(100)).await.unwrap();
    let b = engine.accounts.create("B", "", dec!(0)).await.unwrap();

    // A lone out leg whose counterpart id resolves to nothing, as a crashed
    // paired write would leave behind.
    let ghost = tally_shared::types::TransactionId::new();
    let leg = store
        .insert_transaction(TransactionDraft {
            id: tally_shared::types::TransactionId::new(),
            account_id: a.id,
            kind: TransactionKind::TransferOut,
            amount: dec!(40),
            description: String::new(),
            transfer_peer_account: Some(b.id),
            transfer_peer_transaction: Some(ghost),
            idempotency_key: None,
        })
        .await
        .unwrap();

    let err = engine.transfers.delete_transfer(leg.id).await.unwrap_err();
    assert!(matches!(&err, EngineError::PartialFailure(_)));
    assert_eq!(AppError::from(err).error_code(), "PARTIAL_FAILURE");

    // The leg is kept for repair, not silently dropped.
    assert_eq!(engine.transactions.list(a.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unbalanced_batches_never_reach_the_store() {
    let engine = engine();
    let batch = tally_core::PostingBatch {
        date: Utc::now().date_naive(),
        lines: vec![
            tally_core::PostingLine::debit("X", LedgerKind::Asset, "", dec!(100)),
            tally_core::PostingLine::credit("Y", LedgerKind::Income, "", dec!(60)),
        ],
    };
    assert!(matches!(
        engine.postings.post(batch).await,
        Err(EngineError::Validation(_))
    ));
    assert!(engine.ledgers.list().await.unwrap().is_empty(), "nothing was created");
}

#[tokio::test]
async fn test_engine_errors_map_to_app_error_codes() {
    let engine = engine();
    let missing = tally_shared::types::AccountId::new();
    let err = engine.recomputer.recompute(missing).await.unwrap_err();
    assert_eq!(AppError::from(err).error_code(), "NOT_FOUND");

    let err = engine.accounts.create("", "", dec!(0)).await.unwrap_err();
    assert_eq!(AppError::from(err).error_code(), "INVALID_ARGUMENT");
}
