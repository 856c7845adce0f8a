use chrono::NaiveDate;
use sea_orm::Database;

use engine::{
    Engine, EngineError, ImportStatementCmd, Money, RawStatementRow, RecordTransactionCmd,
    SplitAllocationCmd, TransactionKind,
};
use migration::MigratorTrait;

async fn engine_with_db() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build();
    engine.bootstrap().await.unwrap();
    engine
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn treasury_id(engine: &Engine) -> uuid::Uuid {
    engine.department_by_name("Treasury").await.unwrap().id
}

/// Seeds the Main account through a credit transaction.
async fn seed_main(engine: &Engine, cents: i64) -> Money {
    engine
        .record_transaction(
            RecordTransactionCmd::new("CBZ Account One", "Opening float", date(2024, 1, 1), "admin")
                .credit(Money::new(cents)),
        )
        .await
        .unwrap()
}

fn raw_row(
    tx_date: &str,
    ref_number: &str,
    narration: &str,
    debit: &str,
    credit: &str,
    tax_pct: &str,
    tax: &str,
) -> RawStatementRow {
    RawStatementRow {
        transaction_date: tx_date.to_string(),
        value_date: tx_date.to_string(),
        narration: narration.to_string(),
        ref_number: ref_number.to_string(),
        debit_amount: debit.to_string(),
        credit_amount: credit.to_string(),
        tax_percentage: tax_pct.to_string(),
        tax_amount: tax.to_string(),
    }
}

#[tokio::test]
async fn bootstrap_creates_main_and_treasury_once() {
    let engine = engine_with_db().await;
    engine.bootstrap().await.unwrap();

    let main = engine.main_account().await.unwrap();
    assert_eq!(main.balance, Money::ZERO);

    let departments = engine.departments().await.unwrap();
    assert_eq!(departments.len(), 1);
    assert_eq!(departments[0].name, "Treasury");
}

#[tokio::test]
async fn credit_recording_conserves_main_balance() {
    let engine = engine_with_db().await;

    let balance = engine
        .record_transaction(
            RecordTransactionCmd::new("CBZ Account One", "Grant receipt", date(2024, 2, 1), "admin")
                .credit(Money::new(100_000))
                .tax_percentage(5.0),
        )
        .await
        .unwrap();

    // net = 1000.00 - 50.00 tax
    assert_eq!(balance, Money::new(95_000));
    assert_eq!(engine.main_account().await.unwrap().balance, Money::new(95_000));

    let pending = engine.pending_allocations().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].allocation.amount, Money::new(95_000));
    assert_eq!(pending[0].allocation.kind, TransactionKind::Credit);
    assert_eq!(pending[0].transaction.tax_amount, Money::new(5_000));
}

#[tokio::test]
async fn debit_recording_applies_debit_plus_tax() {
    let engine = engine_with_db().await;
    seed_main(&engine, 100_000).await;

    let balance = engine
        .record_transaction(
            RecordTransactionCmd::new("CBZ Account One", "Supplier payment", date(2024, 2, 2), "admin")
                .debit(Money::new(20_000))
                .tax_percentage(10.0),
        )
        .await
        .unwrap();

    // 1000.00 - (200.00 + 20.00)
    assert_eq!(balance, Money::new(78_000));
}

#[tokio::test]
async fn rejects_two_sided_and_empty_movements() {
    let engine = engine_with_db().await;

    let both = engine
        .record_transaction(
            RecordTransactionCmd::new("CBZ Account One", "Broken", date(2024, 2, 2), "admin")
                .debit(Money::new(100))
                .credit(Money::new(100)),
        )
        .await;
    assert!(matches!(both, Err(EngineError::InvalidAmount(_))));

    let neither = engine
        .record_transaction(RecordTransactionCmd::new(
            "CBZ Account One",
            "Broken",
            date(2024, 2, 2),
            "admin",
        ))
        .await;
    assert!(matches!(neither, Err(EngineError::InvalidAmount(_))));
}

#[tokio::test]
async fn insufficient_main_funds_leaves_ledger_untouched() {
    let engine = engine_with_db().await;

    let result = engine
        .record_transaction(
            RecordTransactionCmd::new("CBZ Account One", "Overdraw", date(2024, 2, 3), "admin")
                .debit(Money::new(10_000)),
        )
        .await;
    assert!(matches!(result, Err(EngineError::InsufficientFunds(_))));

    assert_eq!(engine.main_account().await.unwrap().balance, Money::ZERO);
    assert!(engine.recent_transactions(10).await.unwrap().is_empty());
    assert!(engine.pending_allocations().await.unwrap().is_empty());
}

#[tokio::test]
async fn split_allocation_distributes_and_consumes_the_pending_row() {
    let engine = engine_with_db().await;
    seed_main(&engine, 100_000).await;
    let treasury = treasury_id(&engine).await;
    let operations = engine.new_department("Operations", "admin").await.unwrap();

    let pending = engine.pending_allocations().await.unwrap();
    let allocation = &pending[0].allocation;

    engine
        .split_allocation(
            SplitAllocationCmd::new(allocation.id, "admin")
                .share(treasury, Money::new(60_000))
                .share(operations, Money::new(40_000)),
        )
        .await
        .unwrap();

    assert!(engine.pending_allocations().await.unwrap().is_empty());
    assert_eq!(
        engine.department(treasury).await.unwrap().balance,
        Money::new(60_000)
    );
    assert_eq!(
        engine.department(operations).await.unwrap().balance,
        Money::new(40_000)
    );

    let booked = engine.department_allocations(treasury).await.unwrap();
    assert_eq!(booked.len(), 1);
    assert_eq!(booked[0].amount, Money::new(60_000));
    assert_eq!(booked[0].treasury_ref, allocation.treasury_ref);
}

#[tokio::test]
async fn split_must_sum_to_the_allocation_amount() {
    let engine = engine_with_db().await;
    seed_main(&engine, 100_000).await;
    let treasury = treasury_id(&engine).await;

    let pending = engine.pending_allocations().await.unwrap();
    let allocation_id = pending[0].allocation.id;

    let result = engine
        .split_allocation(
            SplitAllocationCmd::new(allocation_id, "admin").share(treasury, Money::new(50_000)),
        )
        .await;
    assert!(matches!(result, Err(EngineError::AllocationMismatch(_))));

    // Nothing moved; the pending row is still there.
    assert_eq!(engine.department(treasury).await.unwrap().balance, Money::ZERO);
    assert_eq!(engine.pending_allocations().await.unwrap().len(), 1);
}

#[tokio::test]
async fn consumed_allocation_cannot_be_split_twice() {
    let engine = engine_with_db().await;
    seed_main(&engine, 100_000).await;
    let treasury = treasury_id(&engine).await;

    let pending = engine.pending_allocations().await.unwrap();
    let allocation_id = pending[0].allocation.id;

    engine
        .split_allocation(
            SplitAllocationCmd::new(allocation_id, "admin").share(treasury, Money::new(100_000)),
        )
        .await
        .unwrap();

    let second = engine
        .split_allocation(
            SplitAllocationCmd::new(allocation_id, "admin").share(treasury, Money::new(100_000)),
        )
        .await;
    assert!(matches!(second, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn debit_split_checks_every_department_before_mutating() {
    let engine = engine_with_db().await;
    seed_main(&engine, 100_000).await;
    let treasury = treasury_id(&engine).await;
    let operations = engine.new_department("Operations", "admin").await.unwrap();

    // Fund Treasury only.
    let pending = engine.pending_allocations().await.unwrap();
    engine
        .split_allocation(
            SplitAllocationCmd::new(pending[0].allocation.id, "admin")
                .share(treasury, Money::new(100_000)),
        )
        .await
        .unwrap();

    // A debit to split across both departments; Operations cannot cover its
    // share.
    engine
        .record_transaction(
            RecordTransactionCmd::new("CBZ Account One", "Joint cost", date(2024, 3, 1), "admin")
                .debit(Money::new(40_000)),
        )
        .await
        .unwrap();
    let pending = engine.pending_allocations().await.unwrap();
    let debit_allocation = pending[0].allocation.id;

    let result = engine
        .split_allocation(
            SplitAllocationCmd::new(debit_allocation, "admin")
                .share(treasury, Money::new(30_000))
                .share(operations, Money::new(10_000)),
        )
        .await;
    assert!(matches!(result, Err(EngineError::InsufficientFunds(_))));

    // All-or-nothing: Treasury was not debited either.
    assert_eq!(
        engine.department(treasury).await.unwrap().balance,
        Money::new(100_000)
    );
    assert_eq!(
        engine.department(operations).await.unwrap().balance,
        Money::ZERO
    );
    assert_eq!(engine.pending_allocations().await.unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_department_name_is_a_conflict() {
    let engine = engine_with_db().await;
    let result = engine.new_department("Treasury", "admin").await;
    assert!(matches!(result, Err(EngineError::IntegrityConflict(_))));
}

#[tokio::test]
async fn import_rejects_invalid_rows_without_writing() {
    let engine = engine_with_db().await;
    seed_main(&engine, 100_000).await;
    let before = engine.main_account().await.unwrap().balance;

    let rows = vec![
        raw_row("2024-03-01", "REF00001", "Fees", "0.00", "100.00", "0", "0.00"),
        raw_row("03/02/2024", "REF00002", "Fees", "0.00", "50.00", "0", "0.00"),
    ];
    let result = engine
        .import_statement(ImportStatementCmd::new(
            "march.csv",
            "CBZ Account One",
            rows,
            "admin",
        ))
        .await;

    match result {
        Err(EngineError::BatchValidation {
            row, ref_number, ..
        }) => {
            assert_eq!(row, 2);
            assert_eq!(ref_number, "REF00002");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    // Batch atomicity: no statement, no transactions, no allocations, no
    // balance change.
    assert!(engine.statements().await.unwrap().is_empty());
    assert_eq!(engine.recent_transactions(10).await.unwrap().len(), 1);
    assert_eq!(engine.pending_allocations().await.unwrap().len(), 1);
    assert_eq!(engine.main_account().await.unwrap().balance, before);
}

#[tokio::test]
async fn import_rejects_duplicate_refs_in_the_batch() {
    let engine = engine_with_db().await;

    let rows = vec![
        raw_row("2024-03-01", "REF00001", "Fees", "0.00", "100.00", "0", "0.00"),
        raw_row("2024-03-02", "REF00001", "Fees", "0.00", "50.00", "0", "0.00"),
    ];
    let result = engine
        .import_statement(ImportStatementCmd::new(
            "march.csv",
            "CBZ Account One",
            rows,
            "admin",
        ))
        .await;
    assert!(matches!(
        result,
        Err(EngineError::BatchValidation { row: 2, .. })
    ));
}

#[tokio::test]
async fn import_precheck_covers_the_whole_batch_balance() {
    let engine = engine_with_db().await;
    seed_main(&engine, 10_000).await;

    // Credit 50.00 then debit 200.00 + 10.00 tax: net -160.00 on a 100.00
    // balance.
    let rows = vec![
        raw_row("2024-03-01", "REF00001", "Receipt", "0.00", "50.00", "0", "0.00"),
        raw_row("2024-03-02", "REF00002", "Payment", "200.00", "0.00", "5", "10.00"),
    ];
    let result = engine
        .import_statement(ImportStatementCmd::new(
            "march.csv",
            "CBZ Account One",
            rows,
            "admin",
        ))
        .await;
    assert!(matches!(result, Err(EngineError::InsufficientFunds(_))));
    assert!(engine.statements().await.unwrap().is_empty());
    assert_eq!(engine.main_account().await.unwrap().balance, Money::new(10_000));
}

#[tokio::test]
async fn import_commits_statement_transactions_and_allocations_together() {
    let engine = engine_with_db().await;
    seed_main(&engine, 50_000).await;

    let rows = vec![
        raw_row("2024-03-01", "REF00001", "Receipt", "0.00", "100.00", "5", "5.00"),
        raw_row("2024-03-02", "REF00002", "Payment", "40.00", "0.00", "0", "0.00"),
    ];
    let outcome = engine
        .import_statement(ImportStatementCmd::new(
            "march.csv",
            "CBZ Account One",
            rows,
            "admin",
        ))
        .await
        .unwrap();

    assert_eq!(outcome.imported, 2);
    // 500.00 + (100.00 - 5.00) - 40.00
    assert_eq!(outcome.main_balance, Money::new(55_500));

    let statements = engine.statements().await.unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].id, outcome.statement_id);
    assert_eq!(statements[0].filename, "march.csv");

    // Seed allocation plus the two imported ones.
    let pending = engine.pending_allocations().await.unwrap();
    assert_eq!(pending.len(), 3);
    let imported: Vec<_> = pending
        .iter()
        .filter(|entry| entry.allocation.statement_id.is_some())
        .collect();
    assert_eq!(imported.len(), 2);
    // Credit allocations carry the net amount.
    assert!(
        imported
            .iter()
            .any(|entry| entry.allocation.amount == Money::new(9_500))
    );
    assert!(
        imported
            .iter()
            .any(|entry| entry.allocation.amount == Money::new(4_000))
    );
}

#[tokio::test]
async fn import_accepts_a_debit_covered_later_in_the_batch() {
    let engine = engine_with_db().await;

    // The debit row comes first but the batch as a whole is a net credit.
    let rows = vec![
        raw_row("2024-03-01", "REF00001", "Payment", "60.00", "0.00", "0", "0.00"),
        raw_row("2024-03-02", "REF00002", "Receipt", "0.00", "100.00", "0", "0.00"),
    ];
    let outcome = engine
        .import_statement(ImportStatementCmd::new(
            "march.csv",
            "CBZ Account One",
            rows,
            "admin",
        ))
        .await
        .unwrap();
    assert_eq!(outcome.main_balance, Money::new(4_000));
}

#[tokio::test]
async fn import_conflicts_with_existing_ref_numbers_roll_back() {
    let engine = engine_with_db().await;
    seed_main(&engine, 50_000).await;

    let rows = vec![raw_row(
        "2024-03-01",
        "REF00001",
        "Receipt",
        "0.00",
        "100.00",
        "0",
        "0.00",
    )];
    engine
        .import_statement(ImportStatementCmd::new(
            "first.csv",
            "CBZ Account One",
            rows.clone(),
            "admin",
        ))
        .await
        .unwrap();
    let balance_after_first = engine.main_account().await.unwrap().balance;

    let result = engine
        .import_statement(ImportStatementCmd::new(
            "second.csv",
            "CBZ Account One",
            rows,
            "admin",
        ))
        .await;
    assert!(matches!(result, Err(EngineError::IntegrityConflict(_))));

    assert_eq!(engine.statements().await.unwrap().len(), 1);
    assert_eq!(
        engine.main_account().await.unwrap().balance,
        balance_after_first
    );
}

#[tokio::test]
async fn statement_export_filters_and_sorts_by_date() {
    let engine = engine_with_db().await;
    seed_main(&engine, 50_000).await;

    let rows = vec![
        raw_row("2024-03-05", "REF00002", "Later", "0.00", "20.00", "0", "0.00"),
        raw_row("2024-03-01", "REF00001", "Earlier", "0.00", "10.00", "0", "0.00"),
        raw_row("2024-04-01", "REF00003", "Out of range", "0.00", "30.00", "0", "0.00"),
    ];
    engine
        .import_statement(ImportStatementCmd::new(
            "march.csv",
            "CBZ Account One",
            rows,
            "admin",
        ))
        .await
        .unwrap();

    let exported = engine
        .statement_export_rows(date(2024, 3, 1), date(2024, 3, 31))
        .await
        .unwrap();
    assert_eq!(exported.len(), 2);
    assert_eq!(exported[0].ref_number, "REF00001");
    assert_eq!(exported[1].ref_number, "REF00002");
    assert_eq!(exported[0].account_name, "CBZ Account One");

    let csv = engine
        .export_statement_csv(date(2024, 3, 1), date(2024, 3, 31))
        .await
        .unwrap();
    assert!(csv.starts_with(
        "transaction_date,value_date,narration,ref_number,debit_amount,credit_amount,tax_percentage,tax_amount,account_name"
    ));
}
