use sea_orm::Database;

use engine::{
    Engine, EngineError, ImportStatementCmd, Money, RawStatementRow, RecordTransactionCmd,
};
use migration::MigratorTrait;

async fn engine_with_db() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build();
    engine.bootstrap().await.unwrap();
    engine
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

async fn seed_main(engine: &Engine, cents: i64) {
    engine
        .record_transaction(
            RecordTransactionCmd::new(
                "CBZ Account One",
                "Opening float",
                chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                "admin",
            )
            .credit(Money::new(cents)),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn tariff_match_takes_precedence_over_transaction_tax() {
    let engine = engine_with_db().await;
    seed_main(&engine, 100_000).await;
    engine.new_tax_rate("VAT", 15.0, "admin").await.unwrap();

    // Recorded tax follows the row's own 5%; the VAT tariff expects 15%.
    let rows = vec![raw_row(
        "2024-03-01",
        "REF00001",
        "VAT on fees",
        "0.00",
        "100.00",
        "5",
        "5.00",
    )];
    engine
        .import_statement(ImportStatementCmd::new(
            "march.csv",
            "CBZ Account One",
            rows,
            "admin",
        ))
        .await
        .unwrap();

    let verification = engine.verify_taxes(None).await.unwrap();
    assert_eq!(verification.checked, 1);
    assert_eq!(verification.discrepancies.len(), 1);

    let discrepancy = &verification.discrepancies[0];
    assert_eq!(discrepancy.expected_tax, Money::new(1_500));
    assert_eq!(discrepancy.tax_diff, Money::new(-1_000));
    assert_eq!(discrepancy.tax_applied, "VAT");
    assert!(discrepancy.reason.contains("Tax mismatch"));
}

#[tokio::test]
async fn correctly_taxed_rows_produce_no_discrepancies() {
    let engine = engine_with_db().await;
    seed_main(&engine, 100_000).await;

    let rows = vec![
        raw_row("2024-03-01", "REF00001", "Bank charges", "0.00", "100.00", "5", "5.00"),
        raw_row("2024-03-02", "REF00002", "Transfer fees", "20.00", "0.00", "0", "0.00"),
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

    let verification = engine.verify_taxes(None).await.unwrap();
    assert_eq!(verification.checked, 2);
    assert!(verification.discrepancies.is_empty());
}

#[tokio::test]
async fn verification_is_idempotent() {
    let engine = engine_with_db().await;
    seed_main(&engine, 100_000).await;
    engine.new_tax_rate("VAT", 15.0, "admin").await.unwrap();

    let rows = vec![
        raw_row("2024-03-01", "REF00001", "VAT on fees", "0.00", "100.00", "5", "5.00"),
        raw_row("2024-03-02", "REF00002", "Charges", "10.00", "0.00", "0", "0.00"),
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

    let first = engine
        .verify_taxes(Some(outcome.statement_id))
        .await
        .unwrap();
    let second = engine
        .verify_taxes(Some(outcome.statement_id))
        .await
        .unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn account_filter_scopes_the_check() {
    let engine = engine_with_db().await;
    seed_main(&engine, 100_000).await;
    engine.new_tax_rate("VAT", 15.0, "admin").await.unwrap();

    let rows = vec![raw_row(
        "2024-03-01",
        "REF00001",
        "VAT on fees",
        "0.00",
        "100.00",
        "0",
        "0.00",
    )];
    let outcome = engine
        .import_statement(ImportStatementCmd::new(
            "march.csv",
            "CBZ Account One",
            rows,
            "admin",
        ))
        .await
        .unwrap();

    let matching = engine
        .reconcile_account(outcome.statement_id, "CBZ Account One")
        .await
        .unwrap();
    assert_eq!(matching.checked, 1);
    assert_eq!(matching.discrepancies.len(), 1);

    let other = engine
        .reconcile_account(outcome.statement_id, "ZB Account Two")
        .await
        .unwrap();
    assert_eq!(other.checked, 0);
    assert!(other.discrepancies.is_empty());
}

#[tokio::test]
async fn latest_statement_is_verified_by_default() {
    let engine = engine_with_db().await;
    seed_main(&engine, 100_000).await;

    engine
        .import_statement(ImportStatementCmd::new(
            "first.csv",
            "CBZ Account One",
            vec![raw_row("2024-03-01", "REF00001", "Fees", "0.00", "10.00", "0", "0.00")],
            "admin",
        ))
        .await
        .unwrap();
    let second = engine
        .import_statement(ImportStatementCmd::new(
            "second.csv",
            "CBZ Account One",
            vec![raw_row("2024-03-02", "REF00002", "Fees", "0.00", "10.00", "0", "0.00")],
            "admin",
        ))
        .await
        .unwrap();

    let verification = engine.verify_taxes(None).await.unwrap();
    assert_eq!(verification.statement.id, second.statement_id);
    assert_eq!(verification.statement.filename, "second.csv");
}

#[tokio::test]
async fn verifying_with_no_statements_is_not_found() {
    let engine = engine_with_db().await;
    let result = engine.verify_taxes(None).await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn first_configured_tariff_wins() {
    let engine = engine_with_db().await;
    seed_main(&engine, 100_000).await;
    engine.new_tax_rate("fees", 10.0, "admin").await.unwrap();
    engine.new_tax_rate("VAT", 15.0, "admin").await.unwrap();

    let rows = vec![raw_row(
        "2024-03-01",
        "REF00001",
        "VAT on fees",
        "0.00",
        "100.00",
        "0",
        "0.00",
    )];
    engine
        .import_statement(ImportStatementCmd::new(
            "march.csv",
            "CBZ Account One",
            rows,
            "admin",
        ))
        .await
        .unwrap();

    let verification = engine.verify_taxes(None).await.unwrap();
    assert_eq!(verification.discrepancies[0].tax_applied, "fees");
    assert_eq!(verification.discrepancies[0].expected_tax, Money::new(1_000));
}
