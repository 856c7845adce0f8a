//! Initial schema migration - creates all tables from scratch.
//!
//! It creates the complete schema for the treasury ledger:
//!
//! - `accounts`: the Main treasury account and departmental sub-accounts
//! - `statements`: batches of imported transactions
//! - `transactions`: individual money movements against Main
//! - `allocations`: department splits of a transaction's value
//! - `investments`: fixed-term investment lifecycle records
//! - `tax_rates`: tariff rules matched against transaction narrations

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Accounts {
    Table,
    Id,
    Kind,
    Name,
    Balance,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum Statements {
    Table,
    Id,
    Filename,
    UploadDate,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    RefNumber,
    TransactionDate,
    ValueDate,
    Narration,
    DebitAmount,
    CreditAmount,
    TaxPercentage,
    TaxAmount,
    Kind,
    DebitType,
    CreditType,
    AccountName,
    StatementId,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum Allocations {
    Table,
    Id,
    TreasuryRef,
    DepartmentId,
    Amount,
    Kind,
    StatementId,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum Investments {
    Table,
    Id,
    RefNumber,
    Amount,
    Status,
    DepartmentId,
    AccountName,
    PeriodDays,
    ValueDate,
    InterestRate,
    MaturityDate,
    Interest,
    WithholdingTax,
    MaturityAmount,
    AllocationId,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum TaxRates {
    Table,
    Id,
    Description,
    RatePercent,
    CreatedBy,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Accounts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::Kind).string().not_null())
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(
                        ColumnDef::new(Accounts::Balance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Accounts::CreatedBy).string().not_null())
                    .col(ColumnDef::new(Accounts::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-accounts-name-unique")
                    .table(Accounts::Table)
                    .col(Accounts::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Statements
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Statements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Statements::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Statements::Filename).string().not_null())
                    .col(
                        ColumnDef::new(Statements::UploadDate)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Statements::CreatedBy).string().not_null())
                    .col(
                        ColumnDef::new(Statements::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::RefNumber).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::TransactionDate)
                            .date()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::ValueDate).date().not_null())
                    .col(ColumnDef::new(Transactions::Narration).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::DebitAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::CreditAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::TaxPercentage)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::TaxAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(ColumnDef::new(Transactions::DebitType).string())
                    .col(ColumnDef::new(Transactions::CreditType).string())
                    .col(
                        ColumnDef::new(Transactions::AccountName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::StatementId).string())
                    .col(ColumnDef::new(Transactions::CreatedBy).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-statement_id")
                            .from(Transactions::Table, Transactions::StatementId)
                            .to(Statements::Table, Statements::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-ref_number-unique")
                    .table(Transactions::Table)
                    .col(Transactions::RefNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-statement_id")
                    .table(Transactions::Table)
                    .col(Transactions::StatementId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-transaction_date")
                    .table(Transactions::Table)
                    .col(Transactions::TransactionDate)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Allocations
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Allocations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Allocations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Allocations::TreasuryRef)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Allocations::DepartmentId).string())
                    .col(
                        ColumnDef::new(Allocations::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Allocations::Kind).string().not_null())
                    .col(ColumnDef::new(Allocations::StatementId).string())
                    .col(ColumnDef::new(Allocations::CreatedBy).string().not_null())
                    .col(
                        ColumnDef::new(Allocations::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-allocations-department_id")
                            .from(Allocations::Table, Allocations::DepartmentId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-allocations-treasury_ref")
                    .table(Allocations::Table)
                    .col(Allocations::TreasuryRef)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-allocations-department_id")
                    .table(Allocations::Table)
                    .col(Allocations::DepartmentId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Investments
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Investments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Investments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Investments::RefNumber).string().not_null())
                    .col(
                        ColumnDef::new(Investments::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Investments::Status).string().not_null())
                    .col(ColumnDef::new(Investments::DepartmentId).string())
                    .col(ColumnDef::new(Investments::AccountName).string())
                    .col(ColumnDef::new(Investments::PeriodDays).big_integer())
                    .col(ColumnDef::new(Investments::ValueDate).date())
                    .col(ColumnDef::new(Investments::InterestRate).double())
                    .col(ColumnDef::new(Investments::MaturityDate).date())
                    .col(ColumnDef::new(Investments::Interest).big_integer())
                    .col(ColumnDef::new(Investments::WithholdingTax).big_integer())
                    .col(ColumnDef::new(Investments::MaturityAmount).big_integer())
                    .col(
                        ColumnDef::new(Investments::AllocationId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Investments::CreatedBy).string().not_null())
                    .col(
                        ColumnDef::new(Investments::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-investments-department_id")
                            .from(Investments::Table, Investments::DepartmentId)
                            .to(Accounts::Table, Accounts::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-investments-ref_number-unique")
                    .table(Investments::Table)
                    .col(Investments::RefNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-investments-status")
                    .table(Investments::Table)
                    .col(Investments::Status)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Tax Rates
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(TaxRates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TaxRates::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TaxRates::Description).string().not_null())
                    .col(ColumnDef::new(TaxRates::RatePercent).double().not_null())
                    .col(ColumnDef::new(TaxRates::CreatedBy).string().not_null())
                    .col(ColumnDef::new(TaxRates::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(TaxRates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Investments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Allocations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Statements::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        Ok(())
    }
}
