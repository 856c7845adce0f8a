//! Treasury ledger and allocation engine.
//!
//! Tracks money flowing from a single Main treasury account into
//! departmental sub-accounts and fixed-term investments, preserving
//! conservation-of-funds invariants across every mutation. All multi-row
//! mutations run inside one database transaction; callers get fully
//! materialized results or a typed [`EngineError`].

pub use accounts::{Account, AccountKind};
pub use allocations::Allocation;
pub use commands::{
    ConfirmInvestmentCmd, DepartmentInvestmentCmd, ImportStatementCmd, RecordTransactionCmd,
    SplitAllocationCmd,
};
pub use error::EngineError;
pub use investments::{
    DealNote, Investment, InvestmentStatus, MaturityTerms, WITHHOLDING_TAX_RATE,
};
pub use money::Money;
pub use ops::{
    ActiveInvestment, Discrepancy, Engine, EngineBuilder, ImportOutcome, PendingAllocation,
    TaxVerification, discrepancy_report_csv,
};
pub use statements::{
    RawStatementRow, Statement, StatementExportRow, StatementRow, read_statement_rows,
    statement_template, write_statement_csv,
};
pub use tax_rates::TaxRate;
pub use transactions::{CreditType, DebitType, Transaction, TransactionKind};

mod accounts;
mod allocations;
mod commands;
mod error;
mod investments;
mod money;
mod ops;
mod statements;
mod tax_rates;
mod transactions;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
