use sea_orm::{DatabaseConnection, DbErr, SqlErr};

use crate::EngineError;

mod accounts;
mod allocations;
mod investments;
mod reconciliation;
mod statements;
mod transactions;

pub use allocations::PendingAllocation;
pub use investments::ActiveInvestment;
pub use reconciliation::{Discrepancy, TaxVerification, discrepancy_report_csv};
pub use statements::ImportOutcome;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Maps a unique-key violation to `IntegrityConflict`, leaving every other
/// database failure untouched.
fn map_unique(err: DbErr, what: &str) -> EngineError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            EngineError::IntegrityConflict(what.to_string())
        }
        _ => EngineError::Database(err),
    }
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub fn build(self) -> Engine {
        Engine {
            database: self.database,
        }
    }
}
