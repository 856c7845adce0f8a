//! The module contains the errors the engine can raise.
//!
//! Validation errors are detected before any mutation; errors raised inside
//! an atomic unit abort the whole unit. Every variant carries enough context
//! (entity id, breached invariant) for the caller to display or log.
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Allocation mismatch: {0}")]
    AllocationMismatch(String),
    #[error("Invalid row {row} (ref {ref_number}): {reason}")]
    BatchValidation {
        row: usize,
        ref_number: String,
        reason: String,
    },
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("\"{0}\" already present!")]
    IntegrityConflict(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::AllocationMismatch(a), Self::AllocationMismatch(b)) => a == b,
            (
                Self::BatchValidation {
                    row: a_row,
                    ref_number: a_ref,
                    reason: a_reason,
                },
                Self::BatchValidation {
                    row: b_row,
                    ref_number: b_ref,
                    reason: b_reason,
                },
            ) => a_row == b_row && a_ref == b_ref && a_reason == b_reason,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::IntegrityConflict(a), Self::IntegrityConflict(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
