//! Command structs for engine operations.
//!
//! These types group parameters for write operations (record/import/
//! allocate/confirm), keeping call sites readable and avoiding long argument
//! lists.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{Money, RawStatementRow};

/// Record a single money movement against the Main account.
#[derive(Clone, Debug)]
pub struct RecordTransactionCmd {
    pub transaction_date: NaiveDate,
    pub value_date: Option<NaiveDate>,
    pub narration: String,
    pub account_name: String,
    pub debit_amount: Money,
    pub credit_amount: Money,
    pub tax_percentage: f64,
    pub investment: bool,
    pub created_by: String,
}

impl RecordTransactionCmd {
    #[must_use]
    pub fn new(
        account_name: impl Into<String>,
        narration: impl Into<String>,
        transaction_date: NaiveDate,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            transaction_date,
            value_date: None,
            narration: narration.into(),
            account_name: account_name.into(),
            debit_amount: Money::ZERO,
            credit_amount: Money::ZERO,
            tax_percentage: 0.0,
            investment: false,
            created_by: created_by.into(),
        }
    }

    #[must_use]
    pub fn debit(mut self, amount: Money) -> Self {
        self.debit_amount = amount;
        self
    }

    #[must_use]
    pub fn credit(mut self, amount: Money) -> Self {
        self.credit_amount = amount;
        self
    }

    #[must_use]
    pub fn tax_percentage(mut self, tax_percentage: f64) -> Self {
        self.tax_percentage = tax_percentage;
        self
    }

    #[must_use]
    pub fn value_date(mut self, value_date: NaiveDate) -> Self {
        self.value_date = Some(value_date);
        self
    }

    /// Tags the transaction as an investment movement, creating a pending
    /// investment alongside the allocation.
    #[must_use]
    pub fn investment(mut self) -> Self {
        self.investment = true;
        self
    }
}

/// Import a validated-as-a-whole batch of transactions as one statement.
#[derive(Clone, Debug)]
pub struct ImportStatementCmd {
    pub filename: String,
    pub account_name: String,
    pub rows: Vec<RawStatementRow>,
    pub created_by: String,
}

impl ImportStatementCmd {
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        account_name: impl Into<String>,
        rows: Vec<RawStatementRow>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            account_name: account_name.into(),
            rows,
            created_by: created_by.into(),
        }
    }
}

/// Split a pending allocation across departments.
#[derive(Clone, Debug)]
pub struct SplitAllocationCmd {
    pub allocation_id: Uuid,
    /// Proposed amount per department. Zero-amount shares are ignored.
    pub shares: Vec<(Uuid, Money)>,
    pub created_by: String,
}

impl SplitAllocationCmd {
    #[must_use]
    pub fn new(allocation_id: Uuid, created_by: impl Into<String>) -> Self {
        Self {
            allocation_id,
            shares: Vec::new(),
            created_by: created_by.into(),
        }
    }

    #[must_use]
    pub fn share(mut self, department_id: Uuid, amount: Money) -> Self {
        self.shares.push((department_id, amount));
        self
    }
}

/// Fix the terms of a pending, department-allocated investment.
#[derive(Clone, Debug)]
pub struct ConfirmInvestmentCmd {
    pub ref_number: String,
    pub account_name: String,
    pub period_days: u64,
    pub interest_rate: f64,
    pub created_by: String,
}

impl ConfirmInvestmentCmd {
    #[must_use]
    pub fn new(
        ref_number: impl Into<String>,
        account_name: impl Into<String>,
        period_days: u64,
        interest_rate: f64,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            ref_number: ref_number.into(),
            account_name: account_name.into(),
            period_days,
            interest_rate,
            created_by: created_by.into(),
        }
    }
}

/// Self-service department investment: created department-allocated in a
/// single step, debiting Main and the department together.
#[derive(Clone, Debug)]
pub struct DepartmentInvestmentCmd {
    pub department_id: Uuid,
    pub account_name: String,
    pub amount: Money,
    pub period_days: u64,
    pub value_date: NaiveDate,
    pub interest_rate: f64,
    pub tax_percentage: f64,
    pub created_by: String,
}

impl DepartmentInvestmentCmd {
    #[must_use]
    pub fn new(
        department_id: Uuid,
        account_name: impl Into<String>,
        amount: Money,
        period_days: u64,
        value_date: NaiveDate,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            department_id,
            account_name: account_name.into(),
            amount,
            period_days,
            value_date,
            interest_rate: 0.0,
            tax_percentage: 0.0,
            created_by: created_by.into(),
        }
    }

    #[must_use]
    pub fn interest_rate(mut self, interest_rate: f64) -> Self {
        self.interest_rate = interest_rate;
        self
    }

    #[must_use]
    pub fn tax_percentage(mut self, tax_percentage: f64) -> Self {
        self.tax_percentage = tax_percentage;
        self
    }
}
