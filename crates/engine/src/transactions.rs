//! Transaction primitives.
//!
//! A `Transaction` records a single money movement against the Main account.
//! Exactly one of `debit_amount`/`credit_amount` is positive, never both and
//! never neither. `ref_number` is the join key used by allocations and
//! investments.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Debit,
    Credit,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            other => Err(EngineError::InvalidAmount(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

/// Classification of a debit transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebitType {
    Investment,
    Other,
}

impl DebitType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Investment => "investment",
            Self::Other => "other",
        }
    }
}

impl TryFrom<&str> for DebitType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "investment" => Ok(Self::Investment),
            "other" => Ok(Self::Other),
            other => Err(EngineError::InvalidAmount(format!(
                "invalid debit type: {other}"
            ))),
        }
    }
}

/// Classification of a credit transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditType {
    CreditInvestments,
    Other,
}

impl CreditType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreditInvestments => "credit_investments",
            Self::Other => "other",
        }
    }
}

impl TryFrom<&str> for CreditType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "credit_investments" => Ok(Self::CreditInvestments),
            "other" => Ok(Self::Other),
            other => Err(EngineError::InvalidAmount(format!(
                "invalid credit type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub ref_number: String,
    pub transaction_date: NaiveDate,
    pub value_date: NaiveDate,
    pub narration: String,
    pub debit_amount: Money,
    pub credit_amount: Money,
    pub tax_percentage: f64,
    pub tax_amount: Money,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub debit_type: Option<DebitType>,
    pub credit_type: Option<CreditType>,
    pub account_name: String,
    pub statement_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Builds a transaction, enforcing the one-sided-amount invariant and the
    /// tax percentage range.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ref_number: String,
        transaction_date: NaiveDate,
        value_date: NaiveDate,
        narration: String,
        debit_amount: Money,
        credit_amount: Money,
        tax_percentage: f64,
        tax_amount: Money,
        account_name: String,
        statement_id: Option<String>,
        created_by: String,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if debit_amount.is_negative() || credit_amount.is_negative() {
            return Err(EngineError::InvalidAmount(
                "amounts must not be negative".to_string(),
            ));
        }
        if debit_amount.is_positive() && credit_amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "cannot have both debit and credit amounts".to_string(),
            ));
        }
        if debit_amount.is_zero() && credit_amount.is_zero() {
            return Err(EngineError::InvalidAmount(
                "must have either a debit or a credit amount".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&tax_percentage) {
            return Err(EngineError::InvalidAmount(format!(
                "tax percentage out of range: {tax_percentage}"
            )));
        }

        let kind = if debit_amount.is_positive() {
            TransactionKind::Debit
        } else {
            TransactionKind::Credit
        };

        Ok(Self {
            id: Uuid::new_v4(),
            ref_number,
            transaction_date,
            value_date,
            narration,
            debit_amount,
            credit_amount,
            tax_percentage,
            tax_amount,
            kind,
            debit_type: None,
            credit_type: None,
            account_name,
            statement_id,
            created_by,
            created_at,
        })
    }

    /// The positive side of the movement.
    #[must_use]
    pub fn amount(&self) -> Money {
        match self.kind {
            TransactionKind::Debit => self.debit_amount,
            TransactionKind::Credit => self.credit_amount,
        }
    }

    /// The amount an allocation of this transaction splits: the full debit,
    /// or the credit net of tax.
    #[must_use]
    pub fn allocatable_amount(&self) -> Money {
        match self.kind {
            TransactionKind::Debit => self.debit_amount,
            TransactionKind::Credit => self.credit_amount - self.tax_amount,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub ref_number: String,
    pub transaction_date: Date,
    pub value_date: Date,
    pub narration: String,
    pub debit_amount: i64,
    pub credit_amount: i64,
    pub tax_percentage: f64,
    pub tax_amount: i64,
    pub kind: String,
    pub debit_type: Option<String>,
    pub credit_type: Option<String>,
    pub account_name: String,
    pub statement_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::allocations::Entity")]
    Allocations,
}

impl Related<super::allocations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            ref_number: ActiveValue::Set(tx.ref_number.clone()),
            transaction_date: ActiveValue::Set(tx.transaction_date),
            value_date: ActiveValue::Set(tx.value_date),
            narration: ActiveValue::Set(tx.narration.clone()),
            debit_amount: ActiveValue::Set(tx.debit_amount.cents()),
            credit_amount: ActiveValue::Set(tx.credit_amount.cents()),
            tax_percentage: ActiveValue::Set(tx.tax_percentage),
            tax_amount: ActiveValue::Set(tx.tax_amount.cents()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            debit_type: ActiveValue::Set(tx.debit_type.map(|t| t.as_str().to_string())),
            credit_type: ActiveValue::Set(tx.credit_type.map(|t| t.as_str().to_string())),
            account_name: ActiveValue::Set(tx.account_name.clone()),
            statement_id: ActiveValue::Set(tx.statement_id.clone()),
            created_by: ActiveValue::Set(tx.created_by.clone()),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("transaction".to_string()))?,
            ref_number: model.ref_number,
            transaction_date: model.transaction_date,
            value_date: model.value_date,
            narration: model.narration,
            debit_amount: Money::new(model.debit_amount),
            credit_amount: Money::new(model.credit_amount),
            tax_percentage: model.tax_percentage,
            tax_amount: Money::new(model.tax_amount),
            kind: TransactionKind::try_from(model.kind.as_str())?,
            debit_type: model
                .debit_type
                .as_deref()
                .map(DebitType::try_from)
                .transpose()?,
            credit_type: model
                .credit_type
                .as_deref()
                .map(CreditType::try_from)
                .transpose()?,
            account_name: model.account_name,
            statement_id: model.statement_id,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(debit: i64, credit: i64) -> ResultEngine<Transaction> {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        Transaction::new(
            "REF00001".to_string(),
            date,
            date,
            "Test".to_string(),
            Money::new(debit),
            Money::new(credit),
            5.0,
            Money::ZERO,
            "CBZ Account One".to_string(),
            None,
            "admin".to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn derives_kind_from_amounts() {
        assert_eq!(base(1000, 0).unwrap().kind, TransactionKind::Debit);
        assert_eq!(base(0, 1000).unwrap().kind, TransactionKind::Credit);
    }

    #[test]
    fn rejects_both_or_neither_amount() {
        assert!(base(1000, 1000).is_err());
        assert!(base(0, 0).is_err());
        assert!(base(-100, 0).is_err());
    }

    #[test]
    fn allocatable_amount_nets_tax_on_credits() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let tx = Transaction::new(
            "REF00002".to_string(),
            date,
            date,
            "Credit".to_string(),
            Money::ZERO,
            Money::new(10_000),
            5.0,
            Money::new(500),
            "CBZ Account One".to_string(),
            None,
            "admin".to_string(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(tx.allocatable_amount(), Money::new(9_500));
    }
}
