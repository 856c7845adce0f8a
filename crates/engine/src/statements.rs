//! Statements and the tabular import/export surface.
//!
//! A statement groups the transactions of one bulk import. The CSV column
//! vocabulary is fixed: `transaction_date, value_date, narration, ref_number,
//! debit_amount, credit_amount, tax_percentage, tax_amount` (dates as
//! `YYYY-MM-DD`), with `account_name` appended on exports.

use std::io;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub id: Uuid,
    pub filename: String,
    pub upload_date: DateTime<Utc>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Statement {
    pub fn new(filename: String, created_by: String, uploaded_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename,
            upload_date: uploaded_at,
            created_by,
            created_at: uploaded_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "statements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub filename: String,
    pub upload_date: DateTimeUtc,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Statement> for ActiveModel {
    fn from(statement: &Statement) -> Self {
        Self {
            id: ActiveValue::Set(statement.id.to_string()),
            filename: ActiveValue::Set(statement.filename.clone()),
            upload_date: ActiveValue::Set(statement.upload_date),
            created_by: ActiveValue::Set(statement.created_by.clone()),
            created_at: ActiveValue::Set(statement.created_at),
        }
    }
}

impl TryFrom<Model> for Statement {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("statement".to_string()))?,
            filename: model.filename,
            upload_date: model.upload_date,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}

/// One import row exactly as read from the tabular source, before any
/// validation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStatementRow {
    pub transaction_date: String,
    pub value_date: String,
    pub narration: String,
    pub ref_number: String,
    pub debit_amount: String,
    pub credit_amount: String,
    pub tax_percentage: String,
    pub tax_amount: String,
}

/// A validated import row. Construction is the validation step: a raw row
/// that does not parse fails fast with `BatchValidation` naming the offending
/// data row and ref number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatementRow {
    pub transaction_date: NaiveDate,
    pub value_date: NaiveDate,
    pub narration: String,
    pub ref_number: String,
    pub debit_amount: Money,
    pub credit_amount: Money,
    pub tax_percentage: f64,
    pub tax_amount: Money,
}

impl StatementRow {
    /// Validates one raw row. `row` is the 1-based position of the data row
    /// within the batch, used for error reporting.
    pub fn from_raw(row: usize, raw: &RawStatementRow) -> ResultEngine<Self> {
        let fail = |reason: String| EngineError::BatchValidation {
            row,
            ref_number: raw.ref_number.trim().to_string(),
            reason,
        };

        let ref_number = raw.ref_number.trim();
        if ref_number.is_empty() {
            return Err(fail("missing ref_number".to_string()));
        }

        let transaction_date = parse_date(&raw.transaction_date)
            .ok_or_else(|| fail(format!("invalid transaction_date: {}", raw.transaction_date)))?;
        let value_date = parse_date(&raw.value_date)
            .ok_or_else(|| fail(format!("invalid value_date: {}", raw.value_date)))?;

        let debit_amount = parse_amount(&raw.debit_amount)
            .ok_or_else(|| fail(format!("invalid debit_amount: {}", raw.debit_amount)))?;
        let credit_amount = parse_amount(&raw.credit_amount)
            .ok_or_else(|| fail(format!("invalid credit_amount: {}", raw.credit_amount)))?;
        let tax_amount = parse_amount(&raw.tax_amount)
            .ok_or_else(|| fail(format!("invalid tax_amount: {}", raw.tax_amount)))?;

        if debit_amount.is_negative() || credit_amount.is_negative() || tax_amount.is_negative() {
            return Err(fail("negative amounts not allowed".to_string()));
        }
        if debit_amount.is_positive() && credit_amount.is_positive() {
            return Err(fail(
                "cannot have both debit and credit amounts".to_string(),
            ));
        }
        if debit_amount.is_zero() && credit_amount.is_zero() {
            return Err(fail(
                "must have either a debit or a credit amount".to_string(),
            ));
        }

        let tax_percentage: f64 = raw
            .tax_percentage
            .trim()
            .parse()
            .map_err(|_| fail(format!("invalid tax_percentage: {}", raw.tax_percentage)))?;
        if !(0.0..=100.0).contains(&tax_percentage) {
            return Err(fail(format!(
                "tax_percentage out of range: {tax_percentage}"
            )));
        }

        Ok(Self {
            transaction_date,
            value_date,
            narration: raw.narration.trim().to_string(),
            ref_number: ref_number.to_string(),
            debit_amount,
            credit_amount,
            tax_percentage,
            tax_amount,
        })
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn parse_amount(raw: &str) -> Option<Money> {
    raw.trim().parse().ok()
}

/// One row of a statement export: the import columns plus the account the
/// batch was booked against.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatementExportRow {
    pub transaction_date: NaiveDate,
    pub value_date: NaiveDate,
    pub narration: String,
    pub ref_number: String,
    pub debit_amount: Money,
    pub credit_amount: Money,
    pub tax_percentage: f64,
    pub tax_amount: Money,
    pub account_name: String,
}

/// Reads raw import rows from CSV. Structural problems (missing headers,
/// short records) are reported against the offending data row.
pub fn read_statement_rows<R: io::Read>(reader: R) -> ResultEngine<Vec<RawStatementRow>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for (index, record) in csv_reader.deserialize::<RawStatementRow>().enumerate() {
        let row = record.map_err(|err| EngineError::BatchValidation {
            row: index + 1,
            ref_number: String::new(),
            reason: format!("malformed csv record: {err}"),
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Renders the import template: the header row plus one sample row.
pub fn statement_template() -> String {
    let sample = RawStatementRow {
        transaction_date: "2024-01-01".to_string(),
        value_date: "2024-01-01".to_string(),
        narration: "Sample Transaction".to_string(),
        ref_number: "ABC12345".to_string(),
        debit_amount: "0.00".to_string(),
        credit_amount: "100.00".to_string(),
        tax_percentage: "0.0".to_string(),
        tax_amount: "0.00".to_string(),
    };
    // Serializing a template row cannot fail.
    write_csv(&[sample]).unwrap_or_default()
}

/// Renders export rows to CSV with the canonical column order.
pub fn write_statement_csv(rows: &[StatementExportRow]) -> ResultEngine<String> {
    write_csv(rows)
}

pub(crate) fn write_csv<T: Serialize>(rows: &[T]) -> ResultEngine<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    for row in rows {
        writer
            .serialize(row)
            .map_err(|err| EngineError::InvalidAmount(format!("csv serialization: {err}")))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| EngineError::InvalidAmount(format!("csv serialization: {err}")))?;
    String::from_utf8(bytes)
        .map_err(|err| EngineError::InvalidAmount(format!("csv serialization: {err}")))
}
