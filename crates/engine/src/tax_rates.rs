//! Tariff/tax rate rules.
//!
//! A rate applies to a transaction when its `description` is a
//! case-insensitive substring of the transaction's narration. Rules are
//! scanned in insertion order; the first match wins.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaxRate {
    pub id: i32,
    pub description: String,
    pub rate_percent: f64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl TaxRate {
    /// Whether this rule applies to the given narration.
    #[must_use]
    pub fn matches(&self, narration: &str) -> bool {
        narration
            .to_lowercase()
            .contains(&self.description.to_lowercase())
    }
}

pub(crate) fn validate_rate(description: &str, rate_percent: f64) -> ResultEngine<()> {
    if description.trim().is_empty() {
        return Err(EngineError::InvalidAmount(
            "tax description must not be empty".to_string(),
        ));
    }
    if !(0.0..=100.0).contains(&rate_percent) {
        return Err(EngineError::InvalidAmount(format!(
            "tax rate out of range: {rate_percent}"
        )));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tax_rates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub description: String,
    pub rate_percent: f64,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for TaxRate {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            description: model.description,
            rate_percent: model.rate_percent,
            created_by: model.created_by,
            created_at: model.created_at,
        }
    }
}

pub(crate) fn new_active_model(
    description: &str,
    rate_percent: f64,
    created_by: &str,
    created_at: DateTime<Utc>,
) -> ActiveModel {
    ActiveModel {
        id: ActiveValue::NotSet,
        description: ActiveValue::Set(description.to_string()),
        rate_percent: ActiveValue::Set(rate_percent),
        created_by: ActiveValue::Set(created_by.to_string()),
        created_at: ActiveValue::Set(created_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_is_case_insensitive_substring() {
        let rate = TaxRate {
            id: 1,
            description: "VAT".to_string(),
            rate_percent: 15.0,
            created_by: "admin".to_string(),
            created_at: Utc::now(),
        };
        assert!(rate.matches("vat on fees"));
        assert!(rate.matches("Quarterly VAT remittance"));
        assert!(!rate.matches("Stamp duty"));
    }

    #[test]
    fn rate_bounds_are_enforced() {
        assert!(validate_rate("VAT", 15.0).is_ok());
        assert!(validate_rate("", 15.0).is_err());
        assert!(validate_rate("VAT", 120.0).is_err());
        assert!(validate_rate("VAT", -1.0).is_err());
    }
}
