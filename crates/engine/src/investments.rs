//! Fixed-term investments.
//!
//! An investment starts `pending` with no department, gains its owning
//! department when the backing allocation is split, and becomes `confirmed`
//! once account, tenor and rate are fixed and the maturity figures computed.
//! "Active" and "matured" are derived by comparing `maturity_date` with the
//! current date, never stored.

use std::fmt;

use chrono::{DateTime, Days, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine};

/// Withholding tax rate applied to gross interest before payout.
pub const WITHHOLDING_TAX_RATE: f64 = 20.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentStatus {
    Pending,
    Confirmed,
}

impl InvestmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
        }
    }
}

impl TryFrom<&str> for InvestmentStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            other => Err(EngineError::InvalidAmount(format!(
                "invalid investment status: {other}"
            ))),
        }
    }
}

/// The maturity figures of a confirmed investment.
///
/// All formulas use a 365-day year and a 20% withholding on gross interest;
/// interest is rounded to the cent once, everything else derives from it in
/// exact cent arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaturityTerms {
    pub interest: Money,
    pub withholding_tax: Money,
    pub net_interest: Money,
    /// Principal plus gross interest.
    pub gross_maturity_value: Money,
    /// Principal plus net interest; the stored maturity amount.
    pub maturity_amount: Money,
    pub after_tax_yield_pct: f64,
    pub profit_loss: Money,
    pub maturity_date: NaiveDate,
}

impl MaturityTerms {
    pub fn compute(
        principal: Money,
        interest_rate: f64,
        period_days: u64,
        value_date: NaiveDate,
    ) -> ResultEngine<Self> {
        if period_days == 0 {
            return Err(EngineError::InvalidAmount(
                "investment period must be at least 1 day".to_string(),
            ));
        }
        if interest_rate < 0.0 {
            return Err(EngineError::InvalidAmount(format!(
                "invalid interest rate: {interest_rate}"
            )));
        }

        let interest = Money::new(
            (principal.cents() as f64 * interest_rate * period_days as f64 / (100.0 * 365.0))
                .round() as i64,
        );
        let withholding_tax = interest.percent_of(WITHHOLDING_TAX_RATE);
        let net_interest = interest - withholding_tax;
        let maturity_amount = principal + net_interest;
        let after_tax_yield_pct = if principal.is_positive() {
            (net_interest.cents() as f64 / principal.cents() as f64)
                * (365.0 / period_days as f64)
                * 100.0
        } else {
            0.0
        };
        let maturity_date = value_date
            .checked_add_days(Days::new(period_days))
            .ok_or_else(|| EngineError::InvalidAmount("maturity date overflow".to_string()))?;

        Ok(Self {
            interest,
            withholding_tax,
            net_interest,
            gross_maturity_value: principal + interest,
            maturity_amount,
            after_tax_yield_pct,
            profit_loss: net_interest,
            maturity_date,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub id: Uuid,
    pub ref_number: String,
    pub amount: Money,
    pub status: InvestmentStatus,
    pub department_id: Option<Uuid>,
    pub account_name: Option<String>,
    #[serde(rename = "period")]
    pub period_days: Option<i64>,
    pub value_date: Option<NaiveDate>,
    pub interest_rate: Option<f64>,
    pub maturity_date: Option<NaiveDate>,
    pub interest: Option<Money>,
    pub withholding_tax: Option<Money>,
    pub maturity_amount: Option<Money>,
    pub allocation_id: Uuid,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Investment {
    /// A freshly recorded investment, awaiting department allocation.
    pub fn pending(
        ref_number: String,
        amount: Money,
        allocation_id: Uuid,
        created_by: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ref_number,
            amount,
            status: InvestmentStatus::Pending,
            department_id: None,
            account_name: None,
            period_days: None,
            value_date: None,
            interest_rate: None,
            maturity_date: None,
            interest: None,
            withholding_tax: None,
            maturity_amount: None,
            allocation_id,
            created_by,
            created_at,
        }
    }

    /// Confirmed and not yet past its maturity date.
    #[must_use]
    pub fn is_active(&self, today: NaiveDate) -> bool {
        self.status == InvestmentStatus::Confirmed
            && self.maturity_date.is_some_and(|date| date >= today)
    }

    /// Confirmed and past its maturity date.
    #[must_use]
    pub fn is_matured(&self, today: NaiveDate) -> bool {
        self.status == InvestmentStatus::Confirmed
            && self.maturity_date.is_some_and(|date| date < today)
    }
}

/// Human-readable confirmation artifact, rendered for download. Not
/// persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct DealNote {
    pub ref_number: String,
    pub account_name: String,
    pub principal: Money,
    pub period_days: u64,
    pub value_date: NaiveDate,
    pub interest_rate: f64,
    pub terms: MaturityTerms,
}

impl fmt::Display for DealNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Deal Note")?;
        writeln!(f)?;
        writeln!(f, "Reference Number: {}", self.ref_number)?;
        writeln!(f, "Account Name: {}", self.account_name)?;
        writeln!(f, "Nominal Value: {}", self.principal)?;
        writeln!(f, "Tenure: {} days", self.period_days)?;
        writeln!(f, "Value Date: {}", self.value_date)?;
        writeln!(f, "Interest Rate: {:.2}%", self.interest_rate)?;
        writeln!(f, "Maturity Date: {}", self.terms.maturity_date)?;
        writeln!(f, "Interest: {}", self.terms.interest)?;
        writeln!(f, "Withholding Tax: {}", self.terms.withholding_tax)?;
        writeln!(f, "Maturity Value: {}", self.terms.gross_maturity_value)?;
        writeln!(f, "Net Interest: {}", self.terms.net_interest)?;
        writeln!(f, "Tax Maturity Value: {}", self.terms.maturity_amount)?;
        writeln!(f, "After-Tax Yield: {:.2}%", self.terms.after_tax_yield_pct)?;
        write!(f, "Profit/Loss: {}", self.terms.profit_loss)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "investments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub ref_number: String,
    pub amount: i64,
    pub status: String,
    pub department_id: Option<String>,
    pub account_name: Option<String>,
    pub period_days: Option<i64>,
    pub value_date: Option<Date>,
    pub interest_rate: Option<f64>,
    pub maturity_date: Option<Date>,
    pub interest: Option<i64>,
    pub withholding_tax: Option<i64>,
    pub maturity_amount: Option<i64>,
    pub allocation_id: String,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::RefNumber",
        to = "super::transactions::Column::RefNumber",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Investment> for ActiveModel {
    fn from(investment: &Investment) -> Self {
        Self {
            id: ActiveValue::Set(investment.id.to_string()),
            ref_number: ActiveValue::Set(investment.ref_number.clone()),
            amount: ActiveValue::Set(investment.amount.cents()),
            status: ActiveValue::Set(investment.status.as_str().to_string()),
            department_id: ActiveValue::Set(
                investment.department_id.map(|id| id.to_string()),
            ),
            account_name: ActiveValue::Set(investment.account_name.clone()),
            period_days: ActiveValue::Set(investment.period_days),
            value_date: ActiveValue::Set(investment.value_date),
            interest_rate: ActiveValue::Set(investment.interest_rate),
            maturity_date: ActiveValue::Set(investment.maturity_date),
            interest: ActiveValue::Set(investment.interest.map(Money::cents)),
            withholding_tax: ActiveValue::Set(investment.withholding_tax.map(Money::cents)),
            maturity_amount: ActiveValue::Set(investment.maturity_amount.map(Money::cents)),
            allocation_id: ActiveValue::Set(investment.allocation_id.to_string()),
            created_by: ActiveValue::Set(investment.created_by.clone()),
            created_at: ActiveValue::Set(investment.created_at),
        }
    }
}

impl TryFrom<Model> for Investment {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("investment".to_string()))?,
            ref_number: model.ref_number,
            amount: Money::new(model.amount),
            status: InvestmentStatus::try_from(model.status.as_str())?,
            department_id: model
                .department_id
                .as_deref()
                .map(Uuid::parse_str)
                .transpose()
                .map_err(|_| EngineError::NotFound("department".to_string()))?,
            account_name: model.account_name,
            period_days: model.period_days,
            value_date: model.value_date,
            interest_rate: model.interest_rate,
            maturity_date: model.maturity_date,
            interest: model.interest.map(Money::new),
            withholding_tax: model.withholding_tax.map(Money::new),
            maturity_amount: model.maturity_amount.map(Money::new),
            allocation_id: Uuid::parse_str(&model.allocation_id)
                .map_err(|_| EngineError::NotFound("allocation".to_string()))?,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn maturity_figures_for_one_year_at_ten_percent() {
        let terms =
            MaturityTerms::compute(Money::new(100_000), 10.0, 365, date(2024, 1, 1)).unwrap();

        assert_eq!(terms.interest, Money::new(10_000));
        assert_eq!(terms.withholding_tax, Money::new(2_000));
        assert_eq!(terms.net_interest, Money::new(8_000));
        assert_eq!(terms.gross_maturity_value, Money::new(110_000));
        assert_eq!(terms.maturity_amount, Money::new(108_000));
        assert!((terms.after_tax_yield_pct - 8.0).abs() < 1e-9);
        assert_eq!(terms.profit_loss, Money::new(8_000));
        assert_eq!(terms.maturity_date, date(2024, 12, 31));
    }

    #[test]
    fn zero_principal_reports_zero_yield() {
        let terms = MaturityTerms::compute(Money::ZERO, 10.0, 30, date(2024, 1, 1)).unwrap();
        assert_eq!(terms.after_tax_yield_pct, 0.0);
        assert_eq!(terms.maturity_amount, Money::ZERO);
    }

    #[test]
    fn zero_period_is_rejected() {
        assert!(MaturityTerms::compute(Money::new(1000), 10.0, 0, date(2024, 1, 1)).is_err());
    }

    #[test]
    fn derived_states_compare_maturity_to_today() {
        let mut investment = Investment::pending(
            "REF1".to_string(),
            Money::new(1000),
            Uuid::new_v4(),
            "admin".to_string(),
            Utc::now(),
        );
        let today = date(2024, 6, 1);
        assert!(!investment.is_active(today));

        investment.status = InvestmentStatus::Confirmed;
        investment.maturity_date = Some(date(2024, 6, 1));
        assert!(investment.is_active(today));
        assert!(!investment.is_matured(today));

        investment.maturity_date = Some(date(2024, 5, 31));
        assert!(investment.is_matured(today));
    }

    #[test]
    fn deal_note_lists_labeled_lines() {
        let terms =
            MaturityTerms::compute(Money::new(100_000), 10.0, 365, date(2024, 1, 1)).unwrap();
        let note = DealNote {
            ref_number: "AB12CD34".to_string(),
            account_name: "CBZ Account One".to_string(),
            principal: Money::new(100_000),
            period_days: 365,
            value_date: date(2024, 1, 1),
            interest_rate: 10.0,
            terms,
        };
        let rendered = note.to_string();
        assert!(rendered.starts_with("Deal Note"));
        assert!(rendered.contains("Reference Number: AB12CD34"));
        assert!(rendered.contains("Interest: $100.00"));
        assert!(rendered.contains("Withholding Tax: $20.00"));
        assert!(rendered.contains("Tax Maturity Value: $1080.00"));
        assert!(rendered.contains("After-Tax Yield: 8.00%"));
    }
}
