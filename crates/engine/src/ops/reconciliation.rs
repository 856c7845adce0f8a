use chrono::NaiveDate;
use sea_orm::{QueryFilter, QueryOrder, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    EngineError, Money, ResultEngine, Statement, TaxRate, Transaction,
    statements::{self, write_csv},
    tax_rates, transactions,
};

use super::Engine;

/// Tolerance between recorded and expected tax, in cents.
const TAX_TOLERANCE: i64 = 1;

/// Fallback label when no tariff matched the narration.
const TRANSACTION_TAX: &str = "Transaction Tax";

/// One discrepant transaction row, with the computed difference and the
/// reasons it was flagged.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Discrepancy {
    pub ref_number: String,
    pub transaction_date: NaiveDate,
    pub narration: String,
    pub debit_amount: Money,
    pub credit_amount: Money,
    pub tax_amount: Money,
    pub expected_tax: Money,
    pub tax_diff: Money,
    pub tax_applied: String,
    pub reason: String,
}

/// The outcome of a tax verification run. Producing it never mutates data.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaxVerification {
    pub statement: Statement,
    pub checked: usize,
    pub discrepancies: Vec<Discrepancy>,
}

impl Engine {
    /// Adds a tariff rule. Rules apply in insertion order: the first whose
    /// description is a case-insensitive substring of a narration wins.
    pub async fn new_tax_rate(
        &self,
        description: &str,
        rate_percent: f64,
        created_by: &str,
    ) -> ResultEngine<i32> {
        tax_rates::validate_rate(description, rate_percent)?;
        let model = tax_rates::new_active_model(
            description.trim(),
            rate_percent,
            created_by,
            chrono::Utc::now(),
        )
        .insert(&self.database)
        .await?;
        Ok(model.id)
    }

    /// Lists the configured tariff rules in match order.
    pub async fn tax_rates(&self) -> ResultEngine<Vec<TaxRate>> {
        let models = tax_rates::Entity::find()
            .order_by_asc(tax_rates::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(TaxRate::from).collect())
    }

    /// Verifies recorded tax for a statement against the configured tariff
    /// rules. With no statement id, the most recent statement is verified.
    pub async fn verify_taxes(
        &self,
        statement_id: Option<Uuid>,
    ) -> ResultEngine<TaxVerification> {
        let statement = match statement_id {
            Some(id) => self.require_statement(id).await?,
            None => self
                .latest_statement()
                .await?
                .ok_or_else(|| EngineError::NotFound("statement".to_string()))?,
        };
        self.verify_statement_rows(statement, None).await
    }

    /// Department/account-scoped variant: verifies only the statement rows
    /// booked against the given account name.
    pub async fn reconcile_account(
        &self,
        statement_id: Uuid,
        account_name: &str,
    ) -> ResultEngine<TaxVerification> {
        let statement = self.require_statement(statement_id).await?;
        self.verify_statement_rows(statement, Some(account_name))
            .await
    }

    async fn require_statement(&self, statement_id: Uuid) -> ResultEngine<Statement> {
        let model = statements::Entity::find_by_id(statement_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(statement_id.to_string()))?;
        Statement::try_from(model)
    }

    async fn verify_statement_rows(
        &self,
        statement: Statement,
        account_name: Option<&str>,
    ) -> ResultEngine<TaxVerification> {
        let mut query = transactions::Entity::find()
            .filter(transactions::Column::StatementId.eq(statement.id.to_string()))
            .order_by_desc(transactions::Column::TransactionDate);
        if let Some(account_name) = account_name {
            query = query.filter(transactions::Column::AccountName.eq(account_name));
        }
        let models = query.all(&self.database).await?;

        let mut rows = Vec::with_capacity(models.len());
        for model in models {
            rows.push(Transaction::try_from(model)?);
        }

        let rate_models = tax_rates::Entity::find()
            .order_by_asc(tax_rates::Column::Id)
            .all(&self.database)
            .await?;
        let rates: Vec<TaxRate> = rate_models.into_iter().map(TaxRate::from).collect();

        let checked = rows.len();
        let discrepancies = verify_rows(&rows, &rates);

        Ok(TaxVerification {
            statement,
            checked,
            discrepancies,
        })
    }
}

/// Checks every transaction row against the tariff rules and structural
/// invariants. Pure; the same input always produces the same report.
fn verify_rows(rows: &[Transaction], rates: &[TaxRate]) -> Vec<Discrepancy> {
    let mut discrepancies = Vec::new();

    for tx in rows {
        let amount = if tx.debit_amount.is_positive() {
            tx.debit_amount
        } else {
            tx.credit_amount
        };

        // First matching tariff wins; otherwise fall back to the
        // transaction's own tax percentage.
        let (expected_tax, tax_applied) = match rates.iter().find(|rate| rate.matches(&tx.narration))
        {
            Some(rate) => (amount.percent_of(rate.rate_percent), rate.description.clone()),
            None => (
                amount.percent_of(tx.tax_percentage),
                TRANSACTION_TAX.to_string(),
            ),
        };

        let tax_diff = tx.tax_amount - expected_tax;

        let mut reasons = Vec::new();
        if tax_diff.abs().cents() > TAX_TOLERANCE {
            reasons.push("Tax mismatch");
        }
        if tx.debit_amount.is_positive() && tx.credit_amount.is_positive() {
            reasons.push("Both debit and credit amounts");
        }
        if tx.debit_amount.is_zero() && tx.credit_amount.is_zero() {
            reasons.push("No debit or credit amount");
        }
        if tx.narration.trim().is_empty() {
            reasons.push("Empty narration");
        }

        if reasons.is_empty() {
            continue;
        }

        discrepancies.push(Discrepancy {
            ref_number: tx.ref_number.clone(),
            transaction_date: tx.transaction_date,
            narration: tx.narration.clone(),
            debit_amount: tx.debit_amount,
            credit_amount: tx.credit_amount,
            tax_amount: tx.tax_amount,
            expected_tax,
            tax_diff,
            tax_applied,
            reason: reasons.join("; "),
        });
    }

    discrepancies
}

/// Renders a discrepancy report as CSV.
pub fn discrepancy_report_csv(discrepancies: &[Discrepancy]) -> ResultEngine<String> {
    write_csv(discrepancies)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn rate(id: i32, description: &str, rate_percent: f64) -> TaxRate {
        TaxRate {
            id,
            description: description.to_string(),
            rate_percent,
            created_by: "admin".to_string(),
            created_at: Utc::now(),
        }
    }

    // Built literally so structurally broken rows (both sides set, neither
    // set) can be represented, as the verifier must handle them.
    fn row(narration: &str, debit: i64, credit: i64, tax_pct: f64, tax: i64) -> Transaction {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        Transaction {
            id: uuid::Uuid::new_v4(),
            ref_number: "REF00001".to_string(),
            transaction_date: date,
            value_date: date,
            narration: narration.to_string(),
            debit_amount: Money::new(debit),
            credit_amount: Money::new(credit),
            tax_percentage: tax_pct,
            tax_amount: Money::new(tax),
            kind: if debit > 0 {
                crate::TransactionKind::Debit
            } else {
                crate::TransactionKind::Credit
            },
            debit_type: None,
            credit_type: None,
            account_name: "CBZ Account One".to_string(),
            statement_id: None,
            created_by: "admin".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn tariff_match_overrides_transaction_tax() {
        let rates = vec![rate(1, "VAT", 15.0)];
        // Recorded tax follows the 5% transaction tax; VAT tariff expects 15%.
        let rows = vec![row("VAT on fees", 0, 10_000, 5.0, 500)];

        let report = verify_rows(&rows, &rates);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].expected_tax, Money::new(1_500));
        assert_eq!(report[0].tax_diff, Money::new(-1_000));
        assert_eq!(report[0].tax_applied, "VAT");
        assert!(report[0].reason.contains("Tax mismatch"));
    }

    #[test]
    fn first_matching_tariff_wins() {
        let rates = vec![rate(1, "fees", 10.0), rate(2, "VAT", 15.0)];
        let rows = vec![row("VAT on fees", 0, 10_000, 0.0, 0)];

        let report = verify_rows(&rows, &rates);
        assert_eq!(report[0].tax_applied, "fees");
        assert_eq!(report[0].expected_tax, Money::new(1_000));
    }

    #[test]
    fn falls_back_to_transaction_tax() {
        let rates = vec![rate(1, "VAT", 15.0)];
        let rows = vec![row("Stamp duty", 10_000, 0, 5.0, 500)];

        assert!(verify_rows(&rows, &rates).is_empty());
    }

    #[test]
    fn within_tolerance_is_not_flagged() {
        let rows = vec![row("Charges", 10_000, 0, 5.0, 501)];
        assert!(verify_rows(&rows, &[]).is_empty());
    }

    #[test]
    fn structural_problems_are_flagged() {
        let both = row("Charges", 5_000, 5_000, 0.0, 0);
        let neither = row("Charges", 0, 0, 0.0, 0);
        let blank = row("   ", 10_000, 0, 0.0, 0);

        let report = verify_rows(&[both, neither, blank], &[]);
        assert_eq!(report.len(), 3);
        assert!(report[0].reason.contains("Both debit and credit amounts"));
        assert!(report[1].reason.contains("No debit or credit amount"));
        assert!(report[2].reason.contains("Empty narration"));
    }

    #[test]
    fn report_is_deterministic() {
        let rates = vec![rate(1, "VAT", 15.0)];
        let rows = vec![
            row("VAT on fees", 0, 10_000, 5.0, 500),
            row("Charges", 10_000, 0, 5.0, 500),
        ];
        let first = verify_rows(&rows, &rates);
        let second = verify_rows(&rows, &rates);
        assert_eq!(first, second);
    }

    #[test]
    fn report_csv_lists_canonical_columns() {
        let rates = vec![rate(1, "VAT", 15.0)];
        let rows = vec![row("VAT on fees", 0, 10_000, 5.0, 500)];
        let report = verify_rows(&rows, &rates);
        let csv = discrepancy_report_csv(&report).unwrap();
        assert!(csv.starts_with(
            "ref_number,transaction_date,narration,debit_amount,credit_amount,tax_amount,expected_tax,tax_diff,tax_applied,reason"
        ));
    }
}
