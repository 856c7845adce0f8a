use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    Allocation, ConfirmInvestmentCmd, DealNote, DebitType, DepartmentInvestmentCmd, EngineError,
    Investment, InvestmentStatus, MaturityTerms, Money, ResultEngine, Transaction,
    TransactionKind, allocations, investments,
    ops::{map_unique, with_tx},
    transactions,
    util::{short_ref, validate_tax_percentage},
};

use super::Engine;

/// A confirmed, not-yet-matured investment with its derived figures.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActiveInvestment {
    pub investment: Investment,
    pub department_name: String,
    pub gross_maturity_value: Money,
    pub net_interest: Money,
    pub after_tax_yield_pct: f64,
    pub profit_loss: Money,
}

impl Engine {
    /// Confirms a pending, department-allocated investment: fixes account,
    /// tenor and rate, computes the maturity figures, and returns the stored
    /// investment together with its deal note.
    pub async fn confirm_investment(
        &self,
        cmd: ConfirmInvestmentCmd,
    ) -> ResultEngine<(Investment, DealNote)> {
        with_tx!(self, |db_tx| {
            let model = investments::Entity::find()
                .filter(investments::Column::RefNumber.eq(cmd.ref_number.clone()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound(cmd.ref_number.clone()))?;
            let mut investment = Investment::try_from(model)?;

            if investment.status == InvestmentStatus::Confirmed {
                return Err(EngineError::InvalidAmount(format!(
                    "investment {} already confirmed",
                    cmd.ref_number
                )));
            }
            if investment.department_id.is_none() {
                return Err(EngineError::InvalidAmount(format!(
                    "investment {} has no department; allocate it first",
                    cmd.ref_number
                )));
            }

            // The value date is the backing transaction's date.
            let tx_model = transactions::Entity::find()
                .filter(transactions::Column::RefNumber.eq(cmd.ref_number.clone()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound(cmd.ref_number.clone()))?;
            let value_date = tx_model.transaction_date;

            let terms = MaturityTerms::compute(
                investment.amount,
                cmd.interest_rate,
                cmd.period_days,
                value_date,
            )?;

            investment.status = InvestmentStatus::Confirmed;
            investment.account_name = Some(cmd.account_name.clone());
            investment.period_days = Some(cmd.period_days as i64);
            investment.value_date = Some(value_date);
            investment.interest_rate = Some(cmd.interest_rate);
            investment.maturity_date = Some(terms.maturity_date);
            investment.interest = Some(terms.interest);
            investment.withholding_tax = Some(terms.withholding_tax);
            investment.maturity_amount = Some(terms.maturity_amount);

            let update = investments::ActiveModel {
                id: ActiveValue::Set(investment.id.to_string()),
                status: ActiveValue::Set(investment.status.as_str().to_string()),
                account_name: ActiveValue::Set(investment.account_name.clone()),
                period_days: ActiveValue::Set(investment.period_days),
                value_date: ActiveValue::Set(investment.value_date),
                interest_rate: ActiveValue::Set(investment.interest_rate),
                maturity_date: ActiveValue::Set(investment.maturity_date),
                interest: ActiveValue::Set(investment.interest.map(Money::cents)),
                withholding_tax: ActiveValue::Set(investment.withholding_tax.map(Money::cents)),
                maturity_amount: ActiveValue::Set(investment.maturity_amount.map(Money::cents)),
                ..Default::default()
            };
            update.update(&db_tx).await?;

            let note = DealNote {
                ref_number: investment.ref_number.clone(),
                account_name: cmd.account_name.clone(),
                principal: investment.amount,
                period_days: cmd.period_days,
                value_date,
                interest_rate: cmd.interest_rate,
                terms,
            };

            Ok((investment, note))
        })
    }

    /// Self-service department investment.
    ///
    /// Creates a pending, department-allocated investment in one atomic
    /// step: validates that Main covers principal plus tax and the
    /// department covers the principal, debits both, and inserts the
    /// investment, its department-scoped placeholder allocation, and an
    /// audit transaction tagged as an investment debit.
    pub async fn department_investment(
        &self,
        cmd: DepartmentInvestmentCmd,
    ) -> ResultEngine<(Investment, DealNote)> {
        if !cmd.amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "investment amount must be positive".to_string(),
            ));
        }
        validate_tax_percentage(cmd.tax_percentage)?;

        let tax_amount = cmd.amount.percent_of(cmd.tax_percentage);
        let total_debit = cmd.amount + tax_amount;
        let terms = MaturityTerms::compute(
            cmd.amount,
            cmd.interest_rate,
            cmd.period_days,
            cmd.value_date,
        )?;
        let ref_number = short_ref();

        with_tx!(self, |db_tx| {
            let main = self.require_main(&db_tx).await?;
            let department = self.require_department(&db_tx, cmd.department_id).await?;

            if Money::new(main.balance) < total_debit {
                return Err(EngineError::InsufficientFunds(format!(
                    "Main Account balance {} cannot cover investment of {total_debit}",
                    Money::new(main.balance)
                )));
            }
            if Money::new(department.balance) < cmd.amount {
                return Err(EngineError::InsufficientFunds(format!(
                    "{} balance {} cannot cover investment of {}",
                    department.name,
                    Money::new(department.balance),
                    cmd.amount
                )));
            }

            let allocation = Allocation::for_department(
                ref_number.clone(),
                cmd.department_id,
                cmd.amount,
                TransactionKind::Debit,
                cmd.created_by.clone(),
                Utc::now(),
            );

            let mut investment = Investment::pending(
                ref_number.clone(),
                cmd.amount,
                allocation.id,
                cmd.created_by.clone(),
                Utc::now(),
            );
            investment.department_id = Some(cmd.department_id);
            investment.account_name = Some(cmd.account_name.clone());
            investment.period_days = Some(cmd.period_days as i64);
            investment.value_date = Some(cmd.value_date);
            investment.interest_rate = Some(cmd.interest_rate);
            investment.maturity_date = Some(terms.maturity_date);
            investment.interest = Some(terms.interest);
            investment.withholding_tax = Some(terms.withholding_tax);
            investment.maturity_amount = Some(terms.maturity_amount);

            investments::ActiveModel::from(&investment)
                .insert(&db_tx)
                .await
                .map_err(|err| map_unique(err, &ref_number))?;

            allocations::ActiveModel::from(&allocation)
                .insert(&db_tx)
                .await?;

            let mut audit = Transaction::new(
                ref_number.clone(),
                cmd.value_date,
                cmd.value_date,
                format!("Investment: {}", cmd.account_name),
                cmd.amount,
                Money::ZERO,
                cmd.tax_percentage,
                tax_amount,
                cmd.account_name.clone(),
                None,
                cmd.created_by.clone(),
                Utc::now(),
            )?;
            audit.debit_type = Some(DebitType::Investment);
            transactions::ActiveModel::from(&audit)
                .insert(&db_tx)
                .await
                .map_err(|err| map_unique(err, &ref_number))?;

            self.apply_account_delta(&db_tx, &main.id, -total_debit)
                .await?;
            self.apply_account_delta(&db_tx, &department.id, -cmd.amount)
                .await?;

            let note = DealNote {
                ref_number: ref_number.clone(),
                account_name: cmd.account_name.clone(),
                principal: cmd.amount,
                period_days: cmd.period_days,
                value_date: cmd.value_date,
                interest_rate: cmd.interest_rate,
                terms,
            };

            Ok((investment, note))
        })
    }

    /// Pending investments that have not been allocated to a department yet.
    pub async fn pending_unallocated_investments(&self) -> ResultEngine<Vec<Investment>> {
        let models = investments::Entity::find()
            .filter(investments::Column::Status.eq(InvestmentStatus::Pending.as_str()))
            .filter(investments::Column::DepartmentId.is_null())
            .order_by_desc(investments::Column::CreatedAt)
            .all(&self.database)
            .await?;
        models.into_iter().map(Investment::try_from).collect()
    }

    /// Pending investments with a department, awaiting confirmation.
    pub async fn pending_allocated_investments(&self) -> ResultEngine<Vec<Investment>> {
        let models = investments::Entity::find()
            .filter(investments::Column::Status.eq(InvestmentStatus::Pending.as_str()))
            .filter(investments::Column::DepartmentId.is_not_null())
            .order_by_desc(investments::Column::CreatedAt)
            .all(&self.database)
            .await?;
        models.into_iter().map(Investment::try_from).collect()
    }

    /// Confirmed investments whose maturity date is today or later, with the
    /// derived reporting figures.
    pub async fn active_investments(&self, today: NaiveDate) -> ResultEngine<Vec<ActiveInvestment>> {
        let models = investments::Entity::find()
            .filter(investments::Column::Status.eq(InvestmentStatus::Confirmed.as_str()))
            .filter(investments::Column::MaturityDate.gte(today))
            .order_by_desc(investments::Column::ValueDate)
            .all(&self.database)
            .await?;

        let mut out = Vec::with_capacity(models.len());
        for model in models {
            let investment = Investment::try_from(model)?;
            let department_name = match investment.department_id {
                Some(department_id) => self.department(department_id).await?.name,
                None => continue,
            };

            let interest = investment.interest.unwrap_or(Money::ZERO);
            let withholding_tax = investment.withholding_tax.unwrap_or(Money::ZERO);
            let net_interest = interest - withholding_tax;
            let maturity_amount = investment.maturity_amount.unwrap_or(investment.amount);
            let after_tax_yield_pct = match (investment.amount.is_positive(), investment.period_days)
            {
                (true, Some(period_days)) if period_days > 0 => {
                    (net_interest.cents() as f64 / investment.amount.cents() as f64)
                        * (365.0 / period_days as f64)
                        * 100.0
                }
                _ => 0.0,
            };

            out.push(ActiveInvestment {
                gross_maturity_value: investment.amount + interest,
                net_interest,
                after_tax_yield_pct,
                profit_loss: maturity_amount - investment.amount,
                department_name,
                investment,
            });
        }
        Ok(out)
    }

    /// All confirmed investments of a department, newest value date first.
    pub async fn investment_history(&self, department_id: Uuid) -> ResultEngine<Vec<Investment>> {
        let models = investments::Entity::find()
            .filter(investments::Column::Status.eq(InvestmentStatus::Confirmed.as_str()))
            .filter(investments::Column::DepartmentId.eq(department_id.to_string()))
            .order_by_desc(investments::Column::ValueDate)
            .all(&self.database)
            .await?;
        models.into_iter().map(Investment::try_from).collect()
    }

    /// Returns an investment by its reference number.
    pub async fn investment_by_ref(&self, ref_number: &str) -> ResultEngine<Investment> {
        let model = investments::Entity::find()
            .filter(investments::Column::RefNumber.eq(ref_number))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(ref_number.to_string()))?;
        Investment::try_from(model)
    }
}
