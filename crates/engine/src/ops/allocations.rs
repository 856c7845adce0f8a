use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde::Serialize;

use crate::{
    Allocation, CreditType, DebitType, EngineError, InvestmentStatus, Money, ResultEngine,
    SplitAllocationCmd, Transaction, TransactionKind, allocations, investments,
    ops::with_tx,
    transactions,
};

use super::Engine;

/// A pending allocation together with the transaction it splits.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PendingAllocation {
    pub allocation: Allocation,
    pub transaction: Transaction,
}

/// Sum tolerance for a split, in cents.
const SPLIT_TOLERANCE: i64 = 1;

impl Engine {
    /// Lists pending allocations awaiting an ordinary department split.
    /// Investment-tagged movements are handled by
    /// [`Engine::pending_investment_allocations`] instead.
    pub async fn pending_allocations(&self) -> ResultEngine<Vec<PendingAllocation>> {
        let pending = self.pending_with_transactions().await?;
        Ok(pending
            .into_iter()
            .filter(|entry| !is_investment_tagged(&entry.transaction))
            .collect())
    }

    /// Lists pending allocations that back an investment movement.
    pub async fn pending_investment_allocations(&self) -> ResultEngine<Vec<PendingAllocation>> {
        let pending = self.pending_with_transactions().await?;
        Ok(pending
            .into_iter()
            .filter(|entry| is_investment_tagged(&entry.transaction))
            .collect())
    }

    async fn pending_with_transactions(&self) -> ResultEngine<Vec<PendingAllocation>> {
        let rows: Vec<(allocations::Model, Option<transactions::Model>)> =
            allocations::Entity::find()
                .filter(allocations::Column::DepartmentId.is_null())
                .order_by_desc(allocations::Column::CreatedAt)
                .find_also_related(transactions::Entity)
                .all(&self.database)
                .await?;

        let mut out = Vec::with_capacity(rows.len());
        for (allocation_model, tx_model) in rows {
            let Some(tx_model) = tx_model else { continue };
            out.push(PendingAllocation {
                allocation: Allocation::try_from(allocation_model)?,
                transaction: Transaction::try_from(tx_model)?,
            });
        }
        Ok(out)
    }

    /// Splits a pending allocation across departments.
    ///
    /// Validates that the proposed shares sum to the allocation amount
    /// (±0.01) and, for debit allocations, that every department can absorb
    /// its share, all before any balance is touched. On success the
    /// department-scoped rows are inserted, balances updated, the linked
    /// pending investment (if any) assigned its owning department, and the
    /// original pending row deleted. A racing split of the same allocation
    /// fails with `NotFound` once the row is consumed.
    pub async fn split_allocation(&self, cmd: SplitAllocationCmd) -> ResultEngine<()> {
        for (_, amount) in &cmd.shares {
            if amount.is_negative() {
                return Err(EngineError::InvalidAmount(
                    "allocation shares must not be negative".to_string(),
                ));
            }
        }

        with_tx!(self, |db_tx| {
            let allocation_model =
                allocations::Entity::find_by_id(cmd.allocation_id.to_string())
                    .one(&db_tx)
                    .await?
                    .ok_or_else(|| EngineError::NotFound(cmd.allocation_id.to_string()))?;
            let allocation = Allocation::try_from(allocation_model)?;
            if !allocation.is_pending() {
                return Err(EngineError::NotFound(format!(
                    "pending allocation {}",
                    cmd.allocation_id
                )));
            }

            let shares: Vec<_> = cmd
                .shares
                .iter()
                .filter(|(_, amount)| amount.is_positive())
                .copied()
                .collect();

            for (department_id, amount) in &shares {
                if *amount > allocation.amount {
                    return Err(EngineError::InvalidAmount(format!(
                        "share {amount} for department {department_id} exceeds allocation amount {}",
                        allocation.amount
                    )));
                }
            }

            let total: Money = shares
                .iter()
                .fold(Money::ZERO, |acc, (_, amount)| acc + *amount);
            if (total - allocation.amount).abs().cents() > SPLIT_TOLERANCE {
                return Err(EngineError::AllocationMismatch(format!(
                    "allocated total {total} must equal the allocation amount {}",
                    allocation.amount
                )));
            }

            let linked_investment = investments::Entity::find()
                .filter(investments::Column::RefNumber.eq(allocation.treasury_ref.clone()))
                .filter(investments::Column::Status.eq(InvestmentStatus::Pending.as_str()))
                .one(&db_tx)
                .await?;
            if linked_investment.is_some() && shares.len() > 1 {
                return Err(EngineError::AllocationMismatch(
                    "investment allocations must target exactly one department".to_string(),
                ));
            }

            // Existence and, for debits, balance checks for every department
            // before the first write.
            let mut department_models = Vec::with_capacity(shares.len());
            for (department_id, amount) in &shares {
                let department = self.require_department(&db_tx, *department_id).await?;
                if allocation.kind == TransactionKind::Debit
                    && Money::new(department.balance) < *amount
                {
                    return Err(EngineError::InsufficientFunds(format!(
                        "{} balance {} cannot cover debit allocation of {amount}",
                        department.name,
                        Money::new(department.balance)
                    )));
                }
                department_models.push(department);
            }

            for ((department_id, amount), department) in shares.iter().zip(&department_models) {
                let row = Allocation::for_department(
                    allocation.treasury_ref.clone(),
                    *department_id,
                    *amount,
                    allocation.kind,
                    cmd.created_by.clone(),
                    Utc::now(),
                );
                allocations::ActiveModel::from(&row).insert(&db_tx).await?;

                let delta = match allocation.kind {
                    TransactionKind::Credit => *amount,
                    TransactionKind::Debit => -*amount,
                };
                self.apply_account_delta(&db_tx, &department.id, delta)
                    .await?;
            }

            if let Some(investment_model) = linked_investment {
                let owner = shares
                    .first()
                    .map(|(department_id, _)| *department_id)
                    .ok_or_else(|| {
                        EngineError::AllocationMismatch(
                            "investment allocation requires a department share".to_string(),
                        )
                    })?;
                let update = investments::ActiveModel {
                    id: ActiveValue::Set(investment_model.id),
                    department_id: ActiveValue::Set(Some(owner.to_string())),
                    ..Default::default()
                };
                update.update(&db_tx).await?;
            }

            allocations::Entity::delete_by_id(cmd.allocation_id.to_string())
                .exec(&db_tx)
                .await?;

            Ok(())
        })
    }

    /// Lists the allocations booked to a department, newest first.
    pub async fn department_allocations(
        &self,
        department_id: uuid::Uuid,
    ) -> ResultEngine<Vec<Allocation>> {
        let models = allocations::Entity::find()
            .filter(allocations::Column::DepartmentId.eq(department_id.to_string()))
            .order_by_desc(allocations::Column::CreatedAt)
            .all(&self.database)
            .await?;
        models.into_iter().map(Allocation::try_from).collect()
    }
}

fn is_investment_tagged(transaction: &Transaction) -> bool {
    matches!(transaction.debit_type, Some(DebitType::Investment))
        || matches!(transaction.credit_type, Some(CreditType::CreditInvestments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tagged(debit_type: Option<DebitType>, credit_type: Option<CreditType>) -> Transaction {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut tx = Transaction::new(
            "REF1".to_string(),
            date,
            date,
            "n".to_string(),
            Money::new(100),
            Money::ZERO,
            0.0,
            Money::ZERO,
            "CBZ Account One".to_string(),
            None,
            "admin".to_string(),
            Utc::now(),
        )
        .unwrap();
        tx.debit_type = debit_type;
        tx.credit_type = credit_type;
        tx
    }

    #[test]
    fn investment_tagging_matches_either_side() {
        assert!(is_investment_tagged(&tagged(
            Some(DebitType::Investment),
            None
        )));
        assert!(is_investment_tagged(&tagged(
            None,
            Some(CreditType::CreditInvestments)
        )));
        assert!(!is_investment_tagged(&tagged(Some(DebitType::Other), None)));
        assert!(!is_investment_tagged(&tagged(None, None)));
    }
}
