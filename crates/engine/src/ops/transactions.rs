use chrono::Utc;
use sea_orm::{QueryOrder, QuerySelect, TransactionTrait, prelude::*};

use crate::{
    Allocation, CreditType, DebitType, EngineError, Investment, Money, RecordTransactionCmd,
    ResultEngine, Transaction, TransactionKind, allocations, investments,
    ops::{map_unique, with_tx},
    transactions,
    util::{short_ref, validate_tax_percentage},
};

use super::Engine;

impl Engine {
    /// Records a single money movement against the Main account.
    ///
    /// Atomically inserts the transaction, applies its balance delta to Main
    /// (`-(debit + tax)` for debits, `+net` for credits), and emits an
    /// unassigned allocation for the allocatable amount. When the command is
    /// flagged as an investment a pending investment row referencing the same
    /// ref number and allocation is inserted too.
    ///
    /// Returns the new Main account balance.
    pub async fn record_transaction(&self, cmd: RecordTransactionCmd) -> ResultEngine<Money> {
        validate_tax_percentage(cmd.tax_percentage)?;

        let amount = match (
            cmd.debit_amount.is_positive(),
            cmd.credit_amount.is_positive(),
        ) {
            (true, true) => {
                return Err(EngineError::InvalidAmount(
                    "cannot have both debit and credit amounts".to_string(),
                ));
            }
            (false, false) => {
                return Err(EngineError::InvalidAmount(
                    "must have either a debit or a credit amount".to_string(),
                ));
            }
            (true, false) => cmd.debit_amount,
            (false, true) => cmd.credit_amount,
        };
        let tax_amount = amount.percent_of(cmd.tax_percentage);

        let ref_number = short_ref();
        let value_date = cmd.value_date.unwrap_or(cmd.transaction_date);
        let mut tx = Transaction::new(
            ref_number.clone(),
            cmd.transaction_date,
            value_date,
            cmd.narration.trim().to_string(),
            cmd.debit_amount,
            cmd.credit_amount,
            cmd.tax_percentage,
            tax_amount,
            cmd.account_name.clone(),
            None,
            cmd.created_by.clone(),
            Utc::now(),
        )?;
        match tx.kind {
            TransactionKind::Debit => {
                tx.debit_type = Some(if cmd.investment {
                    DebitType::Investment
                } else {
                    DebitType::Other
                });
            }
            TransactionKind::Credit => {
                tx.credit_type = Some(if cmd.investment {
                    CreditType::CreditInvestments
                } else {
                    CreditType::Other
                });
            }
        }

        with_tx!(self, |db_tx| {
            let main = self.require_main(&db_tx).await?;

            let delta = match tx.kind {
                TransactionKind::Debit => {
                    let total_debit = tx.debit_amount + tx.tax_amount;
                    if Money::new(main.balance) < total_debit {
                        return Err(EngineError::InsufficientFunds(format!(
                            "Main Account balance {} cannot cover debit of {total_debit}",
                            Money::new(main.balance)
                        )));
                    }
                    -total_debit
                }
                TransactionKind::Credit => tx.credit_amount - tx.tax_amount,
            };

            transactions::ActiveModel::from(&tx)
                .insert(&db_tx)
                .await
                .map_err(|err| map_unique(err, &ref_number))?;

            let new_balance = self.apply_account_delta(&db_tx, &main.id, delta).await?;

            let allocation = Allocation::unassigned(
                ref_number.clone(),
                tx.allocatable_amount(),
                tx.kind,
                None,
                cmd.created_by.clone(),
                Utc::now(),
            );
            allocations::ActiveModel::from(&allocation)
                .insert(&db_tx)
                .await?;

            if cmd.investment {
                let investment = Investment::pending(
                    ref_number.clone(),
                    allocation.amount,
                    allocation.id,
                    cmd.created_by.clone(),
                    Utc::now(),
                );
                investments::ActiveModel::from(&investment)
                    .insert(&db_tx)
                    .await
                    .map_err(|err| map_unique(err, &ref_number))?;
            }

            Ok(new_balance)
        })
    }

    /// Lists the most recent transactions, newest first.
    pub async fn recent_transactions(&self, limit: u64) -> ResultEngine<Vec<Transaction>> {
        let models = transactions::Entity::find()
            .order_by_desc(transactions::Column::TransactionDate)
            .order_by_desc(transactions::Column::CreatedAt)
            .limit(limit)
            .all(&self.database)
            .await?;
        models.into_iter().map(Transaction::try_from).collect()
    }

    /// Returns a transaction by its reference number.
    pub async fn transaction_by_ref(&self, ref_number: &str) -> ResultEngine<Transaction> {
        let model = transactions::Entity::find()
            .filter(transactions::Column::RefNumber.eq(ref_number))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(ref_number.to_string()))?;
        Transaction::try_from(model)
    }
}
