use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Allocation, CreditType, DebitType, EngineError, Money, ResultEngine, Statement, StatementRow,
    Transaction, TransactionKind, allocations,
    commands::ImportStatementCmd,
    ops::{map_unique, with_tx},
    statements::{self, StatementExportRow, write_statement_csv},
    transactions,
};

use super::Engine;

/// Result of a committed bulk import.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub statement_id: Uuid,
    pub imported: usize,
    pub main_balance: Money,
}

impl Engine {
    /// Imports a batch of transactions as one statement.
    ///
    /// Two-phase protocol: every row is validated (and the batch checked for
    /// duplicate refs) before anything is written; the Main balance is then
    /// pre-checked against the batch's net effect; finally statement,
    /// transactions, allocations and balance deltas commit in one atomic
    /// unit. Any failure leaves no trace of the batch.
    pub async fn import_statement(&self, cmd: ImportStatementCmd) -> ResultEngine<ImportOutcome> {
        // Phase 1: validate-all, no mutation.
        let mut rows = Vec::with_capacity(cmd.rows.len());
        let mut seen_refs: HashSet<String> = HashSet::new();
        for (index, raw) in cmd.rows.iter().enumerate() {
            let row = StatementRow::from_raw(index + 1, raw)?;
            if !seen_refs.insert(row.ref_number.clone()) {
                return Err(EngineError::BatchValidation {
                    row: index + 1,
                    ref_number: row.ref_number.clone(),
                    reason: "duplicate ref_number in batch".to_string(),
                });
            }
            rows.push(row);
        }
        if rows.is_empty() {
            return Err(EngineError::InvalidAmount(
                "statement batch is empty".to_string(),
            ));
        }

        let statement = Statement::new(cmd.filename.clone(), cmd.created_by.clone(), Utc::now());
        let statement_id = statement.id;

        with_tx!(self, |db_tx| {
            let main = self.require_main(&db_tx).await?;

            // Phase 2: balance pre-check over the whole batch.
            let mut net_change = Money::ZERO;
            for row in &rows {
                if row.debit_amount.is_positive() {
                    net_change -= row.debit_amount + row.tax_amount;
                } else {
                    net_change += row.credit_amount - row.tax_amount;
                }
            }
            if (Money::new(main.balance) + net_change).is_negative() {
                return Err(EngineError::InsufficientFunds(format!(
                    "Main Account balance {} cannot cover statement net change of {net_change}",
                    Money::new(main.balance)
                )));
            }

            // Phase 3: commit the whole batch atomically.
            statements::ActiveModel::from(&statement)
                .insert(&db_tx)
                .await?;

            for row in &rows {
                let mut tx = Transaction::new(
                    row.ref_number.clone(),
                    row.transaction_date,
                    row.value_date,
                    row.narration.clone(),
                    row.debit_amount,
                    row.credit_amount,
                    row.tax_percentage,
                    row.tax_amount,
                    cmd.account_name.clone(),
                    Some(statement_id.to_string()),
                    cmd.created_by.clone(),
                    Utc::now(),
                )?;
                match tx.kind {
                    TransactionKind::Debit => tx.debit_type = Some(DebitType::Other),
                    TransactionKind::Credit => tx.credit_type = Some(CreditType::Other),
                }

                transactions::ActiveModel::from(&tx)
                    .insert(&db_tx)
                    .await
                    .map_err(|err| map_unique(err, &row.ref_number))?;

                let allocation = Allocation::unassigned(
                    row.ref_number.clone(),
                    tx.allocatable_amount(),
                    tx.kind,
                    Some(statement_id.to_string()),
                    cmd.created_by.clone(),
                    Utc::now(),
                );
                allocations::ActiveModel::from(&allocation)
                    .insert(&db_tx)
                    .await?;
            }

            // The pre-check already proved the aggregate keeps Main
            // non-negative; a row-by-row application could trip over a
            // mid-batch dip the batch as a whole covers.
            let main_balance = self
                .apply_account_delta(&db_tx, &main.id, net_change)
                .await?;

            Ok(ImportOutcome {
                statement_id,
                imported: rows.len(),
                main_balance,
            })
        })
    }

    /// Lists uploaded statements, newest first.
    pub async fn statements(&self) -> ResultEngine<Vec<Statement>> {
        let models = statements::Entity::find()
            .order_by_desc(statements::Column::UploadDate)
            .all(&self.database)
            .await?;
        models.into_iter().map(Statement::try_from).collect()
    }

    /// Returns the most recently uploaded statement, if any.
    pub async fn latest_statement(&self) -> ResultEngine<Option<Statement>> {
        let model = statements::Entity::find()
            .order_by_desc(statements::Column::UploadDate)
            .one(&self.database)
            .await?;
        model.map(Statement::try_from).transpose()
    }

    /// Collects export rows for the inclusive date range, ascending by
    /// transaction date.
    pub async fn statement_export_rows(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ResultEngine<Vec<StatementExportRow>> {
        if start > end {
            return Err(EngineError::InvalidAmount(
                "start date must not be after end date".to_string(),
            ));
        }
        let models = transactions::Entity::find()
            .filter(transactions::Column::TransactionDate.gte(start))
            .filter(transactions::Column::TransactionDate.lte(end))
            .order_by_asc(transactions::Column::TransactionDate)
            .all(&self.database)
            .await?;

        let mut rows = Vec::with_capacity(models.len());
        for model in models {
            let tx = Transaction::try_from(model)?;
            rows.push(StatementExportRow {
                transaction_date: tx.transaction_date,
                value_date: tx.value_date,
                narration: tx.narration,
                ref_number: tx.ref_number,
                debit_amount: tx.debit_amount,
                credit_amount: tx.credit_amount,
                tax_percentage: tx.tax_percentage,
                tax_amount: tx.tax_amount,
                account_name: tx.account_name,
            });
        }
        Ok(rows)
    }

    /// Renders the date-range statement export as CSV.
    pub async fn export_statement_csv(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ResultEngine<String> {
        let rows = self.statement_export_rows(start, end).await?;
        write_statement_csv(&rows)
    }
}
