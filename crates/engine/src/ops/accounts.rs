use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    Account, AccountKind, EngineError, Money, ResultEngine, accounts,
    ops::{map_unique, with_tx},
};

use super::Engine;

/// Name of the singleton main treasury account.
pub(crate) const MAIN_ACCOUNT_NAME: &str = "Main Account";

/// Department seeded at bootstrap.
const DEFAULT_DEPARTMENT: &str = "Treasury";

impl Engine {
    /// Ensures the singleton Main account and the default Treasury
    /// department exist. Idempotent.
    pub async fn bootstrap(&self) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let main = accounts::Entity::find()
                .filter(accounts::Column::Kind.eq(AccountKind::Main.as_str()))
                .one(&db_tx)
                .await?;
            if main.is_none() {
                let account = Account::new(
                    AccountKind::Main,
                    MAIN_ACCOUNT_NAME.to_string(),
                    "system".to_string(),
                    Utc::now(),
                )?;
                accounts::ActiveModel::from(&account).insert(&db_tx).await?;
            }

            let treasury = accounts::Entity::find()
                .filter(accounts::Column::Kind.eq(AccountKind::Department.as_str()))
                .filter(accounts::Column::Name.eq(DEFAULT_DEPARTMENT))
                .one(&db_tx)
                .await?;
            if treasury.is_none() {
                let department = Account::new(
                    AccountKind::Department,
                    DEFAULT_DEPARTMENT.to_string(),
                    "system".to_string(),
                    Utc::now(),
                )?;
                accounts::ActiveModel::from(&department)
                    .insert(&db_tx)
                    .await?;
            }

            Ok(())
        })
    }

    /// Creates a departmental sub-account with a zero balance.
    pub async fn new_department(&self, name: &str, created_by: &str) -> ResultEngine<Uuid> {
        let department = Account::new(
            AccountKind::Department,
            name.trim().to_string(),
            created_by.to_string(),
            Utc::now(),
        )?;
        let id = department.id;
        accounts::ActiveModel::from(&department)
            .insert(&self.database)
            .await
            .map_err(|err| map_unique(err, name.trim()))?;
        Ok(id)
    }

    /// Returns the Main account.
    pub async fn main_account(&self) -> ResultEngine<Account> {
        let model = accounts::Entity::find()
            .filter(accounts::Column::Kind.eq(AccountKind::Main.as_str()))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(MAIN_ACCOUNT_NAME.to_string()))?;
        Account::try_from(model)
    }

    /// Returns a department by id.
    pub async fn department(&self, department_id: Uuid) -> ResultEngine<Account> {
        let model = self.require_department(&self.database, department_id).await?;
        Account::try_from(model)
    }

    /// Returns a department by name.
    pub async fn department_by_name(&self, name: &str) -> ResultEngine<Account> {
        let model = accounts::Entity::find()
            .filter(accounts::Column::Kind.eq(AccountKind::Department.as_str()))
            .filter(accounts::Column::Name.eq(name))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(name.to_string()))?;
        Account::try_from(model)
    }

    /// Lists departmental sub-accounts, ordered by name.
    pub async fn departments(&self) -> ResultEngine<Vec<Account>> {
        let models = accounts::Entity::find()
            .filter(accounts::Column::Kind.eq(AccountKind::Department.as_str()))
            .order_by_asc(accounts::Column::Name)
            .all(&self.database)
            .await?;
        models.into_iter().map(Account::try_from).collect()
    }

    /// Looks up the Main account row on the given connection.
    pub(in crate::ops) async fn require_main<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> ResultEngine<accounts::Model> {
        accounts::Entity::find()
            .filter(accounts::Column::Kind.eq(AccountKind::Main.as_str()))
            .one(conn)
            .await?
            .ok_or_else(|| EngineError::NotFound(MAIN_ACCOUNT_NAME.to_string()))
    }

    /// Looks up a department row on the given connection.
    pub(in crate::ops) async fn require_department<C: ConnectionTrait>(
        &self,
        conn: &C,
        department_id: Uuid,
    ) -> ResultEngine<accounts::Model> {
        accounts::Entity::find_by_id(department_id.to_string())
            .filter(accounts::Column::Kind.eq(AccountKind::Department.as_str()))
            .one(conn)
            .await?
            .ok_or_else(|| EngineError::NotFound(department_id.to_string()))
    }

    /// Applies a signed delta to an account balance and returns the new
    /// balance. The read and the write happen within the caller's atomic
    /// unit; a delta that would drive the balance negative fails with
    /// `InsufficientFunds` and writes nothing.
    pub(in crate::ops) async fn apply_account_delta(
        &self,
        db_tx: &DatabaseTransaction,
        account_id: &str,
        delta: Money,
    ) -> ResultEngine<Money> {
        let model = accounts::Entity::find_by_id(account_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound(account_id.to_string()))?;

        let new_balance = Money::new(model.balance) + delta;
        if new_balance.is_negative() {
            return Err(EngineError::InsufficientFunds(format!(
                "{} balance {} cannot absorb {}",
                model.name,
                Money::new(model.balance),
                delta
            )));
        }

        let update = accounts::ActiveModel {
            id: ActiveValue::Set(model.id),
            balance: ActiveValue::Set(new_balance.cents()),
            ..Default::default()
        };
        update.update(db_tx).await?;

        Ok(new_balance)
    }
}
