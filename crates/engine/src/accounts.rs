//! Treasury accounts.
//!
//! Exactly one [`AccountKind::Main`] account exists process-wide; every other
//! account is a departmental sub-account. Balances are denormalized integer
//! cents and are only ever read/written inside an atomic unit of work.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Main,
    Department,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Department => "department",
        }
    }
}

impl TryFrom<&str> for AccountKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "main" => Ok(Self::Main),
            "department" => Ok(Self::Department),
            other => Err(EngineError::InvalidAmount(format!(
                "invalid account kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub kind: AccountKind,
    pub name: String,
    pub balance: Money,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        kind: AccountKind,
        name: String,
        created_by: String,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidAmount(
                "account name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            name,
            balance: Money::ZERO,
            created_by,
            created_at,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub kind: String,
    pub name: String,
    pub balance: i64,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(account: &Account) -> Self {
        Self {
            id: ActiveValue::Set(account.id.to_string()),
            kind: ActiveValue::Set(account.kind.as_str().to_string()),
            name: ActiveValue::Set(account.name.clone()),
            balance: ActiveValue::Set(account.balance.cents()),
            created_by: ActiveValue::Set(account.created_by.clone()),
            created_at: ActiveValue::Set(account.created_at),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("account".to_string()))?,
            kind: AccountKind::try_from(model.kind.as_str())?,
            name: model.name,
            balance: Money::new(model.balance),
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips() {
        for kind in [AccountKind::Main, AccountKind::Department] {
            assert_eq!(AccountKind::try_from(kind.as_str()).unwrap(), kind);
        }
        assert!(AccountKind::try_from("treasury").is_err());
    }

    #[test]
    fn rejects_blank_name() {
        let result = Account::new(
            AccountKind::Department,
            "   ".to_string(),
            "admin".to_string(),
            Utc::now(),
        );
        assert!(result.is_err());
    }
}
