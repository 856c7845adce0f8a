//! Allocation records.
//!
//! An allocation splits a transaction's value across departments. It is
//! created unassigned (`department_id = None`, "pending") and is consumed
//! once the full amount has been split into department-scoped rows. The
//! pending row doubles as the mutual-exclusion token for concurrent splits:
//! once deleted, a racing second split fails with `NotFound`.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, TransactionKind};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: Uuid,
    pub treasury_ref: String,
    pub department_id: Option<Uuid>,
    pub amount: Money,
    #[serde(rename = "transaction_type")]
    pub kind: TransactionKind,
    pub statement_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Allocation {
    /// A pending allocation, not yet assigned to any department.
    pub fn unassigned(
        treasury_ref: String,
        amount: Money,
        kind: TransactionKind,
        statement_id: Option<String>,
        created_by: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            treasury_ref,
            department_id: None,
            amount,
            kind,
            statement_id,
            created_by,
            created_at,
        }
    }

    /// A department-scoped allocation row produced by a split.
    pub fn for_department(
        treasury_ref: String,
        department_id: Uuid,
        amount: Money,
        kind: TransactionKind,
        created_by: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            treasury_ref,
            department_id: Some(department_id),
            amount,
            kind,
            statement_id: None,
            created_by,
            created_at,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.department_id.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "allocations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub treasury_ref: String,
    pub department_id: Option<String>,
    pub amount: i64,
    pub kind: String,
    pub statement_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TreasuryRef",
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

impl From<&Allocation> for ActiveModel {
    fn from(allocation: &Allocation) -> Self {
        Self {
            id: ActiveValue::Set(allocation.id.to_string()),
            treasury_ref: ActiveValue::Set(allocation.treasury_ref.clone()),
            department_id: ActiveValue::Set(allocation.department_id.map(|id| id.to_string())),
            amount: ActiveValue::Set(allocation.amount.cents()),
            kind: ActiveValue::Set(allocation.kind.as_str().to_string()),
            statement_id: ActiveValue::Set(allocation.statement_id.clone()),
            created_by: ActiveValue::Set(allocation.created_by.clone()),
            created_at: ActiveValue::Set(allocation.created_at),
        }
    }
}

impl TryFrom<Model> for Allocation {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::NotFound("allocation".to_string()))?,
            treasury_ref: model.treasury_ref,
            department_id: model
                .department_id
                .as_deref()
                .map(Uuid::parse_str)
                .transpose()
                .map_err(|_| EngineError::NotFound("department".to_string()))?,
            amount: Money::new(model.amount),
            kind: TransactionKind::try_from(model.kind.as_str())?,
            statement_id: model.statement_id,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}
