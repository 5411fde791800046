//! Settlements: real transfers between two members that net out balances.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::MoneyCents;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Uuid,
    pub group_id: Uuid,
    pub from_member_id: Uuid,
    pub to_member_id: Uuid,
    pub amount: MoneyCents,
    pub settled_on: NaiveDate,
    pub note: Option<String>,
    /// Mirrored entry in a member's personal ledger, removed with the settlement.
    pub personal_transaction_id: Option<Uuid>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub group_id: Uuid,
    pub from_member_id: Uuid,
    pub to_member_id: Uuid,
    pub amount_minor: i64,
    pub settled_on: Date,
    pub note: Option<String>,
    pub personal_transaction_id: Option<Uuid>,
    pub created_by: String,
    pub created_at: DateTimeUtc,
    pub idempotency_key: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Group,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Settlement> for ActiveModel {
    fn from(settlement: &Settlement) -> Self {
        Self {
            id: ActiveValue::Set(settlement.id),
            group_id: ActiveValue::Set(settlement.group_id),
            from_member_id: ActiveValue::Set(settlement.from_member_id),
            to_member_id: ActiveValue::Set(settlement.to_member_id),
            amount_minor: ActiveValue::Set(settlement.amount.cents()),
            settled_on: ActiveValue::Set(settlement.settled_on),
            note: ActiveValue::Set(settlement.note.clone()),
            personal_transaction_id: ActiveValue::Set(settlement.personal_transaction_id),
            created_by: ActiveValue::Set(settlement.created_by.clone()),
            created_at: ActiveValue::Set(settlement.created_at),
            idempotency_key: ActiveValue::NotSet,
        }
    }
}

impl From<Model> for Settlement {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            group_id: model.group_id,
            from_member_id: model.from_member_id,
            to_member_id: model.to_member_id,
            amount: MoneyCents::new(model.amount_minor),
            settled_on: model.settled_on,
            note: model.note,
            personal_transaction_id: model.personal_transaction_id,
            created_by: model.created_by,
            created_at: model.created_at,
        }
    }
}
