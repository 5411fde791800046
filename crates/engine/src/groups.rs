//! Groups: the shared-expense context.
//!
//! A [`Group`] owns its currency, its invite code and two lifecycle flags:
//! `is_settled` (advisory, set by the admin when every balance is zero) and
//! `is_active` (inactive groups accept no new expenses or settlements).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupCategory {
    Trip,
    Home,
    Couple,
    Friends,
    #[default]
    Other,
}

impl GroupCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trip => "trip",
            Self::Home => "home",
            Self::Couple => "couple",
            Self::Friends => "friends",
            Self::Other => "other",
        }
    }
}

impl TryFrom<&str> for GroupCategory {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "trip" => Ok(Self::Trip),
            "home" => Ok(Self::Home),
            "couple" => Ok(Self::Couple),
            "friends" => Ok(Self::Friends),
            "other" => Ok(Self::Other),
            other => Err(EngineError::InvalidName(format!(
                "invalid group category: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: GroupCategory,
    pub currency: Currency,
    pub invite_code: String,
    pub is_settled: bool,
    pub is_active: bool,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// Returns `true` when `user_id` is the group admin.
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    pub(crate) fn ensure_active(&self) -> ResultEngine<()> {
        if !self.is_active {
            return Err(EngineError::InvalidState(format!(
                "group '{}' is archived",
                self.name
            )));
        }
        Ok(())
    }
}

/// Public preview of a group reached through its invite code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPreview {
    pub id: Uuid,
    pub name: String,
    pub currency: Currency,
    pub member_count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub currency: String,
    #[sea_orm(unique)]
    pub invite_code: String,
    pub is_settled: bool,
    pub is_active: bool,
    pub owner_id: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::members::Entity")]
    Members,
    #[sea_orm(has_many = "super::expenses::Entity")]
    Expenses,
    #[sea_orm(has_many = "super::settlements::Entity")]
    Settlements,
}

impl Related<super::members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl Related<super::settlements::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Settlements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Group> for ActiveModel {
    fn from(group: &Group) -> Self {
        Self {
            id: ActiveValue::Set(group.id),
            name: ActiveValue::Set(group.name.clone()),
            description: ActiveValue::Set(group.description.clone()),
            category: ActiveValue::Set(group.category.as_str().to_string()),
            currency: ActiveValue::Set(group.currency.code().to_string()),
            invite_code: ActiveValue::Set(group.invite_code.clone()),
            is_settled: ActiveValue::Set(group.is_settled),
            is_active: ActiveValue::Set(group.is_active),
            owner_id: ActiveValue::Set(group.owner_id.clone()),
            created_at: ActiveValue::Set(group.created_at),
        }
    }
}

impl TryFrom<Model> for Group {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            name: model.name,
            description: model.description,
            category: GroupCategory::try_from(model.category.as_str())?,
            currency: Currency::try_from(model.currency.as_str())?,
            invite_code: model.invite_code,
            is_settled: model.is_settled,
            is_active: model.is_active,
            owner_id: model.owner_id,
            created_at: model.created_at,
        })
    }
}
