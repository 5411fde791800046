//! Group members.
//!
//! A member is either *linked* to a real identity or an *unlinked*
//! placeholder (e.g. "Sam", added before Sam has an account). The only way
//! from unlinked to linked is a claim, performed as a conditional update on
//! an empty `user_id` (see `Engine::claim_placeholder`).

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "user_id", rename_all = "snake_case")]
pub enum MemberLink {
    Unlinked,
    Linked(String),
}

impl MemberLink {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Unlinked => None,
            Self::Linked(user_id) => Some(user_id.as_str()),
        }
    }

    pub fn is_linked(&self) -> bool {
        matches!(self, Self::Linked(_))
    }
}

impl From<Option<String>> for MemberLink {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(user_id) => Self::Linked(user_id),
            None => Self::Unlinked,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub link: MemberLink,
    pub is_creator: bool,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

impl Member {
    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }

    pub fn is_linked_to(&self, user_id: &str) -> bool {
        self.link.user_id() == Some(user_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "group_members")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub user_id: Option<String>,
    pub is_creator: bool,
    pub joined_at: DateTimeUtc,
    pub left_at: Option<DateTimeUtc>,
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

impl From<Model> for Member {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            group_id: model.group_id,
            name: model.name,
            email: model.email,
            link: MemberLink::from(model.user_id),
            is_creator: model.is_creator,
            joined_at: model.joined_at,
            left_at: model.left_at,
        }
    }
}
