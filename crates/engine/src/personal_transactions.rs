//! Personal transaction ledger (minimal entity).
//!
//! The personal ledger belongs to the wider finance tracker; the split engine
//! only writes mirrored settlement entries into it and removes them again
//! through the settlement back-reference.

use sea_orm::entity::prelude::*;

pub(crate) const KIND_EXPENSE: &str = "expense";
pub(crate) const KIND_INCOME: &str = "income";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "personal_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub kind: String,
    pub amount_minor: i64,
    pub currency: String,
    pub occurred_on: Date,
    pub note: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
