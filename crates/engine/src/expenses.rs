//! Expense primitives.
//!
//! An [`Expense`] is a shared cost. Who paid is recorded by its
//! [`PayerEntry`] rows, who owes by its [`SplitEntry`] rows; both sets always
//! sum to the expense amount.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, Percentage};

use super::{expense_payers, expense_splits};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitType {
    Equal,
    Percentage,
    Custom,
}

impl SplitType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::Percentage => "percentage",
            Self::Custom => "custom",
        }
    }
}

impl TryFrom<&str> for SplitType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "equal" => Ok(Self::Equal),
            "percentage" => Ok(Self::Percentage),
            "custom" => Ok(Self::Custom),
            other => Err(EngineError::InvalidAmount(format!(
                "invalid split type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerEntry {
    pub member_id: Uuid,
    pub amount: MoneyCents,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitEntry {
    pub member_id: Uuid,
    pub amount: MoneyCents,
    pub percentage: Option<Percentage>,
    pub is_paid: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub group_id: Uuid,
    pub description: String,
    pub amount: MoneyCents,
    pub split_type: SplitType,
    pub expense_date: NaiveDate,
    pub notes: Option<String>,
    /// Single payer of expenses written before payer entries existed.
    pub paid_by: Option<Uuid>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub payers: Vec<PayerEntry>,
    pub splits: Vec<SplitEntry>,
}

impl Expense {
    /// Payer allocation used for balances: the payer entries, or the legacy
    /// single payer for the full amount when the expense has none.
    pub fn effective_payers(&self) -> Vec<PayerEntry> {
        if !self.payers.is_empty() {
            return self.payers.clone();
        }
        self.paid_by
            .map(|member_id| {
                vec![PayerEntry {
                    member_id,
                    amount: self.amount,
                }]
            })
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub group_id: Uuid,
    pub description: String,
    pub amount_minor: i64,
    pub split_type: String,
    pub expense_date: Date,
    pub notes: Option<String>,
    pub paid_by: Option<Uuid>,
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
    #[sea_orm(has_many = "super::expense_payers::Entity")]
    Payers,
    #[sea_orm(has_many = "super::expense_splits::Entity")]
    Splits,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl Related<super::expense_payers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payers.def()
    }
}

impl Related<super::expense_splits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Splits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id),
            group_id: ActiveValue::Set(expense.group_id),
            description: ActiveValue::Set(expense.description.clone()),
            amount_minor: ActiveValue::Set(expense.amount.cents()),
            split_type: ActiveValue::Set(expense.split_type.as_str().to_string()),
            expense_date: ActiveValue::Set(expense.expense_date),
            notes: ActiveValue::Set(expense.notes.clone()),
            paid_by: ActiveValue::Set(expense.paid_by),
            created_by: ActiveValue::Set(expense.created_by.clone()),
            created_at: ActiveValue::Set(expense.created_at),
            idempotency_key: ActiveValue::NotSet,
        }
    }
}

impl TryFrom<(Model, Vec<expense_payers::Model>, Vec<expense_splits::Model>)> for Expense {
    type Error = EngineError;

    fn try_from(
        (model, payers, splits): (Model, Vec<expense_payers::Model>, Vec<expense_splits::Model>),
    ) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            group_id: model.group_id,
            description: model.description,
            amount: MoneyCents::new(model.amount_minor),
            split_type: SplitType::try_from(model.split_type.as_str())?,
            expense_date: model.expense_date,
            notes: model.notes,
            paid_by: model.paid_by,
            created_by: model.created_by,
            created_at: model.created_at,
            payers: payers.into_iter().map(PayerEntry::from).collect(),
            splits: splits.into_iter().map(SplitEntry::from).collect(),
        })
    }
}

impl From<expense_payers::Model> for PayerEntry {
    fn from(model: expense_payers::Model) -> Self {
        Self {
            member_id: model.member_id,
            amount: MoneyCents::new(model.amount_minor),
        }
    }
}

impl From<expense_splits::Model> for SplitEntry {
    fn from(model: expense_splits::Model) -> Self {
        Self {
            member_id: model.member_id,
            amount: MoneyCents::new(model.amount_minor),
            percentage: model.percentage_bp.map(Percentage::from_basis_points),
            is_paid: model.is_paid,
        }
    }
}
