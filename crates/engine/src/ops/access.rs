use std::collections::HashMap;

use sea_orm::{ConnectionTrait, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{
    Balances, Caller, EngineError, Expense, Group, Member, ResultEngine, Settlement,
    expense_payers, expense_splits, expenses, groups, members, settlements,
};

use super::Engine;

fn group_not_found() -> EngineError {
    EngineError::KeyNotFound("group not exists".to_string())
}

impl Engine {
    pub(super) async fn find_group<C: ConnectionTrait>(
        &self,
        db: &C,
        group_id: Uuid,
    ) -> ResultEngine<Option<Group>> {
        groups::Entity::find_by_id(group_id)
            .one(db)
            .await?
            .map(Group::try_from)
            .transpose()
    }

    /// The group and the caller's own member row. Groups the caller is not an
    /// active member of are reported as missing.
    pub(super) async fn require_group<C: ConnectionTrait>(
        &self,
        db: &C,
        group_id: Uuid,
        caller: &Caller,
    ) -> ResultEngine<(Group, Member)> {
        let group = self
            .find_group(db, group_id)
            .await?
            .ok_or_else(group_not_found)?;
        let member = self
            .find_linked_member(db, group_id, &caller.user_id)
            .await?
            .filter(Member::is_active)
            .ok_or_else(group_not_found)?;
        Ok((group, member))
    }

    pub(super) async fn require_admin<C: ConnectionTrait>(
        &self,
        db: &C,
        group_id: Uuid,
        caller: &Caller,
    ) -> ResultEngine<(Group, Member)> {
        let (group, member) = self.require_group(db, group_id, caller).await?;
        if !group.is_admin(&caller.user_id) {
            return Err(EngineError::Forbidden(format!(
                "only the admin of '{}' can do this",
                group.name
            )));
        }
        Ok((group, member))
    }

    pub(super) async fn find_linked_member<C: ConnectionTrait>(
        &self,
        db: &C,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Option<Member>> {
        Ok(members::Entity::find()
            .filter(members::Column::GroupId.eq(group_id))
            .filter(members::Column::UserId.eq(user_id.to_string()))
            .one(db)
            .await?
            .map(Member::from))
    }

    /// Every member row of a group (left members included), in join order.
    pub(super) async fn load_members<C: ConnectionTrait>(
        &self,
        db: &C,
        group_id: Uuid,
    ) -> ResultEngine<Vec<Member>> {
        Ok(members::Entity::find()
            .filter(members::Column::GroupId.eq(group_id))
            .order_by_asc(members::Column::JoinedAt)
            .order_by_asc(members::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(Member::from)
            .collect())
    }

    pub(super) async fn load_expenses<C: ConnectionTrait>(
        &self,
        db: &C,
        group_id: Uuid,
    ) -> ResultEngine<Vec<Expense>> {
        let models = expenses::Entity::find()
            .filter(expenses::Column::GroupId.eq(group_id))
            .order_by_desc(expenses::Column::ExpenseDate)
            .order_by_desc(expenses::Column::CreatedAt)
            .all(db)
            .await?;
        self.with_children(db, models).await
    }

    pub(super) async fn find_expense<C: ConnectionTrait>(
        &self,
        db: &C,
        expense_id: Uuid,
    ) -> ResultEngine<Option<Expense>> {
        let Some(model) = expenses::Entity::find_by_id(expense_id).one(db).await? else {
            return Ok(None);
        };
        Ok(self.with_children(db, vec![model]).await?.pop())
    }

    /// Attach payer and split rows to expense rows, keeping their order.
    async fn with_children<C: ConnectionTrait>(
        &self,
        db: &C,
        models: Vec<expenses::Model>,
    ) -> ResultEngine<Vec<Expense>> {
        if models.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();

        let mut payers: HashMap<Uuid, Vec<expense_payers::Model>> = HashMap::new();
        for row in expense_payers::Entity::find()
            .filter(expense_payers::Column::ExpenseId.is_in(ids.clone()))
            .order_by_asc(expense_payers::Column::MemberId)
            .all(db)
            .await?
        {
            payers.entry(row.expense_id).or_default().push(row);
        }

        let mut splits: HashMap<Uuid, Vec<expense_splits::Model>> = HashMap::new();
        for row in expense_splits::Entity::find()
            .filter(expense_splits::Column::ExpenseId.is_in(ids))
            .order_by_asc(expense_splits::Column::MemberId)
            .all(db)
            .await?
        {
            splits.entry(row.expense_id).or_default().push(row);
        }

        models
            .into_iter()
            .map(|model| {
                let p = payers.remove(&model.id).unwrap_or_default();
                let s = splits.remove(&model.id).unwrap_or_default();
                Expense::try_from((model, p, s))
            })
            .collect()
    }

    pub(super) async fn load_settlements<C: ConnectionTrait>(
        &self,
        db: &C,
        group_id: Uuid,
    ) -> ResultEngine<Vec<Settlement>> {
        Ok(settlements::Entity::find()
            .filter(settlements::Column::GroupId.eq(group_id))
            .order_by_desc(settlements::Column::SettledOn)
            .order_by_desc(settlements::Column::CreatedAt)
            .all(db)
            .await?
            .into_iter()
            .map(Settlement::from)
            .collect())
    }

    /// Derive the balances of a group from its current rows.
    pub(super) async fn compute_balances<C: ConnectionTrait>(
        &self,
        db: &C,
        group_id: Uuid,
        members: &[Member],
    ) -> ResultEngine<Balances> {
        let expenses = self.load_expenses(db, group_id).await?;
        let settlements = self.load_settlements(db, group_id).await?;
        Ok(Balances::compute(
            members.iter().map(|m| m.id),
            &expenses,
            &settlements,
        ))
    }
}

/// Ids of the members that can take part in new expenses and settlements.
pub(super) fn active_member_ids(members: &[Member]) -> Vec<Uuid> {
    members
        .iter()
        .filter(|m| m.is_active())
        .map(|m| m.id)
        .collect()
}

pub(super) fn require_active_member(members: &[Member], member_id: Uuid) -> ResultEngine<&Member> {
    members
        .iter()
        .find(|m| m.id == member_id && m.is_active())
        .ok_or_else(|| EngineError::KeyNotFound("member not exists".to_string()))
}
