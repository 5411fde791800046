use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    Caller, EngineError, Group, GroupPatch, GroupPreview, NewGroupCmd, ResultEngine,
    code_from_segment, expenses, generate_invite_code, groups, invite, members, settlements,
    util::{normalize_email, normalize_optional_text, normalize_required_name},
};

use super::{Engine, with_tx};

/// Attempts at drawing an unused invite code before giving up.
const INVITE_CODE_ATTEMPTS: usize = 8;

impl Engine {
    /// Create a group. The caller becomes its admin and first (linked) member.
    pub async fn create_group(&self, caller: &Caller, cmd: NewGroupCmd) -> ResultEngine<Group> {
        let name = normalize_required_name(&cmd.name, "group")?;
        let creator_name = normalize_required_name(
            cmd.creator_name.as_deref().unwrap_or(&caller.user_id),
            "member",
        )?;
        let email = normalize_email(caller.email.as_deref())?;
        let now = Utc::now();

        let group = with_tx!(self, |db_tx| {
            let invite_code = self.unused_invite_code(&db_tx).await?;
            let group = Group {
                id: Uuid::new_v4(),
                name,
                description: normalize_optional_text(cmd.description.as_deref()),
                category: cmd.category,
                currency: cmd.currency,
                invite_code,
                is_settled: false,
                is_active: true,
                owner_id: caller.user_id.clone(),
                created_at: now,
            };
            groups::ActiveModel::from(&group).insert(&db_tx).await?;

            members::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                group_id: ActiveValue::Set(group.id),
                name: ActiveValue::Set(creator_name),
                email: ActiveValue::Set(email),
                user_id: ActiveValue::Set(Some(caller.user_id.clone())),
                is_creator: ActiveValue::Set(true),
                joined_at: ActiveValue::Set(now),
                left_at: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await?;

            Ok(group)
        })?;

        tracing::info!(group_id = %group.id, owner = %group.owner_id, "group created");
        Ok(group)
    }

    /// Return a group the caller is an active member of.
    pub async fn group(&self, caller: &Caller, group_id: Uuid) -> ResultEngine<Group> {
        let (group, _) = self.require_group(&self.database, group_id, caller).await?;
        Ok(group)
    }

    /// Groups the caller is an active member of, oldest first.
    pub async fn list_groups(&self, caller: &Caller) -> ResultEngine<Vec<Group>> {
        let group_ids: Vec<Uuid> = members::Entity::find()
            .filter(members::Column::UserId.eq(caller.user_id.clone()))
            .filter(members::Column::LeftAt.is_null())
            .all(&self.database)
            .await?
            .into_iter()
            .map(|m| m.group_id)
            .collect();
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }

        groups::Entity::find()
            .filter(groups::Column::Id.is_in(group_ids))
            .order_by_asc(groups::Column::CreatedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Group::try_from)
            .collect()
    }

    /// Public preview of the group behind an invite code (or invite path segment).
    pub async fn group_by_invite_code(&self, code: &str) -> ResultEngine<GroupPreview> {
        let group = self.require_group_by_code(&self.database, code).await?;
        let member_count = members::Entity::find()
            .filter(members::Column::GroupId.eq(group.id))
            .filter(members::Column::LeftAt.is_null())
            .count(&self.database)
            .await?;
        Ok(GroupPreview {
            id: group.id,
            name: group.name,
            currency: group.currency,
            member_count,
        })
    }

    /// Shareable invite link of a group.
    pub async fn invite_link(
        &self,
        caller: &Caller,
        group_id: Uuid,
        origin: &str,
    ) -> ResultEngine<String> {
        let (group, _) = self.require_group(&self.database, group_id, caller).await?;
        Ok(invite::invite_link(origin, &group.name, &group.invite_code))
    }

    /// Replace the invite code; links built from the old code stop working.
    pub async fn regenerate_invite_code(
        &self,
        caller: &Caller,
        group_id: Uuid,
    ) -> ResultEngine<String> {
        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, group_id, caller).await?;
            let code = self.unused_invite_code(&db_tx).await?;
            groups::ActiveModel {
                id: ActiveValue::Set(group_id),
                invite_code: ActiveValue::Set(code.clone()),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            Ok(code)
        })
    }

    /// Apply a settings patch (admin-only).
    ///
    /// The currency can only change while the group has no expense and no
    /// settlement: amounts are never converted.
    pub async fn update_group_settings(
        &self,
        caller: &Caller,
        group_id: Uuid,
        patch: GroupPatch,
    ) -> ResultEngine<Group> {
        let name = patch
            .name
            .as_deref()
            .map(|n| normalize_required_name(n, "group"))
            .transpose()?;

        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            let (mut group, _) = self.require_admin(&db_tx, group_id, caller).await?;

            if let Some(currency) = patch.currency
                && currency != group.currency
            {
                let expense_count = expenses::Entity::find()
                    .filter(expenses::Column::GroupId.eq(group_id))
                    .count(&db_tx)
                    .await?;
                let settlement_count = settlements::Entity::find()
                    .filter(settlements::Column::GroupId.eq(group_id))
                    .count(&db_tx)
                    .await?;
                if expense_count > 0 || settlement_count > 0 {
                    return Err(EngineError::InvalidState(format!(
                        "cannot change currency of '{}': it already has expenses or settlements",
                        group.name
                    )));
                }
                group.currency = currency;
            }

            if let Some(name) = name {
                group.name = name;
            }
            if let Some(description) = patch.description {
                group.description = normalize_optional_text(description.as_deref());
            }
            if let Some(category) = patch.category {
                group.category = category;
            }
            if let Some(is_active) = patch.is_active {
                group.is_active = is_active;
            }

            groups::ActiveModel::from(&group).update(&db_tx).await?;
            Ok(group)
        })
    }

    /// Flag the group as settled (admin-only). Every balance must be zero.
    ///
    /// The flag is advisory: later expenses are still accepted.
    pub async fn mark_settled(&self, caller: &Caller, group_id: Uuid) -> ResultEngine<Group> {
        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            let (mut group, _) = self.require_admin(&db_tx, group_id, caller).await?;
            let members = self.load_members(&db_tx, group_id).await?;
            let balances = self.compute_balances(&db_tx, group_id, &members).await?;

            if let Some((member_id, balance)) = balances.iter().find(|(_, b)| !b.net().is_zero())
            {
                let name = members
                    .iter()
                    .find(|m| m.id == *member_id)
                    .map_or_else(|| member_id.to_string(), |m| m.name.clone());
                return Err(EngineError::InvalidState(format!(
                    "group is not settled: {name} has a balance of {}",
                    balance.net()
                )));
            }

            group.is_settled = true;
            groups::ActiveModel {
                id: ActiveValue::Set(group_id),
                is_settled: ActiveValue::Set(true),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            Ok(group)
        })
    }

    pub(super) async fn require_group_by_code<C: ConnectionTrait>(
        &self,
        db: &C,
        code: &str,
    ) -> ResultEngine<Group> {
        let code = code_from_segment(code)?;
        groups::Entity::find()
            .filter(groups::Column::InviteCode.eq(code))
            .one(db)
            .await?
            .map(Group::try_from)
            .transpose()?
            .ok_or_else(|| EngineError::KeyNotFound("invite code".to_string()))
    }

    async fn unused_invite_code<C: ConnectionTrait>(&self, db: &C) -> ResultEngine<String> {
        for _ in 0..INVITE_CODE_ATTEMPTS {
            let code = generate_invite_code();
            let taken = groups::Entity::find()
                .filter(groups::Column::InviteCode.eq(code.clone()))
                .count(db)
                .await?
                > 0;
            if !taken {
                return Ok(code);
            }
        }
        Err(EngineError::Conflict(
            "could not generate an unused invite code".to_string(),
        ))
    }
}
