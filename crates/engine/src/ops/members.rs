//! Membership resolution.
//!
//! Joining through an invite code resolves the caller to a member row in a
//! fixed order (first match wins):
//!
//! 1. a row already linked to the caller: nothing to do (or reactivate it
//!    when the caller had left);
//! 2. an unlinked row carrying the caller's email: claim it;
//! 3. an unlinked row with the same display name: ask the caller to confirm
//!    the link, see [`Engine::confirm_placeholder_link`];
//! 4. a linked row with the same display name: the name is taken;
//! 5. otherwise a new linked row.
//!
//! Claiming is a conditional update on an empty `user_id`, so two callers
//! racing for the same placeholder cannot both win.

use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Caller, EngineError, JoinCmd, Member, ResultEngine, members,
    util::{name_key, normalize_email, normalize_required_name},
};

use super::{Engine, access::require_active_member, with_tx};

/// Result of [`Engine::join_group`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JoinOutcome {
    /// The caller is already an active member; nothing was written.
    AlreadyMember { member: Member },
    /// The caller had left the group and is active again.
    Rejoined { member: Member },
    /// An unlinked member carrying the caller's email was claimed.
    LinkedByEmail { member: Member },
    /// An unlinked member has the requested name. Nothing was written: the
    /// caller confirms with [`Engine::confirm_placeholder_link`] or joins again
    /// with `force_new`.
    PlaceholderMatch { group_id: Uuid, placeholder: Member },
    /// A new member row linked to the caller was created.
    Joined { member: Member },
}

impl JoinOutcome {
    /// The caller's member row, unless a confirmation is pending.
    pub fn member(&self) -> Option<&Member> {
        match self {
            Self::AlreadyMember { member }
            | Self::Rejoined { member }
            | Self::LinkedByEmail { member }
            | Self::Joined { member } => Some(member),
            Self::PlaceholderMatch { .. } => None,
        }
    }
}

impl Engine {
    /// Add an unlinked member (placeholder) to a group. Any active member can
    /// add one.
    pub async fn add_member(
        &self,
        caller: &Caller,
        group_id: Uuid,
        name: &str,
        email: Option<&str>,
    ) -> ResultEngine<Member> {
        let name = normalize_required_name(name, "member")?;
        let email = normalize_email(email)?;

        let _guard = self.lock_group(group_id).await;
        let member = with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id, caller).await?;
            let existing = self.load_members(&db_tx, group_id).await?;

            let key = name_key(&name);
            if existing
                .iter()
                .any(|m| m.is_active() && name_key(&m.name) == key)
            {
                return Err(EngineError::ExistingKey(name));
            }
            if let Some(email) = email.as_deref()
                && existing
                    .iter()
                    .any(|m| m.is_active() && m.email.as_deref() == Some(email))
            {
                return Err(EngineError::ExistingKey(email.to_string()));
            }

            let model = members::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                group_id: ActiveValue::Set(group_id),
                name: ActiveValue::Set(name),
                email: ActiveValue::Set(email),
                user_id: ActiveValue::Set(None),
                is_creator: ActiveValue::Set(false),
                joined_at: ActiveValue::Set(Utc::now()),
                left_at: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await?;
            Ok(Member::from(model))
        })?;

        tracing::info!(%group_id, member_id = %member.id, "placeholder member added");
        Ok(member)
    }

    /// Join the group behind `cmd.code` as `caller`.
    pub async fn join_group(&self, caller: &Caller, cmd: JoinCmd) -> ResultEngine<JoinOutcome> {
        let display_name = normalize_required_name(&cmd.display_name, "member")?;
        let caller_email = normalize_email(caller.email.as_deref())?;
        let group = self.require_group_by_code(&self.database, &cmd.code).await?;
        let group_id = group.id;

        let _guard = self.lock_group(group_id).await;
        let outcome = with_tx!(self, |db_tx| {
            let existing = self.load_members(&db_tx, group_id).await?;

            if let Some(own) = existing.iter().find(|m| m.is_linked_to(&caller.user_id)) {
                if own.is_active() {
                    Ok(JoinOutcome::AlreadyMember {
                        member: own.clone(),
                    })
                } else {
                    ensure_name_free(&existing, &own.name, Some(own.id))?;
                    let model = members::ActiveModel {
                        id: ActiveValue::Set(own.id),
                        left_at: ActiveValue::Set(None),
                        ..Default::default()
                    }
                    .update(&db_tx)
                    .await?;
                    Ok(JoinOutcome::Rejoined {
                        member: Member::from(model),
                    })
                }
            } else if let Some(placeholder) = caller_email.as_deref().and_then(|email| {
                existing.iter().find(|m| {
                    m.is_active() && !m.link.is_linked() && m.email.as_deref() == Some(email)
                })
            }) {
                ensure_name_free(&existing, &display_name, Some(placeholder.id))?;
                let member = self
                    .claim_placeholder(&db_tx, placeholder.id, caller, &display_name)
                    .await?;
                Ok(JoinOutcome::LinkedByEmail { member })
            } else {
                let key = name_key(&display_name);
                let same_name = |linked: bool| {
                    existing.iter().find(|m| {
                        m.is_active() && m.link.is_linked() == linked && name_key(&m.name) == key
                    })
                };

                match (same_name(false), same_name(true)) {
                    (Some(placeholder), None) if !cmd.force_new => {
                        Ok(JoinOutcome::PlaceholderMatch {
                            group_id,
                            placeholder: placeholder.clone(),
                        })
                    }
                    (_, Some(_)) => Err(EngineError::Conflict(format!(
                        "name taken: '{display_name}' is already used in this group"
                    ))),
                    _ => {
                        let model = members::ActiveModel {
                            id: ActiveValue::Set(Uuid::new_v4()),
                            group_id: ActiveValue::Set(group_id),
                            name: ActiveValue::Set(display_name.clone()),
                            email: ActiveValue::Set(caller_email.clone()),
                            user_id: ActiveValue::Set(Some(caller.user_id.clone())),
                            is_creator: ActiveValue::Set(false),
                            joined_at: ActiveValue::Set(Utc::now()),
                            left_at: ActiveValue::Set(None),
                        }
                        .insert(&db_tx)
                        .await?;
                        Ok(JoinOutcome::Joined {
                            member: Member::from(model),
                        })
                    }
                }
            }
        })?;

        tracing::info!(
            %group_id,
            user_id = %caller.user_id,
            outcome = outcome_label(&outcome),
            "join resolved"
        );
        Ok(outcome)
    }

    /// Second step of a placeholder match: link `member_id` to the caller.
    ///
    /// `display_name` overrides the placeholder name when given.
    pub async fn confirm_placeholder_link(
        &self,
        caller: &Caller,
        code: &str,
        member_id: Uuid,
        display_name: Option<&str>,
    ) -> ResultEngine<Member> {
        let display_name = display_name
            .map(|n| normalize_required_name(n, "member"))
            .transpose()?;
        let group = self.require_group_by_code(&self.database, code).await?;
        let group_id = group.id;

        let _guard = self.lock_group(group_id).await;
        let member = with_tx!(self, |db_tx| {
            let existing = self.load_members(&db_tx, group_id).await?;
            if existing.iter().any(|m| m.is_linked_to(&caller.user_id)) {
                return Err(EngineError::Conflict(format!(
                    "'{}' is already a member of '{}'",
                    caller.user_id, group.name
                )));
            }

            let placeholder = require_active_member(&existing, member_id)?;
            if placeholder.link.is_linked() {
                return Err(EngineError::Conflict(
                    "placeholder already claimed".to_string(),
                ));
            }
            let name = display_name.unwrap_or_else(|| placeholder.name.clone());
            ensure_name_free(&existing, &name, Some(member_id))?;

            self.claim_placeholder(&db_tx, member_id, caller, &name)
                .await
        })?;

        tracing::info!(%group_id, member_id = %member.id, "placeholder linked");
        Ok(member)
    }

    /// Remove a member (admin-only). The member keeps its history but no
    /// longer takes part in new expenses.
    pub async fn remove_member(
        &self,
        caller: &Caller,
        group_id: Uuid,
        member_id: Uuid,
    ) -> ResultEngine<()> {
        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, group_id, caller).await?;
            self.deactivate_member(&db_tx, group_id, member_id).await
        })?;
        tracing::info!(%group_id, %member_id, "member removed");
        Ok(())
    }

    /// Leave a group. The creator cannot leave.
    pub async fn leave_group(&self, caller: &Caller, group_id: Uuid) -> ResultEngine<()> {
        let _guard = self.lock_group(group_id).await;
        let member_id = with_tx!(self, |db_tx| {
            let (_, own) = self.require_group(&db_tx, group_id, caller).await?;
            self.deactivate_member(&db_tx, group_id, own.id).await?;
            Ok(own.id)
        })?;
        tracing::info!(%group_id, %member_id, "member left");
        Ok(())
    }

    /// Active members of a group, in join order.
    pub async fn list_members(&self, caller: &Caller, group_id: Uuid) -> ResultEngine<Vec<Member>> {
        self.require_group(&self.database, group_id, caller).await?;
        Ok(self
            .load_members(&self.database, group_id)
            .await?
            .into_iter()
            .filter(Member::is_active)
            .collect())
    }

    async fn deactivate_member<C: ConnectionTrait>(
        &self,
        db: &C,
        group_id: Uuid,
        member_id: Uuid,
    ) -> ResultEngine<()> {
        let existing = self.load_members(db, group_id).await?;
        let member = require_active_member(&existing, member_id)?;
        if member.is_creator {
            return Err(EngineError::InvalidState(
                "the group creator cannot be removed".to_string(),
            ));
        }

        let balance = self
            .compute_balances(db, group_id, &existing)
            .await?
            .net(&member_id);
        if !balance.is_zero() {
            return Err(EngineError::InvalidState(format!(
                "{} still has a balance of {balance}",
                member.name
            )));
        }

        members::ActiveModel {
            id: ActiveValue::Set(member_id),
            left_at: ActiveValue::Set(Some(Utc::now())),
            ..Default::default()
        }
        .update(db)
        .await?;
        Ok(())
    }

    /// Link an unlinked member to `caller`. Fails with a conflict when the row
    /// was claimed in the meantime.
    async fn claim_placeholder<C: ConnectionTrait>(
        &self,
        db: &C,
        member_id: Uuid,
        caller: &Caller,
        name: &str,
    ) -> ResultEngine<Member> {
        let result = members::Entity::update_many()
            .col_expr(members::Column::UserId, Expr::value(caller.user_id.clone()))
            .col_expr(members::Column::Name, Expr::value(name.to_string()))
            .filter(members::Column::Id.eq(member_id))
            .filter(members::Column::UserId.is_null())
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            tracing::warn!(%member_id, user_id = %caller.user_id, "placeholder claim lost");
            return Err(EngineError::Conflict(
                "placeholder already claimed".to_string(),
            ));
        }

        members::Entity::find_by_id(member_id)
            .one(db)
            .await?
            .map(Member::from)
            .ok_or_else(|| EngineError::KeyNotFound("member not exists".to_string()))
    }
}

/// Linked display names are unique within a group.
fn ensure_name_free(existing: &[Member], name: &str, except: Option<Uuid>) -> ResultEngine<()> {
    let key = name_key(name);
    let taken = existing.iter().any(|m| {
        Some(m.id) != except && m.is_active() && m.link.is_linked() && name_key(&m.name) == key
    });
    if taken {
        return Err(EngineError::Conflict(format!(
            "name taken: '{name}' is already used in this group"
        )));
    }
    Ok(())
}

fn outcome_label(outcome: &JoinOutcome) -> &'static str {
    match outcome {
        JoinOutcome::AlreadyMember { .. } => "already_member",
        JoinOutcome::Rejoined { .. } => "rejoined",
        JoinOutcome::LinkedByEmail { .. } => "linked_by_email",
        JoinOutcome::PlaceholderMatch { .. } => "placeholder_match",
        JoinOutcome::Joined { .. } => "joined",
    }
}
