use chrono::Utc;
use sea_orm::{ActiveValue, ConnectionTrait, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Caller, EngineError, Group, Member, MoneyCents, ResultEngine, Settlement, SettlementCmd,
    SettlementPatch, personal_transactions, settlements,
    personal_transactions::{KIND_EXPENSE, KIND_INCOME},
    util::normalize_optional_text,
};

use super::{Engine, access::require_active_member, with_tx};

fn settlement_not_found() -> EngineError {
    EngineError::KeyNotFound("settlement not exists".to_string())
}

impl Engine {
    /// Record a transfer between two members.
    ///
    /// With `cmd.mirror` the transfer is also written to the caller's
    /// personal ledger when the caller is one of its two sides: as an expense
    /// when paying, as an income when receiving.
    pub async fn record_settlement(
        &self,
        caller: &Caller,
        cmd: SettlementCmd,
    ) -> ResultEngine<Settlement> {
        validate_transfer(cmd.from_member_id, cmd.to_member_id, cmd.amount)?;
        let group_id = cmd.group_id;

        let _guard = self.lock_group(group_id).await;
        let (settlement, created) = with_tx!(self, |db_tx| {
            let (group, _) = self.require_group(&db_tx, group_id, caller).await?;
            group.ensure_active()?;

            let previous = match cmd.idempotency_key.as_deref() {
                Some(key) => {
                    settlements::Entity::find()
                        .filter(settlements::Column::GroupId.eq(group_id))
                        .filter(settlements::Column::CreatedBy.eq(caller.user_id.clone()))
                        .filter(settlements::Column::IdempotencyKey.eq(key.to_string()))
                        .one(&db_tx)
                        .await?
                }
                None => None,
            };

            match previous {
                Some(existing) => Ok((Settlement::from(existing), false)),
                None => {
                    let members = self.load_members(&db_tx, group_id).await?;
                    let from = require_active_member(&members, cmd.from_member_id)?;
                    let to = require_active_member(&members, cmd.to_member_id)?;

                    let mut settlement = Settlement {
                        id: Uuid::new_v4(),
                        group_id,
                        from_member_id: from.id,
                        to_member_id: to.id,
                        amount: cmd.amount,
                        settled_on: cmd.settled_on,
                        note: normalize_optional_text(cmd.note.as_deref()),
                        personal_transaction_id: None,
                        created_by: caller.user_id.clone(),
                        created_at: Utc::now(),
                    };

                    if cmd.mirror {
                        match mirror_kind(&caller.user_id, from, to) {
                            Some(kind) => {
                                let id = insert_mirror(
                                    &db_tx,
                                    &caller.user_id,
                                    kind,
                                    &group,
                                    &settlement,
                                )
                                .await?;
                                settlement.personal_transaction_id = Some(id);
                            }
                            None => tracing::debug!(
                                %group_id,
                                user_id = %caller.user_id,
                                "caller is not part of the transfer, mirror skipped"
                            ),
                        }
                    }

                    let mut model = settlements::ActiveModel::from(&settlement);
                    model.idempotency_key = ActiveValue::Set(cmd.idempotency_key.clone());
                    model.insert(&db_tx).await?;
                    Ok((settlement, true))
                }
            }
        })?;

        if created {
            tracing::info!(
                %group_id,
                settlement_id = %settlement.id,
                amount = %settlement.amount,
                mirrored = settlement.personal_transaction_id.is_some(),
                "settlement recorded"
            );
        }
        Ok(settlement)
    }

    /// Edit a settlement (admin-only). A mirrored personal entry follows the
    /// change, and is removed when its owner is no longer part of the
    /// transfer.
    pub async fn update_settlement(
        &self,
        caller: &Caller,
        settlement_id: Uuid,
        patch: SettlementPatch,
    ) -> ResultEngine<Settlement> {
        let group_id = self.settlement_group_id(settlement_id).await?;

        let _guard = self.lock_group(group_id).await;
        let settlement = with_tx!(self, |db_tx| {
            let (group, _) = self.require_admin(&db_tx, group_id, caller).await?;
            group.ensure_active()?;

            let mut settlement = settlements::Entity::find_by_id(settlement_id)
                .one(&db_tx)
                .await?
                .map(Settlement::from)
                .ok_or_else(settlement_not_found)?;

            if let Some(from) = patch.from_member_id {
                settlement.from_member_id = from;
            }
            if let Some(to) = patch.to_member_id {
                settlement.to_member_id = to;
            }
            if let Some(amount) = patch.amount {
                settlement.amount = amount;
            }
            if let Some(settled_on) = patch.settled_on {
                settlement.settled_on = settled_on;
            }
            if let Some(note) = patch.note {
                settlement.note = normalize_optional_text(note.as_deref());
            }
            validate_transfer(
                settlement.from_member_id,
                settlement.to_member_id,
                settlement.amount,
            )?;

            let members = self.load_members(&db_tx, group_id).await?;
            let from = require_active_member(&members, settlement.from_member_id)?;
            let to = require_active_member(&members, settlement.to_member_id)?;

            if let Some(mirror_id) = settlement.personal_transaction_id
                && let Some(mirror) = personal_transactions::Entity::find_by_id(mirror_id)
                    .one(&db_tx)
                    .await?
            {
                match mirror_kind(&mirror.user_id, from, to) {
                    Some(kind) => {
                        personal_transactions::ActiveModel {
                            id: ActiveValue::Set(mirror_id),
                            kind: ActiveValue::Set(kind.to_string()),
                            amount_minor: ActiveValue::Set(settlement.amount.cents()),
                            occurred_on: ActiveValue::Set(settlement.settled_on),
                            note: ActiveValue::Set(Some(mirror_note(&group, &settlement))),
                            ..Default::default()
                        }
                        .update(&db_tx)
                        .await?;
                    }
                    None => {
                        personal_transactions::Entity::delete_by_id(mirror_id)
                            .exec(&db_tx)
                            .await?;
                        settlement.personal_transaction_id = None;
                    }
                }
            }

            settlements::ActiveModel::from(&settlement)
                .update(&db_tx)
                .await?;
            Ok(settlement)
        })?;

        tracing::info!(%group_id, %settlement_id, "settlement updated");
        Ok(settlement)
    }

    /// Delete a settlement and its mirrored personal entry (admin-only).
    pub async fn delete_settlement(
        &self,
        caller: &Caller,
        settlement_id: Uuid,
    ) -> ResultEngine<()> {
        let group_id = self.settlement_group_id(settlement_id).await?;

        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, group_id, caller).await?;
            let settlement = settlements::Entity::find_by_id(settlement_id)
                .one(&db_tx)
                .await?
                .ok_or_else(settlement_not_found)?;

            if let Some(mirror_id) = settlement.personal_transaction_id {
                personal_transactions::Entity::delete_by_id(mirror_id)
                    .exec(&db_tx)
                    .await?;
            }
            settlements::Entity::delete_by_id(settlement_id)
                .exec(&db_tx)
                .await?;
            Ok(())
        })?;

        tracing::info!(%group_id, %settlement_id, "settlement deleted");
        Ok(())
    }

    /// Settlements of a group, most recent first.
    pub async fn list_settlements(
        &self,
        caller: &Caller,
        group_id: Uuid,
    ) -> ResultEngine<Vec<Settlement>> {
        self.require_group(&self.database, group_id, caller).await?;
        self.load_settlements(&self.database, group_id).await
    }

    async fn settlement_group_id(&self, settlement_id: Uuid) -> ResultEngine<Uuid> {
        settlements::Entity::find_by_id(settlement_id)
            .one(&self.database)
            .await?
            .map(|m| m.group_id)
            .ok_or_else(settlement_not_found)
    }
}

fn validate_transfer(from: Uuid, to: Uuid, amount: MoneyCents) -> ResultEngine<()> {
    if !amount.is_positive() {
        return Err(EngineError::InvalidAmount(format!(
            "settlement amount must be > 0, got {amount}"
        )));
    }
    if from == to {
        return Err(EngineError::InvalidAmount(
            "a settlement needs two different members".to_string(),
        ));
    }
    Ok(())
}

/// Kind of the personal entry mirroring a transfer for `user_id`, if that
/// user is one of its sides.
fn mirror_kind(user_id: &str, from: &Member, to: &Member) -> Option<&'static str> {
    if from.is_linked_to(user_id) {
        Some(KIND_EXPENSE)
    } else if to.is_linked_to(user_id) {
        Some(KIND_INCOME)
    } else {
        None
    }
}

fn mirror_note(group: &Group, settlement: &Settlement) -> String {
    match settlement.note.as_deref() {
        Some(note) => format!("{}: {note}", group.name),
        None => format!("{}: settlement", group.name),
    }
}

async fn insert_mirror<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    kind: &str,
    group: &Group,
    settlement: &Settlement,
) -> ResultEngine<Uuid> {
    let id = Uuid::new_v4();
    personal_transactions::ActiveModel {
        id: ActiveValue::Set(id),
        user_id: ActiveValue::Set(user_id.to_string()),
        kind: ActiveValue::Set(kind.to_string()),
        amount_minor: ActiveValue::Set(settlement.amount.cents()),
        currency: ActiveValue::Set(group.currency.code().to_string()),
        occurred_on: ActiveValue::Set(settlement.settled_on),
        note: ActiveValue::Set(Some(mirror_note(group, settlement))),
        created_at: ActiveValue::Set(Utc::now()),
    }
    .insert(db)
    .await?;
    Ok(id)
}
