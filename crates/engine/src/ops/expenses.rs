use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, TransactionTrait, prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    Caller, EngineError, Expense, ExpenseCmd, PayerEntry, ResultEngine, SplitEntry,
    allocate_payers, allocate_splits, expense_payers, expense_splits, expenses,
};

use super::{Engine, access::active_member_ids, with_tx};

fn expense_not_found() -> EngineError {
    EngineError::KeyNotFound("expense not exists".to_string())
}

impl Engine {
    /// Record an expense with its payers and splits.
    ///
    /// Resubmitting a command with an already used idempotency key returns
    /// the id of the first expense and writes nothing.
    pub async fn add_expense(&self, caller: &Caller, cmd: ExpenseCmd) -> ResultEngine<Uuid> {
        let description = normalize_description(&cmd.description)?;
        let group_id = cmd.group_id;

        let _guard = self.lock_group(group_id).await;
        let (expense_id, created) = with_tx!(self, |db_tx| {
            let (group, _) = self.require_group(&db_tx, group_id, caller).await?;
            group.ensure_active()?;

            let previous = match cmd.idempotency_key.as_deref() {
                Some(key) => {
                    expenses::Entity::find()
                        .filter(expenses::Column::GroupId.eq(group_id))
                        .filter(expenses::Column::CreatedBy.eq(caller.user_id.clone()))
                        .filter(expenses::Column::IdempotencyKey.eq(key.to_string()))
                        .one(&db_tx)
                        .await?
                }
                None => None,
            };

            match previous {
                Some(existing) => Ok((existing.id, false)),
                None => {
                    let members = self.load_members(&db_tx, group_id).await?;
                    let expense = build_expense(
                        Uuid::new_v4(),
                        &cmd,
                        description,
                        &active_member_ids(&members),
                        caller.user_id.clone(),
                        &HashMap::new(),
                    )?;

                    let mut model = expenses::ActiveModel::from(&expense);
                    model.idempotency_key = ActiveValue::Set(cmd.idempotency_key.clone());
                    model.insert(&db_tx).await?;
                    insert_children(&db_tx, &expense).await?;

                    Ok((expense.id, true))
                }
            }
        })?;

        if created {
            tracing::info!(%group_id, %expense_id, amount = %cmd.amount, "expense recorded");
        } else {
            tracing::debug!(%group_id, %expense_id, "expense resubmitted, returning existing");
        }
        Ok(expense_id)
    }

    /// Replace an expense and all of its payer and split rows.
    ///
    /// Any member may edit unless the ledger policy restricts edits to the
    /// admin.
    pub async fn update_expense(
        &self,
        caller: &Caller,
        expense_id: Uuid,
        cmd: ExpenseCmd,
    ) -> ResultEngine<Expense> {
        let description = normalize_description(&cmd.description)?;
        let group_id = self.expense_group_id(expense_id).await?;
        if cmd.group_id != group_id {
            return Err(EngineError::InvalidId(format!(
                "expense {expense_id} does not belong to group {}",
                cmd.group_id
            )));
        }

        let _guard = self.lock_group(group_id).await;
        let expense = with_tx!(self, |db_tx| {
            let (group, _) = if self.policy.expense_edit_requires_admin {
                self.require_admin(&db_tx, group_id, caller).await?
            } else {
                self.require_group(&db_tx, group_id, caller).await?
            };
            group.ensure_active()?;

            let current = self
                .find_expense(&db_tx, expense_id)
                .await?
                .ok_or_else(expense_not_found)?;
            let paid_flags: HashMap<Uuid, bool> = current
                .splits
                .iter()
                .map(|s| (s.member_id, s.is_paid))
                .collect();

            // Members already on the expense keep their place after removal.
            let members = self.load_members(&db_tx, group_id).await?;
            let mut eligible = active_member_ids(&members);
            eligible.extend(current.effective_payers().iter().map(|p| p.member_id));
            eligible.extend(current.splits.iter().map(|s| s.member_id));
            eligible.sort();
            eligible.dedup();

            let mut expense = build_expense(
                expense_id,
                &cmd,
                description,
                &eligible,
                current.created_by,
                &paid_flags,
            )?;
            expense.created_at = current.created_at;

            expenses::ActiveModel::from(&expense).update(&db_tx).await?;
            delete_children(&db_tx, expense_id).await?;
            insert_children(&db_tx, &expense).await?;

            Ok(expense)
        })?;

        tracing::info!(%group_id, %expense_id, "expense updated");
        Ok(expense)
    }

    /// Delete an expense and its rows (admin-only).
    pub async fn delete_expense(&self, caller: &Caller, expense_id: Uuid) -> ResultEngine<()> {
        let group_id = self.expense_group_id(expense_id).await?;

        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, group_id, caller).await?;
            delete_children(&db_tx, expense_id).await?;
            let result = expenses::Entity::delete_by_id(expense_id)
                .exec(&db_tx)
                .await?;
            if result.rows_affected == 0 {
                return Err(expense_not_found());
            }
            Ok(())
        })?;

        tracing::info!(%group_id, %expense_id, "expense deleted");
        Ok(())
    }

    /// Return one expense with its payers and splits.
    pub async fn expense(&self, caller: &Caller, expense_id: Uuid) -> ResultEngine<Expense> {
        let expense = self
            .find_expense(&self.database, expense_id)
            .await?
            .ok_or_else(expense_not_found)?;
        self.require_group(&self.database, expense.group_id, caller)
            .await
            .map_err(|_| expense_not_found())?;
        Ok(expense)
    }

    /// Expenses of a group, most recent first.
    pub async fn list_expenses(&self, caller: &Caller, group_id: Uuid) -> ResultEngine<Vec<Expense>> {
        self.require_group(&self.database, group_id, caller).await?;
        self.load_expenses(&self.database, group_id).await
    }

    /// Mark one member's share of an expense as paid or unpaid.
    ///
    /// Allowed for the member owning the share and for the admin. The flag is
    /// informational and does not change balances.
    pub async fn set_split_paid(
        &self,
        caller: &Caller,
        expense_id: Uuid,
        member_id: Uuid,
        is_paid: bool,
    ) -> ResultEngine<()> {
        let group_id = self.expense_group_id(expense_id).await?;

        let _guard = self.lock_group(group_id).await;
        with_tx!(self, |db_tx| {
            let (group, own) = self.require_group(&db_tx, group_id, caller).await?;
            if own.id != member_id && !group.is_admin(&caller.user_id) {
                return Err(EngineError::Forbidden(
                    "only the member or the admin can change this share".to_string(),
                ));
            }

            let result = expense_splits::Entity::update_many()
                .col_expr(expense_splits::Column::IsPaid, Expr::value(is_paid))
                .filter(expense_splits::Column::ExpenseId.eq(expense_id))
                .filter(expense_splits::Column::MemberId.eq(member_id))
                .exec(&db_tx)
                .await?;
            if result.rows_affected == 0 {
                return Err(EngineError::KeyNotFound("split not exists".to_string()));
            }
            Ok(())
        })
    }

    async fn expense_group_id(&self, expense_id: Uuid) -> ResultEngine<Uuid> {
        expenses::Entity::find_by_id(expense_id)
            .one(&self.database)
            .await?
            .map(|m| m.group_id)
            .ok_or_else(expense_not_found)
    }
}

fn normalize_description(description: &str) -> ResultEngine<String> {
    let description = description.trim();
    if description.is_empty() {
        return Err(EngineError::InvalidName(
            "expense description must not be empty".to_string(),
        ));
    }
    Ok(description.to_string())
}

/// Validate `cmd` against the active members and build the expense to
/// persist. Nothing is written here.
fn build_expense(
    id: Uuid,
    cmd: &ExpenseCmd,
    description: String,
    members: &[Uuid],
    created_by: String,
    paid_flags: &HashMap<Uuid, bool>,
) -> ResultEngine<Expense> {
    let payers = allocate_payers(cmd.amount, &cmd.payers, members)?;
    let splits = allocate_splits(cmd.amount, &cmd.split, members)?;

    let paid_by = match payers.as_slice() {
        [single] => Some(single.member_id),
        _ => None,
    };

    Ok(Expense {
        id,
        group_id: cmd.group_id,
        description,
        amount: cmd.amount,
        split_type: cmd.split.split_type(),
        expense_date: cmd.expense_date,
        notes: crate::util::normalize_optional_text(cmd.notes.as_deref()),
        paid_by,
        created_by,
        created_at: Utc::now(),
        payers: payers
            .into_iter()
            .map(|p| PayerEntry {
                member_id: p.member_id,
                amount: p.amount,
            })
            .collect(),
        splits: splits
            .into_iter()
            .map(|s| SplitEntry {
                member_id: s.member_id,
                amount: s.amount,
                percentage: s.percentage,
                is_paid: paid_flags.get(&s.member_id).copied().unwrap_or(false),
            })
            .collect(),
    })
}

async fn insert_children<C: ConnectionTrait>(db: &C, expense: &Expense) -> ResultEngine<()> {
    for payer in &expense.payers {
        expense_payers::ActiveModel {
            expense_id: ActiveValue::Set(expense.id),
            member_id: ActiveValue::Set(payer.member_id),
            amount_minor: ActiveValue::Set(payer.amount.cents()),
        }
        .insert(db)
        .await?;
    }
    for split in &expense.splits {
        expense_splits::ActiveModel {
            expense_id: ActiveValue::Set(expense.id),
            member_id: ActiveValue::Set(split.member_id),
            amount_minor: ActiveValue::Set(split.amount.cents()),
            percentage_bp: ActiveValue::Set(split.percentage.map(|p| p.basis_points())),
            is_paid: ActiveValue::Set(split.is_paid),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

async fn delete_children<C: ConnectionTrait>(db: &C, expense_id: Uuid) -> ResultEngine<()> {
    expense_payers::Entity::delete_many()
        .filter(expense_payers::Column::ExpenseId.eq(expense_id))
        .exec(db)
        .await?;
    expense_splits::Entity::delete_many()
        .filter(expense_splits::Column::ExpenseId.eq(expense_id))
        .exec(db)
        .await?;
    Ok(())
}
