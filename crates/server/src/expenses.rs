//! Expense endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use api_types::expense::{
    ExpenseCreated, ExpenseNew, ExpenseView, ExpensesResponse, PayerView, SplitInput, SplitPaid,
    SplitType as SplitTypeView, SplitView,
};
use split_engine::{Expense, ExpenseCmd, MoneyCents, Percentage, SplitStrategy, SplitType};

use crate::{ServerError, server::ServerState, user};

fn split_strategy(input: SplitInput) -> SplitStrategy {
    match input.split_type {
        SplitTypeView::Equal => SplitStrategy::Equal,
        SplitTypeView::Percentage => SplitStrategy::Percentage(
            input
                .shares
                .into_iter()
                .map(|(member_id, bp)| (member_id, Percentage::from_basis_points(bp)))
                .collect(),
        ),
        SplitTypeView::Custom => SplitStrategy::Custom(
            input
                .shares
                .into_iter()
                .map(|(member_id, cents)| (member_id, MoneyCents::new(cents)))
                .collect(),
        ),
    }
}

fn expense_cmd(group_id: Uuid, payload: ExpenseNew) -> ExpenseCmd {
    let mut cmd = ExpenseCmd::new(
        group_id,
        payload.description,
        MoneyCents::new(payload.amount_minor),
        payload.expense_date,
    )
    .split(split_strategy(payload.split));
    for payer in payload.payers {
        cmd = cmd.payer(payer.member_id, MoneyCents::new(payer.amount_minor));
    }
    if let Some(notes) = payload.notes {
        cmd = cmd.notes(notes);
    }
    if let Some(key) = payload.idempotency_key {
        cmd = cmd.idempotency_key(key);
    }
    cmd
}

fn expense_view(expense: Expense) -> ExpenseView {
    ExpenseView {
        payers: expense
            .effective_payers()
            .into_iter()
            .map(|payer| PayerView {
                member_id: payer.member_id,
                amount_minor: payer.amount.cents(),
            })
            .collect(),
        splits: expense
            .splits
            .iter()
            .map(|split| SplitView {
                member_id: split.member_id,
                amount_minor: split.amount.cents(),
                percentage_bp: split.percentage.map(Percentage::basis_points),
                is_paid: split.is_paid,
            })
            .collect(),
        split_type: match expense.split_type {
            SplitType::Equal => SplitTypeView::Equal,
            SplitType::Percentage => SplitTypeView::Percentage,
            SplitType::Custom => SplitTypeView::Custom,
        },
        id: expense.id,
        group_id: expense.group_id,
        description: expense.description,
        amount_minor: expense.amount.cents(),
        expense_date: expense.expense_date,
        notes: expense.notes,
        created_by: expense.created_by,
        created_at: expense.created_at,
    }
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<ExpensesResponse>, ServerError> {
    let expenses = state
        .engine
        .list_expenses(&user.caller(), group_id)
        .await?
        .into_iter()
        .map(expense_view)
        .collect();

    Ok(Json(ExpensesResponse { expenses }))
}

pub async fn expense_new(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<ExpenseNew>,
) -> Result<(StatusCode, Json<ExpenseCreated>), ServerError> {
    let id = state
        .engine
        .add_expense(&user.caller(), expense_cmd(group_id, payload))
        .await?;
    Ok((StatusCode::CREATED, Json(ExpenseCreated { id })))
}

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(expense_id): Path<Uuid>,
) -> Result<Json<ExpenseView>, ServerError> {
    let expense = state.engine.expense(&user.caller(), expense_id).await?;
    Ok(Json(expense_view(expense)))
}

/// Replace an expense with a new description, amount, payers and split.
pub async fn update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(expense_id): Path<Uuid>,
    Json(payload): Json<ExpenseNew>,
) -> Result<Json<ExpenseView>, ServerError> {
    let caller = user.caller();
    let current = state.engine.expense(&caller, expense_id).await?;
    let expense = state
        .engine
        .update_expense(&caller, expense_id, expense_cmd(current.group_id, payload))
        .await?;
    Ok(Json(expense_view(expense)))
}

pub async fn delete(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(expense_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_expense(&user.caller(), expense_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_split_paid(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((expense_id, member_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SplitPaid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .set_split_paid(&user.caller(), expense_id, member_id, payload.is_paid)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
