//! Settlement ledger endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use api_types::settlement::{
    SettlementNew, SettlementUpdate, SettlementView, SettlementsResponse,
};
use split_engine::{MoneyCents, Settlement, SettlementCmd, SettlementPatch};

use crate::{ServerError, server::ServerState, user};

fn settlement_view(settlement: Settlement) -> SettlementView {
    SettlementView {
        mirrored: settlement.personal_transaction_id.is_some(),
        id: settlement.id,
        group_id: settlement.group_id,
        from_member_id: settlement.from_member_id,
        to_member_id: settlement.to_member_id,
        amount_minor: settlement.amount.cents(),
        settled_on: settlement.settled_on,
        note: settlement.note,
        created_by: settlement.created_by,
        created_at: settlement.created_at,
    }
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<SettlementsResponse>, ServerError> {
    let settlements = state
        .engine
        .list_settlements(&user.caller(), group_id)
        .await?
        .into_iter()
        .map(settlement_view)
        .collect();

    Ok(Json(SettlementsResponse { settlements }))
}

pub async fn settlement_new(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<SettlementNew>,
) -> Result<(StatusCode, Json<SettlementView>), ServerError> {
    let mut cmd = SettlementCmd::new(
        group_id,
        payload.from_member_id,
        payload.to_member_id,
        MoneyCents::new(payload.amount_minor),
        payload.settled_on,
    );
    if let Some(note) = payload.note {
        cmd = cmd.note(note);
    }
    if payload.mirror {
        cmd = cmd.mirror();
    }
    if let Some(key) = payload.idempotency_key {
        cmd = cmd.idempotency_key(key);
    }

    let settlement = state.engine.record_settlement(&user.caller(), cmd).await?;
    Ok((StatusCode::CREATED, Json(settlement_view(settlement))))
}

pub async fn update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(settlement_id): Path<Uuid>,
    Json(payload): Json<SettlementUpdate>,
) -> Result<Json<SettlementView>, ServerError> {
    let patch = SettlementPatch {
        from_member_id: payload.from_member_id,
        to_member_id: payload.to_member_id,
        amount: payload.amount_minor.map(MoneyCents::new),
        settled_on: payload.settled_on,
        note: payload.note,
    };
    let settlement = state
        .engine
        .update_settlement(&user.caller(), settlement_id, patch)
        .await?;
    Ok(Json(settlement_view(settlement)))
}

pub async fn delete(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(settlement_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_settlement(&user.caller(), settlement_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
