//! Membership endpoints: placeholders, joins through invite codes, leaving.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use api_types::member::{
    JoinConfirm, JoinRequest, JoinResponse, JoinStatus, MemberNew, MemberView, MembersResponse,
};
use split_engine::{JoinCmd, JoinOutcome};

use crate::{ServerError, server::ServerState, user, views::member_view};

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<MembersResponse>, ServerError> {
    let members = state
        .engine
        .list_members(&user.caller(), group_id)
        .await?
        .into_iter()
        .map(member_view)
        .collect();

    Ok(Json(MembersResponse { members }))
}

pub async fn add(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<MemberNew>,
) -> Result<(StatusCode, Json<MemberView>), ServerError> {
    let member = state
        .engine
        .add_member(
            &user.caller(),
            group_id,
            &payload.name,
            payload.email.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(member_view(member))))
}

pub async fn remove(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((group_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .remove_member(&user.caller(), group_id, member_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn leave(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.leave_group(&user.caller(), group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Join through an invite code. A placeholder with the same name is only
/// suggested (`confirm_placeholder`); nothing is written in that case.
pub async fn join(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, ServerError> {
    let mut cmd = JoinCmd::new(payload.code, payload.display_name);
    if payload.force_new {
        cmd = cmd.force_new();
    }

    let (status, member) = match state.engine.join_group(&user.caller(), cmd).await? {
        JoinOutcome::AlreadyMember { member } => (JoinStatus::AlreadyMember, member),
        JoinOutcome::Rejoined { member } => (JoinStatus::Rejoined, member),
        JoinOutcome::LinkedByEmail { member } => (JoinStatus::LinkedByEmail, member),
        JoinOutcome::PlaceholderMatch { placeholder, .. } => {
            (JoinStatus::ConfirmPlaceholder, placeholder)
        }
        JoinOutcome::Joined { member } => (JoinStatus::Joined, member),
    };

    Ok(Json(JoinResponse {
        status,
        group_id: member.group_id,
        member: member_view(member),
    }))
}

pub async fn confirm(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<JoinConfirm>,
) -> Result<Json<JoinResponse>, ServerError> {
    let member = state
        .engine
        .confirm_placeholder_link(
            &user.caller(),
            &payload.code,
            payload.member_id,
            payload.display_name.as_deref(),
        )
        .await?;

    Ok(Json(JoinResponse {
        status: JoinStatus::Joined,
        group_id: member.group_id,
        member: member_view(member),
    }))
}
