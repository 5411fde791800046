//! Group registry endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use api_types::group::{GroupNew, GroupPreview, GroupUpdate, GroupView, GroupsResponse, InviteLink};
use split_engine::{GroupPatch, NewGroupCmd};

use crate::{
    ServerError,
    server::ServerState,
    user,
    views::{category_from_view, currency_from_view, currency_view, group_view},
};

pub async fn group_new(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<GroupNew>,
) -> Result<(StatusCode, Json<GroupView>), ServerError> {
    let mut cmd = NewGroupCmd::new(
        payload.name,
        payload.currency.map(currency_from_view).unwrap_or_default(),
    )
    .category(category_from_view(payload.category));
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    if let Some(display_name) = payload.display_name {
        cmd = cmd.creator_name(display_name);
    }

    let group = state.engine.create_group(&user.caller(), cmd).await?;
    Ok((StatusCode::CREATED, Json(group_view(group, &user.username))))
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<GroupsResponse>, ServerError> {
    let groups = state
        .engine
        .list_groups(&user.caller())
        .await?
        .into_iter()
        .map(|group| group_view(group, &user.username))
        .collect();

    Ok(Json(GroupsResponse { groups }))
}

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<GroupView>, ServerError> {
    let group = state.engine.group(&user.caller(), group_id).await?;
    Ok(Json(group_view(group, &user.username)))
}

pub async fn update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<GroupUpdate>,
) -> Result<Json<GroupView>, ServerError> {
    let patch = GroupPatch {
        name: payload.name,
        description: payload.description,
        category: payload.category.map(category_from_view),
        currency: payload.currency.map(currency_from_view),
        is_active: payload.is_active,
    };
    let group = state
        .engine
        .update_group_settings(&user.caller(), group_id, patch)
        .await?;
    Ok(Json(group_view(group, &user.username)))
}

pub async fn mark_settled(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<GroupView>, ServerError> {
    let group = state.engine.mark_settled(&user.caller(), group_id).await?;
    Ok(Json(group_view(group, &user.username)))
}

pub async fn invite_link(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<InviteLink>, ServerError> {
    let caller = user.caller();
    let group = state.engine.group(&caller, group_id).await?;
    let link = state
        .engine
        .invite_link(&caller, group_id, &state.public_origin)
        .await?;

    Ok(Json(InviteLink {
        code: group.invite_code,
        link,
    }))
}

pub async fn regenerate_invite(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<InviteLink>, ServerError> {
    let caller = user.caller();
    let code = state
        .engine
        .regenerate_invite_code(&caller, group_id)
        .await?;
    let link = state
        .engine
        .invite_link(&caller, group_id, &state.public_origin)
        .await?;

    Ok(Json(InviteLink { code, link }))
}

/// Preview of the group behind an invite code or link segment.
pub async fn preview(
    _: Extension<user::Model>,
    State(state): State<ServerState>,
    Path(code): Path<String>,
) -> Result<Json<GroupPreview>, ServerError> {
    let preview = state.engine.group_by_invite_code(&code).await?;
    Ok(Json(GroupPreview {
        id: preview.id,
        name: preview.name,
        currency: currency_view(preview.currency),
        member_count: preview.member_count,
    }))
}
