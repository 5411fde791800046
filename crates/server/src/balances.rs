//! Balances and suggested transfers of a group.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use api_types::{
    balance::{BalancesResponse, MemberBalanceView},
    settlement::{SuggestionView, SuggestionsResponse},
};

use crate::{ServerError, server::ServerState, user, views::currency_view};

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<BalancesResponse>, ServerError> {
    let group_balances = state
        .engine
        .group_balances(&user.caller(), group_id)
        .await?;

    // Members that left keep their row as long as history refers to them.
    let balances = group_balances
        .members
        .iter()
        .filter_map(|member| {
            let balance = group_balances.balances.get(&member.id)?;
            Some(MemberBalanceView {
                member_id: member.id,
                name: member.name.clone(),
                paid_minor: balance.paid.cents(),
                owed_minor: balance.owed.cents(),
                settled_out_minor: balance.settled_out.cents(),
                settled_in_minor: balance.settled_in.cents(),
                net_minor: balance.net().cents(),
            })
        })
        .collect();

    Ok(Json(BalancesResponse {
        currency: currency_view(group_balances.currency),
        balances,
        total_minor: group_balances.total().cents(),
    }))
}

pub async fn suggestions(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<SuggestionsResponse>, ServerError> {
    let suggestions = state
        .engine
        .settlement_suggestions(&user.caller(), group_id)
        .await?
        .into_iter()
        .map(|suggestion| SuggestionView {
            from_member_id: suggestion.from_member_id,
            to_member_id: suggestion.to_member_id,
            amount_minor: suggestion.amount.cents(),
        })
        .collect();

    Ok(Json(SuggestionsResponse { suggestions }))
}
