use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use split_engine::EngineError;

use serde::Serialize;
pub use server::{ServerState, router, run_with_listener};

mod balances;
mod expenses;
mod groups;
mod members;
mod server;
mod settlements;
mod user;
mod views;

pub mod types {
    pub mod group {
        pub use api_types::group::{
            GroupCategory, GroupNew, GroupPreview, GroupUpdate, GroupView, GroupsResponse,
            InviteLink,
        };
    }

    pub mod member {
        pub use api_types::member::{
            JoinConfirm, JoinRequest, JoinResponse, JoinStatus, MemberNew, MemberView,
            MembersResponse,
        };
    }

    pub mod expense {
        pub use api_types::expense::{
            ExpenseCreated, ExpenseNew, ExpenseView, ExpensesResponse, PayerInput, SplitInput,
            SplitPaid, SplitType,
        };
    }

    pub mod settlement {
        pub use api_types::settlement::{
            SettlementNew, SettlementUpdate, SettlementView, SettlementsResponse,
            SuggestionsResponse,
        };
    }

    pub mod balance {
        pub use api_types::balance::{BalancesResponse, MemberBalanceView};
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_) | EngineError::Conflict(_) | EngineError::InvalidState(_) => {
            StatusCode::CONFLICT
        }
        EngineError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::InvalidAmount(_)
        | EngineError::InvalidName(_)
        | EngineError::InvalidId(_)
        | EngineError::PayerMismatch { .. }
        | EngineError::SplitMismatch { .. }
        | EngineError::PercentageMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    if err.is_retryable() {
        tracing::error!("retryable engine failure: {err}");
        return "service unavailable, retry later".to_string();
    }
    err.to_string()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let retryable = matches!(&self, ServerError::Engine(err) if err.is_retryable());
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        let mut response = (status, Json(Error { error })).into_response();
        if retryable {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
