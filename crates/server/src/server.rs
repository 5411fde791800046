use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use std::sync::Arc;

use crate::{balances, expenses, groups, members, settlements, user};
use split_engine::Engine;

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub db: DatabaseConnection,
    /// Origin used to build invite links, e.g. `https://split.example.com`.
    pub public_origin: String,
}

async fn auth(
    auth_header: TypedHeader<Authorization<Basic>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth_header.username().is_empty() || auth_header.password().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let user: Option<user::Model> = user::Entity::find()
        .filter(user::Column::Username.eq(auth_header.username()))
        .filter(user::Column::Password.eq(auth_header.password()))
        .one(&state.db)
        .await
        .map_err(|err| {
            tracing::error!("failed to look up user: {err}");
            StatusCode::SERVICE_UNAVAILABLE
        })?;

    let Some(user) = user else {
        tracing::debug!(username = auth_header.username(), "rejected credentials");
        return Err(StatusCode::UNAUTHORIZED);
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/groups", get(groups::list).post(groups::group_new))
        .route("/groups/{id}", get(groups::get).patch(groups::update))
        .route("/groups/{id}/settle", post(groups::mark_settled))
        .route(
            "/groups/{id}/invite",
            get(groups::invite_link).post(groups::regenerate_invite),
        )
        .route(
            "/groups/{id}/members",
            get(members::list).post(members::add),
        )
        .route("/groups/{id}/members/{member_id}", delete(members::remove))
        .route("/groups/{id}/leave", post(members::leave))
        .route(
            "/groups/{id}/expenses",
            get(expenses::list).post(expenses::expense_new),
        )
        .route(
            "/groups/{id}/settlements",
            get(settlements::list).post(settlements::settlement_new),
        )
        .route("/groups/{id}/balances", get(balances::get))
        .route("/groups/{id}/suggestions", get(balances::suggestions))
        .route("/invites/{code}", get(groups::preview))
        .route("/join", post(members::join))
        .route("/join/confirm", post(members::confirm))
        .route(
            "/expenses/{id}",
            get(expenses::get)
                .put(expenses::update)
                .delete(expenses::delete),
        )
        .route(
            "/expenses/{id}/splits/{member_id}/paid",
            put(expenses::set_split_paid),
        )
        .route(
            "/settlements/{id}",
            axum::routing::patch(settlements::update).delete(settlements::delete),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        .with_state(state)
}

pub async fn run_with_listener(
    engine: Engine,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
    public_origin: String,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
        db,
        public_origin,
    };

    axum::serve(listener, router(state)).await
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use http_body_util::BodyExt;
    use migration::MigratorTrait;
    use sea_orm::{ActiveModelTrait, ActiveValue, Database};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    async fn test_router() -> Router {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        for (username, email) in [("alice", None), ("bob", Some("bob@example.com"))] {
            user::ActiveModel {
                username: ActiveValue::Set(username.to_string()),
                password: ActiveValue::Set("secret".to_string()),
                email: ActiveValue::Set(email.map(str::to_string)),
            }
            .insert(&db)
            .await
            .unwrap();
        }
        let engine = Engine::builder().database(db.clone()).build().await.unwrap();

        router(ServerState {
            engine: Arc::new(engine),
            db,
            public_origin: "https://split.example.com".to_string(),
        })
    }

    fn basic(username: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
    }

    async fn call(
        router: &Router,
        method: Method,
        uri: &str,
        username: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, basic(username, "secret"));
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let router = test_router().await;
        let request = Request::builder()
            .uri("/groups")
            .header(header::AUTHORIZATION, basic("alice", "nope"))
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn group_lifecycle_over_http() {
        let router = test_router().await;

        let (status, group) = call(
            &router,
            Method::POST,
            "/groups",
            "alice",
            Some(json!({"name": "Ski week", "currency": "EUR", "display_name": "Alice"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(group["is_admin"], true);
        let group_id = group["id"].as_str().unwrap().to_string();

        let (status, invite) = call(
            &router,
            Method::GET,
            &format!("/groups/{group_id}/invite"),
            "alice",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let link = invite["link"].as_str().unwrap();
        assert!(link.starts_with("https://split.example.com/s/ski-week-tharwanet-"));

        let (status, joined) = call(
            &router,
            Method::POST,
            "/join",
            "bob",
            Some(json!({"code": invite["code"], "display_name": "Bob"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(joined["status"], "joined");
        let bob_id = joined["member"]["id"].as_str().unwrap().to_string();

        let (_, members) = call(
            &router,
            Method::GET,
            &format!("/groups/{group_id}/members"),
            "bob",
            None,
        )
        .await;
        let alice_id = members["members"][0]["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            &router,
            Method::POST,
            &format!("/groups/{group_id}/expenses"),
            "bob",
            Some(json!({
                "description": "Chalet",
                "amount_minor": 300_00,
                "payers": [{"member_id": alice_id}],
                "split": {"type": "equal"},
                "expense_date": "2026-02-01"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, suggestions) = call(
            &router,
            Method::GET,
            &format!("/groups/{group_id}/suggestions"),
            "alice",
            None,
        )
        .await;
        assert_eq!(
            suggestions["suggestions"],
            json!([{"from_member_id": bob_id, "to_member_id": alice_id, "amount_minor": 150_00}])
        );

        let (status, settlement) = call(
            &router,
            Method::POST,
            &format!("/groups/{group_id}/settlements"),
            "bob",
            Some(json!({
                "from_member_id": bob_id,
                "to_member_id": alice_id,
                "amount_minor": 150_00,
                "settled_on": "2026-02-03",
                "mirror": true
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(settlement["mirrored"], true);

        let (_, balances) = call(
            &router,
            Method::GET,
            &format!("/groups/{group_id}/balances"),
            "alice",
            None,
        )
        .await;
        assert_eq!(balances["total_minor"], 0);
        assert!(
            balances["balances"]
                .as_array()
                .unwrap()
                .iter()
                .all(|b| b["net_minor"] == 0)
        );

        let (status, group) = call(
            &router,
            Method::POST,
            &format!("/groups/{group_id}/settle"),
            "alice",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(group["is_settled"], true);
    }

    #[tokio::test]
    async fn engine_errors_keep_their_status() {
        let router = test_router().await;
        let (_, group) = call(
            &router,
            Method::POST,
            "/groups",
            "alice",
            Some(json!({"name": "Flat"})),
        )
        .await;
        let group_id = group["id"].as_str().unwrap().to_string();

        // Not a member: the group is invisible.
        let (status, body) = call(
            &router,
            Method::GET,
            &format!("/groups/{group_id}"),
            "bob",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());

        let (_, members) = call(
            &router,
            Method::GET,
            &format!("/groups/{group_id}/members"),
            "alice",
            None,
        )
        .await;
        let alice_id = members["members"][0]["id"].as_str().unwrap().to_string();
        let mut shares = serde_json::Map::new();
        shares.insert(alice_id.clone(), json!(90_00));

        let (status, _) = call(
            &router,
            Method::POST,
            &format!("/groups/{group_id}/expenses"),
            "alice",
            Some(json!({
                "description": "Rent",
                "amount_minor": 100_00,
                "payers": [{"member_id": alice_id}],
                "split": {"type": "custom", "shares": shares},
                "expense_date": "2026-03-01"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = call(
            &router,
            Method::POST,
            &format!("/groups/{group_id}/leave"),
            "alice",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
