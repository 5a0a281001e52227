use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub firebase_uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct History {
    pub id: Uuid,
    pub firebase_uid: String,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CreateHistory {
    pub value: f64,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct UpdateHistory {
    pub value: Option<f64>,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize)]
pub struct Total {
    pub total: u64,
}

/// The `{success, data, error}` body every route answers with.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// A failed request, rendered as `{success: false, error}` with `status`.
pub struct Failure {
    status: StatusCode,
    message: &'static str,
}

impl Failure {
    const UNAUTHORIZED: Failure = Failure {
        status: StatusCode::UNAUTHORIZED,
        message: "missing bearer token",
    };
    const HISTORY_NOT_FOUND: Failure = Failure {
        status: StatusCode::NOT_FOUND,
        message: "history not found",
    };
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let body = Envelope::<()> {
            success: false,
            data: None,
            error: Some(self.message.to_string()),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<Envelope<T>>, Failure>;

#[derive(Default)]
pub struct Store {
    users: HashMap<String, User>,
    histories: HashMap<String, Vec<History>>,
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    app_with_db(Db::default())
}

pub fn app_with_db(db: Db) -> Router {
    Router::new()
        .route("/api/v1/users/{user_id}", get(get_user))
        .route(
            "/api/v1/users/{user_id}/histories",
            get(list_histories).post(create_history),
        )
        .route(
            "/api/v1/users/{user_id}/histories/{history_id}",
            put(update_history).delete(delete_history),
        )
        .route("/api/v1/histories/total", get(histories_total))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Bind an ephemeral local port and serve on the current runtime.
pub async fn spawn() -> Result<SocketAddr, std::io::Error> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(error) = run(listener).await {
            tracing::error!(%error, "mock server stopped");
        }
    });
    info!(%addr, "mock server listening");
    Ok(addr)
}

/// Any non-empty bearer token is accepted.
fn authorize(headers: &HeaderMap) -> Result<(), Failure> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or_default();
    if token.is_empty() {
        return Err(Failure::UNAUTHORIZED);
    }
    Ok(())
}

async fn get_user(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> ApiResult<User> {
    authorize(&headers)?;
    let mut store = db.write().await;
    let user = store
        .users
        .entry(user_id.clone())
        .or_insert_with(|| User {
            firebase_uid: user_id,
            email: None,
            display_name: None,
            created_at: Utc::now(),
        })
        .clone();
    Ok(Json(Envelope::ok(user)))
}

async fn list_histories(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<History>> {
    authorize(&headers)?;
    let store = db.read().await;
    let histories = store.histories.get(&user_id).cloned().unwrap_or_default();
    Ok(Json(Envelope::ok(histories)))
}

async fn create_history(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(input): Json<CreateHistory>,
) -> Result<(StatusCode, Json<Envelope<History>>), Failure> {
    authorize(&headers)?;
    let history = History {
        id: Uuid::new_v4(),
        firebase_uid: user_id.clone(),
        value: input.value,
        recorded_at: input.recorded_at.unwrap_or_else(Utc::now),
    };
    debug!(user_id = %user_id, id = %history.id, "created history");
    db.write()
        .await
        .histories
        .entry(user_id)
        .or_default()
        .push(history.clone());
    Ok((StatusCode::CREATED, Json(Envelope::ok(history))))
}

async fn update_history(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((user_id, history_id)): Path<(String, Uuid)>,
    Json(input): Json<UpdateHistory>,
) -> ApiResult<History> {
    authorize(&headers)?;
    let mut store = db.write().await;
    let history = store
        .histories
        .get_mut(&user_id)
        .and_then(|list| list.iter_mut().find(|h| h.id == history_id))
        .ok_or(Failure::HISTORY_NOT_FOUND)?;
    if let Some(value) = input.value {
        history.value = value;
    }
    if let Some(recorded_at) = input.recorded_at {
        history.recorded_at = recorded_at;
    }
    Ok(Json(Envelope::ok(history.clone())))
}

async fn delete_history(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((user_id, history_id)): Path<(String, Uuid)>,
) -> ApiResult<()> {
    authorize(&headers)?;
    let mut store = db.write().await;
    let list = store
        .histories
        .get_mut(&user_id)
        .ok_or(Failure::HISTORY_NOT_FOUND)?;
    let before = list.len();
    list.retain(|h| h.id != history_id);
    if list.len() == before {
        return Err(Failure::HISTORY_NOT_FOUND);
    }
    debug!(user_id = %user_id, id = %history_id, "deleted history");
    Ok(Json(Envelope {
        success: true,
        data: None,
        error: None,
    }))
}

async fn histories_total(State(db): State<Db>) -> ApiResult<Total> {
    let store = db.read().await;
    let total = store.histories.values().map(|list| list.len() as u64).sum();
    Ok(Json(Envelope::ok(Total { total })))
}
