use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};

use super::auth::{self, AuthUser, SESSION_COOKIE, SessionStore, hash_password, verify_password};
use super::db::{DbError, DbHandle, UserRecord};
use crate::models::{ApiEnvelope, AuthSession, NewRequest, RequestId, RequestPatch};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub sessions: SessionStore,
    /// bcrypt cost for new password hashes.
    pub password_cost: u32,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(db: DbHandle, sessions: SessionStore, password_cost: u32) -> SharedState {
        Arc::new(Self {
            db,
            sessions,
            password_cost,
        })
    }
}

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterBody {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: Option<String>,
    pub password: Option<String>,
}

fn required(field: Option<String>) -> Option<String> {
    field.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(ApiEnvelope::failure(status.as_u16(), message))).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Invalid(msg) => ApiError::BadRequest(msg),
            DbError::NotFound(msg) => ApiError::NotFound(msg),
            DbError::Conflict(msg) => ApiError::Conflict(msg),
            DbError::Storage(e) => ApiError::Internal(format!("{:#}", e)),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Run CPU-bound work such as password hashing off the async workers.
async fn blocking<F, R>(f: F) -> Result<R, ApiError>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("worker task failed: {}", e)))
}

fn issue_token(state: &AppState, user: &UserRecord) -> Result<String, ApiError> {
    state
        .sessions
        .issue(&user.id)
        .map_err(|e| ApiError::Internal(format!("Failed to sign session token: {}", e)))
}

fn envelope<T: Serialize>(status: StatusCode, data: T, message: &str) -> Response {
    (status, Json(ApiEnvelope::ok(status.as_u16(), data, message))).into_response()
}

fn session_cookie(token: &str, max_age_secs: i64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let cookie = format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
        SESSION_COOKIE, token, max_age_secs
    );
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.insert(SET_COOKIE, value);
    }
    headers
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/core/equipment", get(list_equipment))
        .route("/api/v1/core/teams", get(list_teams))
        .route("/api/v1/users", get(list_users))
        .route(
            "/api/v1/core/requests",
            get(list_requests).post(create_request),
        )
        .route(
            "/api/v1/core/requests/{id}",
            put(update_request).delete(delete_request),
        )
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn register(
    State(state): State<SharedState>,
    payload: Result<Json<RegisterBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;
    let (Some(name), Some(email), Some(password)) = (
        required(body.name),
        required(body.email),
        required(body.password),
    ) else {
        return Err(ApiError::BadRequest("All fields are required".into()));
    };

    let cost = state.password_cost;
    let hash = blocking(move || hash_password(&password, cost))
        .await?
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))?;
    let user = state
        .db
        .call(move |db| db.create_user(&name, &email, hash))
        .await?;
    let token = issue_token(&state, &user)?;
    tracing::info!(user = %user.id, "user registered");

    let session = AuthSession {
        user: user.public(),
        token: token.clone(),
    };
    let max_age = auth::session_ttl().num_seconds();
    Ok((
        session_cookie(&token, max_age),
        envelope(StatusCode::CREATED, session, "User registered successfully"),
    )
        .into_response())
}

async fn login(
    State(state): State<SharedState>,
    payload: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;
    let (Some(email), Some(password)) = (required(body.email), required(body.password)) else {
        return Err(ApiError::BadRequest("Email and password are required".into()));
    };

    let user = state
        .db
        .call(move |db| Ok(db.find_user_by_email(&email).cloned()))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    let hash = user.password_hash.clone();
    if !blocking(move || verify_password(&password, &hash)).await? {
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let token = issue_token(&state, &user)?;
    tracing::info!(user = %user.id, "user logged in");
    let session = AuthSession {
        user: user.public(),
        token: token.clone(),
    };
    let max_age = auth::session_ttl().num_seconds();
    Ok((
        session_cookie(&token, max_age),
        envelope(StatusCode::OK, session, "Login successful"),
    )
        .into_response())
}

async fn logout(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    if let Some(token) = auth::token_from_headers(&headers)
        && let Some(entry) = state.sessions.revoke(&token)
        && let Err(err) = state.db.call(move |db| db.record_revocation(entry)).await
    {
        tracing::warn!(error = %err, "failed to persist logout");
    }
    (
        session_cookie("", 0),
        envelope(StatusCode::OK, (), "Logged out successfully"),
    )
        .into_response()
}

async fn list_equipment(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let equipment = state.db.call(|db| Ok(db.list_equipment())).await?;
    Ok(envelope(StatusCode::OK, equipment, "Equipment fetched"))
}

async fn list_teams(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let teams = state.db.call(|db| Ok(db.list_teams())).await?;
    Ok(envelope(StatusCode::OK, teams, "Teams fetched"))
}

async fn list_users(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let users = state.db.call(|db| Ok(db.list_users())).await?;
    Ok(envelope(StatusCode::OK, users, "Users fetched"))
}

async fn list_requests(
    State(state): State<SharedState>,
    _user: AuthUser,
) -> Result<Response, ApiError> {
    let requests = state.db.call(|db| Ok(db.list_requests())).await?;
    Ok(envelope(StatusCode::OK, requests, "Requests fetched"))
}

async fn create_request(
    State(state): State<SharedState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<NewRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(draft) = payload?;
    let record = state
        .db
        .call(move |db| db.create_request(draft, Some(user_id)))
        .await?;
    tracing::info!(id = %record.id, "request created");
    Ok(envelope(StatusCode::CREATED, record, "Request created"))
}

async fn update_request(
    State(state): State<SharedState>,
    _user: AuthUser,
    Path(id): Path<RequestId>,
    payload: Result<Json<RequestPatch>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(changes) = payload?;
    let record = state
        .db
        .call(move |db| db.update_request(&id, &changes))
        .await?;
    Ok(envelope(StatusCode::OK, record, "Request updated"))
}

async fn delete_request(
    State(state): State<SharedState>,
    _user: AuthUser,
    Path(id): Path<RequestId>,
) -> Result<Response, ApiError> {
    let removed = id.clone();
    state.db.call(move |db| db.delete_request(&removed)).await?;
    tracing::info!(%id, "request deleted");
    Ok(envelope(StatusCode::OK, (), "Request deleted"))
}

// ── Tests ─────────────────────────────────────────────────────────────
