use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{
    dummy_password_hash, hash_password, hash_token, sign_access_token, verify_password, AuthUser,
};
use crate::constants::MAX_SESSIONS_PER_USER;
use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::state::AppState;
use crate::store::operations::sessions::Session;
use crate::store::operations::users::User;
use crate::store::StoreError;
use crate::validation::{validate_password, validate_username};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(value: &User) -> Self {
        Self {
            id: value.id.clone(),
            username: value.username.clone(),
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserProfile,
}

/// 签发访问令牌并持久化会话摘要
fn issue_access_token(user_id: &str, state: &AppState) -> Result<String, AppError> {
    if let Err(e) = state
        .store()
        .cleanup_oldest_user_sessions(user_id, MAX_SESSIONS_PER_USER.saturating_sub(1))
    {
        tracing::warn!(user_id, error = %e, "清理多余会话失败");
    }

    let expires_in_hours = state.config().jwt_expires_in_hours;
    let access_token = sign_access_token(user_id, &state.config().jwt_secret, expires_in_hours)?;

    let now = Utc::now();
    state.store().create_session(&Session {
        token_hash: hash_token(&access_token),
        user_id: user_id.to_string(),
        created_at: now,
        expires_at: now + Duration::hours(expires_in_hours as i64),
        revoked: false,
    })?;

    Ok(access_token)
}

async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let username = req.username.trim();
    if let Err(msg) = validate_username(username) {
        return Err(AppError::bad_request("AUTH_INVALID_USERNAME", msg));
    }
    if let Err(msg) = validate_password(&req.password) {
        return Err(AppError::bad_request("AUTH_WEAK_PASSWORD", msg));
    }

    let now = Utc::now();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        username: username.to_string(),
        password_hash: hash_password(&req.password)?,
        created_at: now,
        updated_at: now,
    };

    match state.store().create_user(&user) {
        Ok(()) => {}
        Err(StoreError::Conflict { .. }) => {
            return Err(AppError::conflict(
                "AUTH_USERNAME_EXISTS",
                "Username already registered",
            ));
        }
        Err(e) => return Err(e.into()),
    }
    tracing::info!(user_id = %user.id, "User registered");

    let access_token = issue_access_token(&user.id, &state)?;
    Ok(created(AuthResponse {
        access_token,
        user: UserProfile::from(&user),
    }))
}

async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let Some(user) = state.store().get_user_by_username(&req.username)? else {
        let _ = verify_password(&req.password, dummy_password_hash());
        return Err(AppError::unauthorized("Invalid username or password"));
    };

    if !verify_password(&req.password, &user.password_hash)? {
        return Err(AppError::unauthorized("Invalid username or password"));
    }

    let access_token = issue_access_token(&user.id, &state)?;
    Ok(ok(AuthResponse {
        access_token,
        user: UserProfile::from(&user),
    }))
}

/// 只注销当前令牌对应的会话
async fn logout(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    state.store().delete_session(&auth_user.token_hash)?;
    Ok(ok(serde_json::json!({ "loggedOut": true })))
}
