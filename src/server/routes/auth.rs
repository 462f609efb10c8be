//! Login, current user and user administration.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{hash_password_async, issue_token, verify_login, AdminUser, CurrentUser};
use crate::error::{AppError, AppResult};
use crate::models::{normalize_email, require_text, NewUser, NewUserRequest, User};
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Issues a session for `user` using the configured lifetime.
pub(crate) fn open_session(state: &AppState, user: User) -> SessionResponse {
    let ttl = state.settings().session_ttl_secs;
    let issued = issue_token(&state.keys, &user, ttl, Utc::now());
    SessionResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user,
    }
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<SessionResponse>> {
    let invalid = || AppError::Unauthorized("invalid credentials".into());

    let found = state.db.find_user_by_email(&req.email)?;
    let stored = found.as_ref().map(|(_, hash)| hash.clone());
    let matched = verify_login(req.password, stored).await?;
    let user = match found {
        Some((user, _)) if matched => user,
        Some((user, _)) => {
            tracing::info!(email = %user.email, "Failed login");
            return Err(invalid());
        }
        None => return Err(invalid()),
    };

    tracing::info!(user_id = user.id, "User logged in");
    Ok(Json(open_session(&state, user)))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> AppResult<Json<User>> {
    Ok(Json(state.db.get_user(user.id())?))
}

/// GET /api/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.db.list_users()?))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<NewUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let new_user = NewUser {
        email: normalize_email(&req.email)?,
        name: require_text("name", &req.name)?,
        password_hash: hash_password_async(req.password).await?,
        role: req.role,
        farm_name: None,
        farm_location: None,
        plan: None,
    };
    let user = state.db.create_user(&new_user)?;
    state.broadcast("user_created", &user);
    Ok((StatusCode::CREATED, Json(user)))
}
