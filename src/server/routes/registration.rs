//! Sign-up wizard endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use super::auth::{open_session, SessionResponse};
use crate::error::AppResult;
use crate::registration::{self, RegistrationView, StepInput};
use crate::server::state::AppState;

/// POST /api/registration
pub async fn start(
    State(state): State<Arc<AppState>>,
) -> AppResult<(StatusCode, Json<RegistrationView>)> {
    let draft = registration::start(&state.db, Utc::now())?;
    Ok((StatusCode::CREATED, Json(draft.view())))
}

/// GET /api/registration/:token
pub async fn get_draft(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> AppResult<Json<RegistrationView>> {
    let draft = registration::load(&state.db, &token, Utc::now())?;
    Ok(Json(draft.view()))
}

/// PUT /api/registration/:token
pub async fn submit_step(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(input): Json<StepInput>,
) -> AppResult<Json<RegistrationView>> {
    // The account step hashes the password, so run off the async workers
    let db = state.db.clone();
    let draft = tokio::task::spawn_blocking(move || {
        registration::submit(&db, &token, input, Utc::now())
    })
    .await??;
    Ok(Json(draft.view()))
}

/// POST /api/registration/:token/back
pub async fn go_back(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> AppResult<Json<RegistrationView>> {
    let draft = registration::back(&state.db, &token, Utc::now())?;
    Ok(Json(draft.view()))
}

/// POST /api/registration/:token/complete
pub async fn complete(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> AppResult<(StatusCode, Json<SessionResponse>)> {
    let user = registration::complete(&state.db, &token, Utc::now())?;
    state.broadcast("user_created", &user);
    Ok((StatusCode::CREATED, Json(open_session(&state, user))))
}
