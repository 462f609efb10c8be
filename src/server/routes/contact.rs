//! Public contact form and its admin inbox.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::auth::AdminUser;
use crate::error::AppResult;
use crate::models::{ContactMessage, ListQuery, NewContactMessage, Page};
use crate::server::state::AppState;

/// POST /api/contact
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewContactMessage>,
) -> AppResult<(StatusCode, Json<ContactMessage>)> {
    let message = state.db.create_contact_message(&input.validate()?)?;
    tracing::info!(id = message.id, "Contact message received");
    state.broadcast("contact_created", &message);
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/contact
pub async fn list(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Page<ContactMessage>>> {
    let max = state.settings().max_page_size;
    Ok(Json(state.db.list_contact_messages(&query, max)?))
}

/// POST /api/contact/:id/handled
pub async fn mark_handled(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.db.mark_contact_handled(id)?;
    state.broadcast("contact_updated", &serde_json::json!({ "id": id, "handled": true }));
    Ok(StatusCode::NO_CONTENT)
}
