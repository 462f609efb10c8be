//! Landing-page summary.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::analytics::inventory_health;
use crate::auth::CurrentUser;
use crate::database::DashboardCounts;
use crate::error::AppResult;
use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub counts: DashboardCounts,
    pub health_score: f64,
    pub reorder_count: usize,
}

/// GET /api/dashboard
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> AppResult<Json<DashboardResponse>> {
    let counts = state.db.dashboard_counts()?;
    let health = inventory_health(&state.db.all_products()?, state.settings().overstock_factor);
    Ok(Json(DashboardResponse {
        counts,
        health_score: health.health_score,
        reorder_count: health.reorder.len(),
    }))
}
