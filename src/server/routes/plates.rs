//! Barley-plate endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::{CurrentUser, ManagerUser};
use crate::error::AppResult;
use crate::models::{BarleyPlate, ListQuery, NewPlate, Page, PlatePatch, PlateStage, StageChange};
use crate::server::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PlateFilter {
    pub stage: Option<String>,
}

/// GET /api/plates
pub async fn list(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(query): Query<ListQuery>,
    Query(filter): Query<PlateFilter>,
) -> AppResult<Json<Page<BarleyPlate>>> {
    let stage = filter
        .stage
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<PlateStage>)
        .transpose()?;
    let max = state.settings().max_page_size;
    Ok(Json(state.db.list_plates(&query, stage, max)?))
}

/// GET /api/plates/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<BarleyPlate>> {
    Ok(Json(state.db.get_plate(id)?))
}

/// POST /api/plates
pub async fn create(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Json(input): Json<NewPlate>,
) -> AppResult<(StatusCode, Json<BarleyPlate>)> {
    let today = Utc::now().date_naive();
    let plate = state.db.create_plate(&input.validate(today)?)?;
    tracing::info!(plate_id = plate.id, code = %plate.plate_code, "Plate sown");
    state.broadcast("plate_created", &plate);
    Ok((StatusCode::CREATED, Json(plate)))
}

/// PUT /api/plates/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<PlatePatch>,
) -> AppResult<Json<BarleyPlate>> {
    let current = state.db.get_plate(id)?;
    let plate = state.db.update_plate(&patch.apply(&current)?)?;
    state.broadcast("plate_updated", &plate);
    Ok(Json(plate))
}

/// POST /api/plates/:id/stage
pub async fn change_stage(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(change): Json<StageChange>,
) -> AppResult<Json<BarleyPlate>> {
    let plate = state.db.advance_plate(
        id,
        change.stage,
        change.yield_weight_g,
        change.harvested_on,
        Utc::now().date_naive(),
    )?;
    state.broadcast("plate_updated", &plate);
    Ok(Json(plate))
}

/// DELETE /api/plates/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    _manager: ManagerUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.db.delete_plate(id)?;
    state.broadcast("plate_deleted", &serde_json::json!({ "id": id }));
    Ok(StatusCode::NO_CONTENT)
}
