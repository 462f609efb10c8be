//! Supplier endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::auth::{CurrentUser, ManagerUser};
use crate::error::AppResult;
use crate::models::{ListQuery, NewSupplier, Page, Supplier, SupplierPatch};
use crate::server::state::AppState;

/// GET /api/suppliers
pub async fn list(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Page<Supplier>>> {
    let max = state.settings().max_page_size;
    Ok(Json(state.db.list_suppliers(&query, max)?))
}

/// GET /api/suppliers/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Supplier>> {
    Ok(Json(state.db.get_supplier(id)?))
}

/// POST /api/suppliers
pub async fn create(
    State(state): State<Arc<AppState>>,
    _manager: ManagerUser,
    Json(input): Json<NewSupplier>,
) -> AppResult<(StatusCode, Json<Supplier>)> {
    let supplier = state.db.create_supplier(&input.validate()?)?;
    tracing::info!(supplier_id = supplier.id, name = %supplier.name, "Supplier created");
    state.broadcast("supplier_created", &supplier);
    Ok((StatusCode::CREATED, Json(supplier)))
}

/// PUT /api/suppliers/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    _manager: ManagerUser,
    Path(id): Path<i64>,
    Json(patch): Json<SupplierPatch>,
) -> AppResult<Json<Supplier>> {
    let current = state.db.get_supplier(id)?;
    let supplier = state.db.update_supplier(id, &patch.apply(&current)?)?;
    state.broadcast("supplier_updated", &supplier);
    Ok(Json(supplier))
}

/// DELETE /api/suppliers/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    _manager: ManagerUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.db.delete_supplier(id)?;
    state.broadcast("supplier_deleted", &serde_json::json!({ "id": id }));
    Ok(StatusCode::NO_CONTENT)
}
