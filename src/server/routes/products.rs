//! Product endpoints, including stock adjustments.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::analytics::stock_status;
use crate::auth::{CurrentUser, ManagerUser};
use crate::error::AppResult;
use crate::models::{ListQuery, NewProduct, Page, Product, ProductPatch, StockAdjustment};
use crate::server::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
}

/// GET /api/products
pub async fn list(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(query): Query<ListQuery>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Page<Product>>> {
    let max = state.settings().max_page_size;
    Ok(Json(state.db.list_products(
        &query,
        filter.category.as_deref(),
        max,
    )?))
}

/// GET /api/products/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Product>> {
    Ok(Json(state.db.get_product(id)?))
}

/// POST /api/products
pub async fn create(
    State(state): State<Arc<AppState>>,
    _manager: ManagerUser,
    Json(input): Json<NewProduct>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let product = state.db.create_product(&input.validate()?)?;
    tracing::info!(product_id = product.id, sku = %product.sku, "Product created");
    state.broadcast("product_created", &product);
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/products/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    _manager: ManagerUser,
    Path(id): Path<i64>,
    Json(patch): Json<ProductPatch>,
) -> AppResult<Json<Product>> {
    let current = state.db.get_product(id)?;
    let product = state.db.update_product(id, &patch.apply(&current)?)?;
    state.broadcast("product_updated", &product);
    Ok(Json(product))
}

/// DELETE /api/products/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    _manager: ManagerUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.db.delete_product(id)?;
    state.broadcast("product_deleted", &serde_json::json!({ "id": id }));
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/products/:id/stock
///
/// Broadcasts `stock_alert` when the product ends up low or out of stock.
pub async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(adjustment): Json<StockAdjustment>,
) -> AppResult<Json<Product>> {
    let product = state.db.adjust_stock(id, adjustment.delta)?;
    tracing::debug!(
        product_id = id,
        delta = adjustment.delta,
        quantity = product.quantity,
        user_id = user.id(),
        "Stock adjusted"
    );
    state.broadcast("product_updated", &product);

    let status = stock_status(&product, state.settings().overstock_factor);
    if status.needs_reorder() {
        tracing::info!(product_id = id, sku = %product.sku, ?status, "Stock alert");
        state.broadcast(
            "stock_alert",
            &serde_json::json!({
                "product": &product,
                "status": status,
            }),
        );
    }
    Ok(Json(product))
}
