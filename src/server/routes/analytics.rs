//! Analytics endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::analytics::{
    inventory_health, invoice_analytics, plate_summary, stock_availability, stock_impact,
    InventoryHealth, InvoiceAnalytics, PlateSummary, StockAvailability, StockImpact,
};
use crate::auth::{CurrentUser, ManagerUser};
use crate::error::{AppError, AppResult};
use crate::server::state::AppState;

/// Longest monthly series a caller may ask for.
const MAX_TREND_MONTHS: u32 = 36;

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceAnalyticsQuery {
    pub months: Option<u32>,
}

/// GET /api/analytics/inventory-monitor
pub async fn inventory_monitor(
    State(state): State<Arc<AppState>>,
    _manager: ManagerUser,
) -> AppResult<Json<InventoryHealth>> {
    let products = state.db.all_products()?;
    let factor = state.settings().overstock_factor;
    Ok(Json(inventory_health(&products, factor)))
}

/// GET /api/analytics/invoice-analytics
pub async fn invoices(
    State(state): State<Arc<AppState>>,
    _manager: ManagerUser,
    Query(query): Query<InvoiceAnalyticsQuery>,
) -> AppResult<Json<InvoiceAnalytics>> {
    let settings = state.settings();
    let months = query.months.unwrap_or(settings.invoice_trend_months);
    if months == 0 || months > MAX_TREND_MONTHS {
        return Err(AppError::validation(format!(
            "months must be between 1 and {}",
            MAX_TREND_MONTHS
        )));
    }

    let invoices = state.db.all_invoices()?;
    let suppliers = state.db.all_suppliers()?;
    Ok(Json(invoice_analytics(
        &invoices,
        &suppliers,
        Utc::now().date_naive(),
        months,
        settings.top_suppliers_limit,
    )))
}

/// GET /api/analytics/stock-availability
pub async fn availability(
    State(state): State<Arc<AppState>>,
    _manager: ManagerUser,
) -> AppResult<Json<StockAvailability>> {
    Ok(Json(stock_availability(&state.db.all_products()?)))
}

/// GET /api/analytics/stock-impact
pub async fn impact(
    State(state): State<Arc<AppState>>,
    _manager: ManagerUser,
) -> AppResult<Json<StockImpact>> {
    Ok(Json(stock_impact(&state.db.all_products()?)))
}

/// GET /api/analytics/plates
pub async fn plates(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> AppResult<Json<PlateSummary>> {
    Ok(Json(plate_summary(&state.db.all_plates()?)))
}
