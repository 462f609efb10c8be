//! Supplier invoice endpoints. Manager only.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::ManagerUser;
use crate::error::{AppError, AppResult};
use crate::models::{Invoice, InvoiceStatus, ListQuery, NewInvoice, Page, PayInvoice};
use crate::server::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<String>,
    pub supplier_id: Option<i64>,
}

/// GET /api/invoices
pub async fn list(
    State(state): State<Arc<AppState>>,
    _manager: ManagerUser,
    Query(query): Query<ListQuery>,
    Query(filter): Query<InvoiceFilter>,
) -> AppResult<Json<Page<Invoice>>> {
    let status = filter
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<InvoiceStatus>)
        .transpose()?;
    let max = state.settings().max_page_size;
    Ok(Json(state.db.list_invoices(
        &query,
        status,
        filter.supplier_id,
        max,
    )?))
}

/// GET /api/invoices/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    _manager: ManagerUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Invoice>> {
    Ok(Json(state.db.get_invoice(id)?))
}

/// POST /api/invoices
pub async fn create(
    State(state): State<Arc<AppState>>,
    _manager: ManagerUser,
    Json(input): Json<NewInvoice>,
) -> AppResult<(StatusCode, Json<Invoice>)> {
    let invoice = state.db.create_invoice(&input.validate()?)?;
    tracing::info!(
        invoice_id = invoice.id,
        supplier_id = invoice.supplier_id,
        amount = invoice.amount,
        "Invoice recorded"
    );
    state.broadcast("invoice_created", &invoice);
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// POST /api/invoices/:id/pay
pub async fn pay(
    State(state): State<Arc<AppState>>,
    _manager: ManagerUser,
    Path(id): Path<i64>,
    body: Bytes,
) -> AppResult<Json<Invoice>> {
    let paid_on = parse_pay_body(&body)?
        .paid_on
        .unwrap_or_else(|| Utc::now().date_naive());
    let invoice = state.db.mark_invoice_paid(id, paid_on)?;
    state.broadcast("invoice_updated", &invoice);
    Ok(Json(invoice))
}

/// An empty body means "paid today"; anything else must be a valid `PayInvoice`.
fn parse_pay_body(body: &[u8]) -> AppResult<PayInvoice> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PayInvoice::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::validation(format!("Invalid payment body: {}", e)))
}

/// DELETE /api/invoices/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    _manager: ManagerUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.db.delete_invoice(id)?;
    state.broadcast("invoice_deleted", &serde_json::json!({ "id": id }));
    Ok(StatusCode::NO_CONTENT)
}
