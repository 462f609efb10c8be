//! HTTP server module for API and WebSocket endpoints.
//!
//! Provides the REST API and a WebSocket for real-time updates to
//! dashboards.

pub mod routes;
pub mod state;
pub mod ws;

use crate::server::routes::{
    analytics, auth, config, contact, dashboard, health, invoices, plates, products,
    registration, sensors, suppliers,
};
use crate::server::state::AppState;
use crate::server::ws::ws_handler;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Builds the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    // CORS layer for frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth and users
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/users", get(auth::list_users).post(auth::create_user))
        // Registration wizard
        .route("/api/registration", post(registration::start))
        .route(
            "/api/registration/:token",
            get(registration::get_draft).put(registration::submit_step),
        )
        .route("/api/registration/:token/back", post(registration::go_back))
        .route(
            "/api/registration/:token/complete",
            post(registration::complete),
        )
        // Contact form
        .route("/api/contact", get(contact::list).post(contact::submit))
        .route("/api/contact/:id/handled", post(contact::mark_handled))
        // Inventory
        .route("/api/suppliers", get(suppliers::list).post(suppliers::create))
        .route(
            "/api/suppliers/:id",
            get(suppliers::get)
                .put(suppliers::update)
                .delete(suppliers::delete),
        )
        .route("/api/products", get(products::list).post(products::create))
        .route(
            "/api/products/:id",
            get(products::get)
                .put(products::update)
                .delete(products::delete),
        )
        .route("/api/products/:id/stock", post(products::adjust_stock))
        .route("/api/invoices", get(invoices::list).post(invoices::create))
        .route(
            "/api/invoices/:id",
            get(invoices::get).delete(invoices::delete),
        )
        .route("/api/invoices/:id/pay", post(invoices::pay))
        // Plates
        .route("/api/plates", get(plates::list).post(plates::create))
        .route(
            "/api/plates/:id",
            get(plates::get).put(plates::update).delete(plates::delete),
        )
        .route("/api/plates/:id/stage", post(plates::change_stage))
        // Sensors
        .route("/api/sensors", get(sensors::list))
        .route("/api/sensors/readings", post(sensors::ingest))
        .route("/api/sensors/series", get(sensors::series))
        // Analytics
        .route(
            "/api/analytics/inventory-monitor",
            get(analytics::inventory_monitor),
        )
        .route(
            "/api/analytics/invoice-analytics",
            get(analytics::invoices),
        )
        .route(
            "/api/analytics/stock-availability",
            get(analytics::availability),
        )
        .route("/api/analytics/stock-impact", get(analytics::impact))
        .route("/api/analytics/plates", get(analytics::plates))
        .route("/api/dashboard", get(dashboard::get_dashboard))
        // Config API
        .route("/api/config", get(config::get_config))
        .route("/api/config/:key", put(config::update_config))
        // WebSocket
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Runs the axum server until `shutdown` flips to true.
pub async fn run_server(
    addr: SocketAddr,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            tracing::info!("HTTP server shutting down");
        })
        .await
}
