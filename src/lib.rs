//! AgriDash - farm-management dashboard backend.
//!
//! Tracks suppliers, products, invoices, barley plates and sensor readings
//! in SQLite, and serves them over a REST API with WebSocket change events.

pub mod analytics;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod registration;
pub mod server;
