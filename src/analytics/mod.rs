//! Aggregations behind the analytics endpoints.
//!
//! Everything here is pure: callers load records from the database and
//! pass slices in.

pub mod inventory;
pub mod invoices;
pub mod plates;
pub mod sensors;

pub use inventory::{
    inventory_health, stock_availability, stock_impact, stock_status, InventoryHealth,
    StockAvailability, StockImpact, StockStatus,
};
pub use invoices::{invoice_analytics, InvoiceAnalytics};
pub use plates::{plate_summary, PlateSummary};
pub use sensors::{
    bucket_readings, build_series, summarize, Interval, Series, SeriesPoint, SeriesSummary,
};

/// Rounds to one decimal place.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `part / whole` as a percentage with one decimal; 0.0 for an empty whole.
pub(crate) fn percent(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        0.0
    } else {
        round1(part / whole * 100.0)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::Product;
    use chrono::Utc;

    pub fn product(id: i64, name: &str, quantity: i64, reorder_level: i64) -> Product {
        Product {
            id,
            name: name.to_string(),
            sku: format!("SKU-{}", id),
            category: "Feed".to_string(),
            supplier_id: None,
            unit: "kg".to_string(),
            quantity,
            reorder_level,
            max_stock: None,
            unit_price: 2.0,
            daily_usage: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
