//! Data types for farm records.
//!
//! Records mirror the database rows; `New*` and `*Patch` types are the
//! request payloads accepted by the API and carry their own validation.

pub mod accounts;
pub mod inventory;
pub mod plates;
pub mod query;
pub mod sensors;

pub use accounts::*;
pub use inventory::*;
pub use plates::*;
pub use query::*;
pub use sensors::*;

use crate::error::{AppError, AppResult};

/// Trims a required text field, rejecting empty values.
pub(crate) fn require_text(field: &str, value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional text field; blank strings become `None`.
pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Lower-cases and checks an email address.
///
/// Accepts `local@domain.tld`: one `@`, non-empty local part, and a dot
/// inside the domain that is neither first nor last.
pub(crate) fn normalize_email(value: &str) -> AppResult<String> {
    let email = value.trim().to_lowercase();
    let invalid = || AppError::validation(format!("Invalid email address: {}", value.trim()));

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') || email.contains(char::is_whitespace) {
        return Err(invalid());
    }
    match domain.find('.') {
        Some(pos) if pos > 0 && !domain.ends_with('.') => Ok(email),
        _ => Err(invalid()),
    }
}

pub(crate) fn non_negative(field: &str, value: f64) -> AppResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::validation(format!(
            "{} must be a non-negative number",
            field
        )));
    }
    Ok(())
}

/// Largest unit count a product field may hold.
pub const MAX_STOCK_UNITS: i64 = 1_000_000_000_000;

pub(crate) fn stock_units(field: &str, value: i64) -> AppResult<()> {
    if !(0..=MAX_STOCK_UNITS).contains(&value) {
        return Err(AppError::validation(format!(
            "{} must be between 0 and {}",
            field, MAX_STOCK_UNITS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Grower@Example.COM ").unwrap(),
            "grower@example.com"
        );
        assert!(normalize_email("no-at-sign.com").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("a@example").is_err());
        assert!(normalize_email("a@.com").is_err());
        assert!(normalize_email("a@b@c.com").is_err());
        assert!(normalize_email("a b@c.com").is_err());
    }

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("name", "  Oats ").unwrap(), "Oats");
        assert!(require_text("name", "   ").is_err());
    }

    #[test]
    fn test_non_negative() {
        assert!(non_negative("price", 0.0).is_ok());
        assert!(non_negative("price", -0.5).is_err());
        assert!(non_negative("price", f64::NAN).is_err());
        assert!(non_negative("price", f64::INFINITY).is_err());
    }

    #[test]
    fn test_stock_units_bounds() {
        assert!(stock_units("quantity", 0).is_ok());
        assert!(stock_units("quantity", MAX_STOCK_UNITS).is_ok());
        assert!(stock_units("quantity", MAX_STOCK_UNITS + 1).is_err());
        assert!(stock_units("quantity", -1).is_err());
        assert!(stock_units("reorder_level", i64::MAX / 2 + 1).is_err());
    }
}
