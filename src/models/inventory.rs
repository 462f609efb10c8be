//! Suppliers, products and supplier invoices.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{non_negative, normalize_email, optional_text, require_text, stock_units};
use crate::error::{AppError, AppResult};

/// Distinguishes a missing field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

// === Suppliers ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl NewSupplier {
    pub fn validate(&self) -> AppResult<NewSupplier> {
        let email = match optional_text(self.email.as_deref()) {
            Some(email) => Some(normalize_email(&email)?),
            None => None,
        };
        Ok(NewSupplier {
            name: require_text("name", &self.name)?,
            contact_name: optional_text(self.contact_name.as_deref()),
            email,
            phone: optional_text(self.phone.as_deref()),
            address: optional_text(self.address.as_deref()),
        })
    }
}

/// Partial supplier update. Blank strings clear optional fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupplierPatch {
    pub name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl SupplierPatch {
    /// Merges the patch over `current` and validates the result.
    pub fn apply(&self, current: &Supplier) -> AppResult<NewSupplier> {
        let pick = |patch: &Option<String>, existing: &Option<String>| match patch {
            Some(v) => Some(v.clone()),
            None => existing.clone(),
        };
        NewSupplier {
            name: self.name.clone().unwrap_or_else(|| current.name.clone()),
            contact_name: pick(&self.contact_name, &current.contact_name),
            email: pick(&self.email, &current.email),
            phone: pick(&self.phone, &current.phone),
            address: pick(&self.address, &current.address),
        }
        .validate()
    }
}

// === Products ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub sku: String,
    pub category: String,
    pub supplier_id: Option<i64>,
    pub unit: String,
    pub quantity: i64,
    pub reorder_level: i64,
    pub max_stock: Option<i64>,
    pub unit_price: f64,
    pub daily_usage: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn stock_value(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }

    /// Days until stock runs out at the recorded daily usage.
    pub fn days_of_cover(&self) -> Option<f64> {
        match self.daily_usage {
            Some(usage) if usage > 0.0 => Some(self.quantity as f64 / usage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub category: String,
    pub supplier_id: Option<i64>,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub reorder_level: i64,
    pub max_stock: Option<i64>,
    #[serde(default)]
    pub unit_price: f64,
    pub daily_usage: Option<f64>,
}

fn default_unit() -> String {
    "unit".to_string()
}

impl NewProduct {
    pub fn validate(&self) -> AppResult<NewProduct> {
        stock_units("quantity", self.quantity)?;
        stock_units("reorder_level", self.reorder_level)?;
        non_negative("unit_price", self.unit_price)?;
        if let Some(max) = self.max_stock {
            stock_units("max_stock", max)?;
            if max < self.reorder_level {
                return Err(AppError::validation(
                    "max_stock must be at least reorder_level",
                ));
            }
        }
        if let Some(usage) = self.daily_usage {
            non_negative("daily_usage", usage)?;
        }
        Ok(NewProduct {
            name: require_text("name", &self.name)?,
            sku: require_text("sku", &self.sku)?.to_uppercase(),
            category: optional_text(Some(self.category.as_str()))
                .unwrap_or_else(|| UNCATEGORIZED.to_string()),
            supplier_id: self.supplier_id,
            unit: optional_text(Some(self.unit.as_str())).unwrap_or_else(default_unit),
            quantity: self.quantity,
            reorder_level: self.reorder_level,
            max_stock: self.max_stock,
            unit_price: self.unit_price,
            daily_usage: self.daily_usage,
        })
    }
}

/// Category label for products without one.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Partial product update. Nullable fields accept an explicit `null` to clear.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub supplier_id: Option<Option<i64>>,
    pub unit: Option<String>,
    pub quantity: Option<i64>,
    pub reorder_level: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub max_stock: Option<Option<i64>>,
    pub unit_price: Option<f64>,
    #[serde(default, deserialize_with = "double_option")]
    pub daily_usage: Option<Option<f64>>,
}

impl ProductPatch {
    pub fn apply(&self, current: &Product) -> AppResult<NewProduct> {
        NewProduct {
            name: self.name.clone().unwrap_or_else(|| current.name.clone()),
            sku: self.sku.clone().unwrap_or_else(|| current.sku.clone()),
            category: self
                .category
                .clone()
                .unwrap_or_else(|| current.category.clone()),
            supplier_id: self.supplier_id.unwrap_or(current.supplier_id),
            unit: self.unit.clone().unwrap_or_else(|| current.unit.clone()),
            quantity: self.quantity.unwrap_or(current.quantity),
            reorder_level: self.reorder_level.unwrap_or(current.reorder_level),
            max_stock: self.max_stock.unwrap_or(current.max_stock),
            unit_price: self.unit_price.unwrap_or(current.unit_price),
            daily_usage: self.daily_usage.unwrap_or(current.daily_usage),
        }
        .validate()
    }
}

/// Body of `POST /api/products/:id/stock`.
#[derive(Debug, Clone, Deserialize)]
pub struct StockAdjustment {
    pub delta: i64,
}

// === Invoices ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvoiceStatus::Pending),
            "paid" => Ok(InvoiceStatus::Paid),
            other => Err(AppError::validation(format!(
                "Unknown invoice status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub supplier_id: i64,
    pub invoice_number: String,
    pub amount: f64,
    pub issued_on: NaiveDate,
    pub due_on: NaiveDate,
    pub status: InvoiceStatus,
    pub paid_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// An unpaid invoice past its due date.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == InvoiceStatus::Pending && self.due_on < today
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInvoice {
    pub supplier_id: i64,
    pub invoice_number: String,
    pub amount: f64,
    pub issued_on: NaiveDate,
    pub due_on: NaiveDate,
}

impl NewInvoice {
    pub fn validate(&self) -> AppResult<NewInvoice> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(AppError::validation("amount must be greater than zero"));
        }
        if self.due_on < self.issued_on {
            return Err(AppError::validation("due_on must not be before issued_on"));
        }
        Ok(NewInvoice {
            invoice_number: require_text("invoice_number", &self.invoice_number)?,
            ..self.clone()
        })
    }
}

/// Body of `POST /api/invoices/:id/pay`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayInvoice {
    pub paid_on: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(quantity: i64, reorder_level: i64) -> Product {
        let now = Utc::now();
        Product {
            id: 1,
            name: "Barley seed".into(),
            sku: "BS-1".into(),
            category: "Seed".into(),
            supplier_id: None,
            unit: "kg".into(),
            quantity,
            reorder_level,
            max_stock: None,
            unit_price: 2.5,
            daily_usage: Some(4.0),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_new_product_defaults() {
        let input: NewProduct =
            serde_json::from_str(r#"{"name":"Lamp","sku":" lp-1 "}"#).unwrap();
        let valid = input.validate().unwrap();
        assert_eq!(valid.sku, "LP-1");
        assert_eq!(valid.category, UNCATEGORIZED);
        assert_eq!(valid.unit, "unit");
        assert_eq!(valid.quantity, 0);
    }

    #[test]
    fn test_new_product_rejects_bad_numbers() {
        let mut input: NewProduct =
            serde_json::from_str(r#"{"name":"Lamp","sku":"LP-1","quantity":-1}"#).unwrap();
        assert!(input.validate().is_err());

        input.quantity = 5;
        input.reorder_level = 10;
        input.max_stock = Some(8);
        assert!(input.validate().is_err());

        input.max_stock = None;
        input.unit_price = -1.0;
        assert!(input.validate().is_err());

        input.unit_price = 1.0;
        input.reorder_level = i64::MAX / 2 + 1;
        input.quantity = 0;
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_product_patch_clears_nullable_fields() {
        let mut current = product(10, 5);
        current.max_stock = Some(40);

        let patch: ProductPatch =
            serde_json::from_str(r#"{"max_stock":null,"quantity":12}"#).unwrap();
        let merged = patch.apply(&current).unwrap();
        assert_eq!(merged.max_stock, None);
        assert_eq!(merged.quantity, 12);
        assert_eq!(merged.daily_usage, Some(4.0));

        let untouched: ProductPatch = serde_json::from_str("{}").unwrap();
        assert_eq!(untouched.apply(&current).unwrap().max_stock, Some(40));
    }

    #[test]
    fn test_days_of_cover() {
        assert_eq!(product(10, 5).days_of_cover(), Some(2.5));
        let mut no_usage = product(10, 5);
        no_usage.daily_usage = Some(0.0);
        assert_eq!(no_usage.days_of_cover(), None);
    }

    #[test]
    fn test_invoice_validation() {
        let date = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let input = NewInvoice {
            supplier_id: 1,
            invoice_number: " INV-7 ".into(),
            amount: 120.0,
            issued_on: date("2024-03-01"),
            due_on: date("2024-03-31"),
        };
        assert_eq!(input.validate().unwrap().invoice_number, "INV-7");

        let backwards = NewInvoice {
            due_on: date("2024-02-01"),
            ..input.clone()
        };
        assert!(backwards.validate().is_err());

        let zero = NewInvoice {
            amount: 0.0,
            ..input
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_invoice_overdue() {
        let date = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let mut invoice = Invoice {
            id: 1,
            supplier_id: 1,
            invoice_number: "INV-1".into(),
            amount: 10.0,
            issued_on: date("2024-01-01"),
            due_on: date("2024-01-31"),
            status: InvoiceStatus::Pending,
            paid_on: None,
            created_at: Utc::now(),
        };
        assert!(!invoice.is_overdue(date("2024-01-31")));
        assert!(invoice.is_overdue(date("2024-02-01")));

        invoice.status = InvoiceStatus::Paid;
        assert!(!invoice.is_overdue(date("2024-02-01")));
    }

    #[test]
    fn test_supplier_patch_blank_clears() {
        let now = Utc::now();
        let current = Supplier {
            id: 1,
            name: "Green Seeds".into(),
            contact_name: Some("Jo".into()),
            email: Some("jo@green.io".into()),
            phone: None,
            address: None,
            created_at: now,
            updated_at: now,
        };
        let patch = SupplierPatch {
            contact_name: Some("  ".into()),
            phone: Some("555-0101".into()),
            ..Default::default()
        };
        let merged = patch.apply(&current).unwrap();
        assert_eq!(merged.name, "Green Seeds");
        assert_eq!(merged.contact_name, None);
        assert_eq!(merged.phone.as_deref(), Some("555-0101"));
        assert_eq!(merged.email.as_deref(), Some("jo@green.io"));
    }
}
