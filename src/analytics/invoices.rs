//! Invoice totals, monthly trend and top suppliers.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

use super::round1;
use crate::models::{Invoice, InvoiceStatus, Supplier};

const UNKNOWN_SUPPLIER: &str = "Unknown supplier";

#[derive(Debug, Clone, Default, Serialize)]
pub struct MonthlyInvoices {
    /// `YYYY-MM`
    pub month: String,
    pub count: usize,
    pub amount: f64,
    pub paid_amount: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SupplierSpend {
    pub supplier_id: i64,
    pub name: String,
    pub invoice_count: usize,
    pub total_amount: f64,
    pub outstanding_amount: f64,
}

impl SupplierSpend {
    fn new(supplier_id: i64, name: String) -> Self {
        Self {
            supplier_id,
            name,
            ..Default::default()
        }
    }

    fn add_invoice(&mut self, invoice: &Invoice) {
        self.invoice_count += 1;
        self.total_amount += invoice.amount;
        if invoice.status == InvoiceStatus::Pending {
            self.outstanding_amount += invoice.amount;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InvoiceAnalytics {
    pub count: usize,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub outstanding_amount: f64,
    pub overdue_amount: f64,
    pub overdue_count: usize,
    pub average_amount: f64,
    pub monthly: Vec<MonthlyInvoices>,
    /// Change of the latest month's amount against the month before, in percent.
    pub trend_pct: Option<f64>,
    pub top_suppliers: Vec<SupplierSpend>,
}

fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// The `months` calendar months ending with `today`'s, oldest first.
fn month_window(today: NaiveDate, months: u32) -> Vec<String> {
    let mut year = today.year();
    let mut month = today.month();
    let mut keys = Vec::with_capacity(months as usize);
    for _ in 0..months {
        keys.push(format!("{:04}-{:02}", year, month));
        if month == 1 {
            month = 12;
            year -= 1;
        } else {
            month -= 1;
        }
    }
    keys.reverse();
    keys
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn invoice_analytics(
    invoices: &[Invoice],
    suppliers: &[Supplier],
    today: NaiveDate,
    months: u32,
    top_n: usize,
) -> InvoiceAnalytics {
    let mut result = InvoiceAnalytics {
        count: invoices.len(),
        monthly: month_window(today, months)
            .into_iter()
            .map(|month| MonthlyInvoices {
                month,
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };
    let bucket_index: HashMap<String, usize> = result
        .monthly
        .iter()
        .enumerate()
        .map(|(i, m)| (m.month.clone(), i))
        .collect();
    let names: HashMap<i64, &str> = suppliers.iter().map(|s| (s.id, s.name.as_str())).collect();
    let mut spend: HashMap<i64, SupplierSpend> = HashMap::new();

    for invoice in invoices {
        result.total_amount += invoice.amount;
        match invoice.status {
            InvoiceStatus::Paid => result.paid_amount += invoice.amount,
            InvoiceStatus::Pending => result.outstanding_amount += invoice.amount,
        }
        if invoice.is_overdue(today) {
            result.overdue_amount += invoice.amount;
            result.overdue_count += 1;
        }

        if let Some(&i) = bucket_index.get(&month_key(invoice.issued_on)) {
            let bucket = &mut result.monthly[i];
            bucket.count += 1;
            bucket.amount += invoice.amount;
            if invoice.status == InvoiceStatus::Paid {
                bucket.paid_amount += invoice.amount;
            }
        }

        spend
            .entry(invoice.supplier_id)
            .or_insert_with(|| {
                let name = names
                    .get(&invoice.supplier_id)
                    .copied()
                    .unwrap_or(UNKNOWN_SUPPLIER);
                SupplierSpend::new(invoice.supplier_id, name.to_string())
            })
            .add_invoice(invoice);
    }

    if result.count > 0 {
        result.average_amount = round2(result.total_amount / result.count as f64);
    }
    result.total_amount = round2(result.total_amount);
    result.paid_amount = round2(result.paid_amount);
    result.outstanding_amount = round2(result.outstanding_amount);
    result.overdue_amount = round2(result.overdue_amount);
    for bucket in &mut result.monthly {
        bucket.amount = round2(bucket.amount);
        bucket.paid_amount = round2(bucket.paid_amount);
    }

    result.trend_pct = match result.monthly.as_slice() {
        [.., previous, last] if previous.amount > 0.0 => {
            Some(round1((last.amount - previous.amount) / previous.amount * 100.0))
        }
        _ => None,
    };

    let mut top: Vec<SupplierSpend> = spend.into_values().collect();
    top.sort_by(|a, b| {
        b.total_amount
            .partial_cmp(&a.total_amount)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    top.truncate(top_n);
    for entry in &mut top {
        entry.total_amount = round2(entry.total_amount);
        entry.outstanding_amount = round2(entry.outstanding_amount);
    }
    result.top_suppliers = top;

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn supplier(id: i64, name: &str) -> Supplier {
        Supplier {
            id,
            name: name.to_string(),
            contact_name: None,
            email: None,
            phone: None,
            address: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn invoice(id: i64, supplier_id: i64, amount: f64, issued: &str, paid: bool) -> Invoice {
        let issued_on = date(issued);
        Invoice {
            id,
            supplier_id,
            invoice_number: format!("INV-{}", id),
            amount,
            issued_on,
            due_on: issued_on + chrono::Duration::days(30),
            status: if paid {
                InvoiceStatus::Paid
            } else {
                InvoiceStatus::Pending
            },
            paid_on: paid.then_some(issued_on),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_month_window_crosses_year() {
        assert_eq!(
            month_window(date("2024-02-10"), 4),
            vec!["2023-11", "2023-12", "2024-01", "2024-02"]
        );
        assert!(month_window(date("2024-02-10"), 0).is_empty());
    }

    #[test]
    fn test_invoice_analytics() {
        let suppliers = vec![supplier(1, "Agri Co"), supplier(2, "Barn Supply")];
        let invoices = vec![
            invoice(1, 1, 100.0, "2024-05-03", true),
            invoice(2, 1, 200.0, "2024-06-01", false),
            invoice(3, 2, 300.0, "2024-06-10", false),
            invoice(4, 9, 50.0, "2023-01-01", true),
        ];
        let today = date("2024-06-15");

        let stats = invoice_analytics(&invoices, &suppliers, today, 3, 5);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.total_amount, 650.0);
        assert_eq!(stats.paid_amount, 150.0);
        assert_eq!(stats.outstanding_amount, 500.0);
        assert_eq!(stats.overdue_count, 0);
        assert_eq!(stats.average_amount, 162.5);

        let months: Vec<_> = stats.monthly.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, vec!["2024-04", "2024-05", "2024-06"]);
        assert_eq!(stats.monthly[0].count, 0);
        assert_eq!(stats.monthly[1].paid_amount, 100.0);
        assert_eq!(stats.monthly[2].amount, 500.0);
        assert_eq!(stats.trend_pct, Some(400.0));

        assert_eq!(stats.top_suppliers.len(), 3);
        assert_eq!(stats.top_suppliers[0].name, "Agri Co");
        assert_eq!(stats.top_suppliers[0].outstanding_amount, 200.0);
        assert_eq!(stats.top_suppliers[1].name, "Barn Supply");
        assert_eq!(stats.top_suppliers[2].name, UNKNOWN_SUPPLIER);
    }

    #[test]
    fn test_overdue_and_trend_without_base() {
        let invoices = vec![invoice(1, 1, 80.0, "2024-03-01", false)];
        let stats = invoice_analytics(&invoices, &[], date("2024-06-15"), 2, 1);
        assert_eq!(stats.overdue_count, 1);
        assert_eq!(stats.overdue_amount, 80.0);
        assert_eq!(stats.trend_pct, None);
    }

    #[test]
    fn test_empty_invoices() {
        let stats = invoice_analytics(&[], &[], date("2024-06-15"), 6, 5);
        assert_eq!(stats.average_amount, 0.0);
        assert_eq!(stats.monthly.len(), 6);
        assert!(stats.top_suppliers.is_empty());
    }
}
