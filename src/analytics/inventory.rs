//! Inventory monitor, stock availability and stock impact.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::percent;
use crate::models::{Product, UNCATEGORIZED};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    OutOfStock,
    Low,
    Healthy,
    Overstocked,
}

impl StockStatus {
    /// Lower is more urgent.
    fn severity(self) -> u8 {
        match self {
            StockStatus::OutOfStock => 0,
            StockStatus::Low => 1,
            StockStatus::Overstocked => 2,
            StockStatus::Healthy => 3,
        }
    }

    pub fn needs_reorder(self) -> bool {
        matches!(self, StockStatus::OutOfStock | StockStatus::Low)
    }
}

/// Classifies one product's stock level.
pub fn stock_status(product: &Product, overstock_factor: f64) -> StockStatus {
    if product.quantity <= 0 {
        return StockStatus::OutOfStock;
    }
    if product.quantity <= product.reorder_level {
        return StockStatus::Low;
    }
    let overstocked = match product.max_stock {
        Some(max) => product.quantity > max,
        None if product.reorder_level > 0 => {
            product.quantity as f64 > product.reorder_level as f64 * overstock_factor
        }
        None => false,
    };
    if overstocked {
        StockStatus::Overstocked
    } else {
        StockStatus::Healthy
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReorderItem {
    pub id: i64,
    pub name: String,
    pub sku: String,
    pub status: StockStatus,
    pub quantity: i64,
    pub reorder_level: i64,
    pub suggested_order: i64,
    pub days_of_cover: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InventoryHealth {
    pub total_products: usize,
    pub out_of_stock: usize,
    pub low_stock: usize,
    pub healthy: usize,
    pub overstocked: usize,
    pub total_units: i64,
    pub total_value: f64,
    /// Share of products that are healthy or overstocked, in percent.
    pub health_score: f64,
    pub reorder: Vec<ReorderItem>,
}

/// Compares optional cover, with unknown cover sorting last.
fn cmp_cover(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn inventory_health(products: &[Product], overstock_factor: f64) -> InventoryHealth {
    let mut health = InventoryHealth {
        total_products: products.len(),
        ..Default::default()
    };

    for product in products {
        let status = stock_status(product, overstock_factor);
        match status {
            StockStatus::OutOfStock => health.out_of_stock += 1,
            StockStatus::Low => health.low_stock += 1,
            StockStatus::Healthy => health.healthy += 1,
            StockStatus::Overstocked => health.overstocked += 1,
        }
        health.total_units = health.total_units.saturating_add(product.quantity);
        health.total_value += product.stock_value();

        if status.needs_reorder() {
            let target = product
                .max_stock
                .unwrap_or_else(|| product.reorder_level.saturating_mul(2));
            health.reorder.push(ReorderItem {
                id: product.id,
                name: product.name.clone(),
                sku: product.sku.clone(),
                status,
                quantity: product.quantity,
                reorder_level: product.reorder_level,
                suggested_order: target.saturating_sub(product.quantity).max(0),
                days_of_cover: product.days_of_cover(),
            });
        }
    }

    health.reorder.sort_by(|a, b| {
        a.status
            .severity()
            .cmp(&b.status.severity())
            .then_with(|| cmp_cover(a.days_of_cover, b.days_of_cover))
            .then_with(|| a.name.cmp(&b.name))
    });
    health.total_value = round2(health.total_value);
    health.health_score = percent(
        (health.healthy + health.overstocked) as f64,
        health.total_products as f64,
    );
    health
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryAvailability {
    pub category: String,
    pub items: usize,
    pub in_stock_items: usize,
    pub availability_pct: f64,
    pub units: i64,
    pub value: f64,
}

impl CategoryAvailability {
    fn new(category: String) -> Self {
        Self {
            category,
            ..Default::default()
        }
    }

    fn add_product(&mut self, product: &Product) {
        self.items += 1;
        if product.quantity > 0 {
            self.in_stock_items += 1;
        }
        self.units = self.units.saturating_add(product.quantity);
        self.value += product.stock_value();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StockAvailability {
    pub availability_pct: f64,
    pub categories: usize,
    pub by_category: Vec<CategoryAvailability>,
}

pub fn stock_availability(products: &[Product]) -> StockAvailability {
    let mut groups: BTreeMap<String, CategoryAvailability> = BTreeMap::new();

    for product in products {
        let category = match product.category.trim() {
            "" => UNCATEGORIZED.to_string(),
            name => name.to_string(),
        };
        groups
            .entry(category.clone())
            .or_insert_with(|| CategoryAvailability::new(category))
            .add_product(product);
    }

    let in_stock = products.iter().filter(|p| p.quantity > 0).count();
    let by_category: Vec<_> = groups
        .into_values()
        .map(|mut group| {
            group.availability_pct = percent(group.in_stock_items as f64, group.items as f64);
            group.value = round2(group.value);
            group
        })
        .collect();

    StockAvailability {
        availability_pct: percent(in_stock as f64, products.len() as f64),
        categories: by_category.len(),
        by_category,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpactItem {
    pub id: i64,
    pub name: String,
    pub sku: String,
    pub quantity: i64,
    pub reorder_level: i64,
    pub shortfall: i64,
    pub value_at_risk: f64,
    /// 100 for out-of-stock products, otherwise the shortfall as a
    /// percentage of the reorder level, capped at 99.
    pub impact_score: u32,
    pub days_of_cover: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockImpact {
    pub items: Vec<ImpactItem>,
    pub affected_products: usize,
    pub total_value_at_risk: f64,
    pub inventory_value: f64,
    pub at_risk_pct: f64,
}

fn impact_score(product: &Product, shortfall: i64) -> u32 {
    if product.quantity <= 0 {
        return 100;
    }
    let score = (shortfall as f64 / product.reorder_level as f64 * 100.0).round();
    score.clamp(0.0, 99.0) as u32
}

pub fn stock_impact(products: &[Product]) -> StockImpact {
    let mut items: Vec<ImpactItem> = products
        .iter()
        .filter(|p| p.quantity < p.reorder_level)
        .map(|p| {
            let shortfall = p.reorder_level.saturating_sub(p.quantity);
            ImpactItem {
                id: p.id,
                name: p.name.clone(),
                sku: p.sku.clone(),
                quantity: p.quantity,
                reorder_level: p.reorder_level,
                shortfall,
                value_at_risk: round2(shortfall as f64 * p.unit_price),
                impact_score: impact_score(p, shortfall),
                days_of_cover: p.days_of_cover(),
            }
        })
        .collect();

    items.sort_by(|a, b| {
        b.impact_score
            .cmp(&a.impact_score)
            .then_with(|| {
                b.value_at_risk
                    .partial_cmp(&a.value_at_risk)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.name.cmp(&b.name))
    });

    let total_value_at_risk = round2(items.iter().map(|i| i.value_at_risk).sum());
    let inventory_value = round2(products.iter().map(Product::stock_value).sum());
    let at_risk_pct = percent(total_value_at_risk, inventory_value + total_value_at_risk);

    StockImpact {
        affected_products: items.len(),
        items,
        total_value_at_risk,
        inventory_value,
        at_risk_pct,
    }
}
