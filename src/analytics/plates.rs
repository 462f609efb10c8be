//! Barley-plate production summary.

use serde::Serialize;

use super::{percent, round1};
use crate::models::{BarleyPlate, PlateStage};

#[derive(Debug, Clone, Serialize)]
pub struct StageCount {
    pub stage: PlateStage,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlateSummary {
    pub total: usize,
    pub by_stage: Vec<StageCount>,
    pub active: usize,
    pub harvested: usize,
    pub discarded: usize,
    pub success_rate_pct: Option<f64>,
    pub avg_days_to_harvest: Option<f64>,
    pub avg_yield_g: Option<f64>,
    /// Yield weight over seed weight.
    pub avg_yield_ratio: Option<f64>,
}

fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn plate_summary(plates: &[BarleyPlate]) -> PlateSummary {
    let mut by_stage: Vec<StageCount> = PlateStage::ALL
        .into_iter()
        .map(|stage| StageCount { stage, count: 0 })
        .collect();
    let mut days_to_harvest = Vec::new();
    let mut yields = Vec::new();
    let mut ratios = Vec::new();

    for plate in plates {
        if let Some(entry) = by_stage.iter_mut().find(|s| s.stage == plate.stage) {
            entry.count += 1;
        }
        if plate.stage != PlateStage::Harvested {
            continue;
        }
        if let Some(on) = plate.harvested_on {
            days_to_harvest.push((on - plate.sown_on).num_days() as f64);
        }
        if let Some(weight) = plate.yield_weight_g {
            yields.push(weight);
            if plate.seed_weight_g > 0.0 {
                ratios.push(weight / plate.seed_weight_g);
            }
        }
    }

    let count = |stage: PlateStage| {
        by_stage
            .iter()
            .find(|s| s.stage == stage)
            .map_or(0, |s| s.count)
    };
    let harvested = count(PlateStage::Harvested);
    let discarded = count(PlateStage::Discarded);

    PlateSummary {
        total: plates.len(),
        active: plates.iter().filter(|p| !p.stage.is_terminal()).count(),
        harvested,
        discarded,
        success_rate_pct: (harvested + discarded > 0)
            .then(|| percent(harvested as f64, (harvested + discarded) as f64)),
        avg_days_to_harvest: average(&days_to_harvest).map(round1),
        avg_yield_g: average(&yields).map(round1),
        avg_yield_ratio: average(&ratios).map(|r| (r * 100.0).round() / 100.0),
        by_stage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn plate(id: i64, stage: PlateStage, sown: &str) -> BarleyPlate {
        BarleyPlate {
            id,
            plate_code: format!("P-{}", id),
            variety: "Six-row".into(),
            sown_on: NaiveDate::parse_from_str(sown, "%Y-%m-%d").unwrap(),
            stage,
            tray_location: None,
            seed_weight_g: 400.0,
            yield_weight_g: None,
            harvested_on: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn harvested(id: i64, sown: &str, days: i64, yield_g: f64) -> BarleyPlate {
        let mut p = plate(id, PlateStage::Harvested, sown);
        p.harvested_on = Some(p.sown_on + chrono::Duration::days(days));
        p.yield_weight_g = Some(yield_g);
        p
    }

    #[test]
    fn test_plate_summary() {
        let plates = vec![
            plate(1, PlateStage::Sown, "2024-04-01"),
            plate(2, PlateStage::Growing, "2024-04-01"),
            harvested(3, "2024-03-01", 8, 2400.0),
            harvested(4, "2024-03-02", 9, 2800.0),
            plate(5, PlateStage::Discarded, "2024-03-03"),
        ];

        let summary = plate_summary(&plates);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.by_stage.len(), 6);
        assert_eq!(summary.by_stage[0].stage, PlateStage::Sown);
        assert_eq!(summary.by_stage[0].count, 1);
        assert_eq!(summary.by_stage[3].count, 0);
        assert_eq!(summary.active, 2);
        assert_eq!(summary.harvested, 2);
        assert_eq!(summary.discarded, 1);
        assert_eq!(summary.success_rate_pct, Some(66.7));
        assert_eq!(summary.avg_days_to_harvest, Some(8.5));
        assert_eq!(summary.avg_yield_g, Some(2600.0));
        assert_eq!(summary.avg_yield_ratio, Some(6.5));
    }

    #[test]
    fn test_empty_summary() {
        let summary = plate_summary(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.success_rate_pct, None);
        assert_eq!(summary.avg_days_to_harvest, None);
        assert!(summary.by_stage.iter().all(|s| s.count == 0));
    }
}
