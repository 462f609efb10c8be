//! Barley-plate (fodder tray) tracking records.
//!
//! A plate moves forward one growth stage at a time and ends either
//! harvested or discarded.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{non_negative, optional_text, require_text};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlateStage {
    Sown,
    Germinating,
    Growing,
    Ready,
    Harvested,
    Discarded,
}

impl PlateStage {
    /// Every stage, in growth order.
    pub const ALL: [PlateStage; 6] = [
        PlateStage::Sown,
        PlateStage::Germinating,
        PlateStage::Growing,
        PlateStage::Ready,
        PlateStage::Harvested,
        PlateStage::Discarded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PlateStage::Sown => "sown",
            PlateStage::Germinating => "germinating",
            PlateStage::Growing => "growing",
            PlateStage::Ready => "ready",
            PlateStage::Harvested => "harvested",
            PlateStage::Discarded => "discarded",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PlateStage::Harvested | PlateStage::Discarded)
    }

    /// The next stage in normal growth, if any.
    pub fn next(self) -> Option<PlateStage> {
        match self {
            PlateStage::Sown => Some(PlateStage::Germinating),
            PlateStage::Germinating => Some(PlateStage::Growing),
            PlateStage::Growing => Some(PlateStage::Ready),
            PlateStage::Ready => Some(PlateStage::Harvested),
            PlateStage::Harvested | PlateStage::Discarded => None,
        }
    }

    /// Only the immediate next stage, or discarding a plate that is still live.
    pub fn can_transition_to(self, next: PlateStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == PlateStage::Discarded || self.next() == Some(next)
    }
}

impl fmt::Display for PlateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlateStage {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlateStage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("Unknown plate stage: {}", s)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarleyPlate {
    pub id: i64,
    pub plate_code: String,
    pub variety: String,
    pub sown_on: NaiveDate,
    pub stage: PlateStage,
    pub tray_location: Option<String>,
    pub seed_weight_g: f64,
    pub yield_weight_g: Option<f64>,
    pub harvested_on: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPlate {
    pub plate_code: String,
    pub variety: String,
    pub sown_on: Option<NaiveDate>,
    pub tray_location: Option<String>,
    #[serde(default)]
    pub seed_weight_g: f64,
    pub notes: Option<String>,
}

impl NewPlate {
    /// Validates the plate; `sown_on` defaults to `today` and may not be later.
    pub fn validate(&self, today: NaiveDate) -> AppResult<NewPlate> {
        non_negative("seed_weight_g", self.seed_weight_g)?;
        let sown_on = self.sown_on.unwrap_or(today);
        if sown_on > today {
            return Err(AppError::validation("sown_on cannot be in the future"));
        }
        Ok(NewPlate {
            plate_code: require_text("plate_code", &self.plate_code)?.to_uppercase(),
            variety: require_text("variety", &self.variety)?,
            sown_on: Some(sown_on),
            tray_location: optional_text(self.tray_location.as_deref()),
            seed_weight_g: self.seed_weight_g,
            notes: optional_text(self.notes.as_deref()),
        })
    }
}

/// Editable plate fields. Stage changes go through `StageChange`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatePatch {
    pub variety: Option<String>,
    pub tray_location: Option<String>,
    pub seed_weight_g: Option<f64>,
    pub notes: Option<String>,
}

impl PlatePatch {
    pub fn apply(&self, current: &BarleyPlate) -> AppResult<BarleyPlate> {
        let mut plate = current.clone();
        if let Some(variety) = &self.variety {
            plate.variety = require_text("variety", variety)?;
        }
        if let Some(location) = &self.tray_location {
            plate.tray_location = optional_text(Some(location.as_str()));
        }
        if let Some(weight) = self.seed_weight_g {
            non_negative("seed_weight_g", weight)?;
            plate.seed_weight_g = weight;
        }
        if let Some(notes) = &self.notes {
            plate.notes = optional_text(Some(notes.as_str()));
        }
        Ok(plate)
    }
}

/// Body of `POST /api/plates/:id/stage`.
#[derive(Debug, Clone, Deserialize)]
pub struct StageChange {
    pub stage: PlateStage,
    pub yield_weight_g: Option<f64>,
    pub harvested_on: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_transitions() {
        assert!(PlateStage::Sown.can_transition_to(PlateStage::Germinating));
        assert!(PlateStage::Ready.can_transition_to(PlateStage::Harvested));
        assert!(PlateStage::Growing.can_transition_to(PlateStage::Discarded));

        assert!(!PlateStage::Sown.can_transition_to(PlateStage::Growing));
        assert!(!PlateStage::Growing.can_transition_to(PlateStage::Germinating));
        assert!(!PlateStage::Sown.can_transition_to(PlateStage::Sown));
        assert!(!PlateStage::Harvested.can_transition_to(PlateStage::Discarded));
        assert!(!PlateStage::Discarded.can_transition_to(PlateStage::Sown));
    }

    #[test]
    fn test_stage_parse() {
        assert_eq!(
            "germinating".parse::<PlateStage>().unwrap(),
            PlateStage::Germinating
        );
        assert!("sprouting".parse::<PlateStage>().is_err());
    }

    #[test]
    fn test_new_plate_rejects_future_sowing() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let plate = NewPlate {
            plate_code: "p-01".into(),
            variety: "Hordeum".into(),
            sown_on: today.succ_opt(),
            tray_location: None,
            seed_weight_g: 500.0,
            notes: None,
        };
        assert!(plate.validate(today).is_err());

        let plate = NewPlate {
            sown_on: None,
            ..plate
        };
        let valid = plate.validate(today).unwrap();
        assert_eq!(valid.sown_on, Some(today));
        assert_eq!(valid.plate_code, "P-01");
    }
}
