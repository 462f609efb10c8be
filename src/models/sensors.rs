//! Sensor readings (greenhouse temperature, humidity, water pH, ...).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{optional_text, require_text};
use crate::error::{AppError, AppResult};

/// How far in the future a reading timestamp may be (clock skew).
pub const MAX_CLOCK_SKEW_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: i64,
    pub sensor_id: String,
    pub metric: String,
    pub value: f64,
    pub unit: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSensorReading {
    pub sensor_id: String,
    pub metric: String,
    pub value: f64,
    pub unit: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl NewSensorReading {
    /// Validates the reading; a missing timestamp becomes `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> AppResult<NewSensorReading> {
        if !self.value.is_finite() {
            return Err(AppError::validation("value must be a finite number"));
        }
        let recorded_at = self.recorded_at.unwrap_or(now);
        if recorded_at > now + Duration::seconds(MAX_CLOCK_SKEW_SECS) {
            return Err(AppError::validation("recorded_at is in the future"));
        }
        Ok(NewSensorReading {
            sensor_id: require_text("sensor_id", &self.sensor_id)?,
            metric: require_text("metric", &self.metric)?.to_lowercase(),
            value: self.value,
            unit: optional_text(self.unit.as_deref()),
            recorded_at: Some(recorded_at),
        })
    }
}

/// Ingest body: a single reading or a batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ReadingBatch {
    Many(Vec<NewSensorReading>),
    One(NewSensorReading),
}

impl ReadingBatch {
    pub fn into_vec(self) -> Vec<NewSensorReading> {
        match self {
            ReadingBatch::Many(readings) => readings,
            ReadingBatch::One(reading) => vec![reading],
        }
    }
}

/// One known sensor/metric pair with its latest value.
#[derive(Debug, Clone, Serialize)]
pub struct SensorInfo {
    pub sensor_id: String,
    pub metric: String,
    pub reading_count: i64,
    pub last_value: f64,
    pub last_recorded_at: DateTime<Utc>,
}
