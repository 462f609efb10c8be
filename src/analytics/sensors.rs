//! Sensor time-series bucketing.

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::models::SensorReading;

/// Bucket width for a series query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Raw,
    Minute,
    #[default]
    Hour,
    Day,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::Raw => "raw",
            Interval::Minute => "minute",
            Interval::Hour => "hour",
            Interval::Day => "day",
        }
    }

    fn width(self) -> Option<Duration> {
        match self {
            Interval::Raw => None,
            Interval::Minute => Some(Duration::minutes(1)),
            Interval::Hour => Some(Duration::hours(1)),
            Interval::Day => Some(Duration::days(1)),
        }
    }

    /// Start of the bucket containing `at`.
    pub fn bucket_start(self, at: DateTime<Utc>) -> DateTime<Utc> {
        match self.width() {
            Some(width) => at.duration_trunc(width).unwrap_or(at),
            None => at,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raw" => Ok(Interval::Raw),
            "minute" => Ok(Interval::Minute),
            "hour" => Ok(Interval::Hour),
            "day" => Ok(Interval::Day),
            other => Err(AppError::validation(format!("Unknown interval: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub bucket_start: DateTime<Utc>,
    pub count: usize,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl SeriesPoint {
    fn new(bucket_start: DateTime<Utc>, value: f64) -> Self {
        Self {
            bucket_start,
            count: 1,
            avg: value,
            min: value,
            max: value,
        }
    }

    /// Folds another value in; `avg` holds the running sum until finished.
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.avg += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn finish(mut self) -> Self {
        self.avg /= self.count as f64;
        self
    }
}

/// Buckets readings by `interval`, returning points in ascending time.
pub fn bucket_readings(readings: &[SensorReading], interval: Interval) -> Vec<SeriesPoint> {
    if interval == Interval::Raw {
        let mut points: Vec<_> = readings
            .iter()
            .map(|r| SeriesPoint::new(r.recorded_at, r.value))
            .collect();
        points.sort_by_key(|p| p.bucket_start);
        return points;
    }

    let mut buckets: BTreeMap<DateTime<Utc>, SeriesPoint> = BTreeMap::new();
    for reading in readings {
        let start = interval.bucket_start(reading.recorded_at);
        buckets
            .entry(start)
            .and_modify(|p| p.add(reading.value))
            .or_insert_with(|| SeriesPoint::new(start, reading.value));
    }
    buckets.into_values().map(SeriesPoint::finish).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub latest: Option<f64>,
    pub first_at: Option<DateTime<Utc>>,
    pub last_at: Option<DateTime<Utc>>,
}

pub fn summarize(readings: &[SensorReading]) -> SeriesSummary {
    let Some(first) = readings.first() else {
        return SeriesSummary::default();
    };

    let mut summary = SeriesSummary {
        count: readings.len(),
        min: Some(first.value),
        max: Some(first.value),
        first_at: Some(first.recorded_at),
        last_at: Some(first.recorded_at),
        latest: Some(first.value),
        avg: None,
    };
    let mut sum = 0.0;

    for reading in readings {
        sum += reading.value;
        summary.min = summary.min.map(|m| m.min(reading.value));
        summary.max = summary.max.map(|m| m.max(reading.value));
        if summary.first_at.map_or(true, |t| reading.recorded_at < t) {
            summary.first_at = Some(reading.recorded_at);
        }
        if summary.last_at.map_or(true, |t| reading.recorded_at >= t) {
            summary.last_at = Some(reading.recorded_at);
            summary.latest = Some(reading.value);
        }
    }
    summary.avg = Some(sum / readings.len() as f64);
    summary
}

#[derive(Debug, Clone, Serialize)]
pub struct Series {
    pub sensor_id: String,
    pub metric: String,
    pub summary: SeriesSummary,
    pub points: Vec<SeriesPoint>,
}

/// Splits readings per `(sensor_id, metric)` and buckets each series.
pub fn build_series(readings: &[SensorReading], interval: Interval) -> Vec<Series> {
    let mut grouped: BTreeMap<(String, String), Vec<SensorReading>> = BTreeMap::new();
    for reading in readings {
        grouped
            .entry((reading.sensor_id.clone(), reading.metric.clone()))
            .or_default()
            .push(reading.clone());
    }

    grouped
        .into_iter()
        .map(|((sensor_id, metric), rows)| Series {
            sensor_id,
            metric,
            summary: summarize(&rows),
            points: bucket_readings(&rows, interval),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading(sensor: &str, value: f64, at: DateTime<Utc>) -> SensorReading {
        SensorReading {
            id: 0,
            sensor_id: sensor.to_string(),
            metric: "temperature".to_string(),
            value,
            unit: Some("C".to_string()),
            recorded_at: at,
        }
    }

    #[test]
    fn test_interval_parse() {
        assert_eq!("HOUR".parse::<Interval>().unwrap(), Interval::Hour);
        assert_eq!("raw".parse::<Interval>().unwrap(), Interval::Raw);
        assert!("week".parse::<Interval>().is_err());
        assert_eq!(Interval::default(), Interval::Hour);
    }

    #[test]
    fn test_hourly_buckets() {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 8, 15, 0).unwrap();
        let readings = vec![
            reading("gh-1", 20.0, base),
            reading("gh-1", 22.0, base + Duration::minutes(30)),
            reading("gh-1", 30.0, base + Duration::hours(2)),
        ];

        let points = bucket_readings(&readings, Interval::Hour);
        assert_eq!(points.len(), 2);
        assert_eq!(
            points[0].bucket_start,
            Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
        );
        assert_eq!(points[0].count, 2);
        assert_eq!(points[0].avg, 21.0);
        assert_eq!(points[0].min, 20.0);
        assert_eq!(points[0].max, 22.0);
        assert_eq!(points[1].count, 1);
        assert_eq!(points[1].avg, 30.0);
    }

    #[test]
    fn test_day_buckets_and_raw() {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 23, 30, 0).unwrap();
        let readings = vec![
            reading("gh-1", 1.0, base + Duration::hours(1)),
            reading("gh-1", 3.0, base),
        ];

        let days = bucket_readings(&readings, Interval::Day);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].avg, 3.0);

        let raw = bucket_readings(&readings, Interval::Raw);
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].bucket_start, base);
    }

    #[test]
    fn test_summarize() {
        assert_eq!(summarize(&[]), SeriesSummary::default());

        let base = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let summary = summarize(&[
            reading("gh-1", 18.0, base),
            reading("gh-1", 24.0, base + Duration::minutes(20)),
            reading("gh-1", 21.0, base + Duration::minutes(10)),
        ]);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.min, Some(18.0));
        assert_eq!(summary.max, Some(24.0));
        assert_eq!(summary.avg, Some(21.0));
        assert_eq!(summary.latest, Some(24.0));
        assert_eq!(summary.first_at, Some(base));
    }

    #[test]
    fn test_build_series_groups_sensors() {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let series = build_series(
            &[
                reading("tank", 6.5, base),
                reading("gh-1", 20.0, base),
                reading("gh-1", 21.0, base + Duration::minutes(1)),
            ],
            Interval::Minute,
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].sensor_id, "gh-1");
        assert_eq!(series[0].points.len(), 2);
        assert_eq!(series[1].summary.count, 1);
    }
}
