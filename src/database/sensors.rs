//! Sensor reading storage.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Value, Row};

use super::Database;
use crate::error::{AppError, AppResult};
use crate::models::{NewSensorReading, SensorInfo, SensorReading};

fn reading_from_row(row: &Row<'_>) -> rusqlite::Result<SensorReading> {
    Ok(SensorReading {
        id: row.get(0)?,
        sensor_id: row.get(1)?,
        metric: row.get(2)?,
        value: row.get(3)?,
        unit: row.get(4)?,
        recorded_at: row.get(5)?,
    })
}

/// Filter for reading queries. `None` fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct ReadingFilter<'a> {
    pub sensor_id: Option<&'a str>,
    pub metric: Option<&'a str>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl Database {
    /// Stores one validated reading.
    pub fn insert_reading(&self, reading: &NewSensorReading) -> AppResult<SensorReading> {
        let mut stored = self.insert_readings(std::slice::from_ref(reading))?;
        stored
            .pop()
            .ok_or_else(|| AppError::validation("no reading stored"))
    }

    /// Stores validated readings in one transaction.
    pub fn insert_readings(&self, readings: &[NewSensorReading]) -> AppResult<Vec<SensorReading>> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut stored = Vec::with_capacity(readings.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sensor_readings (sensor_id, metric, value, unit, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for reading in readings {
                let recorded_at = reading
                    .recorded_at
                    .ok_or_else(|| AppError::validation("recorded_at is required"))?;
                stmt.execute(params![
                    reading.sensor_id,
                    reading.metric,
                    reading.value,
                    reading.unit,
                    recorded_at,
                ])?;
                stored.push(SensorReading {
                    id: tx.last_insert_rowid(),
                    sensor_id: reading.sensor_id.clone(),
                    metric: reading.metric.clone(),
                    value: reading.value,
                    unit: reading.unit.clone(),
                    recorded_at,
                });
            }
        }
        tx.commit()?;
        Ok(stored)
    }

    /// Queries readings in ascending time order.
    ///
    /// With a `limit`, only the most recent `limit` matching rows are kept.
    pub fn query_readings(
        &self,
        filter: &ReadingFilter<'_>,
        limit: Option<usize>,
    ) -> AppResult<Vec<SensorReading>> {
        let mut conditions = vec!["1 = 1".to_string()];
        let mut args: Vec<Value> = Vec::new();

        if let Some(sensor_id) = filter.sensor_id {
            conditions.push("sensor_id = ?".to_string());
            args.push(Value::Text(sensor_id.to_string()));
        }
        if let Some(metric) = filter.metric {
            conditions.push("metric = ?".to_string());
            args.push(Value::Text(metric.to_lowercase()));
        }
        if let Some(from) = filter.from {
            conditions.push("recorded_at >= ?".to_string());
            args.push(time_value(from));
        }
        if let Some(to) = filter.to {
            conditions.push("recorded_at <= ?".to_string());
            args.push(time_value(to));
        }

        let limit_sql = match limit {
            Some(limit) => format!("LIMIT {}", limit),
            None => String::new(),
        };
        let sql = format!(
            "SELECT id, sensor_id, metric, value, unit, recorded_at FROM (
                SELECT id, sensor_id, metric, value, unit, recorded_at
                FROM sensor_readings
                WHERE {}
                ORDER BY recorded_at DESC, id DESC
                {}
             ) ORDER BY recorded_at ASC, id ASC",
            conditions.join(" AND "),
            limit_sql
        );

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), reading_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Known sensor/metric pairs with their latest reading.
    pub fn list_sensors(&self) -> AppResult<Vec<SensorInfo>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT sensor_id, metric, reading_count, value, recorded_at FROM (
                SELECT sensor_id, metric, value, recorded_at,
                       COUNT(*) OVER (PARTITION BY sensor_id, metric) AS reading_count,
                       ROW_NUMBER() OVER (
                           PARTITION BY sensor_id, metric
                           ORDER BY recorded_at DESC, id DESC
                       ) AS latest_rank
                FROM sensor_readings
             )
             WHERE latest_rank = 1
             ORDER BY sensor_id, metric",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SensorInfo {
                sensor_id: row.get(0)?,
                metric: row.get(1)?,
                reading_count: row.get(2)?,
                last_value: row.get(3)?,
                last_recorded_at: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}

/// Text form matching how rusqlite stores `DateTime<Utc>`, so range
/// comparisons on `recorded_at` stay lexicographic.
fn time_value(t: DateTime<Utc>) -> Value {
    Value::Text(t.format("%F %T%.f%:z").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn reading(sensor: &str, metric: &str, value: f64, at: DateTime<Utc>) -> NewSensorReading {
        NewSensorReading {
            sensor_id: sensor.into(),
            metric: metric.into(),
            value,
            unit: None,
            recorded_at: Some(at),
        }
    }

    #[test]
    fn test_insert_and_query_range() {
        let db = Database::open_in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let batch: Vec<_> = (0..6)
            .map(|i| reading("gh-1", "temperature", 20.0 + i as f64, base + Duration::minutes(10 * i)))
            .collect();
        let stored = db.insert_readings(&batch).unwrap();
        assert_eq!(stored.len(), 6);
        assert!(stored[0].id < stored[5].id);

        let filter = ReadingFilter {
            sensor_id: Some("gh-1"),
            metric: Some("Temperature"),
            from: Some(base + Duration::minutes(10)),
            to: Some(base + Duration::minutes(30)),
        };
        let rows = db.query_readings(&filter, None).unwrap();
        let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![21.0, 22.0, 23.0]);
    }

    #[test]
    fn test_query_limit_keeps_latest() {
        let db = Database::open_in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let batch: Vec<_> = (0..5)
            .map(|i| reading("gh-1", "humidity", i as f64, base + Duration::minutes(i)))
            .collect();
        db.insert_readings(&batch).unwrap();

        let rows = db.query_readings(&ReadingFilter::default(), Some(2)).unwrap();
        let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![3.0, 4.0]);
    }

    #[test]
    fn test_list_sensors() {
        let db = Database::open_in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        db.insert_readings(&[
            reading("gh-1", "temperature", 20.0, base),
            reading("gh-1", "temperature", 22.5, base + Duration::minutes(5)),
            reading("tank", "ph", 6.1, base),
        ])
        .unwrap();

        let sensors = db.list_sensors().unwrap();
        assert_eq!(sensors.len(), 2);
        assert_eq!(sensors[0].sensor_id, "gh-1");
        assert_eq!(sensors[0].reading_count, 2);
        assert_eq!(sensors[0].last_value, 22.5);
        assert_eq!(sensors[1].metric, "ph");

        assert_eq!(db.dashboard_counts().unwrap().sensors, 2);
    }

    #[test]
    fn test_list_sensors_latest_by_time() {
        let db = Database::open_in_memory().unwrap();
        let day = Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap();
        db.insert_reading(&reading("soil-3", "moisture", 2.0, day)).unwrap();
        db.insert_reading(&reading("soil-3", "moisture", 1.0, day - Duration::days(1)))
            .unwrap();

        let sensors = db.list_sensors().unwrap();
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].reading_count, 2);
        assert_eq!(sensors[0].last_value, 2.0);
        assert_eq!(sensors[0].last_recorded_at, day);
    }
}
