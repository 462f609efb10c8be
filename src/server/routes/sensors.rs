//! Sensor ingest and time-series queries.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analytics::{build_series, Interval, Series};
use crate::auth::CurrentUser;
use crate::database::ReadingFilter;
use crate::error::{AppError, AppResult};
use crate::models::{ReadingBatch, SensorInfo, SensorReading};
use crate::server::state::AppState;

/// Window used when the query gives no `from`.
const DEFAULT_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Default, Deserialize)]
pub struct SeriesQuery {
    pub sensor_id: Option<String>,
    pub metric: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub interval: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub interval: Interval,
    pub series: Vec<Series>,
}

fn parse_time(field: &str, value: Option<&str>) -> AppResult<Option<DateTime<Utc>>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(text) => DateTime::parse_from_rfc3339(text)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| AppError::validation(format!("{} must be an RFC 3339 timestamp", field))),
        None => Ok(None),
    }
}

/// Resolves the query window: `to` defaults to now, `from` to a day before `to`.
pub(crate) fn resolve_range(
    from: Option<&str>,
    to: Option<&str>,
    now: DateTime<Utc>,
) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let to = parse_time("to", to)?.unwrap_or(now);
    let from = parse_time("from", from)?.unwrap_or(to - Duration::hours(DEFAULT_WINDOW_HOURS));
    if from > to {
        return Err(AppError::validation("from must not be after to"));
    }
    Ok((from, to))
}

/// GET /api/sensors
pub async fn list(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<SensorInfo>>> {
    Ok(Json(state.db.list_sensors()?))
}

/// POST /api/sensors/readings
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Json(batch): Json<ReadingBatch>,
) -> AppResult<(StatusCode, Json<Vec<SensorReading>>)> {
    let now = Utc::now();
    let readings = batch
        .into_vec()
        .iter()
        .map(|r| r.validate(now))
        .collect::<AppResult<Vec<_>>>()?;
    if readings.is_empty() {
        return Err(AppError::validation("at least one reading is required"));
    }

    let stored = state.db.insert_readings(&readings)?;
    tracing::debug!(count = stored.len(), "Sensor readings stored");
    for reading in &stored {
        state.broadcast("sensor_reading", reading);
    }
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /api/sensors/series
pub async fn series(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(query): Query<SeriesQuery>,
) -> AppResult<Json<SeriesResponse>> {
    let (from, to) = resolve_range(query.from.as_deref(), query.to.as_deref(), Utc::now())?;
    let interval = match query.interval.as_deref().filter(|v| !v.trim().is_empty()) {
        Some(text) => text.parse::<Interval>()?,
        None => Interval::default(),
    };

    let filter = ReadingFilter {
        sensor_id: query.sensor_id.as_deref().filter(|v| !v.is_empty()),
        metric: query.metric.as_deref().filter(|v| !v.is_empty()),
        from: Some(from),
        to: Some(to),
    };
    // Only raw output is capped
    let limit = (interval == Interval::Raw).then(|| state.settings().sensor_max_points);
    let readings = state.db.query_readings(&filter, limit)?;

    Ok(Json(SeriesResponse {
        from,
        to,
        interval,
        series: build_series(&readings, interval),
    }))
}
