//! Reading query HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::Reading;

use crate::error::{AppError, AppResult};
use crate::services::reporting::ReadingStatistics;
use crate::AppState;

const DEFAULT_LATEST_LIMIT: i64 = 10;
const MAX_LATEST_LIMIT: i64 = 1000;
const DEFAULT_RECENT_HOURS: i64 = 24;
const MAX_RECENT_HOURS: i64 = 24 * 365;

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub limit: Option<i64>,
}

/// Closed period, interpreted as UTC
#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl PeriodQuery {
    fn check(&self) -> AppResult<()> {
        if self.start > self.end {
            return Err(AppError::Validation {
                field: "start".to_string(),
                message: "start must not be after end".to_string(),
                message_fr: "le début ne doit pas être après la fin".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(alias = "heures")]
    pub hours: Option<i64>,
}

/// Reading with derived summaries
#[derive(Debug, Serialize)]
pub struct ReadingResponse {
    #[serde(flatten)]
    pub reading: Reading,
    pub location_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<String>,
    pub air_quality_summary: String,
    pub conditions_summary: String,
}

impl From<Reading> for ReadingResponse {
    fn from(reading: Reading) -> Self {
        Self {
            location_label: reading.location.label(),
            coordinates: reading.location.coordinates(),
            air_quality_summary: reading.air_quality_summary(),
            conditions_summary: reading.conditions_summary(),
            reading,
        }
    }
}

fn respond(readings: Vec<Reading>) -> axum::response::Response {
    let readings: Vec<ReadingResponse> = readings.into_iter().map(ReadingResponse::from).collect();
    (
        StatusCode::OK,
        Json(serde_json::json!({ "count": readings.len(), "readings": readings })),
    )
        .into_response()
}

/// Most recent readings of a sensor
pub async fn latest_readings(
    State(state): State<AppState>,
    Path(sensor_id): Path<i64>,
    Query(query): Query<LatestQuery>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LATEST_LIMIT)
        .clamp(1, MAX_LATEST_LIMIT);

    match state.readings.latest_for_sensor(sensor_id, limit).await {
        Ok(readings) => respond(readings),
        Err(e) => e.into_response(),
    }
}

/// Readings of a sensor within a period, newest first
pub async fn readings_in_period(
    State(state): State<AppState>,
    Path(sensor_id): Path<i64>,
    Query(query): Query<PeriodQuery>,
) -> impl IntoResponse {
    if let Err(e) = query.check() {
        return e.into_response();
    }

    match state
        .readings
        .find_by_sensor_between(sensor_id, query.start.and_utc(), query.end.and_utc())
        .await
    {
        Ok(readings) => respond(readings),
        Err(e) => e.into_response(),
    }
}

/// A single reading by id
pub async fn get_reading(
    State(state): State<AppState>,
    Path(reading_id): Path<i64>,
) -> impl IntoResponse {
    match state.readings.find_by_id(reading_id).await {
        Ok(Some(reading)) => (StatusCode::OK, Json(ReadingResponse::from(reading))).into_response(),
        Ok(None) => AppError::NotFound(format!("Reading {}", reading_id)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Readings of all sensors from the last `hours` hours, newest first
pub async fn recent_readings(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> impl IntoResponse {
    let hours = query.hours.unwrap_or(DEFAULT_RECENT_HOURS);
    if !(1..=MAX_RECENT_HOURS).contains(&hours) {
        return AppError::Validation {
            field: "hours".to_string(),
            message: format!("hours must be between 1 and {}", MAX_RECENT_HOURS),
            message_fr: format!("le nombre d'heures doit être compris entre 1 et {}", MAX_RECENT_HOURS),
        }
        .into_response();
    }

    let since = Utc::now() - Duration::hours(hours);
    match state.readings.find_since(since).await {
        Ok(readings) => respond(readings),
        Err(e) => e.into_response(),
    }
}

/// Readings captured in a city, newest first
pub async fn readings_by_city(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> impl IntoResponse {
    match state.readings.find_by_city(&city).await {
        Ok(readings) => respond(readings),
        Err(e) => e.into_response(),
    }
}

async fn ensure_sensor(state: &AppState, sensor_id: i64) -> AppResult<()> {
    match state.sensors.find(sensor_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::UnknownSensor(sensor_id)),
    }
}

async fn period_statistics(
    state: &AppState,
    sensor_id: i64,
    query: &PeriodQuery,
) -> AppResult<ReadingStatistics> {
    query.check()?;
    ensure_sensor(state, sensor_id).await?;
    let readings = state
        .readings
        .find_by_sensor_between(sensor_id, query.start.and_utc(), query.end.and_utc())
        .await?;
    Ok(ReadingStatistics::compute(&readings))
}

/// Temperature mean, min and max of a sensor over a period
pub async fn sensor_temperature_statistics(
    State(state): State<AppState>,
    Path(sensor_id): Path<i64>,
    Query(query): Query<PeriodQuery>,
) -> impl IntoResponse {
    match period_statistics(&state, sensor_id, &query).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "sensor_id": sensor_id,
                "start": query.start,
                "end": query.end,
                "record_count": stats.record_count,
                "temperature": stats.temperature,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Pollutant means of a sensor over a period
pub async fn sensor_air_statistics(
    State(state): State<AppState>,
    Path(sensor_id): Path<i64>,
    Query(query): Query<PeriodQuery>,
) -> impl IntoResponse {
    match period_statistics(&state, sensor_id, &query).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "sensor_id": sensor_id,
                "start": query.start,
                "end": query.end,
                "record_count": stats.record_count,
                "co_mean": stats.pollution.co_mean,
                "pollution": stats.pollution,
                "air_quality": stats.air_quality().label(),
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Number of readings stored for a sensor
pub async fn sensor_reading_count(
    State(state): State<AppState>,
    Path(sensor_id): Path<i64>,
) -> impl IntoResponse {
    if let Err(e) = ensure_sensor(&state, sensor_id).await {
        return e.into_response();
    }

    match state.readings.count_for_sensor(sensor_id).await {
        Ok(count) => (
            StatusCode::OK,
            Json(serde_json::json!({ "sensor_id": sensor_id, "count": count })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
