//! Postgres store implementations

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use shared::{
    GeoLocation, Measurements, NewReading, NewReport, Reading, Report, ResearcherReportTotals,
    Sensor,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{duplicate_name_error, ReadingStore, ReportStore, SensorRegistry};
use crate::error::{AppError, AppResult};

const READING_COLUMNS: &str = r#"
    id, sensor_id, city, region, country, latitude, longitude, local_time,
    temperature_c, temperature_f, wind_speed_kph, precipitation_mm, humidity,
    cloud_cover, uv_index, co, no2, o3, so2, pm10, collected_at, status, source_api
"#;

const REPORT_COLUMNS: &str = r#"
    id, name, description, period_start, period_end, report_type, format, status,
    content, content_size, record_count, researcher_id, created_at, completed_at
"#;

#[derive(Debug, FromRow)]
struct SensorRow {
    id: i64,
    name: String,
    sensor_type: String,
    status: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    installation_address: Option<String>,
}

impl TryFrom<SensorRow> for Sensor {
    type Error = AppError;

    fn try_from(row: SensorRow) -> Result<Self, Self::Error> {
        Ok(Sensor {
            id: row.id,
            name: row.name,
            sensor_type: row.sensor_type,
            status: row.status.parse().map_err(AppError::Internal)?,
            latitude: row.latitude,
            longitude: row.longitude,
            installation_address: row.installation_address,
        })
    }
}

#[derive(Debug, FromRow)]
struct ReadingRow {
    id: i64,
    sensor_id: i64,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    local_time: Option<NaiveDateTime>,
    temperature_c: Option<f64>,
    temperature_f: Option<f64>,
    wind_speed_kph: Option<f64>,
    precipitation_mm: Option<f64>,
    humidity: Option<f64>,
    cloud_cover: Option<f64>,
    uv_index: Option<f64>,
    co: Option<f64>,
    no2: Option<f64>,
    o3: Option<f64>,
    so2: Option<f64>,
    pm10: Option<f64>,
    collected_at: DateTime<Utc>,
    status: String,
    source_api: String,
}

impl TryFrom<ReadingRow> for Reading {
    type Error = AppError;

    fn try_from(row: ReadingRow) -> Result<Self, Self::Error> {
        Ok(Reading {
            id: row.id,
            sensor_id: row.sensor_id,
            location: GeoLocation {
                city: row.city,
                region: row.region,
                country: row.country,
                latitude: row.latitude,
                longitude: row.longitude,
            },
            local_time: row.local_time,
            measurements: Measurements {
                temperature_c: row.temperature_c,
                temperature_f: row.temperature_f,
                wind_speed_kph: row.wind_speed_kph,
                precipitation_mm: row.precipitation_mm,
                humidity: row.humidity,
                cloud_cover: row.cloud_cover,
                uv_index: row.uv_index,
                co: row.co,
                no2: row.no2,
                o3: row.o3,
                so2: row.so2,
                pm10: row.pm10,
            },
            collected_at: row.collected_at,
            status: row.status.parse().map_err(AppError::Internal)?,
            source_api: row.source_api,
        })
    }
}

fn into_readings(rows: Vec<ReadingRow>) -> AppResult<Vec<Reading>> {
    rows.into_iter().map(Reading::try_from).collect()
}

#[derive(Debug, FromRow)]
struct ReportRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    period_start: NaiveDateTime,
    period_end: NaiveDateTime,
    report_type: String,
    format: String,
    status: String,
    content: Option<String>,
    content_size: i64,
    record_count: i64,
    researcher_id: i64,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReportRow> for Report {
    type Error = AppError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        Ok(Report {
            id: row.id,
            name: row.name,
            description: row.description,
            period_start: row.period_start,
            period_end: row.period_end,
            report_type: row.report_type.parse().map_err(AppError::Internal)?,
            format: row.format.parse().map_err(AppError::Internal)?,
            status: row.status.parse().map_err(AppError::Internal)?,
            content: row.content,
            content_size: row.content_size,
            record_count: row.record_count,
            researcher_id: row.researcher_id,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

/// Sensor registry over the `sensors` table
#[derive(Clone)]
pub struct PgSensorRegistry {
    db: PgPool,
}

impl PgSensorRegistry {
    /// Create a new PgSensorRegistry
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SensorRegistry for PgSensorRegistry {
    async fn find(&self, id: i64) -> AppResult<Option<Sensor>> {
        let row = sqlx::query_as::<_, SensorRow>(
            r#"
            SELECT id, name, sensor_type, status, latitude, longitude, installation_address
            FROM sensors
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Sensor::try_from).transpose()
    }

    async fn list_active(&self) -> AppResult<Vec<Sensor>> {
        let rows = sqlx::query_as::<_, SensorRow>(
            r#"
            SELECT id, name, sensor_type, status, latitude, longitude, installation_address
            FROM sensors
            WHERE status = 'ACTIVE'
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Sensor::try_from).collect()
    }

    async fn list_all(&self) -> AppResult<Vec<Sensor>> {
        let rows = sqlx::query_as::<_, SensorRow>(
            r#"
            SELECT id, name, sensor_type, status, latitude, longitude, installation_address
            FROM sensors
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Sensor::try_from).collect()
    }
}

/// Reading store over the `readings` table
#[derive(Clone)]
pub struct PgReadingStore {
    db: PgPool,
}

impl PgReadingStore {
    /// Create a new PgReadingStore
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn insert(&self, reading: NewReading) -> AppResult<Reading> {
        let m = &reading.measurements;
        let loc = &reading.location;

        let row = sqlx::query_as::<_, ReadingRow>(&format!(
            r#"
            INSERT INTO readings (
                sensor_id, city, region, country, latitude, longitude, local_time,
                temperature_c, temperature_f, wind_speed_kph, precipitation_mm, humidity,
                cloud_cover, uv_index, co, no2, o3, so2, pm10, collected_at, status, source_api
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22)
            RETURNING {}
            "#,
            READING_COLUMNS
        ))
        .bind(reading.sensor_id)
        .bind(&loc.city)
        .bind(&loc.region)
        .bind(&loc.country)
        .bind(loc.latitude)
        .bind(loc.longitude)
        .bind(reading.local_time)
        .bind(m.temperature_c)
        .bind(m.temperature_f)
        .bind(m.wind_speed_kph)
        .bind(m.precipitation_mm)
        .bind(m.humidity)
        .bind(m.cloud_cover)
        .bind(m.uv_index)
        .bind(m.co)
        .bind(m.no2)
        .bind(m.o3)
        .bind(m.so2)
        .bind(m.pm10)
        .bind(reading.collected_at)
        .bind(reading.status.as_str())
        .bind(&reading.source_api)
        .fetch_one(&self.db)
        .await?;

        Reading::try_from(row)
    }

    async fn find_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Vec<Reading>> {
        let rows = sqlx::query_as::<_, ReadingRow>(&format!(
            r#"
            SELECT {}
            FROM readings
            WHERE collected_at BETWEEN $1 AND $2
            ORDER BY collected_at, id
            "#,
            READING_COLUMNS
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        into_readings(rows)
    }

    async fn find_by_sensor_between(
        &self,
        sensor_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Reading>> {
        let rows = sqlx::query_as::<_, ReadingRow>(&format!(
            r#"
            SELECT {}
            FROM readings
            WHERE sensor_id = $1 AND collected_at BETWEEN $2 AND $3
            ORDER BY collected_at DESC, id DESC
            "#,
            READING_COLUMNS
        ))
        .bind(sensor_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        into_readings(rows)
    }

    async fn latest_for_sensor(&self, sensor_id: i64, limit: i64) -> AppResult<Vec<Reading>> {
        let rows = sqlx::query_as::<_, ReadingRow>(&format!(
            r#"
            SELECT {}
            FROM readings
            WHERE sensor_id = $1
            ORDER BY collected_at DESC, id DESC
            LIMIT $2
            "#,
            READING_COLUMNS
        ))
        .bind(sensor_id)
        .bind(limit.max(0))
        .fetch_all(&self.db)
        .await?;

        into_readings(rows)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Reading>> {
        let row = sqlx::query_as::<_, ReadingRow>(&format!(
            "SELECT {} FROM readings WHERE id = $1",
            READING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Reading::try_from).transpose()
    }

    async fn find_since(&self, since: DateTime<Utc>) -> AppResult<Vec<Reading>> {
        let rows = sqlx::query_as::<_, ReadingRow>(&format!(
            r#"
            SELECT {}
            FROM readings
            WHERE collected_at >= $1
            ORDER BY collected_at DESC, id DESC
            "#,
            READING_COLUMNS
        ))
        .bind(since)
        .fetch_all(&self.db)
        .await?;

        into_readings(rows)
    }

    async fn find_by_city(&self, city: &str) -> AppResult<Vec<Reading>> {
        let rows = sqlx::query_as::<_, ReadingRow>(&format!(
            r#"
            SELECT {}
            FROM readings
            WHERE city = $1
            ORDER BY collected_at DESC, id DESC
            "#,
            READING_COLUMNS
        ))
        .bind(city)
        .fetch_all(&self.db)
        .await?;

        into_readings(rows)
    }

    async fn count_for_sensor(&self, sensor_id: i64) -> AppResult<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM readings WHERE sensor_id = $1")
                .bind(sensor_id)
                .fetch_one(&self.db)
                .await?;

        Ok(count)
    }
}

/// Report store over the `reports` table
#[derive(Clone)]
pub struct PgReportStore {
    db: PgPool,
}

impl PgReportStore {
    /// Create a new PgReportStore
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn insert(&self, report: NewReport) -> AppResult<Report> {
        // The partial unique index on (researcher_id, name) rejects a second
        // live report atomically
        let result = sqlx::query_as::<_, ReportRow>(&format!(
            r#"
            INSERT INTO reports (
                id, name, description, period_start, period_end, report_type, format,
                status, content_size, record_count, researcher_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'IN_PROGRESS', 0, 0, $8)
            RETURNING {}
            "#,
            REPORT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&report.name)
        .bind(&report.description)
        .bind(report.period_start)
        .bind(report.period_end)
        .bind(report.report_type.as_str())
        .bind(report.format.as_str())
        .bind(report.researcher_id)
        .fetch_one(&self.db)
        .await;

        match result {
            Ok(row) => Report::try_from(row),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                Err(duplicate_name_error(&report.name))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Report>> {
        let row = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {} FROM reports WHERE id = $1",
            REPORT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Report::try_from).transpose()
    }

    async fn complete(&self, id: Uuid, content: String, record_count: i64) -> AppResult<bool> {
        let content_size = content.len() as i64;
        let result = sqlx::query(
            r#"
            UPDATE reports
            SET status = 'DONE', content = $2, content_size = $3, record_count = $4,
                completed_at = NOW()
            WHERE id = $1 AND status = 'IN_PROGRESS'
            "#,
        )
        .bind(id)
        .bind(content)
        .bind(content_size)
        .bind(record_count)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn fail(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reports
            SET status = 'ERROR', content = NULL, content_size = 0, completed_at = NOW()
            WHERE id = $1 AND status = 'IN_PROGRESS'
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_for_researcher(&self, researcher_id: i64) -> AppResult<Vec<Report>> {
        let rows = sqlx::query_as::<_, ReportRow>(&format!(
            r#"
            SELECT {}
            FROM reports
            WHERE researcher_id = $1
            ORDER BY created_at DESC
            "#,
            REPORT_COLUMNS
        ))
        .bind(researcher_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Report::try_from).collect()
    }

    async fn researcher_totals(&self, researcher_id: i64) -> AppResult<ResearcherReportTotals> {
        let (report_count, total_content_size): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(content_size), 0)::BIGINT
            FROM reports
            WHERE researcher_id = $1
            "#,
        )
        .bind(researcher_id)
        .fetch_one(&self.db)
        .await?;

        Ok(ResearcherReportTotals::new(
            researcher_id,
            report_count,
            total_content_size,
        ))
    }
}
