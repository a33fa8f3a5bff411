//! Persistence collaborators: sensor registry, reading store, report store
//!
//! Each store is a trait so the services can run against Postgres in
//! production and against the in-memory implementations in tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{NewReading, NewReport, Reading, Report, ResearcherReportTotals, Sensor};
use uuid::Uuid;

use crate::error::AppResult;

pub use memory::{MemoryReadingStore, MemoryReportStore, MemorySensorRegistry};
pub use postgres::{PgReadingStore, PgReportStore, PgSensorRegistry};

/// Read-only view of registered sensors
#[async_trait]
pub trait SensorRegistry: Send + Sync {
    async fn find(&self, id: i64) -> AppResult<Option<Sensor>>;

    /// Sensors whose status is ACTIVE, by id
    async fn list_active(&self) -> AppResult<Vec<Sensor>>;

    async fn list_all(&self) -> AppResult<Vec<Sensor>>;
}

/// Append-only storage of readings
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn insert(&self, reading: NewReading) -> AppResult<Reading>;

    /// Readings collected in `[start, end]`, oldest first
    async fn find_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Vec<Reading>>;

    /// Readings of one sensor collected in `[start, end]`, newest first
    async fn find_by_sensor_between(
        &self,
        sensor_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Reading>>;

    /// Most recent readings of one sensor, newest first
    async fn latest_for_sensor(&self, sensor_id: i64, limit: i64) -> AppResult<Vec<Reading>>;

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Reading>>;

    /// Readings of all sensors collected at or after `since`, newest first
    async fn find_since(&self, since: DateTime<Utc>) -> AppResult<Vec<Reading>>;

    /// Readings whose city name matches exactly, newest first
    async fn find_by_city(&self, city: &str) -> AppResult<Vec<Reading>>;

    async fn count_for_sensor(&self, sensor_id: i64) -> AppResult<i64>;
}

/// Storage of reports and their lifecycle transitions
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist a new IN_PROGRESS report.
    ///
    /// Fails with a validation error, without writing anything, when the
    /// researcher already owns an IN_PROGRESS or DONE report with that name.
    async fn insert(&self, report: NewReport) -> AppResult<Report>;

    async fn get(&self, id: Uuid) -> AppResult<Option<Report>>;

    /// IN_PROGRESS -> DONE. Returns false when the report had already left
    /// IN_PROGRESS, in which case nothing is written.
    async fn complete(&self, id: Uuid, content: String, record_count: i64) -> AppResult<bool>;

    /// IN_PROGRESS -> ERROR, same conditional semantics as `complete`
    async fn fail(&self, id: Uuid) -> AppResult<bool>;

    /// Newest first
    async fn list_for_researcher(&self, researcher_id: i64) -> AppResult<Vec<Report>>;

    async fn researcher_totals(&self, researcher_id: i64) -> AppResult<ResearcherReportTotals>;
}

pub(crate) fn duplicate_name_error(name: &str) -> crate::error::AppError {
    crate::error::AppError::Validation {
        field: "name".to_string(),
        message: format!("A report named '{}' already exists", name),
        message_fr: format!("Un rapport nommé '{}' existe déjà", name),
    }
}
