//! In-memory store implementations

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    NewReading, NewReport, Reading, Report, ReportStatus, ResearcherReportTotals, Sensor,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{duplicate_name_error, ReadingStore, ReportStore, SensorRegistry};
use crate::error::AppResult;

/// Sensor registry held in memory
#[derive(Default)]
pub struct MemorySensorRegistry {
    sensors: RwLock<HashMap<i64, Sensor>>,
}

impl MemorySensorRegistry {
    pub fn new(sensors: impl IntoIterator<Item = Sensor>) -> Self {
        Self {
            sensors: RwLock::new(sensors.into_iter().map(|s| (s.id, s)).collect()),
        }
    }
}

#[async_trait]
impl SensorRegistry for MemorySensorRegistry {
    async fn find(&self, id: i64) -> AppResult<Option<Sensor>> {
        Ok(self.sensors.read().await.get(&id).cloned())
    }

    async fn list_active(&self) -> AppResult<Vec<Sensor>> {
        let mut active: Vec<Sensor> = self
            .sensors
            .read()
            .await
            .values()
            .filter(|s| s.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|s| s.id);
        Ok(active)
    }

    async fn list_all(&self) -> AppResult<Vec<Sensor>> {
        let mut all: Vec<Sensor> = self.sensors.read().await.values().cloned().collect();
        all.sort_by_key(|s| s.id);
        Ok(all)
    }
}

/// Append-only reading log held in memory
#[derive(Default)]
pub struct MemoryReadingStore {
    readings: RwLock<Vec<Reading>>,
    next_id: AtomicI64,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Reading> {
        self.readings.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.readings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.readings.read().await.is_empty()
    }
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn insert(&self, reading: NewReading) -> AppResult<Reading> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let reading = reading.into_reading(id);
        self.readings.write().await.push(reading.clone());
        Ok(reading)
    }

    async fn find_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Vec<Reading>> {
        let mut found: Vec<Reading> = self
            .readings
            .read()
            .await
            .iter()
            .filter(|r| r.collected_at >= start && r.collected_at <= end)
            .cloned()
            .collect();
        found.sort_by_key(|r| (r.collected_at, r.id));
        Ok(found)
    }

    async fn find_by_sensor_between(
        &self,
        sensor_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Reading>> {
        let mut found: Vec<Reading> = self
            .readings
            .read()
            .await
            .iter()
            .filter(|r| r.sensor_id == sensor_id)
            .filter(|r| r.collected_at >= start && r.collected_at <= end)
            .cloned()
            .collect();
        found.sort_by_key(|r| std::cmp::Reverse((r.collected_at, r.id)));
        Ok(found)
    }

    async fn latest_for_sensor(&self, sensor_id: i64, limit: i64) -> AppResult<Vec<Reading>> {
        let mut found: Vec<Reading> = self
            .readings
            .read()
            .await
            .iter()
            .filter(|r| r.sensor_id == sensor_id)
            .cloned()
            .collect();
        found.sort_by_key(|r| std::cmp::Reverse((r.collected_at, r.id)));
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Reading>> {
        Ok(self.readings.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn find_since(&self, since: DateTime<Utc>) -> AppResult<Vec<Reading>> {
        let mut found: Vec<Reading> = self
            .readings
            .read()
            .await
            .iter()
            .filter(|r| r.collected_at >= since)
            .cloned()
            .collect();
        found.sort_by_key(|r| std::cmp::Reverse((r.collected_at, r.id)));
        Ok(found)
    }

    async fn find_by_city(&self, city: &str) -> AppResult<Vec<Reading>> {
        let mut found: Vec<Reading> = self
            .readings
            .read()
            .await
            .iter()
            .filter(|r| r.location.city.as_deref() == Some(city))
            .cloned()
            .collect();
        found.sort_by_key(|r| std::cmp::Reverse((r.collected_at, r.id)));
        Ok(found)
    }

    async fn count_for_sensor(&self, sensor_id: i64) -> AppResult<i64> {
        let readings = self.readings.read().await;
        Ok(readings.iter().filter(|r| r.sensor_id == sensor_id).count() as i64)
    }
}

/// Report table held in memory
#[derive(Default)]
pub struct MemoryReportStore {
    reports: RwLock<HashMap<Uuid, Report>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.reports.read().await.len()
    }

    async fn transition(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut Report),
    ) -> AppResult<bool> {
        let mut reports = self.reports.write().await;
        match reports.get_mut(&id) {
            Some(report) if report.status == ReportStatus::InProgress => {
                apply(report);
                report.completed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn insert(&self, report: NewReport) -> AppResult<Report> {
        let mut reports = self.reports.write().await;

        let duplicate = reports.values().any(|r| {
            r.researcher_id == report.researcher_id
                && r.name == report.name
                && r.status != ReportStatus::Error
        });
        if duplicate {
            return Err(duplicate_name_error(&report.name));
        }

        let created = Report {
            id: Uuid::new_v4(),
            name: report.name,
            description: report.description,
            period_start: report.period_start,
            period_end: report.period_end,
            report_type: report.report_type,
            format: report.format,
            status: ReportStatus::InProgress,
            content: None,
            content_size: 0,
            record_count: 0,
            researcher_id: report.researcher_id,
            created_at: Utc::now(),
            completed_at: None,
        };
        reports.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Report>> {
        Ok(self.reports.read().await.get(&id).cloned())
    }

    async fn complete(&self, id: Uuid, content: String, record_count: i64) -> AppResult<bool> {
        self.transition(id, |report| {
            report.status = ReportStatus::Done;
            report.content_size = content.len() as i64;
            report.content = Some(content);
            report.record_count = record_count;
        })
        .await
    }

    async fn fail(&self, id: Uuid) -> AppResult<bool> {
        self.transition(id, |report| {
            report.status = ReportStatus::Error;
            report.content = None;
            report.content_size = 0;
        })
        .await
    }

    async fn list_for_researcher(&self, researcher_id: i64) -> AppResult<Vec<Report>> {
        let mut found: Vec<Report> = self
            .reports
            .read()
            .await
            .values()
            .filter(|r| r.researcher_id == researcher_id)
            .cloned()
            .collect();
        found.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        Ok(found)
    }

    async fn researcher_totals(&self, researcher_id: i64) -> AppResult<ResearcherReportTotals> {
        let reports = self.reports.read().await;
        let (count, size) = reports
            .values()
            .filter(|r| r.researcher_id == researcher_id)
            .fold((0i64, 0i64), |(count, size), r| (count + 1, size + r.content_size));

        Ok(ResearcherReportTotals::new(researcher_id, count, size))
    }
}
