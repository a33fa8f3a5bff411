//! Report lifecycle tests
//!
//! Creation, validation, generation per format, download and researcher
//! statistics, over in-memory stores.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use shared::{
    CreateReportInput, NewReport, Report, ReportFormat, ReportStatus, ReportType,
    ResearcherReportTotals, SensorStatus,
};
use smart_city_telemetry_backend::config::ReportsConfig;
use smart_city_telemetry_backend::error::{AppError, AppResult};
use smart_city_telemetry_backend::services::ReportService;
use smart_city_telemetry_backend::stores::{
    MemoryReadingStore, MemoryReportStore, ReadingStore, ReportStore,
};
use uuid::Uuid;

use common::*;

fn june_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn input(name: &str, report_type: ReportType, format: ReportFormat) -> CreateReportInput {
    CreateReportInput {
        name: name.to_string(),
        description: Some("June analysis".to_string()),
        period_start: june_start(),
        period_end: june_start() + Duration::days(29),
        report_type,
        format,
        researcher_id: 12,
    }
}

struct Fixture {
    service: ReportService,
    reports: Arc<MemoryReportStore>,
}

async fn june_readings() -> Arc<MemoryReadingStore> {
    let readings = Arc::new(MemoryReadingStore::new());
    let base = Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap();
    readings.insert(new_reading(1, "Lyon", base, 18.0)).await.unwrap();
    readings
        .insert(new_reading(2, "Lille", base + Duration::hours(1), 24.0))
        .await
        .unwrap();
    readings
        .insert(new_reading(1, "Lyon", base + Duration::hours(2), 21.0))
        .await
        .unwrap();
    // Outside the period
    readings
        .insert(new_reading(1, "Lyon", Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap(), 30.0))
        .await
        .unwrap();
    readings
}

async fn fixture() -> Fixture {
    let reports = Arc::new(MemoryReportStore::new());
    let service = ReportService::new(
        reports.clone(),
        june_readings().await,
        registry(vec![sensor(1, SensorStatus::Active), sensor(2, SensorStatus::Active)]),
        ReportsConfig::default(),
    );
    Fixture { service, reports }
}

// ============================================================================
// Creation and validation
// ============================================================================

#[tokio::test]
async fn test_create_generates_csv_report() {
    let fx = fixture().await;

    let report = fx
        .service
        .create_report(input("Juin CSV", ReportType::Temperature, ReportFormat::Csv))
        .await
        .unwrap();

    assert_eq!(report.status, ReportStatus::Done);
    assert_eq!(report.record_count, 3);
    assert!(report.completed_at.is_some());

    let content = report.content.as_deref().unwrap();
    assert_eq!(report.content_size, content.len() as i64);
    // Header plus one line per reading
    assert_eq!(content.lines().count(), 4);
    assert!(content.lines().nth(1).unwrap().contains("Lyon"));
}

#[tokio::test]
async fn test_create_generates_json_report() {
    let fx = fixture().await;

    let report = fx
        .service
        .create_report(input("Juin JSON", ReportType::Global, ReportFormat::Json))
        .await
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(report.content.as_deref().unwrap()).unwrap();
    assert_eq!(value["detailed_statistics"]["temperature"]["moyenne"], 21.0);
    assert_eq!(value["detailed_statistics"]["temperature"]["min"], 18.0);
    assert_eq!(value["detailed_statistics"]["temperature"]["max"], 24.0);
    assert_eq!(value["data_sample"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_create_generates_text_report_for_empty_period() {
    let fx = fixture().await;
    let mut request = input("Vide", ReportType::Pollution, ReportFormat::Pdf);
    request.period_start = june_start() - Duration::days(60);
    request.period_end = june_start() - Duration::days(31);

    let report = fx.service.create_report(request).await.unwrap();

    assert_eq!(report.status, ReportStatus::Done);
    assert_eq!(report.record_count, 0);
    assert!(report
        .content
        .as_deref()
        .unwrap()
        .contains("No data available for the selected period."));
}

#[tokio::test]
async fn test_blank_name_is_rejected_without_persisting() {
    let fx = fixture().await;

    let err = fx
        .service
        .create_report(input("   ", ReportType::Global, ReportFormat::Csv))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "name"));
    assert_eq!(fx.reports.count().await, 0);
}

#[tokio::test]
async fn test_invalid_periods_are_rejected() {
    let fx = fixture().await;

    let mut reversed = input("Inverse", ReportType::Global, ReportFormat::Csv);
    reversed.period_end = reversed.period_start;
    assert!(fx.service.create_report(reversed).await.is_err());

    let mut too_long = input("Trop long", ReportType::Global, ReportFormat::Csv);
    too_long.period_end = too_long.period_start + Duration::days(366);
    assert!(fx.service.create_report(too_long).await.is_err());

    let mut future = input("Futur", ReportType::Global, ReportFormat::Csv);
    future.period_start = Utc::now().naive_utc() - Duration::days(1);
    future.period_end = Utc::now().naive_utc() + Duration::days(1);
    assert!(fx.service.create_report(future).await.is_err());

    assert_eq!(fx.reports.count().await, 0);
}

#[tokio::test]
async fn test_duplicate_name_is_rejected_per_researcher() {
    let fx = fixture().await;
    fx.service
        .create_report(input("Mensuel", ReportType::Global, ReportFormat::Csv))
        .await
        .unwrap();

    let err = fx
        .service
        .create_report(input("Mensuel", ReportType::Temperature, ReportFormat::Json))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "name"));

    let mut other_researcher = input("Mensuel", ReportType::Global, ReportFormat::Csv);
    other_researcher.researcher_id = 13;
    assert!(fx.service.create_report(other_researcher).await.is_ok());
    assert_eq!(fx.reports.count().await, 2);
}

#[tokio::test]
async fn test_failed_generation_marks_error_and_frees_the_name() {
    let reports = Arc::new(MemoryReportStore::new());
    let service = ReportService::new(
        reports.clone(),
        Arc::new(UnreadableReadingStore),
        registry(vec![]),
        ReportsConfig::default(),
    );

    let failed = service
        .create_report(input("Fragile", ReportType::Global, ReportFormat::Csv))
        .await
        .unwrap();
    assert_eq!(failed.status, ReportStatus::Error);
    assert!(failed.content.is_none());
    assert!(failed.completed_at.is_some());

    // An ERROR report does not hold its name
    let retry = service
        .create_report(input("Fragile", ReportType::Global, ReportFormat::Csv))
        .await
        .unwrap();
    assert_eq!(retry.status, ReportStatus::Error);
    assert_eq!(reports.count().await, 2);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_generate_twice_is_rejected() {
    let fx = fixture().await;
    let report = fx
        .service
        .create_report(input("Once", ReportType::Global, ReportFormat::Csv))
        .await
        .unwrap();

    let err = fx.service.generate(report.id).await.unwrap_err();

    assert!(matches!(err, AppError::InvalidStateTransition(_)));
}

/// Report store counting the transitions that actually wrote content
struct CountingReportStore {
    inner: MemoryReportStore,
    completed: AtomicUsize,
}

#[async_trait]
impl ReportStore for CountingReportStore {
    async fn insert(&self, report: NewReport) -> AppResult<Report> {
        self.inner.insert(report).await
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Report>> {
        self.inner.get(id).await
    }

    async fn complete(&self, id: Uuid, content: String, record_count: i64) -> AppResult<bool> {
        let written = self.inner.complete(id, content, record_count).await?;
        if written {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(written)
    }

    async fn fail(&self, id: Uuid) -> AppResult<bool> {
        self.inner.fail(id).await
    }

    async fn list_for_researcher(&self, researcher_id: i64) -> AppResult<Vec<Report>> {
        self.inner.list_for_researcher(researcher_id).await
    }

    async fn researcher_totals(&self, researcher_id: i64) -> AppResult<ResearcherReportTotals> {
        self.inner.researcher_totals(researcher_id).await
    }
}

#[tokio::test]
async fn test_concurrent_generation_completes_once() {
    let reports = Arc::new(CountingReportStore {
        inner: MemoryReportStore::new(),
        completed: AtomicUsize::new(0),
    });
    let service = ReportService::new(
        reports.clone(),
        june_readings().await,
        registry(vec![sensor(1, SensorStatus::Active), sensor(2, SensorStatus::Active)]),
        ReportsConfig::default(),
    );
    let pending = reports
        .insert(NewReport::from(input("Concurrent", ReportType::Global, ReportFormat::Csv)))
        .await
        .unwrap();

    let (first, second) = tokio::join!(service.generate(pending.id), service.generate(pending.id));

    let (done, rejected) = match (first, second) {
        (Ok(done), Err(rejected)) | (Err(rejected), Ok(done)) => (done, rejected),
        other => panic!("expected exactly one success, got {:?}", other),
    };
    assert_eq!(done.status, ReportStatus::Done);
    assert!(matches!(rejected, AppError::InvalidStateTransition(_)));
    assert_eq!(reports.completed.load(Ordering::SeqCst), 1);

    let stored = service.get(pending.id).await.unwrap();
    assert_eq!(stored.status, ReportStatus::Done);
    assert_eq!(stored.record_count, 3);
    assert_eq!(stored.content, done.content);
}

#[tokio::test]
async fn test_store_transitions_leave_in_progress_once() {
    let reports = MemoryReportStore::new();
    let failed = reports
        .insert(NewReport::from(input("Failed", ReportType::Global, ReportFormat::Csv)))
        .await
        .unwrap();

    assert!(reports.fail(failed.id).await.unwrap());
    assert!(!reports.complete(failed.id, "late".to_string(), 1).await.unwrap());
    assert!(!reports.fail(failed.id).await.unwrap());

    let stored = reports.get(failed.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReportStatus::Error);
    assert!(stored.content.is_none());

    let done = reports
        .insert(NewReport::from(input("Done", ReportType::Global, ReportFormat::Csv)))
        .await
        .unwrap();
    assert!(reports.complete(done.id, "a,b".to_string(), 1).await.unwrap());
    assert!(!reports.fail(done.id).await.unwrap());
    assert_eq!(
        reports.get(done.id).await.unwrap().unwrap().content.as_deref(),
        Some("a,b")
    );
}

#[tokio::test]
async fn test_download_requires_done() {
    let fx = fixture().await;
    let pending = fx
        .reports
        .insert(NewReport::from(input("Pending", ReportType::Global, ReportFormat::Json)))
        .await
        .unwrap();

    let err = fx.service.download(pending.id).await.unwrap_err();
    assert!(matches!(err, AppError::ReportNotReady));

    fx.service.generate(pending.id).await.unwrap();
    let download = fx.service.download(pending.id).await.unwrap();
    assert_eq!(download.file_name, "Pending.json");
    assert_eq!(download.content_type, "application/json");
    assert!(!download.bytes.is_empty());
}

#[tokio::test]
async fn test_pdf_download_is_plain_text_attachment() {
    let fx = fixture().await;
    let report = fx
        .service
        .create_report(input("Rapport été", ReportType::Temperature, ReportFormat::Pdf))
        .await
        .unwrap();

    let download = fx.service.download(report.id).await.unwrap();

    assert_eq!(download.file_name, "Rapport__t_.txt");
    assert_eq!(download.content_type, "application/octet-stream");
    let text = String::from_utf8(download.bytes).unwrap();
    assert!(text.contains("TEMPERATURE ANALYSIS"));
    assert!(text.contains("END OF REPORT"));
}

#[tokio::test]
async fn test_unknown_report_is_not_found() {
    let fx = fixture().await;
    let err = fx.service.get(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_background_generation_completes() {
    let readings = Arc::new(MemoryReadingStore::new());
    let service = ReportService::new(
        Arc::new(MemoryReportStore::new()),
        readings,
        registry(vec![]),
        ReportsConfig {
            generate_in_background: true,
            ..ReportsConfig::default()
        },
    );

    let report = service
        .create_report(input("Async", ReportType::Global, ReportFormat::Csv))
        .await
        .unwrap();
    assert_eq!(report.status, ReportStatus::InProgress);

    let id = report.id;
    let watched = service.clone();
    assert!(
        eventually(std::time::Duration::from_secs(5), || {
            let watched = watched.clone();
            async move {
                watched
                    .get(id)
                    .await
                    .map(|r| r.status == ReportStatus::Done)
                    .unwrap_or(false)
            }
        })
        .await
    );
}

// ============================================================================
// Researcher views
// ============================================================================

#[tokio::test]
async fn test_researcher_listing_and_totals() {
    let fx = fixture().await;
    let first = fx
        .service
        .create_report(input("A", ReportType::Global, ReportFormat::Csv))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = fx
        .service
        .create_report(input("B", ReportType::Global, ReportFormat::Json))
        .await
        .unwrap();

    let listed = fx.service.list_for_researcher(12).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);

    let totals = fx.service.researcher_statistics(12).await.unwrap();
    assert_eq!(totals.report_count, 2);
    assert_eq!(totals.total_content_size, first.content_size + second.content_size);
    assert_eq!(
        totals.formatted_total_size,
        shared::format_byte_size(totals.total_content_size)
    );

    let empty = fx.service.researcher_statistics(404).await.unwrap();
    assert_eq!(empty.report_count, 0);
    assert_eq!(empty.total_content_size, 0);
    assert_eq!(empty.formatted_total_size, "0 B");
}
