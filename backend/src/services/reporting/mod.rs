//! Report generation service
//!
//! A report is created IN_PROGRESS and leaves that state exactly once, to
//! DONE with rendered content or to ERROR without content. Transitions are
//! conditional in the store, so a second concurrent generation is a no-op.

pub mod csv;
pub mod json;
pub mod statistics;
pub mod text;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    validate_report_period, CreateReportInput, NewReport, Reading, Report, ReportFormat,
    ReportStatus, ResearcherReportTotals,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::ReportsConfig;
use crate::error::{AppError, AppResult};
use crate::stores::{ReadingStore, ReportStore, SensorRegistry};

pub use statistics::ReadingStatistics;

/// Everything a renderer needs, fixed for one generation attempt
pub struct RenderContext<'a> {
    pub report: &'a Report,
    pub readings: &'a [Reading],
    pub stats: &'a ReadingStatistics,
    pub sensor_names: &'a HashMap<i64, String>,
    pub generated_at: DateTime<Utc>,
}

impl RenderContext<'_> {
    pub fn sensor_name(&self, sensor_id: i64) -> Option<&str> {
        self.sensor_names.get(&sensor_id).map(String::as_str)
    }
}

/// Downloadable report body
#[derive(Debug, Clone)]
pub struct ReportDownload {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Report service
#[derive(Clone)]
pub struct ReportService {
    reports: Arc<dyn ReportStore>,
    readings: Arc<dyn ReadingStore>,
    sensors: Arc<dyn SensorRegistry>,
    config: ReportsConfig,
}

impl ReportService {
    /// Create a new ReportService
    pub fn new(
        reports: Arc<dyn ReportStore>,
        readings: Arc<dyn ReadingStore>,
        sensors: Arc<dyn SensorRegistry>,
        config: ReportsConfig,
    ) -> Self {
        Self {
            reports,
            readings,
            sensors,
            config,
        }
    }

    /// Validate and persist a report, then generate it.
    ///
    /// Once validation passes this returns the report even when generation
    /// fails; the failure is recorded as the ERROR status. In background mode
    /// the report is returned IN_PROGRESS and generated on a separate task.
    #[instrument(name = "create_report", skip(self, input), fields(name = %input.name, researcher_id = input.researcher_id))]
    pub async fn create_report(&self, input: CreateReportInput) -> AppResult<Report> {
        input.validate()?;
        if input.name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Report name cannot be blank".to_string(),
                message_fr: "Le nom du rapport ne peut pas être vide".to_string(),
            });
        }
        validate_report_period(input.period_start, input.period_end, Utc::now().naive_utc())?;

        let report = self.reports.insert(NewReport::from(input)).await?;
        info!(report_id = %report.id, "Report created");

        if self.config.generate_in_background {
            let service = self.clone();
            let report_id = report.id;
            tokio::spawn(async move {
                if let Err(e) = service.generate(report_id).await {
                    error!(report_id = %report_id, error = %e, "Background generation failed");
                }
            });
            return Ok(report);
        }

        match self.generate(report.id).await {
            Ok(generated) => Ok(generated),
            Err(e) => {
                warn!(report_id = %report.id, error = %e, "Generation did not complete");
                Ok(self.get(report.id).await.unwrap_or(report))
            }
        }
    }

    /// Run the single generation attempt of an IN_PROGRESS report
    #[instrument(name = "generate_report", skip(self))]
    pub async fn generate(&self, report_id: Uuid) -> AppResult<Report> {
        let report = self.get(report_id).await?;
        if report.status.is_terminal() {
            return Err(AppError::InvalidStateTransition(format!(
                "Report {} is already {}",
                report_id,
                report.status.as_str()
            )));
        }

        match self.render(&report).await {
            Ok((content, record_count)) => {
                let size = content.len();
                if !self.reports.complete(report_id, content, record_count).await? {
                    return Err(AppError::InvalidStateTransition(format!(
                        "Report {} left IN_PROGRESS during generation",
                        report_id
                    )));
                }
                info!(record_count, size, "Report generated");
            }
            Err(e) => {
                error!(error = %e, "Report generation failed");
                if !self.reports.fail(report_id).await? {
                    warn!("Report left IN_PROGRESS before the failure was recorded");
                }
            }
        }

        self.get(report_id).await
    }

    async fn render(&self, report: &Report) -> AppResult<(String, i64)> {
        let readings = self
            .readings
            .find_between(report.period_start.and_utc(), report.period_end.and_utc())
            .await?;

        let sensor_names: HashMap<i64, String> = self
            .sensors
            .list_all()
            .await?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();

        let stats = ReadingStatistics::compute(&readings);
        let ctx = RenderContext {
            report,
            readings: &readings,
            stats: &stats,
            sensor_names: &sensor_names,
            generated_at: Utc::now(),
        };

        let content = match report.format {
            ReportFormat::Csv => csv::render(&readings, &sensor_names)?,
            ReportFormat::Json => json::render(&ctx, self.config.json_sample_limit)?,
            ReportFormat::Pdf => text::render(&ctx, self.config.text_sample_limit)?,
        };

        Ok((content, readings.len() as i64))
    }

    /// Content of a DONE report
    pub async fn download(&self, report_id: Uuid) -> AppResult<ReportDownload> {
        let report = self.get(report_id).await?;
        if report.status != ReportStatus::Done {
            return Err(AppError::ReportNotReady);
        }
        let content = report.content.clone().ok_or(AppError::ReportNotReady)?;

        Ok(ReportDownload {
            file_name: report.file_name(),
            content_type: report.format.content_type(),
            bytes: content.into_bytes(),
        })
    }

    pub async fn get(&self, report_id: Uuid) -> AppResult<Report> {
        self.reports
            .get(report_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Report {}", report_id)))
    }

    pub async fn list_for_researcher(&self, researcher_id: i64) -> AppResult<Vec<Report>> {
        self.reports.list_for_researcher(researcher_id).await
    }

    pub async fn researcher_statistics(&self, researcher_id: i64) -> AppResult<ResearcherReportTotals> {
        self.reports.researcher_totals(researcher_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use shared::{GeoLocation, Measurements, ReadingStatus, ReportType};

    fn report(report_type: ReportType, format: ReportFormat) -> Report {
        let start = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Report {
            id: Uuid::new_v4(),
            name: "June".to_string(),
            description: Some("Monthly summary".to_string()),
            period_start: start,
            period_end: start + chrono::Duration::days(30),
            report_type,
            format,
            status: ReportStatus::InProgress,
            content: None,
            content_size: 0,
            record_count: 0,
            researcher_id: 7,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    fn reading(id: i64, city: &str, temp: f64, pm10: f64) -> Reading {
        Reading {
            id,
            sensor_id: 1 + id % 2,
            location: GeoLocation {
                city: Some(city.to_string()),
                ..Default::default()
            },
            local_time: None,
            measurements: Measurements {
                temperature_c: Some(temp),
                pm10: Some(pm10),
                humidity: Some(55.0),
                ..Default::default()
            },
            collected_at: Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap()
                + chrono::Duration::hours(id),
            status: ReadingStatus::Valid,
            source_api: "WeatherAPI".to_string(),
        }
    }

    fn render_with(
        report: &Report,
        readings: &[Reading],
        render: impl Fn(&RenderContext<'_>) -> AppResult<String>,
    ) -> String {
        let stats = ReadingStatistics::compute(readings);
        let names = HashMap::from([(1, "Vieux-Lille".to_string()), (2, "Fourvière".to_string())]);
        let ctx = RenderContext {
            report,
            readings,
            stats: &stats,
            sensor_names: &names,
            generated_at: Utc::now(),
        };
        render(&ctx).unwrap()
    }

    #[test]
    fn test_json_statistics_are_rounded() {
        let r = report(ReportType::Global, ReportFormat::Json);
        let readings = vec![
            reading(1, "Lyon", 20.0, 10.0),
            reading(2, "Lyon", 21.0, 20.0),
            reading(3, "Lille", 21.0, 30.0),
        ];
        let body = render_with(&r, &readings, |ctx| json::render(ctx, 1000));
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(value["detailed_statistics"]["temperature"]["moyenne"], 20.67);
        assert_eq!(value["detailed_statistics"]["pollution"]["pm10_moyenne"], 20.0);
        assert_eq!(value["general_statistics"]["distinct_cities"], 2);
        assert_eq!(value["data_sample"].as_array().unwrap().len(), 3);
        assert!(value.get("note").is_none());
    }

    #[test]
    fn test_json_sample_is_capped_with_note() {
        let r = report(ReportType::Temperature, ReportFormat::Json);
        let readings: Vec<Reading> = (0..5).map(|i| reading(i, "Nice", 25.0, 12.0)).collect();
        let body = render_with(&r, &readings, |ctx| json::render(ctx, 2));
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(value["data_sample"].as_array().unwrap().len(), 2);
        assert_eq!(value["general_statistics"]["total_records"], 5);
        assert!(value["note"].as_str().unwrap().contains("first 2 of 5"));
    }

    #[test]
    fn test_text_empty_period_has_notice() {
        let r = report(ReportType::Temperature, ReportFormat::Pdf);
        let body = render_with(&r, &[], |ctx| text::render(ctx, 15));

        assert!(body.contains(text::NO_DATA_NOTICE));
        assert!(body.contains("Total records: 0"));
        assert!(!body.contains("TEMPERATURE ANALYSIS"));
    }

    #[test]
    fn test_text_pollution_section_reports_band() {
        let r = report(ReportType::Pollution, ReportFormat::Pdf);
        let readings = vec![reading(1, "Paris", 15.0, 40.0), reading(2, "Paris", 16.0, 50.0)];
        let body = render_with(&r, &readings, |ctx| text::render(ctx, 15));

        assert!(body.contains("POLLUTION ANALYSIS"));
        assert!(body.contains("Mean PM10: 45.00"));
        assert!(body.contains("Air quality: Degraded"));
        assert!(body.contains("DATA SAMPLE"));
    }

    #[test]
    fn test_text_basic_overview_counts_by_sensor() {
        let r = report(ReportType::Noise, ReportFormat::Pdf);
        let readings: Vec<Reading> = (1..=3).map(|i| reading(i, "Lille", 9.0, 14.0)).collect();
        let body = render_with(&r, &readings, |ctx| text::render(ctx, 15));

        assert!(body.contains("DATA OVERVIEW"));
        assert!(body.contains("WeatherAPI: 3"));
        assert!(body.contains("Fourvière (#2): 2"));
        assert!(body.contains("Vieux-Lille (#1): 1"));
    }

    #[test]
    fn test_text_global_includes_every_section() {
        let r = report(ReportType::Global, ReportFormat::Pdf);
        let readings = vec![reading(1, "Lyon", 18.0, 22.0)];
        let body = render_with(&r, &readings, |ctx| text::render(ctx, 15));

        for section in ["TEMPERATURE ANALYSIS", "POLLUTION ANALYSIS", "WEATHER CONDITIONS", "CITY SYNTHESIS"] {
            assert!(body.contains(section), "missing {}", section);
        }
        assert!(body.trim_end().ends_with(&"=".repeat(64)));
    }
}
