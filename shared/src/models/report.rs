//! Analysis report models

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::types::format_byte_size;

/// Length of the content preview exposed in summaries
pub const CONTENT_PREVIEW_CHARS: usize = 200;

/// Kind of analysis a report performs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType {
    Temperature,
    Pollution,
    Traffic,
    Noise,
    Light,
    Global,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Temperature => "TEMPERATURE",
            ReportType::Pollution => "POLLUTION",
            ReportType::Traffic => "TRAFFIC",
            ReportType::Noise => "NOISE",
            ReportType::Light => "LIGHT",
            ReportType::Global => "GLOBAL",
        }
    }
}

impl std::str::FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TEMPERATURE" => Ok(ReportType::Temperature),
            "POLLUTION" => Ok(ReportType::Pollution),
            "TRAFFIC" => Ok(ReportType::Traffic),
            "NOISE" => Ok(ReportType::Noise),
            "LIGHT" => Ok(ReportType::Light),
            "GLOBAL" => Ok(ReportType::Global),
            other => Err(format!("unknown report type: {}", other)),
        }
    }
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format. `Pdf` is rendered as plain text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportFormat {
    Pdf,
    Csv,
    Json,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "PDF",
            ReportFormat::Csv => "CSV",
            ReportFormat::Json => "JSON",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "txt",
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/octet-stream",
            ReportFormat::Csv => "text/csv",
            ReportFormat::Json => "application/json",
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PDF" => Ok(ReportFormat::Pdf),
            "CSV" => Ok(ReportFormat::Csv),
            "JSON" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format: {}", other)),
        }
    }
}

/// Generation lifecycle. `Done` and `Error` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    InProgress,
    Done,
    Error,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::InProgress => "IN_PROGRESS",
            ReportStatus::Done => "DONE",
            ReportStatus::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReportStatus::InProgress)
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IN_PROGRESS" => Ok(ReportStatus::InProgress),
            "DONE" => Ok(ReportStatus::Done),
            "ERROR" => Ok(ReportStatus::Error),
            other => Err(format!("unknown report status: {}", other)),
        }
    }
}

/// A researcher-owned analysis report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    pub report_type: ReportType,
    pub format: ReportFormat,
    pub status: ReportStatus,
    /// Rendered body, set only once the report is `Done`
    pub content: Option<String>,
    pub content_size: i64,
    pub record_count: i64,
    pub researcher_id: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Report {
    pub fn can_download(&self) -> bool {
        self.status == ReportStatus::Done && self.content.is_some()
    }

    /// Download file name with every character outside `[A-Za-z0-9.-]`
    /// replaced by `_`
    pub fn file_name(&self) -> String {
        format!(
            "{}.{}",
            crate::validation::sanitize_filename(&self.name),
            self.format.extension()
        )
    }
}

/// Report creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateReportInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    pub report_type: ReportType,
    pub format: ReportFormat,
    pub researcher_id: i64,
}

/// A report row that has not been persisted yet
#[derive(Debug, Clone)]
pub struct NewReport {
    pub name: String,
    pub description: Option<String>,
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    pub report_type: ReportType,
    pub format: ReportFormat,
    pub researcher_id: i64,
}

impl From<CreateReportInput> for NewReport {
    fn from(input: CreateReportInput) -> Self {
        Self {
            name: input.name.trim().to_string(),
            description: input.description,
            period_start: input.period_start,
            period_end: input.period_end,
            report_type: input.report_type,
            format: input.format,
            researcher_id: input.researcher_id,
        }
    }
}

/// Report view returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    pub report_type: ReportType,
    pub format: ReportFormat,
    pub status: ReportStatus,
    pub record_count: i64,
    pub content_size: i64,
    pub formatted_size: String,
    pub can_download: bool,
    pub file_name: String,
    pub content_preview: Option<String>,
    pub researcher_id: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Report> for ReportSummary {
    fn from(report: &Report) -> Self {
        let content_preview = report.content.as_ref().map(|content| {
            if content.chars().count() > CONTENT_PREVIEW_CHARS {
                let preview: String = content.chars().take(CONTENT_PREVIEW_CHARS).collect();
                format!("{}...", preview)
            } else {
                content.clone()
            }
        });

        Self {
            id: report.id,
            name: report.name.clone(),
            description: report.description.clone(),
            period_start: report.period_start,
            period_end: report.period_end,
            report_type: report.report_type,
            format: report.format,
            status: report.status,
            record_count: report.record_count,
            content_size: report.content_size,
            formatted_size: format_byte_size(report.content_size),
            can_download: report.can_download(),
            file_name: report.file_name(),
            content_preview,
            researcher_id: report.researcher_id,
            created_at: report.created_at,
            completed_at: report.completed_at,
        }
    }
}

/// Aggregate figures over a researcher's reports
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResearcherReportTotals {
    pub researcher_id: i64,
    pub report_count: i64,
    pub total_content_size: i64,
    pub formatted_total_size: String,
}

impl ResearcherReportTotals {
    pub fn new(researcher_id: i64, report_count: i64, total_content_size: i64) -> Self {
        Self {
            researcher_id,
            report_count,
            total_content_size,
            formatted_total_size: format_byte_size(total_content_size),
        }
    }
}
