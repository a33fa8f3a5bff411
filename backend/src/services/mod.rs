//! Business logic services for the Smart City Telemetry platform

pub mod collector;
pub mod ingestion;
pub mod reporting;
pub mod scheduler;

pub use collector::{CollectionReceipt, CollectorService, SweepFailure, SweepSummary};
pub use ingestion::{ConsumerHandle, IngestOutcome, IngestionConsumer, IngestionProcessor};
pub use reporting::{ReportDownload, ReportService};
pub use scheduler::{CollectionScheduler, SchedulerHandle};
