//! Report HTTP handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use shared::{CreateReportInput, ReportSummary};
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

/// Unreadable bodies, unknown enum values and bad dates included, are
/// reported as validation errors
fn body_rejected(rejection: JsonRejection) -> AppError {
    AppError::Validation {
        field: "body".to_string(),
        message: rejection.body_text(),
        message_fr: "Le corps de la requête est invalide".to_string(),
    }
}

/// Create a report and run its generation
pub async fn create_report(
    State(state): State<AppState>,
    payload: Result<Json<CreateReportInput>, JsonRejection>,
) -> impl IntoResponse {
    let input = match payload {
        Ok(Json(input)) => input,
        Err(rejection) => return body_rejected(rejection).into_response(),
    };

    match state.reports.create_report(input).await {
        Ok(report) => (StatusCode::CREATED, Json(ReportSummary::from(&report))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Get a report summary
pub async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.reports.get(report_id).await {
        Ok(report) => (StatusCode::OK, Json(ReportSummary::from(&report))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Generate a report still IN_PROGRESS
pub async fn generate_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.reports.generate(report_id).await {
        Ok(report) => (StatusCode::OK, Json(ReportSummary::from(&report))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Download the rendered content of a DONE report
pub async fn download_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.reports.download(report_id).await {
        Ok(download) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, download.content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", download.file_name),
                ),
            ],
            download.bytes,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// List a researcher's reports, newest first
pub async fn list_researcher_reports(
    State(state): State<AppState>,
    Path(researcher_id): Path<i64>,
) -> impl IntoResponse {
    match state.reports.list_for_researcher(researcher_id).await {
        Ok(reports) => {
            let reports: Vec<ReportSummary> = reports.iter().map(ReportSummary::from).collect();
            (StatusCode::OK, Json(serde_json::json!({ "reports": reports }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Report count and total size for a researcher
pub async fn researcher_report_statistics(
    State(state): State<AppState>,
    Path(researcher_id): Path<i64>,
) -> impl IntoResponse {
    match state.reports.researcher_statistics(researcher_id).await {
        Ok(totals) => (StatusCode::OK, Json(totals)).into_response(),
        Err(e) => e.into_response(),
    }
}
