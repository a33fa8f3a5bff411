//! Manual collection HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::AppState;

/// Collect one sensor now and publish the reading
pub async fn trigger_collection(
    State(state): State<AppState>,
    Path(sensor_id): Path<i64>,
) -> impl IntoResponse {
    match state.collector.collect_one(sensor_id).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "published",
                "message": format!("Data collected for sensor {}", sensor_id),
                "receipt": receipt,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
