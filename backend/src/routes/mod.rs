//! Route definitions for the Smart City Telemetry platform

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/capteurs", sensor_routes())
        .nest("/donnees", reading_routes())
        .nest("/rapports", report_routes())
        .nest("/chercheurs", researcher_routes())
}

/// Collection and reading routes, per sensor
fn sensor_routes() -> Router<AppState> {
    Router::new()
        .route("/:sensor_id/collecter", post(handlers::trigger_collection))
        .route("/:sensor_id/donnees/latest", get(handlers::latest_readings))
        .route("/:sensor_id/donnees/periode", get(handlers::readings_in_period))
        .route(
            "/:sensor_id/statistiques/temperature",
            get(handlers::sensor_temperature_statistics),
        )
        .route("/:sensor_id/statistiques/air", get(handlers::sensor_air_statistics))
        .route("/:sensor_id/statistiques/count", get(handlers::sensor_reading_count))
}

/// Cross-sensor reading routes
fn reading_routes() -> Router<AppState> {
    Router::new()
        .route("/recentes", get(handlers::recent_readings))
        .route("/ville/:city", get(handlers::readings_by_city))
        .route("/:reading_id", get(handlers::get_reading))
}

/// Report lifecycle routes
fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_report))
        .route("/:report_id", get(handlers::get_report))
        .route("/:report_id/generer", post(handlers::generate_report))
        .route("/:report_id/telecharger", get(handlers::download_report))
}

/// Researcher-scoped report routes
fn researcher_routes() -> Router<AppState> {
    Router::new()
        .route("/:researcher_id/rapports", get(handlers::list_researcher_reports))
        .route(
            "/:researcher_id/rapports/statistiques",
            get(handlers::researcher_report_statistics),
        )
}
