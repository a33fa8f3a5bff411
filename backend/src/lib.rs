//! Smart City Telemetry Platform - Backend
//!
//! Collects environmental readings from a weather provider, carries them
//! through a partitioned message channel into the reading store, and
//! renders researcher reports over stored readings.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod channel;
pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod stores;

pub use config::Config;
pub use error::{AppError, AppResult};

use services::{CollectorService, ReportService};
use stores::{ReadingStore, SensorRegistry};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub collector: CollectorService,
    pub reports: ReportService,
    pub readings: Arc<dyn ReadingStore>,
    pub sensors: Arc<dyn SensorRegistry>,
    /// Absent when running on in-memory stores
    pub db: Option<sqlx::PgPool>,
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Smart City Telemetry Platform API v1.0"
}
