//! Smart City Telemetry Platform - Backend Server
//!
//! Runs the HTTP API together with the periodic collector and the
//! ingestion consumer.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smart_city_telemetry_backend::{
    channel::{Channel, JsonCodec, MemoryChannel, MessageCodec, PgChannel},
    config::{ChannelBackend, Config},
    create_app,
    external::WeatherApiClient,
    services::{CollectionScheduler, CollectorService, IngestionConsumer, IngestionProcessor, ReportService},
    stores::{PgReadingStore, PgReportStore, PgSensorRegistry, ReadingStore, ReportStore, SensorRegistry},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "telemetry_server=debug,smart_city_telemetry_backend=debug,tower_http=debug,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Smart City Telemetry Server");
    config.log_summary();

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    if config.database.run_migrations {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    let sensors: Arc<dyn SensorRegistry> = Arc::new(PgSensorRegistry::new(db_pool.clone()));
    let readings: Arc<dyn ReadingStore> = Arc::new(PgReadingStore::new(db_pool.clone()));
    let reports: Arc<dyn ReportStore> = Arc::new(PgReportStore::new(db_pool.clone()));
    let codec: Arc<dyn MessageCodec> = Arc::new(JsonCodec);

    let channel: Arc<dyn Channel> = match config.channel.backend {
        ChannelBackend::Postgres => Arc::new(PgChannel::new(
            db_pool.clone(),
            config.channel.topic.clone(),
            config.channel.partitions,
        )),
        ChannelBackend::Memory => {
            tracing::warn!("Using in-memory channel, unconsumed messages are lost on shutdown");
            Arc::new(MemoryChannel::new(
                config.channel.topic.clone(),
                config.channel.partitions,
            ))
        }
    };

    let adapter = Arc::new(WeatherApiClient::new(
        config.weather.api_key.clone(),
        config.weather.api_endpoint.clone(),
        Duration::from_secs(config.weather.request_timeout_secs),
    )?);

    let collector = CollectorService::new(sensors.clone(), adapter, channel.clone(), codec.clone())
        .with_adapter_timeout(config.collector.adapter_timeout())
        .with_sweep_concurrency(config.collector.sweep_concurrency);

    // Start ingestion before collection so nothing waits on an idle consumer
    let processor = Arc::new(IngestionProcessor::new(
        sensors.clone(),
        readings.clone(),
        codec,
    ));
    let consumer = IngestionConsumer::new(processor, channel, config.channel.consumer_group.clone())
        .with_poll_interval(config.channel.poll_interval())
        .with_batch_size(config.channel.fetch_batch_size.max(1) as usize)
        .with_retry_backoff(config.channel.retry_backoff())
        .start()
        .await?;

    let scheduler = if config.collector.enabled {
        Some(CollectionScheduler::new(collector.clone(), config.collector.interval()).start())
    } else {
        tracing::info!("Periodic collection disabled");
        None
    };

    // Create application state
    let state = AppState {
        config: Arc::new(config.clone()),
        collector,
        reports: ReportService::new(reports, readings.clone(), sensors.clone(), config.reports.clone()),
        readings,
        sensors,
        db: Some(db_pool),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, shutting down background tasks");
    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }
    consumer.stop().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
