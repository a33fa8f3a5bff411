//! Configuration management for the Smart City Telemetry platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with SCT_ prefix

use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Weather API configuration
    pub weather: WeatherConfig,

    /// Periodic collection configuration
    pub collector: CollectorConfig,

    /// Message channel configuration
    pub channel: ChannelConfig,

    /// Report generation configuration
    pub reports: ReportsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Apply pending migrations at startup
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    /// Weather API endpoint
    pub api_endpoint: String,

    /// Weather API key
    pub api_key: String,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectorConfig {
    /// Run the periodic sweep
    pub enabled: bool,

    /// Seconds between two sweeps
    pub interval_secs: u64,

    /// Sensors collected in parallel within one sweep (1 = sequential)
    pub sweep_concurrency: usize,

    /// Upper bound for a single adapter call
    pub adapter_timeout_secs: u64,
}

/// Channel transport selection
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChannelConfig {
    pub backend: ChannelBackend,

    /// Logical topic carrying reading messages
    pub topic: String,

    pub partitions: u32,

    /// Consumer group used by ingestion
    pub consumer_group: String,

    /// Delay between two empty polls of a partition
    pub poll_interval_ms: u64,

    /// Maximum deliveries fetched per poll
    pub fetch_batch_size: i64,

    /// Delay before redelivering a message whose processing failed
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportsConfig {
    /// Return from creation immediately and generate on a background task
    pub generate_in_background: bool,

    /// Records embedded in the JSON data sample
    pub json_sample_limit: usize,

    /// Records listed in the text sample section
    pub text_sample_limit: usize,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("SCT_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 8080)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.run_migrations", true)?
            .set_default("weather.api_endpoint", DEFAULT_WEATHER_ENDPOINT)?
            .set_default("weather.request_timeout_secs", 10)?
            .set_default("collector.enabled", true)?
            .set_default("collector.interval_secs", 300)?
            .set_default("collector.sweep_concurrency", 1)?
            .set_default("collector.adapter_timeout_secs", 15)?
            .set_default("channel.backend", "postgres")?
            .set_default("channel.topic", "smart-city-iot")?
            .set_default("channel.partitions", 8)?
            .set_default("channel.consumer_group", "smart-city-group")?
            .set_default("channel.poll_interval_ms", 500)?
            .set_default("channel.fetch_batch_size", 100)?
            .set_default("channel.retry_backoff_ms", 1000)?
            .set_default("reports.generate_in_background", false)?
            .set_default("reports.json_sample_limit", 1000)?
            .set_default("reports.text_sample_limit", 15)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (SCT_ prefix)
            .add_source(
                Environment::with_prefix("SCT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.channel.partitions == 0 {
            return Err(ConfigError::Message(
                "channel.partitions must be at least 1".to_string(),
            ));
        }
        if self.collector.interval_secs == 0 {
            return Err(ConfigError::Message(
                "collector.interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Log the effective configuration with secrets masked
    pub fn log_summary(&self) {
        tracing::info!(
            environment = %self.environment,
            host = %self.server.host,
            port = self.server.port,
            "Server configuration"
        );
        tracing::info!(
            url = %mask_database_url(&self.database.url),
            max_connections = self.database.max_connections,
            run_migrations = self.database.run_migrations,
            "Database configuration"
        );
        tracing::info!(
            endpoint = %self.weather.api_endpoint,
            api_key = %mask_secret(&self.weather.api_key),
            "Weather configuration"
        );
        tracing::info!(
            enabled = self.collector.enabled,
            interval_secs = self.collector.interval_secs,
            sweep_concurrency = self.collector.sweep_concurrency,
            "Collector configuration"
        );
        tracing::info!(
            backend = ?self.channel.backend,
            topic = %self.channel.topic,
            partitions = self.channel.partitions,
            group = %self.channel.consumer_group,
            "Channel configuration"
        );
    }
}

/// WeatherAPI current conditions endpoint
pub const DEFAULT_WEATHER_ENDPOINT: &str = "http://api.weatherapi.com/v1/current.json";

/// Keep the first four characters of a secret
fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "<unset>".to_string();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}

/// Hide the password part of a connection URL
fn mask_database_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{}://{}:****@{}", scheme, user, host),
        None => url.to_string(),
    }
}

impl ChannelConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl CollectorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 2,
            run_migrations: true,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_WEATHER_ENDPOINT.to_string(),
            api_key: String::new(),
            request_timeout_secs: 10,
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            sweep_concurrency: 1,
            adapter_timeout_secs: 15,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            backend: ChannelBackend::default(),
            topic: "smart-city-iot".to_string(),
            partitions: 8,
            consumer_group: "smart-city-group".to_string(),
            poll_interval_ms: 500,
            fetch_batch_size: 100,
            retry_backoff_ms: 1000,
        }
    }
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            generate_in_background: false,
            json_sample_limit: 1000,
            text_sample_limit: 15,
        }
    }
}
