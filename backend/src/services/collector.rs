//! Collection service: sensor sweep and manual single-sensor collection
//!
//! Fetches an observation per sensor from the weather adapter and publishes
//! a [`ReadingMessage`] on the channel. Never writes readings directly.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::Serialize;
use shared::{ReadingMessage, Sensor, MESSAGE_SCHEMA_VERSION};
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};

use crate::channel::{Channel, MessageCodec};
use crate::error::{AppError, AppResult};
use crate::external::{ProviderObservation, WeatherAdapter};
use crate::stores::SensorRegistry;

/// Provider local time format (`2025-06-19 13:40`)
const PROVIDER_LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Collection service
#[derive(Clone)]
pub struct CollectorService {
    registry: Arc<dyn SensorRegistry>,
    adapter: Arc<dyn WeatherAdapter>,
    channel: Arc<dyn Channel>,
    codec: Arc<dyn MessageCodec>,
    adapter_timeout: Duration,
    sweep_concurrency: usize,
}

/// A sensor the sweep could not collect
#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub sensor_id: i64,
    pub reason: String,
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepSummary {
    /// Active sensors visited
    pub sensors: usize,
    pub published: usize,
    pub failed: Vec<SweepFailure>,
}

/// Result of collecting one sensor
#[derive(Debug, Clone, Serialize)]
pub struct CollectionReceipt {
    pub sensor_id: i64,
    pub partition: u32,
    pub offset: i64,
    pub collected_at: DateTime<Utc>,
}

impl CollectorService {
    /// Create a new CollectorService
    pub fn new(
        registry: Arc<dyn SensorRegistry>,
        adapter: Arc<dyn WeatherAdapter>,
        channel: Arc<dyn Channel>,
        codec: Arc<dyn MessageCodec>,
    ) -> Self {
        Self {
            registry,
            adapter,
            channel,
            codec,
            adapter_timeout: Duration::from_secs(15),
            sweep_concurrency: 1,
        }
    }

    /// Upper bound for a single adapter call
    pub fn with_adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    /// Number of sensors collected at the same time during a sweep
    pub fn with_sweep_concurrency(mut self, concurrency: usize) -> Self {
        self.sweep_concurrency = concurrency.max(1);
        self
    }

    /// Collect every ACTIVE sensor once.
    ///
    /// A failure for one sensor is logged and recorded in the summary; it
    /// never aborts the sweep and is not retried within it.
    #[instrument(name = "collection_sweep", skip(self))]
    pub async fn run_collection_sweep(&self) -> AppResult<SweepSummary> {
        let sensors = self.registry.list_active().await?;
        info!(sensors = sensors.len(), "Starting collection sweep");

        let results = if self.sweep_concurrency <= 1 {
            let mut results = Vec::with_capacity(sensors.len());
            for sensor in &sensors {
                results.push((sensor.id, self.collect_sensor(sensor).await));
            }
            results
        } else {
            self.collect_concurrently(&sensors).await
        };

        let mut summary = SweepSummary {
            sensors: sensors.len(),
            ..Default::default()
        };
        for (sensor_id, result) in results {
            match result {
                Ok(_) => summary.published += 1,
                Err(e) => {
                    error!(sensor_id, error = %e, "Collection failed for sensor");
                    summary.failed.push(SweepFailure {
                        sensor_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            sensors = summary.sensors,
            published = summary.published,
            failed = summary.failed.len(),
            "Collection sweep finished"
        );
        Ok(summary)
    }

    async fn collect_concurrently(
        &self,
        sensors: &[Sensor],
    ) -> Vec<(i64, AppResult<CollectionReceipt>)> {
        let permits = Arc::new(Semaphore::new(self.sweep_concurrency));
        let mut handles = Vec::with_capacity(sensors.len());

        for sensor in sensors.iter().cloned() {
            let service = self.clone();
            let permits = permits.clone();
            let sensor_id = sensor.id;
            let handle = tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| AppError::Internal(format!("Sweep semaphore closed: {}", e)))?;
                service.collect_sensor(&sensor).await
            });
            handles.push((sensor_id, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (sensor_id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(AppError::Internal(format!("Collection task failed: {}", e))),
            };
            results.push((sensor_id, result));
        }
        results
    }

    /// Manual trigger for one sensor.
    ///
    /// Unlike the sweep, the sensor status is not checked: an inactive
    /// sensor can still be collected on demand.
    #[instrument(name = "collect_one", skip(self))]
    pub async fn collect_one(&self, sensor_id: i64) -> AppResult<CollectionReceipt> {
        let sensor = self
            .registry
            .find(sensor_id)
            .await?
            .ok_or(AppError::UnknownSensor(sensor_id))?;

        if !sensor.is_active() {
            warn!(sensor_id, status = sensor.status.as_str(), "Collecting from a non-active sensor");
        }

        let receipt = self.collect_sensor(&sensor).await?;
        info!(sensor_id, partition = receipt.partition, offset = receipt.offset, "Manual collection published");

        Ok(receipt)
    }

    /// Fetch, encode and publish one observation. The receipt carries the
    /// collection time written into the message.
    async fn collect_sensor(&self, sensor: &Sensor) -> AppResult<CollectionReceipt> {
        let observation = tokio::time::timeout(self.adapter_timeout, self.adapter.current(sensor))
            .await
            .map_err(|_| {
                AppError::Adapter(format!(
                    "no answer for sensor {} within {}s",
                    sensor.id,
                    self.adapter_timeout.as_secs_f64()
                ))
            })??;

        let message = build_message(sensor, observation, Utc::now(), Local::now().naive_local());
        let payload = self.codec.encode(&message)?;
        let published = self.channel.publish(&message.key(), payload).await?;

        Ok(CollectionReceipt {
            sensor_id: sensor.id,
            partition: published.partition,
            offset: published.offset,
            collected_at: message.collected_at,
        })
    }
}

/// Build the channel message for one observation.
///
/// A missing or unparseable provider local time falls back to `local_now`.
/// Coordinates missing from the provider answer fall back to the sensor's.
pub fn build_message(
    sensor: &Sensor,
    observation: ProviderObservation,
    now: DateTime<Utc>,
    local_now: NaiveDateTime,
) -> ReadingMessage {
    let local_time = observation
        .local_time
        .as_deref()
        .and_then(|raw| NaiveDateTime::parse_from_str(raw, PROVIDER_LOCAL_TIME_FORMAT).ok())
        .unwrap_or(local_now);

    let location = observation.location;
    let m = observation.measurements;

    ReadingMessage {
        schema_version: MESSAGE_SCHEMA_VERSION,
        sensor_id: sensor.id,
        city_name: location.city,
        region: location.region,
        country: location.country,
        latitude: location.latitude.or(sensor.latitude),
        longitude: location.longitude.or(sensor.longitude),
        local_time: Some(local_time),
        temperature_c: m.temperature_c,
        temperature_f: m.temperature_f,
        wind_speed_kph: m.wind_speed_kph,
        precipitation_mm: m.precipitation_mm,
        humidity: m.humidity,
        cloud_cover: m.cloud_cover,
        uv_index: m.uv_index,
        co: m.co,
        no2: m.no2,
        o3: m.o3,
        so2: m.so2,
        pm10: m.pm10,
        collected_at: now,
        source_api: observation.source,
    }
}
