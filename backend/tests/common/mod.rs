//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{GeoLocation, Measurements, NewReading, Reading, Sensor, SensorStatus};

use smart_city_telemetry_backend::channel::{Channel, JsonCodec, MemoryChannel, MessageCodec};
use smart_city_telemetry_backend::error::{AppError, AppResult};
use smart_city_telemetry_backend::external::{ProviderObservation, WeatherAdapter};
use smart_city_telemetry_backend::stores::{MemoryReadingStore, MemorySensorRegistry, ReadingStore};

pub const TOPIC: &str = "smart-city-iot";
pub const GROUP: &str = "smart-city-group";

pub fn sensor(id: i64, status: SensorStatus) -> Sensor {
    Sensor {
        id,
        name: format!("Capteur {}", id),
        sensor_type: "WEATHER".to_string(),
        status,
        latitude: Some(48.85),
        longitude: Some(2.35),
        installation_address: Some("Paris".to_string()),
    }
}

pub fn registry(sensors: Vec<Sensor>) -> Arc<MemorySensorRegistry> {
    Arc::new(MemorySensorRegistry::new(sensors))
}

pub fn channel(partitions: u32) -> Arc<MemoryChannel> {
    Arc::new(MemoryChannel::new(TOPIC, partitions))
}

pub fn codec() -> Arc<dyn MessageCodec> {
    Arc::new(JsonCodec)
}

/// Adapter answering from a canned observation, with per-sensor failures
#[derive(Default)]
pub struct FakeAdapter {
    failing: HashSet<i64>,
    delay: Option<Duration>,
    temperature: f64,
    calls: AtomicUsize,
}

impl FakeAdapter {
    pub fn new() -> Self {
        Self {
            temperature: 18.5,
            ..Default::default()
        }
    }

    pub fn failing_for(mut self, sensor_id: i64) -> Self {
        self.failing.insert(sensor_id);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherAdapter for FakeAdapter {
    async fn current(&self, sensor: &Sensor) -> AppResult<ProviderObservation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(&sensor.id) {
            return Err(AppError::Adapter(format!("no data for sensor {}", sensor.id)));
        }

        Ok(ProviderObservation {
            location: GeoLocation {
                city: Some("Paris".to_string()),
                region: Some("Ile-de-France".to_string()),
                country: Some("France".to_string()),
                latitude: Some(48.87),
                longitude: Some(2.33),
            },
            local_time: Some("2025-06-01 14:30".to_string()),
            measurements: Measurements {
                temperature_c: Some(self.temperature),
                humidity: Some(60.0),
                pm10: Some(22.0),
                ..Default::default()
            },
            source: "WeatherAPI".to_string(),
        })
    }
}

pub fn new_reading(sensor_id: i64, city: &str, collected_at: DateTime<Utc>, temp: f64) -> NewReading {
    NewReading {
        sensor_id,
        location: GeoLocation {
            city: Some(city.to_string()),
            country: Some("France".to_string()),
            ..Default::default()
        },
        local_time: Some(collected_at.naive_utc()),
        measurements: Measurements {
            temperature_c: Some(temp),
            pm10: Some(35.0),
            humidity: Some(50.0),
            wind_speed_kph: Some(12.0),
            ..Default::default()
        },
        collected_at,
        status: Default::default(),
        source_api: "WeatherAPI".to_string(),
    }
}

/// Reading store failing its first `failures` inserts
pub struct FlakyReadingStore {
    inner: MemoryReadingStore,
    remaining_failures: Mutex<usize>,
}

impl FlakyReadingStore {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: MemoryReadingStore::new(),
            remaining_failures: Mutex::new(failures),
        }
    }

    pub async fn all(&self) -> Vec<Reading> {
        self.inner.all().await
    }
}

#[async_trait]
impl ReadingStore for FlakyReadingStore {
    async fn insert(&self, reading: NewReading) -> AppResult<Reading> {
        {
            let mut remaining = self.remaining_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AppError::Internal("store unavailable".to_string()));
            }
        }
        self.inner.insert(reading).await
    }

    async fn find_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Vec<Reading>> {
        self.inner.find_between(start, end).await
    }

    async fn find_by_sensor_between(
        &self,
        sensor_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Reading>> {
        self.inner.find_by_sensor_between(sensor_id, start, end).await
    }

    async fn latest_for_sensor(&self, sensor_id: i64, limit: i64) -> AppResult<Vec<Reading>> {
        self.inner.latest_for_sensor(sensor_id, limit).await
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Reading>> {
        self.inner.find_by_id(id).await
    }

    async fn find_since(&self, since: DateTime<Utc>) -> AppResult<Vec<Reading>> {
        self.inner.find_since(since).await
    }

    async fn find_by_city(&self, city: &str) -> AppResult<Vec<Reading>> {
        self.inner.find_by_city(city).await
    }

    async fn count_for_sensor(&self, sensor_id: i64) -> AppResult<i64> {
        self.inner.count_for_sensor(sensor_id).await
    }
}

/// Reading store refusing every insert for one sensor, like a constraint
/// violation would
pub struct RejectingReadingStore {
    inner: MemoryReadingStore,
    rejected_sensor: i64,
}

impl RejectingReadingStore {
    pub fn new(rejected_sensor: i64) -> Self {
        Self {
            inner: MemoryReadingStore::new(),
            rejected_sensor,
        }
    }

    pub async fn all(&self) -> Vec<Reading> {
        self.inner.all().await
    }
}

#[async_trait]
impl ReadingStore for RejectingReadingStore {
    async fn insert(&self, reading: NewReading) -> AppResult<Reading> {
        if reading.sensor_id == self.rejected_sensor {
            return Err(AppError::Validation {
                field: "city".to_string(),
                message: "value too long for city".to_string(),
                message_fr: "valeur trop longue pour city".to_string(),
            });
        }
        self.inner.insert(reading).await
    }

    async fn find_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Vec<Reading>> {
        self.inner.find_between(start, end).await
    }

    async fn find_by_sensor_between(
        &self,
        sensor_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Reading>> {
        self.inner.find_by_sensor_between(sensor_id, start, end).await
    }

    async fn latest_for_sensor(&self, sensor_id: i64, limit: i64) -> AppResult<Vec<Reading>> {
        self.inner.latest_for_sensor(sensor_id, limit).await
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Reading>> {
        self.inner.find_by_id(id).await
    }

    async fn find_since(&self, since: DateTime<Utc>) -> AppResult<Vec<Reading>> {
        self.inner.find_since(since).await
    }

    async fn find_by_city(&self, city: &str) -> AppResult<Vec<Reading>> {
        self.inner.find_by_city(city).await
    }

    async fn count_for_sensor(&self, sensor_id: i64) -> AppResult<i64> {
        self.inner.count_for_sensor(sensor_id).await
    }
}

/// Reading store whose queries always fail
pub struct UnreadableReadingStore;

#[async_trait]
impl ReadingStore for UnreadableReadingStore {
    async fn insert(&self, _reading: NewReading) -> AppResult<Reading> {
        Err(AppError::Internal("read-only".to_string()))
    }

    async fn find_between(&self, _start: DateTime<Utc>, _end: DateTime<Utc>) -> AppResult<Vec<Reading>> {
        Err(AppError::Internal("readings unavailable".to_string()))
    }

    async fn find_by_sensor_between(
        &self,
        _sensor_id: i64,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> AppResult<Vec<Reading>> {
        Err(AppError::Internal("readings unavailable".to_string()))
    }

    async fn latest_for_sensor(&self, _sensor_id: i64, _limit: i64) -> AppResult<Vec<Reading>> {
        Err(AppError::Internal("readings unavailable".to_string()))
    }

    async fn find_by_id(&self, _id: i64) -> AppResult<Option<Reading>> {
        Err(AppError::Internal("readings unavailable".to_string()))
    }

    async fn find_since(&self, _since: DateTime<Utc>) -> AppResult<Vec<Reading>> {
        Err(AppError::Internal("readings unavailable".to_string()))
    }

    async fn find_by_city(&self, _city: &str) -> AppResult<Vec<Reading>> {
        Err(AppError::Internal("readings unavailable".to_string()))
    }

    async fn count_for_sensor(&self, _sensor_id: i64) -> AppResult<i64> {
        Err(AppError::Internal("readings unavailable".to_string()))
    }
}

/// Poll `check` until it holds or `timeout` elapses
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Decoded payloads of a channel, keyed by partition, in offset order
pub async fn published_by_partition(
    channel: &MemoryChannel,
) -> HashMap<u32, Vec<shared::ReadingMessage>> {
    let codec = JsonCodec;
    let mut out: HashMap<u32, Vec<shared::ReadingMessage>> = HashMap::new();
    for delivery in channel.snapshot().await {
        let message = codec.decode(&delivery.payload).unwrap();
        out.entry(delivery.partition).or_default().push(message);
    }
    out
}

pub fn as_channel(channel: &Arc<MemoryChannel>) -> Arc<dyn Channel> {
    channel.clone()
}
