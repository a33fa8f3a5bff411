//! Weather API client for fetching current conditions
//!
//! Integrates with WeatherAPI.com (`current.json` with air quality enabled)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shared::{GeoLocation, Measurements, Sensor};

use crate::error::{AppError, AppResult};

/// Identifier recorded as the source of every reading from this provider
pub const WEATHER_API_SOURCE: &str = "WeatherAPI";

/// Point-in-time observation returned by a provider. Any field may be
/// missing when the provider answers with partial data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderObservation {
    pub location: GeoLocation,
    /// Provider local time, unparsed (`yyyy-MM-dd HH:mm` for WeatherAPI)
    pub local_time: Option<String>,
    pub measurements: Measurements,
    pub source: String,
}

/// Source of environmental observations for a sensor
#[async_trait]
pub trait WeatherAdapter: Send + Sync {
    async fn current(&self, sensor: &Sensor) -> AppResult<ProviderObservation>;
}

/// WeatherAPI.com client
#[derive(Clone)]
pub struct WeatherApiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

/// WeatherAPI response for current conditions
#[derive(Debug, Deserialize)]
struct WapiCurrentResponse {
    location: Option<WapiLocation>,
    current: Option<WapiCurrent>,
}

#[derive(Debug, Deserialize)]
struct WapiLocation {
    name: Option<String>,
    region: Option<String>,
    country: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    localtime: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WapiCurrent {
    temp_c: Option<f64>,
    temp_f: Option<f64>,
    wind_kph: Option<f64>,
    precip_mm: Option<f64>,
    humidity: Option<f64>,
    cloud: Option<f64>,
    uv: Option<f64>,
    air_quality: Option<WapiAirQuality>,
}

#[derive(Debug, Deserialize)]
struct WapiAirQuality {
    co: Option<f64>,
    no2: Option<f64>,
    o3: Option<f64>,
    so2: Option<f64>,
    pm10: Option<f64>,
}

impl WeatherApiClient {
    /// Create a new WeatherApiClient
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Weather HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }

    /// Fetch current conditions for a named location
    pub async fn get_current(&self, query: &str) -> AppResult<ProviderObservation> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("key", self.api_key.as_str()), ("q", query), ("aqi", "yes")])
            .send()
            .await
            .map_err(|e| AppError::Adapter(format!("Weather API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Adapter(format!(
                "Weather API error: {} - {}",
                status, body
            )));
        }

        let data: WapiCurrentResponse = response
            .json()
            .await
            .map_err(|e| AppError::Adapter(format!("Failed to parse weather response: {}", e)))?;

        Ok(convert_current_response(data))
    }
}

#[async_trait]
impl WeatherAdapter for WeatherApiClient {
    async fn current(&self, sensor: &Sensor) -> AppResult<ProviderObservation> {
        let city = city_for_sensor(sensor);
        tracing::debug!(sensor_id = sensor.id, city, "Fetching current weather");
        self.get_current(city).await
    }
}

/// Map sensor coordinates onto the nearest supported French city
pub fn city_for_sensor(sensor: &Sensor) -> &'static str {
    let (Some(lat), Some(lon)) = (sensor.latitude, sensor.longitude) else {
        return "Paris";
    };

    if lat > 49.0 {
        "Lille"
    } else if lat < 44.0 {
        "Nice"
    } else if lon < 0.0 {
        "Nantes"
    } else if lon > 5.0 {
        "Strasbourg"
    } else if lat < 46.0 {
        "Toulouse"
    } else if lat < 47.0 && lon > 3.0 {
        "Lyon"
    } else {
        "Paris"
    }
}

/// Convert a WeatherAPI response to our format
fn convert_current_response(data: WapiCurrentResponse) -> ProviderObservation {
    let (location, local_time) = match data.location {
        Some(loc) => (
            GeoLocation {
                city: loc.name,
                region: loc.region,
                country: loc.country,
                latitude: loc.lat,
                longitude: loc.lon,
            },
            loc.localtime,
        ),
        None => (GeoLocation::default(), None),
    };

    let measurements = match data.current {
        Some(current) => {
            let air = current.air_quality;
            Measurements {
                temperature_c: current.temp_c,
                temperature_f: current.temp_f,
                wind_speed_kph: current.wind_kph,
                precipitation_mm: current.precip_mm,
                humidity: current.humidity,
                cloud_cover: current.cloud,
                uv_index: current.uv,
                co: air.as_ref().and_then(|a| a.co),
                no2: air.as_ref().and_then(|a| a.no2),
                o3: air.as_ref().and_then(|a| a.o3),
                so2: air.as_ref().and_then(|a| a.so2),
                pm10: air.as_ref().and_then(|a| a.pm10),
            }
        }
        None => Measurements::default(),
    };

    ProviderObservation {
        location,
        local_time,
        measurements,
        source: WEATHER_API_SOURCE.to_string(),
    }
}
