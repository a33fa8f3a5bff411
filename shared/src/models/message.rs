//! Channel envelope carrying a reading from the collector to ingestion

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Measurements, NewReading, ReadingStatus};
use crate::types::GeoLocation;

/// Current envelope schema version
pub const MESSAGE_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    MESSAGE_SCHEMA_VERSION
}

/// Pre-persistence reading payload. The message key on the channel is
/// always `sensor_id` in decimal form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadingMessage {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub sensor_id: i64,
    pub city_name: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub local_time: Option<NaiveDateTime>,
    pub temperature_c: Option<f64>,
    pub temperature_f: Option<f64>,
    pub wind_speed_kph: Option<f64>,
    pub precipitation_mm: Option<f64>,
    pub humidity: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub uv_index: Option<f64>,
    pub co: Option<f64>,
    pub no2: Option<f64>,
    pub o3: Option<f64>,
    pub so2: Option<f64>,
    pub pm10: Option<f64>,
    /// Build time on the collector side
    pub collected_at: DateTime<Utc>,
    pub source_api: String,
}

impl ReadingMessage {
    pub fn key(&self) -> String {
        self.sensor_id.to_string()
    }

    pub fn measurements(&self) -> Measurements {
        Measurements {
            temperature_c: self.temperature_c,
            temperature_f: self.temperature_f,
            wind_speed_kph: self.wind_speed_kph,
            precipitation_mm: self.precipitation_mm,
            humidity: self.humidity,
            cloud_cover: self.cloud_cover,
            uv_index: self.uv_index,
            co: self.co,
            no2: self.no2,
            o3: self.o3,
            so2: self.so2,
            pm10: self.pm10,
        }
    }

    /// Build the record to persist. The collection timestamp is the
    /// persistence time, not the build time carried by the message.
    pub fn into_new_reading(self, persisted_at: DateTime<Utc>) -> NewReading {
        let measurements = self.measurements();
        NewReading {
            sensor_id: self.sensor_id,
            location: GeoLocation {
                city: self.city_name,
                region: self.region,
                country: self.country,
                latitude: self.latitude,
                longitude: self.longitude,
            },
            local_time: self.local_time,
            measurements,
            collected_at: persisted_at,
            status: ReadingStatus::Valid,
            source_api: self.source_api,
        }
    }
}
