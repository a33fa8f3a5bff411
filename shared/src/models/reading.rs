//! Persisted environmental readings

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::GeoLocation;

/// Validity status of a persisted reading
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadingStatus {
    #[default]
    Valid,
    Invalid,
    Pending,
}

impl ReadingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::Valid => "VALID",
            ReadingStatus::Invalid => "INVALID",
            ReadingStatus::Pending => "PENDING",
        }
    }
}

impl std::str::FromStr for ReadingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "VALID" => Ok(ReadingStatus::Valid),
            "INVALID" => Ok(ReadingStatus::Invalid),
            "PENDING" => Ok(ReadingStatus::Pending),
            other => Err(format!("unknown reading status: {}", other)),
        }
    }
}

/// Scalar measurements carried by a reading. Every field may be missing
/// when the provider returns partial data.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Measurements {
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
}

/// One immutable measurement. Created once by ingestion, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    pub id: i64,
    pub sensor_id: i64,
    pub location: GeoLocation,
    pub local_time: Option<NaiveDateTime>,
    #[serde(flatten)]
    pub measurements: Measurements,
    /// Server-assigned at persistence time
    pub collected_at: DateTime<Utc>,
    pub status: ReadingStatus,
    pub source_api: String,
}

/// A reading that has not been persisted yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub sensor_id: i64,
    pub location: GeoLocation,
    pub local_time: Option<NaiveDateTime>,
    pub measurements: Measurements,
    pub collected_at: DateTime<Utc>,
    pub status: ReadingStatus,
    pub source_api: String,
}

impl NewReading {
    pub fn into_reading(self, id: i64) -> Reading {
        Reading {
            id,
            sensor_id: self.sensor_id,
            location: self.location,
            local_time: self.local_time,
            measurements: self.measurements,
            collected_at: self.collected_at,
            status: self.status,
            source_api: self.source_api,
        }
    }
}

/// Qualitative air-quality band derived from PM10 (European thresholds)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AirQualityBand {
    Good,
    Moderate,
    Degraded,
    Poor,
    VeryPoor,
}

impl AirQualityBand {
    pub fn from_pm10(pm10: f64) -> Self {
        if pm10 <= 20.0 {
            AirQualityBand::Good
        } else if pm10 <= 40.0 {
            AirQualityBand::Moderate
        } else if pm10 <= 50.0 {
            AirQualityBand::Degraded
        } else if pm10 <= 100.0 {
            AirQualityBand::Poor
        } else {
            AirQualityBand::VeryPoor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AirQualityBand::Good => "Good",
            AirQualityBand::Moderate => "Moderate",
            AirQualityBand::Degraded => "Degraded",
            AirQualityBand::Poor => "Poor",
            AirQualityBand::VeryPoor => "Very poor",
        }
    }
}

impl std::fmt::Display for AirQualityBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Reading {
    /// Air-quality label for this single reading
    pub fn air_quality_summary(&self) -> String {
        match self.measurements.pm10 {
            Some(pm10) => AirQualityBand::from_pm10(pm10).label().to_string(),
            None => "Not available".to_string(),
        }
    }

    /// Short description of the weather conditions at capture time
    pub fn conditions_summary(&self) -> String {
        let mut parts: Vec<&'static str> = Vec::new();
        let m = &self.measurements;

        if let Some(temp) = m.temperature_c {
            parts.push(if temp < 0.0 {
                "Very cold"
            } else if temp < 10.0 {
                "Cold"
            } else if temp < 20.0 {
                "Cool"
            } else if temp < 25.0 {
                "Pleasant"
            } else if temp < 30.0 {
                "Warm"
            } else {
                "Very hot"
            });
        }

        if let Some(precip) = m.precipitation_mm.filter(|p| *p > 0.0) {
            parts.push(if precip < 1.0 {
                "Light precipitation"
            } else if precip < 5.0 {
                "Moderate precipitation"
            } else {
                "Heavy precipitation"
            });
        }

        if m.wind_speed_kph.is_some_and(|w| w > 20.0) {
            parts.push("Windy");
        }

        if parts.is_empty() {
            "Normal conditions".to_string()
        } else {
            parts.join(", ")
        }
    }
}
