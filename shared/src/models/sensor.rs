//! Sensor registry models

use serde::{Deserialize, Serialize};

/// Operational status of a sensor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorStatus {
    Active,
    Inactive,
    Maintenance,
    Faulty,
}

impl SensorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorStatus::Active => "ACTIVE",
            SensorStatus::Inactive => "INACTIVE",
            SensorStatus::Maintenance => "MAINTENANCE",
            SensorStatus::Faulty => "FAULTY",
        }
    }
}

impl std::str::FromStr for SensorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(SensorStatus::Active),
            "INACTIVE" => Ok(SensorStatus::Inactive),
            "MAINTENANCE" => Ok(SensorStatus::Maintenance),
            "FAULTY" => Ok(SensorStatus::Faulty),
            other => Err(format!("unknown sensor status: {}", other)),
        }
    }
}

/// A registered telemetry source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sensor {
    pub id: i64,
    pub name: String,
    pub sensor_type: String,
    pub status: SensorStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub installation_address: Option<String>,
}

impl Sensor {
    pub fn is_active(&self) -> bool {
        self.status == SensorStatus::Active
    }
}
