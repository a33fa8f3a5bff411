//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Location snapshot attached to a reading at capture time
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GeoLocation {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GeoLocation {
    /// "city, region, country" with missing parts left out
    pub fn label(&self) -> String {
        [&self.city, &self.region, &self.country]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// "lat, lon" when both coordinates are known
    pub fn coordinates(&self) -> Option<String> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(format!("{}, {}", lat, lon)),
            _ => None,
        }
    }
}

/// Human readable byte size (B, KB, MB)
pub fn format_byte_size(bytes: i64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    let size = bytes.max(0) as f64;
    if size < KB {
        format!("{} B", bytes.max(0))
    } else if size < MB {
        format!("{:.1} KB", size / KB)
    } else {
        format!("{:.1} MB", size / MB)
    }
}
