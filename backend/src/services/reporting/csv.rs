//! CSV rendering: one row per reading

use std::collections::HashMap;

use serde::Serialize;
use shared::Reading;

use crate::error::{AppError, AppResult};

const HEADERS: [&str; 22] = [
    "id",
    "collected_at",
    "city",
    "region",
    "country",
    "latitude",
    "longitude",
    "temperature_c",
    "temperature_f",
    "humidity",
    "wind_speed_kph",
    "precipitation_mm",
    "co",
    "no2",
    "o3",
    "so2",
    "pm10",
    "uv_index",
    "cloud_cover",
    "source_api",
    "sensor_id",
    "sensor_name",
];

#[derive(Serialize)]
struct CsvRow<'a> {
    id: i64,
    collected_at: String,
    city: Option<&'a str>,
    region: Option<&'a str>,
    country: Option<&'a str>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    temperature_c: Option<f64>,
    temperature_f: Option<f64>,
    humidity: Option<f64>,
    wind_speed_kph: Option<f64>,
    precipitation_mm: Option<f64>,
    co: Option<f64>,
    no2: Option<f64>,
    o3: Option<f64>,
    so2: Option<f64>,
    pm10: Option<f64>,
    uv_index: Option<f64>,
    cloud_cover: Option<f64>,
    source_api: &'a str,
    sensor_id: i64,
    sensor_name: Option<&'a str>,
}

impl<'a> CsvRow<'a> {
    fn new(reading: &'a Reading, sensor_name: Option<&'a str>) -> Self {
        let m = &reading.measurements;
        let loc = &reading.location;
        Self {
            id: reading.id,
            collected_at: reading.collected_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            city: loc.city.as_deref(),
            region: loc.region.as_deref(),
            country: loc.country.as_deref(),
            latitude: loc.latitude,
            longitude: loc.longitude,
            temperature_c: m.temperature_c,
            temperature_f: m.temperature_f,
            humidity: m.humidity,
            wind_speed_kph: m.wind_speed_kph,
            precipitation_mm: m.precipitation_mm,
            co: m.co,
            no2: m.no2,
            o3: m.o3,
            so2: m.so2,
            pm10: m.pm10,
            uv_index: m.uv_index,
            cloud_cover: m.cloud_cover,
            source_api: &reading.source_api,
            sensor_id: reading.sensor_id,
            sensor_name,
        }
    }
}

/// Render readings as CSV. Fields containing a comma, a quote or a line
/// break are quoted.
pub fn render(readings: &[Reading], sensor_names: &HashMap<i64, String>) -> AppResult<String> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(vec![]);

    wtr.write_record(HEADERS)
        .map_err(|e| AppError::Generation(format!("CSV serialization error: {}", e)))?;

    for reading in readings {
        let name = sensor_names.get(&reading.sensor_id).map(String::as_str);
        wtr.serialize(CsvRow::new(reading, name))
            .map_err(|e| AppError::Generation(format!("CSV serialization error: {}", e)))?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| AppError::Generation(format!("CSV writer error: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| AppError::Generation(format!("UTF-8 conversion error: {}", e)))
}
