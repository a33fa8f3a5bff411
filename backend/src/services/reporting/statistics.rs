//! Aggregate statistics over a set of readings
//!
//! Pure functions of the input: the same readings in the same order always
//! yield identical numbers. Every aggregate over an empty set is 0.0.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{AirQualityBand, Reading};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemperatureStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// max - min
    pub spread: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollutionStats {
    pub pm10_mean: f64,
    pub co_mean: f64,
    pub no2_mean: f64,
    pub o3_mean: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeatherStats {
    pub humidity_mean: f64,
    pub wind_speed_mean: f64,
    pub precipitation_total: f64,
    pub uv_mean: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CityStats {
    pub record_count: usize,
    pub temperature_mean: f64,
    pub pm10_mean: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadingStatistics {
    pub record_count: usize,
    /// Distinct non-empty city names
    pub city_count: usize,
    pub sensor_count: usize,
    pub first_reading: Option<DateTime<Utc>>,
    pub last_reading: Option<DateTime<Utc>>,
    pub temperature: TemperatureStats,
    pub pollution: PollutionStats,
    pub weather: WeatherStats,
    pub by_city: BTreeMap<String, CityStats>,
    pub by_source: BTreeMap<String, usize>,
    pub by_sensor: BTreeMap<i64, usize>,
}

impl ReadingStatistics {
    pub fn compute(readings: &[Reading]) -> Self {
        let temperatures = values(readings, |r| r.measurements.temperature_c);

        let temperature = TemperatureStats {
            mean: mean(&temperatures),
            min: min(&temperatures),
            max: max(&temperatures),
            spread: if temperatures.is_empty() {
                0.0
            } else {
                max(&temperatures) - min(&temperatures)
            },
        };

        let pollution = PollutionStats {
            pm10_mean: mean(&values(readings, |r| r.measurements.pm10)),
            co_mean: mean(&values(readings, |r| r.measurements.co)),
            no2_mean: mean(&values(readings, |r| r.measurements.no2)),
            o3_mean: mean(&values(readings, |r| r.measurements.o3)),
        };

        let weather = WeatherStats {
            humidity_mean: mean(&values(readings, |r| r.measurements.humidity)),
            wind_speed_mean: mean(&values(readings, |r| r.measurements.wind_speed_kph)),
            precipitation_total: values(readings, |r| r.measurements.precipitation_mm)
                .iter()
                .sum(),
            uv_mean: mean(&values(readings, |r| r.measurements.uv_index)),
        };

        let mut city_readings: BTreeMap<String, Vec<&Reading>> = BTreeMap::new();
        let mut by_source: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_sensor: BTreeMap<i64, usize> = BTreeMap::new();
        let mut sensors = BTreeSet::new();

        for reading in readings {
            if let Some(city) = reading.location.city.as_deref().filter(|c| !c.is_empty()) {
                city_readings.entry(city.to_string()).or_default().push(reading);
            }
            *by_source.entry(reading.source_api.clone()).or_default() += 1;
            *by_sensor.entry(reading.sensor_id).or_default() += 1;
            sensors.insert(reading.sensor_id);
        }

        let by_city = city_readings
            .into_iter()
            .map(|(city, group)| {
                let temps: Vec<f64> = group.iter().filter_map(|r| r.measurements.temperature_c).collect();
                let pm10: Vec<f64> = group.iter().filter_map(|r| r.measurements.pm10).collect();
                let stats = CityStats {
                    record_count: group.len(),
                    temperature_mean: mean(&temps),
                    pm10_mean: mean(&pm10),
                };
                (city, stats)
            })
            .collect::<BTreeMap<_, _>>();

        Self {
            record_count: readings.len(),
            city_count: by_city.len(),
            sensor_count: sensors.len(),
            first_reading: readings.iter().map(|r| r.collected_at).min(),
            last_reading: readings.iter().map(|r| r.collected_at).max(),
            temperature,
            pollution,
            weather,
            by_city,
            by_source,
            by_sensor,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Qualitative band of the mean PM10
    pub fn air_quality(&self) -> AirQualityBand {
        AirQualityBand::from_pm10(self.pollution.pm10_mean)
    }

    /// Source counts, largest first
    pub fn sources_by_count(&self) -> Vec<(&str, usize)> {
        let mut sources: Vec<(&str, usize)> =
            self.by_source.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        sources.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        sources
    }

    /// Sensor counts, largest first
    pub fn sensors_by_count(&self) -> Vec<(i64, usize)> {
        let mut sensors: Vec<(i64, usize)> = self.by_sensor.iter().map(|(k, v)| (*k, *v)).collect();
        sensors.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        sensors
    }
}

fn values(readings: &[Reading], field: impl Fn(&Reading) -> Option<f64>) -> Vec<f64> {
    readings.iter().filter_map(field).filter(|v| v.is_finite()).collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn min(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

fn max(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
