//! JSON rendering: report info, statistics and a capped data sample

use serde::Serialize;
use shared::Reading;

use super::statistics::round2;
use super::RenderContext;
use crate::error::{AppError, AppResult};

#[derive(Serialize)]
struct JsonReport<'a> {
    report_info: ReportInfo<'a>,
    general_statistics: GeneralStatistics,
    detailed_statistics: DetailedStatistics,
    data_sample: Vec<SampleRecord<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

#[derive(Serialize)]
struct ReportInfo<'a> {
    id: String,
    name: &'a str,
    description: Option<&'a str>,
    report_type: &'static str,
    format: &'static str,
    period_start: String,
    period_end: String,
    researcher_id: i64,
    generated_at: String,
}

#[derive(Serialize)]
struct GeneralStatistics {
    total_records: usize,
    distinct_cities: usize,
    distinct_sensors: usize,
    first_reading: Option<String>,
    last_reading: Option<String>,
}

#[derive(Serialize)]
struct DetailedStatistics {
    temperature: TemperatureSection,
    pollution: PollutionSection,
    weather: WeatherSection,
}

#[derive(Serialize)]
struct TemperatureSection {
    moyenne: f64,
    min: f64,
    max: f64,
}

#[derive(Serialize)]
struct PollutionSection {
    pm10_moyenne: f64,
    co_moyenne: f64,
    no2_moyenne: f64,
    o3_moyenne: f64,
}

#[derive(Serialize)]
struct WeatherSection {
    humidite_moyenne: f64,
    vitesse_vent_moyenne: f64,
    precipitation_totale: f64,
}

#[derive(Serialize)]
struct SampleRecord<'a> {
    #[serde(flatten)]
    reading: &'a Reading,
    sensor_name: Option<&'a str>,
}

/// Render the report as pretty-printed JSON
pub fn render(ctx: &RenderContext<'_>, sample_limit: usize) -> AppResult<String> {
    let report = ctx.report;
    let stats = ctx.stats;

    let data_sample = ctx
        .readings
        .iter()
        .take(sample_limit)
        .map(|reading| SampleRecord {
            reading,
            sensor_name: ctx.sensor_name(reading.sensor_id),
        })
        .collect();

    let note = (ctx.readings.len() > sample_limit).then(|| {
        format!(
            "Data sample limited to the first {} of {} records",
            sample_limit,
            ctx.readings.len()
        )
    });

    let document = JsonReport {
        report_info: ReportInfo {
            id: report.id.to_string(),
            name: &report.name,
            description: report.description.as_deref(),
            report_type: report.report_type.as_str(),
            format: report.format.as_str(),
            period_start: report.period_start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            period_end: report.period_end.format("%Y-%m-%dT%H:%M:%S").to_string(),
            researcher_id: report.researcher_id,
            generated_at: ctx.generated_at.to_rfc3339(),
        },
        general_statistics: GeneralStatistics {
            total_records: stats.record_count,
            distinct_cities: stats.city_count,
            distinct_sensors: stats.sensor_count,
            first_reading: stats.first_reading.map(|t| t.to_rfc3339()),
            last_reading: stats.last_reading.map(|t| t.to_rfc3339()),
        },
        detailed_statistics: DetailedStatistics {
            temperature: TemperatureSection {
                moyenne: round2(stats.temperature.mean),
                min: round2(stats.temperature.min),
                max: round2(stats.temperature.max),
            },
            pollution: PollutionSection {
                pm10_moyenne: round2(stats.pollution.pm10_mean),
                co_moyenne: round2(stats.pollution.co_mean),
                no2_moyenne: round2(stats.pollution.no2_mean),
                o3_moyenne: round2(stats.pollution.o3_mean),
            },
            weather: WeatherSection {
                humidite_moyenne: round2(stats.weather.humidity_mean),
                vitesse_vent_moyenne: round2(stats.weather.wind_speed_mean),
                precipitation_totale: round2(stats.weather.precipitation_total),
            },
        },
        data_sample,
        note,
    };

    serde_json::to_string_pretty(&document)
        .map_err(|e| AppError::Generation(format!("JSON serialization error: {}", e)))
}
