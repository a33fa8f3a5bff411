//! Plain-text rendering (the PDF format)

use std::fmt::{self, Write};

use chrono::{DateTime, NaiveDateTime, Utc};
use shared::ReportType;

use super::statistics::ReadingStatistics;
use super::RenderContext;
use crate::error::{AppError, AppResult};

const RULE: &str = "================================================================";
const SUBRULE: &str = "----------------------------------------------------------------";

/// Notice written when the period holds no readings
pub const NO_DATA_NOTICE: &str = "No data available for the selected period.";

fn fmt_utc(t: &DateTime<Utc>) -> String {
    t.format("%d/%m/%Y %H:%M").to_string()
}

fn fmt_naive(t: &NaiveDateTime) -> String {
    t.format("%d/%m/%Y %H:%M").to_string()
}

fn opt(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.1}{}", v, unit),
        None => "n/a".to_string(),
    }
}

/// Render the human readable report
pub fn render(ctx: &RenderContext<'_>, sample_limit: usize) -> AppResult<String> {
    let mut out = String::new();
    write_report(&mut out, ctx, sample_limit)
        .map_err(|e| AppError::Generation(format!("Text rendering error: {}", e)))?;
    Ok(out)
}

fn write_report(out: &mut String, ctx: &RenderContext<'_>, sample_limit: usize) -> fmt::Result {
    let report = ctx.report;
    let stats = ctx.stats;

    writeln!(out, "{}", RULE)?;
    writeln!(out, "SMART CITY TELEMETRY - ANALYSIS REPORT")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "Name:        {}", report.name)?;
    if let Some(description) = &report.description {
        writeln!(out, "Description: {}", description)?;
    }
    writeln!(out, "Type:        {}", report.report_type)?;
    writeln!(
        out,
        "Period:      {} - {}",
        fmt_naive(&report.period_start),
        fmt_naive(&report.period_end)
    )?;
    writeln!(out, "Researcher:  {}", report.researcher_id)?;
    writeln!(out, "Generated:   {}", fmt_utc(&ctx.generated_at))?;
    writeln!(out)?;

    writeln!(out, "GENERAL STATISTICS")?;
    writeln!(out, "{}", SUBRULE)?;
    writeln!(out, "Total records: {}", stats.record_count)?;

    if stats.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", NO_DATA_NOTICE)?;
        return write_footer(out);
    }

    if let (Some(first), Some(last)) = (&stats.first_reading, &stats.last_reading) {
        writeln!(out, "First reading: {}", fmt_utc(first))?;
        writeln!(out, "Last reading:  {}", fmt_utc(last))?;
    }
    writeln!(out, "Cities:        {}", stats.city_count)?;
    writeln!(out, "Sensors:       {}", stats.sensor_count)?;
    writeln!(out)?;

    match report.report_type {
        ReportType::Temperature => write_temperature(out, stats, true)?,
        ReportType::Pollution => write_pollution(out, stats, true)?,
        ReportType::Global => {
            write_temperature(out, stats, false)?;
            write_pollution(out, stats, false)?;
            write_weather(out, stats)?;
            write_city_synthesis(out, stats)?;
        }
        ReportType::Traffic | ReportType::Noise | ReportType::Light => {
            write_overview(out, ctx)?
        }
    }

    write_sample(out, ctx, sample_limit)?;
    write_footer(out)
}

fn write_temperature(out: &mut String, stats: &ReadingStatistics, per_city: bool) -> fmt::Result {
    let t = &stats.temperature;
    writeln!(out, "TEMPERATURE ANALYSIS")?;
    writeln!(out, "{}", SUBRULE)?;
    writeln!(out, "Mean:   {:.2} °C", t.mean)?;
    writeln!(out, "Min:    {:.2} °C", t.min)?;
    writeln!(out, "Max:    {:.2} °C", t.max)?;
    writeln!(out, "Spread: {:.2} °C", t.spread)?;
    if per_city && !stats.by_city.is_empty() {
        writeln!(out, "Mean by city:")?;
        for (city, city_stats) in &stats.by_city {
            writeln!(out, "  {}: {:.2} °C", city, city_stats.temperature_mean)?;
        }
    }
    writeln!(out)
}

fn write_pollution(out: &mut String, stats: &ReadingStatistics, per_city: bool) -> fmt::Result {
    let p = &stats.pollution;
    writeln!(out, "POLLUTION ANALYSIS")?;
    writeln!(out, "{}", SUBRULE)?;
    writeln!(out, "Mean CO:   {:.2} µg/m³", p.co_mean)?;
    writeln!(out, "Mean PM10: {:.2} µg/m³", p.pm10_mean)?;
    writeln!(out, "Mean NO2:  {:.2} µg/m³", p.no2_mean)?;
    writeln!(out, "Air quality: {}", stats.air_quality())?;
    if per_city && !stats.by_city.is_empty() {
        writeln!(out, "PM10 by city:")?;
        for (city, city_stats) in &stats.by_city {
            writeln!(out, "  {}: {:.2} µg/m³", city, city_stats.pm10_mean)?;
        }
    }
    writeln!(out)
}

fn write_weather(out: &mut String, stats: &ReadingStatistics) -> fmt::Result {
    let w = &stats.weather;
    writeln!(out, "WEATHER CONDITIONS")?;
    writeln!(out, "{}", SUBRULE)?;
    writeln!(out, "Mean humidity:       {:.2} %", w.humidity_mean)?;
    writeln!(out, "Mean wind speed:     {:.2} km/h", w.wind_speed_mean)?;
    writeln!(out, "Total precipitation: {:.2} mm", w.precipitation_total)?;
    writeln!(out, "Mean UV index:       {:.2}", w.uv_mean)?;
    writeln!(out)
}

fn write_city_synthesis(out: &mut String, stats: &ReadingStatistics) -> fmt::Result {
    writeln!(out, "CITY SYNTHESIS")?;
    writeln!(out, "{}", SUBRULE)?;
    for (city, s) in &stats.by_city {
        writeln!(
            out,
            "  {}: {:.2} °C, PM10 {:.2} µg/m³, {} records",
            city, s.temperature_mean, s.pm10_mean, s.record_count
        )?;
    }
    writeln!(out)
}

fn write_overview(out: &mut String, ctx: &RenderContext<'_>) -> fmt::Result {
    writeln!(out, "DATA OVERVIEW")?;
    writeln!(out, "{}", SUBRULE)?;
    writeln!(out, "Records by source:")?;
    for (source, count) in ctx.stats.sources_by_count() {
        writeln!(out, "  {}: {}", source, count)?;
    }
    writeln!(out, "Records by sensor:")?;
    for (sensor_id, count) in ctx.stats.sensors_by_count() {
        match ctx.sensor_name(sensor_id) {
            Some(name) => writeln!(out, "  {} (#{}): {}", name, sensor_id, count)?,
            None => writeln!(out, "  #{}: {}", sensor_id, count)?,
        }
    }
    writeln!(out)
}

fn write_sample(out: &mut String, ctx: &RenderContext<'_>, sample_limit: usize) -> fmt::Result {
    writeln!(out, "DATA SAMPLE (first {} records)", sample_limit)?;
    writeln!(out, "{}", SUBRULE)?;
    for reading in ctx.readings.iter().take(sample_limit) {
        writeln!(
            out,
            "{} | {} | {} | {} | PM10 {} | {}",
            fmt_utc(&reading.collected_at),
            reading.location.city.as_deref().unwrap_or("-"),
            ctx.sensor_name(reading.sensor_id).unwrap_or("-"),
            opt(reading.measurements.temperature_c, " °C"),
            opt(reading.measurements.pm10, ""),
            reading.conditions_summary()
        )?;
    }
    if ctx.readings.len() > sample_limit {
        writeln!(out, "... {} more records", ctx.readings.len() - sample_limit)?;
    }
    writeln!(out)
}

fn write_footer(out: &mut String) -> fmt::Result {
    writeln!(out, "{}", RULE)?;
    writeln!(out, "END OF REPORT")?;
    writeln!(out, "{}", RULE)
}
