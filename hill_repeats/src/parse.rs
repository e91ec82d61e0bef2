//! Tab-delimited activity loading.
//!
//! The exporter writes eight columns per record: time of day, latitude,
//! longitude, altitude (m), distance (m), heart rate (BPM), cadence (RPM),
//! speed (m/s). Negative numbers arrive accounting-style (`(x)`), missing
//! readings as `-` or an empty field, and large distances with thousands
//! separators.

use std::fs;
use std::path::Path;

use chrono::NaiveTime;
use tracing::warn;

use crate::{RepeatError, Sample};

const ACTIVITY_COLUMNS: usize = 8;

/// Load and parse an activity export from disk.
pub fn load_samples(path: &Path) -> Result<Vec<Sample>, RepeatError> {
    let text = fs::read_to_string(path)
        .map_err(|_| RepeatError::InputNotFound(path.display().to_string()))?;
    parse_activity(&text)
}

/// Parse tab-delimited activity text into samples.
///
/// The header row (first field `Time`) and records with an empty first field
/// are skipped. Everything else must convert cleanly; the first bad field
/// aborts the load.
pub fn parse_activity(input: &str) -> Result<Vec<Sample>, RepeatError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(input.as_bytes());

    let mut samples = Vec::new();
    let mut last_time: Option<NaiveTime> = None;

    for record in reader.records() {
        let record = record.map_err(|e| RepeatError::MalformedRecord(e.to_string()))?;
        let first = record.get(0).unwrap_or("");
        if first == "Time" || first.is_empty() {
            continue;
        }
        if record.len() < ACTIVITY_COLUMNS {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            return Err(RepeatError::MalformedRecord(format!(
                "line {line}: expected {ACTIVITY_COLUMNS} fields, got {}",
                record.len()
            )));
        }

        let sample = Sample {
            time: parse_time_of_day(first)?,
            time_text: first.trim().to_string(),
            lat: num_str_to_f64(record.get(1).unwrap_or(""))?,
            long: num_str_to_f64(record.get(2).unwrap_or(""))?,
            altitude_m: num_str_to_f64(record.get(3).unwrap_or(""))?,
            distance_m: num_str_to_f64(record.get(4).unwrap_or(""))?,
            heart_rate_bpm: num_str_to_f64(record.get(5).unwrap_or(""))?,
            cadence_rpm: num_str_to_f64(record.get(6).unwrap_or(""))?,
            speed_mps: num_str_to_f64(record.get(7).unwrap_or(""))?,
        };

        if let Some(prev) = last_time {
            if sample.time < prev {
                warn!(
                    "timestamp went backwards at {} (after {}); did the activity cross midnight?",
                    sample.time_text, prev
                );
            }
        }
        last_time = Some(sample.time);
        samples.push(sample);
    }

    Ok(samples)
}

/// Convert one numeric field to `f64`.
///
/// `(x)` means `-x`, a lone `-` or an empty field means `0`, and
/// thousands-separator commas are stripped before conversion. Anything that
/// still fails to parse is fatal.
pub fn num_str_to_f64(raw: &str) -> Result<f64, RepeatError> {
    let mut value = raw.trim().to_string();
    if value.contains('(') && value.contains(')') {
        value = value.replace('(', "-").replace(')', "");
    }
    if value == "-" || value.is_empty() {
        value = "0".to_string();
    }
    value
        .replace(',', "")
        .parse::<f64>()
        .map_err(|_| RepeatError::UnparsableValue(raw.to_string()))
}

/// Times arrive either as the exporter's 12-hour form (`10:00:00 AM`) or as
/// plain 24-hour `HH:MM:SS`.
fn parse_time_of_day(raw: &str) -> Result<NaiveTime, RepeatError> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%I:%M:%S %p")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| RepeatError::UnparsableTime(raw.to_string()))
}
