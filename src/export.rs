//! CSV export of a history window snapshot

use chrono::{DateTime, Utc};

use crate::types::Reading;

pub const CSV_HEADER: &str = "Timestamp,Temperature,Humidity,Sound Level,Vibration X,Vibration Y,Vibration Z,Vibration Magnitude,Relay State";

/// Render readings as CSV: header plus one row per reading, `\n`-joined with
/// no trailing newline. Numbers carry two decimals; the timestamp is emitted
/// as received from the feed.
pub fn to_csv(readings: &[Reading]) -> String {
    let mut lines = Vec::with_capacity(readings.len() + 1);
    lines.push(CSV_HEADER.to_string());
    lines.extend(readings.iter().map(csv_row));
    lines.join("\n")
}

fn csv_row(r: &Reading) -> String {
    format!(
        "{},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{}",
        escape_field(&r.raw_timestamp),
        r.temperature,
        r.humidity,
        r.decibel,
        r.vibration_x,
        r.vibration_y,
        r.vibration_z,
        r.vibration_magnitude,
        u8::from(r.relay_state),
    )
}

/// Quote a field containing a delimiter, quote or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Download name for an export produced at `at`.
pub fn export_filename(at: DateTime<Utc>) -> String {
    format!("factory-sensor-data-{}.csv", at.format("%Y-%m-%d"))
}
