//! Value normalization and derived metrics
//!
//! Sensor fields arrive with whatever unit suffix the firmware felt like
//! sending ("49.44 dB", "61.2 %", "27.5 °C", "0.42 m/s²"). Parsing is total:
//! anything that cannot be read as a number becomes `0.0`.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

use crate::types::{RawField, RawReading, Reading};

/// Timestamp layout used by the feed.
pub const FEED_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Naive layouts accepted in addition to [`FEED_TIMESTAMP_FORMAT`].
const NAIVE_TIMESTAMP_FORMATS: [&str; 3] = [
    FEED_TIMESTAMP_FORMAT,
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse a unit-suffixed string into a number.
///
/// Every character other than an ASCII digit, `.` or `-` is stripped, then the
/// longest numeric prefix of the remainder is parsed. Returns `0.0` when
/// nothing numeric is left.
pub fn parse_text(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    match leading_number(&cleaned) {
        Some(value) if value.is_finite() => value,
        _ => {
            if !text.trim().is_empty() {
                debug!(raw = %text, "Unparsable sensor value, defaulting to 0.0");
            }
            0.0
        }
    }
}

/// Parse an optional wire field. Missing fields read as `0.0`.
pub fn parse_field(field: Option<&RawField>) -> f64 {
    match field {
        Some(RawField::Number(value)) if value.is_finite() => *value,
        Some(RawField::Number(_)) | None => 0.0,
        Some(RawField::Flag(flag)) => f64::from(u8::from(*flag)),
        Some(RawField::Text(text)) => parse_text(text),
    }
}

/// Longest prefix of `s` of the form `-?digits[.digits]`.
fn leading_number(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = usize::from(bytes.first() == Some(&b'-'));

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if has_digits || frac_end > frac_start {
            has_digits = true;
            end = frac_end;
        }
    }

    if !has_digits {
        return None;
    }
    s[..end].parse().ok()
}

/// Overall vibration intensity: √(x² + y² + z²).
pub fn vibration_magnitude(x: f64, y: f64, z: f64) -> f64 {
    x.hypot(y).hypot(z)
}

/// Parse a feed timestamp.
///
/// Naive timestamps are interpreted in `offset` (the device's local time);
/// RFC 3339 timestamps carry their own offset. Returns `None` when the text
/// matches neither.
pub fn parse_feed_timestamp(text: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return offset
                .from_local_datetime(&naive)
                .single()
                .map(|local| local.with_timezone(&Utc));
        }
    }

    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Normalize a wire record into an immutable [`Reading`].
pub fn normalize(raw: &RawReading, offset: FixedOffset) -> Reading {
    let vibration_x = parse_field(raw.vibration_x.as_ref());
    let vibration_y = parse_field(raw.vibration_y.as_ref());
    let vibration_z = parse_field(raw.vibration_z.as_ref());

    let raw_timestamp = raw.timestamp.clone().unwrap_or_default();
    let timestamp = parse_feed_timestamp(&raw_timestamp, offset);
    if timestamp.is_none() {
        debug!(raw = %raw_timestamp, "Unparsable feed timestamp");
    }

    Reading {
        decibel: parse_field(raw.decibel.as_ref()),
        humidity: parse_field(raw.humidity.as_ref()),
        temperature: parse_field(raw.temperature.as_ref()),
        vibration_x,
        vibration_y,
        vibration_z,
        vibration_magnitude: vibration_magnitude(vibration_x, vibration_y, vibration_z),
        relay_state: parse_field(raw.relay_state.as_ref()).abs() > f64::EPSILON,
        upstream_anomaly: (parse_field(raw.is_anomaly.as_ref()) - 1.0).abs() < f64::EPSILON,
        timestamp,
        raw_timestamp,
    }
}
