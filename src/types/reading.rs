//! Feed records and normalized readings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// Wire format
// ============================================================================

/// A single sensor field as it arrives on the wire.
///
/// Firmware revisions disagree on whether values are sent as bare numbers,
/// booleans, or unit-suffixed strings ("49.44 dB"), so all three are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    Number(f64),
    Flag(bool),
    Text(String),
}

impl From<&str> for RawField {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawField {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for RawField {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for RawField {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

/// Telemetry record exactly as pushed by the feed.
///
/// Every field is optional: a missing or `null` value normalizes to `0.0`
/// (or `false` for the flags), never to an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    #[serde(default)]
    pub decibel: Option<RawField>,
    #[serde(default)]
    pub humidity: Option<RawField>,
    #[serde(default)]
    pub temperature: Option<RawField>,
    #[serde(default)]
    pub vibration_x: Option<RawField>,
    #[serde(default)]
    pub vibration_y: Option<RawField>,
    #[serde(default)]
    pub vibration_z: Option<RawField>,
    /// Relay state (0/1)
    #[serde(default, rename = "relayState")]
    pub relay_state: Option<RawField>,
    /// Upstream anomaly flag (0/1). Older firmware omits it.
    #[serde(default)]
    pub is_anomaly: Option<RawField>,
    /// `"YYYY-MM-DD HH:MM:SS"` in the device's local time
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<String>,
}

/// Numbers keep their text form; any other non-string reads as missing.
/// Either way the record survives and the timestamp fails to parse later.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

// ============================================================================
// Normalized reading
// ============================================================================

/// One normalized, timestamped sensor sample.
///
/// Created once per ingested event by the normalizer and never mutated
/// afterwards; downstream stages only ever see shared references or clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Sound level (dB)
    pub decibel: f64,
    /// Relative humidity (%)
    pub humidity: f64,
    /// Temperature (°C)
    pub temperature: f64,
    /// Vibration X axis (m/s²)
    pub vibration_x: f64,
    /// Vibration Y axis (m/s²)
    pub vibration_y: f64,
    /// Vibration Z axis (m/s²)
    pub vibration_z: f64,
    /// Derived: √(x² + y² + z²)
    pub vibration_magnitude: f64,
    pub relay_state: bool,
    /// Anomaly flag raised by the device-side detector
    pub upstream_anomaly: bool,
    /// Parsed timestamp, `None` when the feed value could not be parsed
    pub timestamp: Option<DateTime<Utc>>,
    /// Timestamp text as received (used verbatim by the CSV export)
    pub raw_timestamp: String,
}

impl Reading {
    /// Build a reading from already-numeric measurements.
    ///
    /// The vibration magnitude is derived here so it can never disagree with
    /// the axis components.
    pub fn from_measurements(
        decibel: f64,
        humidity: f64,
        temperature: f64,
        vibration: (f64, f64, f64),
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        let (x, y, z) = vibration;
        Self {
            decibel,
            humidity,
            temperature,
            vibration_x: x,
            vibration_y: y,
            vibration_z: z,
            vibration_magnitude: crate::acquisition::vibration_magnitude(x, y, z),
            relay_state: false,
            upstream_anomaly: false,
            raw_timestamp: timestamp
                .map(|ts| ts.format(crate::acquisition::FEED_TIMESTAMP_FORMAT).to_string())
                .unwrap_or_default(),
            timestamp,
        }
    }

    /// Mark the reading as flagged by the upstream detector.
    #[must_use]
    pub fn with_upstream_anomaly(mut self, flagged: bool) -> Self {
        self.upstream_anomaly = flagged;
        self
    }

    #[must_use]
    pub fn with_relay_state(mut self, on: bool) -> Self {
        self.relay_state = on;
        self
    }
}
