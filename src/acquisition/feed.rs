//! Feed payload decoding
//!
//! A feed push is either one record, or a map of opaque push ids to records
//! when the device buffered several entries between pushes. Only the entry
//! with the latest timestamp is processed.

use std::collections::BTreeMap;

use chrono::FixedOffset;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::normalizer::parse_feed_timestamp;
use crate::types::RawReading;

/// Wire fields of a record. Any of them at the top level marks a single record.
const RECORD_FIELDS: [&str; 9] = [
    "decibel",
    "humidity",
    "temperature",
    "vibration_x",
    "vibration_y",
    "vibration_z",
    "relayState",
    "is_anomaly",
    "timestamp",
];

/// Errors surfaced by the feed.
///
/// None of these are fatal: the pipeline reports them as a visible status
/// and keeps consuming.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("No data available from the feed")]
    Empty,

    #[error("Malformed feed payload: {0}")]
    Malformed(String),

    #[error("Feed connection error: {0}")]
    Connection(String),
}

/// One decoded feed push.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedPayload {
    /// Latest record only
    Single(RawReading),
    /// Buffered entries keyed by push id
    Buffered(BTreeMap<String, RawReading>),
}

impl FeedPayload {
    /// Decode a payload from a JSON document.
    pub fn from_json(value: Value) -> Result<Self, FeedError> {
        let map = match value {
            Value::Null => return Err(FeedError::Empty),
            Value::Object(map) => map,
            other => {
                return Err(FeedError::Malformed(format!(
                    "expected an object, got {}",
                    json_kind(&other)
                )))
            }
        };

        if map.is_empty() {
            return Err(FeedError::Empty);
        }

        if RECORD_FIELDS.iter().any(|field| map.contains_key(*field)) {
            let raw: RawReading = serde_json::from_value(Value::Object(map))
                .map_err(|e| FeedError::Malformed(e.to_string()))?;
            return Ok(Self::Single(raw));
        }

        let total = map.len();
        let mut entries = BTreeMap::new();
        for (key, entry) in map {
            if !entry.is_object() {
                warn!(key = %key, "Skipping non-object feed entry");
                continue;
            }
            match serde_json::from_value::<RawReading>(entry) {
                Ok(raw) => {
                    entries.insert(key, raw);
                }
                Err(e) => warn!(key = %key, error = %e, "Skipping undecodable feed entry"),
            }
        }

        if entries.is_empty() {
            return Err(FeedError::Malformed(format!(
                "none of {total} buffered entries could be decoded"
            )));
        }
        Ok(Self::Buffered(entries))
    }

    /// Decode a payload from JSON text. Blank text is an empty feed.
    pub fn parse_str(text: &str) -> Result<Self, FeedError> {
        if text.trim().is_empty() {
            return Err(FeedError::Empty);
        }
        let value: Value =
            serde_json::from_str(text).map_err(|e| FeedError::Malformed(e.to_string()))?;
        Self::from_json(value)
    }

    /// Number of records carried by this payload.
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Buffered(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Select the record to process.
    ///
    /// For buffered payloads this is the entry with the latest parsed
    /// timestamp; entries whose timestamp cannot be parsed rank below every
    /// parsed one. Ties go to the greatest push id.
    pub fn into_latest(self, offset: FixedOffset) -> Result<RawReading, FeedError> {
        match self {
            Self::Single(raw) => Ok(raw),
            Self::Buffered(entries) => entries
                .into_iter()
                .max_by_key(|(_, raw)| {
                    raw.timestamp
                        .as_deref()
                        .and_then(|ts| parse_feed_timestamp(ts, offset))
                })
                .map(|(_, raw)| raw)
                .ok_or(FeedError::Empty),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
