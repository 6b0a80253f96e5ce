//! Telemetry acquisition module
//!
//! Turns feed pushes into normalized readings: payload decoding and
//! latest-entry selection (`feed`), field parsing and derived metrics
//! (`normalizer`).

pub mod feed;
pub mod normalizer;

pub use feed::{FeedError, FeedPayload};
pub use normalizer::{
    normalize, parse_feed_timestamp, parse_field, parse_text, vibration_magnitude,
    FEED_TIMESTAMP_FORMAT,
};
