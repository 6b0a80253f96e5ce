//! Shared data structures for the telemetry-to-decision pipeline
//!
//! - `RawReading`: wire-shaped record pushed by the feed
//! - `Reading`: normalized, immutable sensor sample
//! - `AnomalyStatus` / `FailurePrediction`: per-reading decisions
//! - `EscalationState`: emergency-notification bookkeeping

mod reading;
mod status;
mod escalation;

pub use reading::*;
pub use status::*;
pub use escalation::*;
