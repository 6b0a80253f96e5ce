//! History window - time-bounded buffer of recent readings
//!
//! Readings are kept in insertion order. After every append the window is
//! trimmed: timestamped readings older than the retention horizon are
//! dropped; readings whose timestamp did not parse survive only while they
//! are among the most recent `fallback_entries` appends.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::HistoryConfig;
use crate::types::Reading;

/// Bounded, insertion-ordered window of readings.
///
/// Owned by the pipeline; consumers only ever get [`HistoryWindow::snapshot`].
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    entries: VecDeque<Reading>,
    retention: Duration,
    fallback_entries: usize,
    hard_cap: usize,
}

impl HistoryWindow {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            entries: VecDeque::with_capacity(config.fallback_entries),
            retention: Duration::try_minutes(config.window_minutes)
                .unwrap_or_else(|| Duration::minutes(crate::config::defaults::HISTORY_WINDOW_MINUTES)),
            fallback_entries: config.fallback_entries,
            hard_cap: config.hard_cap.max(1),
        }
    }

    /// Append a reading and trim relative to `now`.
    pub fn append(&mut self, reading: Reading, now: DateTime<Utc>) {
        self.entries.push_back(reading);
        self.trim(now);
    }

    fn trim(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.retention;
        let fallback_floor = self.entries.len().saturating_sub(self.fallback_entries);

        let mut index = 0usize;
        self.entries.retain(|reading| {
            let keep = match reading.timestamp {
                Some(ts) => ts >= cutoff,
                None => index >= fallback_floor,
            };
            index += 1;
            keep
        });

        while self.entries.len() > self.hard_cap {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.entries.iter()
    }

    /// Immutable copy of the window, oldest first.
    pub fn snapshot(&self) -> Vec<Reading> {
        self.entries.iter().cloned().collect()
    }
}

// ============================================================================
// Window statistics
// ============================================================================

/// Average / extremes of one metric over a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl MetricStats {
    fn from_values(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut count = 0u32;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        (count > 0).then(|| Self {
            avg: sum / f64::from(count),
            min,
            max,
        })
    }
}

/// Summary statistics over a window snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowStats {
    pub samples: usize,
    pub temperature: MetricStats,
    pub humidity: MetricStats,
    pub decibel: MetricStats,
    pub vibration: MetricStats,
}

impl WindowStats {
    /// Compute statistics, `None` for an empty window.
    pub fn compute(readings: &[Reading]) -> Option<Self> {
        Some(Self {
            samples: readings.len(),
            temperature: MetricStats::from_values(readings.iter().map(|r| r.temperature))?,
            humidity: MetricStats::from_values(readings.iter().map(|r| r.humidity))?,
            decibel: MetricStats::from_values(readings.iter().map(|r| r.decibel))?,
            vibration: MetricStats::from_values(readings.iter().map(|r| r.vibration_magnitude))?,
        })
    }
}
