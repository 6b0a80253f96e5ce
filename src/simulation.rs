//! Synthetic sensor feed
//!
//! Produces wire-shaped records the way the factory device pushes them:
//! unit-suffixed strings, integer flags, naive local timestamps. Normal
//! operation is interleaved with fault episodes in which several device
//! indicators breach at once and the upstream detector flags the reading.
//!
//! Used by the `sensor-simulator` binary and the `--simulate` input mode.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rand::prelude::*;
use rand_distr::StandardNormal;

use crate::acquisition::{FeedPayload, FEED_TIMESTAMP_FORMAT};
use crate::types::{RawField, RawReading};

// ============================================================================
// Baseline Constants
// ============================================================================

/// Baseline sound level (dB)
const BASE_DECIBEL: f64 = 55.0;
/// Baseline humidity (%), centred in the device band
const BASE_HUMIDITY: f64 = 60.5;
/// Baseline temperature (°C)
const BASE_TEMPERATURE: f64 = 23.0;
/// Baseline vibration per axis (m/s²)
const BASE_VIBRATION: f64 = 0.3;

/// Per-tick probability of a fault episode starting
const DEFAULT_FAULT_PROBABILITY: f64 = 0.02;

// ============================================================================
// Fault Episodes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Motor overheating: hot and loud
    Overheat,
    /// Bearing failure: heavy vibration and noise
    BearingFailure,
    /// Coolant leak: humidity out of band and rising temperature
    CoolantLeak,
}

impl FaultKind {
    pub fn name(&self) -> &'static str {
        match self {
            FaultKind::Overheat => "Motor Overheat",
            FaultKind::BearingFailure => "Bearing Failure",
            FaultKind::CoolantLeak => "Coolant Leak",
        }
    }

    fn pick(rng: &mut StdRng) -> Self {
        match rng.gen_range(0..3) {
            0 => FaultKind::Overheat,
            1 => FaultKind::BearingFailure,
            _ => FaultKind::CoolantLeak,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Episode {
    kind: FaultKind,
    remaining: u32,
}

// ============================================================================
// Simulator
// ============================================================================

/// Seedable generator of raw feed records.
#[derive(Debug)]
pub struct SensorSimulator {
    rng: StdRng,
    clock: DateTime<Utc>,
    interval: Duration,
    fault_probability: f64,
    episode: Option<Episode>,
    ticks: u64,
    fault_ticks: u64,
}

impl SensorSimulator {
    /// `start` is the first emitted timestamp; each record advances the
    /// clock by `interval`.
    pub fn new(seed: Option<u64>, start: DateTime<Utc>, interval: Duration) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            clock: start,
            interval,
            fault_probability: DEFAULT_FAULT_PROBABILITY,
            episode: None,
            ticks: 0,
            fault_ticks: 0,
        }
    }

    /// Per-tick chance of a fault episode starting, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_fault_probability(mut self, probability: f64) -> Self {
        self.fault_probability = if probability.is_finite() { probability.clamp(0.0, 1.0) } else { 0.0 };
        self
    }

    /// Start a fault episode immediately.
    pub fn inject_fault(&mut self, kind: FaultKind, ticks: u32) {
        self.episode = Some(Episode { kind, remaining: ticks });
    }

    pub fn active_fault(&self) -> Option<FaultKind> {
        self.episode.map(|e| e.kind)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn fault_ticks(&self) -> u64 {
        self.fault_ticks
    }

    fn noise(&mut self, sd: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        z * sd
    }

    /// Generate the next record.
    pub fn next_raw(&mut self) -> RawReading {
        self.ticks += 1;

        if self.episode.is_none() && self.rng.gen_bool(self.fault_probability) {
            let kind = FaultKind::pick(&mut self.rng);
            let remaining = self.rng.gen_range(6..=12);
            self.episode = Some(Episode { kind, remaining });
        }

        let mut decibel = BASE_DECIBEL + self.noise(3.0);
        let mut humidity = BASE_HUMIDITY + self.noise(1.5);
        let mut temperature = BASE_TEMPERATURE + self.noise(0.5);
        let mut vibration = [
            BASE_VIBRATION + self.noise(0.1),
            BASE_VIBRATION + self.noise(0.1),
            BASE_VIBRATION + self.noise(0.1),
        ];

        let fault = self.episode.map(|e| e.kind);
        match fault {
            Some(FaultKind::Overheat) => {
                temperature = 29.0 + self.noise(0.8).abs();
                decibel = 84.0 + self.noise(2.0).abs();
            }
            Some(FaultKind::BearingFailure) => {
                vibration = [
                    5.0 + self.noise(0.5).abs(),
                    5.0 + self.noise(0.5).abs(),
                    8.0 + self.noise(0.5).abs(),
                ];
                decibel = 88.0 + self.noise(2.0).abs();
            }
            Some(FaultKind::CoolantLeak) => {
                humidity = 72.0 + self.noise(2.0).abs();
                temperature = 28.5 + self.noise(0.5).abs();
            }
            None => {}
        }

        if let Some(episode) = self.episode.as_mut() {
            self.fault_ticks += 1;
            episode.remaining = episode.remaining.saturating_sub(1);
            if episode.remaining == 0 {
                self.episode = None;
            }
        }

        let timestamp = self.clock.format(FEED_TIMESTAMP_FORMAT).to_string();
        self.clock += self.interval;

        RawReading {
            decibel: Some(RawField::Text(format!("{decibel:.2} dB"))),
            humidity: Some(RawField::Text(format!("{humidity:.2} %"))),
            temperature: Some(RawField::Text(format!("{temperature:.2} °C"))),
            vibration_x: Some(RawField::Text(format!("{:.3}", vibration[0]))),
            vibration_y: Some(RawField::Text(format!("{:.3}", vibration[1]))),
            vibration_z: Some(RawField::Text(format!("{:.3}", vibration[2]))),
            relay_state: Some(RawField::Number(if fault.is_some() { 0.0 } else { 1.0 })),
            is_anomaly: Some(RawField::Number(if fault.is_some() { 1.0 } else { 0.0 })),
            timestamp: Some(timestamp),
        }
    }

    /// Generate one push: a single record, or `buffered` records keyed by
    /// push id when `buffered > 1`.
    pub fn next_payload(&mut self, buffered: usize) -> FeedPayload {
        if buffered <= 1 {
            return FeedPayload::Single(self.next_raw());
        }
        let entries: BTreeMap<String, RawReading> = (0..buffered)
            .map(|_| {
                let raw = self.next_raw();
                (format!("-N{:08}", self.ticks), raw)
            })
            .collect();
        FeedPayload::Buffered(entries)
    }
}

/// Wire JSON for a payload.
pub fn payload_to_json(payload: &FeedPayload) -> serde_json::Result<serde_json::Value> {
    match payload {
        FeedPayload::Single(raw) => serde_json::to_value(raw),
        FeedPayload::Buffered(entries) => serde_json::to_value(entries),
    }
}
