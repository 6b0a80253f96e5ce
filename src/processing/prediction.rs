//! Failure prediction heuristic
//!
//! Not a trained model. The current classification dominates; when it is
//! quiet, a short monotonic rise in both temperature and vibration over the
//! most recent readings is taken as an early warning. Confidence carries a
//! small random jitter so the number never reads as more precise than it is.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::defaults::TREND_SAMPLE_SIZE;
use crate::types::{AnomalyStatus, FailurePrediction, PredictionTier, Reading, Severity, Tier};

/// Source of the confidence jitter.
pub trait JitterSource: Send {
    /// A sample in `[0, span)`.
    fn sample(&mut self, span: f64) -> f64;
}

/// Entropy-seeded jitter used in production.
#[derive(Debug)]
pub struct RandomJitter(StdRng);

impl RandomJitter {
    pub fn new() -> Self {
        Self(StdRng::from_entropy())
    }

    /// Reproducible jitter for replays.
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl Default for RandomJitter {
    fn default() -> Self {
        Self::new()
    }
}

impl JitterSource for RandomJitter {
    fn sample(&mut self, span: f64) -> f64 {
        if span <= 0.0 {
            return 0.0;
        }
        self.0.gen_range(0.0..span)
    }
}

/// Deterministic jitter: always `fraction * span`, with `fraction` clamped
/// into `[0, 1)`.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&mut self, span: f64) -> f64 {
        let fraction = if self.0.is_finite() { self.0.clamp(0.0, 1.0 - f64::EPSILON) } else { 0.0 };
        fraction * span
    }
}

/// Heuristic failure predictor.
pub struct FailurePredictor {
    jitter: Box<dyn JitterSource>,
}

impl std::fmt::Debug for FailurePredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailurePredictor").finish_non_exhaustive()
    }
}

impl Default for FailurePredictor {
    fn default() -> Self {
        Self::new(Box::new(RandomJitter::new()))
    }
}

impl FailurePredictor {
    pub fn new(jitter: Box<dyn JitterSource>) -> Self {
        Self { jitter }
    }

    /// Predict from the current status and the window (oldest first).
    pub fn predict(&mut self, status: &AnomalyStatus, window: &[Reading]) -> FailurePrediction {
        let (tier, base, span) = match (status.tier, status.severity) {
            (Tier::Alert, Severity::High) => (PredictionTier::Critical, 0.85, 0.1),
            (Tier::Alert, Severity::Medium) => (PredictionTier::Warning, 0.65, 0.15),
            _ if rising_trend(window) => (PredictionTier::Warning, 0.6, 0.2),
            _ => (PredictionTier::Normal, 0.9, 0.1),
        };

        FailurePrediction {
            tier,
            confidence: (base + self.jitter.sample(span)).clamp(0.0, 1.0),
        }
    }
}

/// Temperature and vibration both non-decreasing over the last few readings.
fn rising_trend(window: &[Reading]) -> bool {
    if window.len() < TREND_SAMPLE_SIZE {
        return false;
    }
    let recent = &window[window.len() - TREND_SAMPLE_SIZE..];
    recent.windows(2).all(|pair| {
        pair[1].temperature >= pair[0].temperature
            && pair[1].vibration_magnitude >= pair[0].vibration_magnitude
    })
}
