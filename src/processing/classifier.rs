//! Anomaly classification
//!
//! Two rule sets are evaluated against every reading. The tier rules
//! (`critical` / `warning` bands) decide whether the reading is unusual; the
//! narrower `device` band counts how many independent subsystems are failing
//! at once, which is what escalation keys on together with the upstream flag.

use crate::config::{BandThresholds, ThresholdConfig};
use crate::types::{AnomalyStatus, Reading, Severity, Tier};

/// Device-critical indicators needed, with the upstream flag, for Critical.
const CRITICAL_TIER_INDICATORS: u8 = 2;

/// Stateless threshold classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnomalyClassifier {
    thresholds: ThresholdConfig,
}

impl AnomalyClassifier {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Classify one reading.
    ///
    /// Priority order:
    /// 1. upstream anomaly and ≥2 device indicators → Critical / high
    /// 2. any critical-band breach → Alert / high
    /// 3. ≥2 warning-band breaches → Alert / medium
    /// 4. 1 warning-band breach → Alert / low
    /// 5. otherwise → Normal / low
    pub fn classify(&self, reading: &Reading) -> AnomalyStatus {
        let critical_indicator_count = self.count_critical_indicators(reading);
        let critical_count = count(breaches(&self.thresholds.critical, reading));
        let warning_count = count(breaches(&self.thresholds.warning, reading));

        let (tier, severity) = if reading.upstream_anomaly
            && critical_indicator_count >= CRITICAL_TIER_INDICATORS
        {
            (Tier::Critical, Severity::High)
        } else if critical_count > 0 {
            (Tier::Alert, Severity::High)
        } else if warning_count > 1 {
            (Tier::Alert, Severity::Medium)
        } else if warning_count > 0 {
            (Tier::Alert, Severity::Low)
        } else {
            (Tier::Normal, Severity::Low)
        };

        AnomalyStatus {
            tier,
            severity,
            upstream_anomaly: reading.upstream_anomaly,
            critical_indicator_count,
        }
    }

    /// Number of device-critical indicators (0..=4).
    pub fn count_critical_indicators(&self, reading: &Reading) -> u8 {
        count(breaches(&self.thresholds.device, reading))
    }
}

/// Evaluate one band: [decibel, humidity, temperature, vibration].
pub fn breaches(band: &BandThresholds, reading: &Reading) -> [bool; 4] {
    [
        reading.decibel > band.decibel_max,
        reading.humidity > band.humidity_max || reading.humidity < band.humidity_min,
        reading.temperature >= band.temperature_limit,
        reading.vibration_magnitude > band.vibration_max,
    ]
}

fn count(flags: [bool; 4]) -> u8 {
    flags.into_iter().map(u8::from).sum()
}
