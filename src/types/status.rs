//! Anomaly classification and failure prediction results

use serde::{Deserialize, Serialize};

/// Top-level anomaly classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Normal,
    Alert,
    Critical,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Normal => write!(f, "Normal"),
            Tier::Alert => write!(f, "Alert"),
            Tier::Critical => write!(f, "Critical"),
        }
    }
}

/// Secondary classification refining an Alert tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// Classification of a single reading.
///
/// Computed deterministically from one `Reading` and the configured
/// thresholds; carries no history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyStatus {
    pub tier: Tier,
    pub severity: Severity,
    /// Mirrors `Reading::upstream_anomaly`
    pub upstream_anomaly: bool,
    /// Number of device-critical indicators (0..=4)
    pub critical_indicator_count: u8,
}

impl AnomalyStatus {
    /// True when this status counts toward an automatic escalation run.
    pub fn qualifies_for_escalation(&self, indicator_gate: u8) -> bool {
        self.tier == Tier::Critical
            && self.upstream_anomaly
            && self.critical_indicator_count >= indicator_gate
    }
}

/// Forward-looking prediction tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredictionTier {
    Normal,
    Warning,
    Critical,
}

impl std::fmt::Display for PredictionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredictionTier::Normal => write!(f, "Normal"),
            PredictionTier::Warning => write!(f, "Warning"),
            PredictionTier::Critical => write!(f, "Critical"),
        }
    }
}

/// Heuristic failure prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FailurePrediction {
    pub tier: PredictionTier,
    /// Confidence in [0, 1]
    pub confidence: f64,
}
