//! Emergency escalation bookkeeping

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Mutable escalation record owned by the escalation state machine.
///
/// Only `escalation::EscalationHandle` writes to it; everyone else receives
/// clones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationState {
    /// Length of the current run of Critical-tier statuses
    pub consecutive_critical_count: u32,
    /// Time of the last dispatched (or reserved, while in flight) alert
    pub last_alert_time: Option<DateTime<Utc>>,
    /// Set when a dispatch succeeds, cleared when the run breaks
    pub triggered: bool,
    /// Latest dispatch message or failure description
    pub message: String,
    /// Dispatches currently in flight
    pub pending_dispatches: u32,
    pub alerts_sent: u64,
    pub alerts_suppressed: u64,
    pub dispatch_failures: u64,
}

impl EscalationState {
    /// Derive the state-machine phase at `now`.
    pub fn phase(&self, now: DateTime<Utc>, cooldown: Duration) -> EscalationPhase {
        if self
            .last_alert_time
            .is_some_and(|last| now - last <= cooldown)
        {
            EscalationPhase::CoolingDown
        } else if self.consecutive_critical_count > 0 {
            EscalationPhase::Escalating
        } else {
            EscalationPhase::Idle
        }
    }

    /// Seconds left before another alert may be dispatched.
    pub fn cooldown_remaining(&self, now: DateTime<Utc>, cooldown: Duration) -> Option<i64> {
        let last = self.last_alert_time?;
        let elapsed = now - last;
        (elapsed <= cooldown).then(|| (cooldown - elapsed).num_seconds())
    }
}

/// Escalation state-machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationPhase {
    /// No Critical run in progress
    Idle,
    /// Tracking a run of Critical-tier readings
    Escalating,
    /// An alert was dispatched recently; further dispatches are suppressed
    CoolingDown,
}

impl std::fmt::Display for EscalationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EscalationPhase::Idle => write!(f, "Idle"),
            EscalationPhase::Escalating => write!(f, "Escalating"),
            EscalationPhase::CoolingDown => write!(f, "Cooling Down"),
        }
    }
}
