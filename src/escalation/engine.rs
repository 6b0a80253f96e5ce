//! Automatic escalation state machine
//!
//! Idle → Escalating → Cooling Down. Evaluated once per classified reading,
//! synchronously; only the transport runs in the background.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::alert::Alert;
use super::handle::{DispatchTicket, EscalationError, EscalationHandle};
use crate::config::EscalationConfig;
use crate::types::{AnomalyStatus, Tier};

/// Result of evaluating one status.
#[derive(Debug)]
pub enum EscalationOutcome {
    /// Newest status is not Critical; the run was reset
    Reset,
    /// Critical, but the trailing statuses do not qualify yet
    Tracking { consecutive: u32 },
    /// Qualifying run, alert dispatched
    Dispatched(DispatchTicket),
    /// Qualifying run, alert suppressed by the cooldown
    Suppressed { consecutive: u32, remaining_secs: i64 },
}

impl EscalationOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Self::Dispatched(_))
    }
}

/// Per-feed escalation engine. Owned by the pipeline.
#[derive(Debug)]
pub struct EscalationEngine {
    handle: EscalationHandle,
    recent: VecDeque<AnomalyStatus>,
    config: EscalationConfig,
}

impl EscalationEngine {
    pub fn new(handle: EscalationHandle, config: EscalationConfig) -> Self {
        Self {
            handle,
            recent: VecDeque::with_capacity(config.status_buffer),
            config,
        }
    }

    pub fn handle(&self) -> &EscalationHandle {
        &self.handle
    }

    /// Feed one status through the state machine.
    ///
    /// Must be called from within a Tokio runtime (dispatch is spawned).
    pub fn evaluate(&mut self, status: &AnomalyStatus, now: DateTime<Utc>) -> EscalationOutcome {
        self.recent.push_back(*status);
        while self.recent.len() > self.config.status_buffer.max(1) {
            self.recent.pop_front();
        }

        if status.tier != Tier::Critical {
            self.handle.reset_run();
            return EscalationOutcome::Reset;
        }

        let consecutive = self.handle.extend_run();
        let window = self.config.consecutive_window.min(self.recent.len());
        let gate = self.config.indicator_gate;
        let qualifies = window >= self.config.min_consecutive
            && self
                .recent
                .iter()
                .skip(self.recent.len() - window)
                .all(|s| s.qualifies_for_escalation(gate));

        if !qualifies {
            debug!(consecutive, window, "Critical reading, escalation not yet qualified");
            return EscalationOutcome::Tracking { consecutive };
        }

        info!(
            consecutive = window,
            indicators = status.critical_indicator_count,
            "Escalation conditions met"
        );
        let alert = Alert::automatic(window, status.critical_indicator_count);
        match self.handle.try_dispatch(alert, now) {
            Ok(ticket) => EscalationOutcome::Dispatched(ticket),
            Err(EscalationError::CoolingDown { remaining_secs }) => EscalationOutcome::Suppressed {
                consecutive,
                remaining_secs,
            },
        }
    }
}
