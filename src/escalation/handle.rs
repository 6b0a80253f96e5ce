//! Shared escalation state and the dispatch path
//!
//! Both the automatic path and the manual trigger go through
//! [`EscalationHandle::try_dispatch`]. The cooldown check and the write of
//! `last_alert_time` happen inside one critical section (a reservation), so
//! two callers racing within one cooldown window cannot both dispatch.
//!
//! The transport runs on a spawned task. Its completion reconciles with the
//! shared state by timestamp: a success never overwrites a newer reservation,
//! and a failure releases its reservation only if nothing newer replaced it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::alert::Alert;
use crate::dispatch::AlertDispatcher;
use crate::types::{AnomalyStatus, EscalationPhase, EscalationState};

const DRAIN_POLL: std::time::Duration = std::time::Duration::from_millis(20);

/// Errors returned by the manual trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EscalationError {
    #[error("Emergency alert suppressed: cooling down for another {remaining_secs}s")]
    CoolingDown { remaining_secs: i64 },
}

/// In-flight dispatch.
#[derive(Debug)]
pub struct DispatchTicket {
    /// Reservation timestamp (becomes `last_alert_time` on success)
    pub attempt_at: DateTime<Utc>,
    pub alert: Alert,
    handle: JoinHandle<bool>,
}

impl DispatchTicket {
    /// Wait for the transport; `true` when the alert was delivered.
    pub async fn completed(self) -> bool {
        self.handle.await.unwrap_or(false)
    }
}

struct Shared {
    state: Mutex<EscalationState>,
    dispatcher: Arc<dyn AlertDispatcher>,
    destination: String,
    send_text: bool,
    cooldown: Duration,
}

/// Cloneable handle onto the escalation state.
#[derive(Clone)]
pub struct EscalationHandle {
    inner: Arc<Shared>,
}

impl std::fmt::Debug for EscalationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscalationHandle")
            .field("dispatcher", &self.inner.dispatcher.name())
            .field("destination", &self.inner.destination)
            .field("cooldown_secs", &self.inner.cooldown.num_seconds())
            .finish_non_exhaustive()
    }
}

impl EscalationHandle {
    pub fn new(
        dispatcher: Arc<dyn AlertDispatcher>,
        destination: impl Into<String>,
        send_text: bool,
        cooldown: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Shared {
                state: Mutex::new(EscalationState::default()),
                dispatcher,
                destination: destination.into(),
                send_text,
                cooldown,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EscalationState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> EscalationState {
        self.lock().clone()
    }

    pub fn phase(&self, now: DateTime<Utc>) -> EscalationPhase {
        self.lock().phase(now, self.inner.cooldown)
    }

    pub fn cooldown(&self) -> Duration {
        self.inner.cooldown
    }

    pub fn dispatcher_name(&self) -> &'static str {
        self.inner.dispatcher.name()
    }

    /// Wait until no delivery is in flight, for at most `timeout`.
    ///
    /// Returns `false` if deliveries were still pending at the deadline.
    pub async fn drain(&self, timeout: std::time::Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let pending = self.lock().pending_dispatches;
            if pending == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                debug!(pending, "Drain deadline reached");
                return false;
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }
    }

    /// Operator-initiated alert.
    ///
    /// Skips the consecutive-reading requirement but not the cooldown.
    /// Must be called from within a Tokio runtime.
    pub fn trigger_manual(
        &self,
        status: Option<&AnomalyStatus>,
        now: DateTime<Utc>,
    ) -> Result<DispatchTicket, EscalationError> {
        let indicators = status.map_or(0, |s| s.critical_indicator_count);
        info!(indicators, "Manual emergency alert requested");
        self.try_dispatch(Alert::manual(indicators), now)
    }

    /// Reserve the cooldown slot and launch the transport.
    pub(crate) fn try_dispatch(
        &self,
        alert: Alert,
        now: DateTime<Utc>,
    ) -> Result<DispatchTicket, EscalationError> {
        let previous = self.reserve(now).map_err(|e| {
            debug!(kind = %alert.kind, error = %e, "Emergency alert suppressed");
            e
        })?;
        Ok(self.launch(alert, now, previous))
    }

    /// Atomic cooldown check-and-set. Returns the replaced `last_alert_time`.
    fn reserve(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, EscalationError> {
        let mut state = self.lock();
        if let Some(remaining_secs) = state.cooldown_remaining(now, self.inner.cooldown) {
            state.alerts_suppressed += 1;
            return Err(EscalationError::CoolingDown { remaining_secs });
        }
        state.pending_dispatches += 1;
        Ok(state.last_alert_time.replace(now))
    }

    fn launch(
        &self,
        alert: Alert,
        attempt_at: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
    ) -> DispatchTicket {
        warn!(
            kind = %alert.kind,
            indicators = alert.critical_indicators,
            dispatcher = self.inner.dispatcher.name(),
            "Dispatching emergency alert"
        );

        let this = self.clone();
        let task_alert = alert.clone();
        let handle = tokio::spawn(async move {
            let outcome = this.deliver(&task_alert).await;
            this.complete(&task_alert, attempt_at, previous, outcome)
        });

        DispatchTicket {
            attempt_at,
            alert,
            handle,
        }
    }

    /// Call and text concurrently; delivered when either gets through.
    async fn deliver(&self, alert: &Alert) -> Result<(), String> {
        let shared = &self.inner;
        let voice = alert.voice_script();
        let call = shared.dispatcher.call(&shared.destination, &voice);

        if !shared.send_text {
            return call.await.map_err(|e| e.to_string());
        }

        let sms = alert.sms_text();
        let text = shared.dispatcher.send_text(&shared.destination, &sms);
        match futures::join!(call, text) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(()), Err(e)) => {
                warn!(error = %e, "Emergency SMS failed, call delivered");
                Ok(())
            }
            (Err(e), Ok(())) => {
                warn!(error = %e, "Emergency call failed, SMS delivered");
                Ok(())
            }
            (Err(call_err), Err(text_err)) => Err(format!("call: {call_err}; sms: {text_err}")),
        }
    }

    /// Reconcile a finished dispatch with the shared state.
    fn complete(
        &self,
        alert: &Alert,
        attempt_at: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
        outcome: Result<(), String>,
    ) -> bool {
        let mut state = self.lock();
        state.pending_dispatches = state.pending_dispatches.saturating_sub(1);
        let superseded = state.last_alert_time.is_some_and(|last| last > attempt_at);

        match outcome {
            Ok(()) => {
                state.alerts_sent += 1;
                if superseded {
                    debug!(%attempt_at, "Stale dispatch completion, newer alert already recorded");
                } else {
                    state.last_alert_time = Some(attempt_at);
                    state.triggered = true;
                    state.message.clone_from(&alert.message);
                }
                info!(kind = %alert.kind, "Emergency alert delivered");
                true
            }
            Err(error) => {
                state.dispatch_failures += 1;
                if state.last_alert_time == Some(attempt_at) {
                    state.last_alert_time = previous;
                }
                if !superseded {
                    state.message = format!("Emergency dispatch failed: {error}");
                }
                warn!(kind = %alert.kind, error = %error, "Emergency alert dispatch failed");
                false
            }
        }
    }

    /// Record a Critical-tier status in the current run.
    pub(crate) fn extend_run(&self) -> u32 {
        let mut state = self.lock();
        state.consecutive_critical_count = state.consecutive_critical_count.saturating_add(1);
        state.consecutive_critical_count
    }

    /// Non-critical status: the run is over. `last_alert_time` survives.
    pub(crate) fn reset_run(&self) {
        let mut state = self.lock();
        state.consecutive_critical_count = 0;
        state.triggered = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RecordingDispatcher;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn handle_with(dispatcher: Arc<RecordingDispatcher>) -> EscalationHandle {
        EscalationHandle::new(dispatcher, "+15550100", true, Duration::minutes(5))
    }

    #[tokio::test]
    async fn test_manual_trigger_dispatches_call_and_text() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let handle = handle_with(dispatcher.clone());

        let ticket = handle.trigger_manual(None, t0()).unwrap();
        assert!(ticket.completed().await);

        let deliveries = dispatcher.deliveries();
        assert_eq!(deliveries.len(), 2);
        assert!(deliveries.iter().all(|d| d.destination == "+15550100"));

        let state = handle.snapshot();
        assert!(state.triggered);
        assert_eq!(state.last_alert_time, Some(t0()));
        assert_eq!(state.alerts_sent, 1);
        assert_eq!(state.pending_dispatches, 0);
        assert!(state.message.starts_with("CRITICAL ALERT:"));
    }

    #[tokio::test]
    async fn test_manual_trigger_respects_cooldown() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let handle = handle_with(dispatcher.clone());

        handle.trigger_manual(None, t0()).unwrap().completed().await;
        let err = handle
            .trigger_manual(None, t0() + Duration::minutes(2))
            .unwrap_err();
        assert_eq!(err, EscalationError::CoolingDown { remaining_secs: 180 });

        // Exactly at the boundary is still cooling down
        assert!(handle.trigger_manual(None, t0() + Duration::minutes(5)).is_err());
        assert!(handle
            .trigger_manual(None, t0() + Duration::minutes(5) + Duration::seconds(1))
            .is_ok());
        assert_eq!(handle.snapshot().alerts_suppressed, 2);
    }

    #[tokio::test]
    async fn test_failed_dispatch_releases_reservation() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        dispatcher.set_failing(true);
        let handle = handle_with(dispatcher.clone());

        assert!(!handle.trigger_manual(None, t0()).unwrap().completed().await);
        let state = handle.snapshot();
        assert!(!state.triggered);
        assert_eq!(state.last_alert_time, None);
        assert_eq!(state.dispatch_failures, 1);
        assert!(state.message.starts_with("Emergency dispatch failed"));

        // Released slot can be used right away
        dispatcher.set_failing(false);
        assert!(handle
            .trigger_manual(None, t0() + Duration::seconds(10))
            .unwrap()
            .completed()
            .await);
    }

    #[tokio::test]
    async fn test_drain_waits_for_manual_delivery() {
        let dispatcher = Arc::new(
            RecordingDispatcher::new().with_delay(std::time::Duration::from_millis(100)),
        );
        let handle = handle_with(dispatcher.clone());

        let _ticket = handle.trigger_manual(None, t0()).unwrap();
        assert_eq!(handle.snapshot().pending_dispatches, 1);

        assert!(handle.drain(std::time::Duration::from_secs(5)).await);
        let state = handle.snapshot();
        assert_eq!(state.pending_dispatches, 0);
        assert_eq!(state.alerts_sent, 1);
        assert_eq!(dispatcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_drain_gives_up_at_deadline() {
        let dispatcher =
            Arc::new(RecordingDispatcher::new().with_delay(std::time::Duration::from_secs(5)));
        let handle = handle_with(dispatcher);

        let _ticket = handle.trigger_manual(None, t0()).unwrap();
        assert!(!handle.drain(std::time::Duration::from_millis(50)).await);

        // Idle handle drains immediately
        let idle = handle_with(Arc::new(RecordingDispatcher::new()));
        assert!(idle.drain(std::time::Duration::ZERO).await);
    }

    #[test]
    fn test_stale_success_does_not_overwrite_newer_alert() {
        let handle = handle_with(Arc::new(RecordingDispatcher::new()));
        let newer = t0() + Duration::minutes(10);
        {
            let mut state = handle.lock();
            state.last_alert_time = Some(newer);
            state.pending_dispatches = 1;
        }

        let alert = Alert::manual(2);
        assert!(handle.complete(&alert, t0(), None, Ok(())));
        let state = handle.snapshot();
        assert_eq!(state.last_alert_time, Some(newer));
        assert!(!state.triggered);
        assert_eq!(state.alerts_sent, 1);
    }

    #[test]
    fn test_stale_failure_keeps_newer_reservation() {
        let handle = handle_with(Arc::new(RecordingDispatcher::new()));
        let newer = t0() + Duration::minutes(10);
        handle.lock().last_alert_time = Some(newer);

        assert!(!handle.complete(&Alert::manual(2), t0(), None, Err("down".into())));
        assert_eq!(handle.snapshot().last_alert_time, Some(newer));
    }

    #[test]
    fn test_reset_run_preserves_last_alert_time() {
        let handle = handle_with(Arc::new(RecordingDispatcher::new()));
        {
            let mut state = handle.lock();
            state.last_alert_time = Some(t0());
            state.triggered = true;
        }
        assert_eq!(handle.extend_run(), 1);
        assert_eq!(handle.extend_run(), 2);
        handle.reset_run();

        let state = handle.snapshot();
        assert_eq!(state.consecutive_critical_count, 0);
        assert!(!state.triggered);
        assert_eq!(state.last_alert_time, Some(t0()));
    }
}
