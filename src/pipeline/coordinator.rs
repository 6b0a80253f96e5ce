//! Pipeline Coordinator - per-event processing sequence
//!
//! ```text
//! STEP 1: Payload selection (latest buffered entry)
//! STEP 2: Normalization + derived vibration magnitude
//! STEP 3: Anomaly classification
//! STEP 4: History window append + trim
//! STEP 5: Escalation state machine (dispatch is spawned, never awaited)
//! STEP 6: Failure prediction over the window snapshot
//! STEP 7: Snapshot publication
//! ```
//!
//! Steps 1-7 run synchronously for each event; nothing here awaits.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, info, warn};

use super::state::{PipelineSnapshot, SnapshotPublisher, SystemStatus};
use crate::acquisition::{normalize, FeedError, FeedPayload};
use crate::config::SentinelConfig;
use crate::dispatch::AlertDispatcher;
use crate::escalation::{EscalationEngine, EscalationHandle, EscalationOutcome};
use crate::processing::{AnomalyClassifier, FailurePredictor, HistoryWindow, JitterSource};
use crate::types::{AnomalyStatus, FailurePrediction, RawReading, Reading, Tier};

/// Result of processing one reading.
#[derive(Debug)]
pub struct PipelineUpdate {
    pub reading: Reading,
    pub status: AnomalyStatus,
    pub prediction: FailurePrediction,
    pub escalation: EscalationOutcome,
}

/// Pipeline Coordinator owns all per-feed state.
pub struct PipelineCoordinator {
    /// Offset applied to naive feed timestamps
    offset: FixedOffset,
    classifier: AnomalyClassifier,
    history: HistoryWindow,
    predictor: FailurePredictor,
    escalation: EscalationEngine,
    publisher: SnapshotPublisher,
    latest: Option<(Reading, AnomalyStatus, FailurePrediction)>,
    /// Statistics
    events_processed: u64,
    faults: u64,
    critical_readings: u64,
    alerts_dispatched: u64,
    alerts_suppressed: u64,
}

impl std::fmt::Debug for PipelineCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineCoordinator")
            .field("offset", &self.offset)
            .field("history_len", &self.history.len())
            .field("events_processed", &self.events_processed)
            .finish_non_exhaustive()
    }
}

impl PipelineCoordinator {
    /// Create a coordinator from configuration.
    pub fn new(config: &SentinelConfig, dispatcher: Arc<dyn AlertDispatcher>) -> Self {
        info!(
            dispatcher = dispatcher.name(),
            cooldown_secs = config.escalation.cooldown_secs,
            window_minutes = config.history.window_minutes,
            "Initializing Pipeline Coordinator"
        );

        let handle = EscalationHandle::new(
            dispatcher,
            config.notify.destination.clone(),
            config.notify.send_text,
            config.escalation.cooldown(),
        );

        Self {
            offset: config.feed.offset(),
            classifier: AnomalyClassifier::new(config.thresholds),
            history: HistoryWindow::new(&config.history),
            predictor: FailurePredictor::default(),
            escalation: EscalationEngine::new(handle, config.escalation),
            publisher: SnapshotPublisher::new(),
            latest: None,
            events_processed: 0,
            faults: 0,
            critical_readings: 0,
            alerts_dispatched: 0,
            alerts_suppressed: 0,
        }
    }

    /// Replace the confidence jitter source (deterministic tests, replays).
    #[must_use]
    pub fn with_jitter(mut self, jitter: Box<dyn JitterSource>) -> Self {
        self.predictor = FailurePredictor::new(jitter);
        self
    }

    /// Handle for the manual trigger and state observers.
    pub fn escalation_handle(&self) -> EscalationHandle {
        self.escalation.handle().clone()
    }

    pub fn publisher(&self) -> SnapshotPublisher {
        self.publisher.clone()
    }

    pub fn classifier(&self) -> AnomalyClassifier {
        self.classifier
    }

    pub fn feed_offset(&self) -> FixedOffset {
        self.offset
    }

    /// Process one feed push. Buffered pushes contribute only their latest
    /// entry.
    pub fn process_payload(
        &mut self,
        payload: FeedPayload,
        now: DateTime<Utc>,
    ) -> Result<PipelineUpdate, FeedError> {
        let buffered = payload.len();
        let raw = payload.into_latest(self.offset)?;
        if buffered > 1 {
            debug!(buffered, "Selected latest entry from buffered push");
        }
        Ok(self.process_raw(&raw, now))
    }

    pub fn process_raw(&mut self, raw: &RawReading, now: DateTime<Utc>) -> PipelineUpdate {
        self.process_reading(normalize(raw, self.offset), now)
    }

    /// Run one normalized reading through classification, history,
    /// escalation and prediction, then publish a snapshot.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn process_reading(&mut self, reading: Reading, now: DateTime<Utc>) -> PipelineUpdate {
        self.events_processed += 1;

        let status = self.classifier.classify(&reading);
        debug!(
            tier = %status.tier,
            severity = %status.severity,
            indicators = status.critical_indicator_count,
            upstream = status.upstream_anomaly,
            "Reading classified"
        );
        if status.tier == Tier::Critical {
            self.critical_readings += 1;
        }

        self.history.append(reading.clone(), now);

        let escalation = self.escalation.evaluate(&status, now);
        match &escalation {
            EscalationOutcome::Dispatched(_) => self.alerts_dispatched += 1,
            EscalationOutcome::Suppressed { remaining_secs, .. } => {
                self.alerts_suppressed += 1;
                debug!(remaining_secs, "Escalation suppressed by cooldown");
            }
            EscalationOutcome::Reset | EscalationOutcome::Tracking { .. } => {}
        }

        let history = Arc::new(self.history.snapshot());
        let prediction = self.predictor.predict(&status, &history);

        self.latest = Some((reading.clone(), status, prediction));
        self.publish(history, SystemStatus::Monitoring, now);

        PipelineUpdate {
            reading,
            status,
            prediction,
            escalation,
        }
    }

    /// Record a feed fault. Data already shown stays visible.
    pub fn record_fault(&mut self, error: &FeedError, now: DateTime<Utc>) {
        self.faults += 1;
        let system_status = match error {
            FeedError::Empty => {
                debug!("Feed push carried no data");
                SystemStatus::NoData
            }
            FeedError::Malformed(detail) => {
                warn!(error = %detail, "Malformed feed payload");
                SystemStatus::Error(error.to_string())
            }
            FeedError::Connection(detail) => {
                warn!(error = %detail, "Feed connection error");
                SystemStatus::Error(error.to_string())
            }
        };
        let history = Arc::new(self.history.snapshot());
        self.publish(history, system_status, now);
    }

    fn publish(&self, history: Arc<Vec<Reading>>, system_status: SystemStatus, now: DateTime<Utc>) {
        let (latest_reading, status, prediction) = match &self.latest {
            Some((reading, status, prediction)) => (Some(reading.clone()), Some(*status), Some(*prediction)),
            None => (None, None, None),
        };
        self.publisher.publish(PipelineSnapshot {
            latest_reading,
            status,
            prediction,
            history,
            system_status,
            events_processed: self.events_processed,
            faults: self.faults,
            updated_at: Some(now),
        });
    }

    /// Get pipeline statistics
    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            events_processed: self.events_processed,
            faults: self.faults,
            critical_readings: self.critical_readings,
            alerts_dispatched: self.alerts_dispatched,
            alerts_suppressed: self.alerts_suppressed,
            history_len: self.history.len(),
        }
    }
}

/// Pipeline statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub events_processed: u64,
    pub faults: u64,
    pub critical_readings: u64,
    pub alerts_dispatched: u64,
    pub alerts_suppressed: u64,
    pub history_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RecordingDispatcher;
    use crate::processing::FixedJitter;
    use crate::types::PredictionTier;
    use chrono::TimeZone;
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn coordinator() -> PipelineCoordinator {
        PipelineCoordinator::new(&SentinelConfig::default(), Arc::new(RecordingDispatcher::new()))
            .with_jitter(Box::new(FixedJitter(0.0)))
    }

    #[tokio::test]
    async fn test_calm_payload_publishes_monitoring_snapshot() {
        let mut c = coordinator();
        let payload = FeedPayload::from_json(json!({
            "decibel": "50 dB", "humidity": "60 %", "temperature": "22 °C",
            "vibration_x": "0", "vibration_y": "0", "vibration_z": "0",
            "relayState": 1, "is_anomaly": 0, "timestamp": "2026-03-01 08:00:00"
        }))
        .unwrap();

        let update = c.process_payload(payload, t0()).unwrap();
        assert_eq!(update.status.tier, Tier::Normal);
        assert_eq!(update.prediction.tier, PredictionTier::Normal);
        assert_eq!(update.prediction.confidence, 0.9);

        let snapshot = c.publisher().load();
        assert_eq!(snapshot.system_status, SystemStatus::Monitoring);
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.events_processed, 1);
        assert!(snapshot.latest_reading.as_ref().unwrap().relay_state);
    }

    #[tokio::test]
    async fn test_faults_keep_last_reading_visible() {
        let mut c = coordinator();
        c.process_reading(Reading::from_measurements(50.0, 60.0, 22.0, (0.0, 0.0, 0.0), Some(t0())), t0());

        c.record_fault(&FeedError::Empty, t0());
        assert_eq!(c.publisher().load().system_status, SystemStatus::NoData);

        c.record_fault(&FeedError::Connection("socket closed".into()), t0());
        let snapshot = c.publisher().load();
        assert!(matches!(snapshot.system_status, SystemStatus::Error(ref m) if m.contains("socket closed")));
        assert!(snapshot.latest_reading.is_some());
        assert_eq!(snapshot.faults, 2);

        // Next good event clears the error
        c.process_reading(Reading::from_measurements(50.0, 60.0, 22.0, (0.0, 0.0, 0.0), Some(t0())), t0());
        assert_eq!(c.publisher().load().system_status, SystemStatus::Monitoring);
    }

    #[tokio::test]
    async fn test_empty_buffered_payload_is_rejected() {
        let mut c = coordinator();
        let payload = FeedPayload::Buffered(std::collections::BTreeMap::new());
        assert_eq!(c.process_payload(payload, t0()).unwrap_err(), FeedError::Empty);
        assert_eq!(c.get_stats().events_processed, 0);
    }

    #[tokio::test]
    async fn test_stats_track_escalation() {
        let mut c = coordinator();
        let critical = Reading::from_measurements(90.0, 60.0, 29.0, (5.0, 5.0, 8.0), Some(t0()))
            .with_upstream_anomaly(true);
        for _ in 0..4 {
            c.process_reading(critical.clone(), t0());
        }
        let stats = c.get_stats();
        assert_eq!(stats.critical_readings, 4);
        assert_eq!(stats.alerts_dispatched, 1);
        assert_eq!(stats.alerts_suppressed, 2);
        assert_eq!(stats.history_len, 4);
    }
}
