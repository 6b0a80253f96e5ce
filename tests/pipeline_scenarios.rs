//! End-to-end pipeline scenarios
//!
//! Drive a real `PipelineCoordinator` with feed payloads and observe the
//! published snapshot, the escalation state and the recorded deliveries.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

use factory_sentinel::config::SentinelConfig;
use factory_sentinel::dispatch::{Channel, RecordingDispatcher};
use factory_sentinel::escalation::EscalationOutcome;
use factory_sentinel::pipeline::{PipelineCoordinator, SystemStatus};
use factory_sentinel::processing::FixedJitter;
use factory_sentinel::{FeedPayload, PredictionTier, Tier};

const DESTINATION: &str = "+15550100";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

fn config() -> SentinelConfig {
    let mut config = SentinelConfig::default();
    config.notify.destination = DESTINATION.to_string();
    config
}

fn coordinator(dispatcher: Arc<RecordingDispatcher>) -> PipelineCoordinator {
    PipelineCoordinator::new(&config(), dispatcher).with_jitter(Box::new(FixedJitter(0.0)))
}

/// Loud, hot, shaking, humidity in band, upstream flag set: 3 indicators.
fn critical_payload(at: DateTime<Utc>) -> FeedPayload {
    FeedPayload::from_json(json!({
        "decibel": "90 dB",
        "humidity": "60 %",
        "temperature": "29 °C",
        "vibration_x": "5",
        "vibration_y": "5",
        "vibration_z": "8",
        "relayState": 0,
        "is_anomaly": 1,
        "timestamp": at.format("%Y-%m-%d %H:%M:%S").to_string()
    }))
    .unwrap()
}

fn calm_payload(at: DateTime<Utc>) -> FeedPayload {
    FeedPayload::from_json(json!({
        "decibel": "50 dB",
        "humidity": "60 %",
        "temperature": "22 °C",
        "vibration_x": "0.1",
        "vibration_y": "0.1",
        "vibration_z": "0.1",
        "relayState": 1,
        "is_anomaly": 0,
        "timestamp": at.format("%Y-%m-%d %H:%M:%S").to_string()
    }))
    .unwrap()
}

#[tokio::test]
async fn test_sustained_critical_run_alerts_once() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let mut pipeline = coordinator(Arc::clone(&dispatcher));
    let handle = pipeline.escalation_handle();

    let mut tickets = Vec::new();
    let mut outcomes = Vec::new();
    for i in 0..4 {
        let at = t0() + Duration::seconds(5 * i);
        let update = pipeline.process_payload(critical_payload(at), at).unwrap();
        assert_eq!(update.status.tier, Tier::Critical);
        assert_eq!(update.status.critical_indicator_count, 3);
        // Critical tier falls through to the trend rule; too few samples yet
        assert_eq!(update.prediction.tier, PredictionTier::Normal);
        match update.escalation {
            EscalationOutcome::Dispatched(ticket) => {
                outcomes.push("dispatched");
                tickets.push(ticket);
            }
            EscalationOutcome::Tracking { .. } => outcomes.push("tracking"),
            EscalationOutcome::Suppressed { .. } => outcomes.push("suppressed"),
            EscalationOutcome::Reset => outcomes.push("reset"),
        }
    }
    assert_eq!(outcomes, ["tracking", "dispatched", "suppressed", "suppressed"]);

    let ticket = tickets.pop().unwrap();
    assert_eq!(ticket.attempt_at, t0() + Duration::seconds(5));
    assert!(ticket.alert.message.starts_with("AUTOMATIC EMERGENCY ALERT: 2 consecutive"));
    assert!(ticket.completed().await);

    let deliveries = dispatcher.deliveries();
    assert_eq!(deliveries.len(), 2);
    let call = deliveries.iter().find(|d| d.channel == Channel::Call).unwrap();
    assert_eq!(call.destination, DESTINATION);
    assert!(call.message.contains("3 out of 4 critical sensor failures"));
    let text = deliveries.iter().find(|d| d.channel == Channel::Text).unwrap();
    assert!(text.message.starts_with("FACTORY ALERT: 3/4"));

    let state = handle.snapshot();
    assert!(state.triggered);
    assert_eq!(state.consecutive_critical_count, 4);
    assert_eq!(state.last_alert_time, Some(t0() + Duration::seconds(5)));

    // Calm reading resets the run but keeps the cooldown anchor
    let at = t0() + Duration::seconds(20);
    let update = pipeline.process_payload(calm_payload(at), at).unwrap();
    assert!(matches!(update.escalation, EscalationOutcome::Reset));
    let state = handle.snapshot();
    assert_eq!(state.consecutive_critical_count, 0);
    assert_eq!(state.last_alert_time, Some(t0() + Duration::seconds(5)));

    let snapshot = pipeline.publisher().load();
    assert_eq!(snapshot.history.len(), 5);
    assert_eq!(snapshot.system_status, SystemStatus::Monitoring);
}

#[tokio::test]
async fn test_buffered_push_processes_latest_entry_only() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let mut pipeline = coordinator(dispatcher);

    let payload = FeedPayload::from_json(json!({
        "-N001": { "decibel": "50 dB", "temperature": "22", "timestamp": "2026-03-01 08:00:00" },
        "-N002": { "decibel": "55 dB", "temperature": "22", "timestamp": "2026-03-01 08:00:05" },
        "-N003": { "decibel": "61 dB", "temperature": "22", "timestamp": "2026-03-01 08:00:10" }
    }))
    .unwrap();

    let update = pipeline.process_payload(payload, t0()).unwrap();
    assert_eq!(update.reading.decibel, 61.0);
    assert_eq!(update.reading.raw_timestamp, "2026-03-01 08:00:10");

    let snapshot = pipeline.publisher().load();
    assert_eq!(snapshot.history.len(), 1);
    assert_eq!(snapshot.events_processed, 1);
}

#[tokio::test]
async fn test_cooldown_window_spans_five_minutes() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let mut pipeline = coordinator(Arc::clone(&dispatcher));

    pipeline.process_payload(critical_payload(t0()), t0()).unwrap();
    let first = pipeline.process_payload(critical_payload(t0()), t0()).unwrap();
    let EscalationOutcome::Dispatched(ticket) = first.escalation else {
        panic!("expected first alert to dispatch");
    };
    assert!(ticket.completed().await);

    let later = t0() + Duration::minutes(4);
    let update = pipeline.process_payload(critical_payload(later), later).unwrap();
    assert!(matches!(
        update.escalation,
        EscalationOutcome::Suppressed { remaining_secs: 60, .. }
    ));

    let after = t0() + Duration::minutes(6);
    let update = pipeline.process_payload(critical_payload(after), after).unwrap();
    let EscalationOutcome::Dispatched(ticket) = update.escalation else {
        panic!("expected alert after cooldown");
    };
    assert!(ticket.completed().await);
    assert_eq!(dispatcher.call_count(), 2);
    assert_eq!(pipeline.get_stats().alerts_dispatched, 2);
    assert_eq!(pipeline.get_stats().alerts_suppressed, 1);
}

#[tokio::test]
async fn test_failed_dispatch_is_reported_and_retryable() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    dispatcher.set_failing(true);
    let mut pipeline = coordinator(Arc::clone(&dispatcher));
    let handle = pipeline.escalation_handle();

    pipeline.process_payload(critical_payload(t0()), t0()).unwrap();
    let update = pipeline.process_payload(critical_payload(t0()), t0()).unwrap();
    let EscalationOutcome::Dispatched(ticket) = update.escalation else {
        panic!("expected dispatch attempt");
    };
    assert!(!ticket.completed().await);

    let state = handle.snapshot();
    assert_eq!(state.last_alert_time, None);
    assert!(state.message.starts_with("Emergency dispatch failed"));

    // Transport recovers; the next qualifying reading goes straight out
    dispatcher.set_failing(false);
    let at = t0() + Duration::seconds(5);
    let update = pipeline.process_payload(critical_payload(at), at).unwrap();
    assert!(update.escalation.is_dispatched());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_manual_and_automatic_race_sends_one_alert() {
    let dispatcher =
        Arc::new(RecordingDispatcher::new().with_delay(StdDuration::from_millis(50)));
    let mut pipeline = coordinator(Arc::clone(&dispatcher));
    let handle = pipeline.escalation_handle();

    pipeline.process_payload(critical_payload(t0()), t0()).unwrap();

    let barrier = Arc::new(tokio::sync::Barrier::new(2));

    let auto_barrier = Arc::clone(&barrier);
    let automatic = tokio::spawn(async move {
        auto_barrier.wait().await;
        let update = pipeline.process_payload(critical_payload(t0()), t0()).unwrap();
        match update.escalation {
            EscalationOutcome::Dispatched(ticket) => Some(ticket),
            _ => None,
        }
    });

    let manual_handle = handle.clone();
    let manual = tokio::spawn(async move {
        barrier.wait().await;
        manual_handle.trigger_manual(None, t0()).ok()
    });

    let automatic = automatic.await.unwrap();
    let manual = manual.await.unwrap();
    assert!(
        automatic.is_some() ^ manual.is_some(),
        "exactly one of the two triggers may dispatch"
    );

    for ticket in automatic.into_iter().chain(manual) {
        assert!(ticket.completed().await);
    }
    assert_eq!(dispatcher.call_count(), 1);
    assert_eq!(handle.snapshot().last_alert_time, Some(t0()));
}

#[tokio::test]
async fn test_feed_faults_surface_in_snapshot() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let mut pipeline = coordinator(dispatcher);

    let empty = FeedPayload::parse_str("{}").unwrap_err();
    pipeline.record_fault(&empty, t0());
    assert_eq!(pipeline.publisher().load().system_status, SystemStatus::NoData);

    pipeline.process_payload(calm_payload(t0()), t0()).unwrap();
    assert_eq!(pipeline.publisher().load().system_status, SystemStatus::Monitoring);
}

#[tokio::test]
async fn test_partial_records_and_odd_timestamps_still_flow() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let mut pipeline = coordinator(dispatcher);

    // No decibel field: still one record, missing values read as zero
    let payload = FeedPayload::from_json(json!({ "temperature": "23 °C", "humidity": "58" })).unwrap();
    let update = pipeline.process_payload(payload, t0()).unwrap();
    assert_eq!(update.reading.temperature, 23.0);
    assert_eq!(update.reading.decibel, 0.0);

    // Epoch-number timestamp: the reading is kept, only its time is unknown
    let payload = FeedPayload::from_json(json!({
        "decibel": "51 dB",
        "temperature": "23",
        "timestamp": 1_772_352_000
    }))
    .unwrap();
    let update = pipeline.process_payload(payload, t0()).unwrap();
    assert_eq!(update.reading.decibel, 51.0);
    assert!(update.reading.timestamp.is_none());

    let snapshot = pipeline.publisher().load();
    assert_eq!(snapshot.history.len(), 2);
    assert_eq!(snapshot.events_processed, 2);
    assert_eq!(snapshot.system_status, SystemStatus::Monitoring);
}
