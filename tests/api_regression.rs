//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! all /api/v1/* endpoints using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{Offset, Utc};
use tower::ServiceExt;

use factory_sentinel::api::{create_app, ApiState};
use factory_sentinel::config::SentinelConfig;
use factory_sentinel::dispatch::RecordingDispatcher;
use factory_sentinel::pipeline::PipelineCoordinator;
use factory_sentinel::processing::FixedJitter;
use factory_sentinel::types::Reading;

struct Harness {
    coordinator: PipelineCoordinator,
    dispatcher: Arc<RecordingDispatcher>,
}

impl Harness {
    fn new() -> Self {
        let mut config = SentinelConfig::default();
        config.notify.destination = "+15550100".to_string();
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let coordinator = PipelineCoordinator::new(&config, dispatcher.clone())
            .with_jitter(Box::new(FixedJitter(0.0)));
        Self {
            coordinator,
            dispatcher,
        }
    }

    fn state(&self) -> ApiState {
        ApiState {
            publisher: self.coordinator.publisher(),
            escalation: self.coordinator.escalation_handle(),
            classifier: self.coordinator.classifier(),
            escalation_config: SentinelConfig::default().escalation,
            feed_offset: Utc.fix(),
            started: std::time::Instant::now(),
        }
    }

    fn feed_calm(&mut self, count: usize) {
        let now = Utc::now();
        for i in 0..count {
            let reading = Reading::from_measurements(
                50.0,
                60.0,
                22.0 + i as f64,
                (0.1, 0.1, 0.1),
                Some(now),
            );
            self.coordinator.process_reading(reading, now);
        }
    }
}

async fn send(state: ApiState, request: Request<Body>) -> axum::response::Response {
    create_app(state).oneshot(request).await.unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// All v1 GET endpoints should return 200.
#[tokio::test]
async fn test_v1_get_endpoints_return_200() {
    let harness = Harness::new();

    let endpoints = [
        "/api/v1/health",
        "/api/v1/status",
        "/api/v1/history",
        "/api/v1/history/stats",
        "/api/v1/history/export.csv",
        "/api/v1/thresholds",
    ];

    for endpoint in &endpoints {
        let resp = send(harness.state(), get(endpoint)).await;
        assert!(
            resp.status().is_success(),
            "GET {endpoint} returned status {}",
            resp.status()
        );
    }
}

#[tokio::test]
async fn test_status_before_first_reading() {
    let harness = Harness::new();

    let resp = send(harness.state(), get("/api/v1/status")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["data"]["system_status"]["state"], "Loading");
    assert_eq!(json["data"]["system_status_text"], "Loading");
    assert!(json["data"]["latest_reading"].is_null());
    assert_eq!(json["data"]["escalation"]["phase"], "Idle");
    assert!(json["meta"]["timestamp"].is_string());
}

#[tokio::test]
async fn test_status_reflects_published_snapshot() {
    let mut harness = Harness::new();
    harness.feed_calm(3);

    let json = json_body(send(harness.state(), get("/api/v1/status")).await).await;
    assert_eq!(json["data"]["system_status"]["state"], "Monitoring");
    assert_eq!(json["data"]["events_processed"], 3);
    assert_eq!(json["data"]["history_len"], 3);
    assert_eq!(json["data"]["anomaly"]["tier"], "Normal");
    assert_eq!(json["data"]["latest_reading"]["temperature"], 24.0);
}

#[tokio::test]
async fn test_history_limit_returns_newest() {
    let mut harness = Harness::new();
    harness.feed_calm(4);

    let json = json_body(send(harness.state(), get("/api/v1/history?limit=2")).await).await;
    assert_eq!(json["data"]["total"], 4);
    let readings = json["data"]["readings"].as_array().unwrap();
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0]["temperature"], 24.0);
    assert_eq!(readings[1]["temperature"], 25.0);
}

#[tokio::test]
async fn test_history_stats_null_when_empty() {
    let harness = Harness::new();
    let json = json_body(send(harness.state(), get("/api/v1/history/stats")).await).await;
    assert!(json["data"].is_null());
}

#[tokio::test]
async fn test_history_stats_summarise_window() {
    let mut harness = Harness::new();
    harness.feed_calm(3);

    let json = json_body(send(harness.state(), get("/api/v1/history/stats")).await).await;
    assert_eq!(json["data"]["samples"], 3);
    assert_eq!(json["data"]["temperature"]["min"], 22.0);
    assert_eq!(json["data"]["temperature"]["max"], 24.0);
    assert_eq!(json["data"]["temperature"]["avg"], 23.0);
}

#[tokio::test]
async fn test_csv_export_headers_and_rows() {
    let mut harness = Harness::new();
    harness.feed_calm(2);

    let resp = send(harness.state(), get("/api/v1/history/export.csv")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let disposition = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"factory-sensor-data-"));
    assert!(disposition.ends_with(".csv\""));

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(body.to_vec()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Timestamp,Temperature,Humidity"));
}

#[tokio::test]
async fn test_emergency_call_then_cooldown() {
    let harness = Harness::new();

    let resp = send(harness.state(), post("/api/v1/emergency-call", "")).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let json = json_body(resp).await;
    assert_eq!(json["data"]["accepted"], true);
    assert_eq!(json["data"]["kind"], "manual");
    assert_eq!(json["data"]["critical_indicators"], 0);

    let resp = send(harness.state(), post("/api/v1/emergency-call", "")).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = json_body(resp).await;
    assert_eq!(json["error"]["code"], "COOLING_DOWN");

    // The first request's delivery was spawned; it lands shortly.
    for _ in 0..100 {
        if harness.dispatcher.call_count() == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(harness.dispatcher.call_count(), 1);

    let json = json_body(send(harness.state(), get("/api/v1/status")).await).await;
    assert_eq!(json["data"]["escalation"]["phase"], "CoolingDown");
    assert!(json["data"]["escalation"]["cooldown_remaining_secs"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_thresholds_report_canonical_limits() {
    let harness = Harness::new();
    let json = json_body(send(harness.state(), get("/api/v1/thresholds")).await).await;
    assert_eq!(json["data"]["thresholds"]["critical"]["temperature_limit"], 28.0);
    assert_eq!(json["data"]["thresholds"]["device"]["humidity_min"], 55.0);
    assert_eq!(json["data"]["escalation"]["cooldown_secs"], 300);
}

#[tokio::test]
async fn test_analyze_classifies_without_touching_pipeline() {
    let harness = Harness::new();
    let body = r#"{
        "decibel": "90 dB", "humidity": "70 %", "temperature": "29 °C",
        "vibration_x": "5", "vibration_y": "5", "vibration_z": "8",
        "relayState": 0, "is_anomaly": 1, "timestamp": "2026-03-01 08:00:00"
    }"#;

    let resp = send(harness.state(), post("/api/v1/analyze", body)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["data"]["status"]["tier"], "Critical");
    assert_eq!(json["data"]["status"]["critical_indicator_count"], 4);
    assert_eq!(json["data"]["reading"]["decibel"], 90.0);

    let status = json_body(send(harness.state(), get("/api/v1/status")).await).await;
    assert_eq!(status["data"]["events_processed"], 0);
    assert_eq!(harness.dispatcher.call_count(), 0);
}

#[tokio::test]
async fn test_analyze_rejects_malformed_body() {
    let harness = Harness::new();
    let resp = send(harness.state(), post("/api/v1/analyze", "not json")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = json_body(resp).await;
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}
