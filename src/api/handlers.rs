//! API route handlers
//!
//! Every handler reads the latest published [`PipelineSnapshot`]; none of
//! them block the ingestion loop. The manual emergency trigger goes through
//! the shared [`EscalationHandle`] and is therefore subject to the same
//! cooldown as automatic alerts.

use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::acquisition::{normalize, FeedPayload};
use crate::config::{EscalationConfig, ThresholdConfig};
use crate::escalation::{EscalationError, EscalationHandle};
use crate::export::{export_filename, to_csv};
use crate::pipeline::{PipelineSnapshot, SnapshotPublisher, SystemStatus};
use crate::processing::{AnomalyClassifier, WindowStats};
use crate::types::{AnomalyStatus, EscalationPhase, EscalationState, FailurePrediction, Reading};

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Debug, Clone)]
pub struct ApiState {
    /// Latest pipeline snapshot
    pub publisher: SnapshotPublisher,
    /// Escalation state and manual trigger
    pub escalation: EscalationHandle,
    /// Classifier for the stateless analysis endpoint
    pub classifier: AnomalyClassifier,
    /// Escalation tuning, reported alongside thresholds
    pub escalation_config: EscalationConfig,
    /// Offset applied to naive timestamps in posted readings
    pub feed_offset: FixedOffset,
    pub started: Instant,
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub system_status: SystemStatus,
    pub dispatcher: &'static str,
}

/// GET /api/v1/health
pub async fn get_health(State(state): State<ApiState>) -> Response {
    let snapshot = state.publisher.load();
    ApiResponse::ok(HealthResponse {
        status: "ok",
        uptime_secs: state.started.elapsed().as_secs(),
        system_status: snapshot.system_status.clone(),
        dispatcher: state.escalation.dispatcher_name(),
    })
}

// ============================================================================
// Status
// ============================================================================

/// Escalation view with derived phase and cooldown.
#[derive(Debug, Serialize)]
pub struct EscalationView {
    pub phase: EscalationPhase,
    /// Seconds until another alert may be dispatched
    pub cooldown_remaining_secs: Option<i64>,
    #[serde(flatten)]
    pub state: EscalationState,
}

impl EscalationView {
    fn at(handle: &EscalationHandle, now: DateTime<Utc>) -> Self {
        let state = handle.snapshot();
        Self {
            phase: state.phase(now, handle.cooldown()),
            cooldown_remaining_secs: state.cooldown_remaining(now, handle.cooldown()),
            state,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub system_status: SystemStatus,
    /// Human-readable system status
    pub system_status_text: String,
    pub latest_reading: Option<Reading>,
    pub anomaly: Option<AnomalyStatus>,
    pub prediction: Option<FailurePrediction>,
    pub escalation: EscalationView,
    pub history_len: usize,
    pub events_processed: u64,
    pub faults: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StatusResponse {
    fn from_snapshot(snapshot: &PipelineSnapshot, escalation: EscalationView) -> Self {
        Self {
            system_status: snapshot.system_status.clone(),
            system_status_text: snapshot.system_status.to_string(),
            latest_reading: snapshot.latest_reading.clone(),
            anomaly: snapshot.status,
            prediction: snapshot.prediction,
            escalation,
            history_len: snapshot.history.len(),
            events_processed: snapshot.events_processed,
            faults: snapshot.faults,
            updated_at: snapshot.updated_at,
        }
    }
}

/// GET /api/v1/status
pub async fn get_status(State(state): State<ApiState>) -> Response {
    let snapshot = state.publisher.load();
    let escalation = EscalationView::at(&state.escalation, Utc::now());
    ApiResponse::ok(StatusResponse::from_snapshot(&snapshot, escalation))
}

// ============================================================================
// History
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Return only the newest `limit` readings
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Readings in the window
    pub total: usize,
    /// Returned readings, oldest first
    pub readings: Vec<Reading>,
}

/// GET /api/v1/history?limit=N
pub async fn get_history(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let snapshot = state.publisher.load();
    let total = snapshot.history.len();
    let skip = query.limit.map_or(0, |limit| total.saturating_sub(limit));
    ApiResponse::ok(HistoryResponse {
        total,
        readings: snapshot.history[skip..].to_vec(),
    })
}

/// GET /api/v1/history/stats - `data` is null for an empty window
pub async fn get_history_stats(State(state): State<ApiState>) -> Response {
    let snapshot = state.publisher.load();
    ApiResponse::ok(WindowStats::compute(&snapshot.history))
}

/// GET /api/v1/history/export.csv
pub async fn export_history_csv(State(state): State<ApiState>) -> Response {
    let snapshot = state.publisher.load();
    let body = to_csv(&snapshot.history);
    let disposition = format!("attachment; filename=\"{}\"", export_filename(Utc::now()));
    info!(rows = snapshot.history.len(), "History exported as CSV");
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

// ============================================================================
// Emergency
// ============================================================================

#[derive(Debug, Serialize)]
pub struct EmergencyCallResponse {
    pub accepted: bool,
    pub kind: String,
    pub message: String,
    pub critical_indicators: u8,
    pub attempt_at: DateTime<Utc>,
}

/// POST /api/v1/emergency-call - manual trigger
///
/// Delivery runs in the background; its outcome shows up in
/// `/status` as the escalation message.
pub async fn trigger_emergency_call(State(state): State<ApiState>) -> Response {
    let snapshot = state.publisher.load();
    match state
        .escalation
        .trigger_manual(snapshot.status.as_ref(), Utc::now())
    {
        Ok(ticket) => ApiResponse::accepted(EmergencyCallResponse {
            accepted: true,
            kind: ticket.alert.kind.to_string(),
            message: ticket.alert.message.clone(),
            critical_indicators: ticket.alert.critical_indicators,
            attempt_at: ticket.attempt_at,
        }),
        Err(e @ EscalationError::CoolingDown { .. }) => {
            warn!(error = %e, "Manual emergency alert rejected");
            ApiErrorResponse::too_many_requests(e.to_string())
        }
    }
}

// ============================================================================
// Thresholds
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ThresholdsResponse {
    pub thresholds: ThresholdConfig,
    pub escalation: EscalationConfig,
}

/// GET /api/v1/thresholds
pub async fn get_thresholds(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(ThresholdsResponse {
        thresholds: *state.classifier.thresholds(),
        escalation: state.escalation_config,
    })
}

// ============================================================================
// Stateless Analysis
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub reading: Reading,
    pub status: AnomalyStatus,
}

/// POST /api/v1/analyze - classify a posted feed payload without touching
/// pipeline state
pub async fn analyze_reading(State(state): State<ApiState>, body: String) -> Response {
    let raw = match FeedPayload::parse_str(&body).and_then(|p| p.into_latest(state.feed_offset)) {
        Ok(raw) => raw,
        Err(e) => return ApiErrorResponse::bad_request(e.to_string()),
    };
    let reading = normalize(&raw, state.feed_offset);
    let status = state.classifier.classify(&reading);
    ApiResponse::ok(AnalyzeResponse { reading, status })
}
