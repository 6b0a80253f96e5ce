//! API route definitions
//!
//! - /api/v1/health - liveness and feed status
//! - /api/v1/status - latest reading, classification, prediction, escalation
//! - /api/v1/history - window contents, stats and CSV export
//! - /api/v1/emergency-call - manual alert (429 while cooling down)
//! - /api/v1/thresholds - active classification and escalation limits
//! - /api/v1/analyze - stateless classification of a posted payload

use axum::{routing::{get, post}, Router};

use super::handlers::{self, ApiState};

/// Create all API routes
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/status", get(handlers::get_status))
        .route("/history", get(handlers::get_history))
        .route("/history/stats", get(handlers::get_history_stats))
        .route("/history/export.csv", get(handlers::export_history_csv))
        .route("/emergency-call", post(handlers::trigger_emergency_call))
        .route("/thresholds", get(handlers::get_thresholds))
        .route("/analyze", post(handlers::analyze_reading))
        .with_state(state)
}
