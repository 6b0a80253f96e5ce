//! Published pipeline state and system status
//!
//! The pipeline is the only writer. After every event it publishes a fresh
//! immutable [`PipelineSnapshot`]; API handlers and other observers load the
//! current `Arc` without blocking ingestion.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AnomalyStatus, FailurePrediction, Reading};

/// System operational status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message")]
pub enum SystemStatus {
    /// Waiting for the first feed event
    Loading,
    /// Receiving data
    Monitoring,
    /// The feed answered but carried no data
    NoData,
    /// Feed or processing error; persists until the next good event
    Error(String),
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemStatus::Loading => write!(f, "Loading"),
            SystemStatus::Monitoring => write!(f, "Monitoring"),
            SystemStatus::NoData => write!(f, "No Data"),
            SystemStatus::Error(message) => write!(f, "Error: {}", message),
        }
    }
}

/// Immutable view of the pipeline after one event.
#[derive(Debug, Clone)]
pub struct PipelineSnapshot {
    pub latest_reading: Option<Reading>,
    pub status: Option<AnomalyStatus>,
    pub prediction: Option<FailurePrediction>,
    /// History window, oldest first
    pub history: Arc<Vec<Reading>>,
    pub system_status: SystemStatus,
    pub events_processed: u64,
    pub faults: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for PipelineSnapshot {
    fn default() -> Self {
        Self {
            latest_reading: None,
            status: None,
            prediction: None,
            history: Arc::new(Vec::new()),
            system_status: SystemStatus::Loading,
            events_processed: 0,
            faults: 0,
            updated_at: None,
        }
    }
}

/// Lock-free single-writer snapshot cell.
#[derive(Debug, Clone, Default)]
pub struct SnapshotPublisher {
    current: Arc<ArcSwap<PipelineSnapshot>>,
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<PipelineSnapshot> {
        self.current.load_full()
    }

    pub fn publish(&self, snapshot: PipelineSnapshot) {
        self.current.store(Arc::new(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_default_is_loading() {
        let snapshot = PipelineSnapshot::default();
        assert_eq!(snapshot.system_status, SystemStatus::Loading);
        assert!(snapshot.history.is_empty());
        assert!(snapshot.latest_reading.is_none());
    }

    #[test]
    fn test_system_status_display() {
        assert_eq!(format!("{}", SystemStatus::Loading), "Loading");
        assert_eq!(format!("{}", SystemStatus::Monitoring), "Monitoring");
        assert_eq!(format!("{}", SystemStatus::NoData), "No Data");
        assert_eq!(
            format!("{}", SystemStatus::Error("feed down".into())),
            "Error: feed down"
        );
    }

    #[test]
    fn test_system_status_serialization() {
        let json = serde_json::to_value(SystemStatus::Error("x".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "Error", "message": "x" }));
        let json = serde_json::to_value(SystemStatus::Monitoring).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "Monitoring" }));
    }

    #[test]
    fn test_publisher_readers_see_latest() {
        let publisher = SnapshotPublisher::new();
        let reader = publisher.clone();
        let before = reader.load();

        publisher.publish(PipelineSnapshot {
            events_processed: 7,
            system_status: SystemStatus::Monitoring,
            ..PipelineSnapshot::default()
        });

        assert_eq!(before.events_processed, 0);
        assert_eq!(reader.load().events_processed, 7);
    }
}
