//! Factory Sentinel: industrial telemetry anomaly monitoring
//!
//! Turns a stream of multi-sensor readings (sound, humidity, temperature,
//! three-axis vibration) into per-reading decisions and, when a run of
//! confirmed critical readings persists, an emergency call and text.
//!
//! ## Architecture
//!
//! - **Acquisition**: feed payload decoding and value normalization
//! - **Processing**: anomaly classification, history window, failure prediction
//! - **Escalation**: consecutive-critical state machine with a shared cooldown
//! - **Dispatch**: outbound voice call / SMS transports
//! - **Pipeline**: single-consumer event loop and published snapshots
//! - **API**: REST views, CSV export and the manual emergency trigger

pub mod config;
pub mod types;
pub mod acquisition;
pub mod processing;
pub mod escalation;
pub mod dispatch;
pub mod export;
pub mod pipeline;
pub mod api;
pub mod simulation;

// Re-export configuration
pub use config::SentinelConfig;

// Re-export commonly used types
pub use types::{
    AnomalyStatus, EscalationPhase, EscalationState, FailurePrediction, PredictionTier,
    RawField, RawReading, Reading, Severity, Tier,
};

// Re-export pipeline components
pub use acquisition::{normalize, FeedError, FeedPayload};
pub use processing::{AnomalyClassifier, FailurePredictor, HistoryWindow, WindowStats};
pub use escalation::{EscalationEngine, EscalationError, EscalationHandle, EscalationOutcome};
pub use dispatch::{build_dispatcher, AlertDispatcher, DispatchError};
pub use pipeline::{PipelineCoordinator, PipelineSnapshot, PipelineStats, SystemStatus};
