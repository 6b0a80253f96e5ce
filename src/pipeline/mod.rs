//! Processing Pipeline Module
//!
//! ```text
//! FeedSource ──► ProcessingLoop ──► PipelineCoordinator ──► SnapshotPublisher
//!                                          │
//!                                          └──► EscalationEngine ──► AlertDispatcher (spawned)
//! ```
//!
//! A single consumer processes events strictly in arrival order. Readers
//! (the HTTP API) only ever see complete published snapshots.

mod state;
mod coordinator;
pub mod source;
pub mod processing_loop;

pub use state::*;
pub use coordinator::{PipelineCoordinator, PipelineStats, PipelineUpdate};
pub use processing_loop::ProcessingLoop;
