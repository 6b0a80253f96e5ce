//! Event loop shared across all input modes.
//!
//! One consumer drains a [`FeedSource`] in arrival order and hands every
//! event to the [`PipelineCoordinator`]. Events are never processed
//! concurrently, so the history window and escalation state see a strict
//! sequence.

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::source::{FeedEvent, FeedSource};
use super::{PipelineCoordinator, PipelineStats};
use crate::acquisition::FeedError;
use crate::config::defaults::PROGRESS_LOG_INTERVAL;
use crate::escalation::EscalationOutcome;

/// Pause after a source I/O error before polling again.
const SOURCE_ERROR_BACKOFF_MS: u64 = 250;

/// Owns the coordinator for the lifetime of one feed.
pub struct ProcessingLoop {
    coordinator: PipelineCoordinator,
    cancel_token: CancellationToken,
}

impl ProcessingLoop {
    pub fn new(coordinator: PipelineCoordinator, cancel_token: CancellationToken) -> Self {
        Self {
            coordinator,
            cancel_token,
        }
    }

    /// Run until the source is exhausted or cancellation.
    ///
    /// Returns final pipeline statistics.
    pub async fn run<S: FeedSource>(mut self, source: &mut S) -> PipelineStats {
        info!(source = source.source_name(), "Processing feed");

        loop {
            let event = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("[ProcessingLoop] Shutdown signal received");
                    break;
                }
                result = source.next_event() => result,
            };

            let now = Utc::now();
            let payload = match event {
                Ok(FeedEvent::Payload(payload)) => payload,
                Ok(FeedEvent::Fault(fault)) => {
                    self.coordinator.record_fault(&fault, now);
                    continue;
                }
                Ok(FeedEvent::Eof) => {
                    info!(
                        events = self.coordinator.get_stats().events_processed,
                        "[ProcessingLoop] Source reached end"
                    );
                    break;
                }
                Err(e) => {
                    warn!("[ProcessingLoop] Source error: {:#}", e);
                    self.coordinator
                        .record_fault(&FeedError::Connection(e.to_string()), now);
                    tokio::select! {
                        _ = self.cancel_token.cancelled() => break,
                        _ = tokio::time::sleep(tokio::time::Duration::from_millis(SOURCE_ERROR_BACKOFF_MS)) => {}
                    }
                    continue;
                }
            };

            let update = match self.coordinator.process_payload(payload, now) {
                Ok(update) => update,
                Err(fault) => {
                    self.coordinator.record_fault(&fault, now);
                    continue;
                }
            };

            if let EscalationOutcome::Dispatched(ticket) = &update.escalation {
                warn!(
                    kind = %ticket.alert.kind,
                    indicators = ticket.alert.critical_indicators,
                    "Emergency alert dispatched: {}",
                    ticket.alert.message
                );
            }

            let stats = self.coordinator.get_stats();
            if stats.events_processed % PROGRESS_LOG_INTERVAL == 0 {
                info!(
                    "Progress: {} events | Critical: {} | Alerts: {} | Suppressed: {} | Window: {}",
                    stats.events_processed,
                    stats.critical_readings,
                    stats.alerts_dispatched,
                    stats.alerts_suppressed,
                    stats.history_len
                );
            }
        }

        let stats = self.coordinator.get_stats();
        info!("FINAL STATISTICS");
        info!("   Events Processed:   {}", stats.events_processed);
        info!("   Feed Faults:        {}", stats.faults);
        info!("   Critical Readings:  {}", stats.critical_readings);
        info!("   Alerts Dispatched:  {}", stats.alerts_dispatched);
        info!("   Alerts Suppressed:  {}", stats.alerts_suppressed);
        info!("   History Window:     {}", stats.history_len);

        stats
    }
}
