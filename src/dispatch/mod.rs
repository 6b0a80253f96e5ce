//! Outbound alert transport
//!
//! The escalation core only depends on the [`AlertDispatcher`] contract: a
//! voice call and a text message to a destination, each best-effort and never
//! retried. Concrete transports:
//!
//! - [`LogDispatcher`]: writes alerts to the log (default, no credentials)
//! - [`TwilioDispatcher`]: Twilio REST API voice call + SMS
//! - [`RecordingDispatcher`]: in-memory transport for tests and dry runs

mod recording;
mod twilio;

pub use recording::{Channel, Delivery, RecordingDispatcher};
pub use twilio::TwilioDispatcher;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{DispatcherKind, NotifyConfig};

/// Transport failures. Recorded in the escalation state, never retried.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Dispatcher not configured: {0}")]
    NotConfigured(String),

    #[error("Dispatch failed: {0}")]
    Failed(String),
}

/// Contract for delivering an emergency alert.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    /// Place a voice call reading `message` to `destination`.
    async fn call(&self, destination: &str, message: &str) -> Result<(), DispatchError>;

    /// Send `message` as a text to `destination`.
    async fn send_text(&self, destination: &str, message: &str) -> Result<(), DispatchError>;

    /// Transport name for status reporting.
    fn name(&self) -> &'static str;
}

/// Dispatcher that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatcher;

#[async_trait]
impl AlertDispatcher for LogDispatcher {
    async fn call(&self, destination: &str, message: &str) -> Result<(), DispatchError> {
        warn!(destination = %destination, "EMERGENCY CALL: {}", message);
        Ok(())
    }

    async fn send_text(&self, destination: &str, message: &str) -> Result<(), DispatchError> {
        warn!(destination = %destination, "EMERGENCY SMS: {}", message);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Build the configured dispatcher.
pub fn build_dispatcher(config: &NotifyConfig) -> Result<Arc<dyn AlertDispatcher>, DispatchError> {
    let dispatcher: Arc<dyn AlertDispatcher> = match config.dispatcher {
        DispatcherKind::Log => Arc::new(LogDispatcher),
        DispatcherKind::Twilio => {
            let twilio = config.twilio.clone().with_env_overrides();
            Arc::new(TwilioDispatcher::new(&twilio, config.timeout_secs)?)
        }
    };
    info!(dispatcher = dispatcher.name(), "Alert dispatcher ready");
    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_dispatcher_always_succeeds() {
        let d = LogDispatcher;
        assert!(d.call("+15550100", "test").await.is_ok());
        assert!(d.send_text("+15550100", "test").await.is_ok());
        assert_eq!(d.name(), "log");
    }

    #[test]
    fn test_build_default_dispatcher() {
        let d = build_dispatcher(&NotifyConfig::default()).unwrap();
        assert_eq!(d.name(), "log");
    }

    #[test]
    fn test_twilio_without_credentials_is_rejected() {
        let config = NotifyConfig {
            dispatcher: DispatcherKind::Twilio,
            ..NotifyConfig::default()
        };
        // Env overrides may fill sid/token but never the sender number
        assert!(matches!(
            build_dispatcher(&config),
            Err(DispatchError::NotConfigured(_))
        ));
    }
}
