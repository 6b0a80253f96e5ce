//! In-memory dispatcher
//!
//! Records every delivery instead of sending it. Used by the test suites and
//! handy for dry runs; an optional delay simulates a slow transport and a
//! failure switch simulates an outage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{AlertDispatcher, DispatchError};

/// Delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Call,
    Text,
}

/// One recorded delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub channel: Channel,
    pub destination: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    deliveries: Mutex<Vec<Delivery>>,
    delay: Duration,
    failing: AtomicBool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every delivery for `delay` before it completes.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make subsequent deliveries fail (after recording them).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of voice calls attempted.
    pub fn call_count(&self) -> usize {
        self.deliveries()
            .iter()
            .filter(|d| d.channel == Channel::Call)
            .count()
    }

    async fn deliver(&self, channel: Channel, destination: &str, message: &str) -> Result<(), DispatchError> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Delivery {
                channel,
                destination: destination.to_string(),
                message: message.to_string(),
            });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            Err(DispatchError::Failed(format!("{channel:?} transport unavailable")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AlertDispatcher for RecordingDispatcher {
    async fn call(&self, destination: &str, message: &str) -> Result<(), DispatchError> {
        self.deliver(Channel::Call, destination, message).await
    }

    async fn send_text(&self, destination: &str, message: &str) -> Result<(), DispatchError> {
        self.deliver(Channel::Text, destination, message).await
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
