//! Feed source abstraction.
//!
//! Provides a unified trait for receiving feed pushes from different inputs:
//! stdin (JSON lines), file replay, an in-process channel, and the built-in
//! simulator. Every source delivers events one at a time to a single
//! consumer, the processing loop.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::acquisition::{FeedError, FeedPayload};
use crate::simulation::SensorSimulator;

/// Events produced by a feed source.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A decoded feed push.
    Payload(FeedPayload),
    /// The feed delivered nothing usable (empty push, bad JSON, lost link).
    Fault(FeedError),
    /// Source reached end of data.
    Eof,
}

impl FeedEvent {
    /// Decode one line of wire text.
    pub fn from_line(line: &str) -> Self {
        match FeedPayload::parse_str(line) {
            Ok(payload) => Self::Payload(payload),
            Err(e) => Self::Fault(e),
        }
    }
}

/// Trait abstracting where feed pushes come from.
///
/// The processing loop calls [`FeedSource::next_event`] in a `select!` with
/// cancellation.
#[async_trait]
pub trait FeedSource: Send + 'static {
    /// Wait for the next event.
    ///
    /// Returns `Err` on I/O failure; the loop reports it as a connection
    /// fault and keeps polling.
    async fn next_event(&mut self) -> Result<FeedEvent>;

    /// Human-readable name for logging (e.g. "stdin", "replay").
    fn source_name(&self) -> &str;
}

// ============================================================================
// Replay Source (pre-loaded lines)
// ============================================================================

/// Replays pre-loaded feed lines with an optional inter-event delay.
pub struct ReplaySource {
    lines: std::vec::IntoIter<String>,
    delay_ms: u64,
    yielded_first: bool,
}

impl ReplaySource {
    pub fn new(lines: Vec<String>, delay_ms: u64) -> Self {
        Self {
            lines: lines.into_iter(),
            delay_ms,
            yielded_first: false,
        }
    }

    /// Load a JSON-lines file. Blank lines are skipped.
    pub async fn from_file(path: &Path, delay_ms: u64) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading feed replay {}", path.display()))?;
        let lines: Vec<String> = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect();
        debug!(path = %path.display(), lines = lines.len(), "Loaded feed replay");
        Ok(Self::new(lines, delay_ms))
    }
}

#[async_trait]
impl FeedSource for ReplaySource {
    async fn next_event(&mut self) -> Result<FeedEvent> {
        // No delay before the first event
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        match self.lines.next() {
            Some(line) => {
                self.yielded_first = true;
                Ok(FeedEvent::from_line(&line))
            }
            None => Ok(FeedEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

// ============================================================================
// Stdin Source (JSON payloads, one per line)
// ============================================================================

/// Reads JSON feed payloads from stdin.
///
/// Used with the simulator:
/// `sensor-simulator --count 500 | factory-sentinel --stdin`
pub struct StdinSource {
    reader: tokio::io::BufReader<tokio::io::Stdin>,
    line_buffer: String,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: tokio::io::BufReader::new(tokio::io::stdin()),
            line_buffer: String::with_capacity(1024),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedSource for StdinSource {
    async fn next_event(&mut self) -> Result<FeedEvent> {
        use tokio::io::AsyncBufReadExt;
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(FeedEvent::Eof);
            }
            if self.line_buffer.trim().is_empty() {
                continue;
            }
            return Ok(FeedEvent::from_line(&self.line_buffer));
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

// ============================================================================
// Channel Source (in-process push)
// ============================================================================

/// Receives events pushed by another task. The sender side plays the role
/// of the feed subscription; dropping every sender ends the stream.
pub struct ChannelSource {
    rx: mpsc::Receiver<FeedEvent>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<FeedEvent>) -> Self {
        Self { rx }
    }

    /// Bounded channel pair.
    pub fn channel(capacity: usize) -> (mpsc::Sender<FeedEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl FeedSource for ChannelSource {
    async fn next_event(&mut self) -> Result<FeedEvent> {
        Ok(self.rx.recv().await.unwrap_or(FeedEvent::Eof))
    }

    fn source_name(&self) -> &str {
        "channel"
    }
}

// ============================================================================
// Simulated Source
// ============================================================================

/// Live synthetic feed, one push per interval.
pub struct SimulatedSource {
    simulator: SensorSimulator,
    interval: tokio::time::Interval,
    remaining: Option<u64>,
}

impl SimulatedSource {
    /// `limit` caps the number of pushes; `None` runs until cancelled.
    pub fn new(seed: Option<u64>, interval_ms: u64, limit: Option<u64>) -> Self {
        let period = std::time::Duration::from_millis(interval_ms.max(1));
        let step = chrono::Duration::milliseconds(i64::try_from(interval_ms).unwrap_or(i64::MAX / 2));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        Self {
            simulator: SensorSimulator::new(seed, Utc::now(), step),
            interval,
            remaining: limit,
        }
    }
}

#[async_trait]
impl FeedSource for SimulatedSource {
    async fn next_event(&mut self) -> Result<FeedEvent> {
        match self.remaining.as_mut() {
            Some(0) => return Ok(FeedEvent::Eof),
            Some(n) => *n -= 1,
            None => {}
        }
        self.interval.tick().await;
        Ok(FeedEvent::Payload(self.simulator.next_payload(1)))
    }

    fn source_name(&self) -> &str {
        "simulator"
    }
}
