//! System-wide default constants.
//!
//! Grouped by subsystem. Threshold values are the canonical ones. Some
//! deployments run stricter variants through `sentinel.toml`: a critical
//! temperature of 32 or 35 °C, an indicator gate of 3, or 3 to 4
//! consecutive critical readings before escalating.

// ============================================================================
// Anomaly thresholds
// ============================================================================

/// Sound level above which a reading is critical (dB).
pub const CRITICAL_DECIBEL: f64 = 80.0;
/// Humidity above which a reading is critical (%).
pub const CRITICAL_HUMIDITY_HIGH: f64 = 90.0;
/// Humidity below which a reading is critical (%).
pub const CRITICAL_HUMIDITY_LOW: f64 = 20.0;
/// Temperature at or above which a reading is critical (°C).
pub const CRITICAL_TEMPERATURE: f64 = 28.0;
/// Vibration magnitude above which a reading is critical (m/s²).
pub const CRITICAL_VIBRATION: f64 = 10.0;

pub const WARNING_DECIBEL: f64 = 65.0;
pub const WARNING_HUMIDITY_HIGH: f64 = 80.0;
pub const WARNING_HUMIDITY_LOW: f64 = 30.0;
pub const WARNING_TEMPERATURE: f64 = 26.0;
pub const WARNING_VIBRATION: f64 = 8.0;

/// Device-critical humidity band: outside [55, 66] counts as an indicator.
pub const DEVICE_HUMIDITY_MIN: f64 = 55.0;
pub const DEVICE_HUMIDITY_MAX: f64 = 66.0;

// ============================================================================
// History window
// ============================================================================

/// Retention horizon for timestamped readings (minutes).
pub const HISTORY_WINDOW_MINUTES: i64 = 30;

/// Entries kept when timestamps cannot be parsed.
///
/// 360 entries at one push every 5 s = 30 minutes.
pub const HISTORY_FALLBACK_ENTRIES: usize = 360;

/// Absolute bound on the window regardless of timestamps.
///
/// 7 200 = 2 hours at 1 Hz.
pub const HISTORY_HARD_CAP: usize = 7_200;

/// Readings inspected by the trend predictor.
pub const TREND_SAMPLE_SIZE: usize = 5;

// ============================================================================
// Escalation
// ============================================================================

/// Trailing statuses retained by the escalation state machine.
pub const ESCALATION_STATUS_BUFFER: usize = 5;

/// Statuses inspected for a qualifying run.
pub const ESCALATION_CONSECUTIVE_WINDOW: usize = 4;

/// Minimum qualifying statuses before an automatic alert fires.
pub const ESCALATION_MIN_CONSECUTIVE: usize = 2;

/// Minimum device-critical indicators per qualifying status.
pub const ESCALATION_INDICATOR_GATE: u8 = 2;

/// Minimum time between two dispatched alerts (seconds).
pub const ESCALATION_COOLDOWN_SECS: u64 = 300;

// ============================================================================
// Notification transport
// ============================================================================

/// HTTP timeout for outbound call/SMS requests (seconds).
pub const NOTIFY_HTTP_TIMEOUT_SECS: u64 = 15;

/// Twilio REST API root.
pub const TWILIO_API_BASE: &str = "https://api.twilio.com";

// ============================================================================
// Pipeline
// ============================================================================

/// Events between progress log lines.
pub const PROGRESS_LOG_INTERVAL: u64 = 60;

/// Default pacing for file replay and simulation (milliseconds).
pub const DEFAULT_REPLAY_INTERVAL_MS: u64 = 5_000;
