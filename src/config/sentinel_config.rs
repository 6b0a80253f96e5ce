//! Sentinel Configuration - thresholds, windowing, escalation and transport
//!
//! Each struct implements `Default` with the canonical values so a missing
//! file (or a missing section) behaves exactly like the built-in rules.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;

/// Environment variable pointing at a config file.
pub const CONFIG_ENV_VAR: &str = "SENTINEL_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "sentinel.toml";

/// Upper bound on the alert cooldown (one day).
const MAX_COOLDOWN_SECS: u64 = 86_400;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one monitored feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentinelConfig {
    /// Anomaly classification thresholds
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// History window retention
    #[serde(default)]
    pub history: HistoryConfig,

    /// Escalation state machine tuning
    #[serde(default)]
    pub escalation: EscalationConfig,

    /// Outbound notification transport
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Feed interpretation
    #[serde(default)]
    pub feed: FeedConfig,

    /// HTTP server
    #[serde(default)]
    pub server: ServerConfig,
}

impl SentinelConfig {
    /// Load configuration using the standard search order:
    /// 1. `$SENTINEL_CONFIG`
    /// 2. `./sentinel.toml`
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate thresholds and tuning values for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let t = &self.thresholds;

        for (name, band) in [
            ("critical", &t.critical),
            ("warning", &t.warning),
            ("device", &t.device),
        ] {
            if band.humidity_min >= band.humidity_max {
                errors.push(format!(
                    "thresholds.{name}: humidity_min ({:.1}) must be < humidity_max ({:.1})",
                    band.humidity_min, band.humidity_max
                ));
            }
            let values = [
                band.decibel_max,
                band.humidity_min,
                band.humidity_max,
                band.temperature_limit,
                band.vibration_max,
            ];
            if values.iter().any(|v| !v.is_finite()) {
                errors.push(format!("thresholds.{name}: all limits must be finite"));
            }
        }

        check_ordering(&mut errors, "decibel_max", t.critical.decibel_max, t.warning.decibel_max);
        check_ordering(&mut errors, "temperature_limit", t.critical.temperature_limit, t.warning.temperature_limit);
        check_ordering(&mut errors, "vibration_max", t.critical.vibration_max, t.warning.vibration_max);
        check_ordering(&mut errors, "humidity_max", t.critical.humidity_max, t.warning.humidity_max);
        if t.critical.humidity_min > t.warning.humidity_min {
            errors.push(format!(
                "humidity_min: critical ({:.1}) must be <= warning ({:.1})",
                t.critical.humidity_min, t.warning.humidity_min
            ));
        }

        let h = &self.history;
        if h.window_minutes <= 0 {
            errors.push("history.window_minutes must be > 0".to_string());
        }
        if h.fallback_entries == 0 {
            errors.push("history.fallback_entries must be > 0".to_string());
        }
        if h.hard_cap < h.fallback_entries {
            errors.push(format!(
                "history.hard_cap ({}) must be >= fallback_entries ({})",
                h.hard_cap, h.fallback_entries
            ));
        }

        let e = &self.escalation;
        if e.min_consecutive == 0 {
            errors.push("escalation.min_consecutive must be > 0".to_string());
        }
        if e.min_consecutive > e.consecutive_window {
            errors.push(format!(
                "escalation.min_consecutive ({}) must be <= consecutive_window ({})",
                e.min_consecutive, e.consecutive_window
            ));
        }
        if e.consecutive_window > e.status_buffer {
            errors.push(format!(
                "escalation.consecutive_window ({}) must be <= status_buffer ({})",
                e.consecutive_window, e.status_buffer
            ));
        }
        if e.indicator_gate > 4 {
            errors.push(format!(
                "escalation.indicator_gate ({}) cannot exceed the 4 device indicators",
                e.indicator_gate
            ));
        }
        if e.cooldown_secs == 0 || e.cooldown_secs > MAX_COOLDOWN_SECS {
            errors.push(format!(
                "escalation.cooldown_secs ({}) must be in 1..={MAX_COOLDOWN_SECS}",
                e.cooldown_secs
            ));
        }

        if self.notify.dispatcher == DispatcherKind::Twilio && self.notify.destination.trim().is_empty() {
            errors.push("notify.destination is required for the twilio dispatcher".to_string());
        }

        if FixedOffset::east_opt(self.feed.utc_offset_minutes.saturating_mul(60)).is_none() {
            errors.push(format!(
                "feed.utc_offset_minutes ({}) is out of range",
                self.feed.utc_offset_minutes
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

fn check_ordering(errors: &mut Vec<String>, name: &str, critical: f64, warning: f64) {
    if critical < warning {
        errors.push(format!(
            "{name}: critical ({critical:.3}) must be >= warning ({warning:.3})"
        ));
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, std::io::Error),

    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Thresholds
// ============================================================================

/// One set of limits applied to the four monitored quantities.
///
/// A reading breaches the band when decibel > `decibel_max`, humidity is
/// outside [`humidity_min`, `humidity_max`], temperature ≥
/// `temperature_limit`, or vibration magnitude > `vibration_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandThresholds {
    pub decibel_max: f64,
    pub humidity_min: f64,
    pub humidity_max: f64,
    pub temperature_limit: f64,
    pub vibration_max: f64,
}

/// Classification thresholds.
///
/// `critical` and `warning` drive the tier decision; `device` is the narrower
/// rule set whose breach count feeds escalation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "ThresholdConfig::default_critical")]
    pub critical: BandThresholds,
    #[serde(default = "ThresholdConfig::default_warning")]
    pub warning: BandThresholds,
    #[serde(default = "ThresholdConfig::default_device")]
    pub device: BandThresholds,
}

impl ThresholdConfig {
    fn default_critical() -> BandThresholds {
        BandThresholds {
            decibel_max: defaults::CRITICAL_DECIBEL,
            humidity_min: defaults::CRITICAL_HUMIDITY_LOW,
            humidity_max: defaults::CRITICAL_HUMIDITY_HIGH,
            temperature_limit: defaults::CRITICAL_TEMPERATURE,
            vibration_max: defaults::CRITICAL_VIBRATION,
        }
    }

    fn default_warning() -> BandThresholds {
        BandThresholds {
            decibel_max: defaults::WARNING_DECIBEL,
            humidity_min: defaults::WARNING_HUMIDITY_LOW,
            humidity_max: defaults::WARNING_HUMIDITY_HIGH,
            temperature_limit: defaults::WARNING_TEMPERATURE,
            vibration_max: defaults::WARNING_VIBRATION,
        }
    }

    fn default_device() -> BandThresholds {
        BandThresholds {
            decibel_max: defaults::CRITICAL_DECIBEL,
            humidity_min: defaults::DEVICE_HUMIDITY_MIN,
            humidity_max: defaults::DEVICE_HUMIDITY_MAX,
            temperature_limit: defaults::CRITICAL_TEMPERATURE,
            vibration_max: defaults::CRITICAL_VIBRATION,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            critical: Self::default_critical(),
            warning: Self::default_warning(),
            device: Self::default_device(),
        }
    }
}

// ============================================================================
// History
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Retention horizon for timestamped readings
    pub window_minutes: i64,
    /// Entries kept for readings whose timestamp did not parse
    pub fallback_entries: usize,
    /// Absolute bound on the window
    pub hard_cap: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window_minutes: defaults::HISTORY_WINDOW_MINUTES,
            fallback_entries: defaults::HISTORY_FALLBACK_ENTRIES,
            hard_cap: defaults::HISTORY_HARD_CAP,
        }
    }
}

// ============================================================================
// Escalation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Trailing statuses retained
    pub status_buffer: usize,
    /// Trailing statuses that must all qualify
    pub consecutive_window: usize,
    /// Minimum statuses in the window before firing
    pub min_consecutive: usize,
    /// Minimum device-critical indicators per qualifying status
    pub indicator_gate: u8,
    /// Minimum seconds between two dispatched alerts
    pub cooldown_secs: u64,
}

impl EscalationConfig {
    pub fn cooldown(&self) -> chrono::Duration {
        i64::try_from(self.cooldown_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| chrono::Duration::days(1))
    }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            status_buffer: defaults::ESCALATION_STATUS_BUFFER,
            consecutive_window: defaults::ESCALATION_CONSECUTIVE_WINDOW,
            min_consecutive: defaults::ESCALATION_MIN_CONSECUTIVE,
            indicator_gate: defaults::ESCALATION_INDICATOR_GATE,
            cooldown_secs: defaults::ESCALATION_COOLDOWN_SECS,
        }
    }
}

// ============================================================================
// Notification
// ============================================================================

/// Which transport delivers emergency alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatcherKind {
    /// Log alerts instead of delivering them
    #[default]
    Log,
    /// Voice call + SMS through the Twilio REST API
    Twilio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub dispatcher: DispatcherKind,
    /// Phone number that receives calls and texts
    pub destination: String,
    /// Also send an SMS alongside the voice call
    pub send_text: bool,
    /// HTTP timeout for transport requests
    pub timeout_secs: u64,
    pub twilio: TwilioConfig,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherKind::Log,
            destination: String::new(),
            send_text: true,
            timeout_secs: defaults::NOTIFY_HTTP_TIMEOUT_SECS,
            twilio: TwilioConfig::default(),
        }
    }
}

/// Twilio credentials.
///
/// `account_sid` and `auth_token` may be left empty here and supplied via
/// `TWILIO_ACCOUNT_SID` / `TWILIO_AUTH_TOKEN`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub api_base: String,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            api_base: defaults::TWILIO_API_BASE.to_string(),
        }
    }
}

impl std::fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("from_number", &self.from_number)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl TwilioConfig {
    /// Fill empty credentials from the environment.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if self.account_sid.is_empty() {
            if let Ok(sid) = std::env::var("TWILIO_ACCOUNT_SID") {
                self.account_sid = sid;
            }
        }
        if self.auth_token.is_empty() {
            if let Ok(token) = std::env::var("TWILIO_AUTH_TOKEN") {
                self.auth_token = token;
            }
        }
        self
    }
}

// ============================================================================
// Feed / Server
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Offset of the device clock from UTC, applied to naive timestamps
    pub utc_offset_minutes: i32,
}

impl FeedConfig {
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: "0.0.0.0:8080".to_string(),
        }
    }
}
