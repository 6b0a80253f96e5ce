//! Sentinel Configuration Module
//!
//! Operator-tunable thresholds and integration settings loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `SENTINEL_CONFIG` environment variable (path to TOML file)
//! 2. `sentinel.toml` in the current working directory
//! 3. Built-in defaults (the canonical thresholds)
//!
//! ## Usage
//!
//! The binary calls `config::init()` once at startup; library components take
//! their config sections explicitly so tests can build them in isolation.
//!
//! ```ignore
//! config::init(SentinelConfig::load());
//! let cooldown = config::get().escalation.cooldown_secs;
//! ```

mod sentinel_config;
pub mod defaults;

pub use sentinel_config::*;

use std::sync::OnceLock;

/// Process-wide configuration, initialized once at startup.
static SENTINEL_CONFIG: OnceLock<SentinelConfig> = OnceLock::new();

/// Initialize the global configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: SentinelConfig) {
    if SENTINEL_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get the global configuration, falling back to built-in defaults when
/// `init()` has not been called.
pub fn get() -> &'static SentinelConfig {
    SENTINEL_CONFIG.get_or_init(SentinelConfig::default)
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    SENTINEL_CONFIG.get().is_some()
}
