//! Shared configuration types for duetimer
//!
//! This crate contains the serializable configuration types shared between
//! the timer engine (duetimer-core) and the command line host (duetimer-cli).

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Engine Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Scheduling parameters for one partition's timer engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Period between two checker invocations
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Wall-clock budget for a single checker invocation. Due timers that do
    /// not fit in the budget are deferred to the next tick.
    #[serde(default = "default_yield_budget_ms")]
    pub yield_budget_ms: u64,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn yield_budget(&self) -> Duration {
        Duration::from_millis(self.yield_budget_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            yield_budget_ms: default_yield_budget_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Where the host writes its logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write a rotated log file next to the config file
    #[serde(default = "default_true")]
    pub file_enabled: bool,

    /// Rotation threshold in megabytes
    #[serde(default = "default_max_log_size_mb")]
    pub max_size_mb: u64,

    /// Debug level for the engine crates (same as `DEBUG_LOGGING=1`)
    #[serde(default)]
    pub debug: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_enabled: true,
            max_size_mb: default_max_log_size_mb(),
            debug: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Serde Default Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}
fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_yield_budget_ms() -> u64 {
    100
}
fn default_max_log_size_mb() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.yield_budget(), Duration::from_millis(100));
        assert!(config.logging.file_enabled);
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            yield_budget_ms = 25

            [logging]
            debug = true
            "#,
        )
        .unwrap();
        assert_eq!(config.tick_interval_ms, 1000);
        assert_eq!(config.yield_budget_ms, 25);
        assert!(config.logging.debug);
        assert_eq!(config.logging.max_size_mb, 10);
    }
}
