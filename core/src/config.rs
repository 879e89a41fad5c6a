//! Engine configuration
//!
//! This module re-exports the shared types from duetimer-types and provides
//! validation and persistence for EngineConfig.

use std::path::PathBuf;

use thiserror::Error;

pub use duetimer_types::{EngineConfig, LoggingConfig};

const APP_NAME: &str = "duetimer";
const CONFIG_NAME: &str = "config";

/// Errors during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration")]
    Load(#[from] confy::ConfyError),

    #[error("failed to save configuration")]
    Save(#[source] confy::ConfyError),

    #[error("invalid configuration: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// EngineConfig Extensions
// ─────────────────────────────────────────────────────────────────────────────

/// Extension trait for EngineConfig persistence and validation
pub trait EngineConfigExt: Sized {
    fn load() -> Result<Self, ConfigError>;
    fn load_or_default() -> Self;
    fn save(&self) -> Result<(), ConfigError>;
    fn config_path() -> Result<PathBuf, ConfigError>;
    fn validate(&self) -> Result<(), ConfigError>;
}

impl EngineConfigExt for EngineConfig {
    fn load() -> Result<Self, ConfigError> {
        let config: Self = confy::load(APP_NAME, CONFIG_NAME)?;
        config.validate()?;
        Ok(config)
    }

    /// Fall back to defaults when the file is unreadable or invalid
    fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Using default configuration");
            Self::default()
        })
    }

    fn save(&self) -> Result<(), ConfigError> {
        self.validate()?;
        confy::store(APP_NAME, CONFIG_NAME, self).map_err(ConfigError::Save)
    }

    fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_interval_ms",
                reason: "must be positive",
            });
        }
        // a zero budget would yield before visiting anything, forever
        if self.yield_budget_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "yield_budget_ms",
                reason: "must be positive",
            });
        }
        if self.logging.max_size_mb == 0 {
            return Err(ConfigError::Invalid {
                field: "logging.max_size_mb",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}
