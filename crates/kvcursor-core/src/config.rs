//! Runtime configuration, loaded from TOML.
//!
//! Every field has a default, so an empty document is a valid config.

use crate::error::{ErrorClass, ErrorOrigin, InternalError};
use serde::Deserialize;
use thiserror::Error as ThisError;

/// Default upper bound on a single stored payload.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4 * 1024 * 1024;

/// Default upper bound on tasks waiting in one transaction's queue.
pub const DEFAULT_MAX_PENDING_TASKS: usize = 1024;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config field '{field}' must be greater than zero")]
    ZeroLimit { field: &'static str },
}

impl From<ConfigError> for InternalError {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorClass::Data, ErrorOrigin::Config, err.to_string())
    }
}

///
/// Config
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Print `[debug]` traces for scheduling, skips, and deliveries.
    pub debug: bool,

    /// Payloads larger than this are rejected on write and refused on decode.
    pub max_payload_bytes: usize,

    /// Scheduling fails once this many tasks are queued on one transaction.
    pub max_pending_tasks: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            max_pending_tasks: DEFAULT_MAX_PENDING_TASKS,
        }
    }
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_payload_bytes == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_payload_bytes",
            });
        }
        if self.max_pending_tasks == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_pending_tasks",
            });
        }

        Ok(())
    }

    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub const fn with_max_pending_tasks(mut self, max: usize) -> Self {
        self.max_pending_tasks = max;
        self
    }

    #[must_use]
    pub const fn with_max_payload_bytes(mut self, max: usize) -> Self {
        self.max_payload_bytes = max;
        self
    }
}
