//! Configuration
//!
//! Layered server configuration: built-in defaults, an optional TOML file, then
//! `CIMPULL_`-prefixed environment variables (`__` separates nested keys, e.g.
//! `CIMPULL_ENUMERATION__MAX_OPEN_CONTEXTS=64`). The merged result is validated
//! before use.

use crate::error::EnumerationError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

mod defaults;
mod sources;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub enumeration: EnumerationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Limits and timings of the pull-operation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumerationConfig {
    /// Open contexts allowed at once
    #[serde(default = "defaults::max_open_contexts")]
    pub max_open_contexts: usize,

    /// Largest max-object-count a client may request per Open or Pull
    #[serde(default = "defaults::max_object_count")]
    pub max_object_count: u32,

    /// Idle timeout used when Open does not specify one
    #[serde(default = "defaults::default_operation_timeout_secs")]
    pub default_operation_timeout_secs: u32,

    #[serde(default = "defaults::max_operation_timeout_secs")]
    pub max_operation_timeout_secs: u32,

    /// Buffered items at which the provider is paused
    #[serde(default = "defaults::response_cache_capacity")]
    pub response_cache_capacity: usize,

    /// How long Open waits for its first batch
    #[serde(default = "defaults::open_wait_ms")]
    pub open_wait_ms: u64,

    /// Default and ceiling for how long a Pull waits on an empty buffer
    #[serde(default = "defaults::pull_wait_ms")]
    pub pull_wait_ms: u64,

    /// How long Close waits for a cancelled provider before aborting it
    #[serde(default = "defaults::close_grace_ms")]
    pub close_grace_ms: u64,

    #[serde(default = "defaults::reaper_interval_ms")]
    pub reaper_interval_ms: u64,

    /// Consecutive zero-count pulls tolerated before the context is closed
    #[serde(default = "defaults::max_consecutive_zero_pulls")]
    pub max_consecutive_zero_pulls: u32,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            max_open_contexts: defaults::max_open_contexts(),
            max_object_count: defaults::max_object_count(),
            default_operation_timeout_secs: defaults::default_operation_timeout_secs(),
            max_operation_timeout_secs: defaults::max_operation_timeout_secs(),
            response_cache_capacity: defaults::response_cache_capacity(),
            open_wait_ms: defaults::open_wait_ms(),
            pull_wait_ms: defaults::pull_wait_ms(),
            close_grace_ms: defaults::close_grace_ms(),
            reaper_interval_ms: defaults::reaper_interval_ms(),
            max_consecutive_zero_pulls: defaults::max_consecutive_zero_pulls(),
        }
    }
}

impl EnumerationConfig {
    pub fn default_operation_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.default_operation_timeout_secs))
    }

    pub fn open_wait(&self) -> Duration {
        Duration::from_millis(self.open_wait_ms)
    }

    pub fn pull_wait(&self) -> Duration {
        Duration::from_millis(self.pull_wait_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_open_contexts == 0 {
            return Err("max_open_contexts must be at least 1".to_string());
        }
        if self.max_object_count == 0 {
            return Err("max_object_count must be at least 1".to_string());
        }
        if self.max_operation_timeout_secs == 0 {
            return Err("max_operation_timeout_secs must be at least 1".to_string());
        }
        if self.default_operation_timeout_secs == 0
            || self.default_operation_timeout_secs > self.max_operation_timeout_secs
        {
            return Err(format!(
                "default_operation_timeout_secs must be between 1 and {}",
                self.max_operation_timeout_secs
            ));
        }
        if self.response_cache_capacity == 0 {
            return Err("response_cache_capacity must be at least 1".to_string());
        }
        if self.reaper_interval_ms == 0 {
            return Err("reaper_interval_ms must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Enumeration(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Enumeration(msg) => write!(f, "Enumeration: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ServerConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if let Err(e) = self.enumeration.validate() {
            errors.push(ValidationError::Enumeration(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, EnumerationError> {
        toml::to_string_pretty(self)
            .map_err(|e| EnumerationError::ConfigError(format!("Failed to render config: {}", e)))
    }
}

/// Loads [`ServerConfig`] from defaults, file and environment.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load using the process environment.
    pub fn load(path: Option<&Path>) -> Result<ServerConfig, EnumerationError> {
        Self::load_with_env(path, None)
    }

    /// Load with an explicit environment map standing in for the process
    /// environment (`None` reads the real one).
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<ServerConfig, EnumerationError> {
        let mut builder = defaults::builder_with_defaults()?;
        if let Some(path) = path {
            builder = sources::add_file(builder, path)?;
        }
        builder = sources::add_environment(builder, env);

        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            EnumerationError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })?;
        Ok(config)
    }
}
