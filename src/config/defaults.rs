//! Built-in defaults, registered as the lowest-priority configuration layer.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

pub(super) fn max_open_contexts() -> usize {
    256
}

pub(super) fn max_object_count() -> u32 {
    10_000
}

pub(super) fn default_operation_timeout_secs() -> u32 {
    30
}

pub(super) fn max_operation_timeout_secs() -> u32 {
    90
}

pub(super) fn response_cache_capacity() -> usize {
    1000
}

pub(super) fn open_wait_ms() -> u64 {
    500
}

pub(super) fn pull_wait_ms() -> u64 {
    9_000
}

pub(super) fn close_grace_ms() -> u64 {
    1_000
}

pub(super) fn reaper_interval_ms() -> u64 {
    1_000
}

pub(super) fn max_consecutive_zero_pulls() -> u32 {
    1000
}

/// Create a Config builder with every default applied.
pub(super) fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("enumeration.max_open_contexts", max_open_contexts() as i64)?
        .set_default("enumeration.max_object_count", i64::from(max_object_count()))?
        .set_default(
            "enumeration.default_operation_timeout_secs",
            i64::from(default_operation_timeout_secs()),
        )?
        .set_default(
            "enumeration.max_operation_timeout_secs",
            i64::from(max_operation_timeout_secs()),
        )?
        .set_default(
            "enumeration.response_cache_capacity",
            response_cache_capacity() as i64,
        )?
        .set_default("enumeration.open_wait_ms", open_wait_ms() as i64)?
        .set_default("enumeration.pull_wait_ms", pull_wait_ms() as i64)?
        .set_default("enumeration.close_grace_ms", close_grace_ms() as i64)?
        .set_default("enumeration.reaper_interval_ms", reaper_interval_ms() as i64)?
        .set_default(
            "enumeration.max_consecutive_zero_pulls",
            i64::from(max_consecutive_zero_pulls()),
        )?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stdout")
}
