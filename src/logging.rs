//! Logging
//!
//! Structured logging through `tracing`. Level, format and destination come from
//! [`LoggingConfig`], overridable per process with `CIMPULL_LOG`,
//! `CIMPULL_LOG_FORMAT`, `CIMPULL_LOG_OUTPUT` and `CIMPULL_LOG_MODULES`.

use crate::error::EnumerationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const ENV_FILTER: &str = "CIMPULL_LOG";
const ENV_FORMAT: &str = "CIMPULL_LOG_FORMAT";
const ENV_OUTPUT: &str = "CIMPULL_LOG_OUTPUT";
const ENV_MODULES: &str = "CIMPULL_LOG_MODULES";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// json or text
    #[serde(default = "default_format")]
    pub format: String,

    /// stdout, stderr or file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output is "file"
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// ANSI colors (text format on a terminal stream only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Per-module levels, e.g. `cimpull::enumeration = "debug"`
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stdout".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("cimpull.log")
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: default_log_file(),
            color: default_true(),
            modules: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), String> {
        parse_format(&self.format)?;
        parse_output(&self.output)?;
        level_directive(&self.level)?;
        for (module, level) in &self.modules {
            level_directive(level).map_err(|e| format!("module '{}': {}", module, e))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogOutput {
    Stdout,
    Stderr,
    File,
}

/// Install the global subscriber.
///
/// Environment variables take precedence over `config`. Calling this when a
/// subscriber is already installed (tests, embedding hosts) leaves the existing
/// one in place.
pub fn init_logging(config: &LoggingConfig) -> Result<(), EnumerationError> {
    let filter = build_env_filter(config)?;
    let format = match std::env::var(ENV_FORMAT) {
        Ok(format) => parse_format(&format),
        Err(_) => parse_format(&config.format),
    }
    .map_err(EnumerationError::ConfigError)?;
    let output = match std::env::var(ENV_OUTPUT) {
        Ok(output) => parse_output(&output),
        Err(_) => parse_output(&config.output),
    }
    .map_err(EnumerationError::ConfigError)?;

    let writer = match output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::File => BoxMakeWriter::new(Arc::new(open_log_file(&config.file)?)),
    };
    let ansi = config.color && output != LogOutput::File;

    let subscriber = Registry::default().with(filter);
    let installed = match format {
        LogFormat::Json => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Text => subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .try_init(),
    };
    // An already-installed subscriber wins
    let _ = installed;
    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File, EnumerationError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            EnumerationError::ConfigError(format!("Failed to create log directory: {}", e))
        })?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            EnumerationError::ConfigError(format!("Failed to open log file {:?}: {}", path, e))
        })
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, EnumerationError> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_FILTER) {
        return Ok(filter);
    }

    let level = level_directive(&config.level).map_err(EnumerationError::ConfigError)?;
    let mut filter = EnvFilter::new(level);
    if level == "off" {
        return Ok(filter);
    }

    let mut directives: Vec<(String, String)> = config
        .modules
        .iter()
        .map(|(module, level)| (module.clone(), level.clone()))
        .collect();
    if let Ok(modules) = std::env::var(ENV_MODULES) {
        directives.extend(parse_module_list(&modules));
    }

    for (module, level) in directives {
        let directive = format!("{}={}", module, level);
        filter = filter.add_directive(directive.parse().map_err(|e| {
            EnumerationError::ConfigError(format!("Invalid log directive {:?}: {}", directive, e))
        })?);
    }
    Ok(filter)
}

fn level_directive(level: &str) -> Result<&str, String> {
    match level {
        "trace" | "debug" | "info" | "warn" | "error" | "off" => Ok(level),
        other => Err(format!(
            "Invalid log level: {} (must be trace, debug, info, warn, error or off)",
            other
        )),
    }
}

fn parse_format(format: &str) -> Result<LogFormat, String> {
    match format {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            other
        )),
    }
}

fn parse_output(output: &str) -> Result<LogOutput, String> {
    match output {
        "stdout" => Ok(LogOutput::Stdout),
        "stderr" => Ok(LogOutput::Stderr),
        "file" => Ok(LogOutput::File),
        other => Err(format!(
            "Invalid log output: {} (must be 'stdout', 'stderr' or 'file')",
            other
        )),
    }
}

/// `a=debug, b::c=trace` into pairs; malformed entries are skipped
fn parse_module_list(spec: &str) -> Vec<(String, String)> {
    spec.split(',')
        .filter_map(|entry| {
            let (module, level) = entry.split_once('=')?;
            let (module, level) = (module.trim(), level.trim());
            (!module.is_empty() && !level.is_empty())
                .then(|| (module.to_string(), level.to_string()))
        })
        .collect()
}
