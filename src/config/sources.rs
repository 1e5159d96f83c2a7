//! File and environment configuration sources.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File, FileFormat};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

const ENV_PREFIX: &str = "CIMPULL";

/// Add a TOML file source. The file must exist.
pub(super) fn add_file(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let name = path
        .to_str()
        .ok_or_else(|| ConfigError::Message(format!("Non UTF-8 config path: {:?}", path)))?;
    debug!(config_path = %path.display(), "adding configuration file");
    Ok(builder.add_source(File::new(name, FileFormat::Toml).required(true)))
}

/// Add `CIMPULL_*` environment overrides; `env` replaces the process
/// environment when given.
pub(super) fn add_environment(
    builder: ConfigBuilder<DefaultState>,
    env: Option<HashMap<String, String>>,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(env),
    )
}
