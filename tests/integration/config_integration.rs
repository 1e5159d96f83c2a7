//! Integration tests for configuration loading

use super::test_utils::*;
use cimpull::config::{ConfigLoader, ServerConfig};
use cimpull::provider::StaticProvider;
use cimpull::{EnumerationError, ObjectManager, ProviderRegistry};
use tempfile::TempDir;

#[test]
fn test_config_file_drives_enumeration_limits() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("cimpull.toml");
    std::fs::write(
        &config_file,
        r#"
[enumeration]
max_open_contexts = 1
max_object_count = 50
response_cache_capacity = 8

[logging]
level = "warn"
format = "json"
output = "stderr"

[logging.modules]
"cimpull::enumeration" = "debug"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_with_env(Some(&config_file), Some(Default::default())).unwrap();
    assert_eq!(config.enumeration.max_open_contexts, 1);
    assert_eq!(config.enumeration.max_object_count, 50);
    assert_eq!(config.enumeration.response_cache_capacity, 8);
    assert_eq!(config.enumeration.pull_wait_ms, 9_000);
    assert_eq!(config.logging.format, "json");
    assert_eq!(
        config.logging.modules.get("cimpull::enumeration").map(String::as_str),
        Some("debug")
    );
}

#[test]
fn test_process_environment_overrides_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("cimpull.toml");
    std::fs::write(&config_file, "[enumeration]\nclose_grace_ms = 2000\n").unwrap();

    let config = with_env(
        &[
            ("CIMPULL_ENUMERATION__CLOSE_GRACE_MS", "250"),
            ("CIMPULL_ENUMERATION__REAPER_INTERVAL_MS", "75"),
        ],
        || ConfigLoader::load(Some(&config_file)).unwrap(),
    );
    assert_eq!(config.enumeration.close_grace_ms, 250);
    assert_eq!(config.enumeration.reaper_interval_ms, 75);
}

#[test]
fn test_malformed_file_is_a_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("cimpull.toml");
    std::fs::write(&config_file, "[enumeration\nmax_open_contexts = ").unwrap();

    assert!(matches!(
        ConfigLoader::load_with_env(Some(&config_file), Some(Default::default())),
        Err(EnumerationError::ConfigError(_))
    ));
}

#[test]
fn test_rendered_config_loads_back() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("effective.toml");

    let mut config = ServerConfig::default();
    config.enumeration.max_consecutive_zero_pulls = 10;
    config.logging.level = "debug".to_string();
    std::fs::write(&config_file, config.to_toml().unwrap()).unwrap();

    let loaded = ConfigLoader::load_with_env(Some(&config_file), Some(Default::default())).unwrap();
    assert_eq!(loaded, config);
}

#[tokio::test]
async fn test_object_manager_applies_limits() {
    let mut config = ServerConfig::default();
    config.enumeration.max_open_contexts = 1;
    config.logging.level = "off".to_string();
    let providers = ProviderRegistry::new().with(StaticProvider::new(CLASS, numbered(10)));

    let manager = ObjectManager::start(config, providers).unwrap();
    let dispatcher = manager.dispatcher();
    open_context(&dispatcher).await;
    assert_eq!(
        dispatcher.open(&owner(), open_request(0)).await.unwrap_err(),
        EnumerationError::TooManyContexts { limit: 1 }
    );
    manager.shutdown().await;
}
