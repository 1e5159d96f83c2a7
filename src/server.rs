//! Object manager bootstrap
//!
//! Owns the enumeration engine for the lifetime of a server: load
//! configuration, install logging, start the dispatcher and its reaper, and
//! close every context on shutdown.

use crate::config::{ConfigLoader, ServerConfig};
use crate::dispatcher::EnumerationDispatcher;
use crate::logging::init_logging;
use crate::provider::ProviderRegistry;
use anyhow::Context as _;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct ObjectManager {
    config: ServerConfig,
    dispatcher: Arc<EnumerationDispatcher>,
}

impl ObjectManager {
    /// Load configuration (file optional), install logging and start.
    pub fn bootstrap(config_path: Option<&Path>, providers: ProviderRegistry) -> anyhow::Result<Self> {
        let config = ConfigLoader::load(config_path).with_context(|| match config_path {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Failed to load configuration".to_string(),
        })?;
        init_logging(&config.logging).context("Failed to initialize logging")?;
        Self::start(config, providers)
    }

    /// Start with an already-built configuration. Requires a tokio runtime.
    pub fn start(config: ServerConfig, providers: ProviderRegistry) -> anyhow::Result<Self> {
        config.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!("Invalid configuration:\n{}", messages.join("\n"))
        })?;

        let dispatcher = Arc::new(EnumerationDispatcher::new(
            config.enumeration.clone(),
            providers,
        ));
        dispatcher.start();
        info!(
            max_open_contexts = config.enumeration.max_open_contexts,
            classes = ?dispatcher.providers().class_names(),
            "object manager started"
        );
        Ok(Self { config, dispatcher })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle for the transport layer
    pub fn dispatcher(&self) -> Arc<EnumerationDispatcher> {
        self.dispatcher.clone()
    }

    pub async fn shutdown(self) {
        self.dispatcher.shutdown().await;
        info!("object manager stopped");
    }
}
