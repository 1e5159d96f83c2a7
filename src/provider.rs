//! Enumeration providers
//!
//! Providers produce the instances an enumeration streams. The dispatcher only
//! knows them through [`EnumerationProvider`]: given a [`Filter`], append items to
//! the [`ResultSink`] in discovery order and return, or return a
//! [`ProviderFault`]. Providers are looked up by class name in a
//! [`ProviderRegistry`].

use crate::enumeration::ResultSink;
use crate::error::SinkError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

mod static_source;
mod stream;

pub use static_source::StaticProvider;
pub use stream::{StreamProvider, ValueStream};

/// The only query language filters may name
pub const FILTER_QUERY_LANGUAGE: &str = "DMTF:FQL";

/// CIM_ERR_FAILED
pub const FAULT_FAILED: u32 = 1;

/// Error reported by a provider, carried verbatim to the client
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Provider fault {code}: {message}")]
pub struct ProviderFault {
    pub code: u32,
    pub message: String,
}

impl ProviderFault {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Generic failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(FAULT_FAILED, message)
    }
}

impl From<SinkError> for ProviderFault {
    fn from(err: SinkError) -> Self {
        ProviderFault::failed(err.to_string())
    }
}

/// What a client asked to enumerate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub namespace: String,
    pub class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl Filter {
    pub fn class(namespace: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            class_name: class_name.into(),
            query_language: None,
            query: None,
        }
    }

    pub fn with_query(mut self, language: impl Into<String>, query: impl Into<String>) -> Self {
        self.query_language = Some(language.into());
        self.query = Some(query.into());
        self
    }

    /// Check the query part. Query text itself is passed through unevaluated.
    pub fn validate(&self) -> Result<(), String> {
        if self.class_name.trim().is_empty() {
            return Err("class name is empty".to_string());
        }
        match (&self.query_language, &self.query) {
            (None, None) => Ok(()),
            (Some(language), _) if !language.eq_ignore_ascii_case(FILTER_QUERY_LANGUAGE) => {
                Err(format!("unsupported query language {:?}", language))
            }
            (Some(_), Some(query)) if !query.trim().is_empty() => Ok(()),
            (None, Some(_)) => Err("query given without a query language".to_string()),
            (Some(_), _) => Err("query language given without a query".to_string()),
        }
    }
}

/// Producer of enumeration results for one class
#[async_trait]
pub trait EnumerationProvider: Send + Sync {
    /// Class this provider enumerates
    fn class_name(&self) -> &str;

    /// Append matching instances to `sink`, returning when done.
    ///
    /// Should stop promptly once `sink` reports cancellation. Returning `Err`
    /// faults the enumeration after the items already appended are delivered.
    async fn enumerate(&self, filter: &Filter, sink: &ResultSink) -> Result<(), ProviderFault>;
}

/// Providers keyed by class name (case-insensitive)
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn EnumerationProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any previous one for the same class.
    pub fn register(&mut self, provider: Arc<dyn EnumerationProvider>) {
        self.providers
            .insert(provider.class_name().to_ascii_lowercase(), provider);
    }

    pub fn with(mut self, provider: impl EnumerationProvider + 'static) -> Self {
        self.register(Arc::new(provider));
        self
    }

    pub fn get(&self, class_name: &str) -> Option<Arc<dyn EnumerationProvider>> {
        self.providers
            .get(&class_name.to_ascii_lowercase())
            .cloned()
    }

    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .values()
            .map(|p| p.class_name().to_string())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("classes", &self.class_names())
            .finish()
    }
}
