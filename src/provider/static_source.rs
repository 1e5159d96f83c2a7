//! Provider over a fixed list of instances.

use super::{EnumerationProvider, Filter, ProviderFault};
use crate::enumeration::ResultSink;
use crate::value::Value;
use async_trait::async_trait;
use std::time::Duration;

/// Enumerates a fixed set of values, optionally pacing them or faulting part way.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    class_name: String,
    items: Vec<Value>,
    item_delay: Option<Duration>,
    fail_after: Option<(usize, ProviderFault)>,
}

impl StaticProvider {
    pub fn new(class_name: impl Into<String>, items: Vec<Value>) -> Self {
        Self {
            class_name: class_name.into(),
            items,
            item_delay: None,
            fail_after: None,
        }
    }

    /// Sleep before producing each item
    pub fn with_item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = Some(delay);
        self
    }

    /// Report `fault` after producing `count` items
    pub fn fail_after(mut self, count: usize, fault: ProviderFault) -> Self {
        self.fail_after = Some((count, fault));
        self
    }
}

#[async_trait]
impl EnumerationProvider for StaticProvider {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    async fn enumerate(&self, _filter: &Filter, sink: &ResultSink) -> Result<(), ProviderFault> {
        for (index, item) in self.items.iter().enumerate() {
            if let Some((count, fault)) = &self.fail_after {
                if index == *count {
                    return Err(fault.clone());
                }
            }
            if let Some(delay) = self.item_delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = sink.cancelled() => return Ok(()),
                }
            }
            sink.push(item.clone()).await?;
        }

        match &self.fail_after {
            Some((count, fault)) if *count >= self.items.len() => Err(fault.clone()),
            _ => Ok(()),
        }
    }
}
