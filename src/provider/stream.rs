//! Provider adapter over an async stream of values.

use super::{EnumerationProvider, Filter, ProviderFault};
use crate::enumeration::ResultSink;
use crate::error::SinkError;
use crate::value::Value;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

/// Items or a terminal fault, in discovery order
pub type ValueStream = BoxStream<'static, Result<Value, ProviderFault>>;

type StreamFactory = dyn Fn(&Filter) -> ValueStream + Send + Sync;

/// Wraps a function that opens a fresh [`ValueStream`] per enumeration.
///
/// The stream is polled only while the sink has room, so a slow client pauses
/// the source. The first `Err` item ends the enumeration with that fault.
pub struct StreamProvider {
    class_name: String,
    factory: Box<StreamFactory>,
}

impl StreamProvider {
    pub fn new<F>(class_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Filter) -> ValueStream + Send + Sync + 'static,
    {
        Self {
            class_name: class_name.into(),
            factory: Box::new(factory),
        }
    }
}

impl std::fmt::Debug for StreamProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamProvider")
            .field("class_name", &self.class_name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EnumerationProvider for StreamProvider {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    async fn enumerate(&self, filter: &Filter, sink: &ResultSink) -> Result<(), ProviderFault> {
        let mut stream = (self.factory)(filter);
        let mut produced = 0usize;
        loop {
            let next = tokio::select! {
                next = stream.next() => next,
                _ = sink.cancelled() => None,
            };
            let Some(item) = next else {
                break;
            };
            match sink.push(item?).await {
                Ok(()) => produced += 1,
                Err(SinkError::Cancelled) => break,
                Err(err) => return Err(err.into()),
            }
        }
        debug!(
            context_id = %sink.context_id(),
            class_name = %self.class_name,
            produced,
            cancelled = sink.is_cancelled(),
            "stream provider finished"
        );
        Ok(())
    }
}
