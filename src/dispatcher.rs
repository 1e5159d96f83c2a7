//! Operation dispatcher
//!
//! Open/Pull/Close against the context registry. Open validates the request,
//! creates a context, starts its provider on a tokio task and returns whatever
//! arrived within the initial wait. Pull drains the next batch under the
//! context's drain right. Close cancels the provider and releases the context.

use crate::config::EnumerationConfig;
use crate::enumeration::buffer::{DrainOutcome, ResultBuffer};
use crate::enumeration::context::DrainGuard;
use crate::enumeration::{
    ContextId, ContextRegistry, EnumerationContext, OwnerId, RegistryStatistics, ResultSink,
};
use crate::error::EnumerationError;
use crate::provider::{EnumerationProvider, Filter, ProviderFault, ProviderRegistry};
use crate::value::Value;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenRequest {
    pub filter: Filter,
    pub max_object_count: u32,
    /// Idle timeout in seconds; server default when absent
    #[serde(default)]
    pub operation_timeout: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpenResponse {
    /// Absent when the whole result set fit in this response
    pub context_id: Option<ContextId>,
    pub items: Vec<Value>,
    pub end_of_sequence: bool,
    pub fault: Option<ProviderFault>,
    pub items_available: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PullRequest {
    pub context_id: ContextId,
    pub max_object_count: u32,
    /// How long to wait on an empty buffer; capped by the configured pull wait
    pub wait: Option<Duration>,
}

impl PullRequest {
    pub fn new(context_id: ContextId, max_object_count: u32) -> Self {
        Self {
            context_id,
            max_object_count,
            wait: None,
        }
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = Some(wait);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PullResponse {
    pub items: Vec<Value>,
    pub end_of_sequence: bool,
    pub fault: Option<ProviderFault>,
    pub items_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    /// Unknown, expired, already closed or someone else's
    NotFound,
}

/// Result of one drain under the drain right
struct Batch {
    outcome: DrainOutcome,
    items_available: bool,
}

pub struct EnumerationDispatcher {
    registry: Arc<ContextRegistry>,
    providers: ProviderRegistry,
    config: EnumerationConfig,
}

impl EnumerationDispatcher {
    pub fn new(config: EnumerationConfig, providers: ProviderRegistry) -> Self {
        Self {
            registry: Arc::new(ContextRegistry::new(&config)),
            providers,
            config,
        }
    }

    /// Start background expiry of idle contexts. Requires a tokio runtime.
    pub fn start(&self) {
        self.registry.start_reaper(self.config.reaper_interval());
    }

    pub fn registry(&self) -> &Arc<ContextRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EnumerationConfig {
        &self.config
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn statistics(&self) -> RegistryStatistics {
        self.registry.statistics()
    }

    pub async fn open(
        &self,
        owner: &OwnerId,
        request: OpenRequest,
    ) -> Result<OpenResponse, EnumerationError> {
        let max = self.check_max_count(request.max_object_count)?;
        let timeout = self.operation_timeout(request.operation_timeout)?;
        let provider = self.resolve_provider(&request.filter)?;

        let context = self.registry.create(owner.clone(), timeout)?;
        let guard = context.try_begin_drain()?;

        let handle = tokio::spawn(drive_provider(
            provider,
            request.filter.clone(),
            context.sink(),
        ));
        context.attach_producer(handle);

        if max > 0 {
            // The provider pauses at capacity, so a larger batch can never fill
            let target = max.min(context.buffer().capacity());
            context
                .buffer()
                .wait_until(
                    |buffer| buffer.len() >= target || is_settled(buffer),
                    self.config.open_wait(),
                )
                .await;
        }
        let batch = self.take_batch(&context, request.max_object_count, false);

        debug!(
            context_id = %context.id(),
            owner = %owner,
            class_name = %request.filter.class_name,
            returned = batch.outcome.items.len(),
            exhausted = batch.outcome.exhausted,
            "open"
        );

        let context_id = self.finish_batch(&context, guard, &batch).await;
        Ok(OpenResponse {
            context_id,
            end_of_sequence: batch.outcome.exhausted,
            items: batch.outcome.items,
            fault: batch.outcome.fault,
            items_available: batch.items_available,
        })
    }

    pub async fn pull(
        &self,
        owner: &OwnerId,
        request: PullRequest,
    ) -> Result<PullResponse, EnumerationError> {
        let max = self.check_max_count(request.max_object_count)?;
        let context = self.registry.lookup(&request.context_id, owner)?;
        let guard = context.try_begin_drain()?;
        if context.is_closed() {
            return Err(EnumerationError::ContextNotFound(request.context_id));
        }

        if max > 0 {
            let wait = request
                .wait
                .map_or(self.config.pull_wait(), |wait| wait.min(self.config.pull_wait()));
            context
                .buffer()
                .wait_until(|buffer| !buffer.is_empty() || is_settled(buffer), wait)
                .await;
        }
        let batch = self.take_batch(&context, request.max_object_count, true);

        debug!(
            context_id = %context.id(),
            owner = %owner,
            requested = request.max_object_count,
            returned = batch.outcome.items.len(),
            exhausted = batch.outcome.exhausted,
            "pull"
        );

        let consecutive_zero = context.statistics().consecutive_zero_pulls;
        if consecutive_zero > self.config.max_consecutive_zero_pulls {
            self.registry.close(context.id()).await;
            drop(guard);
            warn!(
                context_id = %request.context_id,
                consecutive_zero,
                "closing context after too many zero-count pulls"
            );
            return Err(EnumerationError::ServerLimitsExceeded(format!(
                "more than {} consecutive pulls with a max object count of 0",
                self.config.max_consecutive_zero_pulls
            )));
        }

        self.finish_batch(&context, guard, &batch).await;
        Ok(PullResponse {
            end_of_sequence: batch.outcome.exhausted,
            items: batch.outcome.items,
            fault: batch.outcome.fault,
            items_available: batch.items_available,
        })
    }

    pub async fn close(&self, owner: &OwnerId, context_id: &ContextId) -> CloseOutcome {
        let Ok(context) = self.registry.lookup(context_id, owner) else {
            debug!(context_id = %context_id, owner = %owner, "close of unknown context");
            return CloseOutcome::NotFound;
        };

        let _guard = context.begin_drain().await;
        if self.registry.close(context_id).await {
            CloseOutcome::Closed
        } else {
            CloseOutcome::NotFound
        }
    }

    /// Close every context and stop the reaper.
    pub async fn shutdown(&self) {
        info!(open = self.registry.len(), "shutting down enumeration dispatcher");
        self.registry.shutdown().await;
    }

    fn check_max_count(&self, requested: u32) -> Result<usize, EnumerationError> {
        if requested > self.config.max_object_count {
            return Err(EnumerationError::InvalidMaxCount {
                requested,
                limit: self.config.max_object_count,
            });
        }
        Ok(requested as usize)
    }

    fn operation_timeout(&self, requested: Option<u32>) -> Result<Duration, EnumerationError> {
        let limit = self.config.max_operation_timeout_secs;
        match requested {
            None => Ok(self.config.default_operation_timeout()),
            Some(secs) if (1..=limit).contains(&secs) => Ok(Duration::from_secs(u64::from(secs))),
            Some(secs) => Err(EnumerationError::InvalidOperationTimeout {
                requested: secs,
                limit,
            }),
        }
    }

    fn resolve_provider(
        &self,
        filter: &Filter,
    ) -> Result<Arc<dyn EnumerationProvider>, EnumerationError> {
        filter.validate().map_err(EnumerationError::InvalidFilter)?;
        self.providers.get(&filter.class_name).ok_or_else(|| {
            EnumerationError::InvalidFilter(format!(
                "no provider registered for class {}",
                filter.class_name
            ))
        })
    }

    fn take_batch(&self, context: &EnumerationContext, requested: u32, is_pull: bool) -> Batch {
        let outcome = context.buffer().drain(requested as usize);
        let items_available = !context.buffer().lock().is_empty();
        context.record_response(requested, outcome.items.len(), is_pull);
        self.registry.record_response(outcome.items.len());
        Batch {
            outcome,
            items_available,
        }
    }

    /// Close the context if the batch exhausted it, otherwise refresh its idle
    /// deadline. Returns the identity the client keeps using, if any.
    async fn finish_batch(
        &self,
        context: &Arc<EnumerationContext>,
        guard: DrainGuard,
        batch: &Batch,
    ) -> Option<ContextId> {
        if batch.outcome.exhausted {
            // Removed while still draining, so no later pull sees the identity
            self.registry.close(context.id()).await;
            drop(guard);
            None
        } else {
            context.refresh_deadline();
            drop(guard);
            Some(context.id().clone())
        }
    }
}

/// Complete or faulted: the provider will add nothing more
fn is_settled(buffer: &ResultBuffer) -> bool {
    buffer.is_terminal() || buffer.is_released()
}

/// Run one provider to completion and record how it ended.
async fn drive_provider(provider: Arc<dyn EnumerationProvider>, filter: Filter, sink: ResultSink) {
    let outcome = AssertUnwindSafe(provider.enumerate(&filter, &sink))
        .catch_unwind()
        .await;

    if sink.is_cancelled() {
        debug!(context_id = %sink.context_id(), "provider stopped after cancellation");
        return;
    }

    match outcome {
        Ok(Ok(())) => {
            sink.complete();
            debug!(context_id = %sink.context_id(), "provider completed");
        }
        Ok(Err(fault)) => {
            warn!(
                context_id = %sink.context_id(),
                code = fault.code,
                message = %fault.message,
                "provider reported a fault"
            );
            sink.fault(fault);
        }
        Err(_) => {
            error!(context_id = %sink.context_id(), "provider panicked");
            sink.fault(ProviderFault::failed("provider terminated unexpectedly"));
        }
    }
}
