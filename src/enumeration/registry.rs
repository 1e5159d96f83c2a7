//! Context registry
//!
//! Process-wide table of live enumeration contexts, bounded by the configured
//! maximum, with a background reaper that closes contexts whose idle deadline
//! has passed.

use crate::config::EnumerationConfig;
use crate::enumeration::context::EnumerationContext;
use crate::enumeration::stats::RegistryStatistics;
use crate::enumeration::{ContextId, OwnerId};
use crate::error::EnumerationError;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Closed,
    TimedOut,
}

struct Reaper {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct ContextRegistry {
    contexts: RwLock<HashMap<ContextId, Arc<EnumerationContext>>>,
    max_open_contexts: usize,
    buffer_capacity: usize,
    close_grace: Duration,
    serial: AtomicU64,
    stats: RwLock<RegistryStatistics>,
    reaper: Mutex<Option<Reaper>>,
}

impl ContextRegistry {
    pub fn new(config: &EnumerationConfig) -> Self {
        Self {
            contexts: RwLock::new(HashMap::new()),
            max_open_contexts: config.max_open_contexts,
            buffer_capacity: config.response_cache_capacity,
            close_grace: config.close_grace(),
            serial: AtomicU64::new(0),
            stats: RwLock::new(RegistryStatistics::default()),
            reaper: Mutex::new(None),
        }
    }

    /// Insert a fresh context in the `Open` state.
    pub fn create(
        &self,
        owner: OwnerId,
        operation_timeout: Duration,
    ) -> Result<Arc<EnumerationContext>, EnumerationError> {
        let mut contexts = self.contexts.write();
        if contexts.len() >= self.max_open_contexts {
            warn!(
                owner = %owner,
                limit = self.max_open_contexts,
                "enumeration context limit reached"
            );
            return Err(EnumerationError::TooManyContexts {
                limit: self.max_open_contexts,
            });
        }

        let serial = self.serial.fetch_add(1, Ordering::Relaxed) + 1;
        let id = ContextId::generate(serial);
        let context = Arc::new(EnumerationContext::new(
            id.clone(),
            owner,
            operation_timeout,
            self.buffer_capacity,
        ));
        contexts.insert(id.clone(), context.clone());
        let current = contexts.len();
        drop(contexts);

        self.stats.write().record_opened(current);
        info!(
            context_id = %id,
            owner = %context.owner(),
            timeout_secs = operation_timeout.as_secs(),
            "enumeration context opened"
        );
        Ok(context)
    }

    /// Find a context owned by `owner`. Foreign and unknown identities look the same.
    pub fn lookup(
        &self,
        id: &ContextId,
        owner: &OwnerId,
    ) -> Result<Arc<EnumerationContext>, EnumerationError> {
        self.contexts
            .read()
            .get(id)
            .filter(|context| context.owner() == owner)
            .cloned()
            .ok_or_else(|| EnumerationError::ContextNotFound(id.clone()))
    }

    pub fn get(&self, id: &ContextId) -> Option<Arc<EnumerationContext>> {
        self.contexts.read().get(id).cloned()
    }

    /// Remove a context from the table. Exactly one caller gets it back.
    pub fn remove(&self, id: &ContextId) -> Option<Arc<EnumerationContext>> {
        self.remove_as(id, Removal::Closed)
    }

    fn remove_as(&self, id: &ContextId, removal: Removal) -> Option<Arc<EnumerationContext>> {
        let mut contexts = self.contexts.write();
        let context = contexts.remove(id)?;
        let current = contexts.len();
        drop(contexts);

        self.stats.write().record_removed(
            &context.statistics(),
            removal == Removal::TimedOut,
            current,
        );
        Some(context)
    }

    /// Remove and shut down a context. Returns false if someone else got there first.
    pub async fn close(&self, id: &ContextId) -> bool {
        match self.remove(id) {
            Some(context) => {
                context.shutdown(self.close_grace).await;
                info!(context_id = %id, "enumeration context closed");
                true
            }
            None => false,
        }
    }

    pub(crate) fn record_response(&self, returned: usize) {
        self.stats.write().record_response(returned);
    }

    pub fn len(&self) -> usize {
        self.contexts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.read().is_empty()
    }

    pub fn close_grace(&self) -> Duration {
        self.close_grace
    }

    /// Close every idle context whose deadline has passed. Contexts with a pull
    /// in flight are left alone. Returns how many were closed.
    pub async fn reap_expired(&self) -> usize {
        let now = Instant::now();
        let candidates: Vec<Arc<EnumerationContext>> = self
            .contexts
            .read()
            .values()
            .filter(|context| context.is_expired(now) && !context.is_draining())
            .cloned()
            .collect();

        let mut reaped = 0;
        for context in candidates {
            let Ok(guard) = context.try_begin_drain() else {
                continue;
            };
            // A pull may have refreshed the deadline since the scan
            if !context.is_expired(Instant::now()) {
                continue;
            }
            if let Some(context) = self.remove_as(context.id(), Removal::TimedOut) {
                warn!(
                    context_id = %context.id(),
                    owner = %context.owner(),
                    buffered = context.buffered(),
                    "enumeration context expired"
                );
                context.shutdown(self.close_grace).await;
                reaped += 1;
            }
            drop(guard);
        }
        reaped
    }

    /// Run [`reap_expired`](Self::reap_expired) every `interval` until stopped.
    pub fn start_reaper(self: &Arc<Self>, interval: Duration) {
        let mut reaper = self.reaper.lock();
        if reaper.is_some() {
            return;
        }

        let (stop, mut stop_rx) = watch::channel(false);
        let registry: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.wait_for(|stopped| *stopped) => break,
                }
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let reaped = registry.reap_expired().await;
                if reaped > 0 {
                    debug!(reaped, remaining = registry.len(), "reaper pass finished");
                }
            }
        });

        *reaper = Some(Reaper { stop, handle });
        info!(interval_ms = interval.as_millis() as u64, "Started enumeration context reaper");
    }

    pub async fn stop_reaper(&self) {
        let reaper = self.reaper.lock().take();
        if let Some(reaper) = reaper {
            reaper.stop.send_replace(true);
            let _ = reaper.handle.await;
            info!("Stopped enumeration context reaper");
        }
    }

    /// Stop the reaper and close every context. In-flight pulls finish first.
    pub async fn shutdown(&self) {
        self.stop_reaper().await;

        let contexts: Vec<Arc<EnumerationContext>> =
            self.contexts.read().values().cloned().collect();
        let closing = contexts.into_iter().map(|context| async move {
            let _guard = context.begin_drain().await;
            match self.remove(context.id()) {
                Some(context) => {
                    context.shutdown(self.close_grace).await;
                    true
                }
                None => false,
            }
        });
        let closed = join_all(closing)
            .await
            .into_iter()
            .filter(|closed| *closed)
            .count();

        info!(closed, "enumeration registry shut down");
        info!("{}", self.statistics().summary());
    }

    pub fn statistics(&self) -> RegistryStatistics {
        let mut stats = self.stats.read().clone();
        stats.current = self.len();
        stats
    }
}
