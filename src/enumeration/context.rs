//! Enumeration context
//!
//! One resumable traversal: the result buffer, the provider task feeding it,
//! the idle deadline and the drain right that serializes pulls.

use crate::enumeration::buffer::{ResultSink, SharedBuffer};
use crate::enumeration::cancel::{cancel_pair, CancelHandle, CancelSignal};
use crate::enumeration::stats::ContextStatistics;
use crate::enumeration::{ContextId, OwnerId};
use crate::error::EnumerationError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Lifecycle state, derived from the buffer, the provider task and the drain right
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextState {
    /// Created, provider not started
    Open,
    /// Provider task running and appending
    Producing,
    /// Waiting for the next pull
    Idle,
    /// A pull holds the drain right
    Draining,
    Closed,
    /// Closed after delivering a provider fault
    Faulted,
}

impl ContextState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContextState::Closed | ContextState::Faulted)
    }
}

/// Exclusive right to drain a context. Released when dropped.
#[derive(Debug)]
pub struct DrainGuard {
    _guard: OwnedMutexGuard<()>,
}

pub struct EnumerationContext {
    id: ContextId,
    owner: OwnerId,
    operation_timeout: Duration,
    created_at: Instant,
    deadline: Mutex<Instant>,
    buffer: Arc<SharedBuffer>,
    drain_lock: Arc<AsyncMutex<()>>,
    cancel: CancelHandle,
    cancel_signal: CancelSignal,
    producer: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
    closed: AtomicBool,
    stats: Mutex<ContextStatistics>,
}

impl std::fmt::Debug for EnumerationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnumerationContext")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("state", &self.state())
            .field("buffered", &self.buffered())
            .finish()
    }
}

impl EnumerationContext {
    pub(crate) fn new(
        id: ContextId,
        owner: OwnerId,
        operation_timeout: Duration,
        buffer_capacity: usize,
    ) -> Self {
        let now = Instant::now();
        let (cancel, cancel_signal) = cancel_pair();
        Self {
            id,
            owner,
            operation_timeout,
            created_at: now,
            deadline: Mutex::new(now + operation_timeout),
            buffer: SharedBuffer::new(buffer_capacity),
            drain_lock: Arc::new(AsyncMutex::new(())),
            cancel,
            cancel_signal,
            producer: Mutex::new(None),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            stats: Mutex::new(ContextStatistics::default()),
        }
    }

    pub fn id(&self) -> &ContextId {
        &self.id
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    pub fn state(&self) -> ContextState {
        if self.closed.load(Ordering::Acquire) {
            return if self.buffer.lock().is_faulted() {
                ContextState::Faulted
            } else {
                ContextState::Closed
            };
        }
        if self.drain_lock.try_lock().is_err() {
            return ContextState::Draining;
        }
        if !self.started.load(Ordering::Acquire) {
            return ContextState::Open;
        }
        let producing = self
            .producer
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        if producing && !self.buffer.is_producer_paused() && !self.buffer.lock().is_terminal() {
            ContextState::Producing
        } else {
            ContextState::Idle
        }
    }

    /// Sink handed to the provider feeding this context
    pub fn sink(&self) -> ResultSink {
        ResultSink::new(
            self.buffer.clone(),
            self.cancel_signal.clone(),
            self.id.clone(),
        )
    }

    pub(crate) fn buffer(&self) -> &Arc<SharedBuffer> {
        &self.buffer
    }

    /// Record the spawned provider task. The context owns it from here on.
    pub(crate) fn attach_producer(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.producer.lock().replace(handle) {
            previous.abort();
        }
        self.started.store(true, Ordering::Release);
    }

    /// Items currently buffered
    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Take the drain right without waiting.
    pub fn try_begin_drain(&self) -> Result<DrainGuard, EnumerationError> {
        self.drain_lock
            .clone()
            .try_lock_owned()
            .map(|guard| DrainGuard { _guard: guard })
            .map_err(|_| EnumerationError::ConcurrentPullNotAllowed(self.id.clone()))
    }

    /// Wait for any in-flight pull to release the drain right.
    pub async fn begin_drain(&self) -> DrainGuard {
        DrainGuard {
            _guard: self.drain_lock.clone().lock_owned().await,
        }
    }

    pub fn is_draining(&self) -> bool {
        self.drain_lock.try_lock().is_err()
    }

    /// Push the idle deadline out by the operation timeout.
    pub fn refresh_deadline(&self) {
        *self.deadline.lock() = Instant::now() + self.operation_timeout;
    }

    pub fn deadline(&self) -> Instant {
        *self.deadline.lock()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Account one response; returns the updated snapshot.
    pub(crate) fn record_response(&self, requested: u32, returned: usize, is_pull: bool) -> ContextStatistics {
        let mut stats = self.stats.lock();
        stats.record_response(requested, returned);
        if is_pull {
            stats.pulls += 1;
        }
        stats.clone()
    }

    pub fn statistics(&self) -> ContextStatistics {
        let mut snapshot = self.stats.lock().clone();
        snapshot.buffer_high_water_mark = self.buffer.lock().high_water_mark();
        snapshot.age = self.created_at.elapsed();
        snapshot
    }

    /// Cancel the provider, wait up to `grace` for it to stop, then release the
    /// buffer. Safe to call more than once.
    pub async fn shutdown(&self, grace: Duration) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();

        let producer = self.producer.lock().take();
        if let Some(mut handle) = producer {
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                warn!(
                    context_id = %self.id,
                    grace_ms = grace.as_millis() as u64,
                    "provider did not acknowledge cancellation, aborting"
                );
                handle.abort();
            }
        }

        let discarded = self.buffer.release();
        debug!(context_id = %self.id, discarded, "enumeration context released");
    }
}

impl Drop for EnumerationContext {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.producer.get_mut().take() {
            handle.abort();
        }
    }
}
