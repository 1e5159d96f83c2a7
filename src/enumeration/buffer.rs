//! Result buffer
//!
//! Ordered, append-only-until-terminal queue of values produced for one
//! enumeration. The provider task is the only writer (through [`ResultSink`]);
//! pulls drain it in FIFO order, so append order is response order.
//!
//! Terminal markers are first-wins: once complete or faulted, later
//! `mark_complete`/`mark_faulted` calls are no-ops and appends fail with
//! [`BufferError::BufferClosed`]. Releasing the buffer (context closed) drops
//! whatever is still queued and rejects every later append.

use crate::enumeration::cancel::CancelSignal;
use crate::enumeration::ContextId;
use crate::error::{BufferError, SinkError};
use crate::provider::ProviderFault;
use crate::value::Value;
use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq)]
enum Terminal {
    Complete,
    Faulted(ProviderFault),
}

/// Items removed by one drain
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrainOutcome {
    pub items: Vec<Value>,
    /// Buffer is empty and terminal: nothing more will ever be returned
    pub exhausted: bool,
    /// Provider fault, reported once the items produced before it are gone
    pub fault: Option<ProviderFault>,
}

#[derive(Debug, Default)]
pub struct ResultBuffer {
    items: VecDeque<Value>,
    terminal: Option<Terminal>,
    released: bool,
    appended: u64,
    high_water_mark: usize,
}

impl ResultBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, item: Value) -> Result<(), BufferError> {
        if self.released || self.terminal.is_some() {
            return Err(BufferError::BufferClosed);
        }
        self.items.push_back(item);
        self.appended += 1;
        self.high_water_mark = self.high_water_mark.max(self.items.len());
        Ok(())
    }

    /// Remove up to `max` items in append order.
    pub fn drain(&mut self, max: usize) -> DrainOutcome {
        let take = max.min(self.items.len());
        let items: Vec<Value> = self.items.drain(..take).collect();
        let exhausted = self.items.is_empty() && (self.terminal.is_some() || self.released);
        let fault = match &self.terminal {
            Some(Terminal::Faulted(fault)) if exhausted => Some(fault.clone()),
            _ => None,
        };
        DrainOutcome {
            items,
            exhausted,
            fault,
        }
    }

    /// Returns true if this call set the terminal marker.
    pub fn mark_complete(&mut self) -> bool {
        if self.terminal.is_some() || self.released {
            return false;
        }
        self.terminal = Some(Terminal::Complete);
        true
    }

    /// Returns true if this call set the terminal marker.
    pub fn mark_faulted(&mut self, fault: ProviderFault) -> bool {
        if self.terminal.is_some() || self.released {
            return false;
        }
        self.terminal = Some(Terminal::Faulted(fault));
        true
    }

    /// Drop queued items and refuse further appends. Returns the number discarded.
    pub fn release(&mut self) -> usize {
        self.released = true;
        let discarded = self.items.len();
        self.items.clear();
        discarded
    }

    /// Turn a completed buffer into a faulted one. Only used when a provider
    /// appends after completing, which is a provider bug rather than a fault it
    /// reported.
    pub(crate) fn poison(&mut self, fault: ProviderFault) {
        if matches!(self.terminal, Some(Terminal::Complete)) && !self.released {
            self.terminal = Some(Terminal::Faulted(fault));
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.terminal, Some(Terminal::Complete))
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self.terminal, Some(Terminal::Faulted(_)))
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn fault(&self) -> Option<&ProviderFault> {
        match &self.terminal {
            Some(Terminal::Faulted(fault)) => Some(fault),
            _ => None,
        }
    }

    /// Total items ever appended
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Largest number of items queued at once
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }
}

/// Buffer shared between a provider task and the pulls of one context
#[derive(Debug)]
pub(crate) struct SharedBuffer {
    state: Mutex<ResultBuffer>,
    /// Signalled on append and on terminal transitions
    data_ready: Notify,
    /// Signalled when a drain or release frees space
    space_ready: Notify,
    capacity: usize,
    producer_paused: AtomicBool,
}

impl SharedBuffer {
    pub(crate) fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ResultBuffer::new()),
            data_ready: Notify::new(),
            space_ready: Notify::new(),
            capacity: capacity.max(1),
            producer_paused: AtomicBool::new(false),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ResultBuffer> {
        self.state.lock()
    }

    pub(crate) fn drain(&self, max: usize) -> DrainOutcome {
        let outcome = self.state.lock().drain(max);
        if !outcome.items.is_empty() {
            self.space_ready.notify_waiters();
        }
        outcome
    }

    pub(crate) fn mark_complete(&self) -> bool {
        let changed = self.state.lock().mark_complete();
        self.data_ready.notify_waiters();
        changed
    }

    pub(crate) fn mark_faulted(&self, fault: ProviderFault) -> bool {
        let changed = self.state.lock().mark_faulted(fault);
        self.data_ready.notify_waiters();
        changed
    }

    pub(crate) fn release(&self) -> usize {
        let discarded = self.state.lock().release();
        self.data_ready.notify_waiters();
        self.space_ready.notify_waiters();
        discarded
    }

    /// High watermark at which the provider is paused
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn is_producer_paused(&self) -> bool {
        self.producer_paused.load(Ordering::Acquire)
    }

    /// Wait until `ready` holds or `timeout` elapses. Returns the final verdict.
    pub(crate) async fn wait_until<F>(&self, ready: F, timeout: Duration) -> bool
    where
        F: Fn(&ResultBuffer) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.data_ready.notified();
            tokio::pin!(notified);
            // Register before checking so an append between check and await is not lost
            notified.as_mut().enable();
            if ready(&self.state.lock()) {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return ready(&self.state.lock());
            }
        }
    }
}

/// Provider-side capability: append items, signal completion or fault, observe
/// cancellation.
#[derive(Debug, Clone)]
pub struct ResultSink {
    buffer: Arc<SharedBuffer>,
    cancel: CancelSignal,
    context_id: ContextId,
}

impl ResultSink {
    pub(crate) fn new(buffer: Arc<SharedBuffer>, cancel: CancelSignal, context_id: ContextId) -> Self {
        Self {
            buffer,
            cancel,
            context_id,
        }
    }

    /// Append one item, waiting while the buffer is at its high watermark.
    ///
    /// Fails with [`SinkError::Cancelled`] once the enumeration is cancelled or
    /// closed, and with [`SinkError::BufferClosed`] when called after the
    /// enumeration was marked complete or faulted.
    pub async fn push(&self, item: Value) -> Result<(), SinkError> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(SinkError::Cancelled);
            }

            let space = self.buffer.space_ready.notified();
            tokio::pin!(space);
            space.as_mut().enable();

            {
                let mut buffer = self.buffer.state.lock();
                if buffer.is_released() {
                    return Err(SinkError::Cancelled);
                }
                if buffer.is_terminal() {
                    error!(
                        context_id = %self.context_id,
                        "provider appended after signalling completion"
                    );
                    buffer.poison(ProviderFault::failed(
                        "provider appended items after signalling completion",
                    ));
                    drop(buffer);
                    self.buffer.data_ready.notify_waiters();
                    return Err(SinkError::BufferClosed);
                }
                if buffer.len() < self.buffer.capacity {
                    buffer.append(item)?;
                    drop(buffer);
                    self.buffer.data_ready.notify_waiters();
                    return Ok(());
                }
            }

            debug!(
                context_id = %self.context_id,
                capacity = self.buffer.capacity,
                "result buffer full, pausing provider"
            );
            self.buffer.producer_paused.store(true, Ordering::Release);
            tokio::select! {
                _ = &mut space => {}
                _ = self.cancel.cancelled() => {}
            }
            self.buffer.producer_paused.store(false, Ordering::Release);
        }
    }

    /// Signal normal completion. Idempotent; the first terminal signal wins.
    pub fn complete(&self) -> bool {
        self.buffer.mark_complete()
    }

    /// Signal an unrecoverable error. Items already appended are still delivered.
    pub fn fault(&self, fault: ProviderFault) -> bool {
        self.buffer.mark_faulted(fault)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn context_id(&self) -> &ContextId {
        &self.context_id
    }
}
