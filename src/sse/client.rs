//! Per-connection state of a streaming client.

use super::event::SseEvent;
use super::transport::Transport;
use crate::core::TransportError;

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Identifies a streaming client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(Uuid);

impl ClientId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery state of a client.
///
/// `Open -> Draining <-> Idle -> Closed`. A client stays `Draining` while
/// backpressure holds events back, until the transport reports writability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Registered, nothing delivered yet.
    Open,
    /// Events are being written, or wait for the transport.
    Draining,
    /// Every queued event was written.
    Idle,
    /// Removed from the registry.
    Closed,
}

/// Why a client was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedReason {
    /// The connection completed.
    Completed,
    /// The connection timed out.
    Timeout,
    /// The connection or a write failed.
    Error,
    /// The registry shut down.
    Shutdown,
}

impl ClosedReason {
    /// Returns the name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Timeout => "timeout",
            Self::Error => "error",
            Self::Shutdown => "shutdown",
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
pub(crate) struct Client {
    id: ClientId,
    transport: Arc<dyn Transport>,
    queue: Mutex<VecDeque<Arc<SseEvent>>>,
    state: Mutex<ClientState>,
    drain_lock: Mutex<()>,
}

impl Client {
    pub(crate) fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            id: ClientId::new(),
            transport,
            queue: Mutex::new(VecDeque::new()),
            state: Mutex::new(ClientState::Open),
            drain_lock: Mutex::new(()),
        }
    }

    pub(crate) fn id(&self) -> ClientId {
        self.id
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub(crate) fn state(&self) -> ClientState {
        *lock(&self.state)
    }

    pub(crate) fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Appends an event. Events for a closed client are dropped.
    pub(crate) fn enqueue(&self, event: Arc<SseEvent>) {
        if self.state() == ClientState::Closed {
            return;
        }
        lock(&self.queue).push_back(event);
    }

    /// Writes queued events while the transport is ready.
    ///
    /// Only one drain runs per client at a time. Returns the number of events
    /// written.
    pub(crate) fn drain(&self) -> Result<usize, TransportError> {
        let _drain = lock(&self.drain_lock);
        {
            let mut state = lock(&self.state);
            if *state == ClientState::Closed {
                return Ok(0);
            }
            *state = ClientState::Draining;
        }

        let mut written = 0;
        while self.transport.is_ready() {
            let Some(event) = lock(&self.queue).pop_front() else {
                break;
            };
            self.transport.write(event.to_wire().as_bytes())?;
            written += 1;
            self.flush_if_ready()?;
        }
        self.flush_if_ready()?;

        if lock(&self.queue).is_empty() {
            let mut state = lock(&self.state);
            if *state == ClientState::Draining {
                *state = ClientState::Idle;
            }
        }
        Ok(written)
    }

    fn flush_if_ready(&self) -> Result<(), TransportError> {
        if self.transport.is_ready() {
            self.transport.flush()?;
        }
        Ok(())
    }

    /// Marks the client closed and drops undelivered events.
    ///
    /// Returns the number of dropped events.
    pub(crate) fn close(&self) -> usize {
        *lock(&self.state) = ClientState::Closed;
        let mut queue = lock(&self.queue);
        let undelivered = queue.len();
        queue.clear();
        undelivered
    }
}
