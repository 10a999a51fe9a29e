//! The set of connected streaming clients.

use super::client::{Client, ClientId, ClientState, ClosedReason};
use super::event::SseEvent;
use super::transport::Transport;
use crate::audit;
use crate::core::TransportError;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Tracks live clients and delivers events to them.
///
/// Each client has its own unbounded FIFO queue. Broadcasting only enqueues
/// and attempts a drain, so a slow client never holds back the producer or
/// other clients. A client is removed exactly once, on completion, timeout,
/// error, or a failed write.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<ClientId, Arc<Client>>>,
    broadcasts: AtomicU64,
}

impl ClientRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, id: ClientId) -> Option<Arc<Client>> {
        self.clients
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id)
            .cloned()
    }

    fn snapshot(&self) -> Vec<Arc<Client>> {
        self.clients
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Adds a client writing to `transport`.
    pub fn register(&self, transport: Arc<dyn Transport>) -> ClientId {
        let client = Arc::new(Client::new(transport));
        let id = client.id();
        let count = {
            let mut clients = self.clients.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            clients.insert(id, client);
            clients.len()
        };
        audit::emit_client_registered(&id.to_string(), count);
        id
    }

    /// Removes a client. Returns `false` if it was already gone.
    pub fn remove(&self, id: ClientId, reason: ClosedReason) -> bool {
        let removed = self
            .clients
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&id);
        match removed {
            Some(client) => {
                let undelivered = client.close();
                audit::emit_client_closed(&id.to_string(), reason.as_str(), undelivered);
                true
            }
            None => false,
        }
    }

    /// The transport of `id` can take bytes again.
    pub fn on_writable(&self, id: ClientId) {
        if let Some(client) = self.get(id) {
            if let Err(e) = client.drain() {
                self.fail(&client, &e);
            }
        }
    }

    /// The connection of `id` completed.
    pub fn on_complete(&self, id: ClientId) {
        self.remove(id, ClosedReason::Completed);
    }

    /// The connection of `id` timed out.
    pub fn on_timeout(&self, id: ClientId) {
        self.remove(id, ClosedReason::Timeout);
    }

    /// The connection of `id` failed.
    pub fn on_error(&self, id: ClientId, error: &dyn fmt::Display) {
        tracing::debug!(client_id = %id, error = %error, "Streaming connection failed");
        self.remove(id, ClosedReason::Error);
    }

    fn fail(&self, client: &Client, error: &TransportError) {
        tracing::error!(client_id = %client.id(), error = %error, "Writing to streaming client failed");
        if self.remove(client.id(), ClosedReason::Error) {
            client.transport().complete();
        }
    }

    /// Enqueues `event` on every client and drains each.
    ///
    /// Returns the number of clients the event was queued for.
    pub fn broadcast(&self, event: SseEvent) -> usize {
        let count = self.broadcasts.fetch_add(1, Ordering::Relaxed) + 1;
        let event = Arc::new(event);
        let clients = self.snapshot();
        tracing::debug!(event = count, clients = clients.len(), "Broadcasting event");

        for client in &clients {
            client.enqueue(Arc::clone(&event));
            if let Err(e) = client.drain() {
                self.fail(client, &e);
            }
        }
        clients.len()
    }

    /// Removes every client and completes their connections.
    pub fn close_all(&self) {
        let clients: Vec<Arc<Client>> = self
            .clients
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain()
            .map(|(_, client)| client)
            .collect();
        for client in clients {
            let undelivered = client.close();
            audit::emit_client_closed(&client.id().to_string(), ClosedReason::Shutdown.as_str(), undelivered);
            client.transport().complete();
        }
    }

    /// Returns the number of clients.
    pub fn len(&self) -> usize {
        self.clients.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    /// Returns `true` if no client is connected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the ids of all clients.
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.snapshot().iter().map(|client| client.id()).collect()
    }

    /// Returns the state of a client, `None` once it was removed.
    pub fn state(&self, id: ClientId) -> Option<ClientState> {
        self.get(id).map(|client| client.state())
    }

    /// Returns the number of events queued for a client.
    pub fn pending(&self, id: ClientId) -> Option<usize> {
        self.get(id).map(|client| client.pending())
    }

    /// Returns the number of broadcasts so far.
    pub fn broadcast_count(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::MemoryTransport;

    fn event(data: &str) -> SseEvent {
        SseEvent::new("contentscan/property/result", data)
    }

    #[test]
    fn test_fast_client_not_held_back() {
        let registry = ClientRegistry::new();
        let fast = Arc::new(MemoryTransport::new());
        let slow = Arc::new(MemoryTransport::new());
        registry.register(fast.clone());
        let slow_id = registry.register(slow.clone());
        slow.set_ready(false);

        for n in 0..3 {
            assert_eq!(registry.broadcast(event(&n.to_string())), 2);
        }

        assert_eq!(fast.frames().len(), 3);
        assert!(slow.written().is_empty());
        assert_eq!(registry.pending(slow_id), Some(3));
        assert_eq!(registry.state(slow_id), Some(ClientState::Draining));

        slow.set_ready(true);
        registry.on_writable(slow_id);
        assert_eq!(
            slow.frames(),
            vec![
                "event: contentscan/property/result\ndata: 0\n\n",
                "event: contentscan/property/result\ndata: 1\n\n",
                "event: contentscan/property/result\ndata: 2\n\n",
            ]
        );
        assert_eq!(registry.state(slow_id), Some(ClientState::Idle));
    }

    #[test]
    fn test_write_failure_removes_client() {
        let registry = ClientRegistry::new();
        let broken = Arc::new(MemoryTransport::new());
        let healthy = Arc::new(MemoryTransport::new());
        let broken_id = registry.register(broken.clone());
        registry.register(healthy.clone());
        broken.set_failing(true);

        registry.broadcast(event("x"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.state(broken_id), None);
        assert!(broken.is_completed());
        assert_eq!(healthy.frames().len(), 1);
    }

    #[test]
    fn test_removal_is_idempotent() {
        let registry = ClientRegistry::new();
        let id = registry.register(Arc::new(MemoryTransport::new()));

        registry.on_timeout(id);
        assert!(!registry.remove(id, ClosedReason::Completed));
        registry.on_complete(id);
        registry.on_error(id, &"late");
        registry.on_writable(id);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_broadcast_without_clients() {
        let registry = ClientRegistry::new();
        assert_eq!(registry.broadcast(event("x")), 0);
        assert_eq!(registry.broadcast_count(), 1);
    }

    #[test]
    fn test_close_all_completes_transports() {
        let registry = ClientRegistry::new();
        let transport = Arc::new(MemoryTransport::new());
        registry.register(transport.clone());

        registry.close_all();
        assert!(registry.is_empty());
        assert!(transport.is_completed());
    }
}
