//! Connection transports of streaming clients.

use super::registry::ClientRegistry;
use super::ClientId;
use crate::core::TransportError;

use futures::Stream;
use std::fmt::Debug;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// The write side of one streaming connection.
///
/// All methods are non-blocking. A transport that reports not ready must
/// later tell the registry through
/// [`ClientRegistry::on_writable`] when it can take bytes again.
pub trait Transport: Send + Sync + Debug {
    /// Returns `true` if a write would be accepted right now.
    fn is_ready(&self) -> bool;

    /// Writes one frame.
    fn write(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Pushes written frames towards the peer.
    fn flush(&self) -> Result<(), TransportError>;

    /// Ends the connection.
    fn complete(&self);
}

/// A transport that records frames in memory.
///
/// Readiness is controlled by the test: either directly or through a write
/// budget after which the transport reports not ready.
#[derive(Debug)]
pub struct MemoryTransport {
    ready: AtomicBool,
    budget: Mutex<Option<usize>>,
    failing: AtomicBool,
    completed: AtomicBool,
    flushes: AtomicUsize,
    written: Mutex<Vec<u8>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Creates a ready transport.
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            budget: Mutex::new(None),
            failing: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            flushes: AtomicUsize::new(0),
            written: Mutex::new(Vec::new()),
        }
    }

    /// Sets readiness.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Allows `writes` more writes before reporting not ready. `None` lifts the limit.
    pub fn set_write_budget(&self, writes: Option<usize>) {
        *self.budget.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = writes;
    }

    /// Makes every write fail, or stops doing so.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns `true` once the connection was ended.
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns how often the transport was flushed.
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Returns everything written, as text.
    pub fn written(&self) -> String {
        let written = self.written.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&written).into_owned()
    }

    /// Returns the written frames.
    pub fn frames(&self) -> Vec<String> {
        self.written()
            .split_inclusive("\n\n")
            .map(str::to_string)
            .collect()
    }
}

impl Transport for MemoryTransport {
    fn is_ready(&self) -> bool {
        let within_budget = self
            .budget
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .map_or(true, |left| left > 0);
        within_budget && self.ready.load(Ordering::SeqCst) && !self.is_completed()
    }

    fn write(&self, frame: &[u8]) -> Result<(), TransportError> {
        if self.is_completed() {
            return Err(TransportError::Closed);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "connection reset by peer",
            )));
        }
        if let Some(left) = self
            .budget
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_mut()
        {
            *left = left.saturating_sub(1);
        }
        self.written
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(frame);
        Ok(())
    }

    fn flush(&self) -> Result<(), TransportError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn complete(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }
}

/// A transport feeding a bounded channel read by an [`SseStream`].
#[derive(Debug)]
pub struct ChannelTransport {
    sender: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
}

impl ChannelTransport {
    fn sender(&self) -> Option<mpsc::Sender<Vec<u8>>> {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Transport for ChannelTransport {
    fn is_ready(&self) -> bool {
        self.sender().map_or(false, |sender| sender.capacity() > 0)
    }

    fn write(&self, frame: &[u8]) -> Result<(), TransportError> {
        let sender = self.sender().ok_or(TransportError::Closed)?;
        sender.try_send(frame.to_vec()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Refused {
                reason: "stream buffer is full".into(),
            },
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    fn flush(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn complete(&self) {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }
}

/// The body of one streaming response.
///
/// Yields encoded frames. After each frame it signals writability to the
/// registry so that queued events move on; when it ends or is dropped the
/// client is removed.
#[derive(Debug)]
pub struct SseStream {
    id: ClientId,
    receiver: mpsc::Receiver<Vec<u8>>,
    registry: Arc<ClientRegistry>,
    done: bool,
}

impl SseStream {
    /// Returns the id of the client behind this stream.
    pub fn client_id(&self) -> ClientId {
        self.id
    }

    /// Ends the stream and removes the client.
    pub fn close(&mut self) {
        if !self.done {
            self.done = true;
            self.receiver.close();
            self.registry.on_complete(self.id);
        }
    }
}

impl Stream for SseStream {
    type Item = Vec<u8>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.receiver.poll_recv(cx) {
            Poll::Ready(Some(frame)) => {
                this.registry.on_writable(this.id);
                Poll::Ready(Some(frame))
            }
            Poll::Ready(None) => {
                this.close();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for SseStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Registers a client whose frames are read from the returned stream.
///
/// `capacity` is the number of frames buffered before the client counts as
/// not ready.
pub fn channel_client(registry: &Arc<ClientRegistry>, capacity: usize) -> SseStream {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let transport = Arc::new(ChannelTransport {
        sender: Mutex::new(Some(sender)),
    });
    let id = registry.register(transport);
    SseStream {
        id,
        receiver,
        registry: Arc::clone(registry),
        done: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::SseEvent;
    use futures::StreamExt;

    #[test]
    fn test_memory_transport_budget() {
        let transport = MemoryTransport::new();
        transport.set_write_budget(Some(1));
        assert!(transport.is_ready());
        transport.write(b"event: a\ndata: 1\n\n").unwrap();
        assert!(!transport.is_ready());

        transport.set_write_budget(None);
        assert!(transport.is_ready());
        transport.write(b"event: a\ndata: 2\n\n").unwrap();
        assert_eq!(transport.frames(), vec!["event: a\ndata: 1\n\n", "event: a\ndata: 2\n\n"]);
    }

    #[tokio::test]
    async fn test_channel_stream_delivers_backlog() {
        let registry = Arc::new(ClientRegistry::new());
        let mut stream = channel_client(&registry, 1);

        for n in 0..3 {
            registry.broadcast(SseEvent::new("t", n.to_string()));
        }
        assert_eq!(registry.pending(stream.client_id()), Some(2));

        let mut frames = Vec::new();
        for _ in 0..3 {
            let frame = stream.next().await.unwrap();
            frames.push(String::from_utf8(frame).unwrap());
        }
        assert_eq!(frames, vec!["event: t\ndata: 0\n\n", "event: t\ndata: 1\n\n", "event: t\ndata: 2\n\n"]);
        assert_eq!(registry.pending(stream.client_id()), Some(0));
    }

    #[tokio::test]
    async fn test_dropping_stream_removes_client() {
        let registry = Arc::new(ClientRegistry::new());
        let stream = channel_client(&registry, 4);
        assert_eq!(registry.len(), 1);

        drop(stream);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_completed_transport_ends_stream() {
        let registry = Arc::new(ClientRegistry::new());
        let mut stream = channel_client(&registry, 4);
        registry.broadcast(SseEvent::new("t", "last"));

        registry.close_all();
        assert_eq!(stream.next().await.map(|f| f.len()), Some("event: t\ndata: last\n\n".len()));
        assert!(stream.next().await.is_none());
    }
}
