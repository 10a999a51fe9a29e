//! Live streaming of scan results as Server-Sent Events.
//!
//! [`SseBroadcaster`] turns results into [`SseEvent`]s and hands them to the
//! [`ClientRegistry`], which queues them per client and writes them out as
//! fast as each client's [`Transport`] allows.
//!
//! Any HTTP server can serve a client by returning the frames of an
//! [`SseStream`] (from [`channel_client`]) as a `text/event-stream` body.

mod broadcaster;
mod client;
mod event;
mod registry;
mod transport;

pub use broadcaster::SseBroadcaster;
pub use client::{ClientId, ClientState, ClosedReason};
pub use event::{SseEvent, CONTENT_TYPE, RESULT_EVENT_TYPE};
pub use registry::ClientRegistry;
pub use transport::{channel_client, ChannelTransport, MemoryTransport, SseStream, Transport};
