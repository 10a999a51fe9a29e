//! Result fan-out and the standard result handlers.
//!
//! - [`ResultDispatcher`] - ordered fan-out with per-handler failure isolation
//! - [`EventPublisher`] - posts results on an [`EventBus`]
//! - [`MailSender`] - mails results through a [`MailTransport`]
//! - [`ResourcePersister`] - records results in a [`ResultStore`]
//!
//! The streaming handler lives in [`crate::sse`].

mod attributes;
mod dispatcher;
mod event;
mod handler;
mod mail;
mod persist;

pub use attributes::ResultAttributes;
pub use dispatcher::{DispatchSummary, HandlerId, ResultDispatcher};
pub use event::{BroadcastEventBus, BusEvent, EventBus, EventPublisher, EventPublisherConfig};
pub use handler::{ArcResultHandler, ResultHandler};
pub use mail::{
    MailConfig, MailMessage, MailSender, MailTransport, RecordingMailTransport, DEFAULT_SUBJECT_TEMPLATE,
    DEFAULT_TEXT_TEMPLATE,
};
pub use persist::{
    FilesystemResultStore, MemoryResultStore, PersisterConfig, ResourcePersister, ResultStore,
    DEFAULT_RESULT_ROOT, RESOURCE_TYPE_PROPERTY, RESULT_RESOURCE_TYPE,
};
