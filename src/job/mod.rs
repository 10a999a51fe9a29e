//! Job queue contracts and an in-memory queue.

mod queue;

pub use queue::{JobConsumer, JobQueue, JobResult, MemoryJobQueue, QueuedJob};
