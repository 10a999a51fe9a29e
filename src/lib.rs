//! # Contentscan
//!
//! Malware-scan dispatch for content repositories, with result fan-out and
//! live streaming of results to connected clients.
//!
//! ## Overview
//!
//! Contentscan finds property values worth scanning and turns every scan
//! result into side effects:
//!
//! - Walk a subtree and emit one scan job per qualifying value
//! - React to commit notifications on a bounded worker pool
//! - Stream values into a pluggable scan engine
//! - Fan results out to events, mail, persisted records and SSE clients
//! - Keep slow streaming clients from holding back anyone else
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use contentscan::prelude::*;
//! use contentscan::backends::MockScanner;
//! use contentscan::job::MemoryJobQueue;
//! use contentscan::repository::MemoryRepository;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repository = MemoryRepository::new();
//!     repository.set_binary("/content/doc/data", b"file content".to_vec());
//!     let queue = Arc::new(MemoryJobQueue::new());
//!
//!     let pipeline = ScanPipeline::builder()
//!         .with_repository(Arc::new(repository))
//!         .with_scanner(MockScanner::new())
//!         .with_job_queue(queue.clone())
//!         .build()?;
//!
//!     let _stream = pipeline.open_stream();
//!     pipeline.dig("/content")?;
//!     queue.run_pending(pipeline.runner()).await;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Core**: Property types, scan jobs, results and error handling
//! - **Repository**: Content tree interfaces and an in-memory tree
//! - **Job**: Job queue contract and an in-memory queue
//! - **Dig**: Tree and change diggers emitting scan jobs
//! - **Runner**: Scanning a job's value and dispatching the result
//! - **Result**: Result dispatcher and the standard handlers
//! - **SSE**: Streaming client registry with per-client backpressure
//! - **Pipeline**: Everything wired together from a configuration
//! - **Audit**: Structured logging of what happened

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod backends;
pub mod config;
pub mod core;
pub mod dig;
pub mod job;
pub mod pipeline;
pub mod repository;
pub mod result;
pub mod runner;
pub mod sse;

// Re-export commonly used types at the crate root
pub use crate::core::{
    DispatchError, HandlerError, PropertyType, RepositoryError, ScanError, ScanJob, ScanResult, ScanStatus,
    Scanner, TransportError,
};

pub use crate::config::ContentScanConfig;
pub use crate::dig::{ChangeDigger, TreeDigger};
pub use crate::pipeline::{ScanPipeline, ScanPipelineBuilder};
pub use crate::result::{ResultDispatcher, ResultHandler};
pub use crate::runner::ScanJobRunner;
pub use crate::sse::{ClientRegistry, SseBroadcaster};

/// Prelude module for convenient imports.
///
/// ```rust
/// use contentscan::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::ContentScanConfig;
    pub use crate::core::{
        DispatchError, HandlerError, PropertyType, ScanError, ScanJob, ScanResult, ScanStatus, Scanner,
    };
    pub use crate::dig::{ChangeDigger, ChangeDiggerConfig, DigSummary, TreeDigger, TreeDiggerConfig};
    pub use crate::job::{JobConsumer, JobQueue, JobResult};
    pub use crate::pipeline::ScanPipeline;
    pub use crate::repository::Repository;
    pub use crate::result::{ResultDispatcher, ResultHandler};
    pub use crate::runner::ScanJobRunner;
    pub use crate::sse::{ClientRegistry, SseBroadcaster, SseEvent};
}
