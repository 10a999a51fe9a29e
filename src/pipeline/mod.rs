//! Pipeline assembly.
//!
//! [`ScanPipeline`] wires the diggers, the job runner, the result handlers
//! and the streaming registry together from a
//! [`ContentScanConfig`](crate::config::ContentScanConfig).

mod builder;
mod scan_pipeline;

pub use builder::ScanPipelineBuilder;
pub use scan_pipeline::ScanPipeline;
