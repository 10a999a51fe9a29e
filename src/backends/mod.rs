//! Scanning engines.
//!
//! The antivirus engine is an external collaborator reached through the
//! [`Scanner`](crate::core::Scanner) trait. Only [`MockScanner`] ships here;
//! it detects the EICAR test signature and can be told to fail.
//!
//! A deployment plugs its engine client into the pipeline:
//!
//! ```rust,ignore
//! let pipeline = ScanPipeline::builder()
//!     .with_repository(repository)
//!     .with_arc_scanner(Arc::new(MyEngineClient::connect("127.0.0.1:3310")?))
//!     .with_job_queue(queue)
//!     .build()?;
//! ```

pub mod mock;

pub use mock::{MockScanner, EICAR_NAME, EICAR_SIGNATURE};
