//! Core types and traits for the contentscan library.
//!
//! - [`types`] - Property types, path patterns and the length gate
//! - [`traits`] - The `Scanner` trait
//! - [`error`] - Structured error types
//! - [`input`] - Value streams handed to the engine
//! - [`result`] - Scan result structures
//! - [`job`] - Scan jobs and their topic/attribute encoding

pub mod error;
pub mod input;
pub mod job;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{DispatchError, HandlerError, RepositoryError, ScanError, TransportError};
pub use input::{BytesReader, ValueStream};
pub use job::{result_event_topic, scan_job_topic, JobAttributes, ScanJob};
pub use result::{should_act, ScanResult, ScanStatus};
pub use traits::{ArcScanner, Scanner};
pub use types::{check_length, property_types_from_names, PathPattern, PropertyType};
