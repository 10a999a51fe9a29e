//! Core traits for the contentscan library.
//!
//! This module defines the `Scanner` trait that antivirus engine clients
//! implement. The engine's wire protocol lives behind this trait.

use crate::core::error::ScanError;
use crate::core::input::ValueStream;
use crate::core::result::ScanResult;

use async_trait::async_trait;
use std::fmt::Debug;

/// The client side of an antivirus engine.
///
/// # Implementation Notes
///
/// - Implementations must be `Send + Sync`; they are shared by every job
///   runner invocation and must not keep per-scan state.
/// - The stream is consumed by the call and dropped before it returns.
/// - Implementations should never panic; all errors should be returned as `ScanError`.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use contentscan::core::{Scanner, ScanResult, ScanError, ValueStream};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct MyScanner;
///
/// #[async_trait]
/// impl Scanner for MyScanner {
///     fn name(&self) -> &str {
///         "my-scanner"
///     }
///
///     async fn scan(&self, stream: ValueStream) -> Result<ScanResult, ScanError> {
///         todo!()
///     }
///
///     async fn health_check(&self) -> Result<(), ScanError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Scanner: Send + Sync + Debug {
    /// Returns the name of this scanner engine.
    fn name(&self) -> &str;

    /// Scans the bytes of `stream`.
    ///
    /// # Errors
    ///
    /// Returns `ScanError` when the engine could not produce a verdict:
    /// - `EngineUnavailable` - The engine is not running or reachable.
    /// - `Io` - Reading the value failed.
    async fn scan(&self, stream: ValueStream) -> Result<ScanResult, ScanError>;

    /// Performs a lightweight reachability check.
    async fn health_check(&self) -> Result<(), ScanError>;
}

/// An arc-wrapped scanner for shared ownership.
pub type ArcScanner = std::sync::Arc<dyn Scanner>;
