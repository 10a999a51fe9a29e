//! Result handler trait definition.

use crate::core::{HandlerError, PropertyType, ScanResult};

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// A consumer of scan results.
///
/// Handlers are registered on a [`ResultDispatcher`](super::ResultDispatcher)
/// and called once per result. A handler decides on its own whether to act
/// on an OK result; see [`should_act`](crate::core::should_act).
///
/// # Example Implementation
///
/// ```rust,ignore
/// use contentscan::result::ResultHandler;
/// use contentscan::core::{HandlerError, PropertyType, ScanResult};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct LoggingHandler;
///
/// #[async_trait]
/// impl ResultHandler for LoggingHandler {
///     fn name(&self) -> &str {
///         "logging"
///     }
///
///     async fn handle_single_value(
///         &self,
///         result: &ScanResult,
///         path: &str,
///         _property_type: PropertyType,
///         _user_id: Option<&str>,
///     ) -> Result<(), HandlerError> {
///         println!("{}: {}", path, result.status);
///         Ok(())
///     }
///
///     async fn handle_multi_value(
///         &self,
///         result: &ScanResult,
///         path: &str,
///         index: usize,
///         _property_type: PropertyType,
///         _user_id: Option<&str>,
///     ) -> Result<(), HandlerError> {
///         println!("{}[{}]: {}", path, index, result.status);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ResultHandler: Send + Sync + Debug {
    /// Returns the name used in logs.
    fn name(&self) -> &str;

    /// Handles the result for a single-valued property.
    async fn handle_single_value(
        &self,
        result: &ScanResult,
        path: &str,
        property_type: PropertyType,
        user_id: Option<&str>,
    ) -> Result<(), HandlerError>;

    /// Handles the result for one value of a multi-valued property.
    async fn handle_multi_value(
        &self,
        result: &ScanResult,
        path: &str,
        index: usize,
        property_type: PropertyType,
        user_id: Option<&str>,
    ) -> Result<(), HandlerError>;
}

/// Type alias for a shared result handler.
pub type ArcResultHandler = Arc<dyn ResultHandler>;
