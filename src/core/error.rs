//! Error types for the contentscan library.
//!
//! Each concern of the pipeline has its own structured error type:
//!
//! - [`ScanError`] - the antivirus engine failed
//! - [`RepositoryError`] - a node or property lookup failed
//! - [`DispatchError`] - digging or consuming a job failed
//! - [`HandlerError`] - a result handler failed
//! - [`TransportError`] - a streaming client's connection failed
//!
//! The library never panics; all errors are returned as `Result` values.

use thiserror::Error;

use crate::core::types::PropertyType;

/// Errors raised by a scanning engine.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The scanning engine is unavailable or not responding.
    #[error("engine '{engine}' is unavailable: {reason}")]
    EngineUnavailable {
        /// Name of the engine that is unavailable.
        engine: String,
        /// Human-readable reason for unavailability.
        reason: String,
    },

    /// Reading the value stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    /// Returns `true` if this error is worth retrying by the job queue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::EngineUnavailable { .. })
    }

    /// Returns the engine name if this error is associated with one.
    pub fn engine(&self) -> Option<&str> {
        match self {
            Self::EngineUnavailable { engine, .. } => Some(engine),
            Self::Io(_) => None,
        }
    }

    /// Creates an `EngineUnavailable` error.
    pub fn engine_unavailable(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EngineUnavailable {
            engine: engine.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the content repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Nothing exists at the given path.
    #[error("no item found at path: {path}")]
    NotFound {
        /// The path that was looked up.
        path: String,
    },

    /// A multi-valued property has no value at the requested index.
    #[error("index {index} out of range for property '{path}' with {len} values")]
    IndexOutOfRange {
        /// Property path.
        path: String,
        /// Requested index.
        index: usize,
        /// Number of values the property currently has.
        len: usize,
    },

    /// The repository refused or failed the access.
    #[error("access to '{path}' failed: {reason}")]
    AccessFailed {
        /// Path being accessed.
        path: String,
        /// Underlying reason.
        reason: String,
    },

    /// A session could not be opened.
    #[error("failed to open repository session: {reason}")]
    SessionUnavailable {
        /// Underlying reason.
        reason: String,
    },
}

impl RepositoryError {
    /// Creates a `NotFound` error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates an `AccessFailed` error.
    pub fn access_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AccessFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while digging for properties or consuming scan jobs.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A dig parameter or configuration value was rejected before any work started.
    #[error("{message}")]
    Validation {
        /// Name of the failing parameter.
        parameter: String,
        /// Message reported to the caller.
        message: String,
    },

    /// Repository access failed during a dig or while resolving a job.
    #[error("repository access failed: {0}")]
    RepositoryAccess(#[from] RepositoryError),

    /// The property type cannot be turned into a scan stream.
    #[error("unsupported property type {property_type} for '{path}'")]
    UnsupportedType {
        /// Property path.
        path: String,
        /// The offending type.
        property_type: PropertyType,
    },

    /// The antivirus engine failed.
    #[error("scan engine failed: {0}")]
    ScanEngine(#[from] ScanError),

    /// A job could not be handed to the job queue.
    #[error("failed to submit job to topic '{topic}': {reason}")]
    JobSubmission {
        /// Target topic.
        topic: String,
        /// Underlying reason.
        reason: String,
    },

    /// A job's attributes could not be decoded.
    #[error("invalid scan job on topic '{topic}': {reason}")]
    InvalidJob {
        /// Job topic.
        topic: String,
        /// What is wrong with the job.
        reason: String,
    },

    /// A job's value changed shape between dig and consume.
    #[error("property '{path}' changed shape: {reason}")]
    ShapeMismatch {
        /// Property path.
        path: String,
        /// What no longer matches.
        reason: String,
    },

    /// The worker pool did not accept the unit of work.
    #[error("dig task rejected: {reason}")]
    Rejected {
        /// Why the task was rejected.
        reason: String,
    },
}

impl DispatchError {
    /// Creates a `Validation` error for the given parameter.
    pub fn validation(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Creates an `InvalidJob` error.
    pub fn invalid_job(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidJob {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error was raised before any traversal started.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns `true` if the job queue may retry the failed job.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ScanEngine(e) => e.is_recoverable(),
            _ => false,
        }
    }

    /// Returns the failing parameter of a validation error.
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::Validation { parameter, .. } => Some(parameter),
            _ => None,
        }
    }
}

/// Errors raised by result handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Publishing onto the event bus failed.
    #[error("failed to publish result event: {reason}")]
    Publish {
        /// Underlying reason.
        reason: String,
    },

    /// Building or sending a mail failed.
    #[error("failed to send result mail: {reason}")]
    Mail {
        /// Underlying reason.
        reason: String,
    },

    /// A template could not be rendered.
    #[error("invalid template: {reason}")]
    Template {
        /// Underlying reason.
        reason: String,
    },

    /// The result store is unusable.
    #[error("failed to persist result at '{path}': {reason}")]
    Persist {
        /// Record path.
        path: String,
        /// Underlying reason.
        reason: String,
    },

    /// Serializing the result attributes failed.
    #[error("failed to serialize result: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The handler panicked.
    #[error("handler '{handler}' panicked")]
    Panicked {
        /// Name of the handler.
        handler: String,
    },
}

/// Errors raised by a streaming client's transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection has been closed.
    #[error("transport closed")]
    Closed,

    /// The transport accepted no more bytes even though it reported readiness.
    #[error("transport refused write: {reason}")]
    Refused {
        /// Underlying reason.
        reason: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
