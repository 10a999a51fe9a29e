//! Structured audit logging.
//!
//! This module emits structured audit events through the `tracing` crate on
//! the `contentscan::audit` target. Any subscriber (JSON file, OpenTelemetry,
//! etc.) can capture them.

mod events;

pub use events::{
    emit_client_closed, emit_client_registered, emit_handler_failed, emit_job_submitted,
    emit_scan_completed, emit_value_skipped, AuditEvent, ScanAuditEvent,
};
