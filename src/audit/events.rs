//! Audit event types and emission functions.

use crate::core::{PropertyType, ScanResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Base trait for audit events.
pub trait AuditEvent: Serialize {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns the timestamp of the event.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Audit event for a completed property scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanAuditEvent {
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Property path.
    pub path: String,

    /// Value index of a multi-valued property.
    pub index: Option<usize>,

    /// Property type.
    pub property_type: PropertyType,

    /// Who last wrote the property.
    pub user_id: Option<String>,

    /// Engine verdict.
    pub status: String,

    /// Engine message.
    pub message: String,

    /// Bytes scanned.
    pub size: u64,

    /// Scan duration in milliseconds.
    pub duration_ms: i64,
}

impl ScanAuditEvent {
    /// Builds the event from a result.
    pub fn new(
        result: &ScanResult,
        path: &str,
        index: Option<usize>,
        property_type: PropertyType,
        user_id: Option<&str>,
    ) -> Self {
        Self {
            timestamp: result.timestamp,
            path: path.to_string(),
            index,
            property_type,
            user_id: user_id.map(str::to_string),
            status: result.status.to_string(),
            message: result.message.clone(),
            size: result.size,
            duration_ms: (result.timestamp - result.started).num_milliseconds(),
        }
    }
}

impl AuditEvent for ScanAuditEvent {
    fn event_type(&self) -> &'static str {
        "scan_completed"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Emits an audit event for a submitted scan job.
pub fn emit_job_submitted(topic: &str, path: &str, index: Option<usize>, user_id: Option<&str>) {
    tracing::info!(
        target: "contentscan::audit",
        event_type = "job_submitted",
        topic = %topic,
        path = %path,
        index = ?index,
        user_id = ?user_id,
        "Scan job submitted"
    );
}

/// Emits an audit event for a value skipped because it is too long.
pub fn emit_value_skipped(path: &str, index: Option<usize>, length: u64, max_length: i64) {
    tracing::warn!(
        target: "contentscan::audit",
        event_type = "value_skipped",
        path = %path,
        index = ?index,
        length = length,
        max_length = max_length,
        "Length of property value greater than max length"
    );
}

/// Emits an audit event for a completed scan.
pub fn emit_scan_completed(event: &ScanAuditEvent) {
    tracing::info!(
        target: "contentscan::audit",
        event_type = event.event_type(),
        path = %event.path,
        index = ?event.index,
        property_type = %event.property_type,
        user_id = ?event.user_id,
        status = %event.status,
        message = %event.message,
        size = event.size,
        duration_ms = event.duration_ms,
        "Scan completed"
    );
}

/// Emits an audit event for a failed result handler.
pub fn emit_handler_failed(handler: &str, path: &str, index: Option<usize>, error: &dyn std::fmt::Display) {
    tracing::error!(
        target: "contentscan::audit",
        event_type = "handler_failed",
        handler = %handler,
        path = %path,
        index = ?index,
        error = %error,
        "Result handler failed"
    );
}

/// Emits an audit event for a streaming client joining.
pub fn emit_client_registered(client_id: &str, clients: usize) {
    tracing::info!(
        target: "contentscan::audit",
        event_type = "client_registered",
        client_id = %client_id,
        clients = clients,
        "Streaming client registered"
    );
}

/// Emits an audit event for a streaming client leaving.
pub fn emit_client_closed(client_id: &str, reason: &str, undelivered: usize) {
    tracing::info!(
        target: "contentscan::audit",
        event_type = "client_closed",
        client_id = %client_id,
        reason = %reason,
        undelivered = undelivered,
        "Streaming client closed"
    );
}
