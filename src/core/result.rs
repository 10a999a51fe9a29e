//! Scan result structures.
//!
//! A [`ScanResult`] is produced once by the scanning engine and never
//! modified afterwards. Handlers only read it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status reported by the scanning engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanStatus {
    /// No threat found.
    Ok,
    /// The value contains a threat.
    Infected,
    /// The engine could not judge the value.
    Error,
}

impl ScanStatus {
    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Infected => "INFECTED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of scanning one property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Engine verdict.
    pub status: ScanStatus,

    /// Engine message, empty when the status is OK.
    pub message: String,

    /// When the scan started.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started: DateTime<Utc>,

    /// When the scan completed.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Number of bytes scanned.
    pub size: u64,
}

impl ScanResult {
    /// Creates a new result completed now.
    pub fn new(status: ScanStatus, message: impl Into<String>, started: DateTime<Utc>, size: u64) -> Self {
        let message = match status {
            ScanStatus::Ok => String::new(),
            _ => message.into(),
        };
        Self {
            status,
            message,
            started,
            timestamp: Utc::now(),
            size,
        }
    }

    /// Creates a clean result.
    pub fn ok(started: DateTime<Utc>, size: u64) -> Self {
        Self::new(ScanStatus::Ok, "", started, size)
    }

    /// Creates an infected result.
    pub fn infected(message: impl Into<String>, started: DateTime<Utc>, size: u64) -> Self {
        Self::new(ScanStatus::Infected, message, started, size)
    }

    /// Creates an error result.
    pub fn error(message: impl Into<String>, started: DateTime<Utc>, size: u64) -> Self {
        Self::new(ScanStatus::Error, message, started, size)
    }

    /// Sets the completion timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns `true` if the engine found nothing.
    pub fn is_ok(&self) -> bool {
        self.status == ScanStatus::Ok
    }

    /// Returns `true` if the engine found a threat.
    pub fn is_infected(&self) -> bool {
        self.status == ScanStatus::Infected
    }

    /// Scan start as epoch milliseconds.
    pub fn started_millis(&self) -> i64 {
        self.started.timestamp_millis()
    }

    /// Scan completion as epoch milliseconds.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Returns `true` if a handler should act on `result`.
///
/// Non-OK results always pass; OK results pass only when
/// `send_even_when_ok` is set.
pub fn should_act(result: &ScanResult, send_even_when_ok: bool) -> bool {
    !result.is_ok() || send_even_when_ok
}
