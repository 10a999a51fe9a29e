//! Mock scanner for testing.
//!
//! This module provides a signature-matching mock engine that can be used
//! in tests and demos to simulate scan outcomes without a real antivirus
//! daemon.

use crate::core::{ScanError, ScanResult, Scanner, ValueStream};

use async_trait::async_trait;
use chrono::Utc;
use futures::AsyncReadExt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// The EICAR anti-malware test string.
pub const EICAR_SIGNATURE: &[u8] =
    br"X5O!P%@AP[4\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

/// Name reported for the EICAR test string.
pub const EICAR_NAME: &str = "Eicar-Test-Signature";

/// A mock scanner for testing purposes.
///
/// Every stream is read to the end. A stream containing one of the known
/// signatures is reported INFECTED with the message `"<name> FOUND"`.
///
/// # Examples
///
/// ```rust
/// use contentscan::backends::MockScanner;
/// use std::time::Duration;
///
/// // Detects the EICAR test string only
/// let scanner = MockScanner::new();
///
/// // Detects an extra signature and takes its time
/// let scanner = MockScanner::new()
///     .with_signature("Test.Marker", b"MARKER".to_vec())
///     .with_latency(Duration::from_millis(100));
/// ```
#[derive(Debug)]
pub struct MockScanner {
    /// Name of this scanner instance.
    name: String,
    /// Known signatures by name.
    signatures: RwLock<Vec<(String, Vec<u8>)>>,
    /// Simulated latency for scans.
    latency: Option<Duration>,
    /// Fail every scan with an engine error.
    failing: AtomicBool,
    /// Report ERROR with this message instead of scanning.
    error_status: RwLock<Option<String>>,
    /// Counter for scan operations.
    scan_count: AtomicU64,
    /// Whether to fail health checks.
    unhealthy: AtomicBool,
}

impl MockScanner {
    /// Creates a new mock scanner that knows the EICAR signature.
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            signatures: RwLock::new(vec![(EICAR_NAME.to_string(), EICAR_SIGNATURE.to_vec())]),
            latency: None,
            failing: AtomicBool::new(false),
            error_status: RwLock::new(None),
            scan_count: AtomicU64::new(0),
            unhealthy: AtomicBool::new(false),
        }
    }

    /// Sets the name of this scanner.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a signature.
    pub fn with_signature(self, name: impl Into<String>, pattern: impl Into<Vec<u8>>) -> Self {
        self.add_signature(name, pattern);
        self
    }

    /// Sets the simulated latency for scans.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Adds a signature (shared reference version).
    pub fn add_signature(&self, name: impl Into<String>, pattern: impl Into<Vec<u8>>) {
        self.signatures
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((name.into(), pattern.into()));
    }

    /// Makes every scan fail with an engine error, or stops doing so.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes every scan report ERROR with `message`, or stops doing so.
    pub fn set_error_status(&self, message: Option<impl Into<String>>) {
        *self
            .error_status
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = message.map(Into::into);
    }

    /// Returns the number of scans performed.
    pub fn scan_count(&self) -> u64 {
        self.scan_count.load(Ordering::Relaxed)
    }

    /// Sets the health status.
    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    fn detect(&self, data: &[u8]) -> Option<String> {
        let signatures = self.signatures.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        signatures
            .iter()
            .find(|(_, pattern)| !pattern.is_empty() && data.windows(pattern.len()).any(|w| w == pattern.as_slice()))
            .map(|(name, _)| name.clone())
    }
}

impl Default for MockScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scanner for MockScanner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scan(&self, mut stream: ValueStream) -> Result<ScanResult, ScanError> {
        self.scan_count.fetch_add(1, Ordering::Relaxed);
        let started = Utc::now();

        if self.failing.load(Ordering::SeqCst) {
            return Err(ScanError::engine_unavailable(&self.name, "simulated failure"));
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut data = Vec::new();
        stream.read_to_end(&mut data).await?;
        let size = data.len() as u64;

        let error_status = self
            .error_status
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(message) = error_status {
            return Ok(ScanResult::error(message, started, size));
        }

        Ok(match self.detect(&data) {
            Some(name) => ScanResult::infected(format!("{} FOUND", name), started, size),
            None => ScanResult::ok(started, size),
        })
    }

    async fn health_check(&self) -> Result<(), ScanError> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(ScanError::engine_unavailable(&self.name, "mock scanner is unhealthy"));
        }
        Ok(())
    }
}
