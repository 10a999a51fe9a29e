//! Consuming scan jobs.
//!
//! [`ScanJobRunner`] resolves the property value a job names, streams it
//! into the engine and dispatches the result.

use crate::audit::{self, ScanAuditEvent};
use crate::core::job::SCAN_JOB_TOPIC_ROOT;
use crate::core::{
    ArcScanner, DispatchError, JobAttributes, PropertyType, RepositoryError, ScanJob, ScanResult, ValueStream,
};
use crate::job::{JobConsumer, JobResult};
use crate::repository::{PropertyValue, Repository};
use crate::result::ResultDispatcher;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Turns scan jobs into dispatched scan results.
///
/// Every failure makes the job FAILED; nothing is retried here. Handler
/// failures never affect the outcome. Value lengths are not checked again:
/// the digger that emitted the job already did.
#[derive(Clone)]
pub struct ScanJobRunner {
    repository: Arc<dyn Repository>,
    scanner: ArcScanner,
    dispatcher: Arc<ResultDispatcher>,
}

impl fmt::Debug for ScanJobRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanJobRunner")
            .field("scanner", &self.scanner.name())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl ScanJobRunner {
    /// Creates a runner.
    pub fn new(repository: Arc<dyn Repository>, scanner: ArcScanner, dispatcher: Arc<ResultDispatcher>) -> Self {
        Self {
            repository,
            scanner,
            dispatcher,
        }
    }

    /// Returns the dispatcher results are handed to.
    pub fn dispatcher(&self) -> &Arc<ResultDispatcher> {
        &self.dispatcher
    }

    /// Processes one job.
    pub async fn consume(&self, job: &ScanJob) -> JobResult {
        match self.process(job).await {
            Ok(result) => {
                tracing::debug!(path = %job.path, index = ?job.index, status = %result.status, "Scan job done");
                JobResult::Ok
            }
            Err(DispatchError::ScanEngine(e)) => {
                tracing::error!(
                    path = %job.path,
                    index = ?job.index,
                    engine = e.engine().unwrap_or("unknown"),
                    recoverable = e.is_recoverable(),
                    error = %e,
                    "Scan engine failed"
                );
                JobResult::Failed
            }
            Err(e) => {
                tracing::error!(path = %job.path, index = ?job.index, error = %e, "Scan job failed");
                JobResult::Failed
            }
        }
    }

    /// Scans the value of `job` and dispatches the result.
    ///
    /// Repository access runs on the blocking pool, so a slow repository
    /// does not stall the runtime worker that consumes the job.
    pub async fn process(&self, job: &ScanJob) -> Result<ScanResult, DispatchError> {
        let runner = self.clone();
        let pending = job.clone();
        let (property_type, stream) = tokio::task::spawn_blocking(move || runner.open(&pending))
            .await
            .map_err(|e| RepositoryError::access_failed(&job.path, format!("value resolution task failed: {}", e)))??;

        let result = self.scanner.scan(stream).await?;

        audit::emit_scan_completed(&ScanAuditEvent::new(
            &result,
            &job.path,
            job.index,
            property_type,
            job.user_id.as_deref(),
        ));

        let summary = self
            .dispatcher
            .dispatch(&result, &job.path, job.index, property_type, job.user_id.as_deref())
            .await;
        if summary.failed > 0 {
            tracing::warn!(path = %job.path, failed = summary.failed, "Some result handlers failed");
        }
        Ok(result)
    }

    /// Resolves the value stream of `job` in a fresh session.
    fn open(&self, job: &ScanJob) -> Result<(PropertyType, ValueStream), DispatchError> {
        let session = self.repository.service_session()?;
        let property = session.property(&job.path)?;

        match (property.is_multiple(), job.index) {
            (true, Some(index)) if index >= property.value_count() => {
                return Err(DispatchError::RepositoryAccess(RepositoryError::IndexOutOfRange {
                    path: job.path.clone(),
                    index,
                    len: property.value_count(),
                }));
            }
            (true, None) => {
                return Err(DispatchError::ShapeMismatch {
                    path: job.path.clone(),
                    reason: "multi-valued property but job has no index".into(),
                });
            }
            (false, Some(_)) => {
                return Err(DispatchError::ShapeMismatch {
                    path: job.path.clone(),
                    reason: "single-valued property but job has an index".into(),
                });
            }
            _ => {}
        }

        if !property.property_type.is_scannable() {
            return Err(DispatchError::UnsupportedType {
                path: job.path.clone(),
                property_type: property.property_type,
            });
        }

        let stream = match session.value(&job.path, job.index)? {
            PropertyValue::Binary(stream) => stream,
            PropertyValue::Text(text) => ValueStream::from_text(&text),
        };
        Ok((property.property_type, stream))
    }
}

#[async_trait]
impl JobConsumer for ScanJobRunner {
    fn topic_root(&self) -> &str {
        SCAN_JOB_TOPIC_ROOT
    }

    async fn consume(&self, topic: &str, attributes: &JobAttributes) -> JobResult {
        match ScanJob::from_topic_and_attributes(topic, attributes) {
            Ok(job) => ScanJobRunner::consume(self, &job).await,
            Err(e) => {
                tracing::error!(topic = %topic, error = %e, "Rejecting malformed scan job");
                JobResult::Failed
            }
        }
    }
}
