//! Job submission and consumption contracts.
//!
//! The queue substrate (persistence, retry, distribution) is external. The
//! pipeline only submits `(topic, attributes)` pairs and implements the
//! consumer side.

use crate::core::error::DispatchError;
use crate::core::job::JobAttributes;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Outcome reported back to the job queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobResult {
    /// The job was processed.
    Ok,
    /// The job failed; the queue decides whether to retry.
    Failed,
}

/// A queue accepting scan jobs.
pub trait JobQueue: Send + Sync + Debug {
    /// Submits a job. Must not block on job execution.
    fn submit(&self, topic: &str, attributes: JobAttributes) -> Result<(), DispatchError>;
}

/// The consuming side of a job topic.
#[async_trait]
pub trait JobConsumer: Send + Sync {
    /// Root of the topics this consumer accepts.
    fn topic_root(&self) -> &str;

    /// Returns `true` if the consumer accepts jobs on `topic`.
    fn accepts(&self, topic: &str) -> bool {
        topic
            .strip_prefix(self.topic_root())
            .map_or(false, |rest| rest.starts_with('/'))
    }

    /// Processes one job. Invocations are independent and may run concurrently.
    async fn consume(&self, topic: &str, attributes: &JobAttributes) -> JobResult;
}

/// A job held by a [`MemoryJobQueue`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJob {
    /// Job topic.
    pub topic: String,
    /// Job attributes.
    pub attributes: JobAttributes,
}

/// An in-memory job queue without persistence or retry.
#[derive(Debug, Default)]
pub struct MemoryJobQueue {
    jobs: Mutex<VecDeque<QueuedJob>>,
    submitted: AtomicU64,
    rejecting: AtomicBool,
}

impl MemoryJobQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<QueuedJob>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes further submissions fail or succeed.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// Returns the number of jobs ever accepted.
    pub fn submitted_count(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Returns the number of jobs waiting.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no job is waiting.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns a copy of the waiting jobs.
    pub fn pending(&self) -> Vec<QueuedJob> {
        self.lock().iter().cloned().collect()
    }

    /// Removes and returns every waiting job.
    pub fn take_all(&self) -> Vec<QueuedJob> {
        self.lock().drain(..).collect()
    }

    /// Hands every waiting job the consumer accepts to it, in submission order.
    ///
    /// Jobs on other topics stay queued.
    pub async fn run_pending(&self, consumer: &dyn JobConsumer) -> Vec<(QueuedJob, JobResult)> {
        let accepted: Vec<QueuedJob> = {
            let mut jobs = self.lock();
            let (accepted, rest): (VecDeque<_>, VecDeque<_>) =
                jobs.drain(..).partition(|job| consumer.accepts(&job.topic));
            *jobs = rest;
            accepted.into_iter().collect()
        };

        let mut outcomes = Vec::with_capacity(accepted.len());
        for job in accepted {
            let result = consumer.consume(&job.topic, &job.attributes).await;
            tracing::debug!(topic = %job.topic, result = ?result, "Consumed queued job");
            outcomes.push((job, result));
        }
        outcomes
    }
}

impl JobQueue for MemoryJobQueue {
    fn submit(&self, topic: &str, attributes: JobAttributes) -> Result<(), DispatchError> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(DispatchError::JobSubmission {
                topic: topic.to_string(),
                reason: "queue is not accepting jobs".into(),
            });
        }
        self.lock().push_back(QueuedJob {
            topic: topic.to_string(),
            attributes,
        });
        self.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
