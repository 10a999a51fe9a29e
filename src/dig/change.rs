//! Incremental digging driven by change notifications.

use super::config::ChangeDiggerConfig;
use super::emit::{emit_jobs, DigSummary};
use crate::core::error::DispatchError;
use crate::core::types::PathPattern;
use crate::job::JobQueue;
use crate::repository::{child_path, Repository};

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Candidates of one commit, resolved together by a worker.
#[derive(Debug, Clone)]
struct DigTask {
    candidates: Vec<String>,
    committer_id: Option<String>,
}

struct Inner {
    config: ChangeDiggerConfig,
    pattern: PathPattern,
    repository: Arc<dyn Repository>,
    jobs: Arc<dyn JobQueue>,
}

impl Inner {
    fn run(&self, task: DigTask) -> DigSummary {
        let mut summary = DigSummary::default();
        let session = match self.repository.service_session() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, candidates = task.candidates.len(), "Cannot open session for change dig");
                return summary;
            }
        };

        for candidate in &task.candidates {
            let property = match session.property(candidate) {
                Ok(property) => property,
                Err(e) => {
                    tracing::warn!(path = %candidate, error = %e, "Skipping changed property");
                    continue;
                }
            };
            if property.property_type != self.config.property_type {
                tracing::debug!(
                    path = %candidate,
                    property_type = %property.property_type,
                    "Ignoring property of other type"
                );
                continue;
            }
            summary.properties_resolved += 1;
            if let Err(e) = emit_jobs(
                self.jobs.as_ref(),
                &property,
                self.config.property_length_max,
                task.committer_id.as_deref(),
                &mut summary,
            ) {
                tracing::warn!(path = %candidate, error = %e, "Submitting scan jobs failed");
            }
        }
        summary
    }
}

/// Emits scan jobs for properties added or changed by a commit.
///
/// Each digger handles exactly one property type. Notifications return
/// immediately; candidates are resolved on a bounded pool of workers. A
/// notification arriving while the task queue is full is rejected.
///
/// Rejection is lossy: the properties of a rejected notification are never
/// scanned unless a later notification or a tree dig covers them. Callers
/// that cannot tolerate gaps should follow a rejection with a tree dig of
/// the affected path.
pub struct ChangeDigger {
    inner: Arc<Inner>,
    sender: mpsc::Sender<DigTask>,
    workers: Vec<JoinHandle<()>>,
}

impl fmt::Debug for ChangeDigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeDigger")
            .field("config", &self.inner.config)
            .field("workers", &self.workers.len())
            .finish()
    }
}

impl ChangeDigger {
    /// Validates `config` and spawns the workers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: ChangeDiggerConfig,
        repository: Arc<dyn Repository>,
        jobs: Arc<dyn JobQueue>,
    ) -> Result<Self, DispatchError> {
        config.validate()?;
        let pattern = PathPattern::new(config.property_path_pattern.clone())?;
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let inner = Arc::new(Inner {
            config,
            pattern,
            repository,
            jobs,
        });

        let workers = (0..inner.config.workers)
            .map(|worker| {
                let inner = Arc::clone(&inner);
                let receiver = Arc::clone(&receiver);
                tokio::spawn(async move {
                    loop {
                        let task = { receiver.lock().await.recv().await };
                        let Some(task) = task else { break };
                        let inner = Arc::clone(&inner);
                        match tokio::task::spawn_blocking(move || inner.run(task)).await {
                            Ok(summary) => tracing::debug!(
                                worker = worker,
                                properties = summary.properties_resolved,
                                jobs = summary.jobs_emitted,
                                skipped = summary.values_skipped,
                                "Change dig finished"
                            ),
                            Err(e) => tracing::error!(worker = worker, error = %e, "Change dig task failed"),
                        }
                    }
                })
            })
            .collect();

        tracing::info!(
            property_type = %inner.config.property_type,
            pattern = %inner.pattern,
            workers = inner.config.workers,
            "Change digger started"
        );

        Ok(Self {
            inner,
            sender,
            workers,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ChangeDiggerConfig {
        &self.inner.config
    }

    /// Handles one commit below `path`.
    ///
    /// Returns the number of candidates queued. Removed properties are not
    /// reported here and never scanned.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Rejected` when the task queue is full or the
    /// digger is shut down. The notification is dropped.
    pub fn on_change(
        &self,
        path: &str,
        added: &BTreeSet<String>,
        changed: &BTreeSet<String>,
        committer_id: Option<&str>,
    ) -> Result<usize, DispatchError> {
        let candidates: Vec<String> = added
            .union(changed)
            .map(|name| child_path(path, name))
            .filter(|candidate| self.inner.pattern.matches(candidate))
            .collect();
        if candidates.is_empty() {
            return Ok(0);
        }

        let count = candidates.len();
        let task = DigTask {
            candidates,
            committer_id: committer_id.map(str::to_string),
        };
        self.sender.try_send(task).map_err(|e| {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "change dig queue is full",
                mpsc::error::TrySendError::Closed(_) => "change digger is shut down",
            };
            tracing::warn!(path = %path, candidates = count, reason = reason, "Change notification rejected");
            DispatchError::Rejected { reason: reason.to_string() }
        })?;
        Ok(count)
    }

    /// Stops accepting notifications and waits for queued work to finish.
    pub async fn shutdown(self) {
        let Self { sender, workers, .. } = self;
        drop(sender);
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Change digger worker failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PropertyType;
    use crate::job::MemoryJobQueue;
    use crate::repository::MemoryRepository;

    fn names(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_change_emits_jobs_for_matching_type() {
        let repo = MemoryRepository::new();
        repo.set_binary("/content/doc/data", vec![1u8; 10])
            .set_string("/content/doc/title", "hi")
            .set_binary("/content/doc/big", vec![1u8; 500]);
        let queue = Arc::new(MemoryJobQueue::new());
        let digger = ChangeDigger::start(
            ChangeDiggerConfig::new().with_property_length_max(100),
            Arc::new(repo),
            queue.clone(),
        )
        .unwrap();

        let queued = digger
            .on_change("/content/doc", &names(&["data", "title"]), &names(&["big"]), Some("alice"))
            .unwrap();
        assert_eq!(queued, 3);
        digger.shutdown().await;

        let jobs = queue.take_all();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].topic, "contentscan/scan/property/Binary");
        assert_eq!(jobs[0].attributes["path"], "/content/doc/data");
        assert_eq!(jobs[0].attributes["userId"], "alice");
    }

    #[tokio::test]
    async fn test_change_pattern_filters_candidates() {
        let repo = MemoryRepository::new();
        repo.set_binary("/content/doc/data", vec![1u8; 10]);
        let queue = Arc::new(MemoryJobQueue::new());
        let digger = ChangeDigger::start(
            ChangeDiggerConfig::new().with_property_path_pattern("/var/.*"),
            Arc::new(repo),
            queue.clone(),
        )
        .unwrap();

        let queued = digger
            .on_change("/content/doc", &names(&["data"]), &BTreeSet::new(), None)
            .unwrap();
        assert_eq!(queued, 0);
        digger.shutdown().await;
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_change_failing_candidate_is_skipped() {
        let repo = MemoryRepository::new();
        repo.set_strings("/c/tags", ["a", "b"])
            .set_string("/c/gone", "x");
        repo.fail_on("/c/gone");
        let queue = Arc::new(MemoryJobQueue::new());
        let digger = ChangeDigger::start(
            ChangeDiggerConfig::new().with_property_type(PropertyType::String),
            Arc::new(repo),
            queue.clone(),
        )
        .unwrap();

        digger
            .on_change("/c", &names(&["gone", "missing"]), &names(&["tags"]), Some("bob"))
            .unwrap();
        digger.shutdown().await;

        let jobs = queue.take_all();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].attributes["index"], 0);
        assert_eq!(jobs[1].attributes["index"], 1);
    }

    #[tokio::test]
    async fn test_change_rejects_when_queue_full() {
        let repo = MemoryRepository::new();
        repo.set_available(false);
        let queue = Arc::new(MemoryJobQueue::new());
        let digger = ChangeDigger::start(
            ChangeDiggerConfig::new().with_workers(1).with_queue_capacity(1),
            Arc::new(repo),
            queue.clone(),
        )
        .unwrap();

        // Nothing has yielded to the worker yet, so the single slot fills.
        digger.on_change("/a", &names(&["x"]), &BTreeSet::new(), None).unwrap();
        let err = digger.on_change("/b", &names(&["y"]), &BTreeSet::new(), None).unwrap_err();
        assert!(matches!(err, DispatchError::Rejected { .. }));

        digger.shutdown().await;
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_notification_is_never_scanned() {
        let repo = MemoryRepository::new();
        repo.set_binary("/a/x", vec![1u8; 4]).set_binary("/b/y", vec![2u8; 4]);
        let queue = Arc::new(MemoryJobQueue::new());
        let digger = ChangeDigger::start(
            ChangeDiggerConfig::new().with_workers(1).with_queue_capacity(1),
            Arc::new(repo),
            queue.clone(),
        )
        .unwrap();

        digger.on_change("/a", &names(&["x"]), &BTreeSet::new(), None).unwrap();
        assert!(digger.on_change("/b", &names(&["y"]), &BTreeSet::new(), None).is_err());
        digger.shutdown().await;

        let jobs = queue.take_all();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].attributes["path"], "/a/x");
    }

    #[test]
    fn test_change_summary_counts_properties() {
        let repo = MemoryRepository::new();
        repo.set_binary("/c/data", vec![1u8; 4])
            .set_string("/c/title", "x")
            .set_binary("/c/big", vec![1u8; 64]);
        let queue = Arc::new(MemoryJobQueue::new());
        let config = ChangeDiggerConfig::new().with_property_length_max(10);
        let inner = Inner {
            pattern: PathPattern::new(config.property_path_pattern.clone()).unwrap(),
            config,
            repository: Arc::new(repo),
            jobs: queue.clone(),
        };

        let summary = inner.run(DigTask {
            candidates: vec!["/c/data".into(), "/c/title".into(), "/c/big".into()],
            committer_id: None,
        });
        assert_eq!(
            summary,
            DigSummary {
                nodes_visited: 0,
                properties_resolved: 2,
                jobs_emitted: 1,
                values_skipped: 1,
            }
        );
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_change_invalid_config() {
        let err = ChangeDigger::start(
            ChangeDiggerConfig::new().with_property_path_pattern("["),
            Arc::new(MemoryRepository::new()),
            Arc::new(MemoryJobQueue::new()),
        )
        .unwrap_err();
        assert!(err.is_validation());
    }
}
