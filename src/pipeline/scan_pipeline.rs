//! The assembled scan pipeline.

use super::builder::ScanPipelineBuilder;
use crate::config::ContentScanConfig;
use crate::core::DispatchError;
use crate::dig::{ChangeDigger, DigRequest, DigSummary, RequestParams, TreeDigger};
use crate::job::JobQueue;
use crate::repository::Repository;
use crate::result::ResultDispatcher;
use crate::runner::ScanJobRunner;
use crate::sse::{channel_client, ClientRegistry, SseStream};

use std::collections::BTreeSet;
use std::sync::Arc;

/// Diggers, runner, dispatcher and streaming clients wired together.
///
/// Jobs go through the external [`JobQueue`]; whoever drives that queue
/// hands them to [`ScanPipeline::runner`].
pub struct ScanPipeline {
    pub(super) config: ContentScanConfig,
    pub(super) repository: Arc<dyn Repository>,
    pub(super) job_queue: Arc<dyn JobQueue>,
    pub(super) tree_digger: TreeDigger,
    pub(super) runner: ScanJobRunner,
    pub(super) dispatcher: Arc<ResultDispatcher>,
    pub(super) registry: Arc<ClientRegistry>,
    pub(super) change_diggers: Vec<ChangeDigger>,
}

impl ScanPipeline {
    /// Creates a new builder.
    pub fn builder() -> ScanPipelineBuilder {
        ScanPipelineBuilder::new()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ContentScanConfig {
        &self.config
    }

    /// Returns the tree digger.
    pub fn tree_digger(&self) -> &TreeDigger {
        &self.tree_digger
    }

    /// Returns the job runner.
    pub fn runner(&self) -> &ScanJobRunner {
        &self.runner
    }

    /// Returns the result dispatcher.
    pub fn dispatcher(&self) -> &Arc<ResultDispatcher> {
        &self.dispatcher
    }

    /// Returns the streaming client registry.
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Returns the job queue.
    pub fn job_queue(&self) -> &Arc<dyn JobQueue> {
        &self.job_queue
    }

    /// Returns the running change diggers.
    pub fn change_diggers(&self) -> &[ChangeDigger] {
        &self.change_diggers
    }

    /// Digs the subtree at `path` with the configured defaults.
    pub fn dig(&self, path: &str) -> Result<DigSummary, DispatchError> {
        let request = DigRequest::new(path, &self.config.tree_digger)?;
        self.dig_request(&request)
    }

    /// Digs as described by request parameters.
    pub fn dig_params(&self, params: &RequestParams) -> Result<DigSummary, DispatchError> {
        let request = DigRequest::from_params(params, &self.config.tree_digger)?;
        self.dig_request(&request)
    }

    fn dig_request(&self, request: &DigRequest) -> Result<DigSummary, DispatchError> {
        let session = self.repository.service_session()?;
        self.tree_digger.dig_request(session.as_ref(), request)
    }

    /// Hands a commit notification to every change digger.
    ///
    /// Every digger sees the notification even when an earlier one rejects
    /// it; the first rejection is returned.
    pub fn on_change(
        &self,
        path: &str,
        added: &BTreeSet<String>,
        changed: &BTreeSet<String>,
        committer_id: Option<&str>,
    ) -> Result<usize, DispatchError> {
        let mut queued = 0;
        let mut first_error = None;
        for digger in &self.change_diggers {
            match digger.on_change(path, added, changed, committer_id) {
                Ok(count) => queued += count,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(queued),
        }
    }

    /// Opens a streaming client backed by a channel.
    pub fn open_stream(&self) -> SseStream {
        channel_client(&self.registry, self.config.sse.channel_capacity)
    }

    /// Stops the change diggers and disconnects every streaming client.
    pub async fn shutdown(self) {
        for digger in self.change_diggers {
            digger.shutdown().await;
        }
        self.registry.close_all();
        tracing::info!("Scan pipeline stopped");
    }
}

impl std::fmt::Debug for ScanPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanPipeline")
            .field("config", &self.config)
            .field("runner", &self.runner)
            .field("clients", &self.registry.len())
            .field("change_diggers", &self.change_diggers.len())
            .finish()
    }
}
