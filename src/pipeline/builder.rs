//! Assembling a [`ScanPipeline`].

use super::scan_pipeline::ScanPipeline;
use crate::config::ContentScanConfig;
use crate::core::{ArcScanner, DispatchError, Scanner};
use crate::dig::{ChangeDigger, TreeDigger};
use crate::job::JobQueue;
use crate::repository::Repository;
use crate::result::{
    BroadcastEventBus, EventBus, EventPublisher, MailSender, MailTransport, ResourcePersister, ResultDispatcher,
    ResultStore,
};
use crate::runner::ScanJobRunner;
use crate::sse::{ClientRegistry, SseBroadcaster};

use std::sync::Arc;

/// Builder for creating a [`ScanPipeline`].
///
/// Repository, scanner and job queue are required. A mail transport is
/// required once mail senders are configured, a result store once
/// persisters are. Without an event bus an unobserved [`BroadcastEventBus`]
/// is used.
#[derive(Default)]
pub struct ScanPipelineBuilder {
    config: ContentScanConfig,
    repository: Option<Arc<dyn Repository>>,
    scanner: Option<ArcScanner>,
    job_queue: Option<Arc<dyn JobQueue>>,
    event_bus: Option<Arc<dyn EventBus>>,
    mail_transport: Option<Arc<dyn MailTransport>>,
    result_store: Option<Arc<dyn ResultStore>>,
    registry: Option<Arc<ClientRegistry>>,
}

impl ScanPipelineBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: ContentScanConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the content repository.
    pub fn with_repository(mut self, repository: Arc<dyn Repository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Sets the scan engine.
    pub fn with_scanner<S: Scanner + 'static>(mut self, scanner: S) -> Self {
        self.scanner = Some(Arc::new(scanner));
        self
    }

    /// Sets a scan engine wrapped in an Arc.
    pub fn with_arc_scanner(mut self, scanner: ArcScanner) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Sets the queue scan jobs are submitted to.
    pub fn with_job_queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.job_queue = Some(queue);
        self
    }

    /// Sets the bus the event publisher posts to.
    pub fn with_event_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Sets the transport used by the mail senders.
    pub fn with_mail_transport(mut self, transport: Arc<dyn MailTransport>) -> Self {
        self.mail_transport = Some(transport);
        self
    }

    /// Sets the store used by the persisters.
    pub fn with_result_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.result_store = Some(store);
        self
    }

    /// Shares an existing client registry.
    pub fn with_registry(mut self, registry: Arc<ClientRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Builds the pipeline and starts its change diggers.
    ///
    /// Must be called from within a tokio runtime when change diggers are
    /// configured.
    pub fn build(self) -> Result<ScanPipeline, DispatchError> {
        self.config.validate()?;

        let repository = self
            .repository
            .ok_or_else(|| DispatchError::validation("repository", "A content repository is required"))?;
        let scanner = self
            .scanner
            .ok_or_else(|| DispatchError::validation("scanner", "A scan engine is required"))?;
        let job_queue = self
            .job_queue
            .ok_or_else(|| DispatchError::validation("jobQueue", "A job queue is required"))?;
        let registry = self.registry.unwrap_or_default();
        let dispatcher = Arc::new(ResultDispatcher::new());

        if let Some(publisher) = &self.config.event_publisher {
            let bus = self
                .event_bus
                .unwrap_or_else(|| Arc::new(BroadcastEventBus::default()));
            dispatcher.attach(Arc::new(EventPublisher::new(bus, publisher.clone())));
        }

        if !self.config.mail.is_empty() {
            let transport = self
                .mail_transport
                .ok_or_else(|| DispatchError::validation("mail", "A mail transport is required"))?;
            for mail in &self.config.mail {
                let sender = MailSender::new(Arc::clone(&transport), mail.clone())
                    .map_err(|e| DispatchError::validation("mail", e.to_string()))?;
                dispatcher.attach(Arc::new(sender));
            }
        }

        if !self.config.persisters.is_empty() {
            let store = self
                .result_store
                .ok_or_else(|| DispatchError::validation("resultStore", "A result store is required"))?;
            for persister in &self.config.persisters {
                dispatcher.attach(Arc::new(ResourcePersister::new(Arc::clone(&store), persister.clone())));
            }
        }

        if self.config.sse.enabled {
            dispatcher.attach(Arc::new(SseBroadcaster::new(Arc::clone(&registry))));
        }

        let change_diggers = self
            .config
            .change_diggers
            .iter()
            .map(|digger| ChangeDigger::start(digger.clone(), Arc::clone(&repository), Arc::clone(&job_queue)))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            scanner = %scanner.name(),
            handlers = ?dispatcher.handler_names(),
            change_diggers = change_diggers.len(),
            "Scan pipeline built"
        );

        Ok(ScanPipeline {
            tree_digger: TreeDigger::new(Arc::clone(&job_queue)),
            runner: ScanJobRunner::new(Arc::clone(&repository), scanner, Arc::clone(&dispatcher)),
            config: self.config,
            repository,
            job_queue,
            dispatcher,
            registry,
            change_diggers,
        })
    }
}
