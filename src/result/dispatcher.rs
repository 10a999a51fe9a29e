//! Fan-out of scan results to registered handlers.

use super::handler::ArcResultHandler;
use crate::audit;
use crate::core::{HandlerError, PropertyType, ScanResult};

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Identifies an attached handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Counters of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Handlers called.
    pub handled: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

/// Calls every registered handler, in registration order, for each result.
///
/// A failing or panicking handler is logged and skipped; the remaining
/// handlers still run and the caller never sees the failure. Handlers may
/// attach and detach while a dispatch is running; the running dispatch works
/// on the set it saw when it started.
#[derive(Debug, Default)]
pub struct ResultDispatcher {
    handlers: RwLock<Vec<(HandlerId, ArcResultHandler)>>,
    next_id: AtomicU64,
}

impl ResultDispatcher {
    /// Creates a dispatcher without handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler.
    pub fn attach(&self, handler: ArcResultHandler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(handler = handler.name(), "Attaching result handler");
        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, handler));
        id
    }

    /// Removes a handler. Returns `false` if it was not attached.
    pub fn detach(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = handlers.len();
        handlers.retain(|(attached, _)| *attached != id);
        before != handlers.len()
    }

    /// Returns the number of attached handlers.
    pub fn handler_count(&self) -> usize {
        self.snapshot().len()
    }

    /// Returns the names of the attached handlers in call order.
    pub fn handler_names(&self) -> Vec<String> {
        self.snapshot().iter().map(|h| h.name().to_string()).collect()
    }

    fn snapshot(&self) -> Vec<ArcResultHandler> {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect()
    }

    /// Hands `result` to every handler.
    ///
    /// `index` selects the multi-value variant of the handler call.
    pub async fn dispatch(
        &self,
        result: &ScanResult,
        path: &str,
        index: Option<usize>,
        property_type: PropertyType,
        user_id: Option<&str>,
    ) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for handler in self.snapshot() {
            summary.handled += 1;
            let call = match index {
                Some(index) => handler.handle_multi_value(result, path, index, property_type, user_id),
                None => handler.handle_single_value(result, path, property_type, user_id),
            };

            let outcome = match AssertUnwindSafe(call).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => Err(HandlerError::Panicked {
                    handler: handler.name().to_string(),
                }),
            };

            if let Err(e) = outcome {
                summary.failed += 1;
                audit::emit_handler_failed(handler.name(), path, index, &e);
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ResultHandler;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    enum Behavior {
        Record,
        Fail,
        Panic,
    }

    #[derive(Debug)]
    struct TestHandler {
        name: String,
        behavior: Behavior,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl TestHandler {
        fn new(name: &str, behavior: Behavior, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                behavior,
                log: log.clone(),
            })
        }

        fn run(&self, entry: String) -> Result<(), HandlerError> {
            match self.behavior {
                Behavior::Record => {
                    self.log.lock().unwrap().push(entry);
                    Ok(())
                }
                Behavior::Fail => Err(HandlerError::Publish { reason: "bus down".into() }),
                Behavior::Panic => panic!("handler blew up"),
            }
        }
    }

    #[async_trait]
    impl ResultHandler for TestHandler {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle_single_value(
            &self,
            _result: &ScanResult,
            path: &str,
            _property_type: PropertyType,
            _user_id: Option<&str>,
        ) -> Result<(), HandlerError> {
            self.run(format!("{}:{}", self.name, path))
        }

        async fn handle_multi_value(
            &self,
            _result: &ScanResult,
            path: &str,
            index: usize,
            _property_type: PropertyType,
            _user_id: Option<&str>,
        ) -> Result<(), HandlerError> {
            self.run(format!("{}:{}[{}]", self.name, path, index))
        }
    }

    #[tokio::test]
    async fn test_dispatch_order_and_variant() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = ResultDispatcher::new();
        dispatcher.attach(TestHandler::new("a", Behavior::Record, &log));
        dispatcher.attach(TestHandler::new("b", Behavior::Record, &log));

        let result = ScanResult::ok(Utc::now(), 1);
        dispatcher.dispatch(&result, "/p", None, PropertyType::Binary, None).await;
        dispatcher.dispatch(&result, "/m", Some(3), PropertyType::String, None).await;

        assert_eq!(*log.lock().unwrap(), vec!["a:/p", "b:/p", "a:/m[3]", "b:/m[3]"]);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = ResultDispatcher::new();
        dispatcher.attach(TestHandler::new("failing", Behavior::Fail, &log));
        dispatcher.attach(TestHandler::new("panicking", Behavior::Panic, &log));
        dispatcher.attach(TestHandler::new("last", Behavior::Record, &log));

        let result = ScanResult::infected("X FOUND", Utc::now(), 1);
        let summary = dispatcher.dispatch(&result, "/p", None, PropertyType::Binary, None).await;

        assert_eq!(summary, DispatchSummary { handled: 3, failed: 2 });
        assert_eq!(*log.lock().unwrap(), vec!["last:/p"]);
    }

    #[tokio::test]
    async fn test_attach_detach() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = ResultDispatcher::new();
        let first = dispatcher.attach(TestHandler::new("a", Behavior::Record, &log));
        dispatcher.attach(TestHandler::new("b", Behavior::Record, &log));

        assert!(dispatcher.detach(first));
        assert!(!dispatcher.detach(first));
        assert_eq!(dispatcher.handler_names(), vec!["b"]);

        let result = ScanResult::ok(Utc::now(), 1);
        dispatcher.dispatch(&result, "/p", None, PropertyType::Binary, None).await;
        assert_eq!(*log.lock().unwrap(), vec!["b:/p"]);
    }
}
