//! Streaming results to connected clients.

use super::event::{SseEvent, RESULT_EVENT_TYPE};
use super::registry::ClientRegistry;
use crate::core::{HandlerError, PropertyType, ScanResult};
use crate::result::{ResultAttributes, ResultHandler};

use async_trait::async_trait;
use std::sync::Arc;

/// Forwards every result it receives to all streaming clients.
///
/// Unlike the other handlers it has no OK toggle.
#[derive(Debug, Clone)]
pub struct SseBroadcaster {
    registry: Arc<ClientRegistry>,
}

impl SseBroadcaster {
    /// Creates a broadcaster delivering through `registry`.
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Returns the registry.
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    fn forward(
        &self,
        result: &ScanResult,
        path: &str,
        index: Option<usize>,
        property_type: PropertyType,
        user_id: Option<&str>,
    ) -> Result<(), HandlerError> {
        let data = ResultAttributes::new(result, path, index, property_type, user_id).to_json()?;
        self.registry.broadcast(SseEvent::new(RESULT_EVENT_TYPE, data));
        Ok(())
    }
}

#[async_trait]
impl ResultHandler for SseBroadcaster {
    fn name(&self) -> &str {
        "sse-broadcaster"
    }

    async fn handle_single_value(
        &self,
        result: &ScanResult,
        path: &str,
        property_type: PropertyType,
        user_id: Option<&str>,
    ) -> Result<(), HandlerError> {
        self.forward(result, path, None, property_type, user_id)
    }

    async fn handle_multi_value(
        &self,
        result: &ScanResult,
        path: &str,
        index: usize,
        property_type: PropertyType,
        user_id: Option<&str>,
    ) -> Result<(), HandlerError> {
        self.forward(result, path, Some(index), property_type, user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::MemoryTransport;
    use chrono::DateTime;
    use serde_json::Value;

    #[tokio::test]
    async fn test_forwards_ok_results() {
        let registry = Arc::new(ClientRegistry::new());
        let transport = Arc::new(MemoryTransport::new());
        registry.register(transport.clone());
        let broadcaster = SseBroadcaster::new(registry);

        let result = ScanResult::ok(DateTime::from_timestamp_millis(1_000).unwrap(), 12)
            .with_timestamp(DateTime::from_timestamp_millis(1_200).unwrap());
        broadcaster
            .handle_single_value(&result, "/c/data", PropertyType::Binary, None)
            .await
            .unwrap();

        let frames = transport.frames();
        assert_eq!(frames.len(), 1);
        let data = frames[0]
            .strip_prefix("event: contentscan/property/result\ndata: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .unwrap();
        let json: Value = serde_json::from_str(data).unwrap();
        assert_eq!(json["status"], "OK");
        assert_eq!(json["message"], "");
        assert_eq!(json["timestamp"], 1_200);
        assert_eq!(json["started"], 1_000);
        assert_eq!(json["size"], 12);
        assert_eq!(json["path"], "/c/data");
        assert_eq!(json["propertyType"], "Binary");
        assert!(json.get("index").is_none());
        assert!(json.get("userId").is_none());
    }

    #[tokio::test]
    async fn test_multi_value_carries_index() {
        let registry = Arc::new(ClientRegistry::new());
        let transport = Arc::new(MemoryTransport::new());
        registry.register(transport.clone());
        let broadcaster = SseBroadcaster::new(registry);

        let result = ScanResult::infected("X FOUND", DateTime::from_timestamp_millis(0).unwrap(), 1);
        broadcaster
            .handle_multi_value(&result, "/c/tags", 1, PropertyType::String, Some("eve"))
            .await
            .unwrap();

        let written = transport.written();
        assert!(written.contains("\"index\":1"));
        assert!(written.contains("\"userId\":\"eve\""));
        assert!(written.contains("\"status\":\"INFECTED\""));
    }
}
