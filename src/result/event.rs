//! Publishing results onto an event bus.

use super::attributes::ResultAttributes;
use super::handler::ResultHandler;
use crate::core::{result_event_topic, should_act, HandlerError, JobAttributes, PropertyType, ScanResult};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::broadcast;

/// An event posted to the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct BusEvent {
    /// Event topic.
    pub topic: String,
    /// Event properties.
    pub properties: JobAttributes,
}

/// A publish/subscribe event bus.
///
/// Posting is fire-and-forget: it must not wait for subscribers.
pub trait EventBus: Send + Sync + Debug {
    /// Posts an event.
    fn post(&self, event: BusEvent) -> Result<(), HandlerError>;
}

/// An in-process event bus backed by a tokio broadcast channel.
///
/// Subscribers that fall behind by more than the capacity lose the oldest
/// events.
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl BroadcastEventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to every event posted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus for BroadcastEventBus {
    fn post(&self, event: BusEvent) -> Result<(), HandlerError> {
        let topic = event.topic.clone();
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(topic = %topic, receivers = receivers, "Event posted"),
            Err(_) => tracing::debug!(topic = %topic, "Event posted without subscribers"),
        }
        Ok(())
    }
}

/// Configuration for the [`EventPublisher`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventPublisherConfig {
    /// Publish OK results too.
    pub send_even_when_ok: bool,
}

/// Posts each result as a [`BusEvent`] on the result topic of its type.
#[derive(Debug)]
pub struct EventPublisher {
    bus: Arc<dyn EventBus>,
    config: EventPublisherConfig,
}

impl EventPublisher {
    /// Creates a publisher posting to `bus`.
    pub fn new(bus: Arc<dyn EventBus>, config: EventPublisherConfig) -> Self {
        Self { bus, config }
    }

    fn publish(
        &self,
        result: &ScanResult,
        path: &str,
        index: Option<usize>,
        property_type: PropertyType,
        user_id: Option<&str>,
    ) -> Result<(), HandlerError> {
        if !should_act(result, self.config.send_even_when_ok) {
            return Ok(());
        }
        let attributes = ResultAttributes::new(result, path, index, property_type, user_id);
        self.bus.post(BusEvent {
            topic: result_event_topic(property_type),
            properties: attributes.to_properties(),
        })
    }
}

#[async_trait]
impl ResultHandler for EventPublisher {
    fn name(&self) -> &str {
        "event-publisher"
    }

    async fn handle_single_value(
        &self,
        result: &ScanResult,
        path: &str,
        property_type: PropertyType,
        user_id: Option<&str>,
    ) -> Result<(), HandlerError> {
        self.publish(result, path, None, property_type, user_id)
    }

    async fn handle_multi_value(
        &self,
        result: &ScanResult,
        path: &str,
        index: usize,
        property_type: PropertyType,
        user_id: Option<&str>,
    ) -> Result<(), HandlerError> {
        self.publish(result, path, Some(index), property_type, user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_publishes_infected() {
        let bus = BroadcastEventBus::new(8);
        let mut events = bus.subscribe();
        let publisher = EventPublisher::new(Arc::new(bus), EventPublisherConfig::default());

        let result = ScanResult::infected("Eicar-Test-Signature FOUND", Utc::now(), 68);
        publisher
            .handle_multi_value(&result, "/c/tags", 1, PropertyType::String, Some("kim"))
            .await
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.topic, "contentscan/result/property/String");
        assert_eq!(event.properties["path"], "/c/tags");
        assert_eq!(event.properties["index"], 1);
        assert_eq!(event.properties["userId"], "kim");
        assert_eq!(event.properties["status"], "INFECTED");
    }

    #[tokio::test]
    async fn test_ok_results_gated() {
        let bus = BroadcastEventBus::new(8);
        let mut events = bus.subscribe();
        let result = ScanResult::ok(Utc::now(), 3);

        let quiet = EventPublisher::new(Arc::new(bus.clone()), EventPublisherConfig::default());
        quiet
            .handle_single_value(&result, "/c/data", PropertyType::Binary, None)
            .await
            .unwrap();
        assert!(events.try_recv().is_err());

        let chatty = EventPublisher::new(Arc::new(bus), EventPublisherConfig { send_even_when_ok: true });
        chatty
            .handle_single_value(&result, "/c/data", PropertyType::Binary, None)
            .await
            .unwrap();
        let event = events.try_recv().unwrap();
        assert_eq!(event.topic, "contentscan/result/property/Binary");
        assert_eq!(event.properties["status"], "OK");
    }

    #[test]
    fn test_post_without_subscribers() {
        let bus = BroadcastEventBus::default();
        let event = BusEvent {
            topic: "t".into(),
            properties: JobAttributes::new(),
        };
        assert!(bus.post(event).is_ok());
    }
}
