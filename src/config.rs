//! Deployment configuration.
//!
//! A [`ContentScanConfig`] describes every digger and handler of a
//! [`ScanPipeline`](crate::pipeline::ScanPipeline). It can be built in code or
//! loaded from JSON; missing fields take their defaults.
//!
//! ```json
//! {
//!   "tree_digger": { "property_types": ["Binary", "String"], "node_depth_max": 5 },
//!   "change_diggers": [{ "property_type": "Binary", "property_length_max": 10485760 }],
//!   "mail": [{ "to": ["security@example.com"] }],
//!   "persisters": [{ "result_root": "/var/contentscan/results" }],
//!   "sse": { "channel_capacity": 32 }
//! }
//! ```

use crate::core::DispatchError;
use crate::dig::{ChangeDiggerConfig, TreeDiggerConfig};
use crate::result::{EventPublisherConfig, MailConfig, PersisterConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings of the streaming endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SseConfig {
    /// Register the streaming handler.
    pub enabled: bool,
    /// Frames buffered per channel client before it counts as not ready.
    pub channel_capacity: usize,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_capacity: 64,
        }
    }
}

/// Configuration of a whole pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentScanConfig {
    /// Defaults of full-tree digs.
    pub tree_digger: TreeDiggerConfig,
    /// One change digger per entry.
    pub change_diggers: Vec<ChangeDiggerConfig>,
    /// Event publisher, `None` to disable.
    pub event_publisher: Option<EventPublisherConfig>,
    /// One mail sender per entry.
    pub mail: Vec<MailConfig>,
    /// One persister per entry.
    pub persisters: Vec<PersisterConfig>,
    /// Streaming endpoint.
    pub sse: SseConfig,
}

impl Default for ContentScanConfig {
    fn default() -> Self {
        Self {
            tree_digger: TreeDiggerConfig::default(),
            change_diggers: Vec::new(),
            event_publisher: Some(EventPublisherConfig::default()),
            mail: Vec::new(),
            persisters: Vec::new(),
            sse: SseConfig::default(),
        }
    }
}

fn config_error(reason: impl std::fmt::Display) -> DispatchError {
    DispatchError::validation("config", format!("Invalid configuration: {}", reason))
}

impl ContentScanConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, DispatchError> {
        serde_json::from_str(json).map_err(config_error)
    }

    /// Reads and parses a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DispatchError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| config_error(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Sets the tree digger defaults.
    pub fn with_tree_digger(mut self, config: TreeDiggerConfig) -> Self {
        self.tree_digger = config;
        self
    }

    /// Adds a change digger.
    pub fn with_change_digger(mut self, config: ChangeDiggerConfig) -> Self {
        self.change_diggers.push(config);
        self
    }

    /// Sets or disables the event publisher.
    pub fn with_event_publisher(mut self, config: Option<EventPublisherConfig>) -> Self {
        self.event_publisher = config;
        self
    }

    /// Adds a mail sender.
    pub fn with_mail(mut self, config: MailConfig) -> Self {
        self.mail.push(config);
        self
    }

    /// Adds a persister.
    pub fn with_persister(mut self, config: PersisterConfig) -> Self {
        self.persisters.push(config);
        self
    }

    /// Sets the streaming endpoint settings.
    pub fn with_sse(mut self, config: SseConfig) -> Self {
        self.sse = config;
        self
    }

    /// Checks every part.
    pub fn validate(&self) -> Result<(), DispatchError> {
        self.tree_digger.validate()?;
        for digger in &self.change_diggers {
            digger.validate()?;
        }

        for mail in &self.mail {
            if mail.to.iter().all(|address| address.trim().is_empty()) {
                return Err(DispatchError::validation("mail.to", "At least one recipient is required"));
            }
            for template in [&mail.subject, &mail.text, &mail.html] {
                if !template.trim().is_empty() {
                    mustache::compile_str(template).map_err(|e| DispatchError::validation("mail", e.to_string()))?;
                }
            }
        }

        for persister in &self.persisters {
            if !persister.result_root.starts_with('/') {
                return Err(DispatchError::validation(
                    "result_root",
                    format!("Invalid parameter value for result_root: {}", persister.result_root),
                ));
            }
        }

        if self.sse.channel_capacity == 0 {
            return Err(DispatchError::validation("sse.channel_capacity", "Channel capacity must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PropertyType;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ContentScanConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.event_publisher.is_some());
        assert!(config.sse.enabled);
        assert!(config.change_diggers.is_empty());
    }

    #[test]
    fn test_from_json() {
        let config = ContentScanConfig::from_json_str(
            r#"{
                "tree_digger": { "property_types": ["Binary", "String"], "node_depth_max": 5 },
                "change_diggers": [{ "property_type": "String", "property_length_max": 100 }],
                "event_publisher": null,
                "mail": [{ "to": ["security@example.com"], "send_even_when_ok": true }],
                "persisters": [{}]
            }"#,
        )
        .unwrap();

        assert_eq!(config.tree_digger.node_depth_max, 5);
        assert_eq!(config.tree_digger.property_length_max, -1);
        assert_eq!(config.change_diggers[0].property_type, PropertyType::String);
        assert!(config.event_publisher.is_none());
        assert!(config.mail[0].send_even_when_ok);
        assert!(config.mail[0].subject.starts_with("Scan result:"));
        assert_eq!(config.persisters[0].result_root, "/var/contentscan/results");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "sse": {{ "channel_capacity": 8 }} }}"#).unwrap();

        let config = ContentScanConfig::from_file(file.path()).unwrap();
        assert_eq!(config.sse.channel_capacity, 8);

        let err = ContentScanConfig::from_file("/nonexistent/contentscan.json").unwrap_err();
        assert_eq!(err.parameter(), Some("config"));
    }

    #[test]
    fn test_validation_failures() {
        let err = ContentScanConfig::from_json_str("{ not json").unwrap_err();
        assert!(err.is_validation());

        let config = ContentScanConfig::new().with_mail(MailConfig::new([" "]));
        assert_eq!(config.validate().unwrap_err().parameter(), Some("mail.to"));

        let config = ContentScanConfig::new().with_mail(MailConfig::new(["a@b.c"]).with_text("{{#index}}"));
        assert_eq!(config.validate().unwrap_err().parameter(), Some("mail"));

        let config = ContentScanConfig::new().with_persister(PersisterConfig::new().with_result_root("results"));
        assert_eq!(config.validate().unwrap_err().parameter(), Some("result_root"));

        let config = ContentScanConfig::new().with_change_digger(ChangeDiggerConfig::new().with_workers(0));
        assert!(config.validate().is_err());
    }
}
