//! Digger configuration.

use crate::core::error::DispatchError;
use crate::core::types::{validate_limit, PathPattern, PropertyType};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Pattern matching every absolute path.
pub const DEFAULT_PROPERTY_PATH_PATTERN: &str = "^/.*$";

/// Defaults for full-tree digs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeDiggerConfig {
    /// Pattern a property path has to match.
    pub property_path_pattern: String,

    /// Types of properties to scan.
    pub property_types: Vec<PropertyType>,

    /// Max length of a value to scan, -1 for unlimited.
    pub property_length_max: i64,

    /// Max depth of nodes below the dig root, -1 for unlimited.
    pub node_depth_max: i32,
}

impl Default for TreeDiggerConfig {
    fn default() -> Self {
        Self {
            property_path_pattern: DEFAULT_PROPERTY_PATH_PATTERN.to_string(),
            property_types: vec![PropertyType::Binary],
            property_length_max: -1,
            node_depth_max: -1,
        }
    }
}

impl TreeDiggerConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default path pattern.
    pub fn with_property_path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.property_path_pattern = pattern.into();
        self
    }

    /// Sets the default property types.
    pub fn with_property_types(mut self, types: impl IntoIterator<Item = PropertyType>) -> Self {
        self.property_types = types.into_iter().collect();
        self
    }

    /// Sets the default max value length.
    pub fn with_property_length_max(mut self, max: i64) -> Self {
        self.property_length_max = max;
        self
    }

    /// Sets the default max node depth.
    pub fn with_node_depth_max(mut self, max: i32) -> Self {
        self.node_depth_max = max;
        self
    }

    /// Compiles the default pattern.
    pub fn pattern(&self) -> Result<PathPattern, DispatchError> {
        PathPattern::new(self.property_path_pattern.clone())
    }

    /// Returns the default property types as a set.
    pub fn property_type_set(&self) -> BTreeSet<PropertyType> {
        self.property_types.iter().copied().collect()
    }

    /// Checks every default.
    pub fn validate(&self) -> Result<(), DispatchError> {
        self.pattern()?;
        if self.property_types.is_empty() {
            return Err(DispatchError::validation("propertyTypes", "At least one property type is required"));
        }
        validate_limit("maxLength", self.property_length_max)?;
        validate_limit("maxDepth", i64::from(self.node_depth_max))
    }
}

/// Configuration of one change-observing digger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeDiggerConfig {
    /// The single property type this digger emits jobs for.
    pub property_type: PropertyType,

    /// Pattern a property path has to match.
    pub property_path_pattern: String,

    /// Max length of a value to scan, -1 for unlimited.
    pub property_length_max: i64,

    /// Number of workers resolving candidates.
    pub workers: usize,

    /// Number of dig tasks that may wait for a worker.
    pub queue_capacity: usize,
}

impl Default for ChangeDiggerConfig {
    fn default() -> Self {
        Self {
            property_type: PropertyType::Binary,
            property_path_pattern: DEFAULT_PROPERTY_PATH_PATTERN.to_string(),
            property_length_max: -1,
            workers: 4,
            queue_capacity: 256,
        }
    }
}

impl ChangeDiggerConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the property type.
    pub fn with_property_type(mut self, property_type: PropertyType) -> Self {
        self.property_type = property_type;
        self
    }

    /// Sets the path pattern.
    pub fn with_property_path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.property_path_pattern = pattern.into();
        self
    }

    /// Sets the max value length.
    pub fn with_property_length_max(mut self, max: i64) -> Self {
        self.property_length_max = max;
        self
    }

    /// Sets the number of workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the task queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Checks the configuration.
    pub fn validate(&self) -> Result<(), DispatchError> {
        PathPattern::new(self.property_path_pattern.clone())?;
        validate_limit("property_length_max", self.property_length_max)?;
        if self.workers == 0 {
            return Err(DispatchError::validation("workers", "At least one worker is required"));
        }
        if self.queue_capacity == 0 {
            return Err(DispatchError::validation("queue_capacity", "Queue capacity must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_defaults() {
        let config = TreeDiggerConfig::default();
        assert_eq!(config.property_path_pattern, "^/.*$");
        assert_eq!(config.property_types, vec![PropertyType::Binary]);
        assert_eq!(config.property_length_max, -1);
        assert_eq!(config.node_depth_max, -1);
        assert!(config.validate().is_ok());
        assert!(config.pattern().unwrap().matches("/content/a/data"));
    }

    #[test]
    fn test_tree_validation() {
        let config = TreeDiggerConfig::new().with_node_depth_max(-2);
        assert_eq!(config.validate().unwrap_err().parameter(), Some("maxDepth"));

        let config = TreeDiggerConfig::new().with_property_types([]);
        assert_eq!(config.validate().unwrap_err().parameter(), Some("propertyTypes"));
    }

    #[test]
    fn test_change_config() {
        let config = ChangeDiggerConfig::new()
            .with_property_type(PropertyType::String)
            .with_workers(0);
        assert_eq!(config.validate().unwrap_err().parameter(), Some("workers"));

        let parsed: ChangeDiggerConfig =
            serde_json::from_str(r#"{"property_type": "URI", "property_length_max": 1024}"#).unwrap();
        assert_eq!(parsed.property_type, PropertyType::Uri);
        assert_eq!(parsed.property_length_max, 1024);
        assert_eq!(parsed.workers, 4);
    }
}
