//! The attribute map describing one scan result.

use crate::core::job::{PROPERTY_PATH, USER_ID, VALUE_INDEX};
use crate::core::{JobAttributes, PropertyType, ScanResult, ScanStatus};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything known about a scanned value, flattened.
///
/// Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultAttributes {
    /// Completion time.
    pub timestamp: i64,
    /// Engine verdict.
    pub status: ScanStatus,
    /// Engine message, empty when OK.
    pub message: String,
    /// Start time.
    pub started: i64,
    /// Bytes scanned.
    pub size: u64,
    /// Property path.
    pub path: String,
    /// Value index of a multi-valued property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Property type.
    pub property_type: PropertyType,
    /// Who last wrote the property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ResultAttributes {
    /// Flattens a result and its context.
    pub fn new(
        result: &ScanResult,
        path: &str,
        index: Option<usize>,
        property_type: PropertyType,
        user_id: Option<&str>,
    ) -> Self {
        Self {
            timestamp: result.timestamp_millis(),
            status: result.status,
            message: result.message.clone(),
            started: result.started_millis(),
            size: result.size,
            path: path.to_string(),
            index,
            property_type,
            user_id: user_id.map(str::to_string),
        }
    }

    /// Returns the property map shared by events, mails and records.
    ///
    /// The property type is carried by the event topic or record name, so it
    /// is not part of the map.
    pub fn to_properties(&self) -> JobAttributes {
        let mut properties = JobAttributes::new();
        properties.insert(PROPERTY_PATH.into(), Value::from(self.path.clone()));
        if let Some(index) = self.index {
            properties.insert(VALUE_INDEX.into(), Value::from(index));
        }
        if let Some(ref user_id) = self.user_id {
            properties.insert(USER_ID.into(), Value::from(user_id.clone()));
        }
        properties.insert("timestamp".into(), Value::from(self.timestamp));
        properties.insert("message".into(), Value::from(self.message.clone()));
        properties.insert("status".into(), Value::from(self.status.as_str()));
        properties.insert("started".into(), Value::from(self.started));
        properties.insert("size".into(), Value::from(self.size));
        properties
    }

    /// Serializes every field, property type included, as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
