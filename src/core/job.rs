//! Scan jobs and their queue encoding.
//!
//! A job travels through the job queue as a topic plus a flat attribute
//! map. The topic carries the property type:
//!
//! ```text
//! contentscan/scan/property/Binary   {"path": "/a/b", "index": 2, "userId": "admin"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::DispatchError;
use crate::core::types::PropertyType;

/// Root of the topics scan jobs are submitted to.
pub const SCAN_JOB_TOPIC_ROOT: &str = "contentscan/scan/property";

/// Root of the topics result events are published to.
pub const RESULT_EVENT_TOPIC_ROOT: &str = "contentscan/result/property";

/// Attribute holding the property path.
pub const PROPERTY_PATH: &str = "path";

/// Attribute holding the value index of a multi-valued property.
pub const VALUE_INDEX: &str = "index";

/// Attribute holding the id of the user who last wrote the property.
pub const USER_ID: &str = "userId";

/// Job attributes as submitted to the queue.
pub type JobAttributes = Map<String, Value>;

/// Returns the topic for scan jobs of the given property type.
pub fn scan_job_topic(property_type: PropertyType) -> String {
    format!("{}/{}", SCAN_JOB_TOPIC_ROOT, property_type.name())
}

/// Returns the topic for result events of the given property type.
pub fn result_event_topic(property_type: PropertyType) -> String {
    format!("{}/{}", RESULT_EVENT_TOPIC_ROOT, property_type.name())
}

/// A unit of work identifying exactly one property value to scan.
///
/// Jobs are not deduplicated; two overlapping digs may emit the same job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanJob {
    /// Absolute property path.
    pub path: String,

    /// Value index, present iff the property is multi-valued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,

    /// Who last wrote the property, absent for full-tree digs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Type of the property at dig time.
    pub property_type: PropertyType,
}

impl ScanJob {
    /// Creates a job for a single-valued property.
    pub fn single(path: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            path: path.into(),
            index: None,
            user_id: None,
            property_type,
        }
    }

    /// Creates a job for one value of a multi-valued property.
    pub fn multi(path: impl Into<String>, index: usize, property_type: PropertyType) -> Self {
        Self {
            index: Some(index),
            ..Self::single(path, property_type)
        }
    }

    /// Attributes the job to a user.
    pub fn with_user_id(mut self, user_id: Option<impl Into<String>>) -> Self {
        self.user_id = user_id.map(Into::into);
        self
    }

    /// Returns the topic this job is submitted to.
    pub fn topic(&self) -> String {
        scan_job_topic(self.property_type)
    }

    /// Encodes the job as queue attributes.
    pub fn to_attributes(&self) -> JobAttributes {
        let mut attributes = Map::new();
        attributes.insert(PROPERTY_PATH.into(), Value::from(self.path.clone()));
        if let Some(index) = self.index {
            attributes.insert(VALUE_INDEX.into(), Value::from(index));
        }
        if let Some(ref user_id) = self.user_id {
            attributes.insert(USER_ID.into(), Value::from(user_id.clone()));
        }
        attributes
    }

    /// Decodes a job from its topic and attributes.
    pub fn from_topic_and_attributes(
        topic: &str,
        attributes: &JobAttributes,
    ) -> Result<Self, DispatchError> {
        let type_name = topic
            .strip_prefix(SCAN_JOB_TOPIC_ROOT)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| DispatchError::invalid_job(topic, "not a scan job topic"))?;
        let property_type = type_name
            .parse()
            .map_err(|_| DispatchError::invalid_job(topic, format!("unknown property type: {}", type_name)))?;

        let path = attributes
            .get(PROPERTY_PATH)
            .and_then(Value::as_str)
            .ok_or_else(|| DispatchError::invalid_job(topic, "missing path"))?
            .to_string();

        let index = match attributes.get(VALUE_INDEX) {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                value
                    .as_u64()
                    .and_then(|i| usize::try_from(i).ok())
                    .ok_or_else(|| DispatchError::invalid_job(topic, format!("invalid index: {}", value)))?,
            ),
        };

        let user_id = attributes
            .get(USER_ID)
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            path,
            index,
            user_id,
            property_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_topics() {
        assert_eq!(scan_job_topic(PropertyType::Binary), "contentscan/scan/property/Binary");
        assert_eq!(result_event_topic(PropertyType::Uri), "contentscan/result/property/URI");
    }

    #[test]
    fn test_attributes_omit_absent_fields() {
        let job = ScanJob::single("/content/a/data", PropertyType::Binary);
        let attributes = job.to_attributes();
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes["path"], "/content/a/data");

        let job = ScanJob::multi("/content/a/tags", 2, PropertyType::String).with_user_id(Some("editor"));
        let attributes = job.to_attributes();
        assert_eq!(attributes["index"], 2);
        assert_eq!(attributes["userId"], "editor");
    }

    #[test]
    fn test_decode_job() {
        let attributes = json!({"path": "/c/p", "index": 1, "userId": "admin"});
        let job = ScanJob::from_topic_and_attributes(
            "contentscan/scan/property/String",
            attributes.as_object().unwrap(),
        )
        .unwrap();

        assert_eq!(job, ScanJob::multi("/c/p", 1, PropertyType::String).with_user_id(Some("admin")));
    }

    #[test]
    fn test_decode_rejects_bad_jobs() {
        let attributes = json!({"path": "/c/p"});
        let attributes = attributes.as_object().unwrap();
        assert!(ScanJob::from_topic_and_attributes("other/topic/Binary", attributes).is_err());
        assert!(ScanJob::from_topic_and_attributes("contentscan/scan/property/Blob", attributes).is_err());

        let negative = json!({"path": "/c/p", "index": -1});
        let err = ScanJob::from_topic_and_attributes(
            "contentscan/scan/property/Binary",
            negative.as_object().unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidJob { .. }));

        let missing = json!({"index": 0});
        assert!(ScanJob::from_topic_and_attributes(
            "contentscan/scan/property/Binary",
            missing.as_object().unwrap()
        )
        .is_err());
    }
}
