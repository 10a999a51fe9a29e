//! Content repository interfaces.

use crate::core::error::RepositoryError;
use crate::core::input::ValueStream;
use crate::core::types::PropertyType;

use std::sync::Arc;

/// Value lengths of a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyLengths {
    /// Length of the only value.
    Single(u64),
    /// Length of every value, by index.
    Multiple(Vec<u64>),
}

/// A snapshot of a property's shape, read at lookup time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentProperty {
    /// Absolute property path.
    pub path: String,
    /// Property type.
    pub property_type: PropertyType,
    /// Lengths of the values.
    pub lengths: PropertyLengths,
}

impl ContentProperty {
    /// Returns `true` if the property holds an ordered list of values.
    pub fn is_multiple(&self) -> bool {
        matches!(self.lengths, PropertyLengths::Multiple(_))
    }

    /// Returns the number of values.
    pub fn value_count(&self) -> usize {
        match &self.lengths {
            PropertyLengths::Single(_) => 1,
            PropertyLengths::Multiple(lengths) => lengths.len(),
        }
    }
}

/// A property value ready to be read.
#[derive(Debug)]
pub enum PropertyValue {
    /// Raw bytes, streamed as-is.
    Binary(ValueStream),
    /// Textual value, scanned as UTF-8.
    Text(String),
}

/// A node of the content tree.
///
/// Views are read-only. A tree that is modified while a dig runs is seen as
/// a best-effort snapshot, not a consistent one.
pub trait ContentNode: Send + Sync {
    /// Absolute path of the node.
    fn path(&self) -> &str;

    /// Number of path segments from the root; the root has depth 0.
    fn depth(&self) -> usize;

    /// Properties of the node.
    fn properties(&self) -> Result<Vec<ContentProperty>, RepositoryError>;

    /// Child nodes, in repository order.
    fn children(&self) -> Result<Vec<Arc<dyn ContentNode>>, RepositoryError>;
}

/// A repository session bound to one identity.
pub trait Session: Send {
    /// Resolves a node.
    fn node(&self, path: &str) -> Result<Arc<dyn ContentNode>, RepositoryError>;

    /// Resolves a property's shape.
    fn property(&self, path: &str) -> Result<ContentProperty, RepositoryError>;

    /// Opens a value of a property. `index` selects a value of a multi-valued
    /// property and must be `None` for single-valued ones.
    fn value(&self, path: &str, index: Option<usize>) -> Result<PropertyValue, RepositoryError>;
}

/// A content repository.
pub trait Repository: Send + Sync {
    /// Opens a session under the technical service identity.
    fn service_session(&self) -> Result<Box<dyn Session>, RepositoryError>;
}

/// Returns the number of segments in an absolute path.
pub fn path_depth(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}

/// Splits a property path into its node path and property name.
pub fn split_property_path(path: &str) -> Option<(&str, &str)> {
    let (parent, name) = path.rsplit_once('/')?;
    if name.is_empty() {
        return None;
    }
    Some((if parent.is_empty() { "/" } else { parent }, name))
}

/// Joins a node path and a child name.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_depth() {
        assert_eq!(path_depth("/"), 0);
        assert_eq!(path_depth("/content"), 1);
        assert_eq!(path_depth("/content/a/b"), 3);
    }

    #[test]
    fn test_split_property_path() {
        assert_eq!(split_property_path("/content/a/data"), Some(("/content/a", "data")));
        assert_eq!(split_property_path("/title"), Some(("/", "title")));
        assert_eq!(split_property_path("/content/"), None);
        assert_eq!(split_property_path("title"), None);
    }

    #[test]
    fn test_child_path() {
        assert_eq!(child_path("/", "content"), "/content");
        assert_eq!(child_path("/content", "a"), "/content/a");
    }

    #[test]
    fn test_property_shape() {
        let property = ContentProperty {
            path: "/a/tags".into(),
            property_type: PropertyType::String,
            lengths: PropertyLengths::Multiple(vec![1, 2, 3]),
        };
        assert!(property.is_multiple());
        assert_eq!(property.value_count(), 3);
    }
}
