//! In-memory content repository.
//!
//! Useful for tests and demos. Nodes are kept in a sorted map keyed by path,
//! so children are always listed in path order.

use crate::core::error::RepositoryError;
use crate::core::input::ValueStream;
use crate::core::types::PropertyType;
use crate::repository::traits::{
    child_path, path_depth, split_property_path, ContentNode, ContentProperty, PropertyLengths, PropertyValue,
    Repository, Session,
};

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// A stored property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryValue {
    /// Raw bytes.
    Binary(Vec<u8>),
    /// Text, measured in UTF-8 bytes.
    Text(String),
}

impl MemoryValue {
    /// Length of the value in bytes.
    pub fn len(&self) -> u64 {
        match self {
            Self::Binary(data) => data.len() as u64,
            Self::Text(text) => text.len() as u64,
        }
    }

    /// Returns `true` if the value is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct StoredProperty {
    property_type: PropertyType,
    values: Vec<MemoryValue>,
    multiple: bool,
}

#[derive(Debug, Default)]
struct Tree {
    nodes: BTreeMap<String, BTreeMap<String, StoredProperty>>,
    failing: HashSet<String>,
}

impl Tree {
    fn ensure_node(&mut self, path: &str) {
        let mut current = String::new();
        self.nodes.entry("/".to_string()).or_default();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            self.nodes.entry(current.clone()).or_default();
        }
    }

    fn check_access(&self, path: &str) -> Result<(), RepositoryError> {
        if self.failing.contains(path) {
            return Err(RepositoryError::access_failed(path, "access denied"));
        }
        Ok(())
    }

    fn stored(&self, path: &str) -> Result<&StoredProperty, RepositoryError> {
        self.check_access(path)?;
        let (node, name) =
            split_property_path(path).ok_or_else(|| RepositoryError::not_found(path))?;
        self.check_access(node)?;
        self.nodes
            .get(node)
            .and_then(|properties| properties.get(name))
            .ok_or_else(|| RepositoryError::not_found(path))
    }
}

fn describe(path: String, stored: &StoredProperty) -> ContentProperty {
    let lengths = if stored.multiple {
        PropertyLengths::Multiple(stored.values.iter().map(MemoryValue::len).collect())
    } else {
        PropertyLengths::Single(stored.values.first().map_or(0, MemoryValue::len))
    };
    ContentProperty {
        path,
        property_type: stored.property_type,
        lengths,
    }
}

fn parent_of(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    split_property_path(path).map(|(parent, _)| parent)
}

/// An in-memory repository.
///
/// Cloning shares the underlying tree.
#[derive(Debug, Clone)]
pub struct MemoryRepository {
    tree: Arc<RwLock<Tree>>,
    unavailable: Arc<AtomicBool>,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    /// Creates a repository holding only the root node.
    pub fn new() -> Self {
        let mut tree = Tree::default();
        tree.ensure_node("/");
        Self {
            tree: Arc::new(RwLock::new(tree)),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tree> {
        self.tree.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tree> {
        self.tree.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds a node and any missing ancestors.
    pub fn add_node(&self, path: &str) -> &Self {
        self.write().ensure_node(path);
        self
    }

    /// Sets a property, creating its node if needed.
    pub fn set_property(
        &self,
        path: &str,
        property_type: PropertyType,
        values: Vec<MemoryValue>,
        multiple: bool,
    ) -> &Self {
        if let Some((node, name)) = split_property_path(path) {
            let mut tree = self.write();
            tree.ensure_node(node);
            if let Some(properties) = tree.nodes.get_mut(node) {
                properties.insert(
                    name.to_string(),
                    StoredProperty {
                        property_type,
                        values,
                        multiple,
                    },
                );
            }
        }
        self
    }

    /// Sets a single-valued binary property.
    pub fn set_binary(&self, path: &str, data: impl Into<Vec<u8>>) -> &Self {
        self.set_property(path, PropertyType::Binary, vec![MemoryValue::Binary(data.into())], false)
    }

    /// Sets a single-valued string property.
    pub fn set_string(&self, path: &str, text: impl Into<String>) -> &Self {
        self.set_property(path, PropertyType::String, vec![MemoryValue::Text(text.into())], false)
    }

    /// Sets a multi-valued string property.
    pub fn set_strings<S: Into<String>>(&self, path: &str, values: impl IntoIterator<Item = S>) -> &Self {
        let values = values.into_iter().map(|v| MemoryValue::Text(v.into())).collect();
        self.set_property(path, PropertyType::String, values, true)
    }

    /// Sets a multi-valued binary property.
    pub fn set_binaries<B: Into<Vec<u8>>>(&self, path: &str, values: impl IntoIterator<Item = B>) -> &Self {
        let values = values.into_iter().map(|v| MemoryValue::Binary(v.into())).collect();
        self.set_property(path, PropertyType::Binary, values, true)
    }

    /// Removes a property. Returns `true` if it existed.
    pub fn remove_property(&self, path: &str) -> bool {
        let Some((node, name)) = split_property_path(path) else {
            return false;
        };
        self.write()
            .nodes
            .get_mut(node)
            .map_or(false, |properties| properties.remove(name).is_some())
    }

    /// Makes every access to `path` fail.
    pub fn fail_on(&self, path: &str) {
        self.write().failing.insert(path.to_string());
    }

    /// Makes opening sessions fail or succeed.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Returns a view of the node at `path`.
    pub fn node(&self, path: &str) -> Result<Arc<dyn ContentNode>, RepositoryError> {
        let tree = self.read();
        tree.check_access(path)?;
        if !tree.nodes.contains_key(path) {
            return Err(RepositoryError::not_found(path));
        }
        Ok(Arc::new(MemoryNode {
            tree: Arc::clone(&self.tree),
            path: path.to_string(),
            depth: path_depth(path),
        }))
    }
}

impl Repository for MemoryRepository {
    fn service_session(&self) -> Result<Box<dyn Session>, RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::SessionUnavailable {
                reason: "repository is offline".into(),
            });
        }
        Ok(Box::new(MemorySession { repo: self.clone() }))
    }
}

/// A view of one node of a [`MemoryRepository`].
#[derive(Debug)]
pub struct MemoryNode {
    tree: Arc<RwLock<Tree>>,
    path: String,
    depth: usize,
}

impl MemoryNode {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tree> {
        self.tree.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ContentNode for MemoryNode {
    fn path(&self) -> &str {
        &self.path
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn properties(&self) -> Result<Vec<ContentProperty>, RepositoryError> {
        let tree = self.read();
        tree.check_access(&self.path)?;
        let properties = tree
            .nodes
            .get(&self.path)
            .ok_or_else(|| RepositoryError::not_found(self.path.clone()))?;
        Ok(properties
            .iter()
            .map(|(name, stored)| describe(child_path(&self.path, name), stored))
            .collect())
    }

    fn children(&self) -> Result<Vec<Arc<dyn ContentNode>>, RepositoryError> {
        let tree = self.read();
        tree.check_access(&self.path)?;
        Ok(tree
            .nodes
            .keys()
            .filter(|candidate| parent_of(candidate) == Some(self.path.as_str()))
            .map(|child| {
                Arc::new(MemoryNode {
                    tree: Arc::clone(&self.tree),
                    path: child.clone(),
                    depth: self.depth + 1,
                }) as Arc<dyn ContentNode>
            })
            .collect())
    }
}

/// A session over a [`MemoryRepository`].
#[derive(Debug)]
pub struct MemorySession {
    repo: MemoryRepository,
}

impl Session for MemorySession {
    fn node(&self, path: &str) -> Result<Arc<dyn ContentNode>, RepositoryError> {
        self.repo.node(path)
    }

    fn property(&self, path: &str) -> Result<ContentProperty, RepositoryError> {
        let tree = self.repo.read();
        let stored = tree.stored(path)?;
        Ok(describe(path.to_string(), stored))
    }

    fn value(&self, path: &str, index: Option<usize>) -> Result<PropertyValue, RepositoryError> {
        let tree = self.repo.read();
        let stored = tree.stored(path)?;
        let value = match (stored.multiple, index) {
            (true, Some(i)) => stored.values.get(i).ok_or(RepositoryError::IndexOutOfRange {
                path: path.to_string(),
                index: i,
                len: stored.values.len(),
            })?,
            (false, None) => stored
                .values
                .first()
                .ok_or_else(|| RepositoryError::not_found(path))?,
            (true, None) => {
                return Err(RepositoryError::access_failed(path, "multi-valued property needs an index"))
            }
            (false, Some(_)) => {
                return Err(RepositoryError::access_failed(path, "single-valued property has no index"))
            }
        };
        Ok(match value {
            MemoryValue::Binary(data) => PropertyValue::Binary(ValueStream::from_bytes(data.clone())),
            MemoryValue::Text(text) => PropertyValue::Text(text.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository() -> MemoryRepository {
        let repo = MemoryRepository::new();
        repo.set_binary("/content/a/data", vec![0u8; 10])
            .set_string("/content/a/title", "hello")
            .set_strings("/content/b/tags", ["x", "yy"]);
        repo
    }

    #[test]
    fn test_nodes_and_children() {
        let repo = repository();
        let content = repo.node("/content").unwrap();
        assert_eq!(content.depth(), 1);

        let children: Vec<String> = content
            .children()
            .unwrap()
            .iter()
            .map(|c| c.path().to_string())
            .collect();
        assert_eq!(children, vec!["/content/a", "/content/b"]);

        let root = repo.node("/").unwrap();
        assert_eq!(root.depth(), 0);
        assert_eq!(root.children().unwrap().len(), 1);
    }

    #[test]
    fn test_properties_report_lengths() {
        let repo = repository();
        let properties = repo.node("/content/a").unwrap().properties().unwrap();
        assert_eq!(properties.len(), 2);
        assert_eq!(properties[0].path, "/content/a/data");
        assert_eq!(properties[0].lengths, PropertyLengths::Single(10));

        let session = repo.service_session().unwrap();
        let tags = session.property("/content/b/tags").unwrap();
        assert_eq!(tags.lengths, PropertyLengths::Multiple(vec![1, 2]));
    }

    #[test]
    fn test_values() {
        let repo = repository();
        let session = repo.service_session().unwrap();

        assert!(matches!(session.value("/content/a/data", None), Ok(PropertyValue::Binary(_))));
        match session.value("/content/b/tags", Some(1)).unwrap() {
            PropertyValue::Text(text) => assert_eq!(text, "yy"),
            other => panic!("unexpected value {:?}", other),
        }
        assert!(matches!(
            session.value("/content/b/tags", Some(5)),
            Err(RepositoryError::IndexOutOfRange { len: 2, .. })
        ));
    }

    #[test]
    fn test_removed_property_is_not_found() {
        let repo = repository();
        assert!(repo.remove_property("/content/a/data"));
        assert!(!repo.remove_property("/content/a/data"));

        let session = repo.service_session().unwrap();
        assert!(matches!(
            session.property("/content/a/data"),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_failure_injection() {
        let repo = repository();
        repo.fail_on("/content/b");
        let node = repo.node("/content").unwrap();
        let b = node.children().unwrap().pop().unwrap();
        assert!(b.properties().is_err());

        repo.set_available(false);
        assert!(repo.service_session().is_err());
    }
}
