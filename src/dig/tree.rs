//! Full-tree digging.

use super::emit::{emit_jobs, DigSummary};
use super::request::DigRequest;
use crate::core::error::DispatchError;
use crate::core::types::{validate_limit, PathPattern, PropertyType};
use crate::job::JobQueue;
use crate::repository::{ContentNode, Session};

use std::collections::BTreeSet;
use std::sync::Arc;

/// Walks a subtree and emits one scan job per qualifying property value.
///
/// Nodes are visited pre-order: a node's properties before its children,
/// children in the order the repository reports them.
#[derive(Debug, Clone)]
pub struct TreeDigger {
    jobs: Arc<dyn JobQueue>,
}

impl TreeDigger {
    /// Creates a digger submitting to `jobs`.
    pub fn new(jobs: Arc<dyn JobQueue>) -> Self {
        Self { jobs }
    }

    /// Digs the subtree rooted at `root`.
    ///
    /// `max_length` and `max_depth` accept `-1` for unlimited. Depth is
    /// relative to `root`: with `max_depth = 0` only the root's own
    /// properties are considered.
    ///
    /// Jobs submitted before a failure stay submitted.
    pub fn dig(
        &self,
        root: &dyn ContentNode,
        pattern: &PathPattern,
        property_types: &BTreeSet<PropertyType>,
        max_length: i64,
        max_depth: i32,
    ) -> Result<DigSummary, DispatchError> {
        validate_limit("maxLength", max_length)?;
        validate_limit("maxDepth", i64::from(max_depth))?;
        if property_types.is_empty() {
            return Err(DispatchError::validation(
                "propertyTypes",
                "At least one property type is required",
            ));
        }

        let absolute_max_depth = usize::try_from(max_depth)
            .ok()
            .map(|relative| root.depth() + relative);

        tracing::debug!(
            root = %root.path(),
            pattern = %pattern,
            max_length = max_length,
            max_depth = max_depth,
            "Digging content tree"
        );

        let mut summary = DigSummary::default();
        let mut pending: Vec<Arc<dyn ContentNode>> = Vec::new();
        self.visit(root, pattern, property_types, max_length, absolute_max_depth, &mut summary, &mut pending)?;

        while let Some(node) = pending.pop() {
            self.visit(
                node.as_ref(),
                pattern,
                property_types,
                max_length,
                absolute_max_depth,
                &mut summary,
                &mut pending,
            )?;
        }

        tracing::info!(
            root = %root.path(),
            nodes = summary.nodes_visited,
            jobs = summary.jobs_emitted,
            skipped = summary.values_skipped,
            "Content tree dig finished"
        );
        Ok(summary)
    }

    /// Resolves a parsed request against `session` and digs it.
    pub fn dig_request(&self, session: &dyn Session, request: &DigRequest) -> Result<DigSummary, DispatchError> {
        let root = session.node(&request.path).map_err(|_| {
            DispatchError::validation("path", format!("No node at given path found: {}", request.path))
        })?;
        self.dig(
            root.as_ref(),
            &request.pattern,
            &request.property_types,
            request.max_length,
            request.max_depth,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn visit(
        &self,
        node: &dyn ContentNode,
        pattern: &PathPattern,
        property_types: &BTreeSet<PropertyType>,
        max_length: i64,
        absolute_max_depth: Option<usize>,
        summary: &mut DigSummary,
        pending: &mut Vec<Arc<dyn ContentNode>>,
    ) -> Result<(), DispatchError> {
        summary.nodes_visited += 1;

        for property in node.properties()? {
            if property_types.contains(&property.property_type) && pattern.matches(&property.path) {
                emit_jobs(self.jobs.as_ref(), &property, max_length, None, summary)?;
            }
        }

        if absolute_max_depth.map_or(true, |max| node.depth() < max) {
            // Reversed so that the first child is popped first.
            pending.extend(node.children()?.into_iter().rev());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::RepositoryError;
    use crate::job::MemoryJobQueue;
    use crate::repository::{MemoryRepository, Repository};

    fn tree() -> MemoryRepository {
        let repo = MemoryRepository::new();
        repo.set_binary("/content/a/data", vec![0u8; 10])
            .set_binary("/content/b/data", vec![0u8; 1000])
            .set_string("/content/a/title", "hello")
            .set_binary("/content/a/deep/er/data", vec![0u8; 10]);
        repo
    }

    fn binary() -> BTreeSet<PropertyType> {
        [PropertyType::Binary].into_iter().collect()
    }

    fn paths(queue: &MemoryJobQueue) -> Vec<String> {
        queue
            .pending()
            .into_iter()
            .map(|job| job.attributes["path"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_dig_unbounded() {
        let repo = tree();
        let queue = Arc::new(MemoryJobQueue::new());
        let digger = TreeDigger::new(queue.clone());
        let root = repo.node("/content").unwrap();

        let summary = digger
            .dig(root.as_ref(), &PathPattern::new("^/.*$").unwrap(), &binary(), -1, -1)
            .unwrap();

        assert_eq!(summary.jobs_emitted, 3);
        assert_eq!(
            paths(&queue),
            vec!["/content/a/data", "/content/a/deep/er/data", "/content/b/data"]
        );
    }

    #[test]
    fn test_dig_depth_limit() {
        let repo = tree();
        let queue = Arc::new(MemoryJobQueue::new());
        let digger = TreeDigger::new(queue.clone());
        let root = repo.node("/content").unwrap();

        digger
            .dig(root.as_ref(), &PathPattern::new("/.*").unwrap(), &binary(), -1, 1)
            .unwrap();
        assert_eq!(paths(&queue), vec!["/content/a/data", "/content/b/data"]);

        queue.take_all();
        let summary = digger
            .dig(root.as_ref(), &PathPattern::new("/.*").unwrap(), &binary(), -1, 0)
            .unwrap();
        assert_eq!(summary.nodes_visited, 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dig_length_limit_and_pattern() {
        let repo = tree();
        let queue = Arc::new(MemoryJobQueue::new());
        let digger = TreeDigger::new(queue.clone());
        let root = repo.node("/").unwrap();

        let summary = digger
            .dig(root.as_ref(), &PathPattern::new("/content/[ab]/data").unwrap(), &binary(), 100, -1)
            .unwrap();

        assert_eq!(summary.jobs_emitted, 1);
        assert_eq!(summary.values_skipped, 1);
        assert_eq!(paths(&queue), vec!["/content/a/data"]);
    }

    #[test]
    fn test_dig_multi_valued() {
        let repo = MemoryRepository::new();
        repo.set_strings("/c/tags", ["one", "two", "three"]);
        let queue = Arc::new(MemoryJobQueue::new());
        let digger = TreeDigger::new(queue.clone());
        let types = [PropertyType::String].into_iter().collect();

        digger
            .dig(repo.node("/").unwrap().as_ref(), &PathPattern::new("/.*").unwrap(), &types, 3, -1)
            .unwrap();

        let jobs = queue.take_all();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|job| job.topic == "contentscan/scan/property/String"));
        assert_eq!(jobs[0].attributes["index"], 0);
        assert_eq!(jobs[1].attributes["index"], 1);
    }

    #[test]
    fn test_dig_rejects_bad_limits() {
        let repo = tree();
        let digger = TreeDigger::new(Arc::new(MemoryJobQueue::new()));
        let root = repo.node("/").unwrap();
        let pattern = PathPattern::new("/.*").unwrap();

        let err = digger.dig(root.as_ref(), &pattern, &binary(), -2, -1).unwrap_err();
        assert_eq!(err.parameter(), Some("maxLength"));
        let err = digger.dig(root.as_ref(), &pattern, &binary(), -1, -5).unwrap_err();
        assert_eq!(err.parameter(), Some("maxDepth"));
    }

    #[test]
    fn test_dig_repository_failure() {
        let repo = tree();
        repo.fail_on("/content/b");
        let queue = Arc::new(MemoryJobQueue::new());
        let digger = TreeDigger::new(queue.clone());

        let err = digger
            .dig(repo.node("/content").unwrap().as_ref(), &PathPattern::new("/.*").unwrap(), &binary(), -1, -1)
            .unwrap_err();

        assert!(matches!(err, DispatchError::RepositoryAccess(RepositoryError::AccessFailed { .. })));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_dig_request_missing_node() {
        let repo = tree();
        let digger = TreeDigger::new(Arc::new(MemoryJobQueue::new()));
        let session = repo.service_session().unwrap();
        let request = DigRequest::new("/nowhere", &Default::default()).unwrap();

        let err = digger.dig_request(session.as_ref(), &request).unwrap_err();
        assert_eq!(err.to_string(), "No node at given path found: /nowhere");
    }
}
