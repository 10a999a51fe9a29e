//! Persisting results as records in a store.

use super::attributes::ResultAttributes;
use super::handler::ResultHandler;
use crate::core::{should_act, HandlerError, JobAttributes, PropertyType, ScanResult};
use crate::repository::child_path;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Property naming the kind of a record.
pub const RESOURCE_TYPE_PROPERTY: &str = "resourceType";

/// Kind of every result record.
pub const RESULT_RESOURCE_TYPE: &str = "contentscan/property/result";

/// Default root of result records.
pub const DEFAULT_RESULT_ROOT: &str = "/var/contentscan/results";

const PATH_DATE_FORMAT: &str = "%Y/%m/%d/%H/%M/%S";

/// Storage for result records, addressed by slash separated paths.
#[async_trait]
pub trait ResultStore: Send + Sync + Debug {
    /// Creates the record `name` below `parent`, creating missing parents.
    ///
    /// Returns the path of the new record.
    async fn create(&self, parent: &str, name: &str, properties: JobAttributes) -> Result<String, HandlerError>;

    /// Reads a record.
    async fn get(&self, path: &str) -> Result<Option<JobAttributes>, HandlerError>;
}

fn persist_error(path: &str, reason: impl Into<String>) -> HandlerError {
    HandlerError::Persist {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Checks that `path` is absolute and free of relative segments.
fn check_record_path(path: &str) -> Result<(), HandlerError> {
    if !path.starts_with('/') {
        return Err(persist_error(path, "path is not absolute"));
    }
    if path
        .split('/')
        .skip(1)
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(persist_error(path, "path has an empty or relative segment"));
    }
    Ok(())
}

/// A result store keeping one JSON file per record.
///
/// # Directory Structure
///
/// ```text
/// base/
/// └── var/contentscan/results/2024/05/01/12/30/59/
///     └── Binary-{uuid}.json
/// ```
#[derive(Debug)]
pub struct FilesystemResultStore {
    base_path: PathBuf,
}

impl FilesystemResultStore {
    /// Creates a store below `base_path`, creating the directory if needed.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, HandlerError> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path).map_err(|e| {
            persist_error(&base_path.display().to_string(), format!("Failed to create base directory: {}", e))
        })?;
        Ok(Self { base_path })
    }

    /// Returns the base directory.
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    fn file_path(&self, record: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", record.trim_start_matches('/')))
    }
}

#[async_trait]
impl ResultStore for FilesystemResultStore {
    async fn create(&self, parent: &str, name: &str, properties: JobAttributes) -> Result<String, HandlerError> {
        let record = child_path(parent, name);
        check_record_path(&record)?;

        let file = self.file_path(&record);
        if let Some(dir) = file.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| persist_error(&record, format!("Failed to create parent: {}", e)))?;
        }

        let content = serde_json::to_vec_pretty(&Value::Object(properties))?;
        let mut handle = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&file)
            .await
            .map_err(|e| persist_error(&record, format!("Failed to create record: {}", e)))?;
        handle
            .write_all(&content)
            .await
            .map_err(|e| persist_error(&record, format!("Failed to write record: {}", e)))?;
        handle
            .flush()
            .await
            .map_err(|e| persist_error(&record, format!("Failed to write record: {}", e)))?;

        Ok(record)
    }

    async fn get(&self, path: &str) -> Result<Option<JobAttributes>, HandlerError> {
        check_record_path(path)?;
        let content = match tokio::fs::read(self.file_path(path)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(persist_error(path, format!("Failed to read record: {}", e))),
        };
        Ok(Some(serde_json::from_slice(&content)?))
    }
}

/// A result store keeping records in memory.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    records: RwLock<BTreeMap<String, JobAttributes>>,
    failing: AtomicBool,
}

impl MemoryResultStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every create fail, or stops doing so.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns every record, ordered by path.
    pub fn records(&self) -> Vec<(String, JobAttributes)> {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(path, properties)| (path.clone(), properties.clone()))
            .collect()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    /// Returns `true` if there are no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn create(&self, parent: &str, name: &str, properties: JobAttributes) -> Result<String, HandlerError> {
        let record = child_path(parent, name);
        check_record_path(&record)?;
        if self.failing.load(Ordering::SeqCst) {
            return Err(persist_error(&record, "store is read-only"));
        }

        let mut records = self.records.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if records.contains_key(&record) {
            return Err(persist_error(&record, "record exists"));
        }
        records.insert(record.clone(), properties);
        Ok(record)
    }

    async fn get(&self, path: &str) -> Result<Option<JobAttributes>, HandlerError> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(path)
            .cloned())
    }
}

/// Configuration for the [`ResourcePersister`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersisterConfig {
    /// Root below which dated records are created.
    pub result_root: String,
    /// Persist OK results too.
    pub send_even_when_ok: bool,
}

impl Default for PersisterConfig {
    fn default() -> Self {
        Self {
            result_root: DEFAULT_RESULT_ROOT.to_string(),
            send_even_when_ok: false,
        }
    }
}

impl PersisterConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the result root.
    pub fn with_result_root(mut self, root: impl Into<String>) -> Self {
        self.result_root = root.into();
        self
    }

    /// Sets whether OK results are persisted.
    pub fn with_send_even_when_ok(mut self, send: bool) -> Self {
        self.send_even_when_ok = send;
        self
    }
}

/// Creates one record per result at
/// `{result_root}/{yyyy}/{MM}/{dd}/{HH}/{mm}/{ss}/{TypeName}-{uuid}`.
///
/// The date is the UTC time of persisting. A store failure is returned to
/// the dispatcher.
#[derive(Debug)]
pub struct ResourcePersister {
    store: Arc<dyn ResultStore>,
    config: PersisterConfig,
}

impl ResourcePersister {
    /// Creates a persister writing to `store`.
    pub fn new(store: Arc<dyn ResultStore>, config: PersisterConfig) -> Self {
        Self { store, config }
    }

    async fn persist(
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

        let mut properties = ResultAttributes::new(result, path, index, property_type, user_id).to_properties();
        properties.insert(RESOURCE_TYPE_PROPERTY.into(), Value::from(RESULT_RESOURCE_TYPE));

        let parent = format!(
            "{}/{}",
            self.config.result_root.trim_end_matches('/'),
            Utc::now().format(PATH_DATE_FORMAT)
        );
        let name = format!("{}-{}", property_type.name(), Uuid::new_v4());
        let record = self.store.create(&parent, &name, properties).await?;

        tracing::debug!(path = %path, index = ?index, record = %record, "Scan result persisted");
        Ok(())
    }
}

#[async_trait]
impl ResultHandler for ResourcePersister {
    fn name(&self) -> &str {
        "resource-persister"
    }

    async fn handle_single_value(
        &self,
        result: &ScanResult,
        path: &str,
        property_type: PropertyType,
        user_id: Option<&str>,
    ) -> Result<(), HandlerError> {
        self.persist(result, path, None, property_type, user_id).await
    }

    async fn handle_multi_value(
        &self,
        result: &ScanResult,
        path: &str,
        index: usize,
        property_type: PropertyType,
        user_id: Option<&str>,
    ) -> Result<(), HandlerError> {
        self.persist(result, path, Some(index), property_type, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use tempfile::TempDir;

    fn infected() -> ScanResult {
        ScanResult::infected("Eicar-Test-Signature FOUND", Utc::now(), 68)
    }

    #[tokio::test]
    async fn test_record_path_layout() {
        let store = Arc::new(MemoryResultStore::new());
        let persister = ResourcePersister::new(store.clone(), PersisterConfig::new().with_result_root("/results/"));

        persister
            .handle_multi_value(&infected(), "/c/tags", 2, PropertyType::String, Some("lee"))
            .await
            .unwrap();

        let records = store.records();
        assert_eq!(records.len(), 1);
        let (record, properties) = &records[0];
        let layout = Regex::new(r"^/results/\d{4}/\d{2}/\d{2}/\d{2}/\d{2}/\d{2}/String-[0-9a-f-]{36}$").unwrap();
        assert!(layout.is_match(record), "unexpected record path {}", record);
        assert_eq!(properties["resourceType"], "contentscan/property/result");
        assert_eq!(properties["index"], 2);
        assert_eq!(properties["userId"], "lee");
        assert_eq!(properties["status"], "INFECTED");
    }

    #[tokio::test]
    async fn test_ok_gate() {
        let store = Arc::new(MemoryResultStore::new());
        let ok = ScanResult::ok(Utc::now(), 1);

        ResourcePersister::new(store.clone(), PersisterConfig::new())
            .handle_single_value(&ok, "/c/data", PropertyType::Binary, None)
            .await
            .unwrap();
        assert!(store.is_empty());

        ResourcePersister::new(store.clone(), PersisterConfig::new().with_send_even_when_ok(true))
            .handle_single_value(&ok, "/c/data", PropertyType::Binary, None)
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_returned() {
        let store = Arc::new(MemoryResultStore::new());
        store.set_failing(true);
        let persister = ResourcePersister::new(store, PersisterConfig::new());

        let err = persister
            .handle_single_value(&infected(), "/c/data", PropertyType::Binary, None)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Persist { .. }));
    }

    #[tokio::test]
    async fn test_filesystem_store_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemResultStore::new(temp_dir.path()).unwrap();

        let mut properties = JobAttributes::new();
        properties.insert("status".into(), Value::from("INFECTED"));
        let record = store.create("/r/2024/01/02", "Binary-1", properties.clone()).await.unwrap();

        assert_eq!(record, "/r/2024/01/02/Binary-1");
        assert!(temp_dir.path().join("r/2024/01/02/Binary-1.json").exists());
        assert_eq!(store.get(&record).await.unwrap(), Some(properties.clone()));
        assert_eq!(store.get("/r/none").await.unwrap(), None);

        let err = store.create("/r/2024/01/02", "Binary-1", properties).await.unwrap_err();
        assert!(matches!(err, HandlerError::Persist { .. }));
    }

    #[tokio::test]
    async fn test_filesystem_store_rejects_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemResultStore::new(temp_dir.path()).unwrap();

        assert!(store.create("/r/../..", "x", JobAttributes::new()).await.is_err());
        assert!(store.create("r", "x", JobAttributes::new()).await.is_err());
    }
}
