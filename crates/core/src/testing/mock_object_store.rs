//! Mock object store for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::transfer::{ObjectStore, RemoteObject, TransferError};

/// A recorded store call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Download { remote: String, local: String },
    Upload { local: String, remote: String },
    Stat { remote: String },
    List { prefix: String },
    Remove { prefix: String },
}

/// In-memory implementation of the ObjectStore trait.
///
/// Objects are location → size. Downloads write zero-filled files of the
/// stored size, uploads record the local file's size. Failures and
/// corrupted sizes can be injected per location.
///
/// # Example
///
/// ```rust,ignore
/// use spindle_core::testing::MockObjectStore;
///
/// let store = MockObjectStore::new();
/// store.add_object("gs://bucket/run1/pod5/a.pod5", 1024).await;
/// store.set_reported_size("gs://bucket/run1/out.bin", 900).await;
/// ```
#[derive(Debug, Clone)]
pub struct MockObjectStore {
    objects: Arc<RwLock<BTreeMap<String, u64>>>,
    /// Size reported by `stat`/`list` instead of the real one.
    reported_sizes: Arc<RwLock<HashMap<String, u64>>>,
    /// Bytes actually written on download, to simulate truncated transfers.
    short_downloads: Arc<RwLock<HashMap<String, u64>>>,
    failing_downloads: Arc<RwLock<HashSet<String>>>,
    failing_uploads: Arc<RwLock<HashSet<String>>>,
    failing_removes: Arc<RwLock<HashSet<String>>>,
    /// Prefixes whose removal reports success but deletes nothing.
    ineffective_removes: Arc<RwLock<HashSet<String>>>,
    calls: Arc<RwLock<Vec<StoreCall>>>,
    download_delay_ms: Arc<RwLock<u64>>,
    active_downloads: Arc<AtomicUsize>,
    max_active_downloads: Arc<AtomicUsize>,
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(BTreeMap::new())),
            reported_sizes: Arc::new(RwLock::new(HashMap::new())),
            short_downloads: Arc::new(RwLock::new(HashMap::new())),
            failing_downloads: Arc::new(RwLock::new(HashSet::new())),
            failing_uploads: Arc::new(RwLock::new(HashSet::new())),
            failing_removes: Arc::new(RwLock::new(HashSet::new())),
            ineffective_removes: Arc::new(RwLock::new(HashSet::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            download_delay_ms: Arc::new(RwLock::new(0)),
            active_downloads: Arc::new(AtomicUsize::new(0)),
            max_active_downloads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add a remote object.
    pub async fn add_object(&self, location: impl Into<String>, size: u64) {
        self.objects.write().await.insert(location.into(), size);
    }

    /// Whether an object exists at `location`.
    pub async fn contains(&self, location: &str) -> bool {
        self.objects.read().await.contains_key(location)
    }

    /// Size stored for `location`.
    pub async fn size_of(&self, location: &str) -> Option<u64> {
        self.objects.read().await.get(location).copied()
    }

    /// Make `stat`/`list` report `size` for `location`.
    pub async fn set_reported_size(&self, location: impl Into<String>, size: u64) {
        self.reported_sizes.write().await.insert(location.into(), size);
    }

    /// Make downloads of `location` write only `bytes` bytes.
    pub async fn truncate_download(&self, location: impl Into<String>, bytes: u64) {
        self.short_downloads.write().await.insert(location.into(), bytes);
    }

    /// Fail downloads of the exact `location`.
    pub async fn fail_download(&self, location: impl Into<String>) {
        self.failing_downloads.write().await.insert(location.into());
    }

    /// Fail uploads to the exact `location`.
    pub async fn fail_upload(&self, location: impl Into<String>) {
        self.failing_uploads.write().await.insert(location.into());
    }

    /// Fail removal of the exact `prefix`.
    pub async fn fail_remove(&self, prefix: impl Into<String>) {
        self.failing_removes.write().await.insert(prefix.into());
    }

    /// Make removal of `prefix` succeed without deleting anything.
    pub async fn ignore_remove(&self, prefix: impl Into<String>) {
        self.ineffective_removes.write().await.insert(prefix.into());
    }

    /// Simulated time per download.
    pub async fn set_download_delay(&self, delay: Duration) {
        *self.download_delay_ms.write().await = delay.as_millis() as u64;
    }

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<StoreCall> {
        self.calls.read().await.clone()
    }

    pub async fn remove_calls(&self) -> usize {
        self.count_calls(|c| matches!(c, StoreCall::Remove { .. }))
            .await
    }

    pub async fn stat_calls(&self) -> usize {
        self.count_calls(|c| matches!(c, StoreCall::Stat { .. })).await
    }

    /// Highest number of downloads that were in flight at once.
    pub fn max_concurrent_downloads(&self) -> usize {
        self.max_active_downloads.load(Ordering::SeqCst)
    }

    async fn count_calls(&self, pred: impl Fn(&StoreCall) -> bool) -> usize {
        self.calls.read().await.iter().filter(|c| pred(c)).count()
    }

    async fn record(&self, call: StoreCall) {
        self.calls.write().await.push(call);
    }

    async fn reported_size(&self, location: &str, actual: u64) -> u64 {
        self.reported_sizes
            .read()
            .await
            .get(location)
            .copied()
            .unwrap_or(actual)
    }

    fn dir_prefix(prefix: &str) -> String {
        format!("{}/", prefix.trim_end_matches('/'))
    }
}

/// Decrements the in-flight download counter even if the download future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<(), TransferError> {
        self.record(StoreCall::Download {
            remote: remote.to_string(),
            local: local.display().to_string(),
        })
        .await;

        let active = self.active_downloads.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.active_downloads);
        self.max_active_downloads.fetch_max(active, Ordering::SeqCst);

        let delay = *self.download_delay_ms.read().await;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.failing_downloads.read().await.contains(remote) {
            return Err(TransferError::copy_failed(
                remote,
                local.display().to_string(),
                "injected failure",
            ));
        }

        let size = self
            .size_of(remote)
            .await
            .ok_or_else(|| TransferError::NotFound {
                location: remote.to_string(),
            })?;
        let written = self
            .short_downloads
            .read()
            .await
            .get(remote)
            .copied()
            .unwrap_or(size);

        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local, vec![0u8; written as usize]).await?;
        Ok(())
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), TransferError> {
        self.record(StoreCall::Upload {
            local: local.display().to_string(),
            remote: remote.to_string(),
        })
        .await;

        if self.failing_uploads.read().await.contains(remote) {
            return Err(TransferError::copy_failed(
                local.display().to_string(),
                remote,
                "injected failure",
            ));
        }

        let size = tokio::fs::metadata(local).await?.len();
        self.add_object(remote, size).await;
        Ok(())
    }

    async fn stat(&self, remote: &str) -> Result<Option<u64>, TransferError> {
        self.record(StoreCall::Stat {
            remote: remote.to_string(),
        })
        .await;

        match self.size_of(remote).await {
            Some(size) => Ok(Some(self.reported_size(remote, size).await)),
            None => Ok(None),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, TransferError> {
        self.record(StoreCall::List {
            prefix: prefix.to_string(),
        })
        .await;

        let dir = Self::dir_prefix(prefix);
        let matching: Vec<(String, u64)> = self
            .objects
            .read()
            .await
            .iter()
            .filter(|(path, _)| path.starts_with(&dir))
            .map(|(path, size)| (path.clone(), *size))
            .collect();

        let mut objects = Vec::with_capacity(matching.len());
        for (path, size) in matching {
            let size_bytes = self.reported_size(&path, size).await;
            objects.push(RemoteObject { path, size_bytes });
        }
        Ok(objects)
    }

    async fn remove(&self, prefix: &str) -> Result<(), TransferError> {
        self.record(StoreCall::Remove {
            prefix: prefix.to_string(),
        })
        .await;

        if self.failing_removes.read().await.contains(prefix) {
            return Err(TransferError::remove_failed(prefix, "injected failure"));
        }
        if self.ineffective_removes.read().await.contains(prefix) {
            return Ok(());
        }

        let dir = Self::dir_prefix(prefix);
        self.objects
            .write()
            .await
            .retain(|path, _| !path.starts_with(&dir) && path != prefix);
        Ok(())
    }

    async fn validate(&self) -> Result<(), TransferError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_is_scoped_to_directory() {
        let store = MockObjectStore::new();
        store.add_object("loc/run1/pod5/a", 1).await;
        store.add_object("loc/run1/pod5_fail/b", 2).await;

        let listed = store.list("loc/run1/pod5/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "loc/run1/pod5/a");
    }

    #[tokio::test]
    async fn test_download_writes_stored_size() {
        let dir = TempDir::new().unwrap();
        let store = MockObjectStore::new();
        store.add_object("loc/x.pod5", 64).await;

        let local = dir.path().join("nested/x.pod5");
        store.download("loc/x.pod5", &local).await.unwrap();
        assert_eq!(std::fs::metadata(&local).unwrap().len(), 64);
        assert_eq!(store.max_concurrent_downloads(), 1);
    }

    #[tokio::test]
    async fn test_reported_size_override() {
        let store = MockObjectStore::new();
        store.add_object("loc/out.bin", 1000).await;
        store.set_reported_size("loc/out.bin", 900).await;

        assert_eq!(store.stat("loc/out.bin").await.unwrap(), Some(900));
        assert_eq!(store.size_of("loc/out.bin").await, Some(1000));
    }

    #[tokio::test]
    async fn test_injected_remove_failure_keeps_objects() {
        let store = MockObjectStore::new();
        store.add_object("loc/pod5/a", 1).await;
        store.fail_remove("loc/pod5/").await;

        assert!(store.remove("loc/pod5/").await.is_err());
        assert!(store.contains("loc/pod5/a").await);
        assert_eq!(store.remove_calls().await, 1);
    }
}
