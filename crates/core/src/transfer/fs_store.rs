//! Filesystem-backed object store.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use super::config::FsStoreConfig;
use super::error::TransferError;
use super::traits::ObjectStore;
use super::types::{join_location, RemoteObject};

/// Object store whose remote locations are paths under a local root.
///
/// A `scheme://` prefix is dropped, so `gs://bucket/run/` resolves to
/// `<root>/bucket/run/`. Locations escaping the root are rejected.
pub struct FsObjectStore {
    config: FsStoreConfig,
}

impl FsObjectStore {
    /// Creates a new store with the given configuration.
    pub fn new(config: FsStoreConfig) -> Self {
        Self { config }
    }

    /// Creates a store rooted at `root`.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        Self::new(FsStoreConfig { root: root.into() })
    }

    /// Maps a remote location to its path on disk.
    pub fn resolve(&self, location: &str) -> Result<PathBuf, TransferError> {
        let without_scheme = location
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(location);
        let relative = Path::new(without_scheme.trim_start_matches('/'));

        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(TransferError::InvalidLocation {
                location: location.to_string(),
            });
        }

        Ok(self.config.root.join(relative))
    }

    async fn ensure_parent(path: &Path) -> Result<(), TransferError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::LocalPath {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Collects every file under `dir`, paired with its location relative to `dir`.
    async fn walk(dir: &Path) -> std::io::Result<Vec<(String, u64)>> {
        let mut files = Vec::new();
        let mut pending = vec![(dir.to_path_buf(), String::new())];

        while let Some((current, rel)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&current).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().to_string();
                let child_rel = if rel.is_empty() {
                    name
                } else {
                    format!("{}/{}", rel, name)
                };
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push((entry.path(), child_rel));
                } else if file_type.is_file() {
                    files.push((child_rel, entry.metadata().await?.len()));
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<(), TransferError> {
        let source = self.resolve(remote)?;
        if !tokio::fs::try_exists(&source).await? {
            return Err(TransferError::NotFound {
                location: remote.to_string(),
            });
        }

        Self::ensure_parent(local).await?;
        tokio::fs::copy(&source, local)
            .await
            .map_err(|e| TransferError::copy_failed(remote, local.display().to_string(), e))?;
        Ok(())
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), TransferError> {
        let destination = self.resolve(remote)?;
        Self::ensure_parent(&destination).await?;
        tokio::fs::copy(local, &destination)
            .await
            .map_err(|e| TransferError::copy_failed(local.display().to_string(), remote, e))?;
        Ok(())
    }

    async fn stat(&self, remote: &str) -> Result<Option<u64>, TransferError> {
        let path = self.resolve(remote)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TransferError::ListFailed {
                location: remote.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, TransferError> {
        let dir = self.resolve(prefix)?;
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(Vec::new()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(TransferError::ListFailed {
                    location: prefix.to_string(),
                    reason: e.to_string(),
                })
            }
        }

        let files = Self::walk(&dir)
            .await
            .map_err(|e| TransferError::ListFailed {
                location: prefix.to_string(),
                reason: e.to_string(),
            })?;

        Ok(files
            .into_iter()
            .map(|(rel, size_bytes)| RemoteObject {
                path: join_location(prefix, &rel),
                size_bytes,
            })
            .collect())
    }

    async fn remove(&self, prefix: &str) -> Result<(), TransferError> {
        let path = self.resolve(prefix)?;
        let result = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(&path).await,
            Ok(_) => tokio::fs::remove_file(&path).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        };
        result.map_err(|e| TransferError::remove_failed(prefix, e))
    }

    async fn validate(&self) -> Result<(), TransferError> {
        let meta = tokio::fs::metadata(&self.config.root)
            .await
            .map_err(|e| TransferError::LocalPath {
                path: self.config.root.clone(),
                source: e,
            })?;
        if !meta.is_dir() {
            return Err(TransferError::InvalidLocation {
                location: self.config.root.display().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, bytes: usize) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, vec![7u8; bytes]).unwrap();
    }

    #[test]
    fn test_resolve_strips_scheme_and_rejects_escape() {
        let store = FsObjectStore::rooted_at("/mnt");
        assert_eq!(
            store.resolve("gs://bucket/run/").unwrap(),
            PathBuf::from("/mnt/bucket/run/")
        );
        assert!(matches!(
            store.resolve("runs/../../etc/passwd"),
            Err(TransferError::InvalidLocation { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_recurses_and_reports_sizes() {
        let remote = TempDir::new().unwrap();
        write(remote.path(), "run1/pod5/a.pod5", 10);
        write(remote.path(), "run1/pod5/nested/b.pod5", 20);
        write(remote.path(), "run1/pod5_fail/c.pod5", 5);

        let store = FsObjectStore::rooted_at(remote.path());
        let objects = store.list("run1/pod5/").await.unwrap();

        assert_eq!(
            objects,
            vec![
                RemoteObject {
                    path: "run1/pod5/a.pod5".to_string(),
                    size_bytes: 10
                },
                RemoteObject {
                    path: "run1/pod5/nested/b.pod5".to_string(),
                    size_bytes: 20
                },
            ]
        );
        assert!(store.list("run1/fast5/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_upload_stat() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        write(remote.path(), "run1/pod5/a.pod5", 42);

        let store = FsObjectStore::rooted_at(remote.path());
        let staged = local.path().join("S1/pod5/a.pod5");
        store.download("run1/pod5/a.pod5", &staged).await.unwrap();
        assert_eq!(std::fs::metadata(&staged).unwrap().len(), 42);

        store.upload(&staged, "run1/out.bin").await.unwrap();
        assert_eq!(store.stat("run1/out.bin").await.unwrap(), Some(42));
        assert_eq!(store.stat("run1/missing.bin").await.unwrap(), None);
        assert_eq!(store.stat("run1/pod5/").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_download_missing_object() {
        let remote = TempDir::new().unwrap();
        let store = FsObjectStore::rooted_at(remote.path());
        let err = store
            .download("run1/nope.pod5", &remote.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let remote = TempDir::new().unwrap();
        write(remote.path(), "run1/pod5/a.pod5", 1);

        let store = FsObjectStore::rooted_at(remote.path());
        store.remove("run1/pod5/").await.unwrap();
        assert!(!remote.path().join("run1/pod5").exists());
        store.remove("run1/pod5/").await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_requires_root_dir() {
        let remote = TempDir::new().unwrap();
        write(remote.path(), "file", 1);

        tokio_test::assert_ok!(FsObjectStore::rooted_at(remote.path()).validate().await);
        tokio_test::assert_err!(
            FsObjectStore::rooted_at(remote.path().join("file"))
                .validate()
                .await
        );
        tokio_test::assert_err!(
            FsObjectStore::rooted_at(remote.path().join("missing"))
                .validate()
                .await
        );
    }
}
