//! Trait definitions for the transfer module.

use async_trait::async_trait;
use std::path::Path;

use super::error::TransferError;
use super::types::RemoteObject;

/// The bulk object-transfer contract the pipeline depends on.
///
/// Implementations own their retry policy; callers treat every error as final.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the name of this store implementation.
    fn name(&self) -> &str;

    /// Copies one remote object to a local file, creating parent directories.
    async fn download(&self, remote: &str, local: &Path) -> Result<(), TransferError>;

    /// Copies one local file to a remote object location.
    async fn upload(&self, local: &Path, remote: &str) -> Result<(), TransferError>;

    /// Size of a remote object, or `None` when it does not exist.
    async fn stat(&self, remote: &str) -> Result<Option<u64>, TransferError>;

    /// Lists objects under a remote prefix recursively. An absent prefix is empty.
    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, TransferError>;

    /// Removes everything under a remote prefix.
    async fn remove(&self, prefix: &str) -> Result<(), TransferError>;

    /// Validates that the store is properly configured and reachable.
    async fn validate(&self) -> Result<(), TransferError>;
}
