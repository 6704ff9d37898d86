//! Types passed between stages.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::registry::WorkItem;

/// Input to stage 1. Carries no parameter: that is re-attached by the join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingRequest {
    pub key: String,
    pub source_location: String,
}

impl From<&WorkItem> for StagingRequest {
    fn from(item: &WorkItem) -> Self {
        Self {
            key: item.key.clone(),
            source_location: item.source_location.clone(),
        }
    }
}

/// Output of stage 1 for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingResult {
    pub key: String,
    /// Local directory holding the staged sub-locations.
    pub local_path: PathBuf,
    /// Number of files staged.
    pub item_count: usize,
    /// True only if at least one file was staged and every local size matches the remote.
    pub integrity_ok: bool,
}

/// A staging result joined back to its work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedStagingResult {
    pub staging: StagingResult,
    pub parameter: String,
    pub source_location: String,
}

impl EnrichedStagingResult {
    pub fn key(&self) -> &str {
        &self.staging.key
    }
}
