//! Types for the compute module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A request to run the compute tool for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingJob {
    /// Work item key.
    pub key: String,
    /// Staged raw data.
    pub input_dir: PathBuf,
    /// Where artifacts are written.
    pub output_dir: PathBuf,
    /// Processing parameter after the correlation join.
    pub parameter: String,
    /// Remote location the item came from.
    pub source_location: String,
}

/// One named output of the compute tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact name, also its remote file name.
    pub name: String,
    /// Local file path.
    pub local_path: PathBuf,
    /// Size on disk in bytes.
    pub byte_size: u64,
}

/// Output of stage 2 for one item. Artifacts keep the configured order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub key: String,
    pub artifacts: Vec<Artifact>,
    pub source_location: String,
}

impl ProcessingResult {
    /// Total bytes across all artifacts.
    pub fn total_bytes(&self) -> u64 {
        self.artifacts.iter().map(|a| a.byte_size).sum()
    }

    /// Artifact names in order.
    pub fn artifact_names(&self) -> impl Iterator<Item = &str> {
        self.artifacts.iter().map(|a| a.name.as_str())
    }
}
