//! Configuration for the transfer module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::command::CommandTemplate;

/// Configuration for the filesystem-backed store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsStoreConfig {
    /// Directory that remote locations resolve under.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from("/")
}

impl Default for FsStoreConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

/// Configuration for the command-backed store.
///
/// Templates accept `{source}` and `{dest}` (copy) or `{path}` (list, remove).
/// Listing output must have one object per line as
/// `<size> [<ISO-8601 timestamp>] <location>`, the location running to the
/// end of the line; other lines are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandStoreConfig {
    /// Copies one object (either direction).
    pub copy: CommandTemplate,

    /// Recursively lists objects under a location with their sizes.
    pub list: CommandTemplate,

    /// Recursively removes a location.
    pub remove: CommandTemplate,

    /// Timeout for a single command in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Stderr fragments (case-insensitive) that turn a failed listing into an
    /// empty one, for tools that exit non-zero on empty listings. Only `list`
    /// consults these. Keep them specific: a match hides the real error.
    #[serde(default = "default_not_found_patterns")]
    pub not_found_patterns: Vec<String>,
}

fn default_timeout() -> u64 {
    6 * 3600 // large raw files over slow links
}

fn default_not_found_patterns() -> Vec<String> {
    vec![
        "matched no objects".to_string(),
        "no such file".to_string(),
    ]
}
