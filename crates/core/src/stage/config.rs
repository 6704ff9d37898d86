//! Configuration for the stage executor and orchestrator.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the per-item pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Parameter used for rows that leave the `parameter` column blank.
    pub default_parameter: String,

    /// Local directory under which each item is staged (`<root>/<key>`).
    pub local_staging_root: PathBuf,

    /// Whether source data may be deleted after verified upload.
    #[serde(default)]
    pub delete_enabled: bool,

    /// Whether `*_fail` raw-data subsets are staged alongside passing data.
    #[serde(default = "default_true")]
    pub include_failed_subset: bool,

    /// Maximum concurrent staging transfers.
    #[serde(default = "default_admission_limit")]
    pub admission_limit: usize,

    /// Input descriptor path (used by the runner binary).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_path: Option<PathBuf>,

    /// Raw-data sub-locations under each source location, including legacy names.
    #[serde(default = "default_raw_data_dirs")]
    pub raw_data_dirs: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_admission_limit() -> usize {
    1
}

fn default_raw_data_dirs() -> Vec<String> {
    ["pod5_pass", "pod5_fail", "pod5", "fast5_pass", "fast5_fail", "fast5"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Suffix marking the failed-read subset of a raw-data sub-location.
const FAILED_SUBSET_SUFFIX: &str = "_fail";

impl PipelineConfig {
    /// Creates a config with defaults for everything but the required fields.
    pub fn new(default_parameter: impl Into<String>, local_staging_root: PathBuf) -> Self {
        Self {
            default_parameter: default_parameter.into(),
            local_staging_root,
            delete_enabled: false,
            include_failed_subset: true,
            admission_limit: default_admission_limit(),
            input_path: None,
            raw_data_dirs: default_raw_data_dirs(),
        }
    }

    /// Enables or disables source deletion.
    pub fn with_delete_enabled(mut self, enabled: bool) -> Self {
        self.delete_enabled = enabled;
        self
    }

    /// Sets the admission limit for staging.
    pub fn with_admission_limit(mut self, limit: usize) -> Self {
        self.admission_limit = limit;
        self
    }

    /// Includes or excludes `*_fail` subsets when staging.
    pub fn with_failed_subset(mut self, include: bool) -> Self {
        self.include_failed_subset = include;
        self
    }

    /// Replaces the raw-data sub-location list.
    pub fn with_raw_data_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.raw_data_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Sub-locations fetched during staging.
    pub fn staged_dirs(&self) -> impl Iterator<Item = &str> {
        self.raw_data_dirs
            .iter()
            .map(String::as_str)
            .filter(move |d| self.include_failed_subset || !d.ends_with(FAILED_SUBSET_SUFFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::new("modelA", PathBuf::from("/scratch"));
        assert_eq!(config.admission_limit, 1);
        assert!(!config.delete_enabled);
        assert!(config.include_failed_subset);
        assert_eq!(config.raw_data_dirs.len(), 6);
    }

    #[test]
    fn test_staged_dirs_skip_failed_subset() {
        let config = PipelineConfig::new("modelA", PathBuf::from("/scratch"))
            .with_failed_subset(false);
        let dirs: Vec<&str> = config.staged_dirs().collect();
        assert_eq!(dirs, vec!["pod5_pass", "pod5", "fast5_pass", "fast5"]);
    }

    #[test]
    fn test_deserialize_minimal() {
        let toml = r#"
            default_parameter = "modelA"
            local_staging_root = "/scratch"
        "#;
        let config: PipelineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.default_parameter, "modelA");
        assert!(config.include_failed_subset);
        assert!(config.staged_dirs().any(|d| d == "fast5_fail"));
    }
}
