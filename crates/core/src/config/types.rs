use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::compute::ComputeConfig;
use crate::stage::PipelineConfig;
use crate::transfer::{CommandStoreConfig, FsStoreConfig};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    pub compute: ComputeConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Object transfer configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TransferConfig {
    /// Transfer backend type
    #[serde(default)]
    pub backend: TransferBackend,
    /// Filesystem backend configuration (used when backend = "filesystem")
    #[serde(default)]
    pub filesystem: Option<FsStoreConfig>,
    /// Command backend configuration (required when backend = "command")
    #[serde(default)]
    pub command: Option<CommandStoreConfig>,
}

/// Available transfer backends
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferBackend {
    /// Remote locations are paths under a local root (mounted bucket).
    #[default]
    Filesystem,
    /// Remote locations are handled by an external transfer tool.
    Command,
}

/// Audit database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("spindle.db")
}

/// Metrics export configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// When set, the Prometheus text exposition is written here at run end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}
