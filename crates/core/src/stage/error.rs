//! Error types for the stage executor.

use std::path::PathBuf;
use thiserror::Error;

use crate::admission::AdmissionError;
use crate::compute::ProcessorError;
use crate::transfer::TransferError;

/// A staging result whose key has no registered work item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no work item registered for key '{key}'")]
pub struct CoordinationError {
    pub key: String,
}

/// Errors that end an item before the finish stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("transfer failed for '{key}': {source}")]
    Transfer {
        key: String,
        #[source]
        source: TransferError,
    },

    #[error("integrity check failed for '{key}': {reason}")]
    Integrity { key: String, reason: String },

    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    #[error("processing failed for '{key}': {source}")]
    Processing {
        key: String,
        #[source]
        source: ProcessorError,
    },

    #[error("admission failed: {0}")]
    Admission(#[from] AdmissionError),

    #[error("failed to prepare {path}: {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StageError {
    pub fn transfer(key: impl Into<String>, source: TransferError) -> Self {
        Self::Transfer {
            key: key.into(),
            source,
        }
    }

    pub fn integrity(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Integrity {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn processing(key: impl Into<String>, source: ProcessorError) -> Self {
        Self::Processing {
            key: key.into(),
            source,
        }
    }

    /// Whether rerunning the item may succeed. The kernel never retries on
    /// its own; this is recorded in the audit trail for the operator.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transfer { source, .. } => source.is_retryable(),
            Self::Processing { source, .. } => source.is_retryable(),
            Self::LocalIo { .. } => true,
            Self::Integrity { .. } | Self::Coordination(_) | Self::Admission(_) => false,
        }
    }

    /// Short label for logs, audit and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transfer { .. } => "transfer",
            Self::Integrity { .. } => "integrity",
            Self::Coordination(_) => "coordination",
            Self::Processing { .. } => "processing",
            Self::Admission(_) => "admission",
            Self::LocalIo { .. } => "local_io",
        }
    }
}
