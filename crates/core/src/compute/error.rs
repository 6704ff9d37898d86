//! Error types for the compute module.

use std::path::PathBuf;
use thiserror::Error;

use crate::command::CommandError;

/// Errors that can occur while running the compute tool.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The tool failed, timed out or could not be started.
    #[error("Compute tool failed: {0}")]
    Command(#[from] CommandError),

    /// An expected artifact was not produced.
    #[error("Expected artifact `{name}` not found at {path}")]
    ArtifactMissing { name: String, path: PathBuf },

    /// Output directory could not be prepared.
    #[error("Failed to prepare output directory: {path}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input directory is missing.
    #[error("Input directory not found: {path}")]
    InputNotFound { path: PathBuf },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessorError {
    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Command(e) => e.is_retryable(),
            Self::Io(_) => true,
            _ => false,
        }
    }
}
