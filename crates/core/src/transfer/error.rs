//! Error types for the transfer module.

use std::path::PathBuf;
use thiserror::Error;

use crate::command::CommandError;

/// Errors that can occur while talking to object storage.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Remote object or prefix does not exist.
    #[error("Remote location not found: {location}")]
    NotFound { location: String },

    /// Location cannot be mapped by this store.
    #[error("Invalid location: {location}")]
    InvalidLocation { location: String },

    /// Failed to copy between local and remote.
    #[error("Failed to copy {source_location} to {destination}: {reason}")]
    CopyFailed {
        source_location: String,
        destination: String,
        reason: String,
    },

    /// Failed to list or stat a remote location.
    #[error("Failed to list {location}: {reason}")]
    ListFailed { location: String, reason: String },

    /// Failed to remove a remote location.
    #[error("Failed to remove {location}: {reason}")]
    RemoveFailed { location: String, reason: String },

    /// Failed to prepare local staging space.
    #[error("Failed to prepare local path {path}")]
    LocalPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// External transfer tool failed.
    #[error("Transfer command failed: {0}")]
    Command(#[from] CommandError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// Creates a copy failed error.
    pub fn copy_failed(
        source_location: impl Into<String>,
        destination: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::CopyFailed {
            source_location: source_location.into(),
            destination: destination.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a remove failed error.
    pub fn remove_failed(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::RemoveFailed {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io(_) | Self::CopyFailed { .. } => true,
            Self::Command(e) => e.is_retryable(),
            _ => false,
        }
    }
}
