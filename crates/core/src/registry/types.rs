//! Types for the registry module.

use serde::{Deserialize, Serialize};

/// One unvalidated row of the input descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub key: Option<String>,
    pub source_location: Option<String>,
    pub parameter: Option<String>,
}

impl RawRow {
    /// Creates a row from its three cells; empty strings count as absent.
    pub fn new(key: &str, source_location: &str, parameter: &str) -> Self {
        fn cell(value: &str) -> Option<String> {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }

        Self {
            key: cell(key),
            source_location: cell(source_location),
            parameter: cell(parameter),
        }
    }
}

/// A validated unit of work tracked end-to-end by its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique key across the run.
    pub key: String,
    /// Remote source location, always ending in `/`.
    pub source_location: String,
    /// Processing parameter, already resolved against the configured default.
    pub parameter: String,
}
