//! Keyed re-attachment of work item metadata to staging results.

use std::collections::HashMap;

use crate::registry::WorkItem;

use super::error::CoordinationError;
use super::types::{EnrichedStagingResult, StagingResult};

/// Work items indexed by key.
#[derive(Debug, Clone, Default)]
pub struct ItemIndex {
    items: HashMap<String, WorkItem>,
}

impl ItemIndex {
    /// Builds the index. Keys are unique after registry parsing.
    pub fn new(items: &[WorkItem]) -> Self {
        Self {
            items: items
                .iter()
                .map(|item| (item.key.clone(), item.clone()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&WorkItem> {
        self.items.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Attaches the parameter and source location of the matching work item.
pub fn join(
    result: StagingResult,
    index: &ItemIndex,
) -> Result<EnrichedStagingResult, CoordinationError> {
    let item = index.get(&result.key).ok_or_else(|| CoordinationError {
        key: result.key.clone(),
    })?;

    Ok(EnrichedStagingResult {
        parameter: item.parameter.clone(),
        source_location: item.source_location.clone(),
        staging: result,
    })
}
