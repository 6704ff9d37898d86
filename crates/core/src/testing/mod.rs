//! Testing utilities and mock implementations of the collaborator traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use spindle_core::testing::{MockObjectStore, MockProcessor};
//!
//! let store = MockObjectStore::new();
//! store.add_object("gs://bucket/run1/pod5/a.pod5", 1024).await;
//!
//! let processor = MockProcessor::new();
//! processor.fail_key("run2").await;
//! ```

mod mock_object_store;
mod mock_processor;

pub use mock_object_store::{MockObjectStore, StoreCall};
pub use mock_processor::MockProcessor;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::registry::WorkItem;

    /// A work item whose source is `gs://bucket/<key>/`.
    pub fn work_item(key: &str, parameter: &str) -> WorkItem {
        WorkItem {
            key: key.to_string(),
            source_location: format!("gs://bucket/{}/", key),
            parameter: parameter.to_string(),
        }
    }
}
