//! Per-item stages and the correlation join between them.
//!
//! Stage 1 copies raw data from the object store under an admission permit,
//! the join re-attaches the item's parameter by key, stage 2 runs the
//! processor, and stage 3 hands the result to the finish state machine.

mod config;
mod error;
mod executor;
mod join;
mod types;

pub use config::PipelineConfig;
pub use error::{CoordinationError, StageError};
pub use executor::StageExecutor;
pub use join::{join, ItemIndex};
pub use types::{EnrichedStagingResult, StagingRequest, StagingResult};
