//! Pipeline orchestrator.
//!
//! Runs every work item through staging (admission controlled), the
//! correlation join, processing and finish, and aggregates a [`RunReport`].
//! Items are independent: one item failing marks the run degraded but never
//! stops the others.

mod runner;
mod types;

pub use runner::PipelineOrchestrator;
pub use types::{
    ItemPhase, ItemReport, ItemStatus, OrchestratorError, OrchestratorStatus, RunReport,
};
