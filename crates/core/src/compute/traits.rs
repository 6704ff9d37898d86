//! Trait definitions for the compute module.

use async_trait::async_trait;

use super::error::ProcessorError;
use super::types::{ProcessingJob, ProcessingResult};

/// Runs the compute-heavy transformation for one staged item.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Returns the name of this processor implementation.
    fn name(&self) -> &str;

    /// Runs the transformation and returns the produced artifacts in order.
    async fn process(&self, job: ProcessingJob) -> Result<ProcessingResult, ProcessorError>;

    /// Validates that the processor is properly configured and ready.
    async fn validate(&self) -> Result<(), ProcessorError>;
}
