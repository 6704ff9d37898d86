//! Mock processor for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::command::CommandError;
use crate::compute::{
    collect_artifacts, ProcessingJob, ProcessingResult, Processor, ProcessorError,
};

/// Mock implementation of the Processor trait.
///
/// Writes each configured artifact into the job's output directory with
/// the configured size, then collects them the way the real processor does.
#[derive(Debug, Clone)]
pub struct MockProcessor {
    jobs: Arc<RwLock<Vec<ProcessingJob>>>,
    /// Artifact names and sizes, in output order.
    artifacts: Arc<RwLock<Vec<(String, u64)>>>,
    failing_keys: Arc<RwLock<HashSet<String>>>,
    delay_ms: Arc<RwLock<u64>>,
}

impl Default for MockProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProcessor {
    /// Produces `out.bin` (1000 bytes) and `report.json` (40 bytes).
    pub fn new() -> Self {
        Self::with_artifacts([("out.bin", 1000), ("report.json", 40)])
    }

    pub fn with_artifacts<'a>(artifacts: impl IntoIterator<Item = (&'a str, u64)>) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(Vec::new())),
            artifacts: Arc::new(RwLock::new(
                artifacts
                    .into_iter()
                    .map(|(name, size)| (name.to_string(), size))
                    .collect(),
            )),
            failing_keys: Arc::new(RwLock::new(HashSet::new())),
            delay_ms: Arc::new(RwLock::new(0)),
        }
    }

    /// Get all recorded jobs.
    pub async fn recorded_jobs(&self) -> Vec<ProcessingJob> {
        self.jobs.read().await.clone()
    }

    /// Parameter the job for `key` was run with.
    pub async fn parameter_for(&self, key: &str) -> Option<String> {
        self.jobs
            .read()
            .await
            .iter()
            .find(|job| job.key == key)
            .map(|job| job.parameter.clone())
    }

    /// Fail processing for `key`.
    pub async fn fail_key(&self, key: impl Into<String>) {
        self.failing_keys.write().await.insert(key.into());
    }

    /// Simulated processing time.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay_ms.write().await = delay.as_millis() as u64;
    }
}

#[async_trait]
impl Processor for MockProcessor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn process(&self, job: ProcessingJob) -> Result<ProcessingResult, ProcessorError> {
        self.jobs.write().await.push(job.clone());

        let delay = *self.delay_ms.read().await;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.failing_keys.read().await.contains(&job.key) {
            return Err(ProcessorError::Command(CommandError::Failed {
                program: "mock".to_string(),
                code: Some(1),
                stderr: format!("injected failure for {}", job.key),
            }));
        }

        let artifacts = self.artifacts.read().await.clone();
        tokio::fs::create_dir_all(&job.output_dir)
            .await
            .map_err(|e| ProcessorError::OutputDirectory {
                path: job.output_dir.clone(),
                source: e,
            })?;
        for (name, size) in &artifacts {
            tokio::fs::write(job.output_dir.join(name), vec![0u8; *size as usize]).await?;
        }

        let names: Vec<String> = artifacts.into_iter().map(|(name, _)| name).collect();
        Ok(ProcessingResult {
            key: job.key,
            artifacts: collect_artifacts(&job.output_dir, &names).await?,
            source_location: job.source_location,
        })
    }

    async fn validate(&self) -> Result<(), ProcessorError> {
        Ok(())
    }
}
