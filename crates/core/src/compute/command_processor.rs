//! Processor that runs the compute tool as an external process.

use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::command::{run_template, CommandError};

use super::config::ComputeConfig;
use super::error::ProcessorError;
use super::traits::Processor;
use super::types::{Artifact, ProcessingJob, ProcessingResult};

/// Processor backed by the configured external program.
pub struct CommandProcessor {
    config: ComputeConfig,
}

impl CommandProcessor {
    /// Creates a new processor with the given configuration.
    pub fn new(config: ComputeConfig) -> Self {
        Self { config }
    }
}

/// Stats every expected artifact in `output_dir`, preserving `names` order.
pub async fn collect_artifacts(
    output_dir: &Path,
    names: &[String],
) -> Result<Vec<Artifact>, ProcessorError> {
    let mut artifacts = Vec::with_capacity(names.len());
    for name in names {
        let local_path = output_dir.join(name);
        let meta = match tokio::fs::metadata(&local_path).await {
            Ok(meta) if meta.is_file() => meta,
            _ => {
                return Err(ProcessorError::ArtifactMissing {
                    name: name.clone(),
                    path: local_path,
                })
            }
        };
        artifacts.push(Artifact {
            name: name.clone(),
            local_path,
            byte_size: meta.len(),
        });
    }
    Ok(artifacts)
}

#[async_trait]
impl Processor for CommandProcessor {
    fn name(&self) -> &str {
        &self.config.program
    }

    async fn process(&self, job: ProcessingJob) -> Result<ProcessingResult, ProcessorError> {
        if !tokio::fs::try_exists(&job.input_dir).await? {
            return Err(ProcessorError::InputNotFound {
                path: job.input_dir.clone(),
            });
        }

        // Artifacts are collected by name, so nothing may predate this run.
        let output_error = |e| ProcessorError::OutputDirectory {
            path: job.output_dir.clone(),
            source: e,
        };
        match tokio::fs::remove_dir_all(&job.output_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(output_error(e)),
        }
        tokio::fs::create_dir_all(&job.output_dir)
            .await
            .map_err(output_error)?;

        let input = job.input_dir.to_string_lossy().to_string();
        let output = job.output_dir.to_string_lossy().to_string();
        let vars = [
            ("input", input.as_str()),
            ("output", output.as_str()),
            ("parameter", job.parameter.as_str()),
            ("key", job.key.as_str()),
        ];

        info!(
            "Running {} for {} with parameter {}",
            self.config.program, job.key, job.parameter
        );
        let start = Instant::now();
        let result = run_template(
            &self.config.template(),
            &vars,
            self.config.timeout_secs,
            Some(&job.output_dir),
        )
        .await?;
        debug!(
            "{} finished for {} in {:?}: {}",
            self.config.program,
            job.key,
            start.elapsed(),
            result.stderr.lines().last().unwrap_or_default()
        );

        let artifacts = collect_artifacts(&job.output_dir, &self.config.artifacts).await?;

        Ok(ProcessingResult {
            key: job.key,
            artifacts,
            source_location: job.source_location,
        })
    }

    async fn validate(&self) -> Result<(), ProcessorError> {
        if self.config.program.trim().is_empty() {
            return Err(ProcessorError::Command(CommandError::EmptyTemplate));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn job(dir: &TempDir, parameter: &str) -> ProcessingJob {
        let input_dir = dir.path().join("S1");
        std::fs::create_dir_all(&input_dir).unwrap();
        ProcessingJob {
            key: "S1".to_string(),
            input_dir,
            output_dir: dir.path().join("S1/output"),
            parameter: parameter.to_string(),
            source_location: "loc/run1/".to_string(),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_collects_artifacts_in_order() {
        let dir = TempDir::new().unwrap();
        let config = ComputeConfig::new("sh", ["summary.tsv", "reads.bam"]).with_args([
            "-c",
            "printf '{parameter}' > {output}/reads.bam; printf 'abc' > {output}/summary.tsv",
        ]);
        let processor = CommandProcessor::new(config);

        let result = processor.process(job(&dir, "modelA")).await.unwrap();
        let names: Vec<&str> = result.artifact_names().collect();
        assert_eq!(names, vec!["summary.tsv", "reads.bam"]);
        assert_eq!(result.artifacts[1].byte_size, "modelA".len() as u64);
        assert_eq!(result.total_bytes(), 9);
        assert_eq!(result.source_location, "loc/run1/");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_artifact_fails() {
        let dir = TempDir::new().unwrap();
        let config = ComputeConfig::new("true", ["reads.bam"]);
        let err = CommandProcessor::new(config)
            .process(job(&dir, "m"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::ArtifactMissing { ref name, .. } if name == "reads.bam"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stale_output_from_earlier_attempt_is_not_collected() {
        let dir = TempDir::new().unwrap();
        let job = job(&dir, "m");
        std::fs::create_dir_all(&job.output_dir).unwrap();
        std::fs::write(job.output_dir.join("reads.bam"), b"partial from a killed run").unwrap();

        let config = ComputeConfig::new("true", ["reads.bam"]);
        let err = CommandProcessor::new(config).process(job).await.unwrap_err();
        assert!(matches!(err, ProcessorError::ArtifactMissing { ref name, .. } if name == "reads.bam"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_failure_surfaces() {
        let dir = TempDir::new().unwrap();
        let config = ComputeConfig::new("false", ["reads.bam"]);
        let err = CommandProcessor::new(config)
            .process(job(&dir, "m"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::Command(CommandError::Failed { .. })));
    }

    #[tokio::test]
    async fn test_missing_input_dir() {
        let config = ComputeConfig::new("true", ["reads.bam"]);
        let job = ProcessingJob {
            key: "S9".to_string(),
            input_dir: PathBuf::from("/nonexistent/spindle/S9"),
            output_dir: PathBuf::from("/nonexistent/spindle/S9/output"),
            parameter: "m".to_string(),
            source_location: "loc/".to_string(),
        };
        let err = CommandProcessor::new(config).process(job).await.unwrap_err();
        assert!(matches!(err, ProcessorError::InputNotFound { .. }));
    }
}
