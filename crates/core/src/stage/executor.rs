//! Stage executor: staging (admission controlled), processing, finish.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::admission::AdmissionController;
use crate::audit::{emit_opt, AuditEvent, AuditHandle};
use crate::compute::{ProcessingJob, ProcessingResult, Processor};
use crate::finish::{FinishRecord, FinishStateMachine};
use crate::metrics;
use crate::transfer::{join_location, relative_to, ObjectStore};

use super::config::PipelineConfig;
use super::error::StageError;
use super::types::{EnrichedStagingResult, StagingRequest, StagingResult};

/// Directory under an item's staging directory that receives compute output.
const OUTPUT_DIR: &str = "output";

/// Runs the three per-item stages against an object store and a processor.
///
/// Shared across item tasks behind an `Arc`. The admission controller is the
/// only state shared between items.
pub struct StageExecutor<S: ObjectStore, P: Processor> {
    config: PipelineConfig,
    store: Arc<S>,
    processor: Arc<P>,
    admission: AdmissionController,
    finisher: FinishStateMachine<S>,
    audit: Option<AuditHandle>,
}

impl<S: ObjectStore + 'static, P: Processor + 'static> StageExecutor<S, P> {
    pub fn new(config: PipelineConfig, store: S, processor: P) -> Self {
        let store = Arc::new(store);
        let admission = AdmissionController::new(config.admission_limit);
        let finisher = FinishStateMachine::new(Arc::clone(&store), config.raw_data_dirs.clone());

        Self {
            config,
            store,
            processor: Arc::new(processor),
            admission,
            finisher,
            audit: None,
        }
    }

    /// Sets the audit handle for logging events.
    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.finisher = self.finisher.with_audit(audit.clone());
        self.audit = Some(audit);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn processor(&self) -> &Arc<P> {
        &self.processor
    }

    /// Local staging directory for `key`.
    pub fn item_dir(&self, key: &str) -> PathBuf {
        self.config.local_staging_root.join(key)
    }

    /// Stage 1: copy raw data to local storage while holding an admission permit.
    ///
    /// Returns a result with `integrity_ok = false` rather than an error when
    /// the copy completed but does not check out.
    pub async fn stage(&self, request: StagingRequest) -> Result<StagingResult, StageError> {
        let _permit = self.admission.acquire().await?;
        let start = Instant::now();

        info!(key = %request.key, "Staging from {}", request.source_location);
        emit_opt(
            &self.audit,
            AuditEvent::StagingStarted {
                item_key: request.key.clone(),
                source_location: request.source_location.clone(),
            },
        )
        .await;

        let result = self.copy_to_local(&request).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(staged) => {
                metrics::STAGE_DURATION
                    .with_label_values(&["staging", if staged.integrity_ok { "ok" } else { "error" }])
                    .observe(elapsed.as_secs_f64());
                info!(
                    key = %staged.key,
                    files = staged.item_count,
                    integrity_ok = staged.integrity_ok,
                    "Staging finished in {:.1}s",
                    elapsed.as_secs_f64()
                );
                emit_opt(
                    &self.audit,
                    AuditEvent::StagingCompleted {
                        item_key: staged.key.clone(),
                        item_count: staged.item_count,
                        integrity_ok: staged.integrity_ok,
                        duration_secs: elapsed.as_secs(),
                    },
                )
                .await;
            }
            Err(e) => {
                metrics::STAGE_DURATION
                    .with_label_values(&["staging", "error"])
                    .observe(elapsed.as_secs_f64());
                error!(key = %request.key, "Staging failed: {}", e);
                emit_opt(
                    &self.audit,
                    AuditEvent::StagingFailed {
                        item_key: request.key.clone(),
                        error: e.to_string(),
                        retryable: e.is_retryable(),
                    },
                )
                .await;
            }
        }

        result
    }

    async fn copy_to_local(&self, request: &StagingRequest) -> Result<StagingResult, StageError> {
        // A rerun starts from an empty directory: leftovers from an earlier
        // attempt must not be counted as staged or picked up as artifacts.
        let item_dir = self.item_dir(&request.key);
        reset_dir(&item_dir).await?;

        let mut item_count = 0;
        let mut mismatches = Vec::new();

        for dir in self.config.staged_dirs() {
            let prefix = format!("{}/", join_location(&request.source_location, dir));
            let objects = self
                .store
                .list(&prefix)
                .await
                .map_err(|e| StageError::transfer(&request.key, e))?;

            if objects.is_empty() {
                continue;
            }
            debug!(key = %request.key, "Found {} objects under {}", objects.len(), prefix);

            for object in objects {
                let rel = relative_to(&prefix, &object.path)
                    .filter(|rel| is_plain_relative(Path::new(rel)))
                    .ok_or_else(|| {
                        StageError::integrity(
                            &request.key,
                            format!("unexpected object path {}", object.path),
                        )
                    })?;
                let local = item_dir.join(dir).join(rel);

                self.store
                    .download(&object.path, &local)
                    .await
                    .map_err(|e| StageError::transfer(&request.key, e))?;

                let local_size = tokio::fs::metadata(&local)
                    .await
                    .map_err(|e| StageError::LocalIo {
                        path: local.clone(),
                        source: e,
                    })?
                    .len();
                if local_size != object.size_bytes {
                    mismatches.push(format!(
                        "{}: local {} bytes, remote {} bytes",
                        object.path, local_size, object.size_bytes
                    ));
                }

                item_count += 1;
                metrics::FILES_STAGED.inc();
            }
        }

        if item_count == 0 {
            warn!(key = %request.key, "No raw data found under {}", request.source_location);
        }
        for mismatch in &mismatches {
            warn!(key = %request.key, "Size mismatch after staging {}", mismatch);
        }

        Ok(StagingResult {
            key: request.key.clone(),
            local_path: item_dir,
            item_count,
            integrity_ok: item_count > 0 && mismatches.is_empty(),
        })
    }

    /// Stage 2: run the processor over staged data with the joined parameter.
    pub async fn process(
        &self,
        enriched: EnrichedStagingResult,
    ) -> Result<ProcessingResult, StageError> {
        let key = enriched.key().to_string();
        if !enriched.staging.integrity_ok {
            return Err(StageError::integrity(
                &key,
                format!(
                    "staging integrity check failed ({} files staged)",
                    enriched.staging.item_count
                ),
            ));
        }

        let output_dir = enriched.staging.local_path.join(OUTPUT_DIR);
        reset_dir(&output_dir).await?;

        let job = ProcessingJob {
            output_dir,
            input_dir: enriched.staging.local_path,
            parameter: enriched.parameter,
            source_location: enriched.source_location,
            key: key.clone(),
        };

        info!(key = %key, parameter = %job.parameter, "Processing with {}", self.processor.name());
        emit_opt(
            &self.audit,
            AuditEvent::ProcessingStarted {
                item_key: key.clone(),
                parameter: job.parameter.clone(),
            },
        )
        .await;

        let start = Instant::now();
        let result = self.processor.process(job).await;
        let elapsed = start.elapsed();

        match result {
            Ok(processed) => {
                metrics::STAGE_DURATION
                    .with_label_values(&["processing", "ok"])
                    .observe(elapsed.as_secs_f64());
                info!(
                    key = %key,
                    artifacts = processed.artifacts.len(),
                    bytes = processed.total_bytes(),
                    "Processing finished in {:.1}s",
                    elapsed.as_secs_f64()
                );
                emit_opt(
                    &self.audit,
                    AuditEvent::ProcessingCompleted {
                        item_key: key,
                        artifacts: processed.artifact_names().map(String::from).collect(),
                        total_bytes: processed.total_bytes(),
                        duration_secs: elapsed.as_secs(),
                    },
                )
                .await;
                Ok(processed)
            }
            Err(e) => {
                metrics::STAGE_DURATION
                    .with_label_values(&["processing", "error"])
                    .observe(elapsed.as_secs_f64());
                error!(key = %key, "Processing failed: {}", e);
                emit_opt(
                    &self.audit,
                    AuditEvent::ProcessingFailed {
                        item_key: key.clone(),
                        error: e.to_string(),
                        retryable: e.is_retryable(),
                    },
                )
                .await;
                Err(StageError::processing(key, e))
            }
        }
    }

    /// Stage 3: upload, verify and conditionally delete.
    pub async fn finish(&self, result: ProcessingResult) -> FinishRecord {
        self.finisher.run(&result, self.config.delete_enabled).await
    }
}

/// Removes `dir` if present and recreates it empty.
async fn reset_dir(dir: &Path) -> Result<(), StageError> {
    let io_error = |e| StageError::LocalIo {
        path: dir.to_path_buf(),
        source: e,
    };
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_error(e)),
    }
    tokio::fs::create_dir_all(dir).await.map_err(io_error)
}

fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}
