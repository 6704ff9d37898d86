//! Upload, verify, then conditionally delete the source.
//!
//! The machine is fail-closed: any upload or verification problem ends in
//! `Failed` without touching the source, and deletion is only entered when
//! every artifact has been verified and deletion was enabled when the
//! machine was invoked.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::audit::{emit_opt, AuditEvent, AuditHandle};
use crate::compute::ProcessingResult;
use crate::metrics;
use crate::transfer::{join_location, ObjectStore};

use super::error::{FinishError, VerifyFailure};
use super::types::{FinishOutcome, FinishRecord, FinishState};

/// Runs the finish protocol for one item at a time. Holds no per-item state.
pub struct FinishStateMachine<S: ObjectStore> {
    store: Arc<S>,
    raw_data_dirs: Vec<String>,
    audit: Option<AuditHandle>,
}

impl<S: ObjectStore> FinishStateMachine<S> {
    /// `raw_data_dirs` are the sub-locations removed from the source on deletion.
    pub fn new(store: Arc<S>, raw_data_dirs: Vec<String>) -> Self {
        Self {
            store,
            raw_data_dirs,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Drives `result` to a terminal record.
    pub async fn run(&self, result: &ProcessingResult, delete_enabled: bool) -> FinishRecord {
        let start = Instant::now();
        let mut record = FinishRecord::new(&result.key, delete_enabled);
        let mut state = FinishState::Uploading;

        info!(
            key = %result.key,
            artifacts = result.artifacts.len(),
            delete_enabled,
            "Finishing item"
        );

        loop {
            let step = match state {
                FinishState::Uploading => self
                    .upload(result, &mut record)
                    .await
                    .map(|()| FinishState::Verifying),
                FinishState::Verifying => match self.verify(result, &mut record).await {
                    Ok(()) if record.delete_enabled && record.all_verified(result.artifact_names()) => {
                        Ok(FinishState::Deleting)
                    }
                    Ok(()) => Ok(FinishState::Skipped),
                    Err(e) => Err(e),
                },
                FinishState::Deleting => match self.delete_sources(result, &mut record).await {
                    Ok(()) => {
                        record.outcome = Some(FinishOutcome::Success);
                        Ok(FinishState::Done)
                    }
                    Err(e) => Err(e),
                },
                FinishState::Skipped => {
                    record.outcome = Some(FinishOutcome::SkippedNoDelete);
                    Ok(FinishState::Done)
                }
                FinishState::Done | FinishState::Failed => break,
            };

            let (next, reason) = match step {
                Ok(next) => (next, None),
                Err(e) => {
                    error!(key = %result.key, state = %state, "Finish failed: {}", e);
                    record.outcome = Some(e.outcome());
                    record.error = Some(e.to_string());
                    (FinishState::Failed, Some(e.to_string()))
                }
            };

            self.transition(&mut record, state, next, reason).await;
            state = next;
        }

        let outcome = record.outcome.unwrap_or(FinishOutcome::UploadFailed);
        metrics::FINISH_OUTCOMES
            .with_label_values(&[outcome.as_str()])
            .inc();
        metrics::STAGE_DURATION
            .with_label_values(&["finish", if outcome.is_success() { "ok" } else { "error" }])
            .observe(start.elapsed().as_secs_f64());

        info!(key = %record.key, outcome = %outcome, deleted = record.deleted, "Finish complete");
        record
    }

    async fn transition(
        &self,
        record: &mut FinishRecord,
        from: FinishState,
        to: FinishState,
        reason: Option<String>,
    ) {
        debug!(key = %record.key, "Finish transition {} -> {}", from, to);
        record.state = to;
        emit_opt(
            &self.audit,
            AuditEvent::FinishTransition {
                item_key: record.key.clone(),
                from_state: from.to_string(),
                to_state: to.to_string(),
                reason,
            },
        )
        .await;
    }

    async fn upload(
        &self,
        result: &ProcessingResult,
        record: &mut FinishRecord,
    ) -> Result<(), FinishError> {
        for artifact in &result.artifacts {
            let remote = join_location(&result.source_location, &artifact.name);
            debug!(key = %result.key, "Uploading {} to {}", artifact.name, remote);

            self.store
                .upload(&artifact.local_path, &remote)
                .await
                .map_err(|source| FinishError::Upload {
                    name: artifact.name.clone(),
                    source,
                })?;

            metrics::BYTES_UPLOADED.inc_by(artifact.byte_size);
            record.uploaded.insert(artifact.name.clone());
        }
        Ok(())
    }

    /// Checks every artifact, recording each verified name, and reports the first failure.
    async fn verify(
        &self,
        result: &ProcessingResult,
        record: &mut FinishRecord,
    ) -> Result<(), FinishError> {
        if result.artifacts.is_empty() {
            return Err(VerifyFailure::NoArtifacts.into());
        }

        let mut first_failure = None;

        for artifact in &result.artifacts {
            let check = if !record.uploaded.contains(&artifact.name) {
                Err(VerifyFailure::NotUploaded {
                    name: artifact.name.clone(),
                })
            } else {
                let remote = join_location(&result.source_location, &artifact.name);
                match self.store.stat(&remote).await {
                    Ok(Some(size)) if size == artifact.byte_size => Ok(()),
                    Ok(Some(size)) => Err(VerifyFailure::SizeMismatch {
                        name: artifact.name.clone(),
                        local: artifact.byte_size,
                        remote: size,
                    }),
                    Ok(None) => Err(VerifyFailure::Missing {
                        name: artifact.name.clone(),
                    }),
                    Err(e) => Err(VerifyFailure::StatFailed {
                        name: artifact.name.clone(),
                        reason: e.to_string(),
                    }),
                }
            };

            match check {
                Ok(()) => {
                    record.verified.insert(artifact.name.clone());
                }
                Err(failure) => {
                    warn!(key = %result.key, "Verification failed: {}", failure);
                    first_failure.get_or_insert(failure);
                }
            }
        }

        match first_failure {
            Some(failure) => Err(failure.into()),
            None => Ok(()),
        }
    }

    /// Removes every raw-data sub-location present under the source.
    ///
    /// Each removal is attempted independently; removals already done stay done.
    async fn delete_sources(
        &self,
        result: &ProcessingResult,
        record: &mut FinishRecord,
    ) -> Result<(), FinishError> {
        let mut failed = Vec::new();

        for dir in &self.raw_data_dirs {
            let location = format!("{}/", join_location(&result.source_location, dir));

            let present = match self.store.list(&location).await {
                Ok(objects) => !objects.is_empty(),
                Err(e) => {
                    // Presence unknown: count as a failed removal.
                    self.deletion_failed(&result.key, &location, e.to_string())
                        .await;
                    failed.push(location);
                    continue;
                }
            };
            if !present {
                continue;
            }

            // A zero exit is not proof of removal; the location must list empty.
            let removed = match self.store.remove(&location).await {
                Ok(()) => self.confirm_removed(&location).await,
                Err(e) => Err(e.to_string()),
            };

            match removed {
                Ok(()) => {
                    info!(key = %result.key, "Removed source {}", location);
                    metrics::DELETIONS.with_label_values(&["ok"]).inc();
                    record.deleted = true;
                    record.deleted_locations.push(location.clone());
                    emit_opt(
                        &self.audit,
                        AuditEvent::SourceDeleted {
                            item_key: result.key.clone(),
                            location,
                        },
                    )
                    .await;
                }
                Err(reason) => {
                    self.deletion_failed(&result.key, &location, reason).await;
                    failed.push(location);
                }
            }
        }

        if record.deleted_locations.is_empty() && failed.is_empty() {
            warn!(key = %result.key, "No raw data found under {}", result.source_location);
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(FinishError::DeletionInconsistent { failed })
        }
    }

    async fn confirm_removed(&self, location: &str) -> Result<(), String> {
        match self.store.list(location).await {
            Ok(remaining) if remaining.is_empty() => Ok(()),
            Ok(remaining) => Err(format!(
                "{} objects still present after removal",
                remaining.len()
            )),
            Err(e) => Err(format!("could not confirm removal: {}", e)),
        }
    }

    async fn deletion_failed(&self, key: &str, location: &str, error: String) {
        error!(key = %key, "Failed to remove source {}: {}", location, error);
        metrics::DELETIONS.with_label_values(&["error"]).inc();
        emit_opt(
            &self.audit,
            AuditEvent::SourceDeletionFailed {
                item_key: key.to_string(),
                location: location.to_string(),
                error,
            },
        )
        .await;
    }
}
