//! Pipeline orchestrator implementation.
//!
//! Every item runs its own chain of tasks:
//! - Staging: one task per item, gated by the admission controller
//! - Join: done here, in completion order, as staging results arrive
//! - Processing and finish: one task per joined item
//!
//! A failure in one item never stops the others.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::{emit_opt, AuditEvent, AuditHandle};
use crate::compute::Processor;
use crate::metrics;
use crate::registry::{self, RawRow, WorkItem};
use crate::stage::{join, ItemIndex, StageError, StageExecutor, StagingRequest, StagingResult};
use crate::transfer::ObjectStore;

use super::types::{ItemPhase, ItemReport, OrchestratorError, OrchestratorStatus, RunReport};

type Phases = Arc<RwLock<HashMap<String, ItemPhase>>>;

/// Resets the running flag when a run ends, including on panic.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives work items through staging, processing and finish.
pub struct PipelineOrchestrator<S, P>
where
    S: ObjectStore + 'static,
    P: Processor + 'static,
{
    executor: Arc<StageExecutor<S, P>>,
    audit: Option<AuditHandle>,
    config_hash: Option<String>,

    // Runtime state
    running: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
    phases: Phases,
    shutdown_tx: broadcast::Sender<()>,
}

impl<S, P> PipelineOrchestrator<S, P>
where
    S: ObjectStore + 'static,
    P: Processor + 'static,
{
    /// Create a new orchestrator.
    pub fn new(executor: StageExecutor<S, P>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            executor: Arc::new(executor),
            audit: None,
            config_hash: None,
            running: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
            phases: Arc::new(RwLock::new(HashMap::new())),
            shutdown_tx,
        }
    }

    /// Sets the audit handle for run-level events.
    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Hash of the loaded configuration, recorded with `RunStarted`.
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn executor(&self) -> &StageExecutor<S, P> {
        &self.executor
    }

    /// Request cancellation of the current run.
    ///
    /// Staging and processing in flight are dropped, releasing their permits.
    /// An item already in stage 3 runs it to completion.
    pub fn cancel(&self) {
        if !self.running.load(Ordering::SeqCst) {
            warn!("Cancel requested but no run is in progress");
        }
        info!("Cancelling pipeline run");
        // Flag first: tasks that subscribe after the send still observe it.
        self.cancelled.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());
    }

    /// Returns the current orchestrator status.
    pub async fn status(&self) -> OrchestratorStatus {
        let phases = self.phases.read().await;
        let mut staging = Vec::new();
        let mut processing = Vec::new();
        let mut finishing = Vec::new();

        for (key, phase) in phases.iter() {
            match phase {
                ItemPhase::Staging => staging.push(key.clone()),
                ItemPhase::Processing => processing.push(key.clone()),
                ItemPhase::Finishing => finishing.push(key.clone()),
            }
        }
        staging.sort();
        processing.sort();
        finishing.sort();

        OrchestratorStatus {
            running: self.running.load(Ordering::SeqCst),
            cancel_requested: self.cancelled.load(Ordering::SeqCst),
            admission: self.executor.admission().status(),
            staging,
            processing,
            finishing,
        }
    }

    /// Validate raw rows, then run them. Invalid input starts no stage.
    pub async fn run_rows(&self, rows: Vec<RawRow>) -> Result<RunReport, OrchestratorError> {
        let items = registry::parse(rows, &self.executor.config().default_parameter)?;
        self.run(items).await
    }

    /// Run every item to a terminal status.
    ///
    /// Keys are checked before anything starts: a repeated key or one that is
    /// not a single path segment rejects the whole run.
    pub async fn run(&self, items: Vec<WorkItem>) -> Result<RunReport, OrchestratorError> {
        registry::validate_items(&items)?;
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(OrchestratorError::AlreadyRunning);
        }
        let _guard = RunGuard(Arc::clone(&self.running));
        self.cancelled.store(false, Ordering::SeqCst);

        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let config = self.executor.config();

        info!(
            run_id = %run_id,
            items = items.len(),
            admission_limit = config.admission_limit,
            delete_enabled = config.delete_enabled,
            "Starting pipeline run"
        );
        emit_opt(
            &self.audit,
            AuditEvent::RunStarted {
                run_id: run_id.clone(),
                item_count: items.len(),
                admission_limit: self.executor.admission().limit(),
                delete_enabled: config.delete_enabled,
                config_hash: self.config_hash.clone(),
            },
        )
        .await;

        let mut reports = self.execute(&items).await;

        // Every registered item gets exactly one report, in registry order.
        let cancelled = self.cancelled.load(Ordering::SeqCst);
        let mut ordered = Vec::with_capacity(items.len());
        for item in &items {
            let report = reports.remove(&item.key).unwrap_or_else(|| {
                if cancelled {
                    ItemReport::cancelled(&item.key)
                } else {
                    error!(key = %item.key, "Item task ended without a report");
                    ItemReport::failed(&item.key, "internal", "item task aborted")
                }
            });
            ordered.push(report);
        }
        // Reports for keys outside the registry come from join misses.
        let mut unmatched: Vec<ItemReport> = reports.into_values().collect();
        unmatched.sort_by(|a, b| a.key.cmp(&b.key));
        ordered.extend(unmatched);

        for report in &ordered {
            metrics::ITEMS_COMPLETED
                .with_label_values(&[report.status.as_str()])
                .inc();
            emit_opt(
                &self.audit,
                AuditEvent::ItemFinished {
                    item_key: report.key.clone(),
                    status: report.status.as_str().to_string(),
                    outcome: report.outcome().map(|o| o.as_str().to_string()),
                },
            )
            .await;
        }

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            items: ordered,
        };

        if report.is_success() {
            info!(run_id = %report.run_id, items = report.items.len(), "Pipeline run succeeded");
        } else {
            warn!(
                run_id = %report.run_id,
                succeeded = report.succeeded(),
                failed = report.failed(),
                cancelled = report.cancelled(),
                "Pipeline run degraded"
            );
        }
        emit_opt(
            &self.audit,
            AuditEvent::RunFinished {
                run_id: report.run_id.clone(),
                succeeded: report.succeeded(),
                failed: report.failed(),
                cancelled: report.cancelled(),
                degraded: report.is_degraded(),
            },
        )
        .await;

        Ok(report)
    }

    /// Spawns every item chain and collects the reports that were produced.
    async fn execute(&self, items: &[WorkItem]) -> HashMap<String, ItemReport> {
        let index = ItemIndex::new(items);
        let (tx, mut rx) =
            mpsc::channel::<(String, Result<StagingResult, StageError>)>(items.len().max(1));

        let mut staging = JoinSet::new();
        for item in items {
            let request = StagingRequest::from(item);
            let executor = Arc::clone(&self.executor);
            let cancelled = Arc::clone(&self.cancelled);
            let shutdown = self.shutdown_tx.subscribe();
            let phases = Arc::clone(&self.phases);
            let tx = tx.clone();

            staging.spawn(async move {
                let key = request.key.clone();
                set_phase(&phases, &key, Some(ItemPhase::Staging)).await;
                let result = until_cancelled(&cancelled, shutdown, executor.stage(request)).await;
                set_phase(&phases, &key, None).await;
                if let Some(result) = result {
                    let _ = tx.send((key, result)).await;
                }
            });
        }
        drop(tx);

        let mut reports = HashMap::new();
        let mut downstream = JoinSet::new();

        // Staging results arrive in completion order.
        while let Some((key, result)) = rx.recv().await {
            let staged = match result {
                Ok(staged) => staged,
                Err(e) => {
                    reports.insert(key.clone(), ItemReport::stage_failed(key, &e));
                    continue;
                }
            };

            let enriched = match join(staged, &index) {
                Ok(enriched) => enriched,
                Err(e) => {
                    error!(key = %e.key, "Coordination failure: {}", e);
                    emit_opt(
                        &self.audit,
                        AuditEvent::CoordinationFailed {
                            item_key: e.key.clone(),
                        },
                    )
                    .await;
                    let e = StageError::from(e);
                    reports.insert(key.clone(), ItemReport::stage_failed(key, &e));
                    continue;
                }
            };
            debug!(key = %key, parameter = %enriched.parameter, "Joined staging result");

            let executor = Arc::clone(&self.executor);
            let cancelled = Arc::clone(&self.cancelled);
            let shutdown = self.shutdown_tx.subscribe();
            let phases = Arc::clone(&self.phases);

            downstream.spawn(async move {
                set_phase(&phases, &key, Some(ItemPhase::Processing)).await;
                let processed =
                    until_cancelled(&cancelled, shutdown, executor.process(enriched)).await;

                let report = match processed {
                    None => ItemReport::cancelled(&key),
                    Some(Err(e)) => ItemReport::stage_failed(&key, &e),
                    // Stage 3 is not started once cancellation is requested.
                    Some(Ok(_)) if cancelled.load(Ordering::SeqCst) => {
                        ItemReport::cancelled(&key)
                    }
                    Some(Ok(result)) => {
                        set_phase(&phases, &key, Some(ItemPhase::Finishing)).await;
                        ItemReport::finished(executor.finish(result).await)
                    }
                };
                set_phase(&phases, &key, None).await;
                report
            });
        }

        while let Some(joined) = staging.join_next().await {
            if let Err(e) = joined {
                error!("Staging task failed: {}", e);
            }
        }

        while let Some(joined) = downstream.join_next().await {
            match joined {
                Ok(report) => {
                    reports.insert(report.key.clone(), report);
                }
                Err(e) => error!("Item task failed: {}", e),
            }
        }

        reports
    }
}

/// Runs `fut` unless cancellation is requested first.
async fn until_cancelled<F: Future>(
    cancelled: &AtomicBool,
    mut shutdown: broadcast::Receiver<()>,
    fut: F,
) -> Option<F::Output> {
    if cancelled.load(Ordering::SeqCst) {
        return None;
    }
    tokio::select! {
        _ = shutdown.recv() => None,
        out = fut => Some(out),
    }
}

async fn set_phase(phases: &Phases, key: &str, phase: Option<ItemPhase>) {
    let mut phases = phases.write().await;
    match phase {
        Some(phase) => {
            phases.insert(key.to_string(), phase);
        }
        None => {
            phases.remove(key);
        }
    }
}
