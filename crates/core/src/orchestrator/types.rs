//! Types for the pipeline orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::admission::PoolStatus;
use crate::finish::{FinishOutcome, FinishRecord, FinishState};
use crate::registry::ValidationError;
use crate::stage::StageError;

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Another run is in progress on this orchestrator.
    #[error("a run is already in progress")]
    AlreadyRunning,

    /// The input rows did not validate; no stage has run.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
}

/// Terminal status of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// The finish state machine reached `Done`.
    Done,
    /// Any stage failed, or the finish state machine reached `Failed`.
    Failed,
    /// Cancelled before stage 3 began.
    Cancelled,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Where an item currently is, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemPhase {
    Staging,
    Processing,
    Finishing,
}

/// Final report for one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReport {
    pub key: String,
    pub status: ItemStatus,
    /// Stage that ended the item early (`staging`, `join`, `processing`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present once stage 3 has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<FinishRecord>,
}

impl ItemReport {
    pub fn finished(record: FinishRecord) -> Self {
        let status = match record.state {
            FinishState::Done => ItemStatus::Done,
            _ => ItemStatus::Failed,
        };
        Self {
            key: record.key.clone(),
            status,
            failed_stage: None,
            error: record.error.clone(),
            finish: Some(record),
        }
    }

    pub fn stage_failed(key: impl Into<String>, error: &StageError) -> Self {
        let failed_stage = match error {
            StageError::Coordination(_) => "join",
            StageError::Processing { .. } => "processing",
            _ => "staging",
        };
        Self::failed(key, failed_stage, error.to_string())
    }

    pub fn failed(
        key: impl Into<String>,
        failed_stage: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            status: ItemStatus::Failed,
            failed_stage: Some(failed_stage.into()),
            error: Some(error.into()),
            finish: None,
        }
    }

    pub fn cancelled(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: ItemStatus::Cancelled,
            failed_stage: None,
            error: None,
            finish: None,
        }
    }

    pub fn outcome(&self) -> Option<FinishOutcome> {
        self.finish.as_ref().and_then(|record| record.outcome)
    }

    /// Done with `SUCCESS` or `SKIPPED_NO_DELETE`.
    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Done && self.outcome().is_some_and(|o| o.is_success())
    }
}

/// Aggregate report for a run. Items are listed in registry order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub items: Vec<ItemReport>,
}

impl RunReport {
    /// True only if every item succeeded.
    pub fn is_success(&self) -> bool {
        self.items.iter().all(ItemReport::is_success)
    }

    pub fn is_degraded(&self) -> bool {
        !self.is_success()
    }

    pub fn get(&self, key: &str) -> Option<&ItemReport> {
        self.items.iter().find(|item| item.key == key)
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|item| item.is_success()).count()
    }

    pub fn cancelled(&self) -> usize {
        self.count_status(ItemStatus::Cancelled)
    }

    /// Items that are neither successful nor cancelled.
    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded() - self.cancelled()
    }

    fn count_status(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|item| item.status == status).count()
    }
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub running: bool,
    pub cancel_requested: bool,
    pub admission: PoolStatus,
    /// Keys staging or waiting for an admission permit.
    pub staging: Vec<String>,
    pub processing: Vec<String>,
    pub finishing: Vec<String>,
}
