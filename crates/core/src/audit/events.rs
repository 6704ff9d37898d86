use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // Run lifecycle
    RunStarted {
        run_id: String,
        item_count: usize,
        admission_limit: usize,
        delete_enabled: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config_hash: Option<String>,
    },
    RunFinished {
        run_id: String,
        succeeded: usize,
        failed: usize,
        cancelled: usize,
        degraded: bool,
    },

    // Stage 1
    StagingStarted {
        item_key: String,
        source_location: String,
    },
    StagingCompleted {
        item_key: String,
        item_count: usize,
        integrity_ok: bool,
        duration_secs: u64,
    },
    StagingFailed {
        item_key: String,
        error: String,
        /// Whether rerunning the item may succeed.
        #[serde(default)]
        retryable: bool,
    },

    // Stage 2
    ProcessingStarted {
        item_key: String,
        parameter: String,
    },
    ProcessingCompleted {
        item_key: String,
        artifacts: Vec<String>,
        total_bytes: u64,
        duration_secs: u64,
    },
    ProcessingFailed {
        item_key: String,
        error: String,
        /// Whether rerunning the item may succeed.
        #[serde(default)]
        retryable: bool,
    },

    /// A staging result could not be matched to a registered work item.
    CoordinationFailed {
        item_key: String,
    },

    // Stage 3
    FinishTransition {
        item_key: String,
        from_state: String,
        to_state: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    SourceDeleted {
        item_key: String,
        location: String,
    },
    SourceDeletionFailed {
        item_key: String,
        location: String,
        error: String,
    },

    ItemFinished {
        item_key: String,
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        outcome: Option<String>,
    },
}

impl AuditEvent {
    /// Get the event type as a string (for database storage)
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::RunFinished { .. } => "run_finished",
            Self::StagingStarted { .. } => "staging_started",
            Self::StagingCompleted { .. } => "staging_completed",
            Self::StagingFailed { .. } => "staging_failed",
            Self::ProcessingStarted { .. } => "processing_started",
            Self::ProcessingCompleted { .. } => "processing_completed",
            Self::ProcessingFailed { .. } => "processing_failed",
            Self::CoordinationFailed { .. } => "coordination_failed",
            Self::FinishTransition { .. } => "finish_transition",
            Self::SourceDeleted { .. } => "source_deleted",
            Self::SourceDeletionFailed { .. } => "source_deletion_failed",
            Self::ItemFinished { .. } => "item_finished",
        }
    }

    /// Get the work item key if this event relates to a single item
    pub fn item_key(&self) -> Option<&str> {
        match self {
            Self::StagingStarted { item_key, .. }
            | Self::StagingCompleted { item_key, .. }
            | Self::StagingFailed { item_key, .. }
            | Self::ProcessingStarted { item_key, .. }
            | Self::ProcessingCompleted { item_key, .. }
            | Self::ProcessingFailed { item_key, .. }
            | Self::CoordinationFailed { item_key }
            | Self::FinishTransition { item_key, .. }
            | Self::SourceDeleted { item_key, .. }
            | Self::SourceDeletionFailed { item_key, .. }
            | Self::ItemFinished { item_key, .. } => Some(item_key),
            Self::RunStarted { .. } | Self::RunFinished { .. } => None,
        }
    }

    /// Get the run id for run-level events
    pub fn run_id(&self) -> Option<&str> {
        match self {
            Self::RunStarted { run_id, .. } | Self::RunFinished { run_id, .. } => Some(run_id),
            _ => None,
        }
    }
}

/// Stored audit record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub item_key: Option<String>,
    pub run_id: Option<String>,
    pub data: AuditEvent,
}
