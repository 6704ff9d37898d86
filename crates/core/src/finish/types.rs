//! Finish record and its state/outcome enums.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// States of the finish state machine. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishState {
    Uploading,
    Verifying,
    Deleting,
    Skipped,
    Done,
    Failed,
}

impl FinishState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Verifying => "verifying",
            Self::Deleting => "deleting",
            Self::Skipped => "skipped",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for FinishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of the finish protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishOutcome {
    Success,
    UploadFailed,
    VerifyFailed,
    SkippedNoDelete,
    /// Verified upload, but at least one source removal failed.
    DeletionInconsistent,
}

impl FinishOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::UploadFailed => "upload_failed",
            Self::VerifyFailed => "verify_failed",
            Self::SkippedNoDelete => "skipped_no_delete",
            Self::DeletionInconsistent => "deletion_inconsistent",
        }
    }

    /// Outcomes that leave the run healthy.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::SkippedNoDelete)
    }
}

impl fmt::Display for FinishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-item record owned by the finish state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishRecord {
    pub key: String,
    /// Artifact names uploaded successfully.
    pub uploaded: BTreeSet<String>,
    /// Artifact names whose remote size matched the local size.
    pub verified: BTreeSet<String>,
    /// True once any source sub-location has been removed.
    pub deleted: bool,
    pub outcome: Option<FinishOutcome>,
    pub state: FinishState,
    /// Snapshot of the delete flag at invocation.
    pub delete_enabled: bool,
    /// Source sub-locations actually removed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deleted_locations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FinishRecord {
    pub fn new(key: impl Into<String>, delete_enabled: bool) -> Self {
        Self {
            key: key.into(),
            uploaded: BTreeSet::new(),
            verified: BTreeSet::new(),
            deleted: false,
            outcome: None,
            state: FinishState::Uploading,
            delete_enabled,
            deleted_locations: Vec::new(),
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some() && self.state.is_terminal()
    }

    /// Whether every named artifact has been verified.
    pub fn all_verified<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> bool {
        let mut any = false;
        for name in names {
            any = true;
            if !self.verified.contains(name) {
                return false;
            }
        }
        any
    }

    /// `deleted` implies delete was enabled and every named artifact was verified.
    pub fn upholds_deletion_invariant<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> bool {
        !self.deleted || (self.delete_enabled && self.all_verified(names))
    }
}
