use thiserror::Error;

use crate::transfer::TransferError;

use super::types::FinishOutcome;

/// Why a verification check failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyFailure {
    #[error("no artifacts to verify")]
    NoArtifacts,

    #[error("{name} was never uploaded")]
    NotUploaded { name: String },

    #[error("{name} missing at destination")]
    Missing { name: String },

    #[error("{name} size mismatch: local {local} bytes, remote {remote} bytes")]
    SizeMismatch { name: String, local: u64, remote: u64 },

    #[error("{name} could not be checked: {reason}")]
    StatFailed { name: String, reason: String },
}

/// Errors that move a finish record to `Failed`.
#[derive(Debug, Error)]
pub enum FinishError {
    #[error("upload of {name} failed: {source}")]
    Upload {
        name: String,
        #[source]
        source: TransferError,
    },

    #[error("verification failed: {0}")]
    Verify(#[from] VerifyFailure),

    #[error("source removal failed for {}", failed.join(", "))]
    DeletionInconsistent { failed: Vec<String> },
}

impl FinishError {
    /// The outcome recorded for this failure.
    pub fn outcome(&self) -> FinishOutcome {
        match self {
            Self::Upload { .. } => FinishOutcome::UploadFailed,
            Self::Verify(_) => FinishOutcome::VerifyFailed,
            Self::DeletionInconsistent { .. } => FinishOutcome::DeletionInconsistent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_mapping() {
        let err = FinishError::Verify(VerifyFailure::SizeMismatch {
            name: "out.bin".to_string(),
            local: 1000,
            remote: 900,
        });
        assert_eq!(err.outcome(), FinishOutcome::VerifyFailed);
        assert!(err.to_string().contains("local 1000 bytes, remote 900 bytes"));

        let err = FinishError::DeletionInconsistent {
            failed: vec!["a/pod5/".to_string(), "a/fast5/".to_string()],
        };
        assert_eq!(err.outcome(), FinishOutcome::DeletionInconsistent);
        assert_eq!(err.to_string(), "source removal failed for a/pod5/, a/fast5/");
    }
}
