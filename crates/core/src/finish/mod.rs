//! Transactional finish: upload artifacts, verify them at the destination,
//! and only then, if enabled, delete the raw source data.

mod error;
mod machine;
mod types;

pub use error::{FinishError, VerifyFailure};
pub use machine::FinishStateMachine;
pub use types::{FinishOutcome, FinishRecord, FinishState};
