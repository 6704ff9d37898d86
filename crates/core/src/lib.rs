pub mod admission;
pub mod audit;
pub mod command;
pub mod compute;
pub mod config;
pub mod finish;
pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod stage;
pub mod testing;
pub mod transfer;

pub use admission::{AdmissionController, AdmissionError, AdmissionPermit, PoolStatus};
pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditFilter, AuditHandle, AuditRecord,
    AuditStore, AuditWriter, SqliteAuditStore, WriterSummary,
};
pub use compute::{CommandProcessor, ComputeConfig, ProcessingResult, Processor, ProcessorError};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use finish::{FinishOutcome, FinishRecord, FinishState, FinishStateMachine};
pub use orchestrator::{
    ItemReport, ItemStatus, OrchestratorError, OrchestratorStatus, PipelineOrchestrator,
    RunReport,
};
pub use registry::{parse, parse_descriptor, RawRow, ValidationError, WorkItem};
pub use stage::{
    CoordinationError, EnrichedStagingResult, ItemIndex, PipelineConfig, StageError,
    StageExecutor, StagingRequest, StagingResult,
};
pub use transfer::{
    CommandObjectStore, FsObjectStore, ObjectStore, RemoteObject, TransferError,
};
