mod metrics;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spindle_core::config::TransferBackend;
use spindle_core::{
    create_audit_system, load_config, parse_descriptor, validate_config, AuditHandle, AuditStore,
    CommandObjectStore, CommandProcessor, Config, FsObjectStore, ObjectStore,
    PipelineOrchestrator, Processor, RunReport, SqliteAuditStore, StageExecutor,
};

/// Buffer size for audit event channel
const AUDIT_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(report) if report.is_success() => {}
        Ok(_) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<RunReport> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Determine config path
    let config_path = std::env::var("SPINDLE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("spindle.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!(
        "Staging root: {:?}, admission limit: {}, delete enabled: {}",
        config.pipeline.local_staging_root,
        config.pipeline.admission_limit,
        config.pipeline.delete_enabled
    );

    // Compute config hash for audit
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));

    // Read and validate the input descriptor before any work starts
    let input_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| config.pipeline.input_path.clone())
        .context("No input descriptor given (argument or pipeline.input_path)")?;
    let descriptor = std::fs::read_to_string(&input_path)
        .with_context(|| format!("Failed to read input descriptor {:?}", input_path))?;
    let items = parse_descriptor(&descriptor, &config.pipeline.default_parameter)
        .with_context(|| format!("Invalid input descriptor {:?}", input_path))?;
    info!("Loaded {} work items from {:?}", items.len(), input_path);

    // Audit system
    let audit_store: Arc<dyn AuditStore> = Arc::new(
        SqliteAuditStore::new(&config.database.path).context("Failed to create audit store")?,
    );
    let (audit_handle, audit_writer) = create_audit_system(audit_store, AUDIT_BUFFER_SIZE);
    let writer_handle = tokio::spawn(audit_writer.run());

    let processor = CommandProcessor::new(config.compute.clone());

    let report = match config.transfer.backend {
        TransferBackend::Filesystem => {
            let fs_config = config.transfer.filesystem.clone().unwrap_or_default();
            info!("Using filesystem object store rooted at {:?}", fs_config.root);
            let store = FsObjectStore::new(fs_config);
            execute(&config, store, processor, items, audit_handle, config_hash).await
        }
        TransferBackend::Command => {
            let command_config = config
                .transfer
                .command
                .clone()
                .context("transfer.command section is required for the command backend")?;
            info!("Using command object store");
            let store = CommandObjectStore::new(command_config);
            execute(&config, store, processor, items, audit_handle, config_hash).await
        }
    };

    // All audit handles are dropped once the orchestrator is gone
    match writer_handle.await {
        Ok(summary) if !summary.is_complete() => warn!(
            "Audit trail incomplete: {} events written, {} dropped",
            summary.written, summary.dropped
        ),
        Ok(summary) => info!("Audit trail complete: {} events written", summary.written),
        Err(e) => warn!("Audit writer task failed: {}", e),
    }

    let report = report?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize run report")?
    );

    metrics::collect_run_metrics(&report);
    if let Some(path) = &config.metrics.output_path {
        metrics::write_metrics(path)?;
        info!("Metrics written to {:?}", path);
    }

    Ok(report)
}

async fn execute<S, P>(
    config: &Config,
    store: S,
    processor: P,
    items: Vec<spindle_core::WorkItem>,
    audit: AuditHandle,
    config_hash: String,
) -> Result<RunReport>
where
    S: ObjectStore + 'static,
    P: Processor + 'static,
{
    store
        .validate()
        .await
        .with_context(|| format!("Object store '{}' is not usable", store.name()))?;
    processor
        .validate()
        .await
        .with_context(|| format!("Processor '{}' is not usable", processor.name()))?;

    let executor =
        StageExecutor::new(config.pipeline.clone(), store, processor).with_audit(audit.clone());
    let orchestrator = Arc::new(
        PipelineOrchestrator::new(executor)
            .with_audit(audit)
            .with_config_hash(&config_hash[..16]),
    );

    let signal_orchestrator = Arc::clone(&orchestrator);
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Shutdown signal received, cancelling run");
        signal_orchestrator.cancel();
    });

    let report = orchestrator.run(items).await;
    signal_task.abort();
    let _ = signal_task.await;

    Ok(report?)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
