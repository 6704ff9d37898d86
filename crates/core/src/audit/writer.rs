//! Persists audit events for the duration of a run.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::{AuditEvent, AuditEventEnvelope, AuditHandle, AuditRecord, AuditStore};

/// What a writer persisted before its channel closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriterSummary {
    /// Events stored.
    pub written: u64,
    /// Events the store rejected. These are lost.
    pub dropped: u64,
    /// `RunFinished` events stored, one per completed run.
    pub runs_closed: u64,
}

impl WriterSummary {
    /// Whether the trail is complete.
    pub fn is_complete(&self) -> bool {
        self.dropped == 0
    }
}

/// Single consumer of every `AuditHandle`, writing to the store in arrival order.
pub struct AuditWriter {
    rx: mpsc::Receiver<AuditEventEnvelope>,
    store: Arc<dyn AuditStore>,
}

impl AuditWriter {
    pub fn new(rx: mpsc::Receiver<AuditEventEnvelope>, store: Arc<dyn AuditStore>) -> Self {
        Self { rx, store }
    }

    /// Consume events until every `AuditHandle` has been dropped.
    ///
    /// A rejected insert is logged and counted; the writer keeps going so a
    /// transient store error never stalls the pipeline behind a full channel.
    pub async fn run(mut self) -> WriterSummary {
        let mut summary = WriterSummary::default();

        while let Some(envelope) = self.rx.recv().await {
            let closes_run = matches!(envelope.event, AuditEvent::RunFinished { .. });
            let record = to_record(envelope);

            match self.store.insert(&record) {
                Ok(_) => {
                    summary.written += 1;
                    if closes_run {
                        summary.runs_closed += 1;
                    }
                }
                Err(e) => {
                    summary.dropped += 1;
                    error!(
                        event = %record.event_type,
                        item_key = record.item_key.as_deref().unwrap_or("-"),
                        "Failed to write audit event: {}",
                        e
                    );
                }
            }
        }

        if summary.is_complete() {
            debug!(written = summary.written, "Audit trail closed");
        } else {
            warn!(
                written = summary.written,
                dropped = summary.dropped,
                "Audit trail closed with missing events"
            );
        }
        summary
    }
}

fn to_record(envelope: AuditEventEnvelope) -> AuditRecord {
    AuditRecord {
        id: 0,
        timestamp: envelope.timestamp,
        event_type: envelope.event.event_type().to_string(),
        item_key: envelope.event.item_key().map(String::from),
        run_id: envelope.event.run_id().map(String::from),
        data: envelope.event,
    }
}

/// Create a handle/writer pair sharing a bounded channel of `buffer_size`.
pub fn create_audit_system(
    store: Arc<dyn AuditStore>,
    buffer_size: usize,
) -> (AuditHandle, AuditWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (AuditHandle::new(tx), AuditWriter::new(rx, store))
}
