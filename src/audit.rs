//! Audit collaborator
//!
//! The engines emit one event per completed combine, hash computation,
//! and verification decision. Recording is fire-and-forget: a sink must
//! never fail the primary operation, so `record` is infallible.

use serde::Serialize;
use uuid::Uuid;

/// One auditable action performed by the integrity core
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditEvent {
    UploadCombined {
        actor: Uuid,
        key: String,
        size: u64,
        chunk_count: u32,
        duration_ms: u64,
    },
    DocumentHashed {
        actor: Uuid,
        document_id: Uuid,
        digest: String,
        size: u64,
        duration_ms: u64,
    },
    VerificationRecorded {
        actor: Uuid,
        document_id: Uuid,
        outcome: String,
        /// None for manual decisions (no digests were compared)
        matched: Option<bool>,
        duration_ms: u64,
    },
}

/// Destination for audit events
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Default sink: structured tracing events under the `audit` target
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, event: AuditEvent) {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        tracing::info!(target: "audit", event = %payload, "Audit event recorded");
    }
}

/// Collecting sink for tests and in-process inspection
#[derive(Default)]
pub struct RecordingAuditSink {
    events: parking_lot::Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}
