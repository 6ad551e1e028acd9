//! Content fingerprints and the hash engine
//!
//! The canonical fingerprint is a SHA-256 digest of the full byte
//! content, encoded as lowercase hex. Hashing is idempotent by document
//! status: once a document is `hashed` (or later), re-invoking the engine
//! returns the recorded fingerprint without re-reading the stored object.

use std::sync::Arc;
use std::time::Instant;

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditSink};
use crate::db::{DocumentHash, DocumentRepository, DocumentStatus};
use crate::error::{ConsistencyError, Result, ValidationError};
use crate::storage::ObjectStore;

/// Algorithm identifier recorded with every fingerprint
pub const DIGEST_ALGORITHM: &str = "sha256";

/// Length of a hex-encoded digest: 256 bits = 64 chars
pub const DIGEST_HEX_LEN: usize = 64;

/// Compute the lowercase hex SHA-256 digest of `data`
pub fn compute_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Outcome of a hashing call
#[derive(Debug, Clone)]
pub struct HashOutcome {
    pub document_id: Uuid,
    pub hash: DocumentHash,
    /// False when the call was a no-op against an already-hashed document
    pub newly_recorded: bool,
}

/// Produces and records the canonical fingerprint of a document
pub struct HashEngine {
    store: Arc<dyn ObjectStore>,
    pool: SqlitePool,
    audit: Arc<dyn AuditSink>,
}

impl HashEngine {
    pub fn new(store: Arc<dyn ObjectStore>, pool: SqlitePool, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, pool, audit }
    }

    /// Fingerprint a document's stored object and advance it to `hashed`
    ///
    /// Already-hashed documents are a no-op success returning the latest
    /// recorded fingerprint. A read failure leaves the document in its
    /// prior status.
    pub async fn compute_and_record(&self, document_id: Uuid, actor: Uuid) -> Result<HashOutcome> {
        let started = Instant::now();
        let repo = DocumentRepository::new(&self.pool);

        let document = repo
            .load_document(document_id)
            .await?
            .ok_or(ValidationError::UnknownDocument(document_id))?;

        if document.status.has_fingerprint() {
            // Idempotent by status, not by content: the stored object is
            // not re-read, so an out-of-band replacement after hashing is
            // not detected here.
            let hash = repo
                .load_latest_document_hash(document_id)
                .await?
                .ok_or(ConsistencyError::MissingFingerprint(document_id))?;

            tracing::debug!(
                document_id = %document_id,
                status = %document.status,
                "Document already hashed, returning recorded fingerprint"
            );

            return Ok(HashOutcome {
                document_id,
                hash,
                newly_recorded: false,
            });
        }

        let object = self.store.get(&document.storage_key).await?;
        let digest = compute_digest(&object.data);

        let hash = repo
            .insert_document_hash(document_id, &digest, DIGEST_ALGORITHM)
            .await?;
        repo.update_document_status(
            document_id,
            DocumentStatus::Hashed,
            Some(chrono::Utc::now()),
        )
        .await?;

        tracing::info!(
            document_id = %document_id,
            digest = %digest,
            size = object.data.len(),
            "Document fingerprint recorded"
        );

        self.audit.record(AuditEvent::DocumentHashed {
            actor,
            document_id,
            digest,
            size: object.data.len() as u64,
            duration_ms: started.elapsed().as_millis() as u64,
        });

        Ok(HashOutcome {
            document_id,
            hash,
            newly_recorded: true,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
