//! Verification engine
//!
//! Decides whether a freshly submitted file is byte-identical to the
//! recorded document and records that decision. Only `hashed` documents
//! accept a verification call; a rejection caused by a fingerprint
//! mismatch is a successful call with outcome `rejected`, not an error.

pub mod types;

pub use types::*;

use std::sync::Arc;
use std::time::Instant;

use sqlx::SqlitePool;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditSink};
use crate::config::VerificationConfig;
use crate::db::{Document, DocumentRepository, DocumentStatus, NewVerification};
use crate::error::{ConsistencyError, PreconditionError, Result, ValidationError};
use crate::integrity::compute_digest;

// ============================================================================
// Constant-time comparison
// ============================================================================

/// Compare two hex digests without leaking the first mismatch position
///
/// Length is checked first (digest lengths are public), then every byte
/// is folded into the comparison regardless of earlier mismatches.
pub fn constant_time_digest_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

// ============================================================================
// Verification Engine
// ============================================================================

/// Records verifier decisions and advances document state
pub struct VerificationEngine {
    pool: SqlitePool,
    config: VerificationConfig,
    audit: Arc<dyn AuditSink>,
}

impl VerificationEngine {
    pub fn new(pool: SqlitePool, config: VerificationConfig, audit: Arc<dyn AuditSink>) -> Self {
        Self { pool, config, audit }
    }

    /// Verify a document against a freshly submitted comparison file
    pub async fn verify_with_file(
        &self,
        document_id: Uuid,
        verifier_id: Uuid,
        candidate: &CandidateFile,
    ) -> Result<VerificationReport> {
        let started = Instant::now();

        // Input validation happens before any hashing or storage work
        let size = candidate.size();
        if size > self.config.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.config.max_file_size,
            }
            .into());
        }
        if !self.config.allows_mime_type(&candidate.mime_type) {
            return Err(ValidationError::DisallowedMimeType(candidate.mime_type.clone()).into());
        }

        let repo = DocumentRepository::new(&self.pool);
        let document = repo
            .load_document(document_id)
            .await?
            .ok_or(ValidationError::UnknownDocument(document_id))?;
        require_hashed(&document)?;

        let candidate_digest = compute_digest(&candidate.bytes);

        // A hashed document must have a fingerprint on record
        let recorded = repo
            .load_latest_document_hash(document_id)
            .await?
            .ok_or(ConsistencyError::MissingFingerprint(document_id))?;

        let matched = constant_time_digest_eq(&candidate_digest, &recorded.digest);

        let (outcome, reason, discrepancy, next_status) = if matched {
            (
                VerificationOutcome::Verified,
                None,
                None,
                DocumentStatus::Verified,
            )
        } else {
            (
                VerificationOutcome::Rejected,
                Some(MISMATCH_REASON.to_string()),
                Some(Discrepancy::HashMismatch {
                    hash_mismatch: true,
                    file_size_difference: Some(size as i64 - document.file_size),
                    recorded_digest: recorded.digest.clone(),
                    candidate_digest: candidate_digest.clone(),
                }),
                DocumentStatus::Rejected,
            )
        };

        let report = self
            .commit_decision(
                &repo,
                &document,
                NewVerification {
                    document_id,
                    verifier_id,
                    outcome,
                    reason,
                    discrepancy,
                },
                next_status,
            )
            .await?;

        tracing::info!(
            document_id = %document_id,
            verifier_id = %verifier_id,
            outcome = %outcome,
            matched = matched,
            "Verification recorded"
        );

        self.audit.record(AuditEvent::VerificationRecorded {
            actor: verifier_id,
            document_id,
            outcome: outcome.as_str().to_string(),
            matched: Some(matched),
            duration_ms: started.elapsed().as_millis() as u64,
        });

        Ok(report)
    }

    /// Record a human decision without comparing fingerprints
    pub async fn verify_manually(
        &self,
        document_id: Uuid,
        verifier_id: Uuid,
        decision: VerificationOutcome,
        reason: Option<String>,
    ) -> Result<VerificationReport> {
        let started = Instant::now();

        if decision == VerificationOutcome::Rejected
            && reason.as_deref().map_or(true, |r| r.trim().is_empty())
        {
            return Err(ValidationError::MissingRejectionReason.into());
        }

        let repo = DocumentRepository::new(&self.pool);
        let document = repo
            .load_document(document_id)
            .await?
            .ok_or(ValidationError::UnknownDocument(document_id))?;
        require_hashed(&document)?;

        let next_status = match decision {
            VerificationOutcome::Verified => DocumentStatus::Verified,
            VerificationOutcome::Rejected => DocumentStatus::Rejected,
        };

        let report = self
            .commit_decision(
                &repo,
                &document,
                NewVerification {
                    document_id,
                    verifier_id,
                    outcome: decision,
                    reason,
                    discrepancy: None,
                },
                next_status,
            )
            .await?;

        tracing::info!(
            document_id = %document_id,
            verifier_id = %verifier_id,
            outcome = %decision,
            "Manual verification recorded"
        );

        self.audit.record(AuditEvent::VerificationRecorded {
            actor: verifier_id,
            document_id,
            outcome: decision.as_str().to_string(),
            matched: None,
            duration_ms: started.elapsed().as_millis() as u64,
        });

        Ok(report)
    }

    /// Apply `verify_with_file` across pairs; one failure does not abort
    /// the remaining pairs
    pub async fn verify_batch(
        &self,
        verifier_id: Uuid,
        items: Vec<BatchItem>,
    ) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(items.len());

        for item in items {
            let outcome = self
                .verify_with_file(item.document_id, verifier_id, &item.file)
                .await;
            outcomes.push(BatchOutcome {
                document_id: item.document_id,
                outcome,
            });
        }

        outcomes
    }

    /// Insert the verification row, then advance the document status.
    ///
    /// The two writes are one logical unit but not one transaction: a
    /// status failure after the row commit leaves the row standing and is
    /// reported through `status_updated`.
    async fn commit_decision(
        &self,
        repo: &DocumentRepository<'_>,
        document: &Document,
        decision: NewVerification,
        next_status: DocumentStatus,
    ) -> Result<VerificationReport> {
        let verification = repo.insert_verification(&decision).await?;

        let status_updated = match repo
            .update_document_status(document.id, next_status, None)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    document_id = %document.id,
                    error = %e,
                    "Status update failed after verification commit"
                );
                false
            }
        };

        Ok(VerificationReport {
            verification,
            document_status: if status_updated {
                next_status
            } else {
                document.status
            },
            status_updated,
        })
    }
}

fn require_hashed(document: &Document) -> Result<()> {
    if document.status != DocumentStatus::Hashed {
        return Err(PreconditionError::InvalidDocumentStatus {
            document_id: document.id,
            status: document.status,
            required: DocumentStatus::Hashed,
        }
        .into());
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::RecordingAuditSink;
    use crate::db::{create_pool, NewDocument};
    use crate::error::IntegrityError;
    use crate::integrity::DIGEST_ALGORITHM;
    use tempfile::TempDir;

    fn test_config() -> VerificationConfig {
        VerificationConfig {
            max_file_size: 10_000,
            allowed_mime_types: vec!["application/pdf".to_string()],
        }
    }

    struct Harness {
        _dir: TempDir,
        pool: SqlitePool,
        sink: Arc<RecordingAuditSink>,
        engine: VerificationEngine,
    }

    async fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        let pool = create_pool(&url).await.unwrap();
        let sink = Arc::new(RecordingAuditSink::new());
        let engine = VerificationEngine::new(pool.clone(), test_config(), sink.clone());
        Harness {
            _dir: dir,
            pool,
            sink,
            engine,
        }
    }

    /// Seed a document in the given status, optionally with a recorded
    /// fingerprint of `content`
    async fn seed(
        h: &Harness,
        file_size: i64,
        status: DocumentStatus,
        recorded_content: Option<&[u8]>,
    ) -> Uuid {
        let repo = DocumentRepository::new(&h.pool);
        let doc = repo
            .insert_document(&NewDocument {
                property_id: Uuid::new_v4(),
                document_number: "DEED-0002".to_string(),
                storage_key: "deeds/x".to_string(),
                mime_type: "application/pdf".to_string(),
                file_size,
                file_name: "deed.pdf".to_string(),
            })
            .await
            .unwrap();

        if let Some(content) = recorded_content {
            repo.insert_document_hash(doc.id, &compute_digest(content), DIGEST_ALGORITHM)
                .await
                .unwrap();
        }
        if status != DocumentStatus::Pending {
            repo.update_document_status(doc.id, status, None)
                .await
                .unwrap();
        }

        doc.id
    }

    fn pdf(bytes: &[u8]) -> CandidateFile {
        CandidateFile {
            file_name: "candidate.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn constant_time_eq_behavior() {
        let a = "a".repeat(64);

        // Differ at position 0 and at position 63
        let mut first = a.clone().into_bytes();
        first[0] = b'b';
        let mut last = a.clone().into_bytes();
        last[63] = b'b';

        assert!(constant_time_digest_eq(&a, &a.clone()));
        assert!(!constant_time_digest_eq(&a, &String::from_utf8(first).unwrap()));
        assert!(!constant_time_digest_eq(&a, &String::from_utf8(last).unwrap()));
        assert!(!constant_time_digest_eq(&a, "a"));
        assert!(!constant_time_digest_eq("", "a"));
        assert!(constant_time_digest_eq("", ""));
    }

    #[tokio::test]
    async fn exact_match_verifies() {
        let h = harness().await;
        let content = b"identical deed bytes";
        let id = seed(&h, content.len() as i64, DocumentStatus::Hashed, Some(content)).await;

        let report = h
            .engine
            .verify_with_file(id, Uuid::new_v4(), &pdf(content))
            .await
            .unwrap();

        assert_eq!(report.verification.outcome, VerificationOutcome::Verified);
        assert!(report.verification.reason.is_none());
        assert!(report.verification.discrepancy.is_none());
        assert_eq!(report.document_status, DocumentStatus::Verified);
        assert!(report.status_updated);

        let repo = DocumentRepository::new(&h.pool);
        let doc = repo.load_document(id).await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Verified);
    }

    #[tokio::test]
    async fn size_mismatch_rejects_with_discrepancy() {
        let h = harness().await;
        let recorded = vec![1u8; 1000];
        let id = seed(&h, 1000, DocumentStatus::Hashed, Some(&recorded)).await;

        let candidate = vec![2u8; 1200];
        let report = h
            .engine
            .verify_with_file(id, Uuid::new_v4(), &pdf(&candidate))
            .await
            .unwrap();

        assert_eq!(report.verification.outcome, VerificationOutcome::Rejected);
        assert_eq!(report.verification.reason.as_deref(), Some(MISMATCH_REASON));
        assert_eq!(report.document_status, DocumentStatus::Rejected);

        match report.verification.discrepancy.as_ref().unwrap() {
            Discrepancy::HashMismatch {
                hash_mismatch,
                file_size_difference,
                recorded_digest,
                candidate_digest,
            } => {
                assert!(hash_mismatch);
                assert_eq!(*file_size_difference, Some(200));
                assert_eq!(recorded_digest, &compute_digest(&recorded));
                assert_eq!(candidate_digest, &compute_digest(&candidate));
            }
        }
    }

    #[tokio::test]
    async fn missing_fingerprint_is_a_consistency_error() {
        let h = harness().await;
        // Forced into hashed with no DocumentHash row
        let id = seed(&h, 100, DocumentStatus::Hashed, None).await;

        let result = h
            .engine
            .verify_with_file(id, Uuid::new_v4(), &pdf(b"anything"))
            .await;
        assert!(matches!(
            result,
            Err(IntegrityError::Consistency(
                ConsistencyError::MissingFingerprint(_)
            ))
        ));
    }

    #[tokio::test]
    async fn only_hashed_documents_accept_verification() {
        let h = harness().await;
        let content = b"bytes";

        for status in [
            DocumentStatus::Pending,
            DocumentStatus::Verified,
            DocumentStatus::Rejected,
        ] {
            let id = seed(&h, 5, status, Some(content)).await;

            let with_file = h
                .engine
                .verify_with_file(id, Uuid::new_v4(), &pdf(content))
                .await;
            assert!(
                matches!(with_file, Err(IntegrityError::Precondition(_))),
                "verify_with_file must fail from {status}"
            );

            let manual = h
                .engine
                .verify_manually(id, Uuid::new_v4(), VerificationOutcome::Verified, None)
                .await;
            assert!(
                matches!(manual, Err(IntegrityError::Precondition(_))),
                "verify_manually must fail from {status}"
            );
        }
    }

    #[tokio::test]
    async fn validation_runs_before_any_lookup() {
        let h = harness().await;

        // Unknown document id, but the oversized payload must win
        let oversized = CandidateFile {
            file_name: "big.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            bytes: vec![0u8; 10_001],
        };
        let result = h
            .engine
            .verify_with_file(Uuid::new_v4(), Uuid::new_v4(), &oversized)
            .await;
        assert!(matches!(
            result,
            Err(IntegrityError::Validation(ValidationError::FileTooLarge { .. }))
        ));

        let wrong_type = CandidateFile {
            file_name: "page.html".to_string(),
            mime_type: "text/html".to_string(),
            bytes: b"<html>".to_vec(),
        };
        let result = h
            .engine
            .verify_with_file(Uuid::new_v4(), Uuid::new_v4(), &wrong_type)
            .await;
        assert!(matches!(
            result,
            Err(IntegrityError::Validation(
                ValidationError::DisallowedMimeType(_)
            ))
        ));
    }

    #[tokio::test]
    async fn manual_rejection_requires_a_reason() {
        let h = harness().await;
        let id = seed(&h, 5, DocumentStatus::Hashed, Some(b"bytes")).await;

        for reason in [None, Some("   ".to_string())] {
            let result = h
                .engine
                .verify_manually(id, Uuid::new_v4(), VerificationOutcome::Rejected, reason)
                .await;
            assert!(matches!(
                result,
                Err(IntegrityError::Validation(
                    ValidationError::MissingRejectionReason
                ))
            ));
        }

        let report = h
            .engine
            .verify_manually(
                id,
                Uuid::new_v4(),
                VerificationOutcome::Rejected,
                Some("signature page missing".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(report.verification.outcome, VerificationOutcome::Rejected);
        assert!(report.verification.discrepancy.is_none());
        assert_eq!(report.document_status, DocumentStatus::Rejected);
    }

    #[tokio::test]
    async fn manual_approval_records_no_discrepancy() {
        let h = harness().await;
        let id = seed(&h, 5, DocumentStatus::Hashed, Some(b"bytes")).await;

        let report = h
            .engine
            .verify_manually(id, Uuid::new_v4(), VerificationOutcome::Verified, None)
            .await
            .unwrap();
        assert_eq!(report.verification.outcome, VerificationOutcome::Verified);
        assert!(report.verification.discrepancy.is_none());
        assert_eq!(report.document_status, DocumentStatus::Verified);
    }

    #[tokio::test]
    async fn batch_failures_do_not_abort_remaining_pairs() {
        let h = harness().await;
        let content = b"good bytes";

        // First pair is still pending (precondition failure), second is fine
        let pending = seed(&h, 10, DocumentStatus::Pending, None).await;
        let hashed = seed(&h, 10, DocumentStatus::Hashed, Some(content)).await;

        let outcomes = h
            .engine
            .verify_batch(
                Uuid::new_v4(),
                vec![
                    BatchItem {
                        document_id: pending,
                        file: pdf(content),
                    },
                    BatchItem {
                        document_id: hashed,
                        file: pdf(content),
                    },
                ],
            )
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].outcome.is_err());
        let report = outcomes[1].outcome.as_ref().unwrap();
        assert_eq!(report.verification.outcome, VerificationOutcome::Verified);
    }

    #[tokio::test]
    async fn decisions_emit_audit_events() {
        let h = harness().await;
        let content = b"bytes";
        let id = seed(&h, 5, DocumentStatus::Hashed, Some(content)).await;

        h.engine
            .verify_with_file(id, Uuid::new_v4(), &pdf(content))
            .await
            .unwrap();

        let events = h.sink.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            AuditEvent::VerificationRecorded {
                matched: Some(true),
                ..
            }
        ));
    }
}
