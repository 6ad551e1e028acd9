//! End-to-end integrity lifecycle
//!
//! Drives a document through the full flow a records server would use,
//! from chunked upload through verification, against a local object
//! store and a throwaway SQLite database.

use std::sync::Arc;

use tempfile::TempDir;
use uuid::Uuid;

use escritura_core::audit::{AuditEvent, RecordingAuditSink};
use escritura_core::config::{UploadConfig, VerificationConfig};
use escritura_core::db::{
    create_pool, DocumentRepository, DocumentStatus, NewDocument,
};
use escritura_core::integrity::HashEngine;
use escritura_core::storage::{LocalObjectStore, ObjectStore};
use escritura_core::upload::{
    CancellationToken, ChunkReceiver, UploadFile, UploadPlanner, UploadState,
};
use escritura_core::verification::{
    CandidateFile, VerificationEngine, VerificationOutcome,
};

struct World {
    _dir: TempDir,
    store: Arc<LocalObjectStore>,
    pool: sqlx::SqlitePool,
    sink: Arc<RecordingAuditSink>,
    planner: UploadPlanner,
    hash_engine: HashEngine,
    verification_engine: VerificationEngine,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "escritura_core=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

async fn world() -> World {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = Arc::new(LocalObjectStore::new(dir.path().join("objects")));
    let url = format!("sqlite://{}", dir.path().join("escritura.db").display());
    let pool = create_pool(&url).await.unwrap();
    let sink = Arc::new(RecordingAuditSink::new());

    let receiver = Arc::new(ChunkReceiver::new(store.clone(), sink.clone()));
    let planner = UploadPlanner::new(
        store.clone(),
        receiver,
        UploadConfig {
            chunk_size: 1024,
            multipart_threshold: 2048,
        },
    );
    let hash_engine = HashEngine::new(store.clone(), pool.clone(), sink.clone());
    let verification_engine = VerificationEngine::new(
        pool.clone(),
        VerificationConfig::default(),
        sink.clone(),
    );

    World {
        _dir: dir,
        store,
        pool,
        sink,
        planner,
        hash_engine,
        verification_engine,
    }
}

fn deed_bytes() -> Vec<u8> {
    // 5000 bytes -> 5 chunks of 1024 at the test chunk size
    (0..5000u32).map(|i| (i % 251) as u8).collect()
}

async fn register_document(world: &World, storage_key: &str, file_size: i64) -> Uuid {
    let repo = DocumentRepository::new(&world.pool);
    let doc = repo
        .insert_document(&NewDocument {
            property_id: Uuid::new_v4(),
            document_number: "DEED-2026-0117".to_string(),
            storage_key: storage_key.to_string(),
            mime_type: "application/pdf".to_string(),
            file_size,
            file_name: "deed.pdf".to_string(),
        })
        .await
        .unwrap();
    doc.id
}

#[tokio::test]
async fn upload_hash_verify_match() {
    let world = world().await;
    let actor = Uuid::new_v4();
    let bytes = deed_bytes();
    let key = "deeds/prop-1/deed.pdf";

    // Chunked upload to the final key
    let report = world
        .planner
        .upload(
            &UploadFile {
                file_name: "deed.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                bytes: bytes.clone(),
            },
            key,
            actor,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.state, UploadState::Success);
    assert_eq!(report.total_chunks, 5);

    // The combined object is byte-identical and the chunks are gone
    let stored = world.store.get(key).await.unwrap();
    assert_eq!(stored.data, bytes);
    for i in 0..5 {
        assert!(world.store.get(&format!("{key}.part{i}")).await.is_err());
    }

    // The acceptance step registers the document, then the hash engine
    // fingerprints it
    let document_id = register_document(&world, key, bytes.len() as i64).await;
    let outcome = world
        .hash_engine
        .compute_and_record(document_id, actor)
        .await
        .unwrap();
    assert!(outcome.newly_recorded);
    assert_eq!(outcome.hash.digest.len(), 64);

    // A byte-identical candidate verifies
    let verifier = Uuid::new_v4();
    let report = world
        .verification_engine
        .verify_with_file(
            document_id,
            verifier,
            &CandidateFile {
                file_name: "resubmitted.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                bytes: bytes.clone(),
            },
        )
        .await
        .unwrap();
    assert_eq!(report.verification.outcome, VerificationOutcome::Verified);
    assert!(report.status_updated);

    let repo = DocumentRepository::new(&world.pool);
    let doc = repo.load_document(document_id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Verified);

    // One audit event per combine, hash, and decision
    let events = world.sink.events();
    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], AuditEvent::UploadCombined { .. }));
    assert!(matches!(events[1], AuditEvent::DocumentHashed { .. }));
    assert!(matches!(
        events[2],
        AuditEvent::VerificationRecorded {
            matched: Some(true),
            ..
        }
    ));
}

#[tokio::test]
async fn upload_hash_verify_mismatch() {
    let world = world().await;
    let actor = Uuid::new_v4();
    let bytes = deed_bytes();
    let key = "deeds/prop-2/deed.pdf";

    world
        .planner
        .upload(
            &UploadFile {
                file_name: "deed.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                bytes: bytes.clone(),
            },
            key,
            actor,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let document_id = register_document(&world, key, bytes.len() as i64).await;
    world
        .hash_engine
        .compute_and_record(document_id, actor)
        .await
        .unwrap();

    // A tampered candidate is rejected, and the rejection is a successful
    // verification call, not an error
    let mut tampered = bytes.clone();
    tampered[0] ^= 0x01;
    let report = world
        .verification_engine
        .verify_with_file(
            document_id,
            Uuid::new_v4(),
            &CandidateFile {
                file_name: "tampered.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                bytes: tampered,
            },
        )
        .await
        .unwrap();

    assert_eq!(report.verification.outcome, VerificationOutcome::Rejected);
    assert!(report.verification.reason.is_some());
    assert!(report.verification.discrepancy.is_some());

    let repo = DocumentRepository::new(&world.pool);
    let doc = repo.load_document(document_id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Rejected);

    // Terminal: a second verification attempt is a precondition failure
    let retry = world
        .verification_engine
        .verify_with_file(
            document_id,
            Uuid::new_v4(),
            &CandidateFile {
                file_name: "again.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                bytes: bytes.clone(),
            },
        )
        .await;
    assert!(matches!(
        retry,
        Err(escritura_core::IntegrityError::Precondition(_))
    ));
}

#[tokio::test]
async fn small_document_skips_the_chunked_path() {
    let world = world().await;
    let bytes = b"short deed".to_vec();
    let key = "deeds/prop-3/deed.pdf";

    let report = world
        .planner
        .upload(
            &UploadFile {
                file_name: "deed.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                bytes: bytes.clone(),
            },
            key,
            Uuid::new_v4(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.state, UploadState::Success);
    assert_eq!(report.total_chunks, 1);
    assert_eq!(world.store.get(key).await.unwrap().data, bytes);

    // Direct puts emit no combine audit event
    assert!(world.sink.events().is_empty());
}
