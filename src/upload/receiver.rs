//! Chunk receiver and reassembler
//!
//! Accepts one chunk at a time under a derived `.partN` key and combines
//! them into the final durable object exactly once. Chunk writes use
//! upsert so a retried send of the same index overwrites cleanly; the
//! final commit disables upsert so concurrent combines resolve to one
//! winner and one `AlreadyExists` loser.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditSink};
use crate::error::{Result, ValidationError};
use crate::storage::{ObjectStore, PutOptions};

use super::types::{chunk_key, CombineOutcome};

// ============================================================================
// Chunk Sink Trait
// ============================================================================

/// Server-side half of the chunked transfer protocol
#[async_trait]
pub trait ChunkSink: Send + Sync {
    /// Accept one chunk of a session
    async fn receive_chunk(
        &self,
        final_key: &str,
        index: u32,
        total_chunks: u32,
        bytes: &[u8],
    ) -> Result<()>;

    /// Reassemble all chunks, in index order, into the final object
    async fn combine(&self, final_key: &str, total_chunks: u32, actor: Uuid)
        -> Result<CombineOutcome>;

    /// Best-effort deletion of every chunk key for a plan
    async fn cleanup(&self, final_key: &str, total_chunks: u32) -> Result<u32>;
}

// ============================================================================
// Chunk Receiver
// ============================================================================

/// Stores chunks in the object store and commits the combined object
#[derive(Clone)]
pub struct ChunkReceiver {
    store: Arc<dyn ObjectStore>,
    audit: Arc<dyn AuditSink>,
}

impl ChunkReceiver {
    pub fn new(store: Arc<dyn ObjectStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    fn chunk_keys(final_key: &str, total_chunks: u32) -> Vec<String> {
        (0..total_chunks).map(|i| chunk_key(final_key, i)).collect()
    }
}

#[async_trait]
impl ChunkSink for ChunkReceiver {
    async fn receive_chunk(
        &self,
        final_key: &str,
        index: u32,
        total_chunks: u32,
        bytes: &[u8],
    ) -> Result<()> {
        if index >= total_chunks {
            return Err(ValidationError::ChunkIndexOutOfBounds {
                index,
                total: total_chunks,
            }
            .into());
        }
        if bytes.is_empty() {
            return Err(ValidationError::EmptyChunk {
                key: final_key.to_string(),
                index,
            }
            .into());
        }

        let key = chunk_key(final_key, index);
        self.store
            .put(
                &key,
                bytes.to_vec(),
                PutOptions::upsert().with_content_type("application/octet-stream"),
            )
            .await?;

        tracing::debug!(
            key = %key,
            index = index,
            total_chunks = total_chunks,
            size = bytes.len(),
            "Chunk stored"
        );

        Ok(())
    }

    async fn combine(
        &self,
        final_key: &str,
        total_chunks: u32,
        actor: Uuid,
    ) -> Result<CombineOutcome> {
        let started = Instant::now();

        // Strict index order; a gap fails the missing chunk's download and
        // aborts the whole combine. Fetched chunks stay behind for a retry.
        let mut combined = Vec::new();
        for index in 0..total_chunks {
            let chunk = self.store.get(&chunk_key(final_key, index)).await?;
            combined.extend_from_slice(&chunk.data);
        }

        let size = combined.len() as u64;

        // First writer wins; a conflict here means another combine already
        // committed and the caller should treat this key as done.
        self.store
            .put(final_key, combined, PutOptions::create_only())
            .await?;

        let keys = Self::chunk_keys(final_key, total_chunks);
        let chunks_removed = match self.store.remove(&keys).await {
            Ok(removed) => removed.len() as u32,
            Err(e) => {
                tracing::warn!(key = %final_key, error = %e, "Chunk cleanup after combine failed");
                0
            }
        };

        if chunks_removed < total_chunks {
            tracing::warn!(
                key = %final_key,
                expected = total_chunks,
                removed = chunks_removed,
                "Orphaned chunk objects left after combine"
            );
        }

        tracing::info!(
            key = %final_key,
            size = size,
            chunks = total_chunks,
            "Combined chunks into final object"
        );

        self.audit.record(AuditEvent::UploadCombined {
            actor,
            key: final_key.to_string(),
            size,
            chunk_count: total_chunks,
            duration_ms: started.elapsed().as_millis() as u64,
        });

        Ok(CombineOutcome {
            key: final_key.to_string(),
            size,
            chunks_expected: total_chunks,
            chunks_removed,
        })
    }

    async fn cleanup(&self, final_key: &str, total_chunks: u32) -> Result<u32> {
        let keys = Self::chunk_keys(final_key, total_chunks);
        let removed = self.store.remove(&keys).await?;

        tracing::debug!(
            key = %final_key,
            requested = total_chunks,
            removed = removed.len(),
            "Chunk cleanup"
        );

        Ok(removed.len() as u32)
    }
}

// ============================================================================
// Tests
// ============================================================================
