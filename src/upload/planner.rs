//! Chunk planner
//!
//! Client-side driver of an upload: decides between a direct put and the
//! chunked path, sends chunks strictly in sequence, and issues the single
//! combine call after the last chunk is accepted. Progress is observable
//! through a watch channel; cancellation is cooperative and checked
//! before each send.

use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::error::Result;
use crate::storage::{ObjectStore, PutOptions};

use super::cancel::CancellationToken;
use super::receiver::ChunkSink;
use super::types::{TransferPlan, UploadFile, UploadProgress, UploadReport, UploadState};

/// Drives one upload at a time to a terminal state
pub struct UploadPlanner {
    store: Arc<dyn ObjectStore>,
    sink: Arc<dyn ChunkSink>,
    config: UploadConfig,
    progress: watch::Sender<UploadProgress>,
}

impl UploadPlanner {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        sink: Arc<dyn ChunkSink>,
        config: UploadConfig,
    ) -> Self {
        let (progress, _) = watch::channel(UploadProgress::idle());
        Self {
            store,
            sink,
            config,
            progress,
        }
    }

    /// Subscribe to progress snapshots
    pub fn subscribe(&self) -> watch::Receiver<UploadProgress> {
        self.progress.subscribe()
    }

    /// Latest progress snapshot
    pub fn progress(&self) -> UploadProgress {
        self.progress.borrow().clone()
    }

    /// Return to `idle` after a terminal state
    pub fn reset(&self) {
        self.progress.send_replace(UploadProgress::idle());
    }

    /// Transport strategy for a file of the given size
    pub fn plan(&self, total_bytes: u64) -> TransferPlan {
        if total_bytes < self.config.multipart_threshold {
            return TransferPlan::Direct;
        }

        let chunk_size = self.config.chunk_size;
        let total_chunks = total_bytes.div_ceil(chunk_size as u64) as u32;
        TransferPlan::Chunked {
            chunk_size,
            total_chunks,
        }
    }

    /// Upload a file to its destination key and drive it to a terminal state
    ///
    /// Success and cancellation are reported in the returned
    /// [`UploadReport`]; chunk or combine failures abort immediately with
    /// a typed error, leaving already-uploaded chunks in place for an
    /// explicit cleanup call.
    pub async fn upload(
        &self,
        file: &UploadFile,
        destination_key: &str,
        actor: Uuid,
        token: &CancellationToken,
    ) -> Result<UploadReport> {
        let total_bytes = file.total_bytes();

        match self.plan(total_bytes) {
            TransferPlan::Direct => {
                self.upload_direct(file, destination_key, total_bytes, token)
                    .await
            }
            TransferPlan::Chunked {
                chunk_size,
                total_chunks,
            } => {
                self.upload_chunked(
                    file,
                    destination_key,
                    total_bytes,
                    chunk_size,
                    total_chunks,
                    actor,
                    token,
                )
                .await
            }
        }
    }

    async fn upload_direct(
        &self,
        file: &UploadFile,
        destination_key: &str,
        total_bytes: u64,
        token: &CancellationToken,
    ) -> Result<UploadReport> {
        if token.is_cancelled() {
            return Ok(self.finish_cancelled(destination_key, 0, total_bytes, 1));
        }

        self.set_progress(UploadProgress {
            state: UploadState::Uploading,
            progress_percent: 0.0,
            bytes_uploaded: 0,
            total_bytes,
            current_chunk_index: Some(0),
            total_chunks: 1,
        });

        // Upsert disabled: a completed upload must never be silently replaced
        let result = self
            .store
            .put(
                destination_key,
                file.bytes.clone(),
                PutOptions::create_only().with_content_type(&file.mime_type),
            )
            .await;

        if let Err(e) = result {
            self.set_progress(UploadProgress {
                state: UploadState::Error,
                progress_percent: 0.0,
                bytes_uploaded: 0,
                total_bytes,
                current_chunk_index: Some(0),
                total_chunks: 1,
            });
            return Err(e.into());
        }

        self.set_progress(UploadProgress {
            state: UploadState::Success,
            progress_percent: 100.0,
            bytes_uploaded: total_bytes,
            total_bytes,
            current_chunk_index: Some(0),
            total_chunks: 1,
        });

        tracing::info!(key = %destination_key, size = total_bytes, "Direct upload complete");

        Ok(UploadReport {
            state: UploadState::Success,
            key: destination_key.to_string(),
            bytes_uploaded: total_bytes,
            total_bytes,
            total_chunks: 1,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn upload_chunked(
        &self,
        file: &UploadFile,
        destination_key: &str,
        total_bytes: u64,
        chunk_size: usize,
        total_chunks: u32,
        actor: Uuid,
        token: &CancellationToken,
    ) -> Result<UploadReport> {
        let mut bytes_uploaded: u64 = 0;

        for index in 0..total_chunks {
            // Cooperative cancellation, observed before each send. A cancel
            // landing after the last chunk does not stop the combine.
            if token.is_cancelled() {
                if index > 0 {
                    match self.sink.cleanup(destination_key, index).await {
                        Ok(removed) => {
                            tracing::info!(
                                key = %destination_key,
                                removed = removed,
                                "Removed chunks after cancellation"
                            );
                        }
                        Err(e) => {
                            tracing::warn!(
                                key = %destination_key,
                                error = %e,
                                "Chunk cleanup after cancellation failed"
                            );
                        }
                    }
                }
                return Ok(self.finish_cancelled(
                    destination_key,
                    bytes_uploaded,
                    total_bytes,
                    total_chunks,
                ));
            }

            let start = index as usize * chunk_size;
            let end = usize::min(start + chunk_size, file.bytes.len());

            self.set_progress(UploadProgress {
                state: UploadState::Uploading,
                progress_percent: UploadProgress::percent(bytes_uploaded, total_bytes),
                bytes_uploaded,
                total_bytes,
                current_chunk_index: Some(index),
                total_chunks,
            });

            let sent = self
                .sink
                .receive_chunk(destination_key, index, total_chunks, &file.bytes[start..end])
                .await;

            if let Err(e) = sent {
                // No automatic cleanup on failure: chunks stay for an
                // explicit cleanup request or a resumed attempt.
                self.set_progress(UploadProgress {
                    state: UploadState::Error,
                    progress_percent: UploadProgress::percent(bytes_uploaded, total_bytes),
                    bytes_uploaded,
                    total_bytes,
                    current_chunk_index: Some(index),
                    total_chunks,
                });
                tracing::warn!(
                    key = %destination_key,
                    chunk_index = index,
                    bytes_uploaded = bytes_uploaded,
                    "Chunk upload failed"
                );
                return Err(e);
            }

            bytes_uploaded = end as u64;
            self.set_progress(UploadProgress {
                state: UploadState::Uploading,
                progress_percent: UploadProgress::percent(bytes_uploaded, total_bytes),
                bytes_uploaded,
                total_bytes,
                current_chunk_index: Some(index),
                total_chunks,
            });
        }

        if let Err(e) = self.sink.combine(destination_key, total_chunks, actor).await {
            self.set_progress(UploadProgress {
                state: UploadState::Error,
                progress_percent: UploadProgress::percent(bytes_uploaded, total_bytes),
                bytes_uploaded,
                total_bytes,
                current_chunk_index: total_chunks.checked_sub(1),
                total_chunks,
            });
            return Err(e);
        }

        self.set_progress(UploadProgress {
            state: UploadState::Success,
            progress_percent: 100.0,
            bytes_uploaded,
            total_bytes,
            current_chunk_index: total_chunks.checked_sub(1),
            total_chunks,
        });

        Ok(UploadReport {
            state: UploadState::Success,
            key: destination_key.to_string(),
            bytes_uploaded,
            total_bytes,
            total_chunks,
        })
    }

    fn finish_cancelled(
        &self,
        destination_key: &str,
        bytes_uploaded: u64,
        total_bytes: u64,
        total_chunks: u32,
    ) -> UploadReport {
        self.set_progress(UploadProgress {
            state: UploadState::Cancelled,
            progress_percent: UploadProgress::percent(bytes_uploaded, total_bytes),
            bytes_uploaded,
            total_bytes,
            current_chunk_index: None,
            total_chunks,
        });

        tracing::info!(key = %destination_key, "Upload cancelled");

        UploadReport {
            state: UploadState::Cancelled,
            key: destination_key.to_string(),
            bytes_uploaded,
            total_bytes,
            total_chunks,
        }
    }

    fn set_progress(&self, progress: UploadProgress) {
        self.progress.send_replace(progress);
    }
}

// ============================================================================
// Tests
// ============================================================================
