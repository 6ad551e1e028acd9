//! Upload types

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Default chunk size: 2MB
pub const DEFAULT_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Files below this size skip the chunked path: 8MB
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 8 * 1024 * 1024;

/// Storage key for one chunk of an upload session
pub fn chunk_key(final_key: &str, index: u32) -> String {
    format!("{}.part{}", final_key, index)
}

// ============================================================================
// Transfer plan
// ============================================================================

/// Transport strategy decided from the file's total size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPlan {
    /// One direct put of the whole file
    Direct,
    /// Sequential chunk sends followed by one combine call
    Chunked { chunk_size: usize, total_chunks: u32 },
}

// ============================================================================
// Progress
// ============================================================================

/// Planner state; terminal variants hold until an explicit reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    Idle,
    Uploading,
    Success,
    Error,
    Cancelled,
}

impl UploadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Cancelled)
    }
}

/// Observable snapshot of an upload in progress
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub state: UploadState,
    pub progress_percent: f64,
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
    pub current_chunk_index: Option<u32>,
    pub total_chunks: u32,
}

impl UploadProgress {
    pub fn idle() -> Self {
        UploadProgress {
            state: UploadState::Idle,
            progress_percent: 0.0,
            bytes_uploaded: 0,
            total_bytes: 0,
            current_chunk_index: None,
            total_chunks: 0,
        }
    }

    pub(crate) fn percent(bytes_uploaded: u64, total_bytes: u64) -> f64 {
        if total_bytes == 0 {
            return 100.0;
        }
        (bytes_uploaded as f64 / total_bytes as f64) * 100.0
    }
}

// ============================================================================
// Payloads and outcomes
// ============================================================================

/// The file handed to the planner: a finite byte sequence of known size
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn total_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Terminal report of a finished (or cancelled) upload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub state: UploadState,
    pub key: String,
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
    pub total_chunks: u32,
}

/// Result of a successful combine
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombineOutcome {
    pub key: String,
    /// Authoritative size: the sum of the chunk sizes, not the declared total
    pub size: u64,
    pub chunks_expected: u32,
    /// Chunk objects deleted after the commit; a shortfall leaves orphans
    pub chunks_removed: u32,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_key_derivation() {
        assert_eq!(chunk_key("deeds/x/deed.pdf", 0), "deeds/x/deed.pdf.part0");
        assert_eq!(chunk_key("deeds/x/deed.pdf", 17), "deeds/x/deed.pdf.part17");
    }

    #[test]
    fn percent_is_guarded_against_empty_files() {
        assert_eq!(UploadProgress::percent(0, 0), 100.0);
        assert_eq!(UploadProgress::percent(50, 200), 25.0);
        assert_eq!(UploadProgress::percent(200, 200), 100.0);
    }

    #[test]
    fn terminal_states() {
        assert!(!UploadState::Idle.is_terminal());
        assert!(!UploadState::Uploading.is_terminal());
        assert!(UploadState::Success.is_terminal());
        assert!(UploadState::Error.is_terminal());
        assert!(UploadState::Cancelled.is_terminal());
    }
}
