//! Verification types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{DocumentStatus, Verification};
use crate::error::Result;

/// Reason recorded on every fingerprint-mismatch rejection
pub const MISMATCH_REASON: &str =
    "document fingerprint does not match the recorded fingerprint";

/// A verifier's decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationOutcome {
    Verified,
    Rejected,
}

impl VerificationOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "verified" => Some(Self::Verified),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured evidence attached to a rejected verification
///
/// Tagged so new discrepancy kinds can be added without breaking stored
/// payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    HashMismatch {
        hash_mismatch: bool,
        /// Candidate size minus recorded size, when the recorded size is known
        file_size_difference: Option<i64>,
        recorded_digest: String,
        candidate_digest: String,
    },
}

/// The comparison file submitted for verification
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl CandidateFile {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Result of one verification call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub verification: Verification,
    pub document_status: DocumentStatus,
    /// False when the status write failed after the verification row was
    /// committed; the row stands and the lag is reported, not rolled back
    pub status_updated: bool,
}

/// One (document, file) pair in a batch
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub document_id: Uuid,
    pub file: CandidateFile,
}

/// Independent outcome for one batch pair
#[derive(Debug)]
pub struct BatchOutcome {
    pub document_id: Uuid,
    pub outcome: Result<VerificationReport>,
}
