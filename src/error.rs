//! Error types for the integrity core
//!
//! Four failure kinds cross the crate boundary: validation, precondition,
//! storage, and consistency. Nothing is swallowed; best-effort chunk
//! deletion after a combine or cancellation is logged instead of failing
//! the primary operation.

use thiserror::Error;
use uuid::Uuid;

use crate::db::DocumentStatus;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, IntegrityError>;

/// Top-level error for all core operations
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("consistency violation: {0}")]
    Consistency(#[from] ConsistencyError),
}

/// Malformed input, rejected before any storage I/O
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("unknown document: {0}")]
    UnknownDocument(Uuid),

    #[error("file too large: {size} bytes (max: {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("mime type not allowed: {0}")]
    DisallowedMimeType(String),

    #[error("chunk index out of bounds: {index} (total: {total})")]
    ChunkIndexOutOfBounds { index: u32, total: u32 },

    #[error("chunk {index} for {key} is empty")]
    EmptyChunk { key: String, index: u32 },

    #[error("a reason is required when rejecting a document")]
    MissingRejectionReason,
}

/// Operation attempted against a document in the wrong lifecycle state
#[derive(Error, Debug)]
pub enum PreconditionError {
    #[error("document {document_id} is '{status}', operation requires '{required}'")]
    InvalidDocumentStatus {
        document_id: Uuid,
        status: DocumentStatus,
        required: DocumentStatus,
    },
}

/// Object-store or relational-store I/O failure
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("storage backend error: {0}")]
    SdkError(String),

    #[error("io error for {key}: {message}")]
    Io { key: String, message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// An invariant found broken at read time; fatal to the current call
#[derive(Error, Debug)]
pub enum ConsistencyError {
    #[error("document {0} is hashed but has no recorded fingerprint")]
    MissingFingerprint(Uuid),

    #[error("invalid {entity} record: {detail}")]
    InvalidRecord { entity: &'static str, detail: String },
}

impl From<sqlx::Error> for IntegrityError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(StorageError::Database(err))
    }
}

impl IntegrityError {
    /// True when the caller should fix input or re-fetch state before retrying
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Precondition(_))
    }

    /// True when the failure is transient and a later retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        let validation: IntegrityError =
            ValidationError::MissingRejectionReason.into();
        assert!(validation.is_caller_error());
        assert!(!validation.is_transient());

        let storage: IntegrityError =
            StorageError::ObjectNotFound("deeds/x".to_string()).into();
        assert!(storage.is_transient());
        assert!(!storage.is_caller_error());

        let consistency: IntegrityError =
            ConsistencyError::MissingFingerprint(Uuid::new_v4()).into();
        assert!(!consistency.is_transient());
        assert!(!consistency.is_caller_error());
    }
}
