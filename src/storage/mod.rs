//! Object storage for document blobs and transient chunks
//!
//! The store is key-addressed and bucket-scoped: every backend is
//! constructed against one bucket, so callers never pass bucket names.
//! Two backends are provided: S3-compatible services (MinIO, R2, B2, AWS)
//! and the local filesystem.

mod local;
mod s3;
mod types;

pub use local::LocalObjectStore;
pub use s3::S3ObjectStore;
pub use types::{ObjectMetadata, PutOptions, StorageObject};

use async_trait::async_trait;

use crate::error::StorageError;

/// Key-addressed blob storage
///
/// `remove` is best-effort by contract: per-key failures are skipped and
/// the returned list names only the keys actually removed.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object; honors the upsert policy in `options`
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        options: PutOptions,
    ) -> Result<(), StorageError>;

    /// Read an object in full
    async fn get(&self, key: &str) -> Result<StorageObject, StorageError>;

    /// Delete objects, returning the keys actually removed
    async fn remove(&self, keys: &[String]) -> Result<Vec<String>, StorageError>;
}
