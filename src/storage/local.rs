//! Local filesystem object store
//!
//! Mirrors the S3 backend's contract on top of tokio::fs. Keys map to
//! paths under a base directory; slashes in keys become subdirectories.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;

use super::types::{ObjectMetadata, PutOptions, StorageObject};
use super::ObjectStore;

/// Filesystem-backed object store rooted at a base directory
#[derive(Clone)]
pub struct LocalObjectStore {
    base_path: PathBuf,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    async fn ensure_parent(&self, path: &Path, key: &str) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Io {
                    key: key.to_string(),
                    message: e.to_string(),
                })?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        options: PutOptions,
    ) -> Result<(), StorageError> {
        let path = self.object_path(key);
        self.ensure_parent(&path, key).await?;

        if !options.upsert {
            let exists = tokio::fs::try_exists(&path)
                .await
                .map_err(|e| StorageError::Io {
                    key: key.to_string(),
                    message: e.to_string(),
                })?;
            if exists {
                return Err(StorageError::AlreadyExists(key.to_string()));
            }
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| StorageError::Io {
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    async fn get(&self, key: &str) -> Result<StorageObject, StorageError> {
        let path = self.object_path(key);

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::ObjectNotFound(key.to_string()));
            }
            Err(e) => {
                return Err(StorageError::Io {
                    key: key.to_string(),
                    message: e.to_string(),
                });
            }
        };

        let last_modified = tokio::fs::metadata(&path)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);

        Ok(StorageObject {
            metadata: ObjectMetadata {
                key: key.to_string(),
                size: data.len() as i64,
                last_modified,
                content_type: None,
            },
            data,
        })
    }

    async fn remove(&self, keys: &[String]) -> Result<Vec<String>, StorageError> {
        let mut removed = Vec::with_capacity(keys.len());

        for key in keys {
            match tokio::fs::remove_file(self.object_path(key)).await {
                Ok(_) => removed.push(key.clone()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Failed to delete object");
                }
            }
        }

        Ok(removed)
    }
}
