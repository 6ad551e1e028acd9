//! Storage types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata about a storage object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
}

/// A storage object with its data
#[derive(Debug)]
pub struct StorageObject {
    pub metadata: ObjectMetadata,
    pub data: Vec<u8>,
}

/// Write options for a put
///
/// `upsert: false` makes the write fail with `AlreadyExists` if the key
/// is taken (first-writer-wins); `upsert: true` overwrites cleanly
/// (last-writer-wins, used for chunk retries).
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub upsert: bool,
    pub content_type: Option<String>,
}

impl PutOptions {
    /// Overwrite an existing key
    pub fn upsert() -> Self {
        PutOptions {
            upsert: true,
            content_type: None,
        }
    }

    /// Fail if the key already exists
    pub fn create_only() -> Self {
        PutOptions {
            upsert: false,
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_options_builder() {
        let options = PutOptions::upsert().with_content_type("application/pdf");
        assert!(options.upsert);
        assert_eq!(options.content_type.as_deref(), Some("application/pdf"));

        let options = PutOptions::create_only();
        assert!(!options.upsert);
        assert!(options.content_type.is_none());
    }
}
