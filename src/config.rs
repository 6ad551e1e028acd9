//! Configuration for the integrity core
//!
//! Thresholds are plain values injected into each component at
//! construction, so tests can vary them without process-wide state.

use serde::Deserialize;
use std::env;

use crate::upload::{DEFAULT_CHUNK_SIZE, DEFAULT_MULTIPART_THRESHOLD};

/// Maximum accepted file size for verification candidates: 500MB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 500 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub upload: UploadConfig,
    pub verification: VerificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Transport thresholds for the chunk planner
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Size of each chunk in the multipart path
    pub chunk_size: usize,
    /// Files below this size are uploaded in one direct put
    pub multipart_threshold: u64,
}

/// Input limits for the verification engine
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    pub max_file_size: u64,
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        VerificationConfig {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_mime_types: vec![
                "application/pdf".to_string(),
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/tiff".to_string(),
            ],
        }
    }
}

impl VerificationConfig {
    pub fn allows_mime_type(&self, mime_type: &str) -> bool {
        self.allowed_mime_types.iter().any(|m| m == mime_type)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig {
                endpoint: "http://localhost:9000".to_string(),
                bucket: "records".to_string(),
                access_key: "admin".to_string(),
                secret_key: "password123".to_string(),
                region: Some("us-east-1".to_string()),
            },
            database: DatabaseConfig {
                url: "sqlite:./escritura.db".to_string(),
            },
            upload: UploadConfig::default(),
            verification: VerificationConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let defaults = Config::default();

        Ok(Config {
            storage: StorageConfig {
                endpoint: env::var("S3_ENDPOINT")?,
                bucket: env::var("S3_BUCKET")?,
                access_key: env::var("S3_ACCESS_KEY")?,
                secret_key: env::var("S3_SECRET_KEY")?,
                region: env::var("S3_REGION").ok(),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:./escritura.db".to_string()),
            },
            upload: UploadConfig {
                chunk_size: env::var("UPLOAD_CHUNK_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_CHUNK_SIZE),
                multipart_threshold: env::var("UPLOAD_MULTIPART_THRESHOLD")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_MULTIPART_THRESHOLD),
            },
            verification: VerificationConfig {
                max_file_size: env::var("VERIFY_MAX_FILE_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_MAX_FILE_SIZE),
                allowed_mime_types: env::var("VERIFY_ALLOWED_MIME_TYPES")
                    .map(|v| {
                        v.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or(defaults.verification.allowed_mime_types),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_upload_thresholds() {
        let config = UploadConfig::default();
        assert_eq!(config.chunk_size, 2 * 1024 * 1024);
        assert!(config.multipart_threshold > config.chunk_size as u64);
    }

    #[test]
    fn default_mime_allow_list() {
        let config = VerificationConfig::default();
        assert!(config.allows_mime_type("application/pdf"));
        assert!(config.allows_mime_type("image/tiff"));
        assert!(!config.allows_mime_type("application/epub+zip"));
        assert!(!config.allows_mime_type("text/html"));
    }
}
