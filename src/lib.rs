//! Escritura Core
//!
//! Document integrity engine for the property records server: transports
//! an uploaded document to durable storage in bounded-size chunks,
//! records a cryptographic fingerprint of its content, and later proves
//! through an independently re-computed fingerprint that a submitted
//! comparison file is byte-identical to the one on record.
//!
//! # Modules
//!
//! - `upload`: chunk planner, receiver/reassembler, cancellation
//! - `integrity`: content fingerprints and the hash engine
//! - `verification`: verification engine and constant-time comparison
//! - `storage`: object store trait with S3 and local backends
//! - `db`: document, fingerprint, and verification persistence
//! - `audit`: fire-and-forget audit events
//!
//! Authorization, HTTP transport, and audit-log formatting are owned by
//! the surrounding server; the engines assume their callers have already
//! gated access.

pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod integrity;
pub mod storage;
pub mod upload;
pub mod verification;

pub use config::Config;
pub use error::{IntegrityError, Result};
