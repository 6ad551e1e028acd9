//! Chunked Upload Module
//!
//! Transports a document to durable storage in bounded-size pieces:
//!
//! 1. The planner decides between one direct put and the chunked path
//! 2. Chunks are sent strictly in sequence, each under `finalKey.partN`
//! 3. One combine call reassembles them into the final object
//! 4. Chunk objects are reclaimed after combine, on cancellation, or by
//!    an explicit cleanup sweep
//!
//! The final object and the direct upload are first-writer-wins (upsert
//! disabled); chunk writes are last-writer-wins so retries are idempotent.

pub mod cancel;
pub mod planner;
pub mod receiver;
pub mod types;

pub use cancel::CancellationToken;
pub use planner::UploadPlanner;
pub use receiver::{ChunkReceiver, ChunkSink};
pub use types::*;
