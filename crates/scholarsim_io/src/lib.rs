//! # Scholarsim IO
//!
//! Persistence layer for Scholarsim.
//!
//! This crate provides:
//! - Structured error handling for store and source failures
//! - The cache gateway with versioned, checksummed, expiring entries
//! - In-memory and SQLite key-value backends
//! - The relational factor source (in-memory and SQLite)
//! - A SQLite worker thread with per-call timeouts

/// The cache gateway, entry codec and key-value backends
pub mod cache;
/// Error types and result aliases for store operations
pub mod error;
/// JSON helpers with validated errors
pub mod serialization;
/// Relational read side handing over grouped factor records
pub mod source;
/// Dedicated SQLite connection thread
pub mod worker;

pub use cache::{
    BlobWrite, CacheGateway, CacheKeys, CachedState, Expect, KeyValueStore, Loaded, MemoryStore,
    SimulationData, SqliteStore, StateLoad, StateVersions, Version, VersionedBlob,
};
pub use error::{Result, StoreError};
pub use serialization::{from_json, to_json};
pub use source::{FactorSource, InMemorySource, SqliteSource};
pub use worker::{CallGuard, SqliteWorker};
