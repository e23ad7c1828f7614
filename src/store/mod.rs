//! Request history storage subsystem.
//!
//! # Data Flow
//! ```text
//! IngestionPipeline
//!     → RequestStore::append (ordered index + payload map, one critical section)
//!
//! History endpoints
//!     → RequestStore::latest / get (ranked retrieval, newest first)
//!
//! Startup / shutdown
//!     → snapshot.rs (optional JSON file, loaded then written back)
//! ```
//!
//! # Design Decisions
//! - The store is reached only through the `RequestStore` trait
//! - Index and payload map never disagree: both change under one lock
//! - Retention is explicit (`store.max_records`), unbounded by default

pub mod memory;
pub mod snapshot;

use async_trait::async_trait;
use thiserror::Error;

use crate::capture::record::{RecordId, RequestRecord};

pub use memory::MemoryStore;

/// Errors surfaced by a [`RequestStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing store could not serve the call.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// No record exists for the id.
    #[error("record not found: {0}")]
    NotFound(RecordId),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Append-only, ranked collection of captured requests.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Add a record. All-or-nothing.
    async fn append(&self, record: RequestRecord) -> StoreResult<()>;

    /// Up to `limit` records, newest first, skipping `offset` from the head.
    async fn latest(&self, limit: usize, offset: usize) -> StoreResult<Vec<RequestRecord>>;

    /// Fetch one record by id.
    async fn get(&self, id: &RecordId) -> StoreResult<RequestRecord>;

    /// Number of stored records.
    async fn len(&self) -> StoreResult<usize>;

    /// Drop every record.
    async fn clear(&self) -> StoreResult<()>;
}
