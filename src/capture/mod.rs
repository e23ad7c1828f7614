//! Request capture subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (any method, /api/echo/*)
//!     → normalize.rs (timestamp, id, headers, URL, body decoding)
//!     → RequestRecord (record.rs)
//!     → pipeline.rs: RequestStore::append (bounded by store.timeout_ms)
//!     → pipeline.rs: BroadcastHub::publish (best effort)
//!     → record id acknowledged to the caller
//! ```
//!
//! # Design Decisions
//! - Normalization cannot fail; bad payloads become a placeholder body
//! - Storage failure aborts the capture before anything is broadcast
//! - Subscriber delivery is never awaited by the capture caller

pub mod normalize;
pub mod pipeline;
pub mod record;

pub use normalize::{RawBody, RawRequest};
pub use pipeline::{CaptureError, IngestionPipeline};
pub use record::{RecordBody, RecordId, RequestRecord, DECODE_FAILED_PLACEHOLDER};
