//! Live fan-out subsystem.
//!
//! # Data Flow
//! ```text
//! Viewer attaches (GET /api/events):
//!     → connection.rs (Connecting → connected event → Open)
//!     → hub.rs register
//!     → heartbeat task every stream.heartbeat_secs
//!
//! Capture:
//!     → hub.rs publish (encode once, push to every sink)
//!     → rejected push: prune + close connection
//!
//! Viewer hangs up / shutdown:
//!     → connection.rs close (cancel heartbeat, unregister, close sink)
//! ```
//!
//! # Design Decisions
//! - Sinks are non-blocking (`try_send`); a stalled viewer is dropped
//! - One teardown routine, guarded by an atomic state swap
//! - Best-effort, at-most-once delivery; no replay

pub mod connection;
pub mod event;
pub mod hub;
pub mod sink;

pub use connection::{CloseReason, ConnectionState, DisconnectGuard, SubscriberConnection, SubscriberId};
pub use event::{EventFrame, StreamEvent};
pub use hub::{BroadcastHub, PublishReport};
pub use sink::{ChannelSink, EventSink, SinkClosed};
