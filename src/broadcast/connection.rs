//! Live subscriber connection lifecycle.
//!
//! # States
//! ```text
//! Connecting ──(connected event pushed)──▶ Open ──(any trigger)──▶ Closed
//! ```
//!
//! Triggers for `Closed`: viewer disconnect, a rejected push (event or
//! heartbeat), process shutdown. Every trigger funnels into [`SubscriberConnection::close`],
//! which performs teardown exactly once.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::broadcast::event::{EventFrame, StreamEvent};
use crate::broadcast::hub::BroadcastHub;
use crate::broadcast::sink::{EventSink, SinkClosed};
use crate::capture::record::now_millis;
use crate::observability::metrics;

/// Global atomic counter for subscriber IDs.
static SUBSCRIBER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque handle of a live subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn next() -> Self {
        Self(SUBSCRIBER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }
}

/// Why a connection was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ViewerDisconnected,
    DeliveryFailed,
    HeartbeatFailed,
    Shutdown,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::ViewerDisconnected => "viewer_disconnected",
            CloseReason::DeliveryFailed => "delivery_failed",
            CloseReason::HeartbeatFailed => "heartbeat_failed",
            CloseReason::Shutdown => "shutdown",
        }
    }
}

/// One viewer's live channel.
pub struct SubscriberConnection {
    id: SubscriberId,
    sink: Arc<dyn EventSink>,
    state: AtomicU8,
    hub: Weak<BroadcastHub>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriberConnection {
    /// Attach a viewer: push `connected`, register with `hub`, start heartbeats.
    ///
    /// Fails if the sink rejects the initial acknowledgment or the hub has
    /// already been shut down; nothing is registered in either case. Must be called inside a tokio runtime.
    pub fn open(
        hub: &Arc<BroadcastHub>,
        sink: Arc<dyn EventSink>,
        heartbeat_every: Duration,
    ) -> Result<Arc<Self>, SinkClosed> {
        let conn = Arc::new(Self {
            id: SubscriberId::next(),
            sink,
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            hub: Arc::downgrade(hub),
            heartbeat: Mutex::new(None),
        });

        let ack = StreamEvent::connected().encode().map_err(|e| {
            tracing::error!(error = %e, "Failed to encode connected event");
            SinkClosed
        })?;
        if let Err(e) = conn.sink.push(&ack) {
            conn.state.store(ConnectionState::Closed as u8, Ordering::SeqCst);
            conn.sink.close();
            return Err(e);
        }

        conn.state.store(ConnectionState::Open as u8, Ordering::SeqCst);
        if let Err(e) = hub.register(Arc::clone(&conn)) {
            tracing::debug!(subscriber = %conn.id, "Hub closed, rejecting subscriber");
            conn.state.store(ConnectionState::Closed as u8, Ordering::SeqCst);
            conn.sink.close();
            return Err(e);
        }

        // Cadence is anchored to the Open transition, not to the task's first poll.
        let first_beat = Instant::now() + heartbeat_every;
        let handle = tokio::spawn(heartbeat_loop(Arc::downgrade(&conn), first_beat, heartbeat_every));
        *conn.heartbeat.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        // close() may have run before the handle was stored.
        if conn.state() == ConnectionState::Closed {
            if let Some(handle) = conn.heartbeat.lock().unwrap_or_else(PoisonError::into_inner).take() {
                handle.abort();
            }
        }

        tracing::info!(subscriber = %conn.id, "Subscriber connected");
        Ok(conn)
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Push one frame. Rejected once the connection is closed.
    pub fn deliver(&self, frame: &EventFrame) -> Result<(), SinkClosed> {
        if !self.is_open() {
            return Err(SinkClosed);
        }
        self.sink.push(frame)
    }

    /// Tear down: cancel heartbeat, unregister, release the sink.
    ///
    /// Returns `true` for the call that performed the teardown; every later
    /// or concurrent call is a no-op returning `false`.
    pub fn close(&self, reason: CloseReason) -> bool {
        let previous = self.state.swap(ConnectionState::Closed as u8, Ordering::SeqCst);
        if previous == ConnectionState::Closed as u8 {
            return false;
        }

        if let Some(handle) = self.heartbeat.lock().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
        if let Some(hub) = self.hub.upgrade() {
            hub.unregister(self.id);
        }
        self.sink.close();

        metrics::record_subscriber_closed(reason.as_str());
        tracing::info!(subscriber = %self.id, reason = reason.as_str(), "Subscriber closed");
        true
    }
}

impl fmt::Debug for SubscriberConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberConnection")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

async fn heartbeat_loop(conn: Weak<SubscriberConnection>, first: Instant, every: Duration) {
    let mut ticker = time::interval_at(first, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(conn) = conn.upgrade() else {
            break;
        };
        if !conn.is_open() {
            break;
        }

        let frame = match StreamEvent::heartbeat(now_millis()).encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode heartbeat");
                continue;
            }
        };
        if conn.deliver(&frame).is_err() {
            tracing::debug!(subscriber = %conn.id, "Heartbeat rejected");
            conn.close(CloseReason::HeartbeatFailed);
            break;
        }
    }
}

/// Closes the connection when dropped.
///
/// Owned by the transport's response stream, so a viewer hanging up (the
/// stream being dropped) runs teardown.
#[derive(Debug)]
pub struct DisconnectGuard {
    conn: Arc<SubscriberConnection>,
}

impl DisconnectGuard {
    pub fn new(conn: Arc<SubscriberConnection>) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Arc<SubscriberConnection> {
        &self.conn
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        self.conn.close(CloseReason::ViewerDisconnected);
    }
}
