//! Push-side abstraction over a subscriber's transport.

use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::broadcast::event::EventFrame;

/// The transport rejected a push; the subscriber is gone or not draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("subscriber sink closed")]
pub struct SinkClosed;

/// Where events for one subscriber are pushed.
///
/// `push` must never wait on the consumer.
pub trait EventSink: Send + Sync {
    fn push(&self, frame: &EventFrame) -> Result<(), SinkClosed>;

    /// Release the transport. Idempotent.
    fn close(&self);
}

/// Bounded in-memory channel feeding a streaming response.
///
/// A full buffer counts as a rejected push, so a stalled viewer is pruned
/// instead of growing memory without bound.
pub struct ChannelSink {
    tx: Mutex<Option<mpsc::Sender<EventFrame>>>,
}

impl ChannelSink {
    /// Create a sink and the receiver the transport drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EventFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl EventSink for ChannelSink {
    fn push(&self, frame: &EventFrame) -> Result<(), SinkClosed> {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            return Err(SinkClosed);
        };
        tx.try_send(frame.clone()).map_err(|e| {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    tracing::debug!("Subscriber buffer full, rejecting push")
                }
                mpsc::error::TrySendError::Closed(_) => {
                    tracing::debug!("Subscriber receiver dropped, rejecting push")
                }
            }
            SinkClosed
        })
    }

    fn close(&self) {
        // Dropping the sender ends the receiver once it drains.
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}
