//! Fan-out of captured requests to live subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::broadcast::connection::{CloseReason, SubscriberConnection, SubscriberId};
use crate::broadcast::event::StreamEvent;
use crate::broadcast::sink::{EventSink, SinkClosed};
use crate::capture::record::RequestRecord;
use crate::observability::metrics;

/// Outcome of one [`BroadcastHub::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub pruned: usize,
}

/// Registry of live subscribers.
///
/// Every register, unregister and publish iteration runs under one lock,
/// which also fixes a single global publish order seen by all subscribers.
/// The lock is never held across an await or while tearing a connection down.
///
/// Once [`BroadcastHub::close_all`] has run the hub accepts no new subscribers.
#[derive(Default)]
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberId, Arc<SubscriberConnection>>>,
    /// Only read or written with `subscribers` locked.
    closed: AtomicBool,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, Arc<SubscriberConnection>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a new subscriber on `sink` and register it.
    pub fn connect(
        self: &Arc<Self>,
        sink: Arc<dyn EventSink>,
        heartbeat_every: Duration,
    ) -> Result<Arc<SubscriberConnection>, SinkClosed> {
        SubscriberConnection::open(self, sink, heartbeat_every)
    }

    /// Add a connection to the live set. Re-registering replaces the entry.
    ///
    /// Rejected after [`BroadcastHub::close_all`]; the caller owns teardown.
    pub fn register(&self, conn: Arc<SubscriberConnection>) -> Result<(), SinkClosed> {
        let count = {
            let mut subscribers = self.lock();
            if self.closed.load(Ordering::SeqCst) {
                return Err(SinkClosed);
            }
            subscribers.insert(conn.id(), conn);
            subscribers.len()
        };
        metrics::record_active_subscribers(count);
        Ok(())
    }

    /// Remove a connection. Unknown ids are ignored.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let (removed, count) = {
            let mut subscribers = self.lock();
            let removed = subscribers.remove(&id).is_some();
            (removed, subscribers.len())
        };
        if removed {
            metrics::record_active_subscribers(count);
        }
        removed
    }

    /// Push a `new-request` event to every live subscriber.
    ///
    /// Never waits on a subscriber. Subscribers whose push is rejected are
    /// removed and closed once the iteration completes.
    pub fn publish(&self, record: &RequestRecord) -> PublishReport {
        let frame = match StreamEvent::new_request(record).encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(record_id = %record.id, error = %e, "Failed to encode event");
                return PublishReport::default();
            }
        };

        let mut report = PublishReport::default();
        let (dead, remaining) = {
            let mut subscribers = self.lock();
            let mut dead = Vec::new();
            for conn in subscribers.values() {
                match conn.deliver(&frame) {
                    Ok(()) => report.delivered += 1,
                    Err(SinkClosed) => dead.push(Arc::clone(conn)),
                }
            }
            for conn in &dead {
                subscribers.remove(&conn.id());
            }
            (dead, subscribers.len())
        };

        report.pruned = dead.len();
        for conn in dead {
            tracing::debug!(subscriber = %conn.id(), record_id = %record.id, "Pruning dead subscriber");
            conn.close(CloseReason::DeliveryFailed);
        }

        metrics::record_event_published(report.delivered);
        if report.pruned > 0 {
            metrics::record_active_subscribers(remaining);
        }
        report
    }

    /// Close every subscriber and stop accepting new ones. Used at process shutdown.
    pub fn close_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut subscribers = self.lock();
            self.closed.store(true, Ordering::SeqCst);
            subscribers.drain().map(|(_, conn)| conn).collect()
        };
        metrics::record_active_subscribers(0);
        let count = drained.len();
        for conn in drained {
            conn.close(CloseReason::Shutdown);
        }
        if count > 0 {
            tracing::info!(subscribers = count, "Closed all subscribers");
        }
        count
    }

    pub fn is_closed(&self) -> bool {
        let _subscribers = self.lock();
        self.closed.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.lock().contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::connection::ConnectionState;
    use crate::broadcast::sink::ChannelSink;
    use crate::broadcast::test_support::RecordingSink;
    use crate::capture::record::{RecordBody, RecordId};
    use serde_json::Value;
    use std::collections::BTreeMap;

    const HEARTBEAT: Duration = Duration::from_secs(30);

    fn record(id: &str) -> RequestRecord {
        RequestRecord {
            id: RecordId::from(id),
            timestamp: 1,
            method: "POST".into(),
            url: "http://localhost/api/echo/x".into(),
            headers: BTreeMap::new(),
            body: RecordBody::Absent,
        }
    }

    fn new_request_ids(sink: &RecordingSink) -> Vec<String> {
        sink.frames()
            .iter()
            .map(|f| serde_json::from_str::<Value>(f.as_str()).unwrap())
            .filter(|v| v["type"] == "new-request")
            .map(|v| v["data"]["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn publish_reaches_every_live_subscriber() {
        let hub = Arc::new(BroadcastHub::new());
        let sinks: Vec<_> = (0..3).map(|_| Arc::new(RecordingSink::default())).collect();
        for sink in &sinks {
            hub.connect(sink.clone(), HEARTBEAT).unwrap();
        }

        let report = hub.publish(&record("r1"));
        assert_eq!(report, PublishReport { delivered: 3, pruned: 0 });
        for sink in &sinks {
            assert_eq!(new_request_ids(sink), vec!["r1"]);
        }
    }

    #[tokio::test]
    async fn disconnected_subscriber_sees_nothing() {
        let hub = Arc::new(BroadcastHub::new());
        let stays = Arc::new(RecordingSink::default());
        let leaves = Arc::new(RecordingSink::default());
        hub.connect(stays.clone(), HEARTBEAT).unwrap();
        let gone = hub.connect(leaves.clone(), HEARTBEAT).unwrap();

        gone.close(CloseReason::ViewerDisconnected);
        hub.publish(&record("r1"));

        assert_eq!(new_request_ids(&stays), vec!["r1"]);
        assert!(new_request_ids(&leaves).is_empty());
    }

    #[tokio::test]
    async fn dead_subscriber_is_pruned_and_skipped_afterwards() {
        let hub = Arc::new(BroadcastHub::new());
        let healthy = Arc::new(RecordingSink::default());
        let broken = Arc::new(RecordingSink::default());
        hub.connect(healthy.clone(), HEARTBEAT).unwrap();
        let dead = hub.connect(broken.clone(), HEARTBEAT).unwrap();

        broken.fail();
        let first = hub.publish(&record("r1"));
        assert_eq!(first, PublishReport { delivered: 1, pruned: 1 });
        assert!(!hub.contains(dead.id()));
        assert_eq!(dead.state(), ConnectionState::Closed);
        assert_eq!(broken.close_count(), 1);

        let attempts_before = broken.push_attempts();
        let second = hub.publish(&record("r2"));
        assert_eq!(second, PublishReport { delivered: 1, pruned: 0 });
        assert_eq!(broken.push_attempts(), attempts_before);
        assert_eq!(new_request_ids(&healthy), vec!["r1", "r2"]);
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_block_publish() {
        let hub = Arc::new(BroadcastHub::new());
        // Capacity 1 is consumed by the connected event and never drained.
        let (slow, _slow_rx) = ChannelSink::channel(1);
        let (fast, mut fast_rx) = ChannelSink::channel(16);
        hub.connect(Arc::new(slow), HEARTBEAT).unwrap();
        hub.connect(Arc::new(fast), HEARTBEAT).unwrap();

        let report = hub.publish(&record("r1"));
        assert_eq!(report, PublishReport { delivered: 1, pruned: 1 });
        assert_eq!(hub.subscriber_count(), 1);

        fast_rx.recv().await.unwrap();
        let event: Value = serde_json::from_str(fast_rx.recv().await.unwrap().as_str()).unwrap();
        assert_eq!(event["data"]["id"], "r1");
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let hub = Arc::new(BroadcastHub::new());
        let a = Arc::new(RecordingSink::default());
        let b = Arc::new(RecordingSink::default());
        hub.connect(a.clone(), HEARTBEAT).unwrap();
        hub.connect(b.clone(), HEARTBEAT).unwrap();

        for i in 0..20 {
            hub.publish(&record(&format!("r{i}")));
        }

        let expected: Vec<String> = (0..20).map(|i| format!("r{i}")).collect();
        assert_eq!(new_request_ids(&a), expected);
        assert_eq!(new_request_ids(&b), expected);
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let hub = Arc::new(BroadcastHub::new());
        let conn = hub.connect(Arc::new(RecordingSink::default()), HEARTBEAT).unwrap();

        assert!(hub.unregister(conn.id()));
        assert!(!hub.unregister(conn.id()));
        assert!(!hub.unregister(SubscriberId::next()));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn close_all_closes_every_connection() {
        let hub = Arc::new(BroadcastHub::new());
        let conns: Vec<_> = (0..4)
            .map(|_| hub.connect(Arc::new(RecordingSink::default()), HEARTBEAT).unwrap())
            .collect();

        assert_eq!(hub.close_all(), 4);
        assert_eq!(hub.subscriber_count(), 0);
        assert!(conns.iter().all(|c| c.state() == ConnectionState::Closed));
        assert_eq!(hub.close_all(), 0);
    }

    #[tokio::test]
    async fn connect_after_close_all_is_rejected() {
        let hub = Arc::new(BroadcastHub::new());
        hub.close_all();
        assert!(hub.is_closed());

        let sink = Arc::new(RecordingSink::default());
        let result = hub.connect(sink.clone(), HEARTBEAT);

        assert_eq!(result.unwrap_err(), SinkClosed);
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(sink.close_count(), 1);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_noop() {
        let hub = BroadcastHub::new();
        assert_eq!(hub.publish(&record("r1")), PublishReport::default());
    }

    #[tokio::test]
    async fn concurrent_register_and_publish_keep_set_consistent() {
        let hub = Arc::new(BroadcastHub::new());
        let mut tasks = Vec::new();
        for i in 0..8 {
            let hub = hub.clone();
            tasks.push(tokio::spawn(async move {
                for j in 0..25 {
                    let conn = hub.connect(Arc::new(RecordingSink::default()), HEARTBEAT).unwrap();
                    hub.publish(&record(&format!("r{i}-{j}")));
                    if j % 2 == 0 {
                        conn.close(CloseReason::ViewerDisconnected);
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // 8 tasks × 12 odd iterations stay connected.
        assert_eq!(hub.subscriber_count(), 8 * 12);
    }
}
