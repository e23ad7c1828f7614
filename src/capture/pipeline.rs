//! End-to-end capture: normalize → persist → publish.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time;

use crate::broadcast::BroadcastHub;
use crate::capture::normalize::{normalize, RawRequest};
use crate::capture::record::{RecordId, RequestRecord};
use crate::observability::metrics;
use crate::store::{RequestStore, StoreError, StoreResult};

/// Capture failures surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// Orchestrates capture and exposes the read path.
#[derive(Clone)]
pub struct IngestionPipeline {
    store: Arc<dyn RequestStore>,
    hub: Arc<BroadcastHub>,
    store_timeout: Duration,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn RequestStore>, hub: Arc<BroadcastHub>, store_timeout: Duration) -> Self {
        Self {
            store,
            hub,
            store_timeout,
        }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn store(&self) -> &Arc<dyn RequestStore> {
        &self.store
    }

    /// Capture one request and return its id.
    ///
    /// Fails only when the record could not be stored; nothing is broadcast
    /// in that case. Subscriber delivery problems never surface here.
    pub async fn capture(&self, raw: RawRequest) -> Result<RecordId, CaptureError> {
        let start = Instant::now();
        let record = normalize(raw);
        let id = record.id.clone();

        match time::timeout(self.store_timeout, self.store.append(record.clone())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(record_id = %id, error = %e, "Failed to store captured request");
                metrics::record_capture("storage_error", start);
                return Err(CaptureError::StorageUnavailable(e.to_string()));
            }
            Err(_) => {
                tracing::error!(
                    record_id = %id,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "Storage append timed out"
                );
                metrics::record_capture("storage_timeout", start);
                return Err(CaptureError::StorageUnavailable("append timed out".to_string()));
            }
        }
        metrics::record_capture("ok", start);

        let report = self.hub.publish(&record);
        tracing::debug!(
            record_id = %id,
            method = %record.method,
            delivered = report.delivered,
            pruned = report.pruned,
            "Request captured"
        );
        Ok(id)
    }

    /// Most recent records, newest first.
    pub async fn latest(&self, limit: usize, offset: usize) -> StoreResult<Vec<RequestRecord>> {
        self.bounded(self.store.latest(limit, offset)).await
    }

    pub async fn get(&self, id: &RecordId) -> StoreResult<RequestRecord> {
        self.bounded(self.store.get(id)).await
    }

    pub async fn count(&self) -> StoreResult<usize> {
        self.bounded(self.store.len()).await
    }

    /// Full store reset.
    pub async fn clear(&self) -> StoreResult<()> {
        self.bounded(self.store.clear()).await?;
        tracing::info!("Request history cleared");
        Ok(())
    }

    async fn bounded<T>(&self, call: impl std::future::Future<Output = StoreResult<T>>) -> StoreResult<T> {
        time::timeout(self.store_timeout, call)
            .await
            .unwrap_or_else(|_| Err(StoreError::StorageUnavailable("storage call timed out".to_string())))
    }
}
