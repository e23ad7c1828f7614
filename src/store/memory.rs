//! In-process sorted store.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::capture::record::{RecordId, RequestRecord};
use crate::observability::metrics;
use crate::store::{RequestStore, StoreError, StoreResult};

/// Rank key: timestamp first, insertion sequence breaks ties.
type RankKey = (i64, u64);

#[derive(Default)]
struct Inner {
    index: BTreeMap<RankKey, RecordId>,
    records: HashMap<RecordId, (RankKey, RequestRecord)>,
    next_seq: u64,
}

impl Inner {
    /// Returns `false`, leaving the stored record untouched, if the id is taken.
    fn insert(&mut self, record: RequestRecord) -> bool {
        if self.records.contains_key(&record.id) {
            return false;
        }
        let key = (record.timestamp, self.next_seq);
        self.next_seq += 1;

        self.index.insert(key, record.id.clone());
        self.records.insert(record.id.clone(), (key, record));
        true
    }

    fn evict_to(&mut self, max_records: usize) -> usize {
        let mut evicted = 0;
        while self.index.len() > max_records {
            let Some((_, id)) = self.index.pop_first() else {
                break;
            };
            self.records.remove(&id);
            evicted += 1;
        }
        evicted
    }
}

/// Ordered index plus payload map behind a single lock.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    /// `0` means unbounded.
    max_records: usize,
}

impl MemoryStore {
    pub fn new(max_records: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_records,
        }
    }

    /// Build a store pre-populated with `records` (any order).
    pub fn with_records(max_records: usize, records: Vec<RequestRecord>) -> Self {
        let store = Self::new(max_records);
        {
            let mut inner = store.inner.write().unwrap_or_else(|e| e.into_inner());
            let mut records = records;
            records.sort_by_key(|r| r.timestamp);
            for record in records {
                let id = record.id.clone();
                if !inner.insert(record) {
                    tracing::warn!(record_id = %id, "Duplicate record id in snapshot, keeping first");
                }
            }
            if max_records > 0 {
                inner.evict_to(max_records);
            }
        }
        store
    }

    /// Every record, oldest first.
    pub fn snapshot(&self) -> StoreResult<Vec<RequestRecord>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner
            .index
            .values()
            .filter_map(|id| inner.records.get(id).map(|(_, r)| r.clone()))
            .collect())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(0)
    }
}

fn poisoned() -> StoreError {
    StoreError::StorageUnavailable("store lock poisoned".to_string())
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn append(&self, record: RequestRecord) -> StoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        let id = record.id.clone();
        if !inner.insert(record) {
            tracing::warn!(record_id = %id, "Record id already stored, keeping original");
            return Ok(());
        }
        if self.max_records > 0 {
            let evicted = inner.evict_to(self.max_records);
            if evicted > 0 {
                tracing::debug!(evicted, max_records = self.max_records, "Evicted oldest records");
            }
        }
        metrics::record_stored_records(inner.index.len());
        Ok(())
    }

    async fn latest(&self, limit: usize, offset: usize) -> StoreResult<Vec<RequestRecord>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner
            .index
            .values()
            .rev()
            .skip(offset)
            .take(limit)
            .filter_map(|id| inner.records.get(id).map(|(_, r)| r.clone()))
            .collect())
    }

    async fn get(&self, id: &RecordId) -> StoreResult<RequestRecord> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        inner
            .records
            .get(id)
            .map(|(_, r)| r.clone())
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn len(&self) -> StoreResult<usize> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.index.len())
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        inner.index.clear();
        inner.records.clear();
        metrics::record_stored_records(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::record::RecordBody;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn record(id: &str, timestamp: i64) -> RequestRecord {
        RequestRecord {
            id: RecordId::from(id),
            timestamp,
            method: "GET".into(),
            url: format!("http://localhost/api/echo/{id}"),
            headers: BTreeMap::new(),
            body: RecordBody::Absent,
        }
    }

    fn ids(records: &[RequestRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn latest_is_newest_first_with_insertion_tiebreak() {
        let store = MemoryStore::default();
        store.append(record("a", 10)).await.unwrap();
        store.append(record("b", 30)).await.unwrap();
        store.append(record("c", 20)).await.unwrap();
        store.append(record("d", 30)).await.unwrap();

        let latest = store.latest(10, 0).await.unwrap();
        assert_eq!(ids(&latest), vec!["d", "b", "c", "a"]);
        assert!(latest.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[tokio::test]
    async fn latest_honours_limit_and_offset() {
        let store = MemoryStore::default();
        for i in 0..10 {
            store.append(record(&format!("r{i}"), i)).await.unwrap();
        }

        assert_eq!(ids(&store.latest(3, 0).await.unwrap()), vec!["r9", "r8", "r7"]);
        assert_eq!(ids(&store.latest(3, 8).await.unwrap()), vec!["r1", "r0"]);
        assert!(store.latest(3, 20).await.unwrap().is_empty());
        assert!(store.latest(0, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_after_append_returns_identical_record() {
        let store = MemoryStore::default();
        let original = record("x", 42);
        store.append(original.clone()).await.unwrap();

        assert_eq!(store.get(&RecordId::from("x")).await.unwrap(), original);
        assert_eq!(
            store.get(&RecordId::from("missing")).await.unwrap_err(),
            StoreError::NotFound(RecordId::from("missing"))
        );
    }

    #[tokio::test]
    async fn retention_bound_evicts_oldest() {
        let store = MemoryStore::new(3);
        for i in 0..5 {
            store.append(record(&format!("r{i}"), i)).await.unwrap();
        }

        assert_eq!(store.len().await.unwrap(), 3);
        assert_eq!(ids(&store.latest(10, 0).await.unwrap()), vec!["r4", "r3", "r2"]);
        assert!(store.get(&RecordId::from("r0")).await.is_err());
    }

    #[tokio::test]
    async fn clear_empties_both_structures() {
        let store = MemoryStore::default();
        store.append(record("a", 1)).await.unwrap();
        store.clear().await.unwrap();

        assert_eq!(store.len().await.unwrap(), 0);
        assert!(store.latest(10, 0).await.unwrap().is_empty());
        assert!(store.get(&RecordId::from("a")).await.is_err());
    }

    #[tokio::test]
    async fn duplicate_id_keeps_stored_record() {
        let store = MemoryStore::default();
        store.append(record("a", 1)).await.unwrap();
        store.append(record("b", 2)).await.unwrap();
        let mut replacement = record("a", 3);
        replacement.method = "DELETE".into();
        store.append(replacement).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 2);
        let kept = store.get(&RecordId::from("a")).await.unwrap();
        assert_eq!(kept.timestamp, 1);
        assert_ne!(kept.method, "DELETE");
        let ids: Vec<String> = store
            .latest(10, 0)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id.to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn with_records_sorts_and_bounds() {
        let store = MemoryStore::with_records(2, vec![record("b", 2), record("c", 3), record("a", 1)]);
        assert_eq!(ids(&store.snapshot().unwrap()), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn concurrent_appends_are_all_visible() {
        let store = Arc::new(MemoryStore::default());
        let mut tasks = Vec::new();
        for t in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..50 {
                    store.append(record(&format!("t{t}-{i}"), i)).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let all = store.latest(1000, 0).await.unwrap();
        assert_eq!(all.len(), 400);
        for r in &all {
            assert_eq!(store.get(&r.id).await.unwrap(), *r);
        }
    }
}
