//! Store setup and teardown around the server's lifetime.
//!
//! # Responsibilities
//! - Open the request store (from snapshot when configured)
//! - Persist the store after the server has stopped

use std::path::Path;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::store::snapshot::{load_store, save_store};
use crate::store::MemoryStore;

/// Open the request store described by `config`.
pub fn open_store(config: &StoreConfig) -> std::io::Result<Arc<MemoryStore>> {
    let store = match &config.snapshot_path {
        Some(path) => load_store(Path::new(path), config.max_records)?,
        None => MemoryStore::new(config.max_records),
    };
    tracing::info!(
        max_records = config.max_records,
        snapshot = config.snapshot_path.as_deref().unwrap_or("none"),
        "Request store ready"
    );
    Ok(Arc::new(store))
}

/// Write the store back to its snapshot file, if one is configured.
pub fn persist_store(store: &MemoryStore, config: &StoreConfig) -> std::io::Result<()> {
    match &config.snapshot_path {
        Some(path) => save_store(store, Path::new(path)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{RecordBody, RecordId, RequestRecord};
    use crate::store::RequestStore;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn store_round_trips_through_configured_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            snapshot_path: Some(dir.path().join("snap.json").to_string_lossy().into_owned()),
            ..StoreConfig::default()
        };

        let store = open_store(&config).unwrap();
        store
            .append(RequestRecord {
                id: RecordId::from("keep"),
                timestamp: 1,
                method: "GET".into(),
                url: "http://h/api/echo".into(),
                headers: BTreeMap::new(),
                body: RecordBody::Absent,
            })
            .await
            .unwrap();
        persist_store(&store, &config).unwrap();

        let reopened = open_store(&config).unwrap();
        assert!(reopened.get(&RecordId::from("keep")).await.is_ok());
    }

    #[test]
    fn no_snapshot_path_is_noop() {
        let config = StoreConfig::default();
        let store = open_store(&config).unwrap();
        assert!(persist_store(&store, &config).is_ok());
    }
}
