//! JSON snapshot persistence for the in-process store.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::capture::record::RequestRecord;
use crate::store::MemoryStore;

/// Load a store from `path`, or an empty one when the file does not exist.
pub fn load_store(path: &Path, max_records: usize) -> std::io::Result<MemoryStore> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "No snapshot found, starting empty");
        return Ok(MemoryStore::new(max_records));
    }

    let file = File::open(path)?;
    let records: Vec<RequestRecord> = serde_json::from_reader(BufReader::new(file))?;
    tracing::info!(path = %path.display(), records = records.len(), "Loaded request snapshot");
    Ok(MemoryStore::with_records(max_records, records))
}

/// Write every record, oldest first, to `path`.
pub fn save_store(store: &MemoryStore, path: &Path) -> std::io::Result<()> {
    let records = store
        .snapshot()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    let tmp = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut writer, &records)?;
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;

    tracing::info!(path = %path.display(), records = records.len(), "Saved request snapshot");
    Ok(())
}
