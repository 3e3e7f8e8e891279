use crate::foundation::database::CacheEntry;
use crate::foundation::models::Period;
use sled::Db;
use std::collections::HashMap;
use std::io;
use std::sync::RwLock;

/// Key-value storage for cached genre distributions.
///
/// Every write replaces the whole entry for a key, so readers never observe a
/// partially written record.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<CacheEntry>>;
    fn set(&self, key: &str, entry: &CacheEntry) -> io::Result<()>;
}

/// Builds the storage key for a period, e.g. `genres-cache-7day`.
pub fn cache_key(period: Period) -> String {
    format!("genres-cache-{}", period.as_str())
}

/// Opens a database at the specified path.
///
/// This function creates a new database or opens an existing one at the given path.
/// It's a friendly wrapper around `sled::open` that converts the error to a standard
/// IO error for easier error handling.
///
/// # Examples
///
/// ```no_run
/// use genrefm::open_database;
/// let db = open_database("/path/to/my/database")?;
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn open_database(path: &str) -> io::Result<Db> {
    sled::open(path).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

/// File-backed store. Entries are kept as JSON records, the same shape the
/// `/genre-analysis` consumer persists: `{"data": [...], "timestamp": 0}`.
pub struct SledStore {
    db: Db,
}

impl SledStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn open(path: &str) -> io::Result<Self> {
        open_database(path).map(Self::new)
    }
}

impl CacheStore for SledStore {
    fn get(&self, key: &str) -> io::Result<Option<CacheEntry>> {
        self.db
            .get(key.as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?
            .map(|ivec| {
                serde_json::from_slice(&ivec)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
            })
            .transpose()
    }

    fn set(&self, key: &str, entry: &CacheEntry) -> io::Result<()> {
        let serialized = serde_json::to_vec(entry)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        self.db
            .insert(key.as_bytes(), serialized)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        Ok(())
    }
}

/// Process-local store, lost on exit.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<CacheEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, entry: &CacheEntry) -> io::Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory store lock poisoned"))?;
        entries.insert(key.to_string(), entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::models::Genre;
    use tempfile::tempdir;

    fn sample_entry(timestamp: u64) -> CacheEntry {
        CacheEntry::new(
            vec![Genre::new("rock", 800.0), Genre::new("jazz", 120.5)],
            timestamp,
        )
    }

    #[test]
    fn test_cache_key_uses_period_name() {
        assert_eq!(cache_key(Period::SevenDay), "genres-cache-7day");
        assert_eq!(cache_key(Period::Overall), "genres-cache-overall");
    }

    #[test]
    fn test_open_database() {
        let temp_dir = tempdir().unwrap();
        let binding = temp_dir.path().join("test_db");
        let db_path = binding.to_str().unwrap();

        let result = open_database(db_path);
        assert!(result.is_ok());
    }

    #[test]
    fn test_sled_store_set_and_get() {
        let temp_dir = tempdir().unwrap();
        let binding = temp_dir.path().join("test_db");
        let store = SledStore::open(binding.to_str().unwrap()).unwrap();

        let entry = sample_entry(1_700_000_000_000);
        store.set("genres-cache-1month", &entry).unwrap();

        let fetched = store.get("genres-cache-1month").unwrap();
        assert_eq!(fetched, Some(entry));
    }

    #[test]
    fn test_sled_store_missing_key() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = SledStore::new(db);

        assert!(store.get("genres-cache-7day").unwrap().is_none());
    }

    #[test]
    fn test_sled_store_overwrites_whole_entry() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = SledStore::new(db);

        store.set("k", &sample_entry(1)).unwrap();
        let replacement = CacheEntry::new(vec![Genre::new("ambient", 3.0)], 2);
        store.set("k", &replacement).unwrap();

        assert_eq!(store.get("k").unwrap(), Some(replacement));
    }

    #[test]
    fn test_sled_store_records_are_json() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = SledStore::new(db.clone());

        store.set("k", &sample_entry(42)).unwrap();

        let raw = db.get("k").unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["timestamp"], 42);
        assert_eq!(value["data"][0]["name"], "rock");
    }

    #[test]
    fn test_sled_store_corrupt_record_is_an_error() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        db.insert("k", b"not json".to_vec()).unwrap();
        let store = SledStore::new(db);

        let err = store.get("k").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_memory_store_set_and_get() {
        let store = MemoryStore::new();
        assert!(store.get("k").unwrap().is_none());

        store.set("k", &sample_entry(5)).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(sample_entry(5)));
    }
}
