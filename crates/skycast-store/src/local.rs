//! Local key/value storage and the record backend built on it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use skycast_core::StoreKind;

use crate::record::{PredictionRecord, RecordId, RecordRef};
use crate::store::{remove_from, RecordStore, StoreResult};

/// String key/value map persisted as one JSON file.
///
/// Every `set_item`/`remove_item` rewrites the whole file. Clones share
/// the same in-memory map.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
    items: Arc<Mutex<BTreeMap<String, String>>>,
}

impl LocalStorage {
    /// Open the storage file, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let items = if path.exists() {
            let json = fs::read_to_string(&path)?;
            if json.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&json)?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!("Opened local storage at {:?} ({} keys)", path, items.len());
        Ok(Self {
            path,
            items: Arc::new(Mutex::new(items)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    pub fn set_item(&self, key: &str, value: impl Into<String>) -> StoreResult<()> {
        let mut items = self.items.lock();
        items.insert(key.to_string(), value.into());
        self.persist(&items)
    }

    pub fn remove_item(&self, key: &str) -> StoreResult<()> {
        let mut items = self.items.lock();
        if items.remove(key).is_some() {
            self.persist(&items)?;
        }
        Ok(())
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(items)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Record list kept under one key of a `LocalStorage`.
#[derive(Debug)]
pub struct LocalStore {
    storage: LocalStorage,
    key: String,
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(storage: LocalStorage, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    fn read(&self) -> StoreResult<Vec<PredictionRecord>> {
        match self.storage.get_item(&self.key) {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn write(&self, records: &[PredictionRecord]) -> StoreResult<()> {
        let json = serde_json::to_string(records)?;
        self.storage.set_item(&self.key, json)
    }

    /// Read, change and write back under the store's write lock.
    fn modify<T>(
        &self,
        change: impl FnOnce(&mut Vec<PredictionRecord>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let _guard = self.write_lock.lock();
        let mut records = self.read()?;
        let out = change(&mut records)?;
        self.write(&records)?;
        Ok(out)
    }
}

/// Current epoch milliseconds, bumped past every numeric id already present.
fn next_id(records: &[PredictionRecord]) -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let highest = records
        .iter()
        .filter_map(|r| r.id.as_ref().and_then(RecordId::as_number))
        .max();
    match highest {
        Some(max) if max >= now => max.saturating_add(1),
        _ => now,
    }
}

#[async_trait]
impl RecordStore for LocalStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Local
    }

    async fn fetch(&self) -> StoreResult<Vec<PredictionRecord>> {
        self.read()
    }

    async fn save(&self, records: &[PredictionRecord]) -> StoreResult<()> {
        let _guard = self.write_lock.lock();
        self.write(records)
    }

    async fn add(&self, mut record: PredictionRecord) -> StoreResult<()> {
        self.modify(|records| {
            let id = next_id(records);
            record.id = Some(RecordId::Number(id));
            records.insert(0, record);
            tracing::info!("Added prediction {} to local storage", id);
            Ok(())
        })
    }

    async fn remove(&self, target: &RecordRef) -> StoreResult<()> {
        self.modify(|records| remove_from(records, target).map(|_| ()))?;
        tracing::info!("Removed prediction {} from local storage", target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::store::StoreError;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> LocalStore {
        let storage = LocalStorage::open(dir.path().join("local_storage.json")).unwrap();
        LocalStore::new(storage, "weatherPredictions")
    }

    #[test]
    fn test_storage_persists_items() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("local_storage.json");

        let storage = LocalStorage::open(&path).unwrap();
        assert!(storage.get_item("githubToken").is_none());
        storage.set_item("githubToken", "abc").unwrap();

        let reopened = LocalStorage::open(&path).unwrap();
        assert_eq!(reopened.get_item("githubToken").as_deref(), Some("abc"));

        reopened.remove_item("githubToken").unwrap();
        assert!(LocalStorage::open(&path).unwrap().get_item("githubToken").is_none());
    }

    #[test]
    fn test_next_id_is_monotonic() {
        let mut record = PredictionRecord::new("2026-02-14", "Sunny", "21");
        let future = chrono::Utc::now().timestamp_millis() + 60_000;
        record.id = Some(RecordId::Number(future));

        assert_eq!(next_id(&[record]), future + 1);
        assert!(next_id(&[]) >= future - 60_000);
    }

    #[test]
    fn test_next_id_saturates_at_max() {
        let mut record = PredictionRecord::new("2026-02-14", "Sunny", "21");
        record.id = Some(RecordId::Number(i64::MAX));

        assert_eq!(next_id(&[record]), i64::MAX);
    }

    #[tokio::test]
    async fn test_add_assigns_increasing_ids_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        store.add(PredictionRecord::new("2026-02-14", "Sunny", "21")).await.unwrap();
        store.add(PredictionRecord::new("2026-02-15", "Cloudy", "18")).await.unwrap();

        let records = store.fetch().await.unwrap();
        assert_eq!(records[0].condition, "Cloudy");
        let newer = records[0].id.as_ref().and_then(RecordId::as_number).unwrap();
        let older = records[1].id.as_ref().and_then(RecordId::as_number).unwrap();
        assert!(newer > older);
    }

    #[tokio::test]
    async fn test_remove_by_id_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store.add(PredictionRecord::new("2026-02-14", "Sunny", "21")).await.unwrap();
        store.add(PredictionRecord::new("2026-02-15", "Stormy", "15")).await.unwrap();

        let target = store.fetch().await.unwrap()[1].reference(1);
        store.remove(&target).await.unwrap();

        let records = open(&dir).fetch().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].condition, "Stormy");
        assert!(matches!(store.remove(&target).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_missing_key_reads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(open(&dir).fetch().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_value_is_malformed() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store.storage().set_item("weatherPredictions", "{not json").unwrap();

        assert!(matches!(store.fetch().await, Err(StoreError::Malformed(_))));
        assert!(store.load().await.is_empty());
    }
}
