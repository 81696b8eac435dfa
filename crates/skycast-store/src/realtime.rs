//! Document-collection backend with push snapshots.
//!
//! Each record is one document in a SQLite table. After every change the
//! full ordered collection is re-published on a watch channel, so
//! subscribers always hold the complete current list.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use skycast_core::{RealtimeConfig, StoreKind};
use tokio::sync::watch;

use crate::record::{PredictionRecord, RecordId, RecordRef};
use crate::store::{RecordStore, Snapshot, SnapshotReceiver, StoreError, StoreResult};

const DENIED_MESSAGE: &str = "Missing or insufficient permissions.";

/// Collection security rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRules {
    pub allow_read: bool,
    pub allow_write: bool,
}

impl Default for AccessRules {
    fn default() -> Self {
        Self {
            allow_read: true,
            allow_write: true,
        }
    }
}

impl From<&RealtimeConfig> for AccessRules {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            allow_read: config.allow_read,
            allow_write: config.allow_write,
        }
    }
}

/// The SQLite document table.
struct Collection {
    conn: Connection,
}

impl Collection {
    fn new(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_timestamp ON documents(timestamp DESC);
            "#,
        )?;
        Ok(Self { conn })
    }

    /// All documents, newest first.
    fn list(&self) -> StoreResult<Vec<PredictionRecord>> {
        let rows: Vec<(String, String, String)> = self
            .conn
            .prepare("SELECT id, body, timestamp FROM documents ORDER BY timestamp DESC, rowid DESC")?
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, body, timestamp)| -> StoreResult<PredictionRecord> {
                let mut record: PredictionRecord = serde_json::from_str(&body)?;
                record.id = Some(RecordId::Text(id));
                record.timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc));
                Ok(record)
            })
            .collect()
    }

    fn insert(&self, mut record: PredictionRecord) -> StoreResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let timestamp = record
            .timestamp
            .take()
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        record.id = None;
        let body = serde_json::to_string(&record)?;

        self.conn.execute(
            "INSERT INTO documents (id, body, timestamp) VALUES (?1, ?2, ?3)",
            params![id, body, timestamp],
        )?;
        Ok(id)
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        let affected = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StoreError::not_found(format!("document {}", id)));
        }
        Ok(())
    }

    /// Resolve a reference to a document id against the ordered collection.
    fn resolve(&self, target: &RecordRef) -> StoreResult<String> {
        match target {
            RecordRef::Id(id) => Ok(id.to_string()),
            RecordRef::Index(index) => self
                .list()?
                .into_iter()
                .nth(*index)
                .and_then(|r| r.id)
                .map(|id| id.to_string())
                .ok_or_else(|| StoreError::not_found(target.to_string())),
        }
    }
}

/// Realtime document collection.
pub struct RealtimeStore {
    collection: Arc<Mutex<Collection>>,
    rules: AccessRules,
    snapshots: Arc<watch::Sender<Snapshot>>,
}

impl RealtimeStore {
    /// Open (or create) the collection database at `path`.
    pub fn open<P: AsRef<Path>>(path: P, rules: AccessRules) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref())?;
        tracing::info!("Opened realtime collection at {:?}", path.as_ref());
        Self::with_connection(conn, rules)
    }

    pub fn open_in_memory(rules: AccessRules) -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, rules)
    }

    fn with_connection(conn: Connection, rules: AccessRules) -> StoreResult<Self> {
        let collection = Collection::new(conn)?;
        let initial = if rules.allow_read {
            Snapshot::Records(collection.list()?)
        } else {
            Snapshot::Denied(DENIED_MESSAGE.to_string())
        };
        let (sender, _) = watch::channel(initial);

        Ok(Self {
            collection: Arc::new(Mutex::new(collection)),
            rules,
            snapshots: Arc::new(sender),
        })
    }

    fn publish(&self, records: Vec<PredictionRecord>) {
        let snapshot = if self.rules.allow_read {
            Snapshot::Records(records)
        } else {
            Snapshot::Denied(DENIED_MESSAGE.to_string())
        };
        self.snapshots.send_replace(snapshot);
    }

    fn check_write(&self) -> StoreResult<()> {
        if self.rules.allow_write {
            Ok(())
        } else {
            Err(StoreError::PermissionDenied(DENIED_MESSAGE.to_string()))
        }
    }
}

#[async_trait]
impl RecordStore for RealtimeStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Realtime
    }

    async fn fetch(&self) -> StoreResult<Vec<PredictionRecord>> {
        if !self.rules.allow_read {
            return Err(StoreError::PermissionDenied(DENIED_MESSAGE.to_string()));
        }
        let collection = self.collection.clone();
        tokio::task::spawn_blocking(move || collection.lock().list()).await?
    }

    async fn add(&self, record: PredictionRecord) -> StoreResult<()> {
        self.check_write()?;
        let collection = self.collection.clone();
        let (id, records) = tokio::task::spawn_blocking(move || {
            let collection = collection.lock();
            let id = collection.insert(record)?;
            Ok::<_, StoreError>((id, collection.list()?))
        })
        .await??;

        tracing::info!("Added document {}", id);
        self.publish(records);
        Ok(())
    }

    async fn remove(&self, target: &RecordRef) -> StoreResult<()> {
        self.check_write()?;
        let collection = self.collection.clone();
        let target = target.clone();
        let (id, records) = tokio::task::spawn_blocking(move || {
            let collection = collection.lock();
            let id = collection.resolve(&target)?;
            collection.delete(&id)?;
            Ok::<_, StoreError>((id, collection.list()?))
        })
        .await??;

        tracing::info!("Removed document {}", id);
        self.publish(records);
        Ok(())
    }

    fn subscribe(&self) -> Option<SnapshotReceiver> {
        Some(self.snapshots.subscribe())
    }
}
