//! Integration tests for the record store backends.
//!
//! Writable backends must agree on add/remove semantics: newest first,
//! exactly one record removed, order of the rest preserved.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;

use skycast_core::{Config, StoreKind};
use skycast_store::{
    open_store, AccessRules, LocalStorage, LocalStore, PredictionRecord, RealtimeStore,
    RecordRef, RecordStore, Snapshot, StoreError,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to build a record with a distinct condition and timestamp
fn record(condition: &str, minute: u32) -> PredictionRecord {
    let mut record = PredictionRecord::new("2026-2-14", condition, "12");
    record.notes = format!("{} notes", condition);
    record.author = Some("admin".into());
    record.timestamp = Some(
        chrono::DateTime::parse_from_rfc3339(&format!("2026-02-14T10:{:02}:00Z", minute))
            .unwrap()
            .with_timezone(&chrono::Utc),
    );
    record
}

fn writable_stores(dir: &TempDir) -> Vec<Arc<dyn RecordStore>> {
    let storage = LocalStorage::open(dir.path().join("local_storage.json")).unwrap();
    vec![
        Arc::new(LocalStore::new(storage, "weatherPredictions")),
        Arc::new(RealtimeStore::open(dir.path().join("realtime.db"), AccessRules::default()).unwrap()),
    ]
}

fn conditions(records: &[PredictionRecord]) -> Vec<&str> {
    records.iter().map(|r| r.condition.as_str()).collect()
}

#[tokio::test]
async fn test_add_then_remove_across_backends() {
    let dir = TempDir::new().unwrap();

    for store in writable_stores(&dir) {
        store.add(record("Sunny", 1)).await.unwrap();
        store.add(record("Cloudy", 2)).await.unwrap();
        store.add(record("Rainy", 3)).await.unwrap();

        let records = store.load().await;
        assert_eq!(conditions(&records), vec!["Rainy", "Cloudy", "Sunny"], "{}", store.kind());
        assert!(records.iter().all(|r| r.id.is_some()));

        let middle = records[1].reference(1);
        store.remove(&middle).await.unwrap();

        let records = store.load().await;
        assert_eq!(conditions(&records), vec!["Rainy", "Sunny"], "{}", store.kind());
        assert_eq!(records[1].notes, "Sunny notes");
    }
}

#[tokio::test]
async fn test_remove_unknown_target_changes_nothing() {
    let dir = TempDir::new().unwrap();

    for store in writable_stores(&dir) {
        store.add(record("Windy", 5)).await.unwrap();
        let result = store.remove(&RecordRef::Index(7)).await;

        assert!(matches!(result, Err(StoreError::NotFound(_))), "{}", store.kind());
        assert_eq!(store.load().await.len(), 1);
    }
}

#[tokio::test]
async fn test_realtime_subscription_follows_writes() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.config_dir = dir.path().to_path_buf();
    config.store.kind = StoreKind::Realtime;

    let store = open_store(&config).unwrap();
    let mut rx = store.subscribe().unwrap();

    store.add(record("Snowy", 9)).await.unwrap();
    rx.changed().await.unwrap();

    let snapshot = rx.borrow().clone();
    match snapshot {
        Snapshot::Records(records) => assert_eq!(conditions(&records), vec!["Snowy"]),
        other => panic!("unexpected snapshot {:?}", other),
    }
}

#[tokio::test]
async fn test_static_file_served_over_http() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/board/data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"date": "2026-02-14", "toDate": "2026-02-16", "condition": "Stormy", "temperature": 14, "notes": "Gusts"}
        ])))
        .mount(&mock_server)
        .await;

    let mut config = Config::default();
    config.store.kind = StoreKind::StaticFile;
    config.store.static_file.base_url = format!("{}/board", mock_server.uri());

    let store = open_store(&config).unwrap();
    let records = store.load().await;

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].to_date.as_deref(), Some("2026-02-16"));
    assert!(matches!(
        store.add(record("Sunny", 0)).await,
        Err(StoreError::ReadOnly)
    ));
}
