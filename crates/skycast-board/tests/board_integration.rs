//! End-to-end board flow: submit through the handler, let the driver
//! re-render, and check what each page shows.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use skycast_board::{
    document, AdminPanel, AuthGate, BoardState, Driver, DriverOptions, PageSet, PlaintextGate,
    SubmissionForm, SubmissionHandler, SubmitOutcome, View,
};
use skycast_core::BoardConfig;
use skycast_store::{
    AccessRules, LocalStorage, LocalStore, RealtimeStore, RecordId, RecordRef, RecordStore,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn form(date: &str, condition: &str, temperature: &str, notes: &str) -> SubmissionForm {
    SubmissionForm {
        date: date.into(),
        condition: condition.into(),
        temperature: temperature.into(),
        notes: notes.into(),
        ..SubmissionForm::default()
    }
}

/// Give spawned loads and the driver loop a chance to run
async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_poll_board_publish_reload_delete() {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::open(dir.path().join("local_storage.json")).unwrap();
    let store: Arc<dyn RecordStore> = Arc::new(LocalStore::new(storage, "weatherPredictions"));

    let pages = PageSet::shared();
    let config = BoardConfig::default();
    let driver = Driver::new(store.clone(), pages.clone(), DriverOptions::from_config(&config));
    let handle = driver.handle();
    let handler = SubmissionHandler::new(store.clone(), &config).with_driver(handle.clone());
    let cancel = CancellationToken::new();
    let task = tokio::spawn(driver.run(cancel.clone()));

    settle().await;
    assert_eq!(handle.state(), BoardState::Displaying(0));
    assert!(pages.read().get(View::Index).list_html.contains("No official forecasts yet."));

    let outcome = handler.submit(&mut form("2026-02-14", "Sunny", "21", "")).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Published);

    // Poll stores only show the write after the delayed reload
    settle().await;
    assert_eq!(handle.state(), BoardState::Displaying(0));
    tokio::time::advance(Duration::from_secs(config.reload_delay_seconds)).await;
    settle().await;
    assert_eq!(handle.state(), BoardState::Displaying(1));

    {
        let pages = pages.read();
        let index = pages.get(View::Index);
        assert_eq!(index.header.as_deref(), Some("Saturday, February 14, 2026"));
        assert!(index.list_html.contains("☀️"));
        assert!(index.list_html.contains("(Feb 14)"));
        assert!(index.list_html.contains("21°C"));
        assert!(!index.list_html.contains(r#"class="note""#));
    }

    let record = store.load().await.remove(0);
    assert!(matches!(record.id, Some(RecordId::Number(_))));
    let outcome = handler.delete(&record.reference(0)).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Deleted);

    // Let the delayed reload register its timer before time moves
    settle().await;
    tokio::time::advance(Duration::from_secs(config.reload_delay_seconds)).await;
    settle().await;
    assert_eq!(handle.state(), BoardState::Displaying(0));
    assert_eq!(
        pages.read().get(View::Index).header.as_deref(),
        Some("Waiting for update...")
    );

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_push_board_updates_without_reload() {
    let store: Arc<dyn RecordStore> =
        Arc::new(RealtimeStore::open_in_memory(AccessRules::default()).unwrap());

    let pages = PageSet::shared();
    let config = BoardConfig::default();
    let driver = Driver::new(store.clone(), pages.clone(), DriverOptions::from_config(&config));
    let handle = driver.handle();
    let handler = SubmissionHandler::new(store.clone(), &config).with_driver(handle.clone());
    let cancel = CancellationToken::new();
    let task = tokio::spawn(driver.run(cancel.clone()));

    handler.submit(&mut form("2026-02-14", "Cloudy", "6", "")).await.unwrap();
    handler.submit(&mut form("2026-02-15", "Rainy", "8", "Umbrella")).await.unwrap();
    settle().await;

    assert_eq!(handle.state(), BoardState::Displaying(2));
    let admin_html = pages.read().get(View::Admin).list_html.clone();
    let rainy = admin_html.find("Rainy").unwrap();
    let cloudy = admin_html.find("Cloudy").unwrap();
    assert!(rainy < cloudy, "newest first");
    assert!(admin_html.contains("/admin/predictions/id-"));

    handler.delete(&RecordRef::Index(0)).await.unwrap();
    settle().await;
    assert_eq!(handle.state(), BoardState::Displaying(1));
    assert!(!pages.read().get(View::Other).list_html.contains("Rainy"));

    cancel.cancel();
    task.await.unwrap();
}

#[test]
fn test_gate_reveals_dashboard() {
    let gate = PlaintextGate::default();
    let pages = PageSet::default();
    let today = chrono::NaiveDate::from_ymd_opt(2026, 2, 14).unwrap();

    let panel = AdminPanel {
        unlocked: gate.check("1"),
        ..AdminPanel::default()
    };
    let html = document(pages.get(View::Admin), today, &panel);
    assert!(html.contains(r#"<section id="dashboard-section">"#));

    let panel = AdminPanel {
        unlocked: gate.check("letmein"),
        login_error: true,
        ..AdminPanel::default()
    };
    let html = document(pages.get(View::Admin), today, &panel);
    assert!(html.contains(r#"<section id="dashboard-section" style="display: none;">"#));
    assert!(html.contains(r#"id="admin-password" name="password" value="""#));
}
