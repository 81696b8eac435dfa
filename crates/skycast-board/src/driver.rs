//! Decides when the page models are re-rendered.
//!
//! Poll backends are loaded once immediately and then on a fixed interval;
//! every tick spawns its own load, so overlapping loads are possible and
//! whichever resolves last is displayed. With `admin_load_once` the admin
//! view ignores tick loads and only follows on-demand refreshes. Push
//! backends forward every
//! snapshot from their subscription. Both paths feed the same event
//! channel, which is the only place the page models are written.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use skycast_core::BoardConfig;
use skycast_store::{PredictionRecord, RecordStore, Snapshot, SnapshotReceiver};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::page::SharedPages;

/// A change to the displayed record list.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordListEvent {
    /// The complete current list
    Snapshot(Vec<PredictionRecord>),
    /// The backend refused the subscription
    Failed(String),
}

/// What the board is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardState {
    Idle,
    Loading,
    /// Displaying this many records
    Displaying(usize),
    DisplayingError(String),
}

/// Driver timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOptions {
    /// `None` loads once and never polls again
    pub poll_interval: Option<Duration>,
    /// Admin view skips tick loads
    pub admin_load_once: bool,
}

impl DriverOptions {
    pub fn from_config(config: &BoardConfig) -> Self {
        let poll_interval =
            (config.poll_seconds > 0).then(|| Duration::from_secs(config.poll_seconds));
        Self {
            poll_interval,
            admin_load_once: config.admin_load_once,
        }
    }

    /// Load once at start-up, then only on demand.
    pub fn load_once() -> Self {
        Self {
            poll_interval: None,
            admin_load_once: false,
        }
    }
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            poll_interval: Some(Duration::from_secs(60)),
            admin_load_once: false,
        }
    }
}

/// An event plus whether it came from a timer tick.
#[derive(Debug)]
struct Delivery {
    event: RecordListEvent,
    scheduled: bool,
}

/// Cheap handle for triggering loads from the admin handler and the server.
#[derive(Clone)]
pub struct DriverHandle {
    store: Arc<dyn RecordStore>,
    events: mpsc::UnboundedSender<Delivery>,
    state: Arc<RwLock<BoardState>>,
    subscription: Option<SnapshotReceiver>,
}

impl DriverHandle {
    /// Whether the store pushes snapshots instead of being polled.
    pub fn is_push(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn state(&self) -> BoardState {
        self.state.read().clone()
    }

    /// Load the list now, without waiting for the next tick.
    ///
    /// For push stores the current snapshot is re-sent instead.
    pub fn refresh(&self) {
        if let Some(rx) = &self.subscription {
            let snapshot = rx.borrow().clone();
            if let Some(event) = snapshot_event(snapshot) {
                self.send(event);
            }
            return;
        }
        self.load(false);
    }

    fn load(&self, scheduled: bool) {
        *self.state.write() = BoardState::Loading;
        let store = self.store.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let records = store.load().await;
            // Receiver gone means the driver stopped
            let _ = events.send(Delivery {
                event: RecordListEvent::Snapshot(records),
                scheduled,
            });
        });
    }

    /// Refresh once `delay` has elapsed.
    pub fn refresh_after(&self, delay: Duration) {
        let handle = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            handle.refresh();
        });
    }

    fn send(&self, event: RecordListEvent) {
        let delivery = Delivery {
            event,
            scheduled: false,
        };
        if self.events.send(delivery).is_err() {
            tracing::debug!("Driver stopped, dropping record list event");
        }
    }
}

fn snapshot_event(snapshot: Snapshot) -> Option<RecordListEvent> {
    match snapshot {
        Snapshot::Pending => None,
        Snapshot::Records(records) => Some(RecordListEvent::Snapshot(records)),
        Snapshot::Denied(message) => Some(RecordListEvent::Failed(message)),
    }
}

/// Owns the event loop that writes the page models.
pub struct Driver {
    handle: DriverHandle,
    events: mpsc::UnboundedReceiver<Delivery>,
    pages: SharedPages,
    options: DriverOptions,
}

impl Driver {
    pub fn new(store: Arc<dyn RecordStore>, pages: SharedPages, options: DriverOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = store.subscribe();
        let handle = DriverHandle {
            store,
            events: tx,
            state: Arc::new(RwLock::new(BoardState::Idle)),
            subscription,
        };

        Self {
            handle,
            events: rx,
            pages,
            options,
        }
    }

    pub fn handle(&self) -> DriverHandle {
        self.handle.clone()
    }

    /// Run until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        match self.handle.subscription.clone() {
            Some(rx) => {
                tracing::info!("Subscribed to {} store snapshots", self.handle.store.kind());
                tokio::spawn(forward_snapshots(rx, self.handle.clone(), cancel.clone()));
            }
            None => {
                tracing::info!(
                    "Polling {} store every {:?}",
                    self.handle.store.kind(),
                    self.options.poll_interval
                );
                tokio::spawn(poll(self.handle.clone(), self.options.poll_interval, cancel.clone()));
            }
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Driver stopped");
                    break;
                }
                delivery = self.events.recv() => match delivery {
                    Some(delivery) => self.apply(delivery),
                    None => break,
                },
            }
        }
    }

    fn apply(&self, delivery: Delivery) {
        let state = match &delivery.event {
            RecordListEvent::Snapshot(records) => {
                if delivery.scheduled && self.options.admin_load_once {
                    self.pages.write().apply_public_records(records);
                } else {
                    self.pages.write().apply_records(records);
                }
                tracing::debug!("Displaying {} predictions", records.len());
                BoardState::Displaying(records.len())
            }
            RecordListEvent::Failed(message) => {
                self.pages.write().apply_error(message);
                tracing::error!("Record subscription failed: {}", message);
                BoardState::DisplayingError(message.clone())
            }
        };
        *self.handle.state.write() = state;
    }
}

async fn poll(handle: DriverHandle, interval: Option<Duration>, cancel: CancellationToken) {
    handle.refresh();

    let Some(period) = interval else {
        return;
    };

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => handle.load(true),
        }
    }
}

async fn forward_snapshots(
    mut rx: SnapshotReceiver,
    handle: DriverHandle,
    cancel: CancellationToken,
) {
    let initial = rx.borrow_and_update().clone();
    if let Some(event) = snapshot_event(initial) {
        handle.send(event);
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    tracing::warn!("Snapshot publisher closed");
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                if let Some(event) = snapshot_event(snapshot) {
                    handle.send(event);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::page::{PageSet, View};
    use async_trait::async_trait;
    use skycast_core::{NetworkError, StoreKind};
    use skycast_store::{AccessRules, RealtimeStore, StoreResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Poll store returning a growing list and counting fetches
    struct CountingStore {
        fetches: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RecordStore for CountingStore {
        fn kind(&self) -> StoreKind {
            StoreKind::StaticFile
        }

        async fn fetch(&self) -> StoreResult<Vec<PredictionRecord>> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(NetworkError::Timeout.into());
            }
            Ok((0..n)
                .map(|i| PredictionRecord::new("2026-02-14", format!("Sunny {}", i), "20"))
                .collect())
        }
    }

    fn counting(fail: bool) -> Arc<CountingStore> {
        Arc::new(CountingStore {
            fetches: AtomicUsize::new(0),
            fail,
        })
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loads_immediately_then_each_interval() {
        let store = counting(false);
        let pages: SharedPages = Arc::new(RwLock::new(PageSet::default()));
        let options = DriverOptions::default();
        let driver = Driver::new(store.clone(), pages.clone(), options);
        let handle = driver.handle();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(driver.run(cancel.clone()));

        settle().await;
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), BoardState::Displaying(1));

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(store.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(handle.state(), BoardState::Displaying(2));
        assert_eq!(
            pages.read().get(View::Index).list_html.matches("prediction-card").count(),
            2
        );

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_once_never_polls_again() {
        let store = counting(false);
        let pages: SharedPages = Arc::new(RwLock::new(PageSet::default()));
        let driver = Driver::new(store.clone(), pages, DriverOptions::load_once());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(driver.run(cancel.clone()));

        settle().await;
        tokio::time::advance(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_poll_shows_empty_state() {
        let store = counting(true);
        let pages: SharedPages = Arc::new(RwLock::new(PageSet::default()));
        let driver = Driver::new(store, pages.clone(), DriverOptions::load_once());
        let handle = driver.handle();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(driver.run(cancel.clone()));

        settle().await;
        assert_eq!(handle.state(), BoardState::Displaying(0));
        assert!(pages.read().get(View::Other).list_html.contains("empty-state"));

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_push_snapshots_and_denial() {
        let store = Arc::new(RealtimeStore::open_in_memory(AccessRules::default()).unwrap());
        let pages: SharedPages = Arc::new(RwLock::new(PageSet::default()));
        let driver = Driver::new(store.clone(), pages.clone(), DriverOptions::default());
        let handle = driver.handle();
        assert!(handle.is_push());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(driver.run(cancel.clone()));

        store
            .add(PredictionRecord::new("2026-02-14", "Windy", "8"))
            .await
            .unwrap();
        settle().await;
        assert_eq!(handle.state(), BoardState::Displaying(1));
        assert!(pages.read().get(View::Index).list_html.contains("💨"));

        cancel.cancel();
        task.await.unwrap();

        let denied = Arc::new(
            RealtimeStore::open_in_memory(AccessRules {
                allow_read: false,
                allow_write: true,
            })
            .unwrap(),
        );
        let driver = Driver::new(denied, pages.clone(), DriverOptions::default());
        let handle = driver.handle();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(driver.run(cancel.clone()));

        settle().await;
        assert!(matches!(handle.state(), BoardState::DisplayingError(_)));
        assert!(pages.read().get(View::Index).list_html.contains("error-state"));

        cancel.cancel();
        task.await.unwrap();
    }

    #[test]
    fn test_options_from_config() {
        let mut config = BoardConfig::default();
        assert_eq!(
            DriverOptions::from_config(&config).poll_interval,
            Some(Duration::from_secs(60))
        );

        config.poll_seconds = 0;
        assert_eq!(DriverOptions::from_config(&config).poll_interval, None);

        config.poll_seconds = 5;
        config.admin_load_once = true;
        let options = DriverOptions::from_config(&config);
        assert_eq!(options.poll_interval, Some(Duration::from_secs(5)));
        assert!(options.admin_load_once);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_load_once_freezes_only_admin_view() {
        let store = counting(false);
        let pages: SharedPages = Arc::new(RwLock::new(PageSet::default()));
        let options = DriverOptions {
            poll_interval: Some(Duration::from_secs(5)),
            admin_load_once: true,
        };
        let driver = Driver::new(store.clone(), pages.clone(), options);
        let handle = driver.handle();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(driver.run(cancel.clone()));

        let cards = |view: View| {
            pages.read().get(view).list_html.matches("prediction-card").count()
        };

        settle().await;
        assert_eq!(cards(View::Index), 1);
        assert_eq!(cards(View::Admin), 1);

        for _ in 0..6 {
            tokio::time::advance(Duration::from_secs(5)).await;
            settle().await;
        }
        assert_eq!(store.fetches.load(Ordering::SeqCst), 7);
        assert_eq!(cards(View::Index), 7);
        assert_eq!(cards(View::Other), 7);
        assert_eq!(cards(View::Admin), 1);

        // On-demand refreshes still reach the admin view
        handle.refresh();
        settle().await;
        assert_eq!(cards(View::Admin), 8);

        cancel.cancel();
        task.await.unwrap();
    }
}
