//! Prediction record storage for Skycast.
//!
//! One `RecordStore` capability with four interchangeable backends:
//! a read-only static file, a GitHub-hosted file, a local key/value
//! storage file and a realtime document collection with push snapshots.

pub mod github;
pub mod local;
pub mod open;
pub mod realtime;
pub mod record;
pub mod retry;
pub mod static_file;
pub mod store;

pub use github::GitHubContentsStore;
pub use local::{LocalStorage, LocalStore};
pub use open::{
    open_local_storage, open_store, resolve_github_token, GITHUB_TOKEN_ENV, GITHUB_TOKEN_KEY,
};
pub use realtime::{AccessRules, RealtimeStore};
pub use record::{PredictionRecord, RecordId, RecordRef, RecordRefParseError};
pub use static_file::StaticFileStore;
pub use store::{RecordStore, Snapshot, SnapshotReceiver, StoreError, StoreResult};
