//! Record store trait and error types.
//!
//! This module defines the `RecordStore` trait that abstracts over the
//! storage backends (static file, GitHub, local storage, realtime).

use async_trait::async_trait;
use reqwest::StatusCode;
use skycast_core::{AppError, NetworkError, ReqwestErrorExt, StoreKind};
use thiserror::Error;
use tokio::sync::watch;

use crate::record::{PredictionRecord, RecordRef};

/// Errors that can occur during record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Non-success response or network exception.
    #[error("Transport failure: {0}")]
    Transport(#[from] NetworkError),

    /// The backend refused access.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Addressed record or file does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The revision marker no longer matches the stored file.
    #[error("Revision conflict: {0}")]
    Conflict(String),

    #[error("Store is read-only")]
    ReadOnly,

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A write needs credentials that were not provided.
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    /// Stored data could not be decoded.
    #[error("Malformed data: {0}")]
    Malformed(String),

    /// Local filesystem or database failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Whether the backend denied access (inline error, no retry).
    pub fn is_permission(&self) -> bool {
        matches!(self, Self::PermissionDenied(_) | Self::NotAuthenticated(_))
    }

    /// Returns a user-friendly message suitable for an alert.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.user_message(),
            Self::PermissionDenied(_) => {
                "Permission denied by the data store. Check the store configuration."
            }
            Self::NotFound(_) => "That forecast no longer exists. Refresh and try again.",
            Self::Conflict(_) => "The forecasts changed while saving. Refresh and try again.",
            Self::ReadOnly => "This board is read-only.",
            Self::Unsupported(_) => "This data store does not support that operation.",
            Self::NotAuthenticated(_) => "No write token configured for the data store.",
            Self::Malformed(_) => "Stored forecasts could not be read.",
            Self::Storage(_) => "Local data could not be accessed. Please try again.",
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.into_network_error())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<base64::DecodeError> for StoreError {
    fn from(e: base64::DecodeError) -> Self {
        Self::Malformed(format!("base64: {}", e))
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Storage(format!("background task failed: {}", e))
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Transport(net) => AppError::Network(net),
            other => AppError::service(other.to_string(), other.user_message()),
        }
    }
}

/// Map a non-success HTTP status to a store error.
pub(crate) fn status_error(status: StatusCode, body: String) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::PermissionDenied(body),
        StatusCode::NOT_FOUND => StoreError::NotFound(body),
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => StoreError::Conflict(body),
        _ => StoreError::Transport(NetworkError::ServerError {
            status: status.as_u16(),
            message: body,
        }),
    }
}

/// Result type for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Full-collection state pushed by a subscribing backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// Nothing published yet.
    Pending,
    /// Complete current list, newest first.
    Records(Vec<PredictionRecord>),
    /// The subscription was refused by the backend.
    Denied(String),
}

/// Receiving end of a push subscription.
pub type SnapshotReceiver = watch::Receiver<Snapshot>;

/// Trait for prediction record backends.
///
/// Only `kind` and `fetch` are required. Array-backed stores implement
/// `save` and inherit `add`/`remove` as read-modify-overwrite; per-document
/// stores override `add`/`remove` and provide `subscribe`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> StoreKind;

    /// Read the full current list.
    ///
    /// # Errors
    /// Transport, permission and decoding failures are returned as is.
    async fn fetch(&self) -> StoreResult<Vec<PredictionRecord>>;

    /// Read the full current list, degrading to an empty list on any failure.
    ///
    /// The failure is logged; callers render an empty state instead of failing.
    async fn load(&self) -> Vec<PredictionRecord> {
        match self.fetch().await {
            Ok(records) => {
                tracing::debug!("Loaded {} predictions from {} store", records.len(), self.kind());
                records
            }
            Err(e) => {
                tracing::warn!("Error loading predictions from {} store: {}", self.kind(), e);
                Vec::new()
            }
        }
    }

    /// Overwrite the whole list.
    ///
    /// # Errors
    /// Returns `StoreError::Unsupported` unless the backend stores a single list.
    async fn save(&self, _records: &[PredictionRecord]) -> StoreResult<()> {
        Err(StoreError::Unsupported(format!("save on {} store", self.kind())))
    }

    /// Add a record at the head of the list.
    ///
    /// # Errors
    /// Propagates the read or the overwrite failure.
    async fn add(&self, record: PredictionRecord) -> StoreResult<()> {
        let mut records = self.fetch().await?;
        records.insert(0, record);
        self.save(&records).await
    }

    /// Remove exactly the addressed record, keeping the order of the rest.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if nothing matches `target`.
    async fn remove(&self, target: &RecordRef) -> StoreResult<()> {
        let mut records = self.fetch().await?;
        remove_from(&mut records, target)?;
        self.save(&records).await
    }

    /// Push subscription to full snapshots, for backends that have one.
    fn subscribe(&self) -> Option<SnapshotReceiver> {
        None
    }
}

/// Remove the record addressed by `target` from `records`.
///
/// # Errors
/// Returns `StoreError::NotFound` if nothing matches.
pub fn remove_from(
    records: &mut Vec<PredictionRecord>,
    target: &RecordRef,
) -> StoreResult<PredictionRecord> {
    let index = target
        .position(records)
        .ok_or_else(|| StoreError::not_found(target.to_string()))?;
    Ok(records.remove(index))
}
