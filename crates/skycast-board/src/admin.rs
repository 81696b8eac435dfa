//! Admin gate and the submission handler behind the dashboard form.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use skycast_core::{AppError, BoardConfig};
use skycast_store::{PredictionRecord, RecordRef, RecordRefParseError, RecordStore, StoreError};
use thiserror::Error;

use crate::driver::DriverHandle;

pub const PUBLISHED_ALERT: &str = "Forecast published!";
pub const DELETED_ALERT: &str = "Forecast deleted.";

/// Decides whether a secret unlocks the dashboard.
pub trait AuthGate: Send + Sync {
    fn check(&self, secret: &str) -> bool;
}

/// Plain equality against a configured passcode.
///
/// This is a UI placeholder, not a security boundary: the passcode is
/// stored in clear text and the unlock marker is a plain cookie.
#[derive(Debug, Clone)]
pub struct PlaintextGate {
    passcode: String,
}

impl PlaintextGate {
    pub fn new(passcode: impl Into<String>) -> Self {
        Self {
            passcode: passcode.into(),
        }
    }
}

impl Default for PlaintextGate {
    fn default() -> Self {
        Self::new("1")
    }
}

impl AuthGate for PlaintextGate {
    fn check(&self, secret: &str) -> bool {
        secret == self.passcode
    }
}

/// Values of the `prediction-form` fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionForm {
    pub date: String,
    pub to_date: String,
    pub condition: String,
    pub temperature: String,
    pub notes: String,
}

impl SubmissionForm {
    /// Date, condition and temperature are all filled in.
    pub fn is_complete(&self) -> bool {
        !self.date.is_empty() && !self.condition.is_empty() && !self.temperature.is_empty()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn to_record(&self, author: &str) -> PredictionRecord {
        let mut record = PredictionRecord::new(&self.date, &self.condition, &self.temperature);
        record.to_date = Some(self.to_date.clone()).filter(|d| !d.is_empty());
        record.notes = self.notes.clone();
        record.timestamp = Some(Utc::now());
        record.author = Some(author.to_string());
        record
    }
}

/// Result of a dashboard action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Required fields were missing; nothing happened
    Ignored,
    Published,
    Deleted,
}

impl SubmitOutcome {
    pub fn alert(self) -> Option<&'static str> {
        match self {
            SubmitOutcome::Ignored => None,
            SubmitOutcome::Published => Some(PUBLISHED_ALERT),
            SubmitOutcome::Deleted => Some(DELETED_ALERT),
        }
    }
}

/// Errors surfaced to the admin as alerts.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    InvalidReference(#[from] RecordRefParseError),
}

impl BoardError {
    pub fn user_message(&self) -> &'static str {
        match self {
            BoardError::Store(e) => e.user_message(),
            BoardError::InvalidReference(_) => "That forecast reference is not valid.",
        }
    }
}

impl From<BoardError> for AppError {
    fn from(e: BoardError) -> Self {
        match e {
            BoardError::Store(store) => store.into(),
            other => AppError::service(other.to_string(), other.user_message()),
        }
    }
}

/// Applies dashboard submissions and deletions to the store.
pub struct SubmissionHandler {
    store: Arc<dyn RecordStore>,
    driver: Option<DriverHandle>,
    author: String,
    reload_delay: Duration,
}

impl SubmissionHandler {
    pub fn new(store: Arc<dyn RecordStore>, config: &BoardConfig) -> Self {
        Self {
            store,
            driver: None,
            author: config.author.clone(),
            reload_delay: Duration::from_secs(config.reload_delay_seconds),
        }
    }

    /// Reload through `driver` after writes to a poll store.
    pub fn with_driver(mut self, driver: DriverHandle) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Publish the form as a new record; the form is reset on success.
    ///
    /// # Errors
    /// Returns the store failure; the form keeps its values.
    pub async fn submit(&self, form: &mut SubmissionForm) -> Result<SubmitOutcome, BoardError> {
        if !form.is_complete() {
            tracing::debug!("Ignoring incomplete submission");
            return Ok(SubmitOutcome::Ignored);
        }

        let record = form.to_record(&self.author);
        if let Err(e) = self.store.add(record).await {
            tracing::error!("Error publishing forecast: {}", e);
            return Err(e.into());
        }

        tracing::info!("Published forecast for {}", form.date);
        form.reset();
        self.after_write();
        Ok(SubmitOutcome::Published)
    }

    /// Delete the addressed record.
    ///
    /// # Errors
    /// Returns the store failure, including `NotFound` for a stale reference.
    pub async fn delete(&self, target: &RecordRef) -> Result<SubmitOutcome, BoardError> {
        if let Err(e) = self.store.remove(target).await {
            tracing::error!("Error deleting forecast {}: {}", target, e);
            return Err(e.into());
        }

        tracing::info!("Deleted forecast {}", target);
        self.after_write();
        Ok(SubmitOutcome::Deleted)
    }

    /// Parse a textual reference, then delete it.
    ///
    /// # Errors
    /// Returns `BoardError::InvalidReference` for malformed text.
    pub async fn delete_by_text(&self, target: &str) -> Result<SubmitOutcome, BoardError> {
        let target: RecordRef = target.parse()?;
        self.delete(&target).await
    }

    /// Poll stores do not see writes until the next load, so schedule one.
    fn after_write(&self) {
        if let Some(driver) = &self.driver {
            if !driver.is_push() {
                driver.refresh_after(self.reload_delay);
            }
        }
    }
}
