//! Backend selection from configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use skycast_core::{Config, StoreKind};

use crate::github::GitHubContentsStore;
use crate::local::{LocalStorage, LocalStore};
use crate::realtime::{AccessRules, RealtimeStore};
use crate::static_file::StaticFileStore;
use crate::store::RecordStore;

/// Environment variable holding the GitHub write token.
pub const GITHUB_TOKEN_ENV: &str = "SKYCAST_GITHUB_TOKEN";

/// Local storage key holding the GitHub write token.
pub const GITHUB_TOKEN_KEY: &str = "githubToken";

/// Open the local key/value storage file for this configuration.
pub fn open_local_storage(config: &Config) -> Result<LocalStorage> {
    let path = config
        .store
        .local
        .path
        .clone()
        .unwrap_or_else(|| config.local_storage_path());
    LocalStorage::open(&path).with_context(|| format!("Failed to open local storage at {:?}", path))
}

/// Resolve the GitHub token: environment first, then local storage.
pub fn resolve_github_token(storage: &LocalStorage) -> Option<String> {
    if let Ok(token) = std::env::var(GITHUB_TOKEN_ENV) {
        if !token.trim().is_empty() {
            tracing::debug!("Using GitHub token from {}", GITHUB_TOKEN_ENV);
            return Some(token.trim().to_string());
        }
    }

    storage
        .get_item(GITHUB_TOKEN_KEY)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Build the configured record store.
pub fn open_store(config: &Config) -> Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match config.store.kind {
        StoreKind::StaticFile => Arc::new(
            StaticFileStore::new(&config.store.static_file)
                .context("Failed to create static file store")?,
        ),
        StoreKind::Github => {
            let storage = open_local_storage(config)?;
            let token = resolve_github_token(&storage);
            if token.is_none() {
                tracing::warn!(
                    "No GitHub token configured; set {} or run `skycast token`",
                    GITHUB_TOKEN_ENV
                );
            }
            Arc::new(
                GitHubContentsStore::new(config.store.github.clone(), token)
                    .context("Failed to create GitHub store")?,
            )
        }
        StoreKind::Local => {
            let storage = open_local_storage(config)?;
            Arc::new(LocalStore::new(storage, config.store.local.key.clone()))
        }
        StoreKind::Realtime => {
            let path = config
                .store
                .realtime
                .path
                .clone()
                .unwrap_or_else(|| config.realtime_db_path());
            let rules = AccessRules::from(&config.store.realtime);
            Arc::new(
                RealtimeStore::open(&path, rules)
                    .with_context(|| format!("Failed to open realtime collection at {:?}", path))?,
            )
        }
    };

    tracing::info!("Using {} record store", store.kind());
    Ok(store)
}
