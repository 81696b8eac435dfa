//! Read-only backend serving the record list from a static JSON file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use skycast_core::{StaticFileConfig, StoreKind};
use url::Url;

use crate::record::{PredictionRecord, RecordRef};
use crate::retry::{with_retry, RetryConfig};
use crate::store::{status_error, RecordStore, StoreError, StoreResult};

/// Where the data file lives.
#[derive(Debug, Clone, PartialEq)]
enum Source {
    Http(Url),
    File(PathBuf),
}

/// Static JSON array fetched over HTTP or read from disk.
///
/// HTTP fetches append `?t=<epoch ms>` so intermediate caches never serve
/// a stale list.
#[derive(Debug, Clone)]
pub struct StaticFileStore {
    source: Source,
    client: Arc<Client>,
    retry: RetryConfig,
}

impl StaticFileStore {
    /// Build a store from configuration.
    ///
    /// `base_url` may be an `http(s)://` URL, a `file://` URL or a plain
    /// directory path.
    pub fn new(config: &StaticFileConfig) -> StoreResult<Self> {
        let source = Self::resolve_source(&config.base_url, &config.path)?;
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        tracing::debug!("Static file store source: {:?}", source);
        Ok(Self {
            source,
            client: Arc::new(client),
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn resolve_source(base: &str, path: &str) -> StoreResult<Source> {
        match Url::parse(base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                // Url::join drops the last segment unless the base ends with '/'
                let mut base = url;
                if !base.path().ends_with('/') {
                    let with_slash = format!("{}/", base.path());
                    base.set_path(&with_slash);
                }
                let full = base
                    .join(path)
                    .map_err(|e| StoreError::Malformed(format!("data file URL: {}", e)))?;
                Ok(Source::Http(full))
            }
            Ok(url) if url.scheme() == "file" => {
                let dir = url
                    .to_file_path()
                    .map_err(|_| StoreError::Malformed(format!("file URL: {}", base)))?;
                Ok(Source::File(dir.join(path)))
            }
            _ => Ok(Source::File(PathBuf::from(base).join(path))),
        }
    }

    fn cache_busted(url: &Url) -> Url {
        let mut url = url.clone();
        let now = chrono::Utc::now().timestamp_millis();
        url.query_pairs_mut().append_pair("t", &now.to_string());
        url
    }

    async fn fetch_http(&self, url: &Url) -> StoreResult<Vec<PredictionRecord>> {
        let url = Self::cache_busted(url);
        tracing::debug!("Fetching predictions from {}", url);

        let response = with_retry(&self.retry, || self.client.get(url.clone()).send()).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn fetch_file(&self, path: &Path) -> StoreResult<Vec<PredictionRecord>> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::not_found(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl RecordStore for StaticFileStore {
    fn kind(&self) -> StoreKind {
        StoreKind::StaticFile
    }

    async fn fetch(&self) -> StoreResult<Vec<PredictionRecord>> {
        match &self.source {
            Source::Http(url) => self.fetch_http(url).await,
            Source::File(path) => self.fetch_file(path).await,
        }
    }

    async fn save(&self, _records: &[PredictionRecord]) -> StoreResult<()> {
        Err(StoreError::ReadOnly)
    }

    async fn add(&self, _record: PredictionRecord) -> StoreResult<()> {
        Err(StoreError::ReadOnly)
    }

    async fn remove(&self, _target: &RecordRef) -> StoreResult<()> {
        Err(StoreError::ReadOnly)
    }
}
