//! Backend storing the record list as one JSON file in a GitHub repository.
//!
//! Reads go to the raw content host. Writes go through the contents API,
//! which needs the current blob `sha` to replace an existing file. `add` and
//! `remove` start from the contents API read so the list and the `sha`
//! belong to the same revision.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use skycast_core::{GitHubStoreConfig, StoreKind};
use tracing::instrument;
use url::Url;

use crate::record::{PredictionRecord, RecordRef};
use crate::retry::{with_retry, RetryConfig};
use crate::store::{remove_from, status_error, RecordStore, StoreError, StoreResult};

/// Contents API response for a single file
#[derive(Debug, Clone, Deserialize)]
pub struct ContentsResponse {
    pub sha: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: String,
}

impl ContentsResponse {
    /// Decode the base64 body, which GitHub wraps at 60 columns.
    pub fn decoded(&self) -> StoreResult<Vec<u8>> {
        if !self.encoding.is_empty() && self.encoding != "base64" {
            return Err(StoreError::Malformed(format!(
                "unexpected content encoding: {}",
                self.encoding
            )));
        }
        let compact: String = self.content.chars().filter(|c| !c.is_whitespace()).collect();
        Ok(STANDARD.decode(compact)?)
    }
}

/// Request body for creating or replacing a file
#[derive(Debug, Serialize)]
pub struct PutContentsRequest {
    pub message: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    pub branch: String,
}

/// File revision read from the contents API
#[derive(Debug, Clone)]
pub struct Revision {
    pub sha: String,
    pub records: Vec<PredictionRecord>,
}

/// GitHub-hosted record file
#[derive(Debug, Clone)]
pub struct GitHubContentsStore {
    config: GitHubStoreConfig,
    api_base: Url,
    raw_base: Url,
    client: Arc<Client>,
    token: Option<String>,
    retry: RetryConfig,
}

impl GitHubContentsStore {
    /// Create a store for the configured repository file.
    ///
    /// Without a token the store still reads; writes fail with
    /// `StoreError::NotAuthenticated`.
    pub fn new(config: GitHubStoreConfig, token: Option<String>) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            api_base: directory_url(&config.api_url)?,
            raw_base: directory_url(&config.raw_url)?,
            config,
            client: Arc::new(client),
            token: token.filter(|t| !t.is_empty()),
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn require_token(&self) -> StoreResult<()> {
        match self.token {
            Some(_) => Ok(()),
            None => Err(StoreError::NotAuthenticated(
                "GitHub token required to save".into(),
            )),
        }
    }

    fn raw_url(&self) -> StoreResult<Url> {
        let mut url = self
            .raw_base
            .join(&format!(
                "{}/{}/{}/{}",
                self.config.owner, self.config.repo, self.config.branch, self.config.file
            ))
            .map_err(|e| StoreError::Malformed(format!("raw URL: {}", e)))?;
        let now = chrono::Utc::now().timestamp_millis();
        url.query_pairs_mut().append_pair("t", &now.to_string());
        Ok(url)
    }

    fn contents_url(&self) -> StoreResult<Url> {
        self.api_base
            .join(&format!(
                "repos/{}/{}/contents/{}",
                self.config.owner, self.config.repo, self.config.file
            ))
            .map_err(|e| StoreError::Malformed(format!("contents URL: {}", e)))
    }

    /// Build request with API headers, and auth when a token is present
    fn build_request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let req = req
            .header(header::ACCEPT, "application/vnd.github+json")
            .header(header::USER_AGENT, "skycast")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => req.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => req,
        }
    }

    /// Check response status and map failures
    async fn check_response(&self, response: reqwest::Response) -> StoreResult<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::debug!("GitHub returned {}: {}", status, error_text);
            return Err(status_error(status, error_text));
        }
        Ok(response)
    }

    /// Read the file through the contents API, with its revision marker.
    #[instrument(skip(self), level = "info")]
    pub async fn read_revision(&self) -> StoreResult<Revision> {
        let url = self.contents_url()?;
        let branch = self.config.branch.clone();

        let response = with_retry(&self.retry, || {
            self.build_request(self.client.get(url.clone()).query(&[("ref", branch.as_str())]))
                .send()
        })
        .await?;
        let response = self.check_response(response).await?;
        let contents: ContentsResponse = response.json().await?;

        let bytes = contents.decoded()?;
        let records = if bytes.iter().all(u8::is_ascii_whitespace) {
            Vec::new()
        } else {
            serde_json::from_slice(&bytes)?
        };

        Ok(Revision {
            sha: contents.sha,
            records,
        })
    }

    /// Latest revision, or an empty list without `sha` when it cannot be read.
    async fn latest_or_empty(&self) -> (Vec<PredictionRecord>, Option<String>) {
        match self.read_revision().await {
            Ok(revision) => (revision.records, Some(revision.sha)),
            Err(e) => {
                tracing::warn!("Could not read current revision, writing without sha: {}", e);
                (Vec::new(), None)
            }
        }
    }

    async fn write(&self, records: &[PredictionRecord], sha: Option<String>) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(records)?;
        let body = PutContentsRequest {
            message: self.config.commit_message.clone(),
            content: STANDARD.encode(json.as_bytes()),
            sha,
            branch: self.config.branch.clone(),
        };

        self.put(&body).await?;
        tracing::info!(
            "Saved {} predictions to {}/{}",
            records.len(),
            self.config.owner,
            self.config.repo
        );
        Ok(())
    }

    async fn put(&self, body: &PutContentsRequest) -> StoreResult<()> {
        let url = self.contents_url()?;
        let request = self.build_request(self.client.put(url).json(body));

        let response = request.send().await?;
        self.check_response(response).await?;
        Ok(())
    }
}

/// Parse a base URL so that `join` appends instead of replacing the last segment.
fn directory_url(base: &str) -> StoreResult<Url> {
    let mut url =
        Url::parse(base).map_err(|e| StoreError::Malformed(format!("{}: {}", base, e)))?;
    if !url.path().ends_with('/') {
        let with_slash = format!("{}/", url.path());
        url.set_path(&with_slash);
    }
    Ok(url)
}

#[async_trait]
impl RecordStore for GitHubContentsStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Github
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self) -> StoreResult<Vec<PredictionRecord>> {
        let url = self.raw_url()?;

        let response = with_retry(&self.retry, || self.client.get(url.clone()).send()).await?;
        let response = self.check_response(response).await?;
        let text = response.text().await?;

        Ok(serde_json::from_str(&text)?)
    }

    #[instrument(skip(self, records), fields(count = records.len()), level = "info")]
    async fn save(&self, records: &[PredictionRecord]) -> StoreResult<()> {
        self.require_token()?;
        let (_, sha) = self.latest_or_empty().await;
        self.write(records, sha).await
    }

    /// Prepend to the latest revision. A missing or unreadable file is
    /// treated as empty and created.
    #[instrument(skip(self, record), level = "info")]
    async fn add(&self, record: PredictionRecord) -> StoreResult<()> {
        self.require_token()?;
        let (mut records, sha) = self.latest_or_empty().await;
        records.insert(0, record);
        self.write(&records, sha).await
    }

    #[instrument(skip(self), level = "info")]
    async fn remove(&self, target: &RecordRef) -> StoreResult<()> {
        self.require_token()?;
        let Revision { mut records, sha } = self.read_revision().await?;
        remove_from(&mut records, target)?;
        self.write(&records, Some(sha)).await
    }
}
