use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the config file and local data files.
    /// Defaults to the directory of the file it was loaded from.
    #[serde(default)]
    pub config_dir: PathBuf,

    /// Which backend holds the prediction list
    #[serde(default)]
    pub store: StoreConfig,

    /// Rendering and refresh behavior
    #[serde(default)]
    pub board: BoardConfig,

    /// Admin gate settings
    #[serde(default)]
    pub admin: AdminConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Record store backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Read-only JSON file served over HTTP or from disk
    StaticFile,
    /// JSON file in a GitHub repository, written through the contents API
    Github,
    /// Key/value storage file on the local machine
    #[default]
    Local,
    /// Document collection with push snapshots
    Realtime,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StoreKind::StaticFile => "static_file",
            StoreKind::Github => "github",
            StoreKind::Local => "local",
            StoreKind::Realtime => "realtime",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,

    #[serde(default)]
    pub static_file: StaticFileConfig,

    #[serde(default)]
    pub github: GitHubStoreConfig,

    #[serde(default)]
    pub local: LocalStoreConfig,

    #[serde(default)]
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticFileConfig {
    /// Base location: http(s) URL, file:// URL or a plain directory
    pub base_url: String,

    /// File name relative to the base
    #[serde(default = "default_data_file")]
    pub path: String,
}

impl Default for StaticFileConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            path: default_data_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubStoreConfig {
    pub owner: String,
    pub repo: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_data_file")]
    pub file: String,

    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    /// Contents API root (overridable for GitHub Enterprise)
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Raw content root used for plain reads
    #[serde(default = "default_github_raw_url")]
    pub raw_url: String,
}

impl GitHubStoreConfig {
    /// Check if repository coordinates are filled in (not placeholders)
    pub fn is_configured(&self) -> bool {
        !self.owner.is_empty()
            && !self.repo.is_empty()
            && !self.owner.starts_with("YOUR_")
            && !self.repo.starts_with("YOUR_")
    }
}

impl Default for GitHubStoreConfig {
    fn default() -> Self {
        Self {
            owner: "YOUR_GITHUB_USER".to_string(),
            repo: "YOUR_GITHUB_REPO".to_string(),
            branch: default_branch(),
            file: default_data_file(),
            commit_message: default_commit_message(),
            api_url: default_github_api_url(),
            raw_url: default_github_raw_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStoreConfig {
    /// Storage file; defaults to `local_storage.json` in the config dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Key holding the serialized prediction list
    #[serde(default = "default_storage_key")]
    pub key: String,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            key: default_storage_key(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Database file; defaults to `realtime.db` in the config dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Collection rule: may clients read
    #[serde(default = "default_true")]
    pub allow_read: bool,

    /// Collection rule: may clients write
    #[serde(default = "default_true")]
    pub allow_write: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            path: None,
            allow_read: true,
            allow_write: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Poll interval for file-backed stores, 0 loads once
    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,

    /// Admin views load once instead of polling
    #[serde(default)]
    pub admin_load_once: bool,

    /// Delay before re-reading after a write on poll backends
    #[serde(default = "default_reload_delay_seconds")]
    pub reload_delay_seconds: u64,

    /// Author literal stamped on admin-created records
    #[serde(default = "default_author")]
    pub author: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            poll_seconds: default_poll_seconds(),
            admin_load_once: false,
            reload_delay_seconds: default_reload_delay_seconds(),
            author: default_author(),
        }
    }
}

/// Admin gate settings.
///
/// The passcode is a plaintext placeholder compared verbatim; it is not a
/// credential and protects nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_passcode")]
    pub passcode: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            passcode: default_passcode(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Directory containing `path`, or the platform config dir for a bare file name.
fn file_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => default_config_dir(),
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skycast")
}

fn default_data_file() -> String {
    "data.json".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_commit_message() -> String {
    "Update weather predictions".to_string()
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_github_raw_url() -> String {
    "https://raw.githubusercontent.com".to_string()
}

fn default_storage_key() -> String {
    "weatherPredictions".to_string()
}

fn default_true() -> bool {
    true
}

fn default_poll_seconds() -> u64 {
    60
}

fn default_reload_delay_seconds() -> u64 {
    2
}

fn default_author() -> String {
    "admin".to_string()
}

fn default_passcode() -> String {
    "1".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            store: StoreConfig::default(),
            board: BoardConfig::default(),
            admin: AdminConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self {
                config_dir: file_dir(path),
                ..Self::default()
            };
            config.save_to(path)?;
            tracing::info!("Wrote default configuration to {}", path.display());
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
            .context("Failed to parse config file")?;
        if config.config_dir.as_os_str().is_empty() {
            config.config_dir = file_dir(path);
        }

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()))
                .context("Configuration validation failed");
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    ///
    /// Only the selected store backend is checked.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        match self.store.kind {
            StoreKind::StaticFile => {
                let base = &self.store.static_file.base_url;
                if base.contains("://") {
                    self.validate_url(base, "store.static_file.base_url", &["http", "https", "file"], &mut result);
                } else if base.is_empty() {
                    result.add_error("store.static_file.base_url", "Base location cannot be empty");
                }
                if self.store.static_file.path.is_empty() {
                    result.add_error("store.static_file.path", "File name cannot be empty");
                }
            }
            StoreKind::Github => {
                let github = &self.store.github;
                if !github.is_configured() {
                    result.add_error("store.github", "Repository owner and name must be set");
                }
                if github.file.is_empty() {
                    result.add_error("store.github.file", "File path cannot be empty");
                }
                self.validate_url(&github.api_url, "store.github.api_url", &["http", "https"], &mut result);
                self.validate_url(&github.raw_url, "store.github.raw_url", &["http", "https"], &mut result);
            }
            StoreKind::Local => {
                if self.store.local.key.is_empty() {
                    result.add_error("store.local.key", "Storage key cannot be empty");
                }
            }
            StoreKind::Realtime => {
                if !self.store.realtime.allow_read {
                    result.add_warning(
                        "store.realtime.allow_read",
                        "Reads are denied; the board will show a configuration error",
                    );
                }
            }
        }

        if self.board.poll_seconds == 0 {
            result.add_warning("board.poll_seconds", "Polling disabled (0 seconds), loading once");
        } else if self.board.poll_seconds < 5 {
            result.add_warning("board.poll_seconds", "Poll interval is shorter than 5 seconds");
        }

        if self.admin.passcode.is_empty() {
            result.add_warning("admin.passcode", "Empty passcode unlocks the dashboard for any input");
        }

        if self.server.bind.parse::<SocketAddr>().is_err() {
            result.add_error(
                "server.bind",
                format!("Not a socket address: {}", self.server.bind),
            );
        }

        result
    }

    /// Validate a URL field against allowed schemes
    fn validate_url(&self, url_str: &str, field_name: &str, schemes: &[&str], result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if !schemes.contains(&url.scheme()) {
                    result.add_error(
                        field_name,
                        format!("URL must use one of {:?}, got: {}", schemes, url.scheme()),
                    );
                }
                if url.scheme() != "file" && url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Location of the local key/value storage file
    pub fn local_storage_path(&self) -> PathBuf {
        self.store
            .local
            .path
            .clone()
            .unwrap_or_else(|| self.config_dir.join("local_storage.json"))
    }

    /// Location of the realtime document database
    pub fn realtime_db_path(&self) -> PathBuf {
        self.store
            .realtime
            .path
            .clone()
            .unwrap_or_else(|| self.config_dir.join("realtime.db"))
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the default configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("platform config directory".into()))?
            .join("skycast");

        Ok(config_dir.join("config.toml"))
    }
}
