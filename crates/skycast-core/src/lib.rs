pub mod config;
pub mod error;

pub use config::{
    AdminConfig, BoardConfig, Config, GitHubStoreConfig, LocalStoreConfig, RealtimeConfig,
    ServerConfig, StaticFileConfig, StoreConfig, StoreKind, ValidationResult,
};
pub use error::{AppError, ConfigError, NetworkError, ReqwestErrorExt};

use anyhow::Result;

/// Initialize tracing for the process.
///
/// Honors `RUST_LOG`; falls back to `info`.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("Skycast {} initialized", env!("CARGO_PKG_VERSION"));
    Ok(())
}
