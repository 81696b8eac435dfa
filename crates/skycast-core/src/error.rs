//! Centralized error types for Skycast.
//!
//! This module provides the top of the typed error hierarchy:
//! - Precise variants for configuration and network failures
//! - User-facing messages suitable for alerts and CLI output
//! - Full context preserved for logging

use thiserror::Error;

/// Top-level application error type.
///
/// Crate-level errors (store, board) convert into this type at the binary
/// boundary. Use `user_message()` for anything shown to a person.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors raised by a record store or the board, already classified by
    /// the owning crate.
    #[error("Service error: {message}")]
    Service {
        message: String,
        hint: &'static str,
    },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Build a service error from a message and a pre-computed user hint.
    pub fn service(message: impl Into<String>, hint: &'static str) -> Self {
        AppError::Service {
            message: message.into(),
            hint,
        }
    }

    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Service { hint, .. } => hint,
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to connect. Check your internet connection."
            }
            NetworkError::Timeout => "The request timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The server is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The request failed. Please try again.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_conversion() {
        let config_err = ConfigError::Invalid("store.github.owner is empty".into());
        let app_err: AppError = config_err.into();
        assert!(matches!(app_err, AppError::Config(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_user_message_propagation() {
        let app_err = AppError::Network(NetworkError::Timeout);
        assert_eq!(
            app_err.user_message(),
            "The request timed out. Please try again."
        );
    }

    #[test]
    fn test_server_error_messages_split_on_5xx() {
        let upstream = NetworkError::ServerError {
            status: 502,
            message: "bad gateway".into(),
        };
        let client = NetworkError::ServerError {
            status: 404,
            message: "missing".into(),
        };
        assert_ne!(upstream.user_message(), client.user_message());
    }

    #[test]
    fn test_service_error_keeps_hint() {
        let err = AppError::service("write rejected", "Saving failed.");
        assert_eq!(err.user_message(), "Saving failed.");
        assert!(err.to_string().contains("write rejected"));
    }
}
