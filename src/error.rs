//! Error types for yatra-session.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for yatra-session.
///
/// `Clone` so a single refresh outcome can be handed to every task waiting on it.
#[derive(Debug, Clone, Error)]
pub enum Error {
    // ── Session ──────────────────────────────────────────────────────────────
    /// The server rejected the presented credentials (HTTP 401).
    #[error("Unauthorized")]
    Unauthorized,

    /// The refresh token could not be exchanged; the session has been torn down.
    #[error("Session expired - please log in again")]
    SessionExpired,

    /// Credentials or registration details failed local validation.
    #[error("Validation error: {0}")]
    Validation(String),

    // ── API ──────────────────────────────────────────────────────────────────
    /// API returned an error response.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// The backend answered with a body that does not match the wire contract.
    #[error("Protocol error: {0}")]
    Protocol(String),

    // ── Storage ──────────────────────────────────────────────────────────────
    /// Storage I/O error.
    #[error("Storage I/O error at {path}: {message}")]
    StorageIo {
        /// Path that caused the error.
        path: PathBuf,
        /// Error description.
        message: String,
    },

    /// Storage serialization error.
    #[error("Storage serialization error: {0}")]
    StorageSerialization(String),

    /// Keyring backend error.
    #[error("Keyring error: {0}")]
    Keyring(String),

    /// Generic storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    // ── Infrastructure ───────────────────────────────────────────────────────
    /// Transport-level failure; no response was received.
    #[error("Network error: {0}")]
    Network(String),

    /// Request timeout.
    #[error("Request timed out")]
    Timeout,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Path that does not name any screen.
    #[error("Unknown route: {0}")]
    UnknownRoute(String),
}

impl Error {
    /// Returns true if this error indicates the user has to log in again.
    #[must_use]
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Error::Unauthorized | Error::SessionExpired)
    }

    /// Returns true for persistence failures ("session state unknown").
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Error::Storage(_)
                | Error::StorageIo { .. }
                | Error::StorageSerialization(_)
                | Error::Keyring(_)
        )
    }

    /// Returns true for transport failures where no response was received.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout)
    }

    /// Creates a storage I/O error.
    #[must_use]
    pub fn storage_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StorageIo {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Protocol(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

/// Convenience type alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_reauth() {
        assert!(Error::Unauthorized.requires_reauth());
        assert!(Error::SessionExpired.requires_reauth());

        assert!(!Error::Api { status: 500, message: "Server error".into() }.requires_reauth());
        assert!(!Error::Timeout.requires_reauth());
        assert!(!Error::Storage("disk full".into()).requires_reauth());
    }

    #[test]
    fn test_error_families() {
        assert!(Error::storage_io("/tmp/x", "denied").is_storage());
        assert!(Error::Keyring("locked".into()).is_storage());
        assert!(!Error::Network("refused".into()).is_storage());

        assert!(Error::Timeout.is_network());
        assert!(Error::Network("refused".into()).is_network());
        assert!(!Error::SessionExpired.is_network());
    }

    #[test]
    fn test_error_display() {
        let err = Error::SessionExpired;
        assert!(err.to_string().contains("Session expired"));

        let err = Error::Api { status: 429, message: "Too many requests".into() };
        assert_eq!(err.to_string(), "API error 429: Too many requests");
    }
}
