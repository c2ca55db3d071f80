//! Session token pair persistence.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::KeyValueStore;
use crate::error::{Error, Result};

/// Storage key of the access token.
pub const ACCESS_KEY: &str = "access";

/// Storage key of the refresh token.
pub const REFRESH_KEY: &str = "refresh";

/// Access/refresh bearer credentials issued by the backend.
///
/// Both halves are always present; a pair with only one token does not exist.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Process-wide store for the session [`TokenPair`].
///
/// Pair reads share a lock that pair writes and [`clear`](Self::clear) take
/// exclusively, so no reader ever observes one token without the other.
pub struct TokenStore {
    backend: Arc<dyn KeyValueStore>,
    lock: RwLock<()>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            lock: RwLock::new(()),
        }
    }

    /// Name of the underlying storage backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Read a single raw value.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.read().await;
        self.backend.get(key).await
    }

    /// Write a single raw value.
    ///
    /// Prefer [`save_pair`](Self::save_pair); writing one key alone can leave
    /// a partial pair that [`load_pair`](Self::load_pair) reports as an error.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.write().await;
        self.backend.set(key, value).await
    }

    /// Remove both tokens.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.write().await;
        self.backend.remove_all().await?;
        debug!(backend = self.backend.name(), "Token store cleared");
        Ok(())
    }

    /// Load the stored pair.
    ///
    /// `Ok(None)` when no token is stored. A store holding only one of the two
    /// tokens is reported as a storage error, not as "logged out".
    pub async fn load_pair(&self) -> Result<Option<TokenPair>> {
        let _guard = self.lock.read().await;
        self.read_pair().await
    }

    /// Persist a full pair, replacing whatever was stored.
    ///
    /// Both tokens go to the backend in one [`set_many`] batch. If the batch
    /// fails the store is cleared before the error is returned, so a backend
    /// that stopped part-way never leaves one new token next to an old one.
    ///
    /// [`set_many`]: KeyValueStore::set_many
    pub async fn save_pair(&self, pair: &TokenPair) -> Result<()> {
        let _guard = self.lock.write().await;
        let entries = [(REFRESH_KEY, pair.refresh.as_str()), (ACCESS_KEY, pair.access.as_str())];
        if let Err(e) = self.backend.set_many(&entries).await {
            if let Err(clear_err) = self.backend.remove_all().await {
                warn!(error = %clear_err, "Failed to roll back partial token write");
            }
            return Err(e);
        }
        debug!(backend = self.backend.name(), "Token pair saved");
        Ok(())
    }

    /// Replace the access token of the pair issued with `expected_refresh`.
    ///
    /// Returns `false` without writing when no pair is stored or the stored
    /// refresh token differs (logged out, or logged in again, meanwhile).
    pub async fn replace_access(&self, expected_refresh: &str, access: &str) -> Result<bool> {
        let _guard = self.lock.write().await;
        match self.read_pair().await? {
            Some(pair) if pair.refresh == expected_refresh => {
                self.backend.set(ACCESS_KEY, access).await?;
                debug!(backend = self.backend.name(), "Access token replaced");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Clear the store only if it still holds the pair issued with `expected_refresh`.
    pub async fn clear_if_refresh(&self, expected_refresh: &str) -> Result<bool> {
        let _guard = self.lock.write().await;
        match self.read_pair().await? {
            Some(pair) if pair.refresh == expected_refresh => {
                self.backend.remove_all().await?;
                debug!(backend = self.backend.name(), "Token store cleared");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn read_pair(&self) -> Result<Option<TokenPair>> {
        let access = non_empty(self.backend.get(ACCESS_KEY).await?);
        let refresh = non_empty(self.backend.get(REFRESH_KEY).await?);
        match (access, refresh) {
            (Some(access), Some(refresh)) => Ok(Some(TokenPair { access, refresh })),
            (None, None) => Ok(None),
            (access, _) => Err(Error::Storage(format!(
                "partial token pair in {} store (missing {} token)",
                self.backend.name(),
                if access.is_some() { REFRESH_KEY } else { ACCESS_KEY }
            ))),
        }
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("backend", &self.backend.name())
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
