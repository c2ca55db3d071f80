//! System keyring-based storage (feature-gated).
//!
//! All keys are kept in a single keyring entry as a JSON object, so that
//! `remove_all` is one credential deletion.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use super::KeyValueStore;
use crate::error::{Error, Result};

/// Token storage using the system keyring (Secret Service / Keychain / Credential Manager).
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
    account: String,
}

impl KeyringStore {
    /// Service name for keyring entries.
    const SERVICE_NAME: &str = "yatra-session";

    /// Account name of the single entry holding the session.
    const ACCOUNT: &str = "session";

    /// Create a new keyring storage with the default service name.
    pub fn new() -> Self {
        Self::with_service(Self::SERVICE_NAME)
    }

    /// Create a keyring storage with a custom service name.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: Self::ACCOUNT.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, &self.account).map_err(|e| Error::Keyring(e.to_string()))
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match self.entry()?.get_password() {
            Ok(json) => {
                serde_json::from_str(&json).map_err(|e| Error::StorageSerialization(e.to_string()))
            }
            Err(keyring::Error::NoEntry) => Ok(BTreeMap::new()),
            Err(e) => Err(Error::Keyring(e.to_string())),
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value)]).await
    }

    /// The whole map lives in one keyring entry, so a batch is one write.
    #[instrument(skip_all, fields(count = entries.len()))]
    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut data = self.read_all()?;
        for (key, value) in entries {
            data.insert((*key).to_string(), (*value).to_string());
        }
        let json =
            serde_json::to_string(&data).map_err(|e| Error::StorageSerialization(e.to_string()))?;
        self.entry()?
            .set_password(&json)
            .map_err(|e| Error::Keyring(e.to_string()))?;
        debug!(service = %self.service, "Session saved to keyring");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_all(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::Keyring(e.to_string())),
        }
    }

    fn name(&self) -> &str {
        "keyring"
    }
}
