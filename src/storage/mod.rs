//! Durable key-value backends and the session [`TokenStore`] built on them.
//!
//! Provides the [`KeyValueStore`] trait and implementations:
//! - [`FileStore`] - JSON file with 0600 permissions and atomic writes
//! - [`MemoryStore`] - In-memory (testing, ephemeral sessions)
//! - [`KeyringStore`] - System keyring (requires `system-keyring` feature)
//!
//! Values are never logged by any backend.

mod file;
mod memory;
mod tokens;

#[cfg(feature = "system-keyring")]
mod keyring;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use tokens::{ACCESS_KEY, REFRESH_KEY, TokenPair, TokenStore};

#[cfg(feature = "system-keyring")]
pub use keyring::KeyringStore;

use crate::error::Result;

/// Trait for durable key-value backends.
///
/// Implementations must survive process restarts (except [`MemoryStore`])
/// and be safe to share across tasks.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `Ok(None)` if the key is not stored.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, overwriting any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Write several values in one step.
    ///
    /// Backends that can persist the batch with a single write override
    /// this; the default writes the entries one at a time and may stop
    /// part-way.
    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }

    /// Remove every stored key in one step.
    ///
    /// Returns `Ok(())` when nothing was stored.
    async fn remove_all(&self) -> Result<()>;

    /// Name of this storage backend.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Blanket impl for `Arc<T>`.
#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }
    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        (**self).set_many(entries).await
    }
    async fn remove_all(&self) -> Result<()> {
        (**self).remove_all().await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Blanket impl for `Box<T>`.
#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }
    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        (**self).set_many(entries).await
    }
    async fn remove_all(&self) -> Result<()> {
        (**self).remove_all().await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_arc_store() {
        let store = Arc::new(MemoryStore::new());

        store.set("access", "A1").await.unwrap();
        assert_eq!(store.get("access").await.unwrap().as_deref(), Some("A1"));
        assert_eq!(store.name(), "memory");

        store.remove_all().await.unwrap();
        assert!(store.get("access").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_boxed_dyn_store() {
        let store: Box<dyn KeyValueStore> = Box::new(MemoryStore::new());
        store.set("refresh", "R1").await.unwrap();
        assert_eq!(store.get("refresh").await.unwrap().as_deref(), Some("R1"));

        store.set_many(&[("refresh", "R2"), ("access", "A2")]).await.unwrap();
        assert_eq!(store.get("refresh").await.unwrap().as_deref(), Some("R2"));
        assert_eq!(store.get("access").await.unwrap().as_deref(), Some("A2"));
    }

    /// Backend that only implements single-key writes.
    struct SingleKeyStore(MemoryStore);

    #[async_trait]
    impl KeyValueStore for SingleKeyStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.0.get(key).await
        }
        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.0.set(key, value).await
        }
        async fn remove_all(&self) -> Result<()> {
            self.0.remove_all().await
        }
    }

    #[tokio::test]
    async fn test_default_set_many_writes_every_entry() {
        let store = SingleKeyStore(MemoryStore::new());
        store.set_many(&[("access", "A1"), ("refresh", "R1")]).await.unwrap();

        assert_eq!(store.get("access").await.unwrap().as_deref(), Some("A1"));
        assert_eq!(store.get("refresh").await.unwrap().as_deref(), Some("R1"));
        assert_eq!(store.name(), "unknown");
    }
}
