//! Fault-injecting store used by unit tests.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{KeyValueStore, MemoryStore};
use crate::error::{Error, Result};

/// [`MemoryStore`] wrapper whose operations can be made to fail on demand.
#[derive(Debug, Default)]
pub(crate) struct FaultyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_remove: AtomicBool,
    fail_set_key: Mutex<Option<String>>,
    batch_writes: AtomicUsize,
}

impl FaultyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_remove(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_set_for(&self, key: &str) {
        *self.fail_set_key.lock().unwrap() = Some(key.to_string());
    }

    /// Number of successful `set_many` calls.
    pub(crate) fn batch_writes(&self) -> usize {
        self.batch_writes.load(Ordering::SeqCst)
    }

    fn check_set(&self, key: &str) -> Result<()> {
        if self.fail_set_key.lock().unwrap().as_deref() == Some(key) {
            return Err(Error::Storage(format!("injected write failure for {key}")));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FaultyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Storage("injected read failure".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_set(key)?;
        self.inner.set(key, value).await
    }

    /// All-or-nothing, like the single-write backends.
    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        for (key, _) in entries {
            self.check_set(key)?;
        }
        self.inner.set_many(entries).await?;
        self.batch_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove_all(&self) -> Result<()> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(Error::Storage("injected remove failure".into()));
        }
        self.inner.remove_all().await
    }

    fn name(&self) -> &str {
        "faulty"
    }
}
