//! In-memory [`KvBackend`] with a shared handle and an availability switch.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use hashbrown::HashMap;

use super::{KvBackend, KvError, KvResult};

#[derive(Debug, Default)]
struct Inner {
    values: HashMap<String, String>,
    unavailable: bool,
}

/// Map-backed store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryKv {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// While `true`, every call fails with [`KvError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.unavailable = unavailable;
        }
    }

    /// Copy of the stored pairs, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.inner
            .lock()
            .map(|inner| {
                inner
                    .values
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Writes a raw physical pair, bypassing any namespace.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.values.insert(key.into(), value.into());
        }
    }

    fn lock(&self) -> KvResult<MutexGuard<'_, Inner>> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| KvError::Unavailable("memory store poisoned".to_string()))?;
        if inner.unavailable {
            return Err(KvError::Unavailable("memory store switched off".to_string()));
        }
        Ok(inner)
    }
}

impl KvBackend for MemoryKv {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        Ok(self.lock()?.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> KvResult<()> {
        self.lock()?
            .values
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> KvResult<()> {
        self.lock()?.values.remove(key);
        Ok(())
    }

    fn all_keys(&self) -> KvResult<Vec<String>> {
        Ok(self.lock()?.values.keys().cloned().collect())
    }

    fn clear(&mut self) -> KvResult<()> {
        self.lock()?.values.clear();
        Ok(())
    }

    fn multi_set(&mut self, pairs: &[(String, String)]) -> KvResult<()> {
        let mut inner = self.lock()?;
        for (key, value) in pairs {
            inner.values.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
