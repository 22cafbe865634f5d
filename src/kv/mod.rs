//! Key-value substrate seam and its async, namespaced adapter.

/// In-memory backend.
pub mod memory;
/// SQLite backend.
pub mod sqlite;

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::keys::{Namespace, StorageKey};

/// Failures raised by a key-value backend.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// The substrate cannot be reached (full disk, revoked permission, corrupted backend).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// SQLite reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A merge hit a value that is not a JSON object.
    #[error("cannot merge into non-object value at {key}")]
    MergeTarget {
        /// Physical key.
        key: String,
    },
    /// The blocking worker running the call went away.
    #[error("storage worker failed: {0}")]
    Join(String),
}

/// Result alias for backend calls.
pub type KvResult<T> = Result<T, KvError>;

/// Synchronous string-keyed, string-valued store.
///
/// Each single-key call must be atomic. Nothing is expected across keys.
pub trait KvBackend: Send {
    /// Value at `key`, `None` when absent.
    fn get(&self, key: &str) -> KvResult<Option<String>>;
    /// Writes `value` at `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> KvResult<()>;
    /// Deletes `key`. Absent keys are not an error.
    fn remove(&mut self, key: &str) -> KvResult<()>;
    /// Every key held by the backend.
    fn all_keys(&self) -> KvResult<Vec<String>>;
    /// Deletes every key.
    fn clear(&mut self) -> KvResult<()>;

    /// Values for `keys`, in input order.
    fn multi_get(&self, keys: &[String]) -> KvResult<Vec<(String, Option<String>)>> {
        keys.iter()
            .map(|key| Ok((key.clone(), self.get(key)?)))
            .collect()
    }

    /// Writes every pair.
    fn multi_set(&mut self, pairs: &[(String, String)]) -> KvResult<()> {
        for (key, value) in pairs {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Deletes every key.
    fn multi_remove(&mut self, keys: &[String]) -> KvResult<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }

    /// Shallow-merges the JSON object `partial` into the stored JSON object.
    /// A missing key is written as `partial`.
    fn merge(&mut self, key: &str, partial: &str) -> KvResult<()> {
        let merged = match self.get(key)? {
            Some(existing) => merge_json(key, &existing, partial)?,
            None => partial.to_string(),
        };
        self.set(key, &merged)
    }
}

/// Shallow JSON object merge shared by the backends.
pub fn merge_json(key: &str, existing: &str, partial: &str) -> KvResult<String> {
    let not_object = || KvError::MergeTarget {
        key: key.to_string(),
    };
    let mut base: Value = serde_json::from_str(existing).map_err(|_| not_object())?;
    let patch: Value = serde_json::from_str(partial).map_err(|_| not_object())?;
    let (Some(base_map), Value::Object(patch_map)) = (base.as_object_mut(), patch) else {
        return Err(not_object());
    };
    for (field, value) in patch_map {
        base_map.insert(field, value);
    }
    Ok(base.to_string())
}

/// Async, namespaced view over a [`KvBackend`].
///
/// Calls run on the blocking pool; the backend sits behind a mutex so single-key
/// operations never interleave.
#[derive(Clone)]
pub struct KvAdapter {
    backend: Arc<Mutex<Box<dyn KvBackend>>>,
    namespace: Namespace,
}

impl KvAdapter {
    /// Wraps `backend`, prefixing every key with `namespace`.
    pub fn new(backend: impl KvBackend + 'static, namespace: Namespace) -> Self {
        Self {
            backend: Arc::new(Mutex::new(Box::new(backend))),
            namespace,
        }
    }

    /// Namespace applied to every key.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Reads one value.
    pub async fn get(&self, key: &StorageKey) -> KvResult<Option<String>> {
        let physical = self.namespace.physical(key);
        debug!(key = %physical, "kv get");
        self.run(move |kv| kv.get(&physical)).await
    }

    /// Writes one value.
    pub async fn set(&self, key: &StorageKey, value: String) -> KvResult<()> {
        let physical = self.namespace.physical(key);
        debug!(key = %physical, "kv set");
        self.run(move |kv| kv.set(&physical, &value)).await
    }

    /// Shallow-merges a JSON object into the stored one.
    pub async fn merge(&self, key: &StorageKey, partial: String) -> KvResult<()> {
        let physical = self.namespace.physical(key);
        debug!(key = %physical, "kv merge");
        self.run(move |kv| kv.merge(&physical, &partial)).await
    }

    /// Removes one key.
    pub async fn remove(&self, key: &StorageKey) -> KvResult<()> {
        let physical = self.namespace.physical(key);
        debug!(key = %physical, "kv remove");
        self.run(move |kv| kv.remove(&physical)).await
    }

    /// Reads several keys, preserving input order.
    pub async fn get_many(
        &self,
        keys: &[StorageKey],
    ) -> KvResult<Vec<(StorageKey, Option<String>)>> {
        let physical: Vec<String> = keys.iter().map(|k| self.namespace.physical(k)).collect();
        debug!(count = physical.len(), "kv multi get");
        let values = self.run(move |kv| kv.multi_get(&physical)).await?;
        Ok(keys
            .iter()
            .cloned()
            .zip(values.into_iter().map(|(_, value)| value))
            .collect())
    }

    /// Writes several values.
    pub async fn set_many(&self, pairs: Vec<(StorageKey, String)>) -> KvResult<()> {
        let physical: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(key, value)| (self.namespace.physical(&key), value))
            .collect();
        debug!(count = physical.len(), "kv multi set");
        self.run(move |kv| kv.multi_set(&physical)).await
    }

    /// Removes several keys.
    pub async fn remove_many(&self, keys: &[StorageKey]) -> KvResult<()> {
        let physical: Vec<String> = keys.iter().map(|k| self.namespace.physical(k)).collect();
        debug!(count = physical.len(), "kv multi remove");
        self.run(move |kv| kv.multi_remove(&physical)).await
    }

    /// Logical keys inside the namespace.
    pub async fn keys(&self) -> KvResult<Vec<StorageKey>> {
        let all = self.run(|kv| kv.all_keys()).await?;
        Ok(all
            .iter()
            .filter_map(|physical| self.namespace.logical(physical))
            .collect())
    }

    /// Removes every key inside the namespace. Foreign keys survive.
    pub async fn clear(&self) -> KvResult<()> {
        let namespace = self.namespace.clone();
        debug!(prefix = namespace.prefix(), "kv clear namespace");
        self.run(move |kv| {
            let owned: Vec<String> = kv
                .all_keys()?
                .into_iter()
                .filter(|k| namespace.contains(k))
                .collect();
            kv.multi_remove(&owned)
        })
        .await
    }

    /// Every physical `(key, value)` pair in the namespace, sorted by key.
    pub async fn entries(&self) -> KvResult<Vec<(String, String)>> {
        let namespace = self.namespace.clone();
        let mut pairs = self
            .run(move |kv| {
                let owned: Vec<String> = kv
                    .all_keys()?
                    .into_iter()
                    .filter(|k| namespace.contains(k))
                    .collect();
                kv.multi_get(&owned)
            })
            .await?
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect::<Vec<_>>();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(prefix = self.namespace.prefix(), count = pairs.len(), "kv namespace dump");
        Ok(pairs)
    }

    /// Writes physical pairs verbatim.
    pub async fn restore_raw(&self, pairs: Vec<(String, String)>) -> KvResult<()> {
        debug!(count = pairs.len(), "kv raw restore");
        self.run(move |kv| kv.multi_set(&pairs)).await
    }

    async fn run<T, F>(&self, f: F) -> KvResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn KvBackend) -> KvResult<T> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || {
            let mut guard = backend.blocking_lock();
            f(guard.as_mut())
        })
        .await
        .map_err(|e| KvError::Join(e.to_string()))?
    }
}
