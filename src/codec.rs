//! JSON object codec on top of [`KvAdapter`].
//!
//! A missing key reads as `None`. A present but unparsable value is a
//! [`CodecError::Deserialize`], never `None`, so corruption does not pass for
//! an absent record.

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    keys::StorageKey,
    kv::{KvAdapter, KvError},
};

/// Codec failures.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The substrate failed.
    #[error(transparent)]
    Storage(#[from] KvError),
    /// A value could not be encoded.
    #[error("failed to encode value: {0}")]
    Serialize(#[source] serde_json::Error),
    /// A stored value is present but malformed.
    #[error("stored value at {key} is malformed: {source}")]
    Deserialize {
        /// Logical key.
        key: StorageKey,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// An update targeted a key holding nothing.
    #[error("no object stored at {key}")]
    NotFound {
        /// Logical key.
        key: StorageKey,
    },
}

/// Result alias for codec calls.
pub type CodecResult<T> = Result<T, CodecError>;

/// Typed object access over string values.
#[derive(Clone)]
pub struct ObjectCodec {
    kv: KvAdapter,
}

impl ObjectCodec {
    /// Codec writing through `kv`.
    pub fn new(kv: KvAdapter) -> Self {
        Self { kv }
    }

    /// Underlying adapter.
    pub fn kv(&self) -> &KvAdapter {
        &self.kv
    }

    /// Serializes and writes `value`.
    pub async fn store_object<T: Serialize>(&self, key: &StorageKey, value: &T) -> CodecResult<()> {
        let encoded = encode(value)?;
        self.kv.set(key, encoded).await?;
        Ok(())
    }

    /// Serializes and writes several values.
    pub async fn store_objects<T: Serialize>(&self, items: &[(StorageKey, T)]) -> CodecResult<()> {
        let pairs = items
            .iter()
            .map(|(key, value)| Ok((key.clone(), encode(value)?)))
            .collect::<CodecResult<Vec<_>>>()?;
        self.kv.set_many(pairs).await?;
        Ok(())
    }

    /// Reads and decodes the value at `key`.
    pub async fn get_object<T: DeserializeOwned>(&self, key: &StorageKey) -> CodecResult<Option<T>> {
        match self.kv.get(key).await? {
            Some(raw) => decode(key, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Reads several values, preserving input order.
    pub async fn get_objects<T: DeserializeOwned>(
        &self,
        keys: &[StorageKey],
    ) -> CodecResult<Vec<(StorageKey, Option<T>)>> {
        self.kv
            .get_many(keys)
            .await?
            .into_iter()
            .map(|(key, raw)| {
                let value = raw.map(|raw| decode(&key, &raw)).transpose()?;
                Ok((key, value))
            })
            .collect()
    }

    /// Shallow-merges `partial` into the existing object and returns the result.
    pub async fn update_object<P, T>(&self, key: &StorageKey, partial: &P) -> CodecResult<T>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        if self.kv.get(key).await?.is_none() {
            return Err(CodecError::NotFound { key: key.clone() });
        }
        self.kv.merge(key, encode(partial)?).await?;
        self.get_object(key)
            .await?
            .ok_or_else(|| CodecError::NotFound { key: key.clone() })
    }
}

fn encode<T: Serialize>(value: &T) -> CodecResult<String> {
    serde_json::to_string(value).map_err(CodecError::Serialize)
}

fn decode<T: DeserializeOwned>(key: &StorageKey, raw: &str) -> CodecResult<T> {
    serde_json::from_str(raw).map_err(|source| CodecError::Deserialize {
        key: key.clone(),
        source,
    })
}
