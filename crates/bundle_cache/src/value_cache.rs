//! Named build values (asset index, stats report, rendered stats).

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::collection::Collection;
use crate::error::CacheError;

/// Collection name of the value cache.
pub const VALUES: &str = "values";

/// Arbitrary serializable values stored by name.
#[derive(Debug)]
pub struct ValueCache {
    values: Collection<Value>,
}

impl ValueCache {
    pub(crate) async fn load(cache_dir: &Path) -> Self {
        Self {
            values: Collection::load(cache_dir, VALUES).await,
        }
    }

    pub(crate) async fn save(&mut self, cache_dir: &Path) -> Result<bool, CacheError> {
        self.values.save(cache_dir).await
    }

    /// Stores `value` under `key`.
    pub async fn store<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value).map_err(CacheError::serialization)?;
        self.values.insert(key, value);
        Ok(())
    }

    /// Retrieves the value under `key`.
    ///
    /// Returns `None` when the key is absent or the stored value does not
    /// deserialize as `T`.
    pub async fn retrieve<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "stored value has an unexpected shape");
                None
            }
        }
    }

    /// Returns `true` if a value is stored under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Removes every value.
    pub async fn clear(&mut self) {
        self.values.clear();
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
