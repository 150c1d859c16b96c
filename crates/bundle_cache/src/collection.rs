//! Named, JSON-backed record collections.
//!
//! A collection is stored as `<cache_dir>/<name>.json` and kept in memory
//! between [`Collection::load`] and [`Collection::save`]. Only collections
//! that changed since loading are written back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CacheError;

/// Current collection file format version.
const COLLECTION_FORMAT_VERSION: u32 = 1;

#[derive(Deserialize)]
struct CollectionFile<V> {
    format_version: u32,
    records: BTreeMap<String, V>,
}

#[derive(Serialize)]
struct CollectionFileRef<'a, V> {
    format_version: u32,
    records: &'a BTreeMap<String, V>,
}

/// A named map of string keys to records of type `V`.
#[derive(Debug, Clone)]
pub struct Collection<V> {
    name: &'static str,
    records: BTreeMap<String, V>,
    dirty: bool,
}

impl<V> Collection<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Creates an empty, unsaved collection.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            records: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Loads the collection from `cache_dir`.
    ///
    /// Fail-safe: a missing, unparsable or incompatible file loads as an
    /// empty collection, so a damaged cache turns into cache misses.
    pub async fn load(cache_dir: &Path, name: &'static str) -> Self {
        let path = Self::file_path(cache_dir, name);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(collection = name, error = %e, "unreadable collection, starting empty");
                }
                return Self::new(name);
            }
        };

        match serde_json::from_str::<CollectionFile<V>>(&content) {
            Ok(file) if file.format_version == COLLECTION_FORMAT_VERSION => {
                debug!(collection = name, records = file.records.len(), "loaded collection");
                Self {
                    name,
                    records: file.records,
                    dirty: false,
                }
            }
            Ok(file) => {
                let err = CacheError::VersionMismatch {
                    path,
                    expected: COLLECTION_FORMAT_VERSION,
                    actual: file.format_version,
                };
                warn!(collection = name, error = %err, "incompatible collection, starting empty");
                Self::new(name)
            }
            Err(e) => {
                warn!(collection = name, error = %e, "corrupt collection, starting empty");
                Self::new(name)
            }
        }
    }

    /// Writes the collection to `cache_dir` if it changed. Returns whether a
    /// write happened.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// an interrupted save leaves the previous contents intact.
    pub async fn save(&mut self, cache_dir: &Path) -> Result<bool, CacheError> {
        if !self.dirty {
            return Ok(false);
        }
        tokio::fs::create_dir_all(cache_dir)
            .await
            .map_err(|e| CacheError::io(cache_dir, e))?;

        let json = serde_json::to_string_pretty(&CollectionFileRef {
            format_version: COLLECTION_FORMAT_VERSION,
            records: &self.records,
        })
        .map_err(CacheError::serialization)?;

        let path = Self::file_path(cache_dir, self.name);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| CacheError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| CacheError::io(&path, e))?;

        self.dirty = false;
        debug!(collection = self.name, records = self.records.len(), "saved collection");
        Ok(true)
    }
}

impl<V> Collection<V> {
    /// Path of the collection file inside `cache_dir`.
    pub fn file_path(cache_dir: &Path, name: &str) -> PathBuf {
        cache_dir.join(format!("{name}.json"))
    }

    /// Returns the record stored under `key`.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.records.get(key)
    }

    /// Returns `true` if a record is stored under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// Inserts or overwrites a record.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        self.dirty = true;
        self.records.insert(key.into(), value)
    }

    /// Removes a record, returning it if it existed.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let removed = self.records.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Keeps only the records for which `keep` returns `true`. Returns how
    /// many were removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &V) -> bool) -> usize {
        let before = self.records.len();
        self.records.retain(|k, v| keep(k, v));
        let removed = before - self.records.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.records.clear();
        self.dirty = true;
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the collection holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over records in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.records.iter()
    }

    /// Returns `true` if the collection changed since it was loaded or saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
