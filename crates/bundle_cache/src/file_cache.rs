//! Emitted build artifacts: bytes in the blob store, index in a collection.

use std::collections::HashSet;
use std::path::Path;

use bundle_common::ContentHash;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::blob::BlobStore;
use crate::collection::Collection;
use crate::error::CacheError;

/// Collection name of the artifact index.
pub const FILES: &str = "files";

/// An artifact as handed to and returned from the cache.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArtifactRecord {
    /// Raw file bytes.
    pub contents: Vec<u8>,
    /// Side metadata carried alongside the bytes.
    pub metadata: Map<String, Value>,
}

impl ArtifactRecord {
    /// An artifact with no side metadata.
    pub fn new(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: contents.into(),
            metadata: Map::new(),
        }
    }
}

/// Index entry locating an artifact's bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Content hash of the bytes, which is also the blob key.
    pub hash: ContentHash,
    /// Size of the bytes.
    pub size: u64,
    /// Side metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Artifacts keyed by build-output path.
#[derive(Debug)]
pub struct FileCache {
    index: Collection<FileRecord>,
    blobs: BlobStore,
}

impl FileCache {
    pub(crate) async fn load(cache_dir: &Path) -> Self {
        Self {
            index: Collection::load(cache_dir, FILES).await,
            blobs: BlobStore::new(cache_dir),
        }
    }

    pub(crate) async fn save(&mut self, cache_dir: &Path) -> Result<bool, CacheError> {
        self.index.save(cache_dir).await
    }

    /// Stores one artifact under `key`.
    pub async fn store(&mut self, key: &str, record: ArtifactRecord) -> Result<(), CacheError> {
        let hash = self.blobs.write(&record.contents).await?;
        self.index.insert(
            key,
            FileRecord {
                hash,
                size: record.contents.len() as u64,
                metadata: record.metadata,
            },
        );
        Ok(())
    }

    /// Replaces the whole index with `records`.
    ///
    /// Blob writes run concurrently. The previous entries stay in place until
    /// every write has succeeded; their unreferenced blobs go at [`gc`].
    ///
    /// [`gc`]: FileCache::gc
    pub async fn replace_all(
        &mut self,
        records: Vec<(String, ArtifactRecord)>,
    ) -> Result<(), CacheError> {
        let blobs = &self.blobs;
        let hashes = try_join_all(records.iter().map(|(_, r)| blobs.write(&r.contents))).await?;
        self.index.clear();
        for ((key, record), hash) in records.into_iter().zip(hashes) {
            debug!(path = %key, blob = %hash, "stored artifact");
            self.index.insert(
                key,
                FileRecord {
                    hash,
                    size: record.contents.len() as u64,
                    metadata: record.metadata,
                },
            );
        }
        Ok(())
    }

    /// Retrieves the artifact under `key`.
    ///
    /// Returns `None` if the key is unknown or its blob is missing or damaged.
    pub async fn retrieve(&self, key: &str) -> Option<ArtifactRecord> {
        let entry = self.index.get(key)?;
        let Some(contents) = self.blobs.read(&entry.hash).await else {
            warn!(path = key, blob = %entry.hash, "artifact indexed but blob unusable");
            return None;
        };
        Some(ArtifactRecord {
            contents,
            metadata: entry.metadata.clone(),
        })
    }

    /// Returns the index entry under `key` without reading the bytes.
    pub fn entry(&self, key: &str) -> Option<&FileRecord> {
        self.index.get(key)
    }

    /// Returns `true` if an artifact is indexed under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Removes every artifact from the index. Blobs are reclaimed by
    /// [`FileCache::gc`].
    pub async fn clear(&mut self) {
        self.index.clear();
    }

    /// Deletes blobs no longer referenced by the index.
    pub async fn gc(&self) -> Result<usize, CacheError> {
        let live: HashSet<ContentHash> = self.index.iter().map(|(_, r)| r.hash).collect();
        self.blobs.gc(&live).await
    }

    /// Iterates over artifact paths in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.iter().map(|(k, _)| k.as_str())
    }

    /// Number of indexed artifacts.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if no artifact is indexed.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The underlying blob store.
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }
}
