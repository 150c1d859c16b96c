//! The store: the three cache namespaces and their lifecycle.
//!
//! A `Store` is opened at the start of an invocation, mutated in memory by
//! the pipeline stages, and flushed once at the end. Flushing writes back
//! only the collections that changed and reclaims unreferenced blobs.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::CacheError;
use crate::file_cache::{FileCache, FILES};
use crate::ledger::{ModTimeLedger, MOD_TIMES};
use crate::value_cache::{ValueCache, VALUES};

/// One independently clearable collection of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Modification times of dependency files.
    ModTimes,
    /// Emitted build artifacts.
    Files,
    /// Asset index, stats report and rendered stats.
    Values,
}

impl Namespace {
    /// Every namespace.
    pub const ALL: [Namespace; 3] = [Namespace::ModTimes, Namespace::Files, Namespace::Values];

    /// The collection name used on disk.
    pub fn name(self) -> &'static str {
        match self {
            Namespace::ModTimes => MOD_TIMES,
            Namespace::Files => FILES,
            Namespace::Values => VALUES,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Record counts per namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// Tracked dependency paths.
    pub mod_times: usize,
    /// Indexed artifacts.
    pub files: usize,
    /// Stored values.
    pub values: usize,
}

/// What a flush wrote and reclaimed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushSummary {
    /// Namespaces whose collection file was rewritten.
    pub written: Vec<Namespace>,
    /// Number of unreferenced blobs deleted.
    pub blobs_removed: usize,
}

/// Persistent build cache rooted at a directory.
#[derive(Debug)]
pub struct Store {
    dir: PathBuf,
    ledger: ModTimeLedger,
    files: FileCache,
    values: ValueCache,
}

impl Store {
    /// Opens (creating if needed) the store in `cache_dir`.
    ///
    /// Damaged collection files load as empty collections; only a failure
    /// to create the directory is an error.
    pub async fn open(cache_dir: &Path) -> Result<Self, CacheError> {
        tokio::fs::create_dir_all(cache_dir)
            .await
            .map_err(|e| CacheError::io(cache_dir, e))?;

        let store = Self {
            dir: cache_dir.to_path_buf(),
            ledger: ModTimeLedger::load(cache_dir).await,
            files: FileCache::load(cache_dir).await,
            values: ValueCache::load(cache_dir).await,
        };
        debug!(dir = %cache_dir.display(), stats = ?store.stats(), "opened cache store");
        Ok(store)
    }

    /// The store's directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The modification-time ledger.
    pub fn ledger(&self) -> &ModTimeLedger {
        &self.ledger
    }

    /// The modification-time ledger, mutably.
    pub fn ledger_mut(&mut self) -> &mut ModTimeLedger {
        &mut self.ledger
    }

    /// The artifact cache.
    pub fn files(&self) -> &FileCache {
        &self.files
    }

    /// The artifact cache, mutably.
    pub fn files_mut(&mut self) -> &mut FileCache {
        &mut self.files
    }

    /// The value cache.
    pub fn values(&self) -> &ValueCache {
        &self.values
    }

    /// The value cache, mutably.
    pub fn values_mut(&mut self) -> &mut ValueCache {
        &mut self.values
    }

    /// Removes every record of one namespace.
    pub async fn clear(&mut self, namespace: Namespace) {
        match namespace {
            Namespace::ModTimes => self.ledger.clear().await,
            Namespace::Files => self.files.clear().await,
            Namespace::Values => self.values.clear().await,
        }
    }

    /// Removes every record of every namespace.
    pub async fn clear_all(&mut self) {
        for namespace in Namespace::ALL {
            self.clear(namespace).await;
        }
        info!(dir = %self.dir.display(), "cleared cache store");
    }

    /// Record counts per namespace.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            mod_times: self.ledger.len(),
            files: self.files.len(),
            values: self.values.len(),
        }
    }

    /// Writes changed collections back to disk and deletes blobs that no
    /// artifact references any more.
    ///
    /// The ledger is written last. If an earlier save fails, the times on
    /// disk still describe the build the other collections hold, so the next
    /// run sees the changed dependencies and rebuilds.
    pub async fn flush(&mut self) -> Result<FlushSummary, CacheError> {
        let mut summary = FlushSummary::default();
        if self.files.save(&self.dir).await? {
            summary.written.push(Namespace::Files);
        }
        if self.values.save(&self.dir).await? {
            summary.written.push(Namespace::Values);
        }
        if self.ledger.save(&self.dir).await? {
            summary.written.push(Namespace::ModTimes);
        }
        summary.blobs_removed = self.files.gc().await?;
        debug!(
            written = ?summary.written,
            blobs_removed = summary.blobs_removed,
            "flushed cache store"
        );
        Ok(summary)
    }
}
