//! Modification-time ledger for dependency files.

use std::path::Path;

use bundle_common::ModTime;

use crate::collection::Collection;
use crate::error::CacheError;

/// Collection name of the ledger.
pub const MOD_TIMES: &str = "mod-times";

/// Last-observed modification time per tracked dependency path.
#[derive(Debug)]
pub struct ModTimeLedger {
    records: Collection<ModTime>,
}

impl ModTimeLedger {
    pub(crate) async fn load(cache_dir: &Path) -> Self {
        Self {
            records: Collection::load(cache_dir, MOD_TIMES).await,
        }
    }

    pub(crate) async fn save(&mut self, cache_dir: &Path) -> Result<bool, CacheError> {
        self.records.save(cache_dir).await
    }

    /// The recorded modification time of `path`, if any.
    pub async fn get(&self, path: &str) -> Option<ModTime> {
        self.records.get(path).copied()
    }

    /// Records `time` for `path`, overwriting any previous value.
    pub async fn record(&mut self, path: &str, time: ModTime) {
        if self.records.get(path) != Some(&time) {
            self.records.insert(path, time);
        }
    }

    /// Drops the record for `path`, so the next comparison treats it as new.
    pub async fn forget(&mut self, path: &str) {
        self.records.remove(path);
    }

    /// Removes every record.
    pub async fn clear(&mut self) {
        self.records.clear();
    }

    /// Number of tracked paths.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no path is tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record whose path `keep` rejects. Returns how many were
    /// dropped.
    pub async fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        self.records.retain(|path, _| keep(path))
    }
}
