//! Cache validation: has anything the last build depended on changed?
//!
//! Freshness is judged by modification time. The matched dependency paths
//! are compared against the ledger; any path whose time differs from the
//! recorded one (or that has no record, or no time) invalidates the cache.
//! On that verdict [`validate`] refreshes exactly the differing records, so
//! the next invocation compares against what this one observed.

use std::fmt;

use bundle_cache::{ModTimeLedger, Store};
use bundle_common::ModTime;
use bundle_config::DependencySpec;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::glob::match_globs;
use crate::host::FileCollection;
use crate::populator::missing_artifact;

/// Why a rebuild is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// No dependency patterns were configured, so caching is off.
    NoDependencies,
    /// The patterns matched no file of the collection.
    NoMatches,
    /// At least one matched file changed since the last build.
    Changed,
    /// The ledger is current but the store has no build to reuse.
    CachedBuildMissing,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InvalidReason::NoDependencies => "no dependencies specified",
            InvalidReason::NoMatches => "dependencies matched 0 files",
            InvalidReason::Changed => "dependencies changed",
            InvalidReason::CachedBuildMissing => "cached build missing",
        })
    }
}

/// Verdict of a validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The cached build can be reused.
    Valid,
    /// A rebuild is required.
    Invalid(InvalidReason),
}

impl Freshness {
    /// Returns `true` for [`Freshness::Valid`].
    pub fn is_valid(self) -> bool {
        matches!(self, Freshness::Valid)
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Freshness::Valid => f.write_str("cache valid"),
            Freshness::Invalid(reason) => write!(f, "cache invalid: {reason}"),
        }
    }
}

/// A verdict together with the paths that led to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    /// The verdict.
    pub freshness: Freshness,
    /// Dependency paths matched in the collection.
    pub matched: Vec<String>,
    /// Matched paths whose current time differs from the ledger, with that
    /// current time (`None` when the file has no modification time).
    pub changed: Vec<(String, Option<ModTime>)>,
}

impl Assessment {
    fn invalid(reason: InvalidReason) -> Self {
        Self {
            freshness: Freshness::Invalid(reason),
            matched: Vec::new(),
            changed: Vec::new(),
        }
    }

    /// Paths of [`Assessment::changed`].
    pub fn changed_paths(&self) -> impl Iterator<Item = &str> {
        self.changed.iter().map(|(p, _)| p.as_str())
    }
}

/// Judges freshness without writing to the ledger.
pub async fn assess(
    dependencies: Option<&DependencySpec>,
    files: &FileCollection,
    ledger: &ModTimeLedger,
) -> Result<Assessment, PipelineError> {
    let Some(dependencies) = dependencies else {
        return Ok(Assessment::invalid(InvalidReason::NoDependencies));
    };

    let matched = match_globs(dependencies.patterns(), files.keys().map(String::as_str))?;
    if matched.is_empty() {
        return Ok(Assessment::invalid(InvalidReason::NoMatches));
    }

    let mut changed = Vec::new();
    for path in &matched {
        let current = files.get(path).and_then(|f| f.mtime);
        let recorded = ledger.get(path).await;
        if current.is_none() || current != recorded {
            debug!(path = %path, ?current, ?recorded, "dependency changed");
            changed.push((path.clone(), current));
        }
    }

    let freshness = if changed.is_empty() {
        Freshness::Valid
    } else {
        Freshness::Invalid(InvalidReason::Changed)
    };
    Ok(Assessment {
        freshness,
        matched,
        changed,
    })
}

/// Downgrades a valid verdict to [`InvalidReason::CachedBuildMissing`] when
/// the store cannot serve a cache hit.
pub async fn confirm_cached_build(assessment: &mut Assessment, store: &Store) {
    if !assessment.freshness.is_valid() {
        return;
    }
    if let Some(key) = missing_artifact(store).await {
        warn!(%key, "cached build is incomplete");
        assessment.freshness = Freshness::Invalid(InvalidReason::CachedBuildMissing);
    }
}

/// Judges freshness and, when dependencies changed, records their current
/// modification times. Files without a time lose their record so they keep
/// invalidating the cache.
pub async fn validate(
    dependencies: Option<&DependencySpec>,
    files: &FileCollection,
    ledger: &mut ModTimeLedger,
) -> Result<Assessment, PipelineError> {
    let assessment = assess(dependencies, files, ledger).await?;
    for (path, current) in &assessment.changed {
        match current {
            Some(time) => ledger.record(path, *time).await,
            None => ledger.forget(path).await,
        }
    }
    Ok(assessment)
}
