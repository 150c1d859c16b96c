//! Cached bundler invocation for a static-site build pipeline.
//!
//! [`BundlePlugin`] runs a [`Compiler`] only when the declared dependency
//! files changed since the last successful build, persists what it emitted
//! in a [`bundle_cache::Store`], and merges the (fresh or cached) artifacts
//! into the host's [`FileCollection`] and [`Metadata`] tree.
//!
//! The stages are usable on their own: [`validator`] judges freshness,
//! [`executor`] builds and persists, [`populator`] installs from the store.

#![warn(missing_docs)]

pub mod compiler;
pub mod error;
pub mod executor;
pub mod glob;
pub mod host;
pub mod orchestrator;
pub mod populator;
pub mod validator;

pub use compiler::{
    AssetNames, BuildReport, ChildReport, CompiledOutput, Compiler, MemoryFs, StatsReport,
};
pub use error::{CompilerError, PipelineError};
pub use executor::{execute, AssetIndex, ASSET_INDEX_KEY, STATS_DISPLAY_KEY, STATS_KEY};
pub use glob::match_globs;
pub use host::{read_source_dir, FileCollection, FileEntry, Host, Metadata, ProjectHost};
pub use orchestrator::{BundlePlugin, Phase, RunOutcome};
pub use populator::{missing_artifact, populate, PopulateSummary};
pub use validator::{
    assess, confirm_cached_build, validate, Assessment, Freshness, InvalidReason,
};
