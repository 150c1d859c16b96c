//! One plugin invocation: validate, build when needed, populate, flush.

use std::collections::HashSet;
use std::fmt;

use bundle_cache::Store;
use bundle_config::{resolve_config_list, validate_options, BuildConfig, ErrorPolicy, PluginOptions};
use tracing::{debug, error, info, instrument, warn};

use crate::compiler::Compiler;
use crate::error::{CompilerError, PipelineError};
use crate::executor::execute;
use crate::host::{FileCollection, Host, Metadata};
use crate::populator::{populate, PopulateSummary};
use crate::validator::{confirm_cached_build, validate, Assessment, Freshness, InvalidReason};

/// Stage of an invocation, reported with failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Opening the store and resolving configs.
    Initializing,
    /// Comparing dependency times with the ledger.
    Validating,
    /// Running the compiler and persisting its output.
    Building,
    /// Installing artifacts into the host collections.
    Populating,
    /// Writing the store back to disk.
    Flushing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Initializing => "initializing",
            Phase::Validating => "validating",
            Phase::Building => "building",
            Phase::Populating => "populating",
            Phase::Flushing => "flushing",
        })
    }
}

/// How an invocation ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The compiler ran and its output was installed.
    Built {
        /// Why the cached build could not be used.
        reason: InvalidReason,
        /// What was installed.
        summary: PopulateSummary,
    },
    /// The previous build was installed from the store.
    Cached {
        /// What was installed.
        summary: PopulateSummary,
    },
    /// The invocation failed and the failure was only logged.
    Failed {
        /// Stage that failed.
        phase: Phase,
        /// The failure.
        error: PipelineError,
    },
}

impl RunOutcome {
    /// Returns `true` when the output came from the store.
    pub fn from_cache(&self) -> bool {
        matches!(self, RunOutcome::Cached { .. })
    }

    /// What was installed, unless the invocation failed.
    pub fn summary(&self) -> Option<&PopulateSummary> {
        match self {
            RunOutcome::Built { summary, .. } | RunOutcome::Cached { summary } => Some(summary),
            RunOutcome::Failed { .. } => None,
        }
    }

    /// Returns `true` for [`RunOutcome::Failed`].
    pub fn is_failed(&self) -> bool {
        matches!(self, RunOutcome::Failed { .. })
    }
}

type Staged<T> = Result<T, (Phase, PipelineError)>;

fn at<E: Into<PipelineError>>(phase: Phase) -> impl FnOnce(E) -> (Phase, PipelineError) {
    move |e| (phase, e.into())
}

/// The plugin: options plus the compiler it drives.
pub struct BundlePlugin<C> {
    options: PluginOptions,
    compiler: C,
}

impl<C: Compiler> BundlePlugin<C> {
    /// Creates a plugin instance.
    pub fn new(options: PluginOptions, compiler: C) -> Self {
        Self { options, compiler }
    }

    /// The options this plugin runs with.
    pub fn options(&self) -> &PluginOptions {
        &self.options
    }

    /// The compiler this plugin drives.
    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// Runs one invocation against the host's collections.
    ///
    /// The store under `host.resolve(cache_dir)` is flushed exactly once
    /// whether or not the invocation succeeds. Under
    /// [`ErrorPolicy::BestEffort`] failures are logged and returned as
    /// [`RunOutcome::Failed`]; under [`ErrorPolicy::Strict`] they are
    /// returned as `Err`.
    #[instrument(skip_all, fields(cache_dir = %self.options.cache_dir.display()))]
    pub async fn run(
        &self,
        files: &mut FileCollection,
        metadata: &mut Metadata,
        host: &dyn Host,
    ) -> Result<RunOutcome, PipelineError> {
        let cache_dir = host.resolve(&self.options.cache_dir);
        let mut store = match Store::open(&cache_dir).await {
            Ok(store) => store,
            Err(e) => return self.settle(Phase::Initializing, e.into()),
        };

        let result = self.drive(&mut store, files, metadata, host).await;
        let flushed = store.flush().await;

        match (result, flushed) {
            (Ok(outcome), Ok(summary)) => {
                debug!(written = ?summary.written, blobs_removed = summary.blobs_removed, "store flushed");
                Ok(outcome)
            }
            (Ok(_), Err(e)) => self.settle(Phase::Flushing, e.into()),
            (Err((phase, error)), flushed) => {
                if let Err(e) = flushed {
                    warn!(error = %e, "store flush after failure also failed");
                }
                self.settle(phase, error)
            }
        }
    }

    async fn drive(
        &self,
        store: &mut Store,
        files: &mut FileCollection,
        metadata: &mut Metadata,
        host: &dyn Host,
    ) -> Staged<RunOutcome> {
        validate_options(&self.options).map_err(at(Phase::Initializing))?;
        let configs = resolve_config_list(&self.options.config, |p| host.resolve(p))
            .map_err(at(Phase::Initializing))?;
        if self.options.clear_cache {
            store.clear_all().await;
        }

        let mut assessment =
            validate(self.options.dependencies.as_ref(), files, store.ledger_mut())
                .await
                .map_err(at(Phase::Validating))?;
        confirm_cached_build(&mut assessment, store).await;
        let freshness = assessment.freshness;
        info!(%freshness, matched = assessment.matched.len(), "validated dependencies");

        let reason = match freshness {
            Freshness::Valid => match populate(store, files, metadata, true, &self.options).await {
                Ok(summary) => return Ok(RunOutcome::Cached { summary }),
                Err(PipelineError::MissingArtifact(key)) => {
                    warn!(%key, "cached artifact unreadable");
                    InvalidReason::CachedBuildMissing
                }
                Err(e) => return Err((Phase::Populating, e)),
            },
            Freshness::Invalid(reason) => reason,
        };

        self.build(store, files, metadata, host, &configs, &assessment)
            .await
            .map(|summary| RunOutcome::Built { reason, summary })
    }

    async fn build(
        &self,
        store: &mut Store,
        files: &mut FileCollection,
        metadata: &mut Metadata,
        host: &dyn Host,
        configs: &[BuildConfig],
        assessment: &Assessment,
    ) -> Staged<PopulateSummary> {
        if let Err(e) = execute(&self.compiler, configs, host, &self.options.stats, store).await {
            // The refreshed times never produced artifacts.
            for path in assessment.changed_paths() {
                store.ledger_mut().forget(path).await;
            }
            if let PipelineError::Compiler(CompilerError::BuildErrors { report }) = &e {
                error!("{report}");
            }
            return Err((Phase::Building, e));
        }
        let matched: HashSet<&str> = assessment.matched.iter().map(String::as_str).collect();
        let pruned = store.ledger_mut().retain(|path| matched.contains(path)).await;
        if pruned > 0 {
            debug!(pruned, "dropped ledger records of unmatched paths");
        }
        populate(store, files, metadata, false, &self.options)
            .await
            .map_err(at(Phase::Populating))
    }

    fn settle(&self, phase: Phase, error: PipelineError) -> Result<RunOutcome, PipelineError> {
        match self.options.error_policy {
            ErrorPolicy::Strict => Err(error),
            ErrorPolicy::BestEffort => {
                error!(%phase, %error, "bundle run failed");
                Ok(RunOutcome::Failed { phase, error })
            }
        }
    }
}
