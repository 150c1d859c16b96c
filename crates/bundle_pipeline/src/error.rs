//! Error types for the build pipeline.

use std::path::PathBuf;

use bundle_cache::CacheError;
use bundle_config::ConfigError;

/// Failures reported by or about the compiler.
#[derive(Debug, thiserror::Error)]
pub enum CompilerError {
    /// The compiler could not run at all.
    #[error("compiler failed to run: {0}")]
    Run(String),

    /// The build completed but reported errors. Carries the rendered report.
    #[error("build failed:\n{report}")]
    BuildErrors {
        /// Human-readable build report.
        report: String,
    },

    /// The structured report does not have one child per configuration.
    #[error("compiler reported {children} child reports for {configs} configurations")]
    ChildMismatch {
        /// Number of child reports.
        children: usize,
        /// Number of configurations passed to the compiler.
        configs: usize,
    },

    /// An asset listed in the report is absent from the output filesystem.
    #[error("emitted asset {} is missing from the output filesystem", .0.display())]
    MissingOutput(PathBuf),

    /// An asset's location cannot be expressed relative to the destination.
    #[error("asset {} cannot be placed relative to {}", .asset.display(), .destination.display())]
    UnplaceableAsset {
        /// Absolute path of the asset.
        asset: PathBuf,
        /// The host's destination directory.
        destination: PathBuf,
    },
}

/// Any failure of a pipeline invocation.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Options or build configs could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The compiler failed.
    #[error(transparent)]
    Compiler(#[from] CompilerError),

    /// A record the asset index refers to is not in the store.
    #[error("missing artifact: {0}")]
    MissingArtifact(String),

    /// The store could not be read or written.
    #[error(transparent)]
    Store(#[from] CacheError),

    /// A dependency glob does not parse.
    #[error("invalid dependency pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The host's source tree could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_errors_include_report() {
        let err = CompilerError::BuildErrors {
            report: "ERROR in ./index.js".to_string(),
        };
        assert!(err.to_string().contains("ERROR in ./index.js"));
    }

    #[test]
    fn compiler_error_is_transparent() {
        let err: PipelineError = CompilerError::Run("spawn failed".to_string()).into();
        assert_eq!(err.to_string(), "compiler failed to run: spawn failed");
    }

    #[test]
    fn missing_artifact_names_path() {
        let err = PipelineError::MissingArtifact("js/a.js".to_string());
        assert_eq!(err.to_string(), "missing artifact: js/a.js");
    }

    #[test]
    fn invalid_pattern_display() {
        let err = PipelineError::InvalidPattern {
            pattern: "src/[".to_string(),
            reason: "unclosed character class".to_string(),
        };
        assert!(err.to_string().contains("'src/['"));
    }

    #[test]
    fn child_mismatch_display() {
        let err = CompilerError::ChildMismatch {
            children: 1,
            configs: 2,
        };
        assert_eq!(
            err.to_string(),
            "compiler reported 1 child reports for 2 configurations"
        );
    }
}
