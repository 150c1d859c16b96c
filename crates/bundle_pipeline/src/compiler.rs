//! The compiler capability and the shapes of what it reports.
//!
//! The bundler itself is external. Adapters implement [`Compiler`], write
//! emitted files into a [`MemoryFs`] instead of the real filesystem, and
//! hand back a [`BuildReport`]. [`CompiledOutput`] is a ready-made report
//! for adapters that already have the stats and files in hand.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bundle_config::{BuildConfig, StatsOptions};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CompilerError;

/// A bundler that can build a list of configurations.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Builds every configuration in one run.
    ///
    /// Build errors are reported through [`BuildReport::has_errors`]; an
    /// `Err` means the compiler could not produce a report at all.
    async fn run(&self, configs: &[BuildConfig]) -> Result<Box<dyn BuildReport>, CompilerError>;
}

/// The result of one compiler run.
pub trait BuildReport: Send + Sync {
    /// Whether the build reported errors.
    fn has_errors(&self) -> bool;

    /// Human-readable rendition of the report.
    fn render(&self, options: &StatsOptions) -> String;

    /// Structured report with one child per configuration, in order.
    fn to_structured(&self) -> StatsReport;

    /// Reads an emitted file from the compiler's output filesystem.
    fn read_file(&self, path: &Path) -> Option<Vec<u8>>;
}

/// Structured compiler report. Only `children` is interpreted; all other
/// fields are preserved as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    /// One report per configuration, index-aligned with the config list.
    #[serde(default)]
    pub children: Vec<ChildReport>,
    /// Compiler-specific fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Report for a single configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildReport {
    /// Emitted asset names per output group.
    #[serde(default)]
    pub assets_by_chunk_name: BTreeMap<String, AssetNames>,
    /// Compiler-specific fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChildReport {
    /// Adds an asset to an output group.
    pub fn with_asset(mut self, group: &str, asset: &str) -> Self {
        let entry = self
            .assets_by_chunk_name
            .entry(group.to_string())
            .or_insert_with(|| AssetNames::Many(Vec::new()));
        entry.push(asset.to_string());
        self
    }
}

/// One asset name or several, as compilers report either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetNames {
    /// A group with a single asset.
    One(String),
    /// A group with several assets, in emission order.
    Many(Vec<String>),
}

impl AssetNames {
    /// The asset names in order.
    pub fn names(&self) -> &[String] {
        match self {
            AssetNames::One(name) => std::slice::from_ref(name),
            AssetNames::Many(names) => names,
        }
    }

    fn push(&mut self, name: String) {
        match self {
            AssetNames::One(first) => *self = AssetNames::Many(vec![std::mem::take(first), name]),
            AssetNames::Many(names) => names.push(name),
        }
    }
}

/// In-memory output filesystem a compiler writes into.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl MemoryFs {
    /// Creates an empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes (or replaces) a file.
    pub fn write_file(&mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), contents.into());
    }

    /// Reads a file.
    pub fn read_file(&self, path: &Path) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A complete [`BuildReport`] built from already collected parts.
#[derive(Debug, Clone, Default)]
pub struct CompiledOutput {
    /// The structured report.
    pub stats: StatsReport,
    /// Emitted files.
    pub fs: MemoryFs,
    /// Error messages; non-empty means the build failed.
    pub errors: Vec<String>,
    /// Warning messages.
    pub warnings: Vec<String>,
}

impl BuildReport for CompiledOutput {
    fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn render(&self, options: &StatsOptions) -> String {
        let colors = options.use_colors();
        let bold = |s: &str| {
            if colors {
                format!("\x1b[1m{s}\x1b[22m")
            } else {
                s.to_string()
            }
        };

        let mut out = String::new();
        for (i, child) in self.stats.children.iter().enumerate() {
            let _ = writeln!(out, "Child {i}:");
            if options.chunks {
                for (group, names) in &child.assets_by_chunk_name {
                    let _ = writeln!(out, "    {} {}", bold(group), names.names().join(", "));
                }
            }
        }
        for warning in &self.warnings {
            let _ = writeln!(out, "WARNING in {warning}");
        }
        for error in &self.errors {
            let _ = writeln!(out, "ERROR in {error}");
        }
        out
    }

    fn to_structured(&self) -> StatsReport {
        self.stats.clone()
    }

    fn read_file(&self, path: &Path) -> Option<Vec<u8>> {
        self.fs.read_file(path).map(<[u8]>::to_vec)
    }
}
