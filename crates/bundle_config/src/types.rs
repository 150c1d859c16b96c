//! Option and build-config types deserialized from `bundle.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::PathBuf;

/// Config module loaded when no `config` key is given.
pub const DEFAULT_CONFIG_MODULE: &str = "bundle.config.toml";

/// Cache directory used when no `cache_dir` key is given.
pub const DEFAULT_CACHE_DIR: &str = ".bundle-cache";

/// Metadata tree key used when no `metadata_key` is given.
pub const DEFAULT_METADATA_KEY: &str = "bundle";

/// The plugin options parsed from `bundle.toml` or built in code.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginOptions {
    /// Where the bundler configurations come from.
    #[serde(
        default = "default_config_sources",
        deserialize_with = "deserialize_config_sources"
    )]
    pub config: Vec<ConfigSource>,
    /// Glob patterns selecting the files that invalidate the cache. `None`
    /// disables caching: every invocation rebuilds.
    #[serde(default)]
    pub dependencies: Option<DependencySpec>,
    /// Clears every cache collection before validating.
    #[serde(default, alias = "invalidate")]
    pub clear_cache: bool,
    /// Options forwarded to the human-readable stats rendition.
    #[serde(default)]
    pub stats: StatsOptions,
    /// Store location, relative to the project root.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Key under which `{stats, assets}` is written into the metadata tree.
    #[serde(default = "default_metadata_key")]
    pub metadata_key: String,
    /// Prefix prepended to each entry of the assets projection.
    #[serde(default)]
    pub asset_prefix: String,
    /// Whether failures are returned to the caller or only logged.
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            config: default_config_sources(),
            dependencies: None,
            clear_cache: false,
            stats: StatsOptions::default(),
            cache_dir: default_cache_dir(),
            metadata_key: default_metadata_key(),
            asset_prefix: String::new(),
            error_policy: ErrorPolicy::default(),
        }
    }
}

impl PluginOptions {
    /// Options building the given inline configurations.
    pub fn with_configs(configs: Vec<BuildConfig>) -> Self {
        Self {
            config: vec![ConfigSource::Literal(configs)],
            ..Self::default()
        }
    }

    /// Sets the dependency patterns.
    pub fn dependencies<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = Some(DependencySpec::new(patterns));
        self
    }
}

fn default_config_sources() -> Vec<ConfigSource> {
    vec![ConfigSource::ModulePath(DEFAULT_CONFIG_MODULE.to_string())]
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

fn default_metadata_key() -> String {
    DEFAULT_METADATA_KEY.to_string()
}

/// Where a list of bundler configurations comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Configurations given inline.
    Literal(Vec<BuildConfig>),
    /// Path (relative to the project root) of a `.toml` or `.json` file
    /// holding one configuration or a list of them.
    ModulePath(String),
}

/// Shape accepted for the `config` key before normalization.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSource {
    Path(String),
    List(Vec<RawSource>),
    Literal(BuildConfig),
}

impl RawSource {
    fn flatten_into(self, out: &mut Vec<ConfigSource>) {
        match self {
            RawSource::Path(p) => out.push(ConfigSource::ModulePath(p)),
            RawSource::Literal(c) => match out.last_mut() {
                Some(ConfigSource::Literal(list)) => list.push(c),
                _ => out.push(ConfigSource::Literal(vec![c])),
            },
            RawSource::List(items) => {
                for item in items {
                    item.flatten_into(out);
                }
            }
        }
    }
}

/// Accepts a path, a config table, or an array mixing both.
fn deserialize_config_sources<'de, D>(deserializer: D) -> Result<Vec<ConfigSource>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = RawSource::deserialize(deserializer)?;
    let mut out = Vec::new();
    raw.flatten_into(&mut out);
    Ok(out)
}

/// Ordered glob patterns identifying cache-invalidation inputs.
///
/// Patterns starting with `!` exclude previously matched paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DependencySpec(Vec<String>);

impl DependencySpec {
    /// Creates a spec from one or more patterns.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(patterns.into_iter().map(Into::into).collect())
    }

    /// The patterns in declaration order.
    pub fn patterns(&self) -> &[String] {
        &self.0
    }
}

impl<'de> Deserialize<'de> for DependencySpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_string_or_vec(deserializer).map(DependencySpec)
    }
}

/// Deserializes a field that can be either a single string or a list of strings.
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut vec = Vec::new();
            while let Some(val) = seq.next_element::<String>()? {
                vec.push(val);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

/// One bundler configuration. Only the fields the cache needs are typed;
/// everything else is passed through to the compiler in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Base directory for resolving entry points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<PathBuf>,
    /// Entry point(s).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntrySpec>,
    /// Where the compiler writes its output.
    pub output: OutputConfig,
    /// Compiler-specific settings.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl BuildConfig {
    /// A config with a single entry and the given output directory.
    pub fn new(entry: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            context: None,
            entry: Some(EntrySpec::Single(entry.into())),
            output: OutputConfig {
                path: output_path.into(),
                filename: default_filename(),
            },
            extra: BTreeMap::new(),
        }
    }
}

/// Entry points of a build: one unnamed entry, or named entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntrySpec {
    /// A single entry, producing the `main` output group.
    Single(String),
    /// Named entries, one output group per name.
    Named(BTreeMap<String, String>),
}

/// Output settings of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory. Emitted asset names are joined onto it.
    pub path: PathBuf,
    /// Output filename template.
    #[serde(default = "default_filename")]
    pub filename: String,
}

fn default_filename() -> String {
    "[name].js".to_string()
}

/// Options for the human-readable stats rendition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsOptions {
    /// Forces colored output on or off. Unset means "if stdout is a terminal".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<bool>,
    /// Whether to list chunks.
    #[serde(default = "default_true")]
    pub chunks: bool,
    /// Whether to list the modules inside each chunk.
    #[serde(default)]
    pub chunk_modules: bool,
    /// Compiler-specific rendering options.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            colors: None,
            chunks: true,
            chunk_modules: false,
            extra: BTreeMap::new(),
        }
    }
}

impl StatsOptions {
    /// Resolves `colors`, falling back to whether stdout is a terminal.
    pub fn use_colors(&self) -> bool {
        self.colors
            .unwrap_or_else(|| std::io::stdout().is_terminal())
    }
}

fn default_true() -> bool {
    true
}

/// What the orchestrator does with a failed invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Log the failure and report it in the outcome without failing the run.
    #[default]
    BestEffort,
    /// Return the failure as an error.
    Strict,
}
