//! Build execution: run the compiler and persist what it emitted.

use std::collections::BTreeMap;

use bundle_cache::{ArtifactRecord, Store};
use bundle_common::{build_path, join_output};
use bundle_config::{BuildConfig, StatsOptions};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::compiler::Compiler;
use crate::error::{CompilerError, PipelineError};
use crate::host::Host;

/// Output-group name to the ordered file-collection keys of its assets.
pub type AssetIndex = BTreeMap<String, Vec<String>>;

/// Value key of the persisted [`AssetIndex`].
pub const ASSET_INDEX_KEY: &str = "assetsByChunkName";

/// Value key of the persisted structured stats report.
pub const STATS_KEY: &str = "stats";

/// Value key of the persisted human-readable stats report.
pub const STATS_DISPLAY_KEY: &str = "statsDisplay";

/// Runs the compiler over `configs` and persists its output in `store`.
///
/// Every emitted asset is stored under its path relative to the host's
/// destination directory, which is also the key it is installed under in
/// the file collection. Nothing is written to the store unless the build
/// succeeded and every reported asset could be read.
pub async fn execute(
    compiler: &dyn Compiler,
    configs: &[BuildConfig],
    host: &dyn Host,
    stats_options: &StatsOptions,
    store: &mut Store,
) -> Result<AssetIndex, PipelineError> {
    info!(configs = configs.len(), "running compiler");
    let report = compiler.run(configs).await?;
    let rendered = report.render(stats_options);
    if report.has_errors() {
        return Err(CompilerError::BuildErrors { report: rendered }.into());
    }

    let stats = report.to_structured();
    if stats.children.len() != configs.len() {
        return Err(CompilerError::ChildMismatch {
            children: stats.children.len(),
            configs: configs.len(),
        }
        .into());
    }

    let destination = host.destination();
    let mut index = AssetIndex::new();
    let mut artifacts = Vec::new();
    for (config, child) in configs.iter().zip(&stats.children) {
        for (group, names) in &child.assets_by_chunk_name {
            for name in names.names() {
                let full_path = join_output(&config.output.path, name);
                let key = build_path(&destination, &full_path).ok_or_else(|| {
                    CompilerError::UnplaceableAsset {
                        asset: full_path.clone(),
                        destination: destination.clone(),
                    }
                })?;
                let contents = report
                    .read_file(&full_path)
                    .ok_or_else(|| CompilerError::MissingOutput(full_path.clone()))?;

                debug!(group = %group, path = %key, bytes = contents.len(), "harvested asset");
                let mut metadata = Map::new();
                metadata.insert("chunk".to_string(), Value::String(group.clone()));
                artifacts.push((key.clone(), ArtifactRecord { contents, metadata }));
                index.entry(group.clone()).or_default().push(key);
            }
        }
    }

    // Artifacts of the previous build are superseded; their blobs go at flush.
    store.files_mut().replace_all(artifacts).await?;
    let values = store.values_mut();
    values.store(STATS_DISPLAY_KEY, &rendered).await?;
    values.store(STATS_KEY, &stats).await?;
    values.store(ASSET_INDEX_KEY, &index).await?;

    info!(groups = index.len(), "build persisted");
    Ok(index)
}
