//! Installs a persisted build into the host's file collection and metadata.

use std::collections::BTreeMap;

use bundle_cache::Store;
use bundle_config::PluginOptions;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::PipelineError;
use crate::executor::{AssetIndex, ASSET_INDEX_KEY, STATS_DISPLAY_KEY, STATS_KEY};
use crate::host::{FileCollection, FileEntry, Metadata};

/// What [`populate`] installed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateSummary {
    /// File-collection keys written, in index order.
    pub installed: Vec<String>,
    /// Group name to its projected asset path.
    pub assets: BTreeMap<String, String>,
}

/// Returns the key of the first record a cache hit would need but the store
/// lacks: the asset index, the stats, or an indexed artifact or its blob.
///
/// Artifact bytes are not read, so a damaged blob still surfaces later as
/// [`PipelineError::MissingArtifact`] from [`populate`].
pub async fn missing_artifact(store: &Store) -> Option<String> {
    let Some(index) = store.values().retrieve::<AssetIndex>(ASSET_INDEX_KEY).await else {
        return Some(ASSET_INDEX_KEY.to_string());
    };
    if !store.values().contains(STATS_KEY).await {
        return Some(STATS_KEY.to_string());
    }
    let files = store.files();
    for path in index.values().flatten() {
        let present = match files.entry(path) {
            Some(entry) => tokio::fs::try_exists(files.blobs().blob_path(&entry.hash))
                .await
                .unwrap_or(false),
            None => false,
        };
        if !present {
            return Some(path.clone());
        }
    }
    None
}

/// Copies every artifact of the persisted [`AssetIndex`] into `files` and
/// writes `{stats, assets}` under the configured metadata key.
///
/// Nothing is mutated unless every referenced record could be read.
pub async fn populate(
    store: &Store,
    files: &mut FileCollection,
    metadata: &mut Metadata,
    from_cache: bool,
    options: &PluginOptions,
) -> Result<PopulateSummary, PipelineError> {
    let index: AssetIndex = store
        .values()
        .retrieve(ASSET_INDEX_KEY)
        .await
        .ok_or_else(|| PipelineError::MissingArtifact(ASSET_INDEX_KEY.to_string()))?;

    let mut staged = Vec::new();
    for path in index.values().flatten() {
        let record = store
            .files()
            .retrieve(path)
            .await
            .ok_or_else(|| PipelineError::MissingArtifact(path.clone()))?;
        staged.push((path.clone(), record));
    }

    let mut stats: Map<String, Value> = store
        .values()
        .retrieve(STATS_KEY)
        .await
        .ok_or_else(|| PipelineError::MissingArtifact(STATS_KEY.to_string()))?;
    stats.insert("fromCache".to_string(), Value::Bool(from_cache));

    let assets: BTreeMap<String, String> = index
        .iter()
        .filter_map(|(group, paths)| {
            let last = paths.last()?;
            Some((group.clone(), format!("{}{last}", options.asset_prefix)))
        })
        .collect();

    let mut installed = Vec::with_capacity(staged.len());
    for (path, record) in staged {
        files.insert(
            path.clone(),
            FileEntry {
                contents: record.contents,
                mtime: None,
                metadata: record.metadata,
            },
        );
        installed.push(path);
    }

    let projection: Map<String, Value> = assets
        .iter()
        .map(|(group, path)| (group.clone(), Value::String(path.clone())))
        .collect();
    let mut entry = Map::new();
    entry.insert("stats".to_string(), Value::Object(stats));
    entry.insert("assets".to_string(), Value::Object(projection));
    metadata.insert(options.metadata_key.clone(), Value::Object(entry));

    if let Some(rendered) = store.values().retrieve::<String>(STATS_DISPLAY_KEY).await {
        debug!(from_cache, "build report:\n{rendered}");
    }
    debug!(from_cache, installed = installed.len(), ?assets, "populated build output");

    Ok(PopulateSummary { installed, assets })
}
