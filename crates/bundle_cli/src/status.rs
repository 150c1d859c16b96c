//! `bundlecache status`.

use bundle_pipeline::{AssetIndex, ASSET_INDEX_KEY};
use serde_json::json;

use crate::project;
use crate::{GlobalArgs, ReportFormat, StatusArgs};

/// Prints the store location, per-collection record counts and the
/// persisted asset index.
pub async fn run(args: &StatusArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = project::resolve(global)?;
    let store = project.open_store().await?;
    let stats = store.stats();
    let index = store.values().retrieve::<AssetIndex>(ASSET_INDEX_KEY).await;

    match args.format {
        ReportFormat::Json => {
            let report = json!({
                "cache_dir": store.dir().display().to_string(),
                "records": {
                    "mod-times": stats.mod_times,
                    "files": stats.files,
                    "values": stats.values,
                },
                "assets": index,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        ReportFormat::Text => {
            println!("cache: {}", store.dir().display());
            println!("  mod-times  {}", stats.mod_times);
            println!("  files      {}", stats.files);
            println!("  values     {}", stats.values);
            match index {
                Some(index) => {
                    println!("assets:");
                    for (group, paths) in &index {
                        println!("  {group}: {}", paths.join(", "));
                    }
                }
                None => println!("assets: none (no cached build)"),
            }
        }
    }
    Ok(0)
}
