//! `bundlecache clear`.

use tracing::info;

use crate::project;
use crate::GlobalArgs;

/// Clears every collection and deletes the now unreferenced blobs.
pub async fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project = project::resolve(global)?;
    let mut store = project.open_store().await?;
    let before = store.stats();
    store.clear_all().await;
    let summary = store.flush().await?;

    info!(blobs_removed = summary.blobs_removed, "cache cleared");
    println!(
        "cleared {} mod-times, {} files, {} values ({} blobs removed)",
        before.mod_times, before.files, before.values, summary.blobs_removed
    );
    Ok(0)
}
