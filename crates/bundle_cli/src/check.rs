//! `bundlecache check`.

use bundle_pipeline::{assess, confirm_cached_build, read_source_dir};
use tracing::debug;

use crate::project;
use crate::{CheckArgs, GlobalArgs};

/// Reads the source tree and reports whether the cached build is still
/// valid, without touching the ledger. A current ledger with no complete
/// cached build is reported the way a run would treat it. Returns exit code 1 when a rebuild
/// would be needed.
pub async fn run(args: &CheckArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut project = project::resolve(global)?;
    if let Some(source) = &args.source {
        project.host = project.host.with_source(source);
    }

    let files = read_source_dir(project.host.source()).await?;
    debug!(files = files.len(), source = %project.host.source().display(), "read source tree");

    let store = project.open_store().await?;
    let mut assessment =
        assess(project.options.dependencies.as_ref(), &files, store.ledger()).await?;
    confirm_cached_build(&mut assessment, &store).await;

    println!("{}", assessment.freshness);
    println!("  matched  {}", assessment.matched.len());
    for (path, time) in &assessment.changed {
        match time {
            Some(time) => println!("  changed  {path} ({time})"),
            None => println!("  changed  {path} (no modification time)"),
        }
    }
    Ok(if assessment.freshness.is_valid() { 0 } else { 1 })
}
