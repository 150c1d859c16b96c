//! End-to-end runs of the plugin against on-disk stores.
//!
//! Each test drives [`BundlePlugin::run`] with a scripted compiler over a
//! temporary project directory, the way a host pipeline would across
//! several build invocations.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bundle_cache::Store;
use bundle_common::ModTime;
use bundle_config::{BuildConfig, ErrorPolicy, PluginOptions};
use bundle_pipeline::{
    assess, read_source_dir, BuildReport, BundlePlugin, ChildReport, CompiledOutput, Compiler,
    CompilerError, FileCollection, FileEntry, Freshness, InvalidReason, Metadata, Phase,
    PipelineError, ProjectHost, RunOutcome, ASSET_INDEX_KEY,
};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Emits, for config `i`, the assets listed in `plan[i]` as `(group, name)`.
/// File contents are `"<name> #<run>"` so rebuilds are distinguishable.
struct ScriptedCompiler {
    plan: Vec<Vec<(&'static str, &'static str)>>,
    runs: AtomicUsize,
    fail: AtomicBool,
}

impl ScriptedCompiler {
    fn new(plan: Vec<Vec<(&'static str, &'static str)>>) -> Self {
        Self {
            plan,
            runs: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    fn single(group: &'static str, names: &[&'static str]) -> Self {
        Self::new(vec![names.iter().map(|n| (group, *n)).collect()])
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Compiler for ScriptedCompiler {
    async fn run(&self, configs: &[BuildConfig]) -> Result<Box<dyn BuildReport>, CompilerError> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst);
        let mut out = CompiledOutput::default();
        if self.fail.load(Ordering::SeqCst) {
            out.errors.push("./index.js: Module not found".to_string());
            return Ok(Box::new(out));
        }
        for (config, assets) in configs.iter().zip(&self.plan) {
            let mut child = ChildReport::default();
            for (group, name) in assets {
                child = child.with_asset(group, name);
                out.fs
                    .write_file(config.output.path.join(name), format!("{name} #{run}"));
            }
            out.stats.children.push(child);
        }
        Ok(Box::new(out))
    }
}

struct Project {
    dir: TempDir,
    host: ProjectHost,
}

impl Project {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let host = ProjectHost::new(dir.path());
        Self { dir, host }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    async fn store(&self) -> Store {
        Store::open(&self.path(".bundle-cache")).await.unwrap()
    }
}

fn sources(times: &[(&str, i64)]) -> FileCollection {
    times
        .iter()
        .map(|(path, t)| {
            (
                path.to_string(),
                FileEntry::new(format!("// {path}")).with_mtime(ModTime::from_millis(*t)),
            )
        })
        .collect()
}

fn options_for(project: &Project, output: &str) -> PluginOptions {
    PluginOptions::with_configs(vec![BuildConfig::new("./index.js", project.path(output))])
        .dependencies(["js/**/*.js"])
}

fn text(files: &FileCollection, key: &str) -> String {
    String::from_utf8(files[key].contents.clone()).unwrap()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_config_group_with_two_assets() {
    let project = Project::new();
    let plugin = BundlePlugin::new(
        options_for(&project, "build"),
        ScriptedCompiler::single("main", &["a.js", "a.css"]),
    );
    let mut files = sources(&[("js/index.js", 1)]);
    let mut metadata = Metadata::new();

    let outcome = plugin.run(&mut files, &mut metadata, &project.host).await.unwrap();

    assert!(!outcome.from_cache());
    assert_eq!(text(&files, "a.js"), "a.js #0");
    assert_eq!(text(&files, "a.css"), "a.css #0");
    assert_eq!(metadata["bundle"]["assets"]["main"], "a.css");
    assert_eq!(metadata["bundle"]["stats"]["fromCache"], false);

    let store = project.store().await;
    let index: serde_json::Value = store.values().retrieve(ASSET_INDEX_KEY).await.unwrap();
    assert_eq!(index, serde_json::json!({"main": ["a.js", "a.css"]}));
    assert!(store.files().contains("a.js").await);
    assert!(store.files().contains("a.css").await);
}

#[tokio::test]
async fn two_configs_with_distinct_groups() {
    let project = Project::new();
    let options = PluginOptions::with_configs(vec![
        BuildConfig::new("./a.js", project.path("build/js")),
        BuildConfig::new("./b.js", project.path("build/lib")),
    ])
    .dependencies(["js/**/*.js"]);
    let plugin = BundlePlugin::new(
        options,
        ScriptedCompiler::new(vec![vec![("a", "a-bundle.js")], vec![("b", "b-bundle.js")]]),
    );
    let mut files = sources(&[("js/a.js", 1), ("js/b.js", 1)]);
    let mut metadata = Metadata::new();

    plugin.run(&mut files, &mut metadata, &project.host).await.unwrap();

    let store = project.store().await;
    let index: serde_json::Value = store.values().retrieve(ASSET_INDEX_KEY).await.unwrap();
    assert_eq!(
        index,
        serde_json::json!({"a": ["js/a-bundle.js"], "b": ["lib/b-bundle.js"]})
    );
    assert_eq!(store.files().len(), 2);
    assert_eq!(metadata["bundle"]["assets"]["b"], "lib/b-bundle.js");
}

// ---------------------------------------------------------------------------
// Caching behavior
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unchanged_dependencies_validate_after_build() {
    let project = Project::new();
    let plugin = BundlePlugin::new(
        options_for(&project, "build"),
        ScriptedCompiler::single("main", &["main.js"]),
    );
    let files = sources(&[("js/index.js", 10), ("js/util.js", 20)]);

    plugin
        .run(&mut files.clone(), &mut Metadata::new(), &project.host)
        .await
        .unwrap();

    let store = project.store().await;
    let deps = plugin.options().dependencies.as_ref();
    let assessment = assess(deps, &files, store.ledger()).await.unwrap();
    assert_eq!(assessment.freshness, Freshness::Valid);
}

#[tokio::test]
async fn cache_hit_reproduces_built_output() {
    let project = Project::new();
    let plugin = BundlePlugin::new(
        options_for(&project, "build"),
        ScriptedCompiler::single("main", &["a.js", "a.css"]),
    );

    let mut built = sources(&[("js/index.js", 1)]);
    let mut built_meta = Metadata::new();
    plugin.run(&mut built, &mut built_meta, &project.host).await.unwrap();

    let mut cached = sources(&[("js/index.js", 1)]);
    let mut cached_meta = Metadata::new();
    let outcome = plugin.run(&mut cached, &mut cached_meta, &project.host).await.unwrap();

    assert!(outcome.from_cache());
    assert_eq!(plugin.compiler().runs(), 1);
    assert_eq!(built, cached);
    assert_eq!(
        built_meta["bundle"]["assets"],
        cached_meta["bundle"]["assets"]
    );
    assert_eq!(cached_meta["bundle"]["stats"]["fromCache"], true);
}

#[tokio::test]
async fn changed_dependency_rebuilds() {
    let project = Project::new();
    let plugin = BundlePlugin::new(
        options_for(&project, "build"),
        ScriptedCompiler::single("main", &["main.js"]),
    );
    plugin
        .run(&mut sources(&[("js/index.js", 1)]), &mut Metadata::new(), &project.host)
        .await
        .unwrap();

    let mut files = sources(&[("js/index.js", 2)]);
    let outcome = plugin
        .run(&mut files, &mut Metadata::new(), &project.host)
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::Built { reason: InvalidReason::Changed, .. }
    ));
    assert_eq!(text(&files, "main.js"), "main.js #1");
}

#[tokio::test]
async fn rebuild_drops_ledger_records_of_removed_dependencies() {
    let project = Project::new();
    let plugin = BundlePlugin::new(
        options_for(&project, "build"),
        ScriptedCompiler::single("main", &["main.js"]),
    );
    plugin
        .run(
            &mut sources(&[("js/a.js", 1), ("js/b.js", 1)]),
            &mut Metadata::new(),
            &project.host,
        )
        .await
        .unwrap();
    assert_eq!(project.store().await.ledger().len(), 2);

    let outcome = plugin
        .run(&mut sources(&[("js/a.js", 2)]), &mut Metadata::new(), &project.host)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        RunOutcome::Built { reason: InvalidReason::Changed, .. }
    ));

    let store = project.store().await;
    assert_eq!(store.ledger().len(), 1);
    assert_eq!(store.ledger().get("js/a.js").await, Some(ModTime::from_millis(2)));
    assert!(store.ledger().get("js/b.js").await.is_none());
}

#[tokio::test]
async fn files_outside_dependencies_do_not_invalidate() {
    let project = Project::new();
    let plugin = BundlePlugin::new(
        options_for(&project, "build"),
        ScriptedCompiler::single("main", &["main.js"]),
    );
    plugin
        .run(
            &mut sources(&[("js/index.js", 1), ("index.md", 1)]),
            &mut Metadata::new(),
            &project.host,
        )
        .await
        .unwrap();

    let outcome = plugin
        .run(
            &mut sources(&[("js/index.js", 1), ("index.md", 99)]),
            &mut Metadata::new(),
            &project.host,
        )
        .await
        .unwrap();
    assert!(outcome.from_cache());
}

#[tokio::test]
async fn zero_matches_always_rebuilds() {
    let project = Project::new();
    let plugin = BundlePlugin::new(
        options_for(&project, "build"),
        ScriptedCompiler::single("main", &["main.js"]),
    );
    for _ in 0..2 {
        let outcome = plugin
            .run(&mut sources(&[("css/site.css", 1)]), &mut Metadata::new(), &project.host)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            RunOutcome::Built { reason: InvalidReason::NoMatches, .. }
        ));
    }
    assert_eq!(plugin.compiler().runs(), 2);
}

#[tokio::test]
async fn clear_cache_resets_state() {
    let project = Project::new();
    let mut options = options_for(&project, "build");
    let warm = BundlePlugin::new(options.clone(), ScriptedCompiler::single("main", &["main.js"]));
    warm.run(&mut sources(&[("js/index.js", 1)]), &mut Metadata::new(), &project.host)
        .await
        .unwrap();

    options.clear_cache = true;
    let plugin = BundlePlugin::new(options, ScriptedCompiler::single("main", &["main.js"]));
    let outcome = plugin
        .run(&mut sources(&[("js/index.js", 1)]), &mut Metadata::new(), &project.host)
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::Built { reason: InvalidReason::Changed, .. }
    ));
    assert_eq!(plugin.compiler().runs(), 1);
}

#[tokio::test]
async fn store_survives_a_new_plugin_instance() {
    let project = Project::new();
    let first = BundlePlugin::new(
        options_for(&project, "build"),
        ScriptedCompiler::single("main", &["main.js"]),
    );
    first
        .run(&mut sources(&[("js/index.js", 1)]), &mut Metadata::new(), &project.host)
        .await
        .unwrap();
    drop(first);

    let second = BundlePlugin::new(
        options_for(&project, "build"),
        ScriptedCompiler::single("main", &["main.js"]),
    );
    let mut files = sources(&[("js/index.js", 1)]);
    let outcome = second
        .run(&mut files, &mut Metadata::new(), &project.host)
        .await
        .unwrap();

    assert!(outcome.from_cache());
    assert_eq!(second.compiler().runs(), 0);
    assert_eq!(text(&files, "main.js"), "main.js #0");
}

#[tokio::test]
async fn damaged_collection_file_degrades_to_rebuild() {
    let project = Project::new();
    let plugin = BundlePlugin::new(
        options_for(&project, "build"),
        ScriptedCompiler::single("main", &["main.js"]),
    );
    plugin
        .run(&mut sources(&[("js/index.js", 1)]), &mut Metadata::new(), &project.host)
        .await
        .unwrap();

    std::fs::write(project.path(".bundle-cache/mod-times.json"), "{ not json").unwrap();

    let outcome = plugin
        .run(&mut sources(&[("js/index.js", 1)]), &mut Metadata::new(), &project.host)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        RunOutcome::Built { reason: InvalidReason::Changed, .. }
    ));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_build_leaves_host_untouched_and_next_run_rebuilds() {
    let project = Project::new();
    let plugin = BundlePlugin::new(
        options_for(&project, "build"),
        ScriptedCompiler::single("main", &["main.js"]),
    );
    plugin.compiler().set_failing(true);

    let mut files = sources(&[("js/index.js", 1)]);
    let before = files.clone();
    let mut metadata = Metadata::new();
    let outcome = plugin.run(&mut files, &mut metadata, &project.host).await.unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::Failed {
            phase: Phase::Building,
            error: PipelineError::Compiler(CompilerError::BuildErrors { .. }),
        }
    ));
    assert_eq!(files, before);
    assert!(metadata.is_empty());
    assert!(project.store().await.ledger().is_empty());

    plugin.compiler().set_failing(false);
    let outcome = plugin.run(&mut files, &mut metadata, &project.host).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Built { .. }));
    assert_eq!(text(&files, "main.js"), "main.js #1");
}

#[tokio::test]
async fn interrupted_flush_does_not_serve_the_previous_build() {
    let project = Project::new();
    let plugin = BundlePlugin::new(
        options_for(&project, "build"),
        ScriptedCompiler::single("main", &["main.js"]),
    );
    plugin
        .run(&mut sources(&[("js/index.js", 1)]), &mut Metadata::new(), &project.host)
        .await
        .unwrap();

    // A directory in the way of the temporary file makes the artifact index
    // save fail after the rebuild.
    let blocker = project.path(".bundle-cache/files.json.tmp");
    std::fs::create_dir(&blocker).unwrap();
    let outcome = plugin
        .run(&mut sources(&[("js/index.js", 2)]), &mut Metadata::new(), &project.host)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        RunOutcome::Failed { phase: Phase::Flushing, .. }
    ));
    std::fs::remove_dir(&blocker).unwrap();

    let mut files = sources(&[("js/index.js", 2)]);
    let outcome = plugin
        .run(&mut files, &mut Metadata::new(), &project.host)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        RunOutcome::Built { reason: InvalidReason::Changed, .. }
    ));
    assert_eq!(text(&files, "main.js"), "main.js #2");
    assert_eq!(plugin.compiler().runs(), 3);
}

#[tokio::test]
async fn strict_policy_returns_errors() {
    let project = Project::new();
    let mut options = options_for(&project, "build");
    options.error_policy = ErrorPolicy::Strict;
    let plugin = BundlePlugin::new(options, ScriptedCompiler::single("main", &["main.js"]));
    plugin.compiler().set_failing(true);

    let err = plugin
        .run(&mut sources(&[("js/index.js", 1)]), &mut Metadata::new(), &project.host)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Compiler(CompilerError::BuildErrors { .. })
    ));
}

struct Unavailable;

#[async_trait]
impl Compiler for Unavailable {
    async fn run(&self, _configs: &[BuildConfig]) -> Result<Box<dyn BuildReport>, CompilerError> {
        Err(CompilerError::Run("bundler not installed".to_string()))
    }
}

#[tokio::test]
async fn unavailable_compiler_is_reported_not_raised() {
    let project = Project::new();
    let plugin = BundlePlugin::new(options_for(&project, "build"), Unavailable);

    let mut files = sources(&[("js/index.js", 1)]);
    let outcome = plugin
        .run(&mut files, &mut Metadata::new(), &project.host)
        .await
        .unwrap();
    assert!(outcome.is_failed());
    assert!(outcome.summary().is_none());
    assert_eq!(files.len(), 1);
    let RunOutcome::Failed { error, .. } = outcome else {
        unreachable!()
    };
    assert_eq!(error.to_string(), "compiler failed to run: bundler not installed");
}

// ---------------------------------------------------------------------------
// On-disk projects
// ---------------------------------------------------------------------------

fn write(path: &Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn touch(path: &Path, time: SystemTime) {
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

#[tokio::test]
async fn config_module_and_source_tree_from_disk() {
    let project = Project::new();
    write(
        &project.path("bundle.config.toml"),
        "[[config]]\nentry = \"./js/index.js\"\n\n[config.output]\npath = \"build/js\"\n",
    );
    let index = project.path("src/js/index.js");
    write(&index, "export default 1;");
    let epoch = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    touch(&index, epoch);

    let options = PluginOptions::default().dependencies(["js/**"]);
    let plugin = BundlePlugin::new(options, ScriptedCompiler::single("main", &["main.js"]));

    let mut files = read_source_dir(project.host.source()).await.unwrap();
    let outcome = plugin
        .run(&mut files, &mut Metadata::new(), &project.host)
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Built { .. }));
    assert_eq!(text(&files, "js/main.js"), "main.js #0");

    let mut files = read_source_dir(project.host.source()).await.unwrap();
    let outcome = plugin
        .run(&mut files, &mut Metadata::new(), &project.host)
        .await
        .unwrap();
    assert!(outcome.from_cache());

    touch(&index, epoch + Duration::from_secs(60));
    let mut files = read_source_dir(project.host.source()).await.unwrap();
    let outcome = plugin
        .run(&mut files, &mut Metadata::new(), &project.host)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        RunOutcome::Built { reason: InvalidReason::Changed, .. }
    ));
    assert_eq!(plugin.compiler().runs(), 2);
}
