//! The host pipeline's side: file collection, metadata tree, paths.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bundle_common::{build_path, ModTime};
use serde_json::{Map, Value};

use crate::error::PipelineError;

/// One file of the host's collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileEntry {
    /// File bytes.
    pub contents: Vec<u8>,
    /// Last modification time on disk, when the file came from disk.
    pub mtime: Option<ModTime>,
    /// Arbitrary per-file metadata.
    pub metadata: Map<String, Value>,
}

impl FileEntry {
    /// An entry with the given bytes and no modification time.
    pub fn new(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: contents.into(),
            ..Self::default()
        }
    }

    /// Sets the modification time.
    pub fn with_mtime(mut self, mtime: ModTime) -> Self {
        self.mtime = Some(mtime);
        self
    }
}

/// The host's files, keyed by path relative to the source directory.
pub type FileCollection = BTreeMap<String, FileEntry>;

/// The host's global metadata tree.
pub type Metadata = Map<String, Value>;

/// Paths the host pipeline exposes.
pub trait Host: Send + Sync {
    /// Directory the host writes its output to. Artifact keys are relative
    /// to it.
    fn destination(&self) -> PathBuf;

    /// Resolves a project-relative path. Absolute paths are returned as-is.
    fn resolve(&self, path: &Path) -> PathBuf;
}

/// A host rooted at a project directory.
#[derive(Debug, Clone)]
pub struct ProjectHost {
    root: PathBuf,
    source: PathBuf,
    destination: PathBuf,
}

impl ProjectHost {
    /// A host for `root` with sources in `src/` and output in `build/`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            source: root.join("src"),
            destination: root.join("build"),
            root,
        }
    }

    /// Sets the source directory (relative paths resolve against the root).
    pub fn with_source(mut self, source: impl AsRef<Path>) -> Self {
        self.source = self.resolve(source.as_ref());
        self
    }

    /// Sets the destination directory (relative paths resolve against the root).
    pub fn with_destination(mut self, destination: impl AsRef<Path>) -> Self {
        self.destination = self.resolve(destination.as_ref());
        self
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The source directory.
    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl Host for ProjectHost {
    fn destination(&self) -> PathBuf {
        self.destination.clone()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

/// Reads every file under `dir` into a collection keyed by `/`-separated
/// relative path, recording each file's modification time.
pub async fn read_source_dir(dir: &Path) -> Result<FileCollection, PipelineError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| PipelineError::Io { path, source }
    };

    let mut files = FileCollection::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current)
            .await
            .map_err(io_err(&current))?;
        while let Some(entry) = entries.next_entry().await.map_err(io_err(&current))? {
            let path = entry.path();
            let meta = entry.metadata().await.map_err(io_err(&path))?;
            if meta.is_dir() {
                pending.push(path);
                continue;
            }
            let Some(key) = build_path(dir, &path) else {
                continue;
            };
            let contents = tokio::fs::read(&path).await.map_err(io_err(&path))?;
            files.insert(
                key,
                FileEntry {
                    contents,
                    mtime: meta.modified().ok().map(ModTime::from),
                    metadata: Map::new(),
                },
            );
        }
    }
    Ok(files)
}
