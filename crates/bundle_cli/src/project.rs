//! Project root and options resolution shared by every command.

use std::path::{Path, PathBuf};

use bundle_cache::Store;
use bundle_config::{load_options, load_options_from_str, ConfigError, PluginOptions, OPTIONS_FILE};
use bundle_pipeline::{Host, ProjectHost};

use crate::GlobalArgs;

/// A resolved project: its host paths and options.
pub struct Project {
    /// Directory-backed host rooted at the project.
    pub host: ProjectHost,
    /// Plugin options.
    pub options: PluginOptions,
}

impl Project {
    /// The store location.
    pub fn cache_dir(&self) -> PathBuf {
        self.host.resolve(&self.options.cache_dir)
    }

    /// Opens the project's store.
    pub async fn open_store(&self) -> Result<Store, Box<dyn std::error::Error>> {
        Ok(Store::open(&self.cache_dir()).await?)
    }
}

/// Walks up from `start` looking for the nearest directory containing
/// `bundle.toml`. Falls back to `start` itself.
pub fn find_project_root(start: &Path) -> PathBuf {
    let mut current = start.to_path_buf();
    loop {
        if current.join(OPTIONS_FILE).is_file() {
            return current;
        }
        if !current.pop() {
            return start.to_path_buf();
        }
    }
}

/// Resolves the project directory and loads its options.
pub fn resolve(global: &GlobalArgs) -> Result<Project, Box<dyn std::error::Error>> {
    let root = match &global.project {
        Some(dir) => dir.clone(),
        None => find_project_root(&std::env::current_dir()?),
    };
    let options = match &global.options {
        Some(path) => read_options_file(path)?,
        None => load_options(&root)?,
    };
    Ok(Project {
        host: ProjectHost::new(root),
        options,
    })
}

fn read_options_file(path: &Path) -> Result<PluginOptions, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    load_options_from_str(&content)
}
