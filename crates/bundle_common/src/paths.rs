//! Path arithmetic between compiler output locations and file-collection keys.

use std::path::{Component, Path, PathBuf};

/// Joins an emitted asset name onto a configured output directory.
///
/// Asset names reported by a compiler may contain subdirectories
/// (`"chunks/vendor.js"`); they are joined component-wise.
pub fn join_output(output_dir: &Path, asset_name: &str) -> PathBuf {
    output_dir.join(asset_name)
}

/// Computes the file-collection key for an absolute output path.
///
/// The key is `full_path` relative to `destination`, always using `/` as
/// the separator so keys are identical across platforms. Paths outside the
/// destination produce leading `..` segments. Returns `None` when the two
/// paths cannot be related (one absolute, the other relative) or when the
/// result would be empty.
pub fn build_path(destination: &Path, full_path: &Path) -> Option<String> {
    let relative = pathdiff::diff_paths(full_path, destination)?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(s) => parts.push(s.to_string_lossy().into_owned()),
            Component::ParentDir => parts.push("..".to_string()),
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
