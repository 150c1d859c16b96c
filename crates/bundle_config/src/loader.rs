//! Option file loading and validation.

use crate::error::ConfigError;
use crate::types::{ConfigSource, PluginOptions};
use std::path::Path;

/// Name of the options file looked up in a project directory.
pub const OPTIONS_FILE: &str = "bundle.toml";

/// Loads and validates `<project_dir>/bundle.toml`.
///
/// A missing file yields the default options rather than an error, since
/// every option has a default.
pub fn load_options(project_dir: &Path) -> Result<PluginOptions, ConfigError> {
    let path = project_dir.join(OPTIONS_FILE);
    match std::fs::read_to_string(&path) {
        Ok(content) => load_options_from_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PluginOptions::default()),
        Err(source) => Err(ConfigError::IoError { path, source }),
    }
}

/// Parses and validates plugin options from a TOML string.
pub fn load_options_from_str(content: &str) -> Result<PluginOptions, ConfigError> {
    let options: PluginOptions =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_options(&options)?;
    Ok(options)
}

/// Checks the fields the cache relies on.
pub fn validate_options(options: &PluginOptions) -> Result<(), ConfigError> {
    if options.metadata_key.is_empty() {
        return Err(ConfigError::MissingField("metadata_key".to_string()));
    }
    if let Some(deps) = &options.dependencies {
        if deps.patterns().iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::MissingField("dependencies[]".to_string()));
        }
    }
    let mut index = 0;
    for source in &options.config {
        match source {
            ConfigSource::Literal(list) => {
                for config in list {
                    if config.output.path.as_os_str().is_empty() {
                        return Err(ConfigError::MissingField(format!(
                            "config[{index}].output.path"
                        )));
                    }
                    index += 1;
                }
            }
            ConfigSource::ModulePath(path) => {
                if path.is_empty() {
                    return Err(ConfigError::MissingField(format!("config[{index}]")));
                }
                index += 1;
            }
        }
    }
    Ok(())
}
