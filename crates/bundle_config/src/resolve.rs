//! Resolution of config sources into a normalized config list.

use crate::error::ConfigError;
use crate::types::{BuildConfig, ConfigSource};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Contents of a TOML config module: either one config at the top level or
/// a `[[config]]` array.
#[derive(Deserialize)]
#[serde(untagged)]
enum TomlModule {
    List { config: Vec<BuildConfig> },
    Single(BuildConfig),
}

/// Contents of a JSON config module: an object or an array of objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonModule {
    List(Vec<BuildConfig>),
    Single(BuildConfig),
}

/// Resolves every source into one flat list of build configs, in order.
///
/// `resolve` maps a project-relative path to a usable path (normally by
/// joining it onto the project root). Inline configs get their relative
/// `output.path` and `context` resolved the same way; configs loaded from a
/// module file are resolved against the module's directory.
pub fn resolve_config_list(
    sources: &[ConfigSource],
    resolve: impl Fn(&Path) -> PathBuf,
) -> Result<Vec<BuildConfig>, ConfigError> {
    let mut configs = Vec::new();
    for source in sources {
        match source {
            ConfigSource::Literal(list) => {
                for config in list {
                    let mut config = config.clone();
                    absolutize(&mut config, &resolve);
                    configs.push(config);
                }
            }
            ConfigSource::ModulePath(path) => {
                let module_path = resolve(Path::new(path));
                configs.extend(load_config_module(&module_path)?);
            }
        }
    }
    Ok(configs)
}

/// Loads a `.toml` or `.json` config module.
pub fn load_config_module(path: &Path) -> Result<Vec<BuildConfig>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    let mut configs = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => match toml::from_str::<TomlModule>(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?
        {
            TomlModule::List { config } => config,
            TomlModule::Single(config) => vec![config],
        },
        Some("json") => match serde_json::from_str::<JsonModule>(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?
        {
            JsonModule::List(list) => list,
            JsonModule::Single(config) => vec![config],
        },
        _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    };

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for (i, config) in configs.iter_mut().enumerate() {
        if config.output.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "{}: config[{i}].output.path",
                path.display()
            )));
        }
        absolutize(config, |p: &Path| base.join(p));
    }
    Ok(configs)
}

fn absolutize(config: &mut BuildConfig, resolve: impl Fn(&Path) -> PathBuf) {
    if config.output.path.is_relative() {
        config.output.path = resolve(&config.output.path);
    }
    if let Some(context) = &config.context {
        if context.is_relative() {
            config.context = Some(resolve(context));
        }
    }
}
