//! Plugin options and bundler build configurations.
//!
//! This crate reads `bundle.toml` into strongly-typed [`PluginOptions`] and
//! resolves the configured [`ConfigSource`]s (inline tables or paths to
//! config files) into the normalized list of [`BuildConfig`]s handed to the
//! compiler.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_options, load_options_from_str, validate_options, OPTIONS_FILE};
pub use resolve::{load_config_module, resolve_config_list};
pub use types::*;
