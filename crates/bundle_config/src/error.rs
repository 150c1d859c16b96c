//! Error types for option loading and config resolution.

use std::path::PathBuf;

/// Errors that can occur when loading plugin options or build configs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    IoError {
        /// The file that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The file content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A config module path has an extension that is neither `.toml` nor `.json`.
    #[error("unsupported config module format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_missing_field() {
        let err = ConfigError::MissingField("config[0].output.path".to_string());
        assert_eq!(
            format!("{err}"),
            "missing required field: config[0].output.path"
        );
    }

    #[test]
    fn display_parse_error() {
        let err = ConfigError::ParseError("expected '=' at line 3".to_string());
        assert_eq!(
            format!("{err}"),
            "failed to parse configuration: expected '=' at line 3"
        );
    }

    #[test]
    fn display_io_error_names_path() {
        let err = ConfigError::IoError {
            path: PathBuf::from("bundle.config.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        let display = format!("{err}");
        assert!(display.starts_with("failed to read bundle.config.toml"));
    }

    #[test]
    fn display_unsupported_format() {
        let err = ConfigError::UnsupportedFormat(PathBuf::from("webpack.config.js"));
        assert!(err.to_string().contains("webpack.config.js"));
    }
}
