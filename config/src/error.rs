//! Error types for build profile configuration

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration errors
///
/// Every variant is fatal: a profile that cannot be loaded never produces a
/// partial configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid value for {section}.{key}: {value:?}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },

    #[error("Invalid config override (expected section.key=value): {0}")]
    InvalidOverride(String),

    #[error("Unknown mirror group: {0}")]
    UnknownMirror(String),

    #[error("Invalid mirror URI: {0}")]
    InvalidMirrorUri(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}
