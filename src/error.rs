//! Crate-wide error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is present but unusable.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// A configuration file could not be parsed.
    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// No home directory to place the app directory in.
    #[error("Unable to determine the home directory; set KANA_HOME")]
    NoHomeDirectory,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
