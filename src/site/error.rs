//! Error types for site operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::docker::DockerError;
use crate::error::ConfigError;
use crate::proxy::ProxyError;
use crate::site::verify::VerifyError;

/// Result type for site operations.
pub type Result<T> = std::result::Result<T, SiteError>;

/// Errors that can occur while managing a site.
#[derive(Debug, Error)]
pub enum SiteError {
    /// Engine call failed.
    #[error(transparent)]
    Docker(#[from] DockerError),

    /// The shared proxy could not be managed.
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    /// Readiness verification failed.
    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A one-shot or in-container command exited non-zero.
    #[error("Command '{command}' failed with exit code {exit_code}: {output}")]
    CommandFailed {
        /// The command as run.
        command: String,
        /// Exit status.
        exit_code: i64,
        /// Captured output.
        output: String,
    },

    /// Output of a command could not be parsed.
    #[error("Unexpected output from '{command}': {reason}")]
    UnexpectedOutput {
        /// The command as run.
        command: String,
        /// Reason for failure.
        reason: String,
    },

    /// The site's link file could not be read.
    #[error("Invalid link file {path}: {reason}")]
    Link {
        /// Link file path.
        path: PathBuf,
        /// Reason for failure.
        reason: String,
    },

    /// Another kana process holds the site lock.
    #[error("Site '{name}' is busy: another kana command is operating on it ({path})")]
    Busy {
        /// Site name.
        name: String,
        /// Lock file path.
        path: PathBuf,
    },

    /// Flags that cannot be combined.
    #[error("Invalid flags: {0}")]
    InvalidFlags(String),

    /// The browser could not be opened.
    #[error("Unable to open {url}: {reason}")]
    Browser {
        /// URL to open.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
