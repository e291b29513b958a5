//! Error types for the engine client.

use std::time::Duration;

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, DockerError>;

/// Errors that can occur while talking to the container engine.
#[derive(Debug, Error)]
pub enum DockerError {
    /// The daemon did not answer, even after the auto-start loop.
    #[error("Docker daemon unreachable: {reason}. {hint}")]
    DaemonUnreachable {
        /// Reason why the daemon is unavailable.
        reason: String,
        /// Platform-specific start instructions.
        hint: &'static str,
    },

    /// Listing or inspecting containers failed.
    #[error("Failed to query containers: {reason}")]
    Query {
        /// Reason for failure.
        reason: String,
    },

    /// Failed to pull the image.
    #[error("Failed to pull image '{image}': {reason}")]
    ImagePullFailed {
        /// Image reference.
        image: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to create the container.
    #[error("Failed to create container '{name}': {reason}")]
    ContainerCreationFailed {
        /// Container name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to start the container.
    #[error("Failed to start container '{name}': {reason}")]
    ContainerStartFailed {
        /// Container name or id.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to stop the container.
    #[error("Failed to stop container '{name}': {reason}")]
    ContainerStopFailed {
        /// Container name or id.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to remove the container.
    #[error("Failed to remove container '{name}': {reason}")]
    ContainerRemoveFailed {
        /// Container name or id.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// The wait channel reported an error instead of an exit status.
    #[error("Failed waiting for container '{id}': {reason}")]
    WaitFailed {
        /// Container id.
        id: String,
        /// Reason for failure.
        reason: String,
    },

    /// Reading container logs failed.
    #[error("Failed to read logs of container '{id}': {reason}")]
    LogsFailed {
        /// Container id.
        id: String,
        /// Reason for failure.
        reason: String,
    },

    /// Exec session could not be created, attached or inspected.
    #[error("Exec in container '{name}' failed: {reason}")]
    ExecFailed {
        /// Container name or id.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// A bounded wait ran out.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// What was being waited on.
        operation: String,
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// Network create, list or remove failed.
    #[error("Network '{name}' operation failed: {reason}")]
    Network {
        /// Network name.
        name: String,
        /// Reason for failure.
        reason: String,
    },
}
