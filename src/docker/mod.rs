//! Container engine client.
//!
//! A thin typed facade over the local Docker daemon, split in two layers:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DockerClient                           │
//! │  run / stop / restart / exec / run_and_clean (idempotent)     │
//! │  ensure_network / ensure_image / ensure_daemon_available      │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ Arc<dyn Engine>
//!              ┌─────────────────┴─────────────────┐
//!              ▼                                   ▼
//!     ┌─────────────────┐                 ┌─────────────────┐
//!     │  BollardEngine  │                 │   FakeEngine    │
//!     │ (local daemon)  │                 │    (tests)      │
//!     └─────────────────┘                 └─────────────────┘
//! ```
//!
//! Only containers labeled with [`SITE_LABEL`] are ever discovered or
//! cleaned up by site operations.

pub mod client;
pub mod daemon;
pub mod engine;
pub mod error;
mod network;
pub mod spec;

pub use client::{DEFAULT_EXEC_TIMEOUT, DockerClient, LOG_TIMEOUT};
pub use daemon::{DaemonAutostart, Platform};
pub use engine::{BollardEngine, Engine, connect_docker};
pub use error::{DockerError, Result};
pub use spec::{
    BindMount, ContainerSpec, ContainerSummary, ExecResult, ExposedPort, GLOBAL_LABEL, MountPoint,
    NetworkSummary, SITE_LABEL,
};
