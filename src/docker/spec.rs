//! Declarative container descriptions and the values read back from the daemon.

use std::collections::HashMap;
use std::path::PathBuf;

/// Label key every site container carries; the value is the site name.
pub const SITE_LABEL: &str = "kana.site";

/// Label carried by shared containers that belong to no single site.
pub const GLOBAL_LABEL: &str = "kana.global";

/// Everything needed to create and start one container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name, also used as the hostname on the shared network.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Ports published on the host at the same number.
    pub ports: Vec<ExposedPort>,
    /// Network to attach to (empty for the engine default).
    pub network: String,
    /// Bind mounts.
    pub mounts: Vec<BindMount>,
    /// Command override (empty keeps the image default).
    pub command: Vec<String>,
    /// Environment variables as (name, value).
    pub env: Vec<(String, String)>,
    /// Labels.
    pub labels: HashMap<String, String>,
}

impl ContainerSpec {
    /// Environment in the `NAME=value` form the engine expects.
    pub fn env_strings(&self) -> Vec<String> {
        self.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
    }

    /// The site this container belongs to, if it carries the ownership label.
    pub fn site(&self) -> Option<&str> {
        self.labels.get(SITE_LABEL).map(String::as_str)
    }
}

/// A port exposed by a container and bound on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposedPort {
    pub port: u16,
    pub protocol: String,
}

impl ExposedPort {
    pub fn tcp(port: u16) -> Self {
        Self {
            port,
            protocol: "tcp".to_string(),
        }
    }

    /// Key in the engine's `<port>/<proto>` notation.
    pub fn key(&self) -> String {
        format!("{}/{}", self.port, self.protocol)
    }
}

/// A host directory (or socket) bind-mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub source: PathBuf,
    pub target: String,
}

impl BindMount {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Captured output of a command run inside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A container as reported by a list call.
#[derive(Debug, Clone, Default)]
pub struct ContainerSummary {
    pub id: String,
    /// Names as the daemon reports them, including the leading `/`.
    pub names: Vec<String>,
    pub labels: HashMap<String, String>,
    pub running: bool,
}

impl ContainerSummary {
    /// Whether any of the daemon names matches `name` once the `/` prefix is stripped.
    pub fn has_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.trim_start_matches('/') == name)
    }
}

/// A mount point reported by container inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountPoint {
    pub source: String,
    pub destination: String,
}

/// A network as reported by a list call.
#[derive(Debug, Clone, Default)]
pub struct NetworkSummary {
    pub id: String,
    pub name: String,
}
