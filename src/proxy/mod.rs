//! The shared reverse proxy.
//!
//! One traefik container (`kana_traefik`) fronts every site. It is started
//! lazily by the first site start and stopped once no site containers are
//! left. It carries [`GLOBAL_LABEL`] instead of a site label, so it never
//! counts towards that decision itself.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::certs::CertPaths;
use crate::config::Config;
use crate::docker::{BindMount, ContainerSpec, DockerClient, DockerError, ExposedPort, GLOBAL_LABEL};
use crate::site::containers::{NETWORK, Orchestrator};

/// Name of the proxy container.
pub const PROXY_NAME: &str = "kana_traefik";

const PROXY_IMAGE: &str = "traefik:latest";
const CONFIG_MOUNT: &str = "/etc/traefik";
const CERTS_MOUNT: &str = "/var/certs";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Static configuration file name.
pub const STATIC_CONFIG: &str = "traefik.toml";

/// Dynamic (TLS) configuration file name.
pub const DYNAMIC_CONFIG: &str = "dynamic.toml";

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Docker(#[from] DockerError),

    #[error("Failed to write proxy configuration {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, ProxyError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StaticConfig {
    entry_points: BTreeMap<String, EntryPoint>,
    api: Api,
    providers: Providers,
}

#[derive(Debug, Serialize)]
struct EntryPoint {
    address: String,
}

#[derive(Debug, Serialize)]
struct Api {
    insecure: bool,
}

#[derive(Debug, Serialize)]
struct Providers {
    docker: DockerProvider,
    file: FileProvider,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DockerProvider {
    exposed_by_default: bool,
}

#[derive(Debug, Serialize)]
struct FileProvider {
    filename: String,
}

#[derive(Debug, Serialize)]
struct DynamicConfig {
    tls: Tls,
}

#[derive(Debug, Serialize)]
struct Tls {
    certificates: Vec<Certificate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Certificate {
    cert_file: String,
    key_file: String,
}

fn static_config() -> StaticConfig {
    StaticConfig {
        entry_points: BTreeMap::from([
            (
                "web".to_string(),
                EntryPoint {
                    address: ":80".to_string(),
                },
            ),
            (
                "websecure".to_string(),
                EntryPoint {
                    address: ":443".to_string(),
                },
            ),
        ]),
        api: Api { insecure: true },
        providers: Providers {
            docker: DockerProvider {
                exposed_by_default: false,
            },
            file: FileProvider {
                filename: format!("{}/{}", CONFIG_MOUNT, DYNAMIC_CONFIG),
            },
        },
    }
}

fn dynamic_config(certs: &CertPaths) -> DynamicConfig {
    let in_container = |path: PathBuf| {
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/{}", CERTS_MOUNT, file)
    };

    DynamicConfig {
        tls: Tls {
            certificates: vec![Certificate {
                cert_file: in_container(certs.site_cert()),
                key_file: in_container(certs.site_key()),
            }],
        },
    }
}

fn write_if_absent<T: Serialize>(path: &Path, value: &T) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    let config_error = |reason: String| ProxyError::Config {
        path: path.to_path_buf(),
        reason,
    };
    let rendered = toml::to_string_pretty(value).map_err(|e| config_error(e.to_string()))?;
    std::fs::write(path, rendered).map_err(|e| config_error(e.to_string()))?;
    tracing::debug!("Wrote {}", path.display());
    Ok(true)
}

/// Manages the single proxy container shared by all sites.
pub struct SharedProxy<'a> {
    docker: &'a DockerClient,
    config_dir: PathBuf,
    certs: CertPaths,
}

impl<'a> SharedProxy<'a> {
    pub fn new(docker: &'a DockerClient, config: &Config) -> Self {
        Self {
            docker,
            config_dir: config.app_directory.join("config").join("traefik"),
            certs: config.certs.clone(),
        }
    }

    /// Directory holding the proxy's configuration files.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn spec(&self) -> ContainerSpec {
        ContainerSpec {
            name: PROXY_NAME.to_string(),
            image: PROXY_IMAGE.to_string(),
            ports: [80, 443, 8080].into_iter().map(ExposedPort::tcp).collect(),
            network: NETWORK.to_string(),
            mounts: vec![
                BindMount::new(&self.config_dir, CONFIG_MOUNT),
                BindMount::new(&self.certs.directory, CERTS_MOUNT),
                BindMount::new(DOCKER_SOCKET, DOCKER_SOCKET),
            ],
            command: Vec::new(),
            env: Vec::new(),
            labels: HashMap::from([(GLOBAL_LABEL.to_string(), "true".to_string())]),
        }
    }

    /// Write the proxy configuration when missing.
    pub fn ensure_config(&self) -> Result<()> {
        let config_error = |e: std::io::Error, path: &Path| ProxyError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        std::fs::create_dir_all(&self.config_dir).map_err(|e| config_error(e, &self.config_dir))?;
        self.certs
            .ensure_directory()
            .map_err(|e| config_error(e, &self.certs.directory))?;

        write_if_absent(&self.config_dir.join(STATIC_CONFIG), &static_config())?;
        write_if_absent(
            &self.config_dir.join(DYNAMIC_CONFIG),
            &dynamic_config(&self.certs),
        )?;

        if !self.certs.is_provisioned() {
            tracing::warn!(
                "No development certificates found in {}; HTTPS will not be trusted",
                self.certs.directory.display()
            );
        }
        Ok(())
    }

    /// Start the proxy unless it is already running. Returns its id.
    pub async fn ensure_running(&self) -> Result<String> {
        self.ensure_config()?;
        let id = Orchestrator::new(self.docker).launch(&self.spec()).await?;
        tracing::debug!("Proxy {} is running", PROXY_NAME);
        Ok(id)
    }

    /// Stop the proxy when no site containers remain. Returns whether it
    /// was stopped.
    pub async fn maybe_stop(&self) -> Result<bool> {
        let remaining = self.docker.list_containers(None).await?;
        if !remaining.is_empty() {
            tracing::debug!(
                "{} site container(s) still present; leaving {} running",
                remaining.len(),
                PROXY_NAME
            );
            return Ok(false);
        }

        let (_, running) = self.docker.is_running(PROXY_NAME).await?;
        if !running {
            return Ok(false);
        }

        self.docker.stop(PROXY_NAME).await?;
        tracing::info!("Stopped shared proxy");
        Ok(true)
    }
}
