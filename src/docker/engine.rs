//! The raw engine seam and its bollard implementation.
//!
//! [`Engine`] is a one-to-one mapping of the daemon calls this crate makes.
//! It carries no idempotence or policy; that lives in
//! [`DockerClient`](crate::docker::DockerClient), which is generic over any
//! engine so the lifecycle logic can be exercised against
//! [`FakeEngine`](crate::testing::FakeEngine).

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogOutput, LogsOptions,
    NetworkingConfig, StartContainerOptions, WaitContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{EndpointSettings, HostConfig, Mount, MountTypeEnum, PortBinding};
use bollard::network::{CreateNetworkOptions, ListNetworksOptions};
use futures::StreamExt;
use tokio::sync::oneshot;

use crate::docker::error::{DockerError, Result};
use crate::docker::spec::{ContainerSpec, ContainerSummary, ExecResult, MountPoint, NetworkSummary};

/// Daemon operations used by the client.
#[async_trait]
pub trait Engine: Send + Sync {
    /// List containers whose labels match every `key` or `key=value` filter.
    /// `all` includes stopped containers.
    async fn list_containers(&self, all: bool, labels: &[String]) -> Result<Vec<ContainerSummary>>;

    /// Mount points of a container.
    async fn inspect_mounts(&self, id: &str) -> Result<Vec<MountPoint>>;

    /// Create a container from `spec`, returning its id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    async fn start_container(&self, id: &str) -> Result<()>;

    async fn stop_container(&self, id: &str) -> Result<()>;

    async fn remove_container(&self, id: &str) -> Result<()>;

    /// Block until the container exits and return its status code.
    async fn wait_container(&self, id: &str) -> Result<i64>;

    /// Combined stdout/stderr of a container. Unbounded; callers apply a timeout.
    async fn container_logs(&self, id: &str) -> Result<String>;

    /// Run `command` in a running container, demultiplexing its output.
    /// Waiting for the output stream is bounded by `timeout`.
    async fn exec(&self, id: &str, command: Vec<String>, timeout: Duration) -> Result<ExecResult>;

    async fn list_networks(&self) -> Result<Vec<NetworkSummary>>;

    /// Create a bridge network.
    async fn create_network(&self, name: &str) -> Result<()>;

    async fn remove_network(&self, id: &str) -> Result<()>;

    async fn image_exists(&self, image: &str) -> Result<bool>;

    async fn pull_image(&self, image: &str) -> Result<()>;
}

/// Connect to the local daemon.
///
/// Tries bollard's platform defaults first (honoring `DOCKER_HOST`), then the
/// per-user sockets used by Docker Desktop and rootless Docker. If none of
/// them answers a ping, the default client is returned anyway so the caller's
/// availability probe (and auto-start loop) decides what happens next.
pub async fn connect_docker() -> Result<Docker> {
    let docker =
        Docker::connect_with_local_defaults().map_err(|e| DockerError::DaemonUnreachable {
            reason: e.to_string(),
            hint: crate::docker::Platform::current().start_hint(),
        })?;

    if docker.ping().await.is_ok() {
        return Ok(docker);
    }

    #[cfg(unix)]
    for socket in fallback_sockets() {
        if !socket.exists() {
            continue;
        }
        let Some(path) = socket.to_str() else {
            continue;
        };
        if let Ok(candidate) = Docker::connect_with_unix(path, 120, bollard::API_DEFAULT_VERSION)
            && candidate.ping().await.is_ok()
        {
            tracing::debug!("Connected to Docker via {}", path);
            return Ok(candidate);
        }
    }

    Ok(docker)
}

#[cfg(unix)]
fn fallback_sockets() -> Vec<PathBuf> {
    user_sockets(
        dirs::home_dir(),
        std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from),
    )
}

/// Docker Desktop's per-user socket, then the rootless daemon's socket in
/// the user's runtime directory.
#[cfg(unix)]
fn user_sockets(home: Option<PathBuf>, runtime_dir: Option<PathBuf>) -> Vec<PathBuf> {
    let mut sockets = Vec::new();
    if let Some(home) = home {
        sockets.push(home.join(".docker/run/docker.sock"));
    }
    if let Some(runtime_dir) = runtime_dir {
        sockets.push(runtime_dir.join("docker.sock"));
    }
    sockets
}

/// [`Engine`] backed by a bollard connection.
#[derive(Clone)]
pub struct BollardEngine {
    docker: Docker,
}

impl BollardEngine {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    pub async fn connect() -> Result<Self> {
        Ok(Self::new(connect_docker().await?))
    }
}

#[async_trait]
impl Engine for BollardEngine {
    async fn list_containers(&self, all: bool, labels: &[String]) -> Result<Vec<ContainerSummary>> {
        let mut filters = HashMap::new();
        if !labels.is_empty() {
            filters.insert("label".to_string(), labels.to_vec());
        }

        let options = ListContainersOptions {
            all,
            filters,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| DockerError::Query {
                reason: e.to_string(),
            })?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                Some(ContainerSummary {
                    id: c.id?,
                    names: c.names.unwrap_or_default(),
                    labels: c.labels.unwrap_or_default(),
                    running: c.state.as_deref() == Some("running"),
                })
            })
            .collect())
    }

    async fn inspect_mounts(&self, id: &str) -> Result<Vec<MountPoint>> {
        let info = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(|e| DockerError::Query {
                reason: e.to_string(),
            })?;

        Ok(info
            .mounts
            .unwrap_or_default()
            .into_iter()
            .map(|m| MountPoint {
                source: m.source.unwrap_or_default(),
                destination: m.destination.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let mut port_bindings = HashMap::new();
        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
        for port in &spec.ports {
            port_bindings.insert(
                port.key(),
                Some(vec![PortBinding {
                    host_ip: Some("127.0.0.1".to_string()),
                    host_port: Some(port.port.to_string()),
                }]),
            );
            exposed_ports.insert(port.key(), HashMap::new());
        }

        let mounts: Vec<Mount> = spec
            .mounts
            .iter()
            .map(|m| Mount {
                source: Some(m.source.to_string_lossy().into_owned()),
                target: Some(m.target.clone()),
                typ: Some(MountTypeEnum::BIND),
                ..Default::default()
            })
            .collect();

        let host_config = HostConfig {
            port_bindings: if port_bindings.is_empty() {
                None
            } else {
                Some(port_bindings)
            },
            mounts: if mounts.is_empty() { None } else { Some(mounts) },
            ..Default::default()
        };

        let networking_config = if spec.network.is_empty() {
            None
        } else {
            Some(NetworkingConfig {
                endpoints_config: HashMap::from([(
                    spec.network.clone(),
                    EndpointSettings::default(),
                )]),
            })
        };

        let env = spec.env_strings();
        let config = Config {
            tty: Some(true),
            image: Some(spec.image.clone()),
            hostname: Some(spec.name.clone()),
            cmd: if spec.command.is_empty() {
                None
            } else {
                Some(spec.command.clone())
            },
            env: if env.is_empty() { None } else { Some(env) },
            labels: Some(spec.labels.clone()),
            exposed_ports: if exposed_ports.is_empty() {
                None
            } else {
                Some(exposed_ports)
            },
            host_config: Some(host_config),
            networking_config,
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| DockerError::ContainerCreationFailed {
                name: spec.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| DockerError::ContainerStartFailed {
                name: id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        self.docker
            .stop_container(id, None)
            .await
            .map_err(|e| DockerError::ContainerStopFailed {
                name: id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.docker
            .remove_container(id, None)
            .await
            .map_err(|e| DockerError::ContainerRemoveFailed {
                name: id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn wait_container(&self, id: &str) -> Result<i64> {
        let mut stream = self
            .docker
            .wait_container(id, None::<WaitContainerOptions<String>>);

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit as an error carrying the code
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(DockerError::WaitFailed {
                id: id.to_string(),
                reason: e.to_string(),
            }),
            None => Err(DockerError::WaitFailed {
                id: id.to_string(),
                reason: "wait stream ended without a status".to_string(),
            }),
        }
    }

    async fn container_logs(&self, id: &str) -> Result<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let mut stream = self.docker.logs(id, Some(options));
        let mut text = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DockerError::LogsFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
            text.push_str(&String::from_utf8_lossy(&chunk.into_bytes()));
        }

        Ok(text)
    }

    async fn exec(&self, id: &str, command: Vec<String>, timeout: Duration) -> Result<ExecResult> {
        let exec_failed = |reason: String| DockerError::ExecFailed {
            name: id.to_string(),
            reason,
        };

        let exec = self
            .docker
            .create_exec(
                id,
                CreateExecOptions {
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    cmd: Some(command),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| exec_failed(e.to_string()))?;

        let StartExecResults::Attached { mut output, .. } = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| exec_failed(e.to_string()))?
        else {
            return Err(exec_failed("exec session did not attach".to_string()));
        };

        // Demultiplex on a background task; the caller only waits for the
        // completion signal.
        let (done_tx, done_rx) = oneshot::channel();
        let copier = tokio::spawn(async move {
            let mut stdout = String::new();
            let mut stderr = String::new();
            while let Some(chunk) = output.next().await {
                match chunk {
                    Ok(LogOutput::StdErr { message }) => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(other) => stdout.push_str(&String::from_utf8_lossy(&other.into_bytes())),
                    Err(e) => {
                        let _ = done_tx.send(Err(e.to_string()));
                        return;
                    }
                }
            }
            let _ = done_tx.send(Ok((stdout, stderr)));
        });

        let (stdout, stderr) = match tokio::time::timeout(timeout, done_rx).await {
            Ok(Ok(Ok(streams))) => streams,
            Ok(Ok(Err(reason))) => return Err(exec_failed(reason)),
            Ok(Err(_)) => return Err(exec_failed("output task ended early".to_string())),
            Err(_) => {
                copier.abort();
                return Err(DockerError::Timeout {
                    operation: format!("exec in '{}'", id),
                    timeout,
                });
            }
        };

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| exec_failed(e.to_string()))?;

        Ok(ExecResult {
            stdout,
            stderr,
            exit_code: inspect.exit_code.unwrap_or(-1),
        })
    }

    async fn list_networks(&self) -> Result<Vec<NetworkSummary>> {
        let networks = self
            .docker
            .list_networks(Some(ListNetworksOptions::<String> {
                filters: HashMap::new(),
            }))
            .await
            .map_err(|e| DockerError::Network {
                name: String::new(),
                reason: e.to_string(),
            })?;

        Ok(networks
            .into_iter()
            .map(|n| NetworkSummary {
                id: n.id.unwrap_or_default(),
                name: n.name.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_network(&self, name: &str) -> Result<()> {
        self.docker
            .create_network(CreateNetworkOptions {
                name: name.to_string(),
                driver: "bridge".to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| DockerError::Network {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        self.docker
            .remove_network(id)
            .await
            .map_err(|e| DockerError::Network {
                name: id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(DockerError::Query {
                reason: e.to_string(),
            }),
        }
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        tracing::trace!("Pull status: {}", status);
                    }
                }
                Err(e) => {
                    return Err(DockerError::ImagePullFailed {
                        image: image.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
