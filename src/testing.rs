//! Test doubles for the container engine and the readiness probe.
//!
//! Provides:
//! - [`FakeEngine`]: an in-memory daemon implementing [`Engine`]
//! - [`ScriptedProbe`]: a readiness probe that replays a fixed sequence of responses
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kana::docker::DockerClient;
//! use kana::testing::FakeEngine;
//!
//! # async fn example() {
//! let engine = Arc::new(FakeEngine::new());
//! let docker = DockerClient::new(engine.clone());
//! docker.ensure_network("kana").await.unwrap();
//! assert_eq!(engine.network_names(), vec!["kana"]);
//! # }
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::docker::{
    ContainerSpec, ContainerSummary, DockerError, Engine, ExecResult, MountPoint, NetworkSummary,
    Result,
};
use crate::site::verify::{Probe, ProbeError};

#[derive(Debug, Clone)]
struct FakeContainer {
    id: String,
    spec: ContainerSpec,
    running: bool,
    exit_code: i64,
    logs: String,
}

#[derive(Default)]
struct FakeState {
    containers: Vec<FakeContainer>,
    networks: Vec<NetworkSummary>,
    images: HashSet<String>,
    pulls: Vec<String>,
    next_id: u64,
    creates: HashMap<String, usize>,
    starts: HashMap<String, usize>,
    mutations: usize,
    command_scripts: Vec<(String, i64, String)>,
    exec_scripts: Vec<(String, ExecResult)>,
    exec_log: Vec<(String, Vec<String>)>,
    fail_removals: bool,
    fail_pulls: bool,
    failing_starts: u32,
    fail_waits: bool,
    hang_logs: bool,
    failing_probes: u32,
    probes: u32,
}

/// In-memory stand-in for the Docker daemon.
///
/// Containers run until stopped; one-shot containers (those with a command)
/// exit when waited on, with the status and logs registered through
/// [`script_command`](Self::script_command).
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<FakeState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One-shot containers whose joined command contains `pattern` exit with
    /// `exit_code` and log `output`. Later registrations win.
    pub fn script_command(&self, pattern: &str, exit_code: i64, output: &str) {
        self.lock()
            .command_scripts
            .insert(0, (pattern.to_string(), exit_code, output.to_string()));
    }

    /// Exec sessions whose shell command contains `pattern` return this
    /// result. Later registrations win.
    pub fn script_exec(&self, pattern: &str, exit_code: i64, stdout: &str, stderr: &str) {
        self.lock().exec_scripts.insert(
            0,
            (
                pattern.to_string(),
                ExecResult {
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                    exit_code,
                },
            ),
        );
    }

    /// Make container removal fail.
    pub fn fail_removals(&self, fail: bool) {
        self.lock().fail_removals = fail;
    }

    /// Make image pulls fail.
    pub fn fail_pulls(&self, fail: bool) {
        self.lock().fail_pulls = fail;
    }

    /// Make the next `count` container starts fail.
    pub fn fail_starts(&self, count: u32) {
        self.lock().failing_starts = count;
    }

    /// Make waiting on a container fail.
    pub fn fail_waits(&self, fail: bool) {
        self.lock().fail_waits = fail;
    }

    /// Make log collection never complete.
    pub fn hang_logs(&self, hang: bool) {
        self.lock().hang_logs = hang;
    }

    /// Make the next `count` list calls fail as if the daemon were down.
    pub fn fail_probes(&self, count: u32) {
        self.lock().failing_probes = count;
    }

    /// Number of list calls made so far.
    pub fn probe_count(&self) -> u32 {
        self.lock().probes
    }

    /// How many containers were created with `name`.
    pub fn create_count(&self, name: &str) -> usize {
        self.lock().creates.get(name).copied().unwrap_or(0)
    }

    /// How many times a container named `name` was started.
    pub fn start_count(&self, name: &str) -> usize {
        self.lock().starts.get(name).copied().unwrap_or(0)
    }

    /// Create, start, stop and remove calls made so far.
    pub fn mutation_count(&self) -> usize {
        self.lock().mutations
    }

    /// Images pulled, in order.
    pub fn pulls(&self) -> Vec<String> {
        self.lock().pulls.clone()
    }

    /// Container name and argv of every exec session, in order.
    pub fn exec_log(&self) -> Vec<(String, Vec<String>)> {
        self.lock().exec_log.clone()
    }

    pub fn network_names(&self) -> Vec<String> {
        self.lock().networks.iter().map(|n| n.name.clone()).collect()
    }

    /// Names of running containers.
    pub fn running_names(&self) -> Vec<String> {
        self.lock()
            .containers
            .iter()
            .filter(|c| c.running)
            .map(|c| c.spec.name.clone())
            .collect()
    }

    /// The spec a container was created from.
    pub fn spec_of(&self, name: &str) -> Option<ContainerSpec> {
        self.lock()
            .containers
            .iter()
            .find(|c| c.spec.name == name)
            .map(|c| c.spec.clone())
    }

    /// Pretend `image` is already present locally.
    pub fn add_image(&self, image: &str) {
        self.lock().images.insert(image.to_string());
    }
}

fn matches_labels(labels: &HashMap<String, String>, filters: &[String]) -> bool {
    filters.iter().all(|filter| match filter.split_once('=') {
        Some((key, value)) => labels.get(key).is_some_and(|v| v == value),
        None => labels.contains_key(filter.as_str()),
    })
}

#[async_trait]
impl Engine for FakeEngine {
    async fn list_containers(&self, all: bool, labels: &[String]) -> Result<Vec<ContainerSummary>> {
        let mut state = self.lock();
        state.probes += 1;
        if state.failing_probes > 0 {
            state.failing_probes -= 1;
            return Err(DockerError::Query {
                reason: "Cannot connect to the Docker daemon".to_string(),
            });
        }

        Ok(state
            .containers
            .iter()
            .filter(|c| all || c.running)
            .filter(|c| matches_labels(&c.spec.labels, labels))
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                names: vec![format!("/{}", c.spec.name)],
                labels: c.spec.labels.clone(),
                running: c.running,
            })
            .collect())
    }

    async fn inspect_mounts(&self, id: &str) -> Result<Vec<MountPoint>> {
        let state = self.lock();
        let container = state
            .containers
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| DockerError::Query {
                reason: format!("no such container: {}", id),
            })?;

        Ok(container
            .spec
            .mounts
            .iter()
            .map(|m| MountPoint {
                source: m.source.to_string_lossy().into_owned(),
                destination: m.target.clone(),
            })
            .collect())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let mut state = self.lock();
        if state.containers.iter().any(|c| c.spec.name == spec.name) {
            return Err(DockerError::ContainerCreationFailed {
                name: spec.name.clone(),
                reason: "Conflict. The container name is already in use".to_string(),
            });
        }

        let joined = spec.command.join(" ");
        let (exit_code, logs) = state
            .command_scripts
            .iter()
            .find(|(pattern, _, _)| joined.contains(pattern.as_str()))
            .map(|(_, code, output)| (*code, output.clone()))
            .unwrap_or((0, String::new()));

        state.next_id += 1;
        let id = format!("{:012x}", state.next_id);
        state.containers.push(FakeContainer {
            id: id.clone(),
            spec: spec.clone(),
            running: false,
            exit_code,
            logs,
        });
        *state.creates.entry(spec.name.clone()).or_default() += 1;
        state.mutations += 1;
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        if state.failing_starts > 0 {
            state.failing_starts -= 1;
            return Err(DockerError::ContainerStartFailed {
                name: id.to_string(),
                reason: "port is already allocated".to_string(),
            });
        }
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| DockerError::ContainerStartFailed {
                name: id.to_string(),
                reason: "no such container".to_string(),
            })?;
        container.running = true;
        let name = container.spec.name.clone();
        *state.starts.entry(name).or_default() += 1;
        state.mutations += 1;
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| DockerError::ContainerStopFailed {
                name: id.to_string(),
                reason: "no such container".to_string(),
            })?;
        container.running = false;
        state.mutations += 1;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        if state.fail_removals {
            return Err(DockerError::ContainerRemoveFailed {
                name: id.to_string(),
                reason: "removal of container is already in progress".to_string(),
            });
        }
        let before = state.containers.len();
        state.containers.retain(|c| c.id != id);
        if state.containers.len() == before {
            return Err(DockerError::ContainerRemoveFailed {
                name: id.to_string(),
                reason: "no such container".to_string(),
            });
        }
        state.mutations += 1;
        Ok(())
    }

    async fn wait_container(&self, id: &str) -> Result<i64> {
        let mut state = self.lock();
        if state.fail_waits {
            return Err(DockerError::WaitFailed {
                id: id.to_string(),
                reason: "wait stream closed".to_string(),
            });
        }
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| DockerError::WaitFailed {
                id: id.to_string(),
                reason: "no such container".to_string(),
            })?;
        container.running = false;
        Ok(container.exit_code)
    }

    async fn container_logs(&self, id: &str) -> Result<String> {
        let logs = {
            let state = self.lock();
            if state.hang_logs {
                None
            } else {
                Some(state.containers.iter().find(|c| c.id == id).map(|c| c.logs.clone()))
            }
        };

        match logs {
            Some(logs) => logs.ok_or_else(|| DockerError::LogsFailed {
                id: id.to_string(),
                reason: "no such container".to_string(),
            }),
            None => futures::future::pending().await,
        }
    }

    async fn exec(&self, id: &str, command: Vec<String>, _timeout: Duration) -> Result<ExecResult> {
        let mut state = self.lock();
        let name = state
            .containers
            .iter()
            .find(|c| c.id == id && c.running)
            .map(|c| c.spec.name.clone())
            .ok_or_else(|| DockerError::ExecFailed {
                name: id.to_string(),
                reason: "container is not running".to_string(),
            })?;

        let joined = command.join(" ");
        let result = state
            .exec_scripts
            .iter()
            .find(|(pattern, _)| joined.contains(pattern.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default();

        state.exec_log.push((name, command));
        Ok(result)
    }

    async fn list_networks(&self) -> Result<Vec<NetworkSummary>> {
        Ok(self.lock().networks.clone())
    }

    async fn create_network(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("net{:09x}", state.next_id);
        state.networks.push(NetworkSummary {
            id,
            name: name.to_string(),
        });
        Ok(())
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        self.lock().networks.retain(|n| n.id != id);
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        Ok(self.lock().images.contains(image))
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let mut state = self.lock();
        if state.fail_pulls {
            return Err(DockerError::ImagePullFailed {
                image: image.to_string(),
                reason: "manifest unknown".to_string(),
            });
        }
        state.pulls.push(image.to_string());
        state.images.insert(image.to_string());
        Ok(())
    }
}

/// A readiness probe replaying scripted responses.
///
/// Each call pops the next response; once the script runs out the last one
/// repeats.
pub struct ScriptedProbe {
    responses: Mutex<VecDeque<std::result::Result<u16, String>>>,
    last: Mutex<std::result::Result<u16, String>>,
    calls: AtomicU32,
}

impl ScriptedProbe {
    pub fn new(responses: Vec<std::result::Result<u16, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            last: Mutex::new(Ok(200)),
            calls: AtomicU32::new(0),
        }
    }

    /// `failures` responses with `status`, then 200.
    pub fn succeeding_after(failures: usize, status: u16) -> Self {
        let mut responses = vec![Ok(status); failures];
        responses.push(Ok(200));
        Self::new(responses)
    }

    /// Always answers `status`.
    pub fn always(status: u16) -> Self {
        Self::new(vec![Ok(status)])
    }

    /// Fails with a transport error on every call.
    pub fn unreachable() -> Self {
        Self::new(vec![Err("connection refused".to_string())])
    }

    /// Number of requests made so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn status(&self, _url: &str) -> std::result::Result<u16, ProbeError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let next = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(response) = next {
            *last = response;
        }

        last.clone().map_err(ProbeError)
    }
}
