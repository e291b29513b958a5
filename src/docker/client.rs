//! Idempotent container operations on top of an [`Engine`].

use std::sync::Arc;
use std::time::Duration;

use crate::docker::daemon::{DaemonAutostart, Platform};
use crate::docker::engine::{BollardEngine, Engine};
use crate::docker::error::{DockerError, Result};
use crate::docker::spec::{ContainerSpec, ExecResult, MountPoint, SITE_LABEL};

/// Bound on collecting a container's logs.
pub const LOG_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on waiting for exec output.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(600);

/// Typed facade over the container engine.
///
/// Never caches container state: every query goes back to the daemon.
#[derive(Clone)]
pub struct DockerClient {
    engine: Arc<dyn Engine>,
    exec_timeout: Duration,
}

impl DockerClient {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            exec_timeout: DEFAULT_EXEC_TIMEOUT,
        }
    }

    /// Connect to the local daemon and make sure it answers, launching it
    /// where the platform allows.
    pub async fn connect() -> Result<Self> {
        let client = Self::new(Arc::new(BollardEngine::connect().await?));
        let platform = Platform::current();
        client
            .ensure_daemon_available(platform.autostart(), platform.start_hint())
            .await?;
        Ok(client)
    }

    /// Set the bound on waiting for exec output.
    pub fn with_exec_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = timeout;
        self
    }

    /// Probe the daemon with a list call.
    ///
    /// When the probe fails and `autostart` is supplied, the daemon is
    /// launched and re-probed every `interval` up to `attempts` times.
    /// Without `autostart` the first failure is final.
    pub async fn ensure_daemon_available(
        &self,
        autostart: Option<DaemonAutostart>,
        hint: &'static str,
    ) -> Result<()> {
        let first = match self.engine.list_containers(false, &[]).await {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };

        let Some(autostart) = autostart else {
            return Err(DockerError::DaemonUnreachable {
                reason: first.to_string(),
                hint,
            });
        };

        tracing::info!("Docker doesn't appear to be running. Trying to start Docker.");
        autostart
            .launch()
            .await
            .map_err(|e| DockerError::DaemonUnreachable {
                reason: format!("unable to launch Docker: {}", e),
                hint,
            })?;

        let mut last = first;
        for attempt in 1..=autostart.attempts {
            tokio::time::sleep(autostart.interval).await;
            match self.engine.list_containers(false, &[]).await {
                Ok(_) => {
                    tracing::info!("Docker is up after {} probe(s)", attempt);
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!("Docker probe {} failed: {}", attempt, e);
                    last = e;
                }
            }
        }

        Err(DockerError::DaemonUnreachable {
            reason: format!(
                "still unreachable after {} attempts: {}",
                autostart.attempts, last
            ),
            hint,
        })
    }

    /// Ids of every container carrying the ownership label, optionally only
    /// those of one site. Includes stopped containers.
    pub async fn list_containers(&self, site: Option<&str>) -> Result<Vec<String>> {
        let filter = match site {
            Some(site) if !site.is_empty() => format!("{}={}", SITE_LABEL, site),
            _ => SITE_LABEL.to_string(),
        };

        let containers = self.engine.list_containers(true, &[filter]).await?;
        Ok(containers.into_iter().map(|c| c.id).collect())
    }

    /// Find a running container by exact name.
    pub async fn is_running(&self, name: &str) -> Result<(Option<String>, bool)> {
        let running = self.engine.list_containers(false, &[]).await?;
        Ok(running
            .into_iter()
            .find(|c| c.has_name(name))
            .map_or((None, false), |c| (Some(c.id), true)))
    }

    async fn running_id(&self, name: &str) -> Result<Option<String>> {
        Ok(self.is_running(name).await?.0)
    }

    /// Create and start a container, or return the id of the running one
    /// with the same name.
    ///
    /// A stopped container left over under the same name is removed first.
    /// When the new container fails to start it is removed again, so the
    /// name stays free for the next attempt.
    pub async fn run(&self, spec: &ContainerSpec) -> Result<String> {
        let existing = self.engine.list_containers(true, &[]).await?;
        if let Some(container) = existing.into_iter().find(|c| c.has_name(&spec.name)) {
            if container.running {
                tracing::debug!("Container {} already running", spec.name);
                return Ok(container.id);
            }
            tracing::debug!("Removing stopped container {}", spec.name);
            self.engine.remove_container(&container.id).await?;
        }

        let id = self.engine.create_container(spec).await?;
        if let Err(e) = self.engine.start_container(&id).await {
            if let Err(remove) = self.engine.remove_container(&id).await {
                tracing::warn!("Unable to remove unstarted container {}: {}", spec.name, remove);
            }
            return Err(match e {
                DockerError::ContainerStartFailed { reason, .. } => {
                    DockerError::ContainerStartFailed {
                        name: spec.name.clone(),
                        reason,
                    }
                }
                other => other,
            });
        }

        tracing::info!("Started container {}", spec.name);
        Ok(id)
    }

    /// Block until the container exits.
    pub async fn wait(&self, id: &str) -> Result<i64> {
        self.engine.wait_container(id).await
    }

    /// Combined stdout/stderr, bounded by `timeout`.
    pub async fn logs(&self, id: &str, timeout: Duration) -> Result<String> {
        tokio::time::timeout(timeout, self.engine.container_logs(id))
            .await
            .map_err(|_| DockerError::Timeout {
                operation: format!("reading logs of '{}'", id),
                timeout,
            })?
    }

    /// Run a one-shot container to completion and remove it.
    ///
    /// Returns the exit status and the captured logs. The container is
    /// removed whatever the status; a removal failure is only logged.
    pub async fn run_and_clean(&self, spec: &ContainerSpec) -> Result<(i64, String)> {
        let id = self.run(spec).await?;

        let outcome: Result<(i64, String)> = async {
            let status = self.wait(&id).await?;
            let output = self.logs(&id, LOG_TIMEOUT).await?;
            Ok((status, output))
        }
        .await;

        if let Err(e) = self.engine.remove_container(&id).await {
            tracing::warn!("Unable to remove container {}: {}", spec.name, e);
        }

        outcome
    }

    /// Stop and remove a container. Succeeds without doing anything when it
    /// is not running.
    pub async fn stop(&self, name: &str) -> Result<()> {
        let Some(id) = self.running_id(name).await? else {
            return Ok(());
        };

        self.engine.stop_container(&id).await?;
        self.engine.remove_container(&id).await?;

        tracing::info!("Stopped container {}", name);
        Ok(())
    }

    /// Stop and start a container in place. Succeeds without doing anything
    /// when it is not running.
    pub async fn restart(&self, name: &str) -> Result<()> {
        let Some(id) = self.running_id(name).await? else {
            return Ok(());
        };

        self.engine.stop_container(&id).await?;
        self.engine.start_container(&id).await?;

        tracing::debug!("Restarted container {}", name);
        Ok(())
    }

    /// Run a shell command in a running container.
    ///
    /// The command is wrapped in `sh -c` so pipes and redirects work. A
    /// container that is not running yields an empty result, not an error;
    /// use [`is_running`](Self::is_running) to tell the two apart.
    pub async fn exec(&self, name: &str, command: &str) -> Result<ExecResult> {
        let Some(id) = self.running_id(name).await? else {
            return Ok(ExecResult::default());
        };

        let full_command = vec!["sh".to_string(), "-c".to_string(), command.to_string()];
        tracing::debug!("Exec in {}: {}", name, command);

        self.engine
            .exec(&id, full_command, self.exec_timeout)
            .await
            .map_err(|e| match e {
                DockerError::ExecFailed { reason, .. } => DockerError::ExecFailed {
                    name: name.to_string(),
                    reason,
                },
                other => other,
            })
    }

    /// Pull `image` unless it is already present locally.
    pub async fn ensure_image(&self, image: &str) -> Result<()> {
        let image = with_default_tag(image);

        if self.engine.image_exists(&image).await? {
            tracing::debug!("Image '{}' exists locally", image);
            return Ok(());
        }

        tracing::info!("Pulling image: {}", image);
        self.engine.pull_image(&image).await?;
        tracing::info!("Pulled image: {}", image);
        Ok(())
    }

    /// Mounts of a running container; empty when it is not running.
    pub async fn container_mounts(&self, name: &str) -> Result<Vec<MountPoint>> {
        match self.running_id(name).await? {
            Some(id) => self.engine.inspect_mounts(&id).await,
            None => Ok(Vec::new()),
        }
    }

    pub(crate) fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }
}

/// Append `:latest` to references without a tag or digest.
///
/// Pulling an untagged reference would fetch every tag of the repository.
pub fn with_default_tag(image: &str) -> String {
    let last_segment = image.rsplit('/').next().unwrap_or(image);
    if last_segment.contains(':') || image.contains('@') {
        image.to_string()
    } else {
        format!("{}:latest", image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;

    fn spec(name: &str, site: &str) -> ContainerSpec {
        ContainerSpec {
            name: name.to_string(),
            image: "wordpress:php8.1".to_string(),
            labels: [(SITE_LABEL.to_string(), site.to_string())].into(),
            ..Default::default()
        }
    }

    fn client(engine: &Arc<FakeEngine>) -> DockerClient {
        DockerClient::new(engine.clone())
    }

    #[test]
    fn test_with_default_tag() {
        assert_eq!(with_default_tag("mariadb"), "mariadb:latest");
        assert_eq!(with_default_tag("wordpress:php8.1"), "wordpress:php8.1");
        assert_eq!(
            with_default_tag("localhost:5000/traefik"),
            "localhost:5000/traefik:latest"
        );
        assert_eq!(with_default_tag("img@sha256:abc"), "img@sha256:abc");
    }

    #[tokio::test]
    async fn test_run_is_idempotent() {
        let engine = Arc::new(FakeEngine::new());
        let docker = client(&engine);

        let first = docker.run(&spec("kana_demo_wordpress", "demo")).await.unwrap();
        let second = docker.run(&spec("kana_demo_wordpress", "demo")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.create_count("kana_demo_wordpress"), 1);
        assert_eq!(docker.list_containers(Some("demo")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_not_running_is_noop() {
        let engine = Arc::new(FakeEngine::new());
        let docker = client(&engine);

        docker.stop("kana_missing_database").await.unwrap();
        assert_eq!(engine.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_removes_container() {
        let engine = Arc::new(FakeEngine::new());
        let docker = client(&engine);

        docker.run(&spec("kana_demo_database", "demo")).await.unwrap();
        docker.stop("kana_demo_database").await.unwrap();

        assert!(docker.list_containers(Some("demo")).await.unwrap().is_empty());
        assert!(!docker.is_running("kana_demo_database").await.unwrap().1);
    }

    #[tokio::test]
    async fn test_restart_keeps_container() {
        let engine = Arc::new(FakeEngine::new());
        let docker = client(&engine);

        let id = docker.run(&spec("kana_demo_wordpress", "demo")).await.unwrap();
        docker.restart("kana_demo_wordpress").await.unwrap();

        let (running_id, running) = docker.is_running("kana_demo_wordpress").await.unwrap();
        assert!(running);
        assert_eq!(running_id, Some(id));
        assert_eq!(engine.create_count("kana_demo_wordpress"), 1);
    }

    #[tokio::test]
    async fn test_run_and_clean_removes_on_success_and_failure() {
        let engine = Arc::new(FakeEngine::new());
        let docker = client(&engine);

        engine.script_command("core install", 0, "Success: installed");
        let mut ok = spec("kana_demo_wordpress_cli", "demo");
        ok.command = vec!["wp".into(), "core".into(), "install".into()];
        let (status, output) = docker.run_and_clean(&ok).await.unwrap();
        assert_eq!(status, 0);
        assert_eq!(output, "Success: installed");
        assert!(docker.list_containers(Some("demo")).await.unwrap().is_empty());

        engine.script_command("plugin install", 1, "Error: no such plugin");
        let mut failing = spec("kana_demo_wordpress_cli", "demo");
        failing.command = vec!["wp".into(), "plugin".into(), "install".into()];
        let (status, _) = docker.run_and_clean(&failing).await.unwrap();
        assert_eq!(status, 1);
        assert!(docker.list_containers(Some("demo")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_and_clean_survives_removal_failure() {
        let engine = Arc::new(FakeEngine::new());
        engine.fail_removals(true);
        let docker = client(&engine);

        let (status, _) = docker
            .run_and_clean(&spec("kana_demo_wordpress_cli", "demo"))
            .await
            .unwrap();
        assert_eq!(status, 0);
    }

    #[tokio::test]
    async fn test_failed_start_frees_the_name() {
        let engine = Arc::new(FakeEngine::new());
        engine.fail_starts(1);
        let docker = client(&engine);
        let cli = spec("kana_demo_wordpress_cli", "demo");

        let err = docker.run_and_clean(&cli).await.unwrap_err();
        assert!(matches!(
            err,
            DockerError::ContainerStartFailed { ref name, .. } if name == "kana_demo_wordpress_cli"
        ));
        assert!(docker.list_containers(Some("demo")).await.unwrap().is_empty());

        let (status, _) = docker.run_and_clean(&cli).await.unwrap();
        assert_eq!(status, 0);
        assert_eq!(engine.create_count("kana_demo_wordpress_cli"), 2);
    }

    #[tokio::test]
    async fn test_run_replaces_stopped_container() {
        let engine = Arc::new(FakeEngine::new());
        let docker = client(&engine);
        let id = docker.run(&spec("kana_demo_wordpress", "demo")).await.unwrap();
        engine.stop_container(&id).await.unwrap();

        let replaced = docker.run(&spec("kana_demo_wordpress", "demo")).await.unwrap();

        assert_ne!(replaced, id);
        assert_eq!(docker.list_containers(Some("demo")).await.unwrap(), vec![replaced]);
        assert!(docker.is_running("kana_demo_wordpress").await.unwrap().1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_and_clean_times_out_on_logs() {
        let engine = Arc::new(FakeEngine::new());
        engine.hang_logs(true);
        let docker = client(&engine);

        let started = tokio::time::Instant::now();
        let err = docker
            .run_and_clean(&spec("kana_demo_wordpress_cli", "demo"))
            .await
            .unwrap_err();

        assert!(matches!(err, DockerError::Timeout { timeout, .. } if timeout == LOG_TIMEOUT));
        assert_eq!(started.elapsed(), LOG_TIMEOUT);
        assert!(docker.list_containers(Some("demo")).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_and_clean_removes_after_wait_failure() {
        let engine = Arc::new(FakeEngine::new());
        engine.fail_waits(true);
        let docker = client(&engine);

        let err = docker
            .run_and_clean(&spec("kana_demo_wordpress_cli", "demo"))
            .await
            .unwrap_err();

        assert!(matches!(err, DockerError::WaitFailed { .. }));
        assert!(docker.list_containers(Some("demo")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exec_not_running_returns_empty() {
        let engine = Arc::new(FakeEngine::new());
        let docker = client(&engine);

        let result = docker.exec("kana_demo_wordpress", "ls | wc -l").await.unwrap();
        assert_eq!(result, ExecResult::default());
        assert!(engine.exec_log().is_empty());
    }

    #[tokio::test]
    async fn test_exec_wraps_in_shell() {
        let engine = Arc::new(FakeEngine::new());
        let docker = client(&engine);
        docker.run(&spec("kana_demo_wordpress", "demo")).await.unwrap();

        engine.script_exec("pecl list", 0, "xdebug 3.2.0", "");
        let result = docker
            .exec("kana_demo_wordpress", "pecl list | grep xdebug")
            .await
            .unwrap();

        assert_eq!(result.stdout, "xdebug 3.2.0");
        let log = engine.exec_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].1, vec!["sh", "-c", "pecl list | grep xdebug"]);
    }

    #[tokio::test]
    async fn test_ensure_image_pulls_once() {
        let engine = Arc::new(FakeEngine::new());
        let docker = client(&engine);

        docker.ensure_image("mariadb").await.unwrap();
        docker.ensure_image("mariadb:latest").await.unwrap();

        assert_eq!(engine.pulls(), vec!["mariadb:latest"]);
    }

    #[tokio::test]
    async fn test_ensure_image_skips_present_image() {
        let engine = Arc::new(FakeEngine::new());
        engine.add_image("traefik:latest");
        let docker = client(&engine);

        docker.ensure_image("traefik").await.unwrap();

        assert!(engine.pulls().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_image_failure_is_fatal() {
        let engine = Arc::new(FakeEngine::new());
        engine.fail_pulls(true);
        let docker = client(&engine);

        let err = docker.ensure_image("wordpress:php9.9").await.unwrap_err();
        assert!(matches!(err, DockerError::ImagePullFailed { .. }));
    }

    #[tokio::test]
    async fn test_daemon_available_without_autostart_fails_fast() {
        let engine = Arc::new(FakeEngine::new());
        engine.fail_probes(1);
        let docker = client(&engine);

        let err = docker
            .ensure_daemon_available(None, Platform::Linux.start_hint())
            .await
            .unwrap_err();
        assert!(matches!(err, DockerError::DaemonUnreachable { .. }));
        assert_eq!(engine.probe_count(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_daemon_autostart_retries_until_up() {
        let engine = Arc::new(FakeEngine::new());
        engine.fail_probes(3);
        let docker = client(&engine);

        let autostart = DaemonAutostart {
            program: "true".to_string(),
            args: Vec::new(),
            attempts: 12,
            interval: Duration::from_millis(1),
        };
        docker
            .ensure_daemon_available(Some(autostart), "hint")
            .await
            .unwrap();
        assert_eq!(engine.probe_count(), 4);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_daemon_autostart_gives_up_after_bound() {
        let engine = Arc::new(FakeEngine::new());
        engine.fail_probes(u32::MAX);
        let docker = client(&engine);

        let autostart = DaemonAutostart {
            program: "true".to_string(),
            args: Vec::new(),
            attempts: 3,
            interval: Duration::from_millis(1),
        };
        let err = docker
            .ensure_daemon_available(Some(autostart), "hint")
            .await
            .unwrap_err();
        assert!(matches!(err, DockerError::DaemonUnreachable { .. }));
        assert_eq!(engine.probe_count(), 4);
    }

    #[tokio::test]
    async fn test_list_containers_ignores_unlabeled() {
        let engine = Arc::new(FakeEngine::new());
        let docker = client(&engine);

        docker
            .run(&ContainerSpec {
                name: "unrelated".to_string(),
                image: "nginx".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        docker.run(&spec("kana_one_database", "one")).await.unwrap();
        docker.run(&spec("kana_two_database", "two")).await.unwrap();

        assert_eq!(docker.list_containers(None).await.unwrap().len(), 2);
        assert_eq!(docker.list_containers(Some("one")).await.unwrap().len(), 1);
    }
}
