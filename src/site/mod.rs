//! Site lifecycle.
//!
//! A [`Site`] is built once per command from the resolved [`Config`] and
//! owns everything that command needs: the site identity, the options and
//! the engine client.
//!
//! ```text
//! start:  network → directories → proxy → database → app
//! stop:   database → app → proxy (only when no site containers remain)
//! ```

pub mod containers;
pub mod error;
pub mod identity;
pub mod link;
pub mod lock;
pub mod verify;
mod wordpress;
mod xdebug;

use std::path::Path;

use crate::config::{Config, SiteOptions, SiteType};
use crate::docker::{DockerClient, MountPoint};
use crate::proxy::SharedProxy;
use crate::site::containers::{
    APP_ROLE, APP_ROOT, DATABASE_ROLE, NETWORK, Orchestrator, app_directory, app_mounts, app_spec,
    database_spec,
};
use crate::site::lock::SiteLock;
use crate::site::verify::{HttpProbe, Probe, ReadinessVerifier};

pub use error::{Result, SiteError};
pub use identity::SiteIdentity;
pub use wordpress::{PluginInfo, filter_plugins};
pub use xdebug::XDEBUG_COMMANDS;

/// Options a site was actually started with, read back from the app
/// container's mounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningConfig {
    pub site_type: SiteType,
    pub local: bool,
    pub xdebug: bool,
}

impl RunningConfig {
    /// Recover the running options from the app container's mounts.
    ///
    /// Falls back to `configured` when there are no mounts, which is what a
    /// stopped site reports. Xdebug leaves no trace in the mounts, so it is
    /// always taken from `configured`.
    pub fn from_mounts(mounts: &[MountPoint], local_app_dir: &Path, configured: &SiteOptions) -> Self {
        if mounts.is_empty() {
            return Self {
                site_type: configured.site_type,
                local: configured.local,
                xdebug: configured.xdebug,
            };
        }

        let site_type = mounts
            .iter()
            .find_map(|m| {
                let content = m.destination.strip_prefix(APP_ROOT)?.strip_prefix("/wp-content/")?;
                if content.starts_with("plugins/") {
                    Some(SiteType::Plugin)
                } else if content.starts_with("themes/") {
                    Some(SiteType::Theme)
                } else {
                    None
                }
            })
            .unwrap_or(SiteType::Site);

        let local = mounts
            .iter()
            .any(|m| m.destination == APP_ROOT && Path::new(&m.source) == local_app_dir);

        Self {
            site_type,
            local,
            xdebug: configured.xdebug,
        }
    }
}

/// One site, for the duration of one command.
pub struct Site {
    config: Config,
    identity: SiteIdentity,
    docker: DockerClient,
}

impl Site {
    pub fn new(config: Config, docker: DockerClient) -> Self {
        let identity = SiteIdentity::new(
            &config.site_name,
            &config.site_directory,
            &config.app_domain,
        );
        Self {
            config,
            identity,
            docker,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn identity(&self) -> &SiteIdentity {
        &self.identity
    }

    pub fn docker(&self) -> &DockerClient {
        &self.docker
    }

    fn lock(&self) -> Result<SiteLock> {
        SiteLock::acquire(self.identity.name(), self.identity.directory())
    }

    fn app_container(&self) -> String {
        self.identity.container_name(APP_ROLE)
    }

    /// Bring up the site's containers. Does not wait for the site to answer.
    pub async fn start(&self) -> Result<()> {
        let _lock = self.lock()?;
        let options = &self.config.site;

        self.docker.ensure_network(NETWORK).await?;

        let app_dir = app_directory(
            self.identity.directory(),
            &self.config.working_directory,
            options.local,
        );
        std::fs::create_dir_all(&app_dir)?;
        std::fs::create_dir_all(self.identity.directory().join("database"))?;

        if options.local {
            // The container writes its own wp-config.php on first boot.
            let stale = app_dir.join("wp-config.php");
            if stale.is_file() {
                std::fs::remove_file(&stale)?;
                tracing::debug!("Removed {}", stale.display());
            }
        }

        SharedProxy::new(&self.docker, &self.config)
            .ensure_running()
            .await?;

        let mounts = app_mounts(
            &self.identity,
            &app_dir,
            options.site_type,
            &self.config.working_directory,
        );
        let orchestrator = Orchestrator::new(&self.docker);
        for spec in [
            database_spec(&self.identity),
            app_spec(&self.identity, &options.php, mounts),
        ] {
            orchestrator.launch(&spec).await?;
        }

        tracing::info!("Site {} started", self.identity.name());
        Ok(())
    }

    /// Stop and remove the site's containers, then the proxy if this was the
    /// last site using it.
    pub async fn stop(&self) -> Result<()> {
        let _lock = self.lock()?;

        for role in [DATABASE_ROLE, APP_ROLE] {
            self.docker
                .stop(&self.identity.container_name(role))
                .await?;
        }

        SharedProxy::new(&self.docker, &self.config)
            .maybe_stop()
            .await?;

        tracing::info!("Site {} stopped", self.identity.name());
        Ok(())
    }

    /// Whether any container belonging to this site exists.
    pub async fn is_running(&self) -> Result<bool> {
        let containers = self.docker.list_containers(Some(self.identity.name())).await?;
        Ok(!containers.is_empty())
    }

    pub fn get_url(&self, insecure: bool) -> &str {
        if insecure {
            self.identity.url()
        } else {
            self.identity.secure_url()
        }
    }

    /// Options the site is running with, or the configured ones when it is
    /// not running.
    pub async fn running_config(&self) -> Result<RunningConfig> {
        let mounts = self.docker.container_mounts(&self.app_container()).await?;
        let local_app_dir = app_directory(
            self.identity.directory(),
            &self.config.working_directory,
            true,
        );
        Ok(RunningConfig::from_mounts(
            &mounts,
            &local_app_dir,
            &self.config.site,
        ))
    }

    /// Poll the secure URL until it answers 200, trusting the development
    /// root certificate.
    pub async fn verify(&self) -> Result<bool> {
        let probe = HttpProbe::new(&self.config.certs.root_cert())?;
        self.verify_with(&probe).await
    }

    /// [`verify`](Self::verify) with a caller-supplied probe.
    pub async fn verify_with(&self, probe: &dyn Probe) -> Result<bool> {
        let mut verifier = ReadinessVerifier::new(probe);
        verifier.verify(self.get_url(false)).await?;
        Ok(true)
    }

    /// Verify the site, then open it in the default browser.
    pub async fn open(&self) -> Result<()> {
        self.verify().await?;
        self.open_verified()
    }

    /// Open the secure URL in the default browser without checking that the
    /// site answers. For callers that have just verified it.
    pub fn open_verified(&self) -> Result<()> {
        self.open_verified_with(|url| open::that(url))
    }

    fn open_verified_with(&self, launch: impl FnOnce(&str) -> std::io::Result<()>) -> Result<()> {
        let url = self.get_url(false);
        launch(url).map_err(|e| SiteError::Browser {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
