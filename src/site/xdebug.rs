//! Xdebug installation inside the running app container.

use crate::site::{Result, Site, SiteError};

macro_rules! php_ini {
    () => {
        "/usr/local/etc/php/php.ini"
    };
}

const PHP_INI: &str = php_ini!();

macro_rules! append_to_php_ini {
    ($setting:literal) => {
        concat!("echo '", $setting, "' >> ", php_ini!())
    };
}

/// Commands run in order. The first one only checks whether xdebug is
/// already there.
pub const XDEBUG_COMMANDS: [&str; 8] = [
    "pecl list | grep xdebug",
    "pecl install xdebug",
    "docker-php-ext-enable xdebug",
    append_to_php_ini!("xdebug.start_with_request=yes"),
    append_to_php_ini!("xdebug.mode=debug"),
    append_to_php_ini!("xdebug.client_host=host.docker.internal"),
    append_to_php_ini!("xdebug.discover_client_host=on"),
    append_to_php_ini!("xdebug.start_with_request=trigger"),
];

impl Site {
    /// Install and enable xdebug in the app container, restarting it after
    /// the last step.
    ///
    /// Returns whether anything changed: `false` when xdebug is disabled in
    /// the configuration, already installed, or the app container is not
    /// running.
    pub async fn install_xdebug(&self) -> Result<bool> {
        if !self.config().site.xdebug {
            return Ok(false);
        }

        let container = self.app_container();
        let (_, running) = self.docker().is_running(&container).await?;
        if !running {
            tracing::warn!("{} is not running; skipping xdebug", container);
            return Ok(false);
        }

        tracing::info!("Installing Xdebug...");

        let last = XDEBUG_COMMANDS.len() - 1;
        for (i, command) in XDEBUG_COMMANDS.iter().enumerate() {
            let result = self.docker().exec(&container, command).await?;

            if i == 0 {
                // grep exits non-zero when nothing matched.
                if result.stdout.contains("xdebug") {
                    tracing::debug!("Xdebug already present in {}", container);
                    return Ok(false);
                }
                continue;
            }

            if !result.success() {
                return Err(SiteError::CommandFailed {
                    command: command.to_string(),
                    exit_code: result.exit_code,
                    output: format!("{}{}", result.stdout, result.stderr),
                });
            }

            if i == last {
                self.docker().restart(&container).await?;
            }
        }

        tracing::info!("Xdebug enabled in {}", PHP_INI);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Config;
    use crate::docker::DockerClient;
    use crate::testing::FakeEngine;

    async fn started_site(engine: Arc<FakeEngine>, xdebug: bool) -> (tempfile::TempDir, Site) {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("demo");
        std::fs::create_dir_all(&work).unwrap();
        let mut config = Config::resolve_in(root.path().join("app"), work).unwrap();
        config.site.xdebug = xdebug;
        let site = Site::new(config, DockerClient::new(engine));
        site.start().await.unwrap();
        (root, site)
    }

    fn commands_run(engine: &FakeEngine) -> Vec<String> {
        engine
            .exec_log()
            .into_iter()
            .map(|(_, argv)| argv.last().cloned().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_commands_append_to_php_ini() {
        for command in &XDEBUG_COMMANDS[3..] {
            assert!(command.ends_with(&format!(">> {}", PHP_INI)));
        }
        assert_eq!(
            XDEBUG_COMMANDS[4],
            "echo 'xdebug.mode=debug' >> /usr/local/etc/php/php.ini"
        );
    }

    #[tokio::test]
    async fn test_disabled_is_noop() {
        let engine = Arc::new(FakeEngine::new());
        let (_root, site) = started_site(engine.clone(), false).await;

        assert!(!site.install_xdebug().await.unwrap());
        assert!(engine.exec_log().is_empty());
    }

    #[tokio::test]
    async fn test_installs_in_order_then_restarts() {
        let engine = Arc::new(FakeEngine::new());
        engine.script_exec("pecl list", 1, "", "");
        let (_root, site) = started_site(engine.clone(), true).await;
        let starts_before = engine.start_count("kana_demo_wordpress");

        assert!(site.install_xdebug().await.unwrap());

        assert_eq!(commands_run(&engine), XDEBUG_COMMANDS.to_vec());
        assert!(
            engine
                .exec_log()
                .iter()
                .all(|(name, _)| name == "kana_demo_wordpress")
        );
        assert_eq!(engine.start_count("kana_demo_wordpress"), starts_before + 1);
    }

    #[tokio::test]
    async fn test_already_installed_short_circuits() {
        let engine = Arc::new(FakeEngine::new());
        engine.script_exec("pecl list", 0, "xdebug  3.3.1  stable\n", "");
        let (_root, site) = started_site(engine.clone(), true).await;

        assert!(!site.install_xdebug().await.unwrap());
        assert_eq!(commands_run(&engine), vec![XDEBUG_COMMANDS[0].to_string()]);
    }

    #[tokio::test]
    async fn test_failure_aborts_without_restart() {
        let engine = Arc::new(FakeEngine::new());
        engine.script_exec("pecl install", 1, "", "No releases available");
        let (_root, site) = started_site(engine.clone(), true).await;
        let starts_before = engine.start_count("kana_demo_wordpress");

        let err = site.install_xdebug().await.unwrap_err();
        assert!(matches!(err, SiteError::CommandFailed { exit_code: 1, .. }));
        assert_eq!(commands_run(&engine).len(), 2);
        assert_eq!(engine.start_count("kana_demo_wordpress"), starts_before);
    }
}
