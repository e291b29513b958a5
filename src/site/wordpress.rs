//! WordPress setup through one-shot wp-cli containers.

use serde::Deserialize;

use crate::site::containers::{Orchestrator, app_directory, app_mounts, cli_spec};
use crate::site::{Result, Site, SiteError};

/// Plugins every WordPress install ships with; never reported as installed.
const BUNDLED_PLUGINS: [&str; 2] = ["hello", "akismet"];

/// One entry of `wp plugin list --format=json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub update: String,
    #[serde(default)]
    pub version: String,
}

/// Names of the plugins worth reporting for `site`, in listed order.
///
/// Drop-ins, the bundled plugins and the site's own plugin (when the site is
/// a plugin under development) are left out.
pub fn filter_plugins(site: &str, plugins: Vec<PluginInfo>) -> Vec<String> {
    plugins
        .into_iter()
        .filter(|p| p.status != "dropin")
        .filter(|p| p.name != site && !BUNDLED_PLUGINS.contains(&p.name.as_str()))
        .map(|p| p.name)
        .collect()
}

impl Site {
    /// Run `wp <args>` against the site and return its output.
    ///
    /// Mounts follow the running app container so the command sees the same
    /// tree the site serves. A non-zero exit is an error.
    pub async fn run_wp_cli(&self, args: &[String]) -> Result<String> {
        let running = self.running_config().await?;
        let app_dir = app_directory(
            self.identity().directory(),
            &self.config().working_directory,
            running.local,
        );
        std::fs::create_dir_all(&app_dir)?;

        let mounts = app_mounts(
            self.identity(),
            &app_dir,
            running.site_type,
            &self.config().working_directory,
        );
        let spec = cli_spec(self.identity(), &self.config().site.php, mounts, args);

        let (exit_code, output) = Orchestrator::new(self.docker()).run_once(&spec).await?;
        if exit_code != 0 {
            return Err(SiteError::CommandFailed {
                command: format!("wp {}", args.join(" ")),
                exit_code,
                output,
            });
        }

        Ok(output)
    }

    /// Run `wp core install` with the configured admin account.
    pub async fn install(&self) -> Result<()> {
        tracing::info!("Finishing WordPress setup...");

        let config = self.config();
        let args = vec![
            "core".to_string(),
            "install".to_string(),
            format!("--url={}", self.get_url(false)),
            format!(
                "--title=Kana Development {}: {}",
                config.site.site_type,
                self.identity().name()
            ),
            format!("--admin_user={}", config.admin.username),
            format!("--admin_password={}", config.admin.password()),
            format!("--admin_email={}", config.admin.email),
        ];

        self.run_wp_cli(&args).await?;
        Ok(())
    }

    /// Install and activate each configured plugin, stopping at the first
    /// failure.
    pub async fn install_default_plugins(&self) -> Result<()> {
        for plugin in &self.config().site.plugins {
            tracing::info!("Installing plugin {}", plugin);
            let args = ["plugin", "install", "--activate", plugin.as_str()].map(String::from);
            self.run_wp_cli(&args).await?;
        }
        Ok(())
    }

    /// Plugins installed on the site, minus drop-ins and bundled plugins.
    pub async fn get_installed_plugins(&self) -> Result<Vec<String>> {
        let args = ["plugin", "list", "--format=json"].map(String::from);
        let output = self.run_wp_cli(&args).await?;

        let plugins: Vec<PluginInfo> =
            serde_json::from_str(output.trim()).map_err(|e| SiteError::UnexpectedOutput {
                command: format!("wp {}", args.join(" ")),
                reason: e.to_string(),
            })?;

        Ok(filter_plugins(self.identity().name(), plugins))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::Config;
    use crate::docker::DockerClient;
    use crate::testing::FakeEngine;

    fn plugin(name: &str, status: &str) -> PluginInfo {
        PluginInfo {
            name: name.to_string(),
            status: status.to_string(),
            update: "none".to_string(),
            version: "1.0".to_string(),
        }
    }

    fn site(engine: Arc<FakeEngine>) -> (tempfile::TempDir, Site) {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("demo");
        std::fs::create_dir_all(&work).unwrap();
        let config = Config::resolve_in(root.path().join("app"), work).unwrap();
        (root, Site::new(config, DockerClient::new(engine)))
    }

    #[test]
    fn test_filter_plugins_keeps_order() {
        let plugins = vec![
            plugin("woocommerce", "active"),
            plugin("akismet", "inactive"),
            plugin("advanced-cache.php", "dropin"),
            plugin("demo", "active"),
            plugin("hello", "inactive"),
            plugin("jetpack", "inactive"),
        ];

        assert_eq!(
            filter_plugins("demo", plugins),
            vec!["woocommerce".to_string(), "jetpack".to_string()]
        );
    }

    #[tokio::test]
    async fn test_get_installed_plugins_parses_output() {
        let engine = Arc::new(FakeEngine::new());
        engine.script_command(
            "plugin list --format=json",
            0,
            r#"[{"name":"akismet","status":"inactive","update":"none","version":"5.0"},
               {"name":"query-monitor","status":"active","update":"none","version":"3.12"}]"#,
        );
        let (_root, site) = site(engine.clone());

        let plugins = site.get_installed_plugins().await.unwrap();
        assert_eq!(plugins, vec!["query-monitor".to_string()]);
        assert!(engine.running_names().is_empty());
    }

    #[tokio::test]
    async fn test_garbage_plugin_list_is_an_error() {
        let engine = Arc::new(FakeEngine::new());
        engine.script_command("plugin list", 0, "Error: This does not seem to be a WordPress install.");
        let (_root, site) = site(engine);

        assert!(matches!(
            site.get_installed_plugins().await,
            Err(SiteError::UnexpectedOutput { .. })
        ));
    }

    #[tokio::test]
    async fn test_install_uses_admin_account() {
        let engine = Arc::new(FakeEngine::new());
        engine.script_command("core install", 0, "Success: WordPress installed successfully.");
        let (_root, site) = site(engine.clone());

        site.install().await.unwrap();

        assert_eq!(engine.create_count("kana_demo_wordpress_cli"), 1);
        assert_eq!(engine.pulls(), vec!["wordpress:cli-php8.1"]);
    }

    #[tokio::test]
    async fn test_install_failure_is_fatal() {
        let engine = Arc::new(FakeEngine::new());
        engine.script_command("core install", 1, "Error: Error establishing a database connection.");
        let (_root, site) = site(engine);

        match site.install().await {
            Err(SiteError::CommandFailed { exit_code, output, .. }) => {
                assert_eq!(exit_code, 1);
                assert!(output.contains("database connection"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_default_plugins_stop_at_first_failure() {
        let engine = Arc::new(FakeEngine::new());
        engine.script_command("--activate broken", 1, "Error: Plugin not found.");
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("demo");
        std::fs::create_dir_all(&work).unwrap();
        let mut config = Config::resolve_in(root.path().join("app"), work).unwrap();
        config.site.plugins = vec!["jetpack".into(), "broken".into(), "akismet".into()];
        let site = Site::new(config, DockerClient::new(engine.clone()));

        assert!(site.install_default_plugins().await.is_err());
        assert_eq!(engine.create_count("kana_demo_wordpress_cli"), 2);
    }
}
