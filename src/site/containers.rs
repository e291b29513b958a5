//! Container specifications for each site role.
//!
//! Specs are built fresh for every command and handed to the
//! [`Orchestrator`], which makes sure the network and image exist before
//! running them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::SiteType;
use crate::docker::{BindMount, ContainerSpec, DockerClient, Result, SITE_LABEL};
use crate::site::identity::SiteIdentity;

/// Shared bridge network every kana container joins.
pub const NETWORK: &str = "kana";

/// Document root inside the app and CLI containers.
pub const APP_ROOT: &str = "/var/www/html";

/// Role names used in container names.
pub const DATABASE_ROLE: &str = "database";
pub const APP_ROLE: &str = "wordpress";
pub const CLI_ROLE: &str = "wordpress_cli";

const DATABASE_IMAGE: &str = "mariadb:latest";
const DATABASE_NAME: &str = "wordpress";
const DATABASE_USER: &str = "wordpress";
const DATABASE_PASSWORD: &str = "wordpress";
const DATABASE_ROOT_PASSWORD: &str = "password";

/// Host directory served as the document root.
///
/// In local mode this is `<working-dir>/wordpress`, otherwise
/// `<site-dir>/app`.
pub fn app_directory(site_directory: &Path, working_directory: &Path, local: bool) -> PathBuf {
    if local {
        working_directory.join("wordpress")
    } else {
        site_directory.join("app")
    }
}

/// Mounts shared by the app and CLI containers.
pub fn app_mounts(
    identity: &SiteIdentity,
    app_dir: &Path,
    site_type: SiteType,
    working_directory: &Path,
) -> Vec<BindMount> {
    let mut mounts = vec![BindMount::new(app_dir, APP_ROOT)];

    if let Some(content_dir) = site_type.content_dir() {
        mounts.push(BindMount::new(
            working_directory,
            format!("{}/wp-content/{}/{}", APP_ROOT, content_dir, identity.name()),
        ));
    }

    mounts
}

fn site_labels(identity: &SiteIdentity) -> HashMap<String, String> {
    HashMap::from([(SITE_LABEL.to_string(), identity.name().to_string())])
}

fn wordpress_db_env(identity: &SiteIdentity) -> Vec<(String, String)> {
    vec![
        (
            "WORDPRESS_DB_HOST".to_string(),
            identity.container_name(DATABASE_ROLE),
        ),
        ("WORDPRESS_DB_USER".to_string(), DATABASE_USER.to_string()),
        (
            "WORDPRESS_DB_PASSWORD".to_string(),
            DATABASE_PASSWORD.to_string(),
        ),
        ("WORDPRESS_DB_NAME".to_string(), DATABASE_NAME.to_string()),
    ]
}

/// MariaDB container holding the site's database.
pub fn database_spec(identity: &SiteIdentity) -> ContainerSpec {
    ContainerSpec {
        name: identity.container_name(DATABASE_ROLE),
        image: DATABASE_IMAGE.to_string(),
        ports: Vec::new(),
        network: NETWORK.to_string(),
        mounts: vec![BindMount::new(
            identity.directory().join("database"),
            "/var/lib/mysql",
        )],
        command: Vec::new(),
        env: vec![
            (
                "MARIADB_ROOT_PASSWORD".to_string(),
                DATABASE_ROOT_PASSWORD.to_string(),
            ),
            ("MARIADB_DATABASE".to_string(), DATABASE_NAME.to_string()),
            ("MARIADB_USER".to_string(), DATABASE_USER.to_string()),
            ("MARIADB_PASSWORD".to_string(), DATABASE_PASSWORD.to_string()),
        ],
        labels: site_labels(identity),
    }
}

/// WordPress container, routed by the proxy on both entrypoints.
pub fn app_spec(identity: &SiteIdentity, php: &str, mounts: Vec<BindMount>) -> ContainerSpec {
    let site = identity.name();
    let rule = format!("Host(`{}`)", identity.domain());

    let mut labels = site_labels(identity);
    labels.extend([
        ("traefik.enable".to_string(), "true".to_string()),
        (
            format!("traefik.http.routers.wordpress-{}-http.entrypoints", site),
            "web".to_string(),
        ),
        (
            format!("traefik.http.routers.wordpress-{}-http.rule", site),
            rule.clone(),
        ),
        (
            format!("traefik.http.routers.wordpress-{}.entrypoints", site),
            "websecure".to_string(),
        ),
        (format!("traefik.http.routers.wordpress-{}.rule", site), rule),
        (
            format!("traefik.http.routers.wordpress-{}.tls", site),
            "true".to_string(),
        ),
    ]);

    ContainerSpec {
        name: identity.container_name(APP_ROLE),
        image: format!("wordpress:php{}", php),
        ports: Vec::new(),
        network: NETWORK.to_string(),
        mounts,
        command: Vec::new(),
        env: wordpress_db_env(identity),
        labels,
    }
}

/// One-shot wp-cli container running `wp --path=/var/www/html <args>`.
pub fn cli_spec(
    identity: &SiteIdentity,
    php: &str,
    mounts: Vec<BindMount>,
    args: &[String],
) -> ContainerSpec {
    let mut command = vec!["wp".to_string(), format!("--path={}", APP_ROOT)];
    command.extend(args.iter().cloned());

    ContainerSpec {
        name: identity.container_name(CLI_ROLE),
        image: format!("wordpress:cli-php{}", php),
        ports: Vec::new(),
        network: NETWORK.to_string(),
        mounts,
        command,
        env: wordpress_db_env(identity),
        labels: site_labels(identity),
    }
}

/// Drives specs through the engine: network first, then image, then run.
pub struct Orchestrator<'a> {
    docker: &'a DockerClient,
}

impl<'a> Orchestrator<'a> {
    pub fn new(docker: &'a DockerClient) -> Self {
        Self { docker }
    }

    async fn prepare(&self, spec: &ContainerSpec) -> Result<()> {
        if !spec.network.is_empty() {
            self.docker.ensure_network(&spec.network).await?;
        }
        self.docker.ensure_image(&spec.image).await
    }

    /// Start a long-running container, returning its id.
    pub async fn launch(&self, spec: &ContainerSpec) -> Result<String> {
        self.prepare(spec).await?;
        self.docker.run(spec).await
    }

    /// Run a one-shot container to completion and return its exit code and
    /// output. The container is removed afterwards.
    pub async fn run_once(&self, spec: &ContainerSpec) -> Result<(i64, String)> {
        self.prepare(spec).await?;
        self.docker.run_and_clean(spec).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::FakeEngine;

    fn identity() -> SiteIdentity {
        SiteIdentity::new("demo", Path::new("/kana/sites/demo"), "sites.kana.li")
    }

    #[test]
    fn test_database_spec() {
        let spec = database_spec(&identity());

        assert_eq!(spec.name, "kana_demo_database");
        assert_eq!(spec.image, "mariadb:latest");
        assert!(spec.ports.is_empty());
        assert_eq!(
            spec.mounts,
            vec![BindMount::new("/kana/sites/demo/database", "/var/lib/mysql")]
        );
        assert!(
            spec.env
                .contains(&("MARIADB_DATABASE".to_string(), "wordpress".to_string()))
        );
        assert_eq!(spec.site(), Some("demo"));
        assert!(!spec.labels.contains_key("traefik.enable"));
    }

    #[test]
    fn test_app_spec_routes_both_entrypoints() {
        let id = identity();
        let mounts = app_mounts(
            &id,
            Path::new("/kana/sites/demo/app"),
            SiteType::Site,
            Path::new("/work"),
        );
        let spec = app_spec(&id, "8.2", mounts);

        assert_eq!(spec.name, "kana_demo_wordpress");
        assert_eq!(spec.image, "wordpress:php8.2");
        assert_eq!(spec.labels["traefik.enable"], "true");
        assert_eq!(spec.labels["traefik.http.routers.wordpress-demo-http.entrypoints"], "web");
        assert_eq!(spec.labels["traefik.http.routers.wordpress-demo.entrypoints"], "websecure");
        assert_eq!(
            spec.labels["traefik.http.routers.wordpress-demo.rule"],
            "Host(`demo.sites.kana.li`)"
        );
        assert_eq!(spec.labels["traefik.http.routers.wordpress-demo.tls"], "true");
        assert_eq!(spec.labels[SITE_LABEL], "demo");
        assert!(spec.env.contains(&(
            "WORDPRESS_DB_HOST".to_string(),
            "kana_demo_database".to_string()
        )));
    }

    #[test]
    fn test_plugin_mounts_working_directory() {
        let id = identity();
        let mounts = app_mounts(&id, Path::new("/work/wordpress"), SiteType::Plugin, Path::new("/work"));

        assert_eq!(
            mounts,
            vec![
                BindMount::new("/work/wordpress", "/var/www/html"),
                BindMount::new("/work", "/var/www/html/wp-content/plugins/demo"),
            ]
        );

        let theme = app_mounts(&id, Path::new("/app"), SiteType::Theme, Path::new("/work"));
        assert_eq!(theme[1].target, "/var/www/html/wp-content/themes/demo");
    }

    #[test]
    fn test_app_directory() {
        let site_dir = Path::new("/kana/sites/demo");
        let work = Path::new("/work");
        assert_eq!(app_directory(site_dir, work, false), PathBuf::from("/kana/sites/demo/app"));
        assert_eq!(app_directory(site_dir, work, true), PathBuf::from("/work/wordpress"));
    }

    #[test]
    fn test_cli_spec_command() {
        let spec = cli_spec(
            &identity(),
            "8.1",
            Vec::new(),
            &["plugin".to_string(), "list".to_string()],
        );

        assert_eq!(spec.name, "kana_demo_wordpress_cli");
        assert_eq!(spec.image, "wordpress:cli-php8.1");
        assert_eq!(spec.command, vec!["wp", "--path=/var/www/html", "plugin", "list"]);
        assert_eq!(spec.site(), Some("demo"));
    }

    #[tokio::test]
    async fn test_launch_prepares_network_and_image() {
        let engine = Arc::new(FakeEngine::new());
        let docker = DockerClient::new(engine.clone());
        let orchestrator = Orchestrator::new(&docker);

        let spec = database_spec(&identity());
        orchestrator.launch(&spec).await.unwrap();
        orchestrator.launch(&spec).await.unwrap();

        assert_eq!(engine.network_names(), vec![NETWORK]);
        assert_eq!(engine.pulls(), vec!["mariadb:latest"]);
        assert_eq!(engine.create_count("kana_demo_database"), 1);
    }

    #[tokio::test]
    async fn test_run_once_leaves_nothing_behind() {
        let engine = Arc::new(FakeEngine::new());
        engine.script_command("option get", 0, "Kana");
        let docker = DockerClient::new(engine.clone());

        let spec = cli_spec(
            &identity(),
            "8.1",
            Vec::new(),
            &["option".to_string(), "get".to_string(), "blogname".to_string()],
        );
        let (code, output) = Orchestrator::new(&docker).run_once(&spec).await.unwrap();

        assert_eq!(code, 0);
        assert_eq!(output, "Kana");
        assert!(docker.list_containers(Some("demo")).await.unwrap().is_empty());
    }
}
