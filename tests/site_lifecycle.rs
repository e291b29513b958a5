//! Start/stop scenarios against the in-memory engine.

use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use kana::config::{Config, SiteType};
use kana::docker::DockerClient;
use kana::proxy::PROXY_NAME;
use kana::site::Site;
use kana::site::link::resolve_site;
use kana::testing::FakeEngine;

fn site_in(root: &Path, project: &str, engine: &Arc<FakeEngine>) -> Site {
    let work = root.join(project);
    std::fs::create_dir_all(&work).unwrap();
    let mut config = Config::resolve_in(root.join("app"), work).unwrap();
    resolve_site(&mut config, None).unwrap();
    Site::new(config, DockerClient::new(engine.clone()))
}

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}

#[tokio::test]
async fn start_then_stop_leaves_nothing_labeled() {
    let root = TempDir::new().unwrap();
    let engine = Arc::new(FakeEngine::new());
    let site = site_in(root.path(), "demo", &engine);

    site.start().await.unwrap();
    assert!(site.is_running().await.unwrap());
    assert_eq!(
        sorted(engine.running_names()),
        vec![
            "kana_demo_database".to_string(),
            "kana_demo_wordpress".to_string(),
            PROXY_NAME.to_string(),
        ]
    );

    site.stop().await.unwrap();

    assert!(
        site.docker()
            .list_containers(Some("demo"))
            .await
            .unwrap()
            .is_empty()
    );
    assert!(engine.running_names().is_empty());
    assert_eq!(engine.network_names(), vec!["kana".to_string()]);
}

#[tokio::test]
async fn shared_proxy_outlives_first_site() {
    let root = TempDir::new().unwrap();
    let engine = Arc::new(FakeEngine::new());
    let first = site_in(root.path(), "alpha", &engine);
    let second = site_in(root.path(), "beta", &engine);

    first.start().await.unwrap();
    second.start().await.unwrap();
    assert_eq!(engine.create_count(PROXY_NAME), 1);

    first.stop().await.unwrap();
    assert!(engine.running_names().contains(&PROXY_NAME.to_string()));
    assert!(second.is_running().await.unwrap());

    second.stop().await.unwrap();
    assert!(!engine.running_names().contains(&PROXY_NAME.to_string()));
    assert!(engine.running_names().is_empty());
}

#[tokio::test]
async fn plugin_site_installs_and_lists_plugins() {
    let root = TempDir::new().unwrap();
    let engine = Arc::new(FakeEngine::new());
    engine.script_command(
        "plugin list --format=json",
        0,
        r#"[{"name":"my-plugin","status":"active","update":"none","version":"0.1.0"},
           {"name":"hello","status":"inactive","update":"none","version":"1.7.2"},
           {"name":"query-monitor","status":"active","update":"none","version":"3.12"}]"#,
    );

    let work = root.path().join("My Plugin");
    std::fs::create_dir_all(&work).unwrap();
    let mut config = Config::resolve_in(root.path().join("app"), work.clone()).unwrap();
    resolve_site(&mut config, None).unwrap();
    config.site.site_type = SiteType::Plugin;
    config.site.plugins = vec!["query-monitor".to_string()];
    let site = Site::new(config, DockerClient::new(engine.clone()));

    site.start().await.unwrap();
    site.install().await.unwrap();
    site.install_default_plugins().await.unwrap();

    let app = engine.spec_of("kana_my-plugin_wordpress").unwrap();
    assert!(
        app.mounts
            .iter()
            .any(|m| m.source == work && m.target == "/var/www/html/wp-content/plugins/my-plugin")
    );

    assert_eq!(
        site.get_installed_plugins().await.unwrap(),
        vec!["query-monitor".to_string()]
    );
    assert_eq!(engine.create_count("kana_my-plugin_wordpress_cli"), 3);
    assert!(
        !engine
            .running_names()
            .iter()
            .any(|name| name.ends_with("_cli"))
    );
}

#[tokio::test]
async fn named_site_resolves_its_own_directory() {
    let root = TempDir::new().unwrap();
    let engine = Arc::new(FakeEngine::new());
    let work = root.path().join("anywhere");
    std::fs::create_dir_all(&work).unwrap();

    let mut config = Config::resolve_in(root.path().join("app"), work).unwrap();
    resolve_site(&mut config, Some("Client Site")).unwrap();
    let site = Site::new(config, DockerClient::new(engine.clone()));

    assert_eq!(site.get_url(false), "https://client-site.sites.kana.li/");
    site.start().await.unwrap();

    let app = engine.spec_of("kana_client-site_wordpress").unwrap();
    assert_eq!(
        app.mounts[0].source,
        root.path().join("app/sites/client-site/app")
    );
    assert!(
        root.path()
            .join("app/sites/client-site/link.json")
            .is_file()
    );
}
