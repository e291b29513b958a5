//! Configuration for kana.
//!
//! Resolved once per command, in increasing priority:
//!
//! 1. Built-in defaults
//! 2. `<app-dir>/kana.toml` (global)
//! 3. `<working-dir>/.kana.toml` (`[site]` table only)
//! 4. `KANA_*` environment variables (a `.env` in the working directory is loaded first)
//!
//! Command-line flags are applied on top by the caller. The result is a
//! plain struct; nothing downstream looks values up by key.

mod helpers;
pub mod site;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::certs::CertPaths;
use crate::config::helpers::{optional_env, parse_optional_env};
use crate::docker::DEFAULT_EXEC_TIMEOUT;
use crate::error::ConfigError;
use crate::site::identity::sanitize_site_name;

pub use site::{SiteFile, SiteOptions, SiteType};

/// Suffix every site hostname is placed under.
pub const DEFAULT_APP_DOMAIN: &str = "sites.kana.li";

/// Global config file name inside the app directory.
pub const CONFIG_FILE: &str = "kana.toml";

/// Per-project config file name inside the working directory.
pub const SITE_CONFIG_FILE: &str = ".kana.toml";

/// WordPress admin account created on install.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub username: String,
    pub password: SecretString,
    pub email: String,
}

impl AdminConfig {
    /// Get the admin password (exposes the secret).
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: SecretString::from("password".to_string()),
            email: "admin@mykanasite.localhost".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AdminFile {
    username: Option<String>,
    password: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GlobalFile {
    app_domain: Option<String>,
    admin: AdminFile,
    site: SiteFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ProjectFile {
    site: SiteFile,
}

/// Resolved configuration for one command.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of everything kana stores (sites, certificates, proxy config).
    pub app_directory: PathBuf,
    /// Directory the command runs against; replaced by the link file target
    /// for named sites.
    pub working_directory: PathBuf,
    pub app_domain: String,
    /// Sanitized site name.
    pub site_name: String,
    /// `<app-dir>/sites/<site-name>`.
    pub site_directory: PathBuf,
    pub admin: AdminConfig,
    pub site: SiteOptions,
    pub certs: CertPaths,
    /// Bound on waiting for output of a command run in a container.
    pub exec_timeout: Duration,
}

impl Config {
    /// Resolve from the process environment and current directory.
    pub fn resolve() -> Result<Self, ConfigError> {
        let working_directory = std::env::current_dir()?;
        let _ = dotenvy::from_path(working_directory.join(".env"));

        let app_directory = match optional_env("KANA_HOME")? {
            Some(dir) => PathBuf::from(dir),
            None => default_app_directory()?,
        };

        Self::resolve_in(app_directory, working_directory)
    }

    /// Resolve with explicit directories.
    pub fn resolve_in(
        app_directory: PathBuf,
        working_directory: PathBuf,
    ) -> Result<Self, ConfigError> {
        let global: GlobalFile = read_toml(&app_directory.join(CONFIG_FILE))?.unwrap_or_default();
        let project: ProjectFile =
            read_toml(&working_directory.join(SITE_CONFIG_FILE))?.unwrap_or_default();

        let defaults = AdminConfig::default();
        let admin = AdminConfig {
            username: optional_env("KANA_ADMIN_USERNAME")?
                .or(global.admin.username)
                .unwrap_or(defaults.username),
            password: optional_env("KANA_ADMIN_PASSWORD")?
                .or(global.admin.password)
                .map(SecretString::from)
                .unwrap_or(defaults.password),
            email: optional_env("KANA_ADMIN_EMAIL")?
                .or(global.admin.email)
                .unwrap_or(defaults.email),
        };

        let app_domain = optional_env("KANA_APP_DOMAIN")?
            .or(global.app_domain)
            .unwrap_or_else(|| DEFAULT_APP_DOMAIN.to_string());

        let site = SiteOptions::default()
            .merge(global.site)
            .merge(project.site)
            .apply_env()?;
        site.validate()?;

        let base_name = working_directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let site_name = sanitize_site_name(&base_name);
        if site_name.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "site name".to_string(),
                message: format!(
                    "cannot derive a site name from '{}'",
                    working_directory.display()
                ),
            });
        }

        let site_directory = app_directory.join("sites").join(&site_name);
        let certs = CertPaths::new(app_directory.join("certs"));
        let exec_timeout = Duration::from_secs(parse_optional_env(
            "KANA_EXEC_TIMEOUT",
            DEFAULT_EXEC_TIMEOUT.as_secs(),
        )?);

        Ok(Self {
            app_directory,
            working_directory,
            app_domain,
            site_name,
            site_directory,
            admin,
            site,
            certs,
            exec_timeout,
        })
    }
}

/// Default app directory (`~/.config/kana`).
pub fn default_app_directory() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".config").join("kana"))
        .ok_or(ConfigError::NoHomeDirectory)
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    toml::from_str(&contents)
        .map(Some)
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}
