use serde::Deserialize;

use crate::config::helpers::{optional_env, parse_bool_env};
use crate::error::ConfigError;

/// What kind of WordPress install a site is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteType {
    /// Plain WordPress site.
    #[default]
    Site,
    /// The working directory is a plugin under development.
    Plugin,
    /// The working directory is a theme under development.
    Theme,
}

impl SiteType {
    /// `wp-content` subdirectory the working directory is mounted into.
    pub fn content_dir(&self) -> Option<&'static str> {
        match self {
            Self::Site => None,
            Self::Plugin => Some("plugins"),
            Self::Theme => Some("themes"),
        }
    }
}

impl std::fmt::Display for SiteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Site => write!(f, "site"),
            Self::Plugin => write!(f, "plugin"),
            Self::Theme => write!(f, "theme"),
        }
    }
}

impl std::str::FromStr for SiteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "site" => Ok(Self::Site),
            "plugin" => Ok(Self::Plugin),
            "theme" => Ok(Self::Theme),
            _ => Err(format!(
                "invalid site type '{}', expected 'site', 'plugin' or 'theme'",
                s
            )),
        }
    }
}

/// Per-site options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteOptions {
    pub site_type: SiteType,
    /// PHP version selecting the `wordpress:php<version>` image.
    pub php: String,
    pub xdebug: bool,
    /// Use `<working-dir>/wordpress` instead of the managed app directory.
    pub local: bool,
    /// Plugins installed and activated after WordPress itself.
    pub plugins: Vec<String>,
}

impl Default for SiteOptions {
    fn default() -> Self {
        Self {
            site_type: SiteType::Site,
            php: "8.1".to_string(),
            xdebug: false,
            local: false,
            plugins: Vec::new(),
        }
    }
}

/// `[site]` table as written in `kana.toml` or `.kana.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteFile {
    pub php: Option<String>,
    #[serde(rename = "type")]
    pub site_type: Option<SiteType>,
    pub xdebug: Option<bool>,
    pub local: Option<bool>,
    pub plugins: Option<Vec<String>>,
}

impl SiteOptions {
    /// Layer the values present in `file` over `self`.
    pub fn merge(mut self, file: SiteFile) -> Self {
        if let Some(php) = file.php {
            self.php = php;
        }
        if let Some(site_type) = file.site_type {
            self.site_type = site_type;
        }
        if let Some(xdebug) = file.xdebug {
            self.xdebug = xdebug;
        }
        if let Some(local) = file.local {
            self.local = local;
        }
        if let Some(plugins) = file.plugins {
            self.plugins = plugins;
        }
        self
    }

    /// Apply `KANA_*` environment overrides.
    pub(crate) fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Some(php) = optional_env("KANA_PHP")? {
            self.php = php;
        }
        if let Some(site_type) = optional_env("KANA_TYPE")? {
            self.site_type = site_type
                .parse()
                .map_err(|message| ConfigError::InvalidValue {
                    key: "KANA_TYPE".to_string(),
                    message,
                })?;
        }
        self.xdebug = parse_bool_env("KANA_XDEBUG", self.xdebug)?;
        self.local = parse_bool_env("KANA_LOCAL", self.local)?;
        Ok(self)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let valid_php = self
            .php
            .split_once('.')
            .is_some_and(|(major, minor)| {
                !major.is_empty()
                    && !minor.is_empty()
                    && major.chars().all(|c| c.is_ascii_digit())
                    && minor.chars().all(|c| c.is_ascii_digit())
            });
        if !valid_php {
            return Err(ConfigError::InvalidValue {
                key: "php".to_string(),
                message: format!("expected a version like '8.1', got '{}'", self.php),
            });
        }

        if let Some(bad) = self
            .plugins
            .iter()
            .find(|p| p.is_empty() || p.chars().any(char::is_whitespace))
        {
            return Err(ConfigError::InvalidValue {
                key: "plugins".to_string(),
                message: format!("'{}' is not a plugin slug", bad),
            });
        }

        Ok(())
    }
}
