//! The per-site link file and the `--name` flag.
//!
//! Every site directory holds a `link.json` recording which directory the
//! site was created from. Sites started from a project directory link back
//! to it; named sites link to their own site directory. Later commands read
//! the link to find the directory to mount.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::site::error::{Result, SiteError};
use crate::site::identity::sanitize_site_name;

/// File name of the link file inside a site directory.
pub const LINK_FILE: &str = "link.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLink {
    pub link: PathBuf,
}

impl SiteLink {
    /// Read `<site_dir>/link.json`, writing `default` there first if the
    /// file does not exist yet.
    pub fn load_or_create(site_dir: &Path, default: &Path) -> Result<Self> {
        let path = site_dir.join(LINK_FILE);

        match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| SiteError::Link {
                path: path.clone(),
                reason: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                std::fs::create_dir_all(site_dir)?;
                let link = Self {
                    link: default.to_path_buf(),
                };
                let json = serde_json::to_string_pretty(&link).map_err(std::io::Error::other)?;
                std::fs::write(&path, json)?;
                tracing::debug!("Linked site directory {} to {}", site_dir.display(), default.display());
                Ok(link)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Point `config` at the right site, honoring an optional `--name`.
///
/// With a name, the site name and directory are re-derived together and the
/// link defaults to the site directory itself. Without one, the link
/// defaults to the working directory. Either way the working directory
/// becomes the link target.
pub fn resolve_site(config: &mut Config, name: Option<&str>) -> Result<()> {
    let mut link_default = config.working_directory.clone();

    if let Some(name) = name {
        let sanitized = sanitize_site_name(name);
        if sanitized.is_empty() {
            return Err(SiteError::InvalidFlags(format!(
                "'{}' is not a usable site name",
                name
            )));
        }
        config.site_directory = config.app_directory.join("sites").join(&sanitized);
        config.site_name = sanitized;
        link_default = config.site_directory.clone();
    }

    let link = SiteLink::load_or_create(&config.site_directory, &link_default)?;
    config.working_directory = link.link;
    Ok(())
}
