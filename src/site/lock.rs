//! Advisory per-site lock held across mutating operations.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::FileExt;

use crate::site::error::{Result, SiteError};

/// Lock file name inside a site directory.
pub const LOCK_FILE: &str = ".kana.lock";

/// Exclusive lock on a site directory, released on drop.
#[derive(Debug)]
pub struct SiteLock {
    file: File,
    path: PathBuf,
}

impl SiteLock {
    /// Take the lock for `site` without blocking.
    pub fn acquire(site: &str, site_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(site_dir)?;
        let path = site_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        FileExt::try_lock_exclusive(&file).map_err(|_| SiteError::Busy {
            name: site.to_string(),
            path: path.clone(),
        })?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SiteLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release {}: {}", self.path.display(), e);
        }
    }
}
