//! Locations of the development TLS material.
//!
//! Certificates are produced by an external provisioner; kana only needs to
//! know where they live so the proxy can mount them and the readiness check
//! can trust the root.

use std::path::{Path, PathBuf};

/// Root CA the site certificate is signed by.
pub const ROOT_CERT: &str = "kana.root.pem";

/// Wildcard certificate served by the proxy.
pub const SITE_CERT: &str = "kana.site.pem";

/// Key for [`SITE_CERT`].
pub const SITE_KEY: &str = "kana.site.key";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertPaths {
    pub directory: PathBuf,
}

impl CertPaths {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn root_cert(&self) -> PathBuf {
        self.directory.join(ROOT_CERT)
    }

    pub fn site_cert(&self) -> PathBuf {
        self.directory.join(SITE_CERT)
    }

    pub fn site_key(&self) -> PathBuf {
        self.directory.join(SITE_KEY)
    }

    /// Create the certificate directory if it does not exist yet.
    pub fn ensure_directory(&self) -> std::io::Result<&Path> {
        std::fs::create_dir_all(&self.directory)?;
        Ok(&self.directory)
    }

    /// Whether the root and site certificates are all in place.
    pub fn is_provisioned(&self) -> bool {
        [self.root_cert(), self.site_cert(), self.site_key()]
            .iter()
            .all(|p| p.is_file())
    }
}
