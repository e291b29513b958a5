//! Site naming and the values derived from it.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

static INVALID_NAME_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Lowercase `name` and collapse every run of characters outside `[a-z0-9]`
/// into a single `-`, trimming dashes at either end.
pub fn sanitize_site_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    INVALID_NAME_CHARS
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Name-derived facts about a site. Built once per command; a rename means
/// building a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteIdentity {
    name: String,
    directory: PathBuf,
    domain: String,
    url: String,
    secure_url: String,
}

impl SiteIdentity {
    /// Derive the identity of `name` (already sanitized) under `app_domain`.
    pub fn new(name: &str, directory: &Path, app_domain: &str) -> Self {
        let domain = format!("{}.{}", name, app_domain);
        Self {
            name: name.to_string(),
            directory: directory.to_path_buf(),
            url: format!("http://{}/", domain),
            secure_url: format!("https://{}/", domain),
            domain,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<app-dir>/sites/<name>`.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// `<name>.<app-domain>`.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn secure_url(&self) -> &str {
        &self.secure_url
    }

    /// Name of the container playing `role` for this site.
    pub fn container_name(&self, role: &str) -> String {
        format!("kana_{}_{}", self.name, role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_site_name() {
        assert_eq!(sanitize_site_name("My Plugin"), "my-plugin");
        assert_eq!(sanitize_site_name("__kana.theme__"), "kana-theme");
        assert_eq!(sanitize_site_name("already-fine-42"), "already-fine-42");
        assert_eq!(sanitize_site_name("Ünïcode Site"), "n-code-site");
        assert_eq!(sanitize_site_name("***"), "");
    }

    #[test]
    fn test_identity_fields() {
        let identity = SiteIdentity::new(
            "demo",
            Path::new("/home/dev/.config/kana/sites/demo"),
            "sites.kana.li",
        );

        assert_eq!(identity.domain(), "demo.sites.kana.li");
        assert_eq!(identity.url(), "http://demo.sites.kana.li/");
        assert_eq!(identity.secure_url(), "https://demo.sites.kana.li/");
        assert_eq!(identity.container_name("database"), "kana_demo_database");
    }

    #[test]
    fn test_identity_is_deterministic() {
        let dir = Path::new("/tmp/sites/demo");
        for (name, suffix) in [("demo", "sites.kana.li"), ("a-b", "test"), ("x1", "local")] {
            assert_eq!(
                SiteIdentity::new(name, dir, suffix),
                SiteIdentity::new(name, dir, suffix)
            );
        }
    }
}
