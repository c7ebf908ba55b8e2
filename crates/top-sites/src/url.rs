//! Site URL canonicalization, cache filenames, and href resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{TopSitesError, TopSitesResult, UrlConfig};

pub const DEFAULT_PROTOCOL: &str = "http://";
pub const DEFAULT_PATH: &str = "/";

/// Fixed directory for offline HTML caches, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = "html_cached_files";

/// A complete site URL: every component present, plus the assembled URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteUrl {
    pub protocol: String,
    pub subdomain: String,
    pub domain: String,
    pub path: String,
    pub full_url: String,
}

impl SiteUrl {
    /// Components back in configuration shape, with defaults made explicit.
    pub fn to_config(&self) -> UrlConfig {
        UrlConfig {
            protocol: Some(self.protocol.clone()),
            subdomain: Some(self.subdomain.clone()),
            domain: self.domain.clone(),
            path: Some(self.path.clone()),
        }
    }

    /// `protocol + [subdomain.]domain`, without the path.
    pub fn origin(&self) -> String {
        let mut origin = self.protocol.clone();
        if !self.subdomain.is_empty() {
            origin.push_str(&self.subdomain);
            origin.push('.');
        }
        origin.push_str(&self.domain);
        origin
    }
}

/// Fill missing components with defaults and assemble `full_url`.
///
/// A single trailing `.` on the subdomain is stripped.
pub fn tidy(url: &UrlConfig) -> TopSitesResult<SiteUrl> {
    if url.domain.is_empty() {
        return Err(TopSitesError::Configuration(
            "url.domain must not be empty".to_string(),
        ));
    }

    let protocol = url
        .protocol
        .clone()
        .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string());
    let mut subdomain = url.subdomain.clone().unwrap_or_default();
    let path = url.path.clone().unwrap_or_else(|| DEFAULT_PATH.to_string());

    if subdomain.ends_with('.') {
        subdomain.pop();
    }

    let mut site = SiteUrl {
        protocol,
        subdomain,
        domain: url.domain.clone(),
        path,
        full_url: String::new(),
    };
    site.full_url = format!("{}{}", site.origin(), site.path);
    Ok(site)
}

/// Cache file for a site URL: `<subdomain_><domain><path>.html` under `cache_dir`.
///
/// Dots become underscores. The path has `/` turned into `-` and then
/// everything but ASCII letters and digits removed, so the separators do
/// not survive; a bare `/` path contributes nothing.
pub fn derive_cache_filename(url: &SiteUrl, cache_dir: &Path) -> PathBuf {
    let mut name = String::new();

    if !url.subdomain.is_empty() {
        name.push_str(&url.subdomain.replace('.', "_"));
        name.push('_');
    }

    name.push_str(&url.domain.replace('.', "_"));

    if url.path.len() > 1 {
        let path: String = url
            .path
            .replace('/', "-")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        name.push_str(&path);
    }

    name.push_str(".html");
    cache_dir.join(name)
}

/// Resolve an href against the site's origin unless it is already absolute.
///
/// Absolute means `://` appears anywhere in the href.
pub fn make_absolute(href: &str, site: &SiteUrl) -> String {
    if href.contains("://") {
        return href.to_string();
    }

    let mut absolute = site.origin();
    if !href.starts_with('/') {
        absolute.push('/');
    }
    absolute.push_str(href);
    absolute
}
