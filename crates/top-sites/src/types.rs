//! Core data types for site configuration, directives, and errors.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::record::Record;

/// History lists for one directive, keyed by data-point name.
pub type DataBranch = IndexMap<String, Vec<Record>>;

/// The full data tree of a site: directive name → data-point name → history.
pub type DataTree = IndexMap<String, DataBranch>;

/// Persisted configuration and data for one monitored site.
///
/// This is the blob stored per site. Unknown fields are rejected so a
/// malformed row fails loudly instead of being carried along.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Unique site name; also the storage key.
    pub name: String,
    pub url: UrlConfig,
    #[serde(default)]
    pub directives: IndexMap<String, Directive>,
    #[serde(default)]
    pub data: DataTree,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<f64>,
}

/// URL components as entered; missing parts are filled by [`crate::url::tidy`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct UrlConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A named instruction: which collector to run and with what parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "parameters", rename_all = "snake_case")]
pub enum Directive {
    /// SEO authority/rank lookup for a target domain string.
    Moz(String),
    /// Newest-post scrape, narrowing the DOM step by step.
    ScrapeNewest(Vec<NarrowingStep>),
    /// Social-engagement search over the given keywords.
    Twitter(Vec<String>),
}

impl Directive {
    /// The directive's `type` string as it appears in configuration.
    pub fn kind(&self) -> &'static str {
        match self {
            Directive::Moz(_) => "moz",
            Directive::ScrapeNewest(_) => "scrape_newest",
            Directive::Twitter(_) => "twitter",
        }
    }
}

/// One step of a scrape: a tag name, or an attribute key/value pair.
///
/// Serialized as `"article"` or `["class", "post-title"]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum NarrowingStep {
    Tag(String),
    Attr(String, String),
}

/// Errors that can occur while collecting, storing, or rendering.
#[derive(thiserror::Error, Debug)]
pub enum TopSitesError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Selector error: {0}")]
    Selector(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for TopSitesError {
    fn from(e: reqwest::Error) -> Self {
        TopSitesError::Transport(e.to_string())
    }
}

impl From<rusqlite::Error> for TopSitesError {
    fn from(e: rusqlite::Error) -> Self {
        TopSitesError::Storage(e.to_string())
    }
}

/// Convenience result type.
pub type TopSitesResult<T> = Result<T, TopSitesError>;
