//! Newest-post scraper: fetch a page, narrow the DOM, extract one link.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};
use serde_json::Value;

use crate::http::HttpClient;
use crate::record::{failed_records, normalize, Record, Status};
use crate::types::{NarrowingStep, TopSitesError, TopSitesResult};
use crate::url::{derive_cache_filename, make_absolute, SiteUrl};

pub const A_LINK_TEXT: &str = "a_link_text";
pub const A_LINK_URL: &str = "a_link_url";

/// Where page HTML comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchMode {
    /// Always fetch over HTTP.
    Live,
    /// Read from a per-site cache file, filling it from a live fetch when missing.
    CachedFile { cache_dir: PathBuf },
}

/// The link found by a scrape, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewestLink {
    /// Link text, HTML-escaped.
    pub text: String,
    /// Absolute href.
    pub url: String,
}

/// Scrape the newest post link for a site.
///
/// Always returns two records, `a_link_text` and `a_link_url`. Any failure
/// is captured in both records' status with null payloads.
pub async fn scrape_newest(
    http: &HttpClient,
    url: &SiteUrl,
    steps: &[NarrowingStep],
    mode: &FetchMode,
    start_time: DateTime<Utc>,
) -> Vec<Record> {
    tracing::info!(url = %url.full_url, "Starting scrape_newest");

    let result = match fetch_html(http, url, mode).await {
        Ok(html) => find_newest_link(&html, steps, url),
        Err(e) => Err(e),
    };

    match result {
        Ok(link) => vec![
            normalize(Some(Value::String(link.text)), A_LINK_TEXT, start_time, Status::Ok),
            normalize(Some(Value::String(link.url)), A_LINK_URL, start_time, Status::Ok),
        ],
        Err(e) => {
            tracing::warn!(url = %url.full_url, error = %e, "scrape_newest failed");
            failed_records(&[A_LINK_TEXT, A_LINK_URL], start_time, &e.to_string())
        }
    }
}

/// Get page HTML according to `mode`.
pub async fn fetch_html(
    http: &HttpClient,
    url: &SiteUrl,
    mode: &FetchMode,
) -> TopSitesResult<String> {
    match mode {
        FetchMode::Live => http.get_text(&url.full_url).await,
        FetchMode::CachedFile { cache_dir } => {
            let path = derive_cache_filename(url, cache_dir);
            match tokio::fs::read_to_string(&path).await {
                Ok(html) => {
                    tracing::debug!(path = %path.display(), "Read cached HTML");
                    Ok(html)
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    save_to_cache(http, &url.full_url, &path).await?;
                    Ok(tokio::fs::read_to_string(&path).await?)
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

async fn save_to_cache(http: &HttpClient, full_url: &str, path: &Path) -> TopSitesResult<()> {
    let body = http.get_text(full_url).await?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, body.as_bytes()).await?;
    tracing::info!(path = %path.display(), "Cached HTML");
    Ok(())
}

/// Apply narrowing steps to `html` and extract the target element's text and href.
pub fn find_newest_link(
    html: &str,
    steps: &[NarrowingStep],
    url: &SiteUrl,
) -> TopSitesResult<NewestLink> {
    let document = Html::parse_document(html);
    let target = narrow(&document, steps).ok_or_else(|| {
        TopSitesError::Selector(format!("could not find element for steps {steps:?}"))
    })?;

    let href = target.value().attr("href").ok_or_else(|| {
        TopSitesError::Selector(format!(
            "element <{}> found for steps {steps:?} has no href",
            target.value().name()
        ))
    })?;

    let text: String = target.text().collect();
    Ok(NewestLink {
        text: html_escape::encode_quoted_attribute(&text).into_owned(),
        url: make_absolute(href, url),
    })
}

/// Walk the steps, each searching the descendants of the previous match.
///
/// Returns `None` when any step finds nothing, or when there are no steps.
pub fn narrow<'a>(document: &'a Html, steps: &[NarrowingStep]) -> Option<ElementRef<'a>> {
    let mut scope: Option<ElementRef<'a>> = None;

    for step in steps {
        let nodes = match scope {
            Some(el) => el.descendants().skip(1),
            None => document.tree.root().descendants().skip(1),
        };
        scope = Some(nodes.filter_map(ElementRef::wrap).find(|el| step_matches(el, step))?);
    }

    scope
}

fn step_matches(el: &ElementRef<'_>, step: &NarrowingStep) -> bool {
    let element = el.value();
    match step {
        NarrowingStep::Tag(tag) => element.name().eq_ignore_ascii_case(tag),
        NarrowingStep::Attr(key, value) => {
            if key == "class" && element.classes().any(|c| c == value) {
                return true;
            }
            element.attr(key) == Some(value.as_str())
        }
    }
}
