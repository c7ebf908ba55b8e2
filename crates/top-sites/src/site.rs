//! Per-site orchestration: dispatch each directive to its collector, merge
//! the records into the site's data tree, prune, and time the pass.

use std::time::Instant;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;

use crate::collect::{scrape_newest, FetchMode, MozClient, TwitterClient};
use crate::credentials::Credentials;
use crate::history::{ensure_branches, merge, prune, DEFAULT_RETENTION};
use crate::http::HttpClient;
use crate::record::Record;
use crate::types::{DataTree, Directive, SiteConfig, TopSitesError, TopSitesResult};
use crate::url::{tidy, SiteUrl};

/// One monitored site, loaded from its persisted blob.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub name: String,
    pub url: SiteUrl,
    pub directives: IndexMap<String, Directive>,
    /// Always holds one branch per directive name until pruned.
    pub data: DataTree,
    pub elapsed_seconds: Option<f64>,
}

impl Site {
    /// Build a site from typed configuration, normalizing its URL.
    pub fn from_config(config: SiteConfig) -> TopSitesResult<Self> {
        if config.name.trim().is_empty() {
            return Err(TopSitesError::Configuration(
                "site name must not be empty".to_string(),
            ));
        }
        let url = tidy(&config.url).map_err(|e| match e {
            TopSitesError::Configuration(msg) => {
                TopSitesError::Configuration(format!("site '{}': {msg}", config.name))
            }
            other => other,
        })?;

        let mut data = config.data;
        ensure_branches(&mut data, &config.directives);

        Ok(Self {
            name: config.name,
            url,
            directives: config.directives,
            data,
            elapsed_seconds: config.elapsed_seconds,
        })
    }

    /// Build a site from a raw JSON blob. Any shape mismatch is a configuration error.
    pub fn from_value(value: Value) -> TopSitesResult<Self> {
        let name = site_name(&value);
        let config: SiteConfig = serde_json::from_value(value).map_err(|e| {
            TopSitesError::Configuration(format!("site '{name}': {e}"))
        })?;
        Self::from_config(config)
    }

    /// The blob persisted back to storage.
    pub fn to_config(&self) -> SiteConfig {
        SiteConfig {
            name: self.name.clone(),
            url: self.url.to_config(),
            directives: self.directives.clone(),
            data: self.data.clone(),
            elapsed_seconds: self.elapsed_seconds,
        }
    }

    /// Most recent record for a data point, if any.
    pub fn latest(&self, directive: &str, data_name: &str) -> Option<&Record> {
        self.data.get(directive)?.get(data_name)?.first()
    }
}

/// Best-effort name for a blob that may not parse.
pub fn site_name(value: &Value) -> String {
    value
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
        .to_string()
}

/// A site that could not be processed.
#[derive(Debug)]
pub struct SiteFailure {
    pub name: String,
    pub error: TopSitesError,
}

/// Outcome of a batch: processed sites and the ones that were skipped.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub sites: Vec<Site>,
    pub failures: Vec<SiteFailure>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Collector context shared by every site in a batch.
#[derive(Clone)]
pub struct Pipeline {
    http: HttpClient,
    fetch_mode: FetchMode,
    moz: Option<MozClient>,
    twitter: Option<TwitterClient>,
    retention: usize,
}

impl Pipeline {
    /// A live pipeline with no API clients and the default retention.
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            fetch_mode: FetchMode::Live,
            moz: None,
            twitter: None,
            retention: DEFAULT_RETENTION,
        }
    }

    /// Attach a client for every credential that was found.
    pub fn from_credentials(http: HttpClient, credentials: &Credentials) -> Self {
        let mut pipeline = Self::new(http.clone());
        if let Some(moz) = &credentials.moz {
            pipeline.moz = Some(MozClient::new(http.clone(), moz.clone()));
        }
        if let Some(twitter) = &credentials.twitter {
            pipeline.twitter = Some(TwitterClient::new(http, twitter.clone()));
        }
        pipeline
    }

    pub fn with_fetch_mode(mut self, fetch_mode: FetchMode) -> Self {
        self.fetch_mode = fetch_mode;
        self
    }

    pub fn with_moz(mut self, moz: MozClient) -> Self {
        self.moz = Some(moz);
        self
    }

    pub fn with_twitter(mut self, twitter: TwitterClient) -> Self {
        self.twitter = Some(twitter);
        self
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Load one site blob and run every directive on it.
    pub async fn process(&self, value: Value) -> TopSitesResult<Site> {
        let started = Instant::now();
        let mut site = Site::from_value(value)?;
        self.run_directives(&mut site).await?;
        site.elapsed_seconds = Some(started.elapsed().as_secs_f64());
        tracing::info!(
            site = %site.name,
            elapsed = site.elapsed_seconds.unwrap_or_default(),
            "Site complete"
        );
        Ok(site)
    }

    /// Run every directive on an already loaded site.
    pub async fn run_site(&self, site: &mut Site) -> TopSitesResult<()> {
        let started = Instant::now();
        self.run_directives(site).await?;
        site.elapsed_seconds = Some(started.elapsed().as_secs_f64());
        Ok(())
    }

    async fn run_directives(&self, site: &mut Site) -> TopSitesResult<()> {
        ensure_branches(&mut site.data, &site.directives);

        for (name, directive) in &site.directives {
            let start_time = Utc::now();
            tracing::info!(
                site = %site.name,
                directive = %name,
                kind = directive.kind(),
                "Running directive"
            );
            let records = self.collect(directive, &site.url, start_time).await?;
            merge(records, &mut site.data, name, self.retention);
        }

        prune(&mut site.data);
        Ok(())
    }

    /// Dispatch one directive to its collector.
    ///
    /// Collector failures come back inside the records; only a missing
    /// API client is an error here.
    pub async fn collect(
        &self,
        directive: &Directive,
        url: &SiteUrl,
        start_time: DateTime<Utc>,
    ) -> TopSitesResult<Vec<Record>> {
        match directive {
            Directive::ScrapeNewest(steps) => {
                Ok(scrape_newest(&self.http, url, steps, &self.fetch_mode, start_time).await)
            }
            Directive::Moz(target) => {
                let moz = self.moz.as_ref().ok_or_else(|| {
                    TopSitesError::Credentials("no moz credentials configured".to_string())
                })?;
                Ok(moz.search(target, start_time).await)
            }
            Directive::Twitter(keywords) => {
                let twitter = self.twitter.as_ref().ok_or_else(|| {
                    TopSitesError::Credentials("no twitter credentials configured".to_string())
                })?;
                Ok(twitter.search(keywords, start_time).await)
            }
        }
    }

    /// Process every blob in order. A failing site is recorded and skipped.
    pub async fn run_batch<I>(&self, rows: I) -> BatchReport
    where
        I: IntoIterator<Item = Value>,
    {
        let mut report = BatchReport::default();

        for row in rows {
            let name = site_name(&row);
            match self.process(row).await {
                Ok(site) => report.sites.push(site),
                Err(error) => {
                    tracing::warn!(site = %name, error = %error, "Skipping site");
                    report.failures.push(SiteFailure { name, error });
                }
            }
        }

        tracing::info!(
            processed = report.sites.len(),
            failed = report.failures.len(),
            "Batch complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::scrape::{A_LINK_TEXT, A_LINK_URL};
    use crate::url::derive_cache_filename;
    use serde_json::json;

    const PAGE: &str = r#"<html><body><ul class="posts">
        <li><a href="/posts/2">Second post</a></li>
        <li><a href="/posts/1">First post</a></li>
    </ul></body></html>"#;

    fn blog(extra_data: Value) -> Value {
        json!({
            "name": "Example Blog",
            "url": { "protocol": "https://", "subdomain": "blog", "domain": "example.com" },
            "directives": {
                "newest": { "type": "scrape_newest", "parameters": [["class", "posts"], "a"] }
            },
            "data": extra_data
        })
    }

    fn offline(dir: &std::path::Path) -> Pipeline {
        Pipeline::new(HttpClient::default()).with_fetch_mode(FetchMode::CachedFile {
            cache_dir: dir.to_path_buf(),
        })
    }

    #[test]
    fn test_from_value_tidies_and_adds_branches() {
        let site = Site::from_value(blog(json!({}))).unwrap();
        assert_eq!(site.url.full_url, "https://blog.example.com/");
        assert!(site.data.contains_key("newest"));
        assert!(site.data["newest"].is_empty());
    }

    #[test]
    fn test_from_value_rejects_unknown_field() {
        let mut value = blog(json!({}));
        value["color"] = json!("blue");
        let err = Site::from_value(value).unwrap_err();
        assert!(matches!(err, TopSitesError::Configuration(_)));
        assert!(err.to_string().contains("Example Blog"));
    }

    #[test]
    fn test_from_value_rejects_unknown_directive() {
        let value = json!({
            "name": "x",
            "url": { "domain": "x.com" },
            "directives": { "d": { "type": "facebook", "parameters": [] } }
        });
        assert!(matches!(
            Site::from_value(value),
            Err(TopSitesError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_config_rejects_blank_name() {
        let value = json!({ "name": " ", "url": { "domain": "x.com" }, "directives": {} });
        assert!(matches!(
            Site::from_value(value),
            Err(TopSitesError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_process_scrapes_merges_and_prunes() {
        let dir = tempfile::tempdir().unwrap();
        let site = Site::from_value(blog(json!({}))).unwrap();
        std::fs::write(derive_cache_filename(&site.url, dir.path()), PAGE).unwrap();

        let site = offline(dir.path())
            .process(blog(json!({ "retired": {} })))
            .await
            .unwrap();

        assert!(!site.data.contains_key("retired"));
        let branch = &site.data["newest"];
        assert_eq!(branch.len(), 2);
        assert_eq!(
            site.latest("newest", A_LINK_URL).unwrap().payload,
            Some(json!("https://blog.example.com/posts/2"))
        );
        assert_eq!(
            site.latest("newest", A_LINK_TEXT).unwrap().payload,
            Some(json!("Second post"))
        );
        assert!(site.elapsed_seconds.unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_missing_client_is_credentials_error() {
        let value = json!({
            "name": "x",
            "url": { "domain": "x.com" },
            "directives": { "social": { "type": "twitter", "parameters": ["x.com"] } }
        });
        let err = Pipeline::new(HttpClient::default())
            .process(value)
            .await
            .unwrap_err();
        assert!(matches!(err, TopSitesError::Credentials(_)));
    }

    #[tokio::test]
    async fn test_batch_continues_past_bad_site() {
        let dir = tempfile::tempdir().unwrap();
        let site = Site::from_value(blog(json!({}))).unwrap();
        std::fs::write(derive_cache_filename(&site.url, dir.path()), PAGE).unwrap();

        let bad = json!({ "name": "Broken", "url": {}, "directives": {} });
        let report = offline(dir.path()).run_batch(vec![bad, blog(json!({}))]).await;

        assert_eq!(report.sites.len(), 1);
        assert_eq!(report.sites[0].name, "Example Blog");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "Broken");
        assert!(!report.is_clean());
    }

    #[test]
    fn test_to_config_round_trips() {
        let site = Site::from_value(blog(json!({}))).unwrap();
        let again = Site::from_config(site.to_config()).unwrap();
        assert_eq!(site, again);
    }
}
