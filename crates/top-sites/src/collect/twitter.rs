//! Social-engagement lookup against the Twitter v1.1 search API.
//!
//! Searches keyword matches posted since the previous UTC calendar day,
//! paging backwards through results by `max_id` until a page comes back
//! empty or [`MAX_TWEETS`] have been counted.
//!
//! The free tier allows 180 calls per 15 minutes. The remaining-calls count
//! from the last response is shared by every clone of a [`TwitterClient`],
//! and page requests hold it while they run, so callers using the same
//! credential are serialized against one budget.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use crate::credentials::TwitterCredentials;
use crate::http::HttpClient;
use crate::record::{failed_records, normalize, Record, Status};
use crate::types::{TopSitesError, TopSitesResult};

pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com/1.1";
const SEARCH_ENDPOINT: &str = "/search/tweets.json";
const RATE_LIMIT_HEADER: &str = "x-rate-limit-remaining";

/// Hard cap on tweets counted per search.
pub const MAX_TWEETS: u64 = 10_000;
/// Pause before the next page when fewer calls than this remain.
pub const RATE_LIMIT_THRESHOLD: u32 = 15;
pub const RATE_LIMIT_PAUSE: Duration = Duration::from_secs(60);
const PAGE_SIZE: u32 = 100;

pub const TWEETS: &str = "tweets";
pub const TWEETS_FOLLOWERS: &str = "tweets_followers";
pub const MOST_FOLLOWED_NAME: &str = "most_followed_name";
pub const MOST_FOLLOWED_COUNT: &str = "most_followed_count";

const RECORD_NAMES: [&str; 4] = [TWEETS, TWEETS_FOLLOWERS, MOST_FOLLOWED_NAME, MOST_FOLLOWED_COUNT];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    statuses: Vec<Tweet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tweet {
    pub id: u64,
    pub user: TweetUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TweetUser {
    pub screen_name: String,
    pub followers_count: u64,
}

/// Running counts over all pages of one search.
#[derive(Debug, Default)]
pub struct Tally {
    pub tweets: u64,
    /// Lowest tweet ID seen; the next page starts below it.
    pub min_id: Option<u64>,
    /// Follower count per author, in first-seen order.
    pub authors: IndexMap<String, u64>,
}

impl Tally {
    pub fn add(&mut self, tweet: &Tweet) {
        self.tweets += 1;
        if self.min_id.map_or(true, |min| tweet.id < min) {
            self.min_id = Some(tweet.id);
        }
        self.authors
            .entry(tweet.user.screen_name.clone())
            .or_insert(tweet.user.followers_count);
    }

    pub fn engagement(&self) -> Engagement {
        let mut most_followed_name = String::new();
        let mut most_followed_count = 0;
        for (name, &followers) in &self.authors {
            if followers > most_followed_count {
                most_followed_count = followers;
                most_followed_name = name.clone();
            }
        }

        Engagement {
            tweets: self.tweets,
            tweets_followers: self.authors.values().sum(),
            most_followed_name,
            most_followed_count,
        }
    }
}

/// Result of a search across all pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engagement {
    pub tweets: u64,
    /// Sum of followers across unique authors.
    pub tweets_followers: u64,
    pub most_followed_name: String,
    pub most_followed_count: u64,
}

/// Query string for the keywords, restricted to posts since `since`.
pub fn build_query(keywords: &[String], since: chrono::NaiveDate) -> String {
    let mut q = keywords.join(" ");
    if !q.is_empty() {
        q.push(' ');
    }
    q.push_str(&format!("since:{}", since.format("%Y-%m-%d")));
    q
}

/// Twitter search client for one credential.
#[derive(Clone)]
pub struct TwitterClient {
    http: HttpClient,
    credentials: TwitterCredentials,
    base_url: String,
    max_tweets: u64,
    threshold: u32,
    pause: Duration,
    remaining: Arc<Mutex<Option<u32>>>,
}

impl TwitterClient {
    pub fn new(http: HttpClient, credentials: TwitterCredentials) -> Self {
        Self {
            http,
            credentials,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tweets: MAX_TWEETS,
            threshold: RATE_LIMIT_THRESHOLD,
            pause: RATE_LIMIT_PAUSE,
            remaining: Arc::new(Mutex::new(None)),
        }
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the rate-limit threshold and pause.
    pub fn with_rate_limit(mut self, threshold: u32, pause: Duration) -> Self {
        self.threshold = threshold;
        self.pause = pause;
        self
    }

    pub fn with_max_tweets(mut self, max_tweets: u64) -> Self {
        self.max_tweets = max_tweets;
        self
    }

    /// Search `keywords` and summarize engagement since yesterday (UTC).
    ///
    /// Always returns four records; failures are captured in their status.
    pub async fn search(&self, keywords: &[String], start_time: DateTime<Utc>) -> Vec<Record> {
        tracing::info!(?keywords, "Starting twitter search");

        match self.collect_engagement(keywords).await {
            Ok(e) => vec![
                normalize(Some(json!(e.tweets)), TWEETS, start_time, Status::Ok),
                normalize(Some(json!(e.tweets_followers)), TWEETS_FOLLOWERS, start_time, Status::Ok),
                normalize(
                    Some(json!(html_escape::encode_quoted_attribute(&e.most_followed_name))),
                    MOST_FOLLOWED_NAME,
                    start_time,
                    Status::Ok,
                ),
                normalize(Some(json!(e.most_followed_count)), MOST_FOLLOWED_COUNT, start_time, Status::Ok),
            ],
            Err(e) => {
                tracing::warn!(?keywords, error = %e, "twitter search failed");
                failed_records(&RECORD_NAMES, start_time, &e.to_string())
            }
        }
    }

    /// Page through all results and tally them.
    pub async fn collect_engagement(&self, keywords: &[String]) -> TopSitesResult<Engagement> {
        let yesterday = Utc::now().date_naive() - chrono::Duration::days(1);
        let query = build_query(keywords, yesterday);

        let mut tally = Tally::default();
        let mut max_id: Option<u64> = None;

        while tally.tweets < self.max_tweets {
            let statuses = self.fetch_page(&query, max_id).await?;
            if statuses.is_empty() {
                break;
            }
            for tweet in &statuses {
                if tally.tweets >= self.max_tweets {
                    break;
                }
                tally.add(tweet);
            }
            // Start below the lowest ID so the last tweet is not fetched twice.
            max_id = tally.min_id.map(|id| id.saturating_sub(1));
        }

        let engagement = tally.engagement();
        tracing::info!(
            tweets = engagement.tweets,
            authors = tally.authors.len(),
            followers = engagement.tweets_followers,
            "twitter search complete"
        );
        Ok(engagement)
    }

    async fn fetch_page(&self, query: &str, max_id: Option<u64>) -> TopSitesResult<Vec<Tweet>> {
        let mut remaining = self.remaining.lock().await;
        if let Some(left) = *remaining {
            if left < self.threshold {
                tracing::warn!(
                    remaining = left,
                    pause_secs = self.pause.as_secs(),
                    "Approaching twitter rate limit, pausing"
                );
                tokio::time::sleep(self.pause).await;
            }
        }

        let url = format!("{}{SEARCH_ENDPOINT}", self.base_url);
        let mut params = vec![
            ("q", query.to_string()),
            ("count", PAGE_SIZE.to_string()),
            ("result_type", "recent".to_string()),
            ("include_entities", "false".to_string()),
        ];
        if let Some(id) = max_id {
            params.push(("max_id", id.to_string()));
        }
        let headers = [(
            "Authorization",
            format!("Bearer {}", self.credentials.bearer_token),
        )];

        let resp = self.http.get(&url, &params, &headers).await?;
        *remaining = resp
            .header(RATE_LIMIT_HEADER)
            .and_then(|v| v.trim().parse().ok());

        let page: SearchResponse = resp
            .json()
            .map_err(|e| TopSitesError::Api(format!("twitter search: {e}")))?;
        tracing::debug!(count = page.statuses.len(), ?max_id, remaining = ?*remaining, "twitter page");
        Ok(page.statuses)
    }
}
