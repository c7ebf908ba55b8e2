//! Async HTTP client wrapping reqwest.
//!
//! One request per call: no retries, no backoff. A non-200 status is a
//! transport error.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::types::{TopSitesError, TopSitesResult};

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

const USER_AGENT: &str = concat!("top-sites/", env!("CARGO_PKG_VERSION"));

/// Response from a GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Requested URL.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers, names lowercased.
    pub headers: Vec<(String, String)>,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    /// First header with the given (lowercase) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> TopSitesResult<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| TopSitesError::Api(format!("invalid JSON from {}: {e}", self.url)))
    }
}

/// HTTP client shared by all collectors.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Create a new HTTP client with the given timeout.
    pub fn new(timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// GET `url` with optional query and headers; any status other than 200 is an error.
    pub async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> TopSitesResult<HttpResponse> {
        let mut builder = self.client.get(url).query(query);
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }

        let resp = builder.send().await.map_err(|e| {
            TopSitesError::Transport(format!("request to {url} failed: {e}"))
        })?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(TopSitesError::Transport(format!(
                "received status code {status} when trying to get {url}"
            )));
        }

        let headers: Vec<(String, String)> = resp
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();

        let body = resp.text().await.map_err(|e| {
            TopSitesError::Transport(format!("failed to read body from {url}: {e}"))
        })?;

        Ok(HttpResponse {
            url: url.to_string(),
            status,
            headers,
            body,
        })
    }

    /// GET `url` and decode the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> TopSitesResult<T> {
        self.get(url, query, headers).await?.json()
    }

    /// GET a page and return its body.
    pub async fn get_text(&self, url: &str) -> TopSitesResult<String> {
        Ok(self.get(url, &[], &[]).await?.body)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS)
    }
}
