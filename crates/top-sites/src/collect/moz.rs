//! SEO authority/rank lookup against the Moz url-metrics API.
//!
//! Requests are authenticated with a signed token valid for five minutes:
//! `Signature = base64(HMAC-SHA1(secret, "<AccessID>\n<Expires>"))`.
//! Response keys are cryptic two-to-four letter codes and are re-keyed to
//! field names through [`MOZ_FIELDS`].

use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha1::Sha1;

use crate::credentials::MozCredentials;
use crate::http::HttpClient;
use crate::record::{failed_records, normalize, Record, Status};
use crate::types::{TopSitesError, TopSitesResult};

pub const DEFAULT_BASE_URL: &str = "https://lsapi-beta.seomoz.com/linkscape";
const ENDPOINT: &str = "/url-metrics/";

/// Lifetime of a request signature in seconds.
pub const SIGNATURE_TTL_SECS: i64 = 300;

pub const MOZRANK: &str = "mozrank";
pub const AUTHORITY: &str = "authority";

/// A requestable url-metrics field.
#[derive(Debug, Clone, Copy)]
pub struct MozField {
    pub name: &'static str,
    pub bit_flag: u64,
    /// Response keys that carry this field's value.
    pub response_keys: &'static [&'static str],
}

/// Fields available without a paid plan. Raw MozRank scores (`umrr`, `fmrr`) are ignored.
pub const MOZ_FIELDS: &[MozField] = &[
    MozField { name: "title", bit_flag: 1, response_keys: &["ut"] },
    MozField { name: "canonical", bit_flag: 4, response_keys: &["uu"] },
    MozField { name: "links_ee", bit_flag: 32, response_keys: &["ueid"] },
    MozField { name: "links", bit_flag: 2048, response_keys: &["uid"] },
    MozField { name: "mozrank_url", bit_flag: 16384, response_keys: &["umrp"] },
    MozField { name: "mozrank_subdomain", bit_flag: 32768, response_keys: &["fmrp"] },
    MozField { name: "http_status", bit_flag: 536870912, response_keys: &["us"] },
    MozField { name: "authority_page", bit_flag: 34359738368, response_keys: &["upa"] },
    MozField { name: "authority_domain", bit_flag: 68719476736, response_keys: &["pda"] },
];

/// Fields requested on every lookup.
pub const FIELDS_TO_GET: &[&str] = &[
    "authority_domain",
    "mozrank_url",
    "mozrank_subdomain",
    "canonical",
    "authority_page",
    "title",
    "http_status",
    "links",
    "links_ee",
];

/// Sum of bit flags for the named fields; unknown names contribute nothing.
pub fn cols(fields: &[&str]) -> u64 {
    MOZ_FIELDS
        .iter()
        .filter(|f| fields.contains(&f.name))
        .map(|f| f.bit_flag)
        .sum()
}

/// Base64 HMAC-SHA1 of `"<access_id>\n<expires>"` keyed by the secret.
pub fn sign(access_id: &str, secret_key: &str, expires: i64) -> TopSitesResult<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret_key.as_bytes())
        .map_err(|e| TopSitesError::Credentials(format!("invalid moz secret key: {e}")))?;
    mac.update(format!("{access_id}\n{expires}").as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Rename cryptic response keys to field names. Unrecognized keys are dropped.
pub fn rekey(response: &Map<String, Value>) -> Map<String, Value> {
    let mut rekeyed = Map::new();
    for (key, value) in response {
        if let Some(field) = MOZ_FIELDS
            .iter()
            .find(|f| f.response_keys.contains(&key.as_str()))
        {
            rekeyed.insert(field.name.to_string(), value.clone());
        }
    }
    rekeyed
}

/// Moz API client for one set of credentials.
#[derive(Clone)]
pub struct MozClient {
    http: HttpClient,
    credentials: MozCredentials,
    base_url: String,
}

impl MozClient {
    pub fn new(http: HttpClient, credentials: MozCredentials) -> Self {
        Self {
            http,
            credentials,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Look up `mozrank` and `authority` for `target` (e.g. `en.wikipedia.org`).
    ///
    /// Always returns two records; failures are captured in their status.
    pub async fn search(&self, target: &str, start_time: DateTime<Utc>) -> Vec<Record> {
        tracing::info!(domain = target, "Starting moz search");

        match self.fetch_metrics(target).await {
            Ok((mozrank, authority)) => vec![
                normalize(Some(mozrank), MOZRANK, start_time, Status::Ok),
                normalize(Some(authority), AUTHORITY, start_time, Status::Ok),
            ],
            Err(e) => {
                tracing::warn!(domain = target, error = %e, "moz search failed");
                failed_records(&[MOZRANK, AUTHORITY], start_time, &e.to_string())
            }
        }
    }

    async fn fetch_metrics(&self, target: &str) -> TopSitesResult<(Value, Value)> {
        let expires = Utc::now().timestamp() + SIGNATURE_TTL_SECS;
        let signature = sign(
            &self.credentials.access_id,
            &self.credentials.secret_key,
            expires,
        )?;
        let url = format!("{}{ENDPOINT}{target}", self.base_url);
        let query = [
            ("Cols", cols(FIELDS_TO_GET).to_string()),
            ("Limit", "1".to_string()),
            ("AccessID", self.credentials.access_id.clone()),
            ("Expires", expires.to_string()),
            ("Signature", signature),
        ];

        let body: Value = self.http.get_json(&url, &query, &[]).await?;
        let object = body
            .as_object()
            .ok_or_else(|| TopSitesError::Api(format!("unexpected moz response: {body}")))?;

        let metrics = rekey(object);
        let logged = Value::Object(metrics.clone());
        tracing::debug!(domain = target, metrics = %logged, "moz metrics");

        let mozrank = larger(&metrics, "mozrank_url", "mozrank_subdomain")?;
        let authority = larger(&metrics, "authority_domain", "authority_page")?;
        Ok((mozrank, authority))
    }
}

/// The larger of two numeric metrics, as a JSON number.
fn larger(metrics: &Map<String, Value>, a: &str, b: &str) -> TopSitesResult<Value> {
    let get = |name: &str| {
        metrics
            .get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| TopSitesError::Api(format!("moz response missing numeric {name}")))
    };
    let max = get(a)?.max(get(b)?);
    serde_json::Number::from_f64(max)
        .map(Value::Number)
        .ok_or_else(|| TopSitesError::Api(format!("non-finite value for {a}/{b}")))
}
