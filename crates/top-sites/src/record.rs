//! Uniform timestamped records produced by every collection attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Format of [`Record::accessed`].
pub const ACCESSED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Outcome of a collection attempt: `"ok"` or an error description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Ok,
    Failed(String),
}

impl Status {
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        if s == "ok" {
            Status::Ok
        } else {
            Status::Failed(s)
        }
    }
}

impl From<Status> for String {
    fn from(s: Status) -> Self {
        match s {
            Status::Ok => "ok".to_string(),
            Status::Failed(msg) => msg,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Ok => f.write_str("ok"),
            Status::Failed(msg) => f.write_str(msg),
        }
    }
}

/// A normalized result of one collection attempt. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Wall-clock UTC time at normalization.
    pub accessed: String,
    pub data_name: String,
    /// Seconds between the start of the attempt and normalization.
    pub duration: f64,
    /// `None` when the attempt failed.
    pub payload: Option<Value>,
    pub status: Status,
}

/// Wrap a collected value into a [`Record`].
///
/// Duration is measured against the clock at this call, not when the
/// caller finished its own work.
pub fn normalize(
    value: Option<Value>,
    data_name: &str,
    start_time: DateTime<Utc>,
    status: Status,
) -> Record {
    let now = Utc::now();
    let duration = (now - start_time)
        .num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or_default();

    Record {
        accessed: now.format(ACCESSED_FORMAT).to_string(),
        data_name: data_name.to_string(),
        duration,
        payload: value,
        status,
    }
}

/// Build one record per name, all sharing the same failure status and a null payload.
pub fn failed_records(names: &[&str], start_time: DateTime<Utc>, error: &str) -> Vec<Record> {
    names
        .iter()
        .map(|name| {
            normalize(
                None,
                name,
                start_time,
                Status::Failed(error.to_string()),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_normalize_ok() {
        let start = Utc::now() - Duration::milliseconds(1500);
        let rec = normalize(Some(json!(42)), "tweets", start, Status::Ok);
        assert_eq!(rec.data_name, "tweets");
        assert_eq!(rec.payload, Some(json!(42)));
        assert!(rec.status.is_ok());
        assert!(rec.duration >= 1.5);
        assert_eq!(rec.accessed.len(), "2024-01-01T00:00:00".len());
    }

    #[test]
    fn test_normalize_null_payload_with_error() {
        let rec = normalize(
            None,
            "a_link_url",
            Utc::now(),
            Status::Failed("Transport error: boom".into()),
        );
        assert!(rec.payload.is_none());
        assert_eq!(rec.status.to_string(), "Transport error: boom");
    }

    #[test]
    fn test_status_serializes_as_string() {
        let rec = normalize(Some(json!("x")), "a_link_text", Utc::now(), Status::Ok);
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["status"], json!("ok"));

        let failed = normalize(None, "mozrank", Utc::now(), Status::Failed("nope".into()));
        let v = serde_json::to_value(&failed).unwrap();
        assert_eq!(v["status"], json!("nope"));
        assert_eq!(v["payload"], Value::Null);

        let back: Record = serde_json::from_value(v).unwrap();
        assert_eq!(back.status, Status::Failed("nope".into()));
    }

    #[test]
    fn test_failed_records_share_status() {
        let recs = failed_records(&["tweets", "tweets_followers"], Utc::now(), "down");
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.payload.is_none() && !r.status.is_ok()));
        assert_eq!(recs[1].data_name, "tweets_followers");
    }
}
