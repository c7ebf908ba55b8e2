//! Persisted site blobs: one SQLite row per site, keyed by site name.
//!
//! Blobs are stored as JSON text. Empty-mapping branches are pruned before
//! every write, so a stored blob never carries `{}` as a value.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::history::prune_json;
use crate::site::Site;
use crate::types::{TopSitesError, TopSitesResult};

/// Key-value store of site blobs.
pub struct SiteStore {
    db: Connection,
}

impl SiteStore {
    /// Open or create a store at `path`.
    pub fn open(path: &Path) -> TopSitesResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Connection::open(path)
            .map_err(|e| storage_error(&format!("open {}", path.display()), e))?;
        Self::init(db)
    }

    /// A throwaway store.
    pub fn open_in_memory() -> TopSitesResult<Self> {
        let db = Connection::open_in_memory().map_err(|e| storage_error("open in-memory", e))?;
        Self::init(db)
    }

    fn init(db: Connection) -> TopSitesResult<Self> {
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS sites (
                name TEXT PRIMARY KEY,
                blob TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )
        .map_err(|e| storage_error("create sites table", e))?;

        Ok(Self { db })
    }

    /// Every stored blob, ordered by name.
    pub fn get_all_rows(&self) -> TopSitesResult<Vec<Value>> {
        let mut stmt = self
            .db
            .prepare("SELECT name, blob FROM sites ORDER BY name")
            .map_err(|e| storage_error("scan", e))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| storage_error("scan", e))?;

        let mut blobs = Vec::new();
        for row in rows {
            let (name, blob) = row.map_err(|e| storage_error("scan", e))?;
            blobs.push(decode(&name, &blob)?);
        }
        Ok(blobs)
    }

    pub fn get(&self, name: &str) -> TopSitesResult<Option<Value>> {
        let blob: Option<String> = self
            .db
            .query_row("SELECT blob FROM sites WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| storage_error(&format!("get '{name}'"), e))?;

        blob.map(|b| decode(name, &b)).transpose()
    }

    /// Insert or replace one blob. The blob must carry a string `name`.
    pub fn put(&self, blob: &Value) -> TopSitesResult<()> {
        let (name, text) = encode(blob)?;
        upsert(&self.db, &name, &text)?;
        tracing::debug!(site = %name, bytes = text.len(), "Stored site");
        Ok(())
    }

    /// Store a processed site.
    pub fn put_site(&self, site: &Site) -> TopSitesResult<()> {
        self.put(&serde_json::to_value(site.to_config())?)
    }

    /// Write many blobs in one transaction; either all land or none do.
    pub fn batch_update_rows(&mut self, blobs: &[Value]) -> TopSitesResult<usize> {
        let encoded = blobs.iter().map(encode).collect::<TopSitesResult<Vec<_>>>()?;

        let tx = self
            .db
            .transaction()
            .map_err(|e| storage_error("begin batch", e))?;
        for (name, text) in &encoded {
            upsert(&tx, name, text)?;
        }
        tx.commit().map_err(|e| storage_error("commit batch", e))?;

        tracing::info!(rows = encoded.len(), "Batch stored");
        Ok(encoded.len())
    }

    /// Remove a site. Returns whether a row existed.
    pub fn delete(&self, name: &str) -> TopSitesResult<bool> {
        let n = self
            .db
            .execute("DELETE FROM sites WHERE name = ?1", params![name])
            .map_err(|e| storage_error(&format!("delete '{name}'"), e))?;
        Ok(n > 0)
    }

    pub fn len(&self) -> TopSitesResult<usize> {
        let n: i64 = self
            .db
            .query_row("SELECT COUNT(*) FROM sites", [], |row| row.get(0))
            .map_err(|e| storage_error("count", e))?;
        Ok(n as usize)
    }

    pub fn is_empty(&self) -> TopSitesResult<bool> {
        Ok(self.len()? == 0)
    }
}

fn upsert(db: &Connection, name: &str, text: &str) -> TopSitesResult<()> {
    db.execute(
        "INSERT INTO sites (name, blob, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(name) DO UPDATE SET blob = excluded.blob, updated_at = excluded.updated_at",
        params![name, text, Utc::now().to_rfc3339()],
    )
    .map_err(|e| storage_error(&format!("put '{name}'"), e))?;
    Ok(())
}

/// Prune and serialize a blob, returning its key.
fn encode(blob: &Value) -> TopSitesResult<(String, String)> {
    let mut object = blob
        .as_object()
        .cloned()
        .ok_or_else(|| TopSitesError::Storage("site blob must be a JSON object".to_string()))?;

    let name = object
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| TopSitesError::Storage("site blob has no name".to_string()))?;

    if let Some(Value::Object(data)) = object.get_mut("data") {
        prune_json(data);
    }
    prune_json(&mut object);

    let text = serde_json::to_string(&Value::Object(object))?;
    Ok((name, text))
}

fn decode(name: &str, blob: &str) -> TopSitesResult<Value> {
    serde_json::from_str(blob)
        .map_err(|e| TopSitesError::Storage(format!("corrupt blob for '{name}': {e}")))
}

fn storage_error(op: &str, e: rusqlite::Error) -> TopSitesError {
    tracing::error!(op, error = %e, "Storage operation failed");
    TopSitesError::Storage(format!("{op}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blob(name: &str) -> Value {
        json!({
            "name": name,
            "url": { "domain": "example.com" },
            "directives": { "moz1": { "type": "moz", "parameters": "example.com" } },
            "data": { "moz1": {}, "twitter1": { "tweets": [] } }
        })
    }

    #[test]
    fn test_put_get_prunes_empty_branches() {
        let store = SiteStore::open_in_memory().unwrap();
        store.put(&blob("a")).unwrap();

        let stored = store.get("a").unwrap().unwrap();
        assert!(stored["data"].get("moz1").is_none());
        // empty lists are not empty mappings
        assert_eq!(stored["data"]["twitter1"]["tweets"], json!([]));
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_empty_data_is_dropped_from_blob() {
        let store = SiteStore::open_in_memory().unwrap();
        let mut b = blob("a");
        b["data"] = json!({ "moz1": {} });
        store.put(&b).unwrap();
        assert!(store.get("a").unwrap().unwrap().get("data").is_none());
    }

    #[test]
    fn test_put_replaces() {
        let store = SiteStore::open_in_memory().unwrap();
        store.put(&blob("a")).unwrap();
        let mut b = blob("a");
        b["url"]["domain"] = json!("other.org");
        store.put(&b).unwrap();

        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get("a").unwrap().unwrap()["url"]["domain"], "other.org");
    }

    #[test]
    fn test_batch_and_scan_ordered() {
        let mut store = SiteStore::open_in_memory().unwrap();
        let n = store
            .batch_update_rows(&[blob("zeta"), blob("alpha"), blob("mid")])
            .unwrap();
        assert_eq!(n, 3);

        let names: Vec<String> = store
            .get_all_rows()
            .unwrap()
            .iter()
            .map(|b| b["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_batch_rejects_unnamed_without_writing() {
        let mut store = SiteStore::open_in_memory().unwrap();
        let err = store
            .batch_update_rows(&[blob("a"), json!({ "url": {} })])
            .unwrap_err();
        assert!(matches!(err, TopSitesError::Storage(_)));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_delete() {
        let store = SiteStore::open_in_memory().unwrap();
        store.put(&blob("a")).unwrap();
        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sites.db");
        {
            let store = SiteStore::open(&path).unwrap();
            store.put(&blob("a")).unwrap();
        }
        let store = SiteStore::open(&path).unwrap();
        assert_eq!(store.get_all_rows().unwrap().len(), 1);
    }
}
