//! Configuration loading and resolution.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::Value;

/// Env var naming the site database.
pub const DB_ENV: &str = "TOP_SITES_DB";

const DB_RELATIVE: &str = ".top-sites/sites.db";

/// Resolve the site database path.
pub fn resolve_db_path(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Ok(env_path) = std::env::var(DB_ENV) {
        if !env_path.trim().is_empty() {
            return PathBuf::from(env_path);
        }
    }

    let cwd_db = PathBuf::from(DB_RELATIVE);
    if cwd_db.exists() {
        return cwd_db;
    }

    resolve_default_db_path()
}

fn resolve_default_db_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());

    Path::new(&home).join(DB_RELATIVE)
}

/// Read a sites file: a JSON array of site blobs, or an object with a
/// `sites` array.
pub fn load_sites_file(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read sites file '{}'", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("'{}' is not valid JSON", path.display()))?;

    match value {
        Value::Array(sites) => Ok(sites),
        Value::Object(mut obj) => match obj.remove("sites") {
            Some(Value::Array(sites)) => Ok(sites),
            _ => bail!("'{}' has no \"sites\" array", path.display()),
        },
        _ => bail!("'{}' must hold a JSON array of sites", path.display()),
    }
}
