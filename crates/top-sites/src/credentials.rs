//! API credentials for the Moz and Twitter collectors.
//!
//! Credentials are loaded from (in order of priority):
//! 1. `TOP_SITES_CREDENTIALS_FILE` env → a JSON file with `moz` and/or `twitter` sections
//! 2. Individual env vars: `TOP_SITES_MOZ_ACCESS_ID`, `TOP_SITES_MOZ_SECRET_KEY`,
//!    `TOP_SITES_TWITTER_BEARER_TOKEN`
//!
//! A collector whose credentials are missing cannot run at all; that is
//! reported as a [`TopSitesError::Credentials`] instead of a failed record.

use std::path::Path;

use serde::Deserialize;

use crate::types::{TopSitesError, TopSitesResult};

pub const CREDENTIALS_FILE_ENV: &str = "TOP_SITES_CREDENTIALS_FILE";
pub const MOZ_ACCESS_ID_ENV: &str = "TOP_SITES_MOZ_ACCESS_ID";
pub const MOZ_SECRET_KEY_ENV: &str = "TOP_SITES_MOZ_SECRET_KEY";
pub const TWITTER_BEARER_TOKEN_ENV: &str = "TOP_SITES_TWITTER_BEARER_TOKEN";

/// Moz access ID and shared secret.
#[derive(Clone, Deserialize)]
pub struct MozCredentials {
    pub access_id: String,
    pub secret_key: String,
}

/// App-only bearer token for the Twitter search API.
#[derive(Clone, Deserialize)]
pub struct TwitterCredentials {
    pub bearer_token: String,
}

// Secrets stay out of logs.
impl std::fmt::Debug for MozCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MozCredentials")
            .field("access_id", &self.access_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl std::fmt::Debug for TwitterCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterCredentials")
            .field("bearer_token", &"<redacted>")
            .finish()
    }
}

/// Everything that was found; either section may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub moz: Option<MozCredentials>,
    #[serde(default)]
    pub twitter: Option<TwitterCredentials>,
}

impl Credentials {
    /// Resolve credentials from the environment.
    pub fn from_env() -> TopSitesResult<Self> {
        if let Ok(path) = std::env::var(CREDENTIALS_FILE_ENV) {
            return Self::from_file(Path::new(&path));
        }

        let moz = match (
            non_empty_var(MOZ_ACCESS_ID_ENV),
            non_empty_var(MOZ_SECRET_KEY_ENV),
        ) {
            (Some(access_id), Some(secret_key)) => Some(MozCredentials {
                access_id,
                secret_key,
            }),
            _ => None,
        };
        let twitter =
            non_empty_var(TWITTER_BEARER_TOKEN_ENV).map(|bearer_token| TwitterCredentials {
                bearer_token,
            });

        Ok(Self { moz, twitter })
    }

    /// Read credentials from a JSON file.
    pub fn from_file(path: &Path) -> TopSitesResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            TopSitesError::Credentials(format!(
                "cannot read credentials file '{}': {e}",
                path.display()
            ))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            TopSitesError::Credentials(format!(
                "invalid credentials file '{}': {e}",
                path.display()
            ))
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
