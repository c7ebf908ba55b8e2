//! Top Sites: directive-driven collection of newest posts, SEO metrics and
//! social engagement for a curated list of sites, with bounded history and
//! a ranked HTML report.
//!
//! Nothing runs at load time: build a [`Pipeline`], feed it site blobs, and
//! persist the results with a [`SiteStore`].

pub mod collect;
pub mod credentials;
pub mod history;
pub mod http;
pub mod record;
pub mod report;
pub mod site;
pub mod storage;
pub mod types;
pub mod url;

pub use collect::{FetchMode, MozClient, TwitterClient};
pub use credentials::{Credentials, MozCredentials, TwitterCredentials};
pub use history::{merge, prune, DEFAULT_RETENTION};
pub use http::HttpClient;
pub use record::{normalize, Record, Status};
pub use site::{BatchReport, Pipeline, Site, SiteFailure};
pub use storage::SiteStore;
pub use types::*;
pub use url::{derive_cache_filename, tidy, SiteUrl};
