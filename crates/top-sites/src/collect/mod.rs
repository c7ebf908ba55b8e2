//! Collectors: one module per external data source.
//!
//! Every collector returns uniformly shaped [`Record`](crate::record::Record)s
//! and encodes its own failures into their status.

pub mod moz;
pub mod scrape;
pub mod twitter;

pub use moz::MozClient;
pub use scrape::{scrape_newest, FetchMode};
pub use twitter::TwitterClient;
