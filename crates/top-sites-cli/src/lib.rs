//! Top Sites CLI: import site configurations, run the collection batch,
//! and render the ranked report.

pub mod commands;
pub mod config;

pub use config::{load_sites_file, resolve_db_path};
