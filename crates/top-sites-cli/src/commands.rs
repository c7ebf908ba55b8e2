//! Subcommand implementations, kept out of `main` so they can be tested.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;

use top_sites::report;
use top_sites::site::site_name;
use top_sites::{BatchReport, Pipeline, Site, SiteStore, TopSitesError};

/// Default report file.
pub const DEFAULT_REPORT: &str = "index.html";

/// Per-site outcome of validating a sites file.
#[derive(Debug)]
pub struct Validation {
    pub name: String,
    pub error: Option<TopSitesError>,
}

/// Check every blob; nothing is written.
pub fn validate(blobs: &[Value]) -> Vec<Validation> {
    blobs
        .iter()
        .map(|blob| Validation {
            name: site_name(blob),
            error: Site::from_value(blob.clone()).err(),
        })
        .collect()
}

/// Validate and upsert every site. Returns how many were stored.
///
/// Nothing is written when any site is invalid. A site already in the store
/// keeps its collected `data` and `elapsed_seconds` unless the imported blob
/// carries its own.
pub fn import(store: &mut SiteStore, blobs: &[Value]) -> Result<usize> {
    let mut sites = Vec::with_capacity(blobs.len());
    for blob in blobs {
        let site = Site::from_value(blob.clone())
            .with_context(|| format!("cannot import site '{}'", site_name(blob)))?;
        let mut config = site.to_config();

        let stored = store
            .get(&config.name)
            .with_context(|| format!("failed to read stored site '{}'", config.name))?;
        if let Some(stored) = stored {
            match Site::from_value(stored) {
                Ok(previous) => {
                    if config.data.is_empty() {
                        config.data = previous.data;
                    }
                    config.elapsed_seconds = config.elapsed_seconds.or(previous.elapsed_seconds);
                }
                Err(e) => {
                    tracing::warn!(site = %config.name, error = %e, "Replacing unreadable stored site");
                }
            }
        }

        sites.push(serde_json::to_value(config)?);
    }
    let n = store.batch_update_rows(&sites).context("failed to store sites")?;
    tracing::info!(sites = n, "Imported sites");
    Ok(n)
}

/// Run the pipeline over stored sites (all, or only the named ones) and
/// persist every site that was processed.
pub async fn run(store: &mut SiteStore, pipeline: &Pipeline, only: &[String]) -> Result<BatchReport> {
    let rows: Vec<Value> = store
        .get_all_rows()
        .context("failed to load sites")?
        .into_iter()
        .filter(|row| only.is_empty() || only.contains(&site_name(row)))
        .collect();

    if rows.is_empty() {
        tracing::warn!("No sites to process");
    }

    let report = pipeline.run_batch(rows).await;

    let blobs = report
        .sites
        .iter()
        .map(|site| serde_json::to_value(site.to_config()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    store
        .batch_update_rows(&blobs)
        .context("failed to persist processed sites")?;

    Ok(report)
}

/// Render every stored site into `out`. Rows that no longer parse are skipped.
pub fn render(store: &SiteStore, out: &Path) -> Result<usize> {
    let mut sites = Vec::new();
    for row in store.get_all_rows().context("failed to load sites")? {
        let name = site_name(&row);
        match Site::from_value(row) {
            Ok(site) => sites.push(site),
            Err(e) => tracing::warn!(site = %name, error = %e, "Leaving site out of report"),
        }
    }

    let html = report::render(&sites, Utc::now());
    report::write_report(out, &html)
        .with_context(|| format!("cannot write report to '{}'", out.display()))?;
    Ok(sites.len())
}

/// Report path, defaulting to [`DEFAULT_REPORT`] in the working directory.
pub fn report_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT))
}
