//! HTML report: one row per site, ranked by authority.
//!
//! The page is built with `maud`. Values are escaped on output, except the
//! data points in [`PRE_ESCAPED`], which were escaped when collected.

use std::cmp::Ordering;
use std::path::Path;

use chrono::{DateTime, Utc};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use serde_json::Value;

use crate::collect::moz::{AUTHORITY, MOZRANK};
use crate::collect::scrape::{A_LINK_TEXT, A_LINK_URL};
use crate::collect::twitter::{MOST_FOLLOWED_COUNT, MOST_FOLLOWED_NAME, TWEETS, TWEETS_FOLLOWERS};
use crate::site::Site;
use crate::types::TopSitesResult;

const STYLE: &str = include_str!("../assets/report.css");
const SORT_SCRIPT: &str = include_str!("../assets/sort_rows.js");

/// Data points escaped when they were collected.
pub const PRE_ESCAPED: &[&str] = &[A_LINK_TEXT, MOST_FOLLOWED_NAME];

/// Most recent successful payload for a data point, searching every branch
/// in directive order.
pub fn latest_ok<'a>(site: &'a Site, data_name: &str) -> Option<&'a Value> {
    site.data
        .values()
        .filter_map(|branch| branch.get(data_name))
        .find_map(|history| {
            history
                .iter()
                .find(|r| r.status.is_ok())
                .and_then(|r| r.payload.as_ref())
        })
}

fn authority(site: &Site) -> Option<f64> {
    latest_ok(site, AUTHORITY).and_then(Value::as_f64)
}

/// Sites by authority descending; sites without one go last. Ties break on name.
pub fn rank(sites: &[Site]) -> Vec<&Site> {
    let mut ranked: Vec<&Site> = sites.iter().collect();
    ranked.sort_by(|a, b| {
        let by_authority = match (authority(a), authority(b)) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_authority.then_with(|| a.name.cmp(&b.name))
    });
    ranked
}

/// Render the full page.
pub fn render(sites: &[Site], last_updated: DateTime<Utc>) -> String {
    page(sites, last_updated).into_string()
}

/// Page markup: sortable table with the ranked rows.
pub fn page(sites: &[Site], last_updated: DateTime<Utc>) -> Markup {
    let stamp = last_updated.format("%Y-%m-%d %H:%M UTC").to_string();
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { "Top Sites" }
                style { (PreEscaped(STYLE)) }
                script { (PreEscaped(SORT_SCRIPT)) }
            }
            body {
                h1 { "Top Sites" }
                p { "Last updated " (stamp) }
                table {
                    thead {
                        tr {
                            th onclick="sortRows('data-rank')" { "Rank" }
                            th onclick="sortRows('data-name')" { "Site" }
                            th { "Newest post" }
                            th onclick="sortRows('data-authority')" { "Authority" }
                            th onclick="sortRows('data-mozrank')" { "MozRank" }
                            th onclick="sortRows('data-tweets')" { "Tweets" }
                            th onclick="sortRows('data-tweets-followers')" { "Followers reached" }
                            th onclick="sortRows('data-most-followed-count')" { "Most followed" }
                        }
                    }
                    tbody data-sorted-by="data-rank" {
                        @for (i, site) in rank(sites).into_iter().enumerate() {
                            (row(i + 1, site))
                        }
                    }
                }
            }
        }
    }
}

/// One table row for `site` at `rank` (1-based).
pub fn row(rank: usize, site: &Site) -> Markup {
    let authority = cell(site, AUTHORITY);
    let mozrank = cell(site, MOZRANK);
    let tweets = cell(site, TWEETS);
    let followers = cell(site, TWEETS_FOLLOWERS);
    let most_followed_count = cell(site, MOST_FOLLOWED_COUNT);

    html! {
        tr class="sitesRow"
            data-rank=(rank)
            data-name=(site.name)
            data-authority=(authority)
            data-mozrank=(mozrank)
            data-tweets=(tweets)
            data-tweets-followers=(followers)
            data-most-followed-count=(most_followed_count)
        {
            td class="num" { (rank) }
            td { a href=(site.url.full_url) { (site.name) } }
            td { a href=(cell(site, A_LINK_URL)) { (PreEscaped(cell(site, A_LINK_TEXT))) } }
            td class="num" { (authority) }
            td class="num" { (mozrank) }
            td class="num" { (tweets) }
            td class="num" { (followers) }
            td { (PreEscaped(cell(site, MOST_FOLLOWED_NAME))) " (" (most_followed_count) ")" }
        }
    }
}

/// Write the rendered page, creating parent directories.
pub fn write_report(path: &Path, html: &str) -> TopSitesResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, html)?;
    tracing::info!(path = %path.display(), bytes = html.len(), "Report written");
    Ok(())
}

/// Display text for a data point, or empty when it has never succeeded.
fn cell(site: &Site, data_name: &str) -> String {
    latest_ok(site, data_name).map(display_value).unwrap_or_default()
}

/// Whole numbers print without a fraction; others round to two places.
fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 => format!("{f:.0}"),
            (None, Some(f)) => format!("{f:.2}"),
            _ => n.to_string(),
        },
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{normalize, Status};
    use serde_json::json;

    fn site(name: &str, authority: Option<f64>) -> Site {
        let mut site = Site::from_value(json!({
            "name": name,
            "url": { "domain": format!("{}.com", name.to_lowercase()) },
            "directives": {}
        }))
        .unwrap();
        if let Some(a) = authority {
            let record = normalize(Some(json!(a)), AUTHORITY, Utc::now(), Status::Ok);
            crate::history::merge(vec![record], &mut site.data, "moz1", 5);
        }
        site
    }

    #[test]
    fn test_rank_by_authority_then_name() {
        let sites = vec![
            site("Beta", Some(40.0)),
            site("Zed", None),
            site("Alpha", Some(40.0)),
            site("Gamma", Some(90.0)),
        ];
        let names: Vec<&str> = rank(&sites).iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Gamma", "Alpha", "Beta", "Zed"]);
    }

    #[test]
    fn test_latest_ok_skips_failures() {
        let mut s = site("Alpha", Some(40.0));
        let failed = normalize(None, AUTHORITY, Utc::now(), Status::Failed("boom".into()));
        crate::history::merge(vec![failed], &mut s.data, "moz1", 5);
        assert_eq!(s.data["moz1"][AUTHORITY].len(), 2);
        assert_eq!(latest_ok(&s, AUTHORITY), Some(&json!(40.0)));
    }

    #[test]
    fn test_row_escapes_and_formats() {
        let mut s = site("A&B", Some(55.0));
        let records = vec![
            normalize(Some(json!("Fish &amp; Chips")), A_LINK_TEXT, Utc::now(), Status::Ok),
            normalize(Some(json!("https://a.com/?x=1&y=2")), A_LINK_URL, Utc::now(), Status::Ok),
        ];
        crate::history::merge(records, &mut s.data, "scrape1", 5);
        crate::history::merge(
            vec![normalize(Some(json!(5.234)), MOZRANK, Utc::now(), Status::Ok)],
            &mut s.data,
            "moz1",
            5,
        );

        let html = row(3, &s).into_string();
        assert!(html.starts_with("<tr class=\"sitesRow\" data-rank=\"3\""));
        assert!(html.contains("data-name=\"A&amp;B\""));
        assert!(html.contains("data-authority=\"55\""));
        assert!(html.contains("data-mozrank=\"5.23\""));
        assert!(html.contains("data-tweets=\"\""));
        assert!(html.contains("<a href=\"https://a.com/?x=1&amp;y=2\">Fish &amp; Chips</a>"));
        assert!(html.contains(">A&amp;B</a>"));
        assert!(!html.contains("&amp;amp;"));
    }

    #[test]
    fn test_row_keeps_collected_markup_escaped_once() {
        let mut s = site("Alpha", None);
        crate::history::merge(
            vec![
                normalize(Some(json!("bob &amp; co")), MOST_FOLLOWED_NAME, Utc::now(), Status::Ok),
                normalize(Some(json!(900)), MOST_FOLLOWED_COUNT, Utc::now(), Status::Ok),
            ],
            &mut s.data,
            "twitter1",
            5,
        );
        let html = row(1, &s).into_string();
        assert!(html.contains("<td>bob &amp; co (900)</td>"));
    }

    #[test]
    fn test_render_page() {
        let sites = vec![site("Alpha", Some(10.0)), site("Beta", Some(20.0))];
        let when = DateTime::parse_from_rfc3339("2024-05-01T12:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let html = render(&sites, when);

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Last updated 2024-05-01 12:30 UTC"));
        assert!(html.contains("function sortRows"));
        assert!(html.contains("<tbody data-sorted-by=\"data-rank\">"));
        let beta = html.find("data-name=\"Beta\"").unwrap();
        let alpha = html.find("data-name=\"Alpha\"").unwrap();
        assert!(beta < alpha);
    }

    #[test]
    fn test_write_report_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("index.html");
        write_report(&path, "<html></html>").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<html></html>");
    }
}
