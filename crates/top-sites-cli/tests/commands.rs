use serde_json::json;
use top_sites::collect::scrape::A_LINK_URL;
use top_sites::url::derive_cache_filename;
use top_sites::{FetchMode, HttpClient, Pipeline, Site, SiteStore};
use top_sites_cli::commands;

fn sites() -> Vec<serde_json::Value> {
    vec![
        json!({
            "name": "Example Blog",
            "url": { "protocol": "https://", "subdomain": "blog", "domain": "example.com" },
            "directives": { "scrape1": { "type": "scrape_newest", "parameters": ["a"] } }
        }),
        json!({
            "name": "Other Blog",
            "url": { "domain": "other.org", "path": "/news" },
            "directives": { "scrape1": { "type": "scrape_newest", "parameters": ["a"] } }
        }),
    ]
}

#[test]
fn test_validate_reports_each_site() {
    let mut blobs = sites();
    blobs.push(json!({ "name": "Bad", "url": { "domain": "bad.com" }, "colour": "red" }));

    let results = commands::validate(&blobs);
    assert_eq!(results.len(), 3);
    assert!(results[0].error.is_none());
    assert!(results[1].error.is_none());
    assert_eq!(results[2].name, "Bad");
    assert!(results[2].error.is_some());
}

#[test]
fn test_import_is_all_or_nothing() {
    let mut store = SiteStore::open_in_memory().unwrap();
    let mut blobs = sites();
    blobs.push(json!({ "name": "Bad", "url": {} }));

    assert!(commands::import(&mut store, &blobs).is_err());
    assert!(store.is_empty().unwrap());

    assert_eq!(commands::import(&mut store, &sites()).unwrap(), 2);
    let stored = store.get("Other Blog").unwrap().unwrap();
    assert_eq!(stored["url"]["protocol"], "http://");
}

#[tokio::test]
async fn test_run_only_and_render() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    std::fs::create_dir_all(&cache).unwrap();

    let mut store = SiteStore::open_in_memory().unwrap();
    commands::import(&mut store, &sites()).unwrap();

    let example = Site::from_value(sites()[0].clone()).unwrap();
    std::fs::write(
        derive_cache_filename(&example.url, &cache),
        r#"<html><body><a href="/first">First</a></body></html>"#,
    )
    .unwrap();

    let pipeline = Pipeline::new(HttpClient::default())
        .with_fetch_mode(FetchMode::CachedFile { cache_dir: cache });
    let report = commands::run(&mut store, &pipeline, &["Example Blog".to_string()])
        .await
        .unwrap();
    assert_eq!(report.sites.len(), 1);
    assert!(report.is_clean());

    let stored = store.get("Example Blog").unwrap().unwrap();
    assert_eq!(
        stored["data"]["scrape1"][A_LINK_URL][0]["payload"],
        "https://blog.example.com/first"
    );
    // untouched site has no data yet
    assert!(store.get("Other Blog").unwrap().unwrap().get("data").is_none());

    let out = dir.path().join("site").join("index.html");
    assert_eq!(commands::render(&store, &out).unwrap(), 2);
    let html = std::fs::read_to_string(out).unwrap();
    assert!(html.contains("https://blog.example.com/first"));
    assert!(html.contains("Other Blog"));
}

#[tokio::test]
async fn test_reimport_keeps_collected_data() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    std::fs::create_dir_all(&cache).unwrap();

    let mut store = SiteStore::open_in_memory().unwrap();
    commands::import(&mut store, &sites()).unwrap();

    let example = Site::from_value(sites()[0].clone()).unwrap();
    std::fs::write(
        derive_cache_filename(&example.url, &cache),
        r#"<html><body><a href="/first">First</a></body></html>"#,
    )
    .unwrap();
    let pipeline = Pipeline::new(HttpClient::default())
        .with_fetch_mode(FetchMode::CachedFile { cache_dir: cache });
    commands::run(&mut store, &pipeline, &[]).await.unwrap();
    let before = store.get("Example Blog").unwrap().unwrap();
    assert!(before["elapsed_seconds"].is_number());

    let mut edited = sites();
    edited[0]["directives"]["scrape1"]["parameters"] = json!(["body", "a"]);
    assert_eq!(commands::import(&mut store, &edited).unwrap(), 2);

    let after = store.get("Example Blog").unwrap().unwrap();
    assert_eq!(after["directives"]["scrape1"]["parameters"], json!(["body", "a"]));
    assert_eq!(after["data"], before["data"]);
    assert_eq!(
        after["data"]["scrape1"][A_LINK_URL][0]["payload"],
        "https://blog.example.com/first"
    );
    assert_eq!(after["elapsed_seconds"], before["elapsed_seconds"]);
}
