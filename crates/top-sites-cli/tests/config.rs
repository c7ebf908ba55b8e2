use std::path::PathBuf;

use top_sites_cli::config::{load_sites_file, resolve_db_path, DB_ENV};

#[test]
fn test_explicit_db_path_wins() {
    std::env::set_var(DB_ENV, "/tmp/from-env.db");
    assert_eq!(
        resolve_db_path(Some("/tmp/explicit.db")),
        PathBuf::from("/tmp/explicit.db")
    );
    assert_eq!(resolve_db_path(None), PathBuf::from("/tmp/from-env.db"));
    std::env::remove_var(DB_ENV);

    let fallback = resolve_db_path(None);
    assert!(fallback.ends_with(".top-sites/sites.db"));
}

#[test]
fn test_load_sites_array_and_object() {
    let dir = tempfile::tempdir().unwrap();

    let array = dir.path().join("array.json");
    std::fs::write(&array, r#"[{"name": "a"}, {"name": "b"}]"#).unwrap();
    assert_eq!(load_sites_file(&array).unwrap().len(), 2);

    let object = dir.path().join("object.json");
    std::fs::write(&object, r#"{"sites": [{"name": "a"}]}"#).unwrap();
    assert_eq!(load_sites_file(&object).unwrap().len(), 1);
}

#[test]
fn test_load_sites_rejects_other_shapes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");

    std::fs::write(&path, r#"{"name": "a"}"#).unwrap();
    assert!(load_sites_file(&path).is_err());

    std::fs::write(&path, "not json").unwrap();
    assert!(load_sites_file(&path).is_err());

    assert!(load_sites_file(&dir.path().join("missing.json")).is_err());
}
