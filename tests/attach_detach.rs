//! Attach/detach lifecycle (spec.md §2): JSONL files and seed properties
//! appear on attach; the index file disappears on detach but the JSONL
//! log survives.

use cupboard::{Backend, Config, Cupboard, Filter, Table};
use tempfile::TempDir;

#[test]
fn content_hash_is_present_for_a_live_row_and_errors_for_missing_or_composite_keys() {
    let dir = TempDir::new().unwrap();
    let cupboard = Cupboard::new();
    cupboard.attach(&config(&dir)).unwrap();

    let crumb_id = cupboard.set(Table::Crumbs, None, serde_json::json!({ "name": "hashed" })).unwrap();
    let hash = cupboard.content_hash(Table::Crumbs, &crumb_id).unwrap();
    assert_eq!(hash.len(), 16);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));

    assert!(cupboard.content_hash(Table::Crumbs, "does-not-exist").is_err());
    assert!(cupboard.content_hash(Table::CrumbProperties, "whatever").is_err());
}

fn config(dir: &TempDir) -> Config {
    Config { backend: Backend::Sqlite, data_dir: dir.path().to_path_buf() }
}

#[test]
fn attach_creates_jsonl_files_and_seeds_properties() {
    let dir = TempDir::new().unwrap();
    let cupboard = Cupboard::new();
    cupboard.attach(&config(&dir)).unwrap();

    for table in ["crumbs", "trails", "links", "properties", "categories", "crumb_properties", "metadata", "stashes", "stash_history"] {
        assert!(dir.path().join(format!("{table}.jsonl")).exists(), "missing jsonl for {table}");
    }
    assert!(dir.path().join("index.db").exists());

    let properties = cupboard.fetch(Table::Properties, &Filter::new()).unwrap();
    assert!(properties.len() >= 5, "seed properties should be present");
    let names: Vec<&str> = properties.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"priority"));
    assert!(names.contains(&"type"));
}

#[test]
fn double_attach_is_rejected() {
    let dir = TempDir::new().unwrap();
    let cupboard = Cupboard::new();
    cupboard.attach(&config(&dir)).unwrap();
    let err = cupboard.attach(&config(&dir)).unwrap_err();
    assert!(matches!(err, cupboard::CupboardError::AlreadyAttached));
}

#[test]
fn operations_before_attach_are_rejected() {
    let cupboard = Cupboard::new();
    let err = cupboard.fetch(Table::Crumbs, &Filter::new()).unwrap_err();
    assert!(matches!(err, cupboard::CupboardError::CupboardDetached));
}

#[test]
fn detach_removes_index_but_keeps_jsonl_log() {
    let dir = TempDir::new().unwrap();
    let cupboard = Cupboard::new();
    cupboard.attach(&config(&dir)).unwrap();
    cupboard
        .set(Table::Crumbs, None, serde_json::json!({ "name": "survives detach" }))
        .unwrap();
    cupboard.detach().unwrap();

    assert!(!dir.path().join("index.db").exists());
    let content = std::fs::read_to_string(dir.path().join("crumbs.jsonl")).unwrap();
    assert!(content.contains("survives detach"));

    let cupboard = Cupboard::new();
    cupboard.attach(&config(&dir)).unwrap();
    let rows = cupboard.fetch(Table::Crumbs, &Filter::new()).unwrap();
    assert_eq!(rows.len(), 1, "reattaching should rebuild the index from the JSONL log");
}
