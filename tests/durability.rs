//! Dual-store durability: the JSONL log is the source of truth, and
//! loading it tolerates unknown fields from a newer generation and skips
//! malformed lines outright (spec.md §4.11, §7).

use cupboard::{Backend, Config, Cupboard, Filter, Table};
use std::fs;
use tempfile::TempDir;

fn config(dir: &TempDir) -> Config {
    Config { backend: Backend::Sqlite, data_dir: dir.path().to_path_buf() }
}

#[test]
fn forward_compatible_and_malformed_lines_are_tolerated_on_attach() {
    let dir = TempDir::new().unwrap();

    // Seed a crumbs.jsonl by hand before the first attach: one well-formed
    // row, one with an unknown future field, one outright malformed line.
    fs::write(
        dir.path().join("crumbs.jsonl"),
        concat!(
            r#"{"crumb_id":"c1","name":"Known","state":"draft","created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z","properties":{}}"#,
            "\n",
            r#"{"crumb_id":"c2","name":"FromTheFuture","state":"ready","created_at":"2024-01-02T00:00:00Z","updated_at":"2024-01-02T00:00:00Z","properties":{},"not_yet_invented_field":42}"#,
            "\n",
            "{{{ not json at all\n",
        ),
    )
    .unwrap();

    let cupboard = Cupboard::new();
    cupboard.attach(&config(&dir)).unwrap();

    let rows = cupboard.fetch(Table::Crumbs, &Filter::new()).unwrap();
    assert_eq!(rows.len(), 2, "malformed line skipped, both valid rows loaded");
    let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"Known"));
    assert!(names.contains(&"FromTheFuture"));
}

#[test]
fn jsonl_rewrite_on_mutation_strips_the_unknown_field() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("crumbs.jsonl"),
        concat!(
            r#"{"crumb_id":"c1","name":"A","state":"draft","created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z","properties":{},"future_field":"drop me"}"#,
            "\n",
        ),
    )
    .unwrap();

    let cupboard = Cupboard::new();
    cupboard.attach(&config(&dir)).unwrap();
    cupboard.set(Table::Crumbs, None, serde_json::json!({ "name": "B" })).unwrap();

    let content = fs::read_to_string(dir.path().join("crumbs.jsonl")).unwrap();
    assert!(!content.contains("future_field"), "rewriting the table must not preserve unknown fields");
    assert!(content.contains("\"name\":\"A\""));
    assert!(content.contains("\"name\":\"B\""));
}

#[test]
fn detach_then_reattach_round_trips_every_table() {
    let dir = TempDir::new().unwrap();
    let cupboard = Cupboard::new();
    cupboard.attach(&config(&dir)).unwrap();

    let trail_id = cupboard.set(Table::Trails, None, serde_json::json!({})).unwrap();
    let crumb_id = cupboard.set(Table::Crumbs, None, serde_json::json!({ "name": "round trip" })).unwrap();
    cupboard
        .set(Table::Links, None, serde_json::json!({ "link_type": "belongs_to", "from_id": crumb_id, "to_id": trail_id }))
        .unwrap();

    cupboard.detach().unwrap();

    let cupboard = Cupboard::new();
    cupboard.attach(&config(&dir)).unwrap();

    assert_eq!(cupboard.fetch(Table::Trails, &Filter::new()).unwrap().len(), 1);
    assert_eq!(cupboard.fetch(Table::Crumbs, &Filter::new()).unwrap().len(), 1);
    assert_eq!(cupboard.fetch(Table::Links, &Filter::new()).unwrap().len(), 1);
}
