//! Stash mutation wrappers and their history trail (spec.md §4.9).

use cupboard::{Backend, Config, Cupboard, Table};
use tempfile::TempDir;

fn attached() -> (TempDir, Cupboard) {
    let dir = TempDir::new().unwrap();
    let cupboard = Cupboard::new();
    cupboard
        .attach(&Config { backend: Backend::Sqlite, data_dir: dir.path().to_path_buf() })
        .unwrap();
    (dir, cupboard)
}

fn new_stash(cupboard: &Cupboard, stash_type: &str) -> String {
    cupboard
        .set(Table::Stashes, None, serde_json::json!({ "name": "s", "stash_type": stash_type }))
        .unwrap()
}

#[test]
fn counter_increments_accumulate_and_are_recorded_in_history() {
    let (_dir, cupboard) = attached();
    let id = new_stash(&cupboard, "counter");

    cupboard.stash_increment(&id, 5).unwrap();
    let stash = cupboard.stash_increment(&id, 7).unwrap();

    assert_eq!(stash.value, serde_json::json!({ "value": 12 }));
    let history = cupboard.stash_history(&id).unwrap();
    assert_eq!(history.len(), 3, "create + two increments");
    assert_eq!(history.last().unwrap().value, serde_json::json!({ "value": 12 }));
}

#[test]
fn lock_acquire_is_reentrant_for_the_current_holder() {
    let (_dir, cupboard) = attached();
    let id = new_stash(&cupboard, "lock");

    let first = cupboard.stash_acquire(&id, "alice").unwrap();
    let second = cupboard.stash_acquire(&id, "alice").unwrap();
    assert_eq!(first.version, second.version);

    let history = cupboard.stash_history(&id).unwrap();
    assert_eq!(history.len(), 2, "create + one acquire, no duplicate row for the reentrant call");
}

#[test]
fn lock_contention_is_rejected_until_released() {
    let (_dir, cupboard) = attached();
    let id = new_stash(&cupboard, "lock");

    cupboard.stash_acquire(&id, "alice").unwrap();
    let err = cupboard.stash_acquire(&id, "bob").unwrap_err();
    assert!(matches!(err, cupboard::CupboardError::LockHeld));

    cupboard.stash_release(&id, "alice").unwrap();
    cupboard.stash_acquire(&id, "bob").unwrap();
}

#[test]
fn set_value_is_rejected_for_counter_and_lock_stashes() {
    let (_dir, cupboard) = attached();
    let counter_id = new_stash(&cupboard, "counter");
    let err = cupboard.stash_set_value(&counter_id, serde_json::json!("x")).unwrap_err();
    assert!(matches!(err, cupboard::CupboardError::InvalidStashType(_)));

    let resource_id = new_stash(&cupboard, "resource");
    cupboard.stash_set_value(&resource_id, serde_json::json!({ "path": "/tmp/x" })).unwrap();
}

#[test]
fn deleting_a_stash_clears_its_history() {
    let (_dir, cupboard) = attached();
    let id = new_stash(&cupboard, "counter");
    cupboard.stash_increment(&id, 1).unwrap();

    cupboard.delete(Table::Stashes, &id).unwrap();

    let err = cupboard.stash_history(&id).unwrap_err();
    assert!(matches!(err, cupboard::CupboardError::NotFound));
}
