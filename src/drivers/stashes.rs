//! Stashes driver (spec.md §4.9): typed shared cells plus their
//! append-only history, and the mutation wrappers (`set_value`,
//! `increment`, `acquire`, `release`) that apply a `Stash` entity method
//! and persist the result in one step.

use crate::dirty::DirtySet;
use crate::error::{CupboardError, Result};
use crate::filter::{paginate, Filter};
use crate::hash::content_hash;
use crate::id::new_id;
use crate::model::{Stash, StashHistory, StashOperation, StashType};
use chrono::Utc;
use rusqlite::{params, Transaction};
use std::str::FromStr;

pub const TABLE: &str = "stashes";
pub const HISTORY_TABLE: &str = "stash_history";
pub const FILTER_KEYS: &[&str] = &["stash_type", "name"];

fn row_to_stash(row: &rusqlite::Row) -> rusqlite::Result<Stash> {
    let stash_type_str: String = row.get("stash_type")?;
    let last_operation_str: String = row.get("last_operation")?;
    let value_json: String = row.get("value")?;
    Ok(Stash {
        stash_id: row.get("stash_id")?,
        name: row.get("name")?,
        stash_type: StashType::from_str(&stash_type_str).unwrap_or_default(),
        value: serde_json::from_str(&value_json).unwrap_or(serde_json::Value::Null),
        version: row.get("version")?,
        created_at: row.get::<_, String>("created_at")?.parse().unwrap_or_else(|_| Utc::now()),
        last_operation: StashOperation::from_str(&last_operation_str).unwrap_or_default(),
    })
}

fn row_to_history(row: &rusqlite::Row) -> rusqlite::Result<StashHistory> {
    let operation_str: String = row.get("operation")?;
    let value_json: String = row.get("value")?;
    Ok(StashHistory {
        history_id: row.get("history_id")?,
        stash_id: row.get("stash_id")?,
        version: row.get("version")?,
        operation: StashOperation::from_str(&operation_str).unwrap_or_default(),
        value: serde_json::from_str(&value_json).unwrap_or(serde_json::Value::Null),
        created_at: row.get::<_, String>("created_at")?.parse().unwrap_or_else(|_| Utc::now()),
    })
}

fn upsert(tx: &Transaction, dirty: &mut DirtySet, stash: &Stash) -> Result<()> {
    let value_json = serde_json::to_string(&stash.value)?;
    let hash = content_hash(&serde_json::to_value(stash)?);
    tx.execute(
        "INSERT INTO stashes (stash_id, name, stash_type, value, version, created_at, last_operation, content_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(stash_id) DO UPDATE SET
            value = excluded.value,
            version = excluded.version,
            last_operation = excluded.last_operation,
            content_hash = excluded.content_hash",
        params![
            stash.stash_id,
            stash.name,
            stash.stash_type.as_str(),
            value_json,
            stash.version,
            stash.created_at.to_rfc3339(),
            stash.last_operation.as_str(),
            hash,
        ],
    )?;
    dirty.insert(TABLE);
    Ok(())
}

fn append_history(tx: &Transaction, dirty: &mut DirtySet, stash: &Stash) -> Result<()> {
    let value_json = serde_json::to_string(&stash.value)?;
    let row = StashHistory {
        history_id: new_id(),
        stash_id: stash.stash_id.clone(),
        version: stash.version,
        operation: stash.last_operation,
        value: stash.value.clone(),
        created_at: Utc::now(),
    };
    let hash = content_hash(&serde_json::to_value(&row)?);
    tx.execute(
        "INSERT INTO stash_history (history_id, stash_id, version, operation, value, created_at, content_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![row.history_id, row.stash_id, row.version, row.operation.as_str(), value_json, row.created_at.to_rfc3339(), hash],
    )?;
    dirty.insert(HISTORY_TABLE);
    Ok(())
}

pub fn get(tx: &Transaction, id: &str) -> Result<Stash> {
    if id.is_empty() {
        return Err(CupboardError::InvalidID);
    }
    tx.query_row("SELECT * FROM stashes WHERE stash_id = ?1", params![id], row_to_stash)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => CupboardError::NotFound,
            other => other.into(),
        })
}

pub fn list_all(tx: &Transaction) -> Result<Vec<Stash>> {
    let mut stmt = tx.prepare("SELECT * FROM stashes ORDER BY created_at ASC, stash_id ASC")?;
    let rows = stmt.query_map([], row_to_stash)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn fetch(tx: &Transaction, filter: &Filter) -> Result<Vec<Stash>> {
    filter.validate_keys(FILTER_KEYS)?;
    let stash_type = filter.string("stash_type")?.and_then(|s| StashType::from_str(&s).ok());
    let name = filter.string("name")?;
    let mut rows = list_all(tx)?;
    if let Some(st) = stash_type {
        rows.retain(|s| s.stash_type == st);
    }
    if let Some(name) = name {
        rows.retain(|s| s.name == name);
    }
    Ok(paginate(rows, filter.offset()?, filter.limit()?))
}

/// Fetch the full history for a stash, oldest version first.
pub fn fetch_history(tx: &Transaction, stash_id: &str) -> Result<Vec<StashHistory>> {
    let mut stmt = tx.prepare(
        "SELECT * FROM stash_history WHERE stash_id = ?1 ORDER BY version ASC, history_id ASC",
    )?;
    let rows = stmt.query_map(params![stash_id], row_to_history)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Default value shape a newly created stash starts with, by type
/// (spec.md §4.9).
fn initial_value(stash_type: StashType) -> serde_json::Value {
    match stash_type {
        StashType::Counter => serde_json::json!({ "value": 0 }),
        StashType::Lock => serde_json::Value::Null,
        StashType::Resource | StashType::Artifact | StashType::Context => serde_json::json!({}),
    }
}

/// `set(id, entity)`: create when `id` is empty. Stashes have no direct
/// update path outside the mutation wrappers below.
pub fn set(tx: &Transaction, dirty: &mut DirtySet, id: Option<String>, input: Stash) -> Result<String> {
    if let Some(id) = id {
        if id.is_empty() {
            return Err(CupboardError::InvalidID);
        }
        get(tx, &id)?;
        return Ok(id);
    }
    if input.name.trim().is_empty() {
        return Err(CupboardError::InvalidName);
    }
    let stash = Stash {
        stash_id: new_id(),
        name: input.name,
        stash_type: input.stash_type,
        value: initial_value(input.stash_type),
        version: 1,
        created_at: Utc::now(),
        last_operation: StashOperation::Create,
    };
    upsert(tx, dirty, &stash)?;
    append_history(tx, dirty, &stash)?;
    Ok(stash.stash_id)
}

/// Delete every history row for `stash_id`. Used by the stash-delete
/// cascade.
pub fn delete_history_by_stash(tx: &Transaction, dirty: &mut DirtySet, stash_id: &str) -> Result<()> {
    let changed = tx.execute("DELETE FROM stash_history WHERE stash_id = ?1", params![stash_id])?;
    if changed > 0 {
        dirty.insert(HISTORY_TABLE);
    }
    Ok(())
}

pub fn delete(tx: &Transaction, dirty: &mut DirtySet, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(CupboardError::InvalidID);
    }
    get(tx, id)?;
    tx.execute("DELETE FROM stashes WHERE stash_id = ?1", params![id])?;
    dirty.insert(TABLE);
    crate::cascade::on_stash_deleted(tx, dirty, id)?;
    Ok(())
}

pub fn set_value(tx: &Transaction, dirty: &mut DirtySet, id: &str, value: serde_json::Value) -> Result<Stash> {
    let mut stash = get(tx, id)?;
    stash.apply_set_value(value)?;
    upsert(tx, dirty, &stash)?;
    append_history(tx, dirty, &stash)?;
    Ok(stash)
}

pub fn increment(tx: &Transaction, dirty: &mut DirtySet, id: &str, delta: i64) -> Result<Stash> {
    let mut stash = get(tx, id)?;
    stash.apply_increment(delta)?;
    upsert(tx, dirty, &stash)?;
    append_history(tx, dirty, &stash)?;
    Ok(stash)
}

/// Reentrant acquire by the current holder is a true no-op: no version
/// bump, no history row.
pub fn acquire(tx: &Transaction, dirty: &mut DirtySet, id: &str, holder: &str) -> Result<Stash> {
    let mut stash = get(tx, id)?;
    let changed = stash.apply_acquire(holder)?;
    if changed {
        upsert(tx, dirty, &stash)?;
        append_history(tx, dirty, &stash)?;
    }
    Ok(stash)
}

pub fn release(tx: &Transaction, dirty: &mut DirtySet, id: &str, holder: &str) -> Result<Stash> {
    let mut stash = get(tx, id)?;
    stash.apply_release(holder)?;
    upsert(tx, dirty, &stash)?;
    append_history(tx, dirty, &stash)?;
    Ok(stash)
}

/// Load a stash row straight from JSONL into the index store, bypassing
/// create validation. See `crumbs::restore` for why.
pub(crate) fn restore(tx: &Transaction, row: &Stash) -> Result<()> {
    let mut dirty = DirtySet::default();
    upsert(tx, &mut dirty, row)
}

/// Load a stash-history row straight from JSONL into the index store.
pub(crate) fn restore_history(tx: &Transaction, row: &StashHistory) -> Result<()> {
    let value_json = serde_json::to_string(&row.value)?;
    let hash = content_hash(&serde_json::to_value(row)?);
    tx.execute(
        "INSERT OR REPLACE INTO stash_history (history_id, stash_id, version, operation, value, created_at, content_hash) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![row.history_id, row.stash_id, row.version, row.operation.as_str(), value_json, row.created_at.to_rfc3339(), hash],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::apply_schema;
    use rusqlite::Connection;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        conn
    }

    fn new_stash(tx: &Transaction, dirty: &mut DirtySet, stash_type: StashType) -> String {
        set(
            tx,
            dirty,
            None,
            Stash {
                stash_id: String::new(),
                name: "s".into(),
                stash_type,
                value: serde_json::Value::Null,
                version: 1,
                created_at: Utc::now(),
                last_operation: StashOperation::Create,
            },
        )
        .unwrap()
    }

    #[test]
    fn increment_accumulates_and_records_history() {
        let mut conn = conn();
        let tx = conn.transaction().unwrap();
        let mut dirty = DirtySet::default();
        let id = new_stash(&tx, &mut dirty, StashType::Counter);

        increment(&tx, &mut dirty, &id, 5).unwrap();
        let stash = increment(&tx, &mut dirty, &id, 7).unwrap();

        assert_eq!(stash.value, serde_json::json!({ "value": 12 }));
        let history = fetch_history(&tx, &id).unwrap();
        assert_eq!(history.len(), 3, "create + two increments");
    }

    #[test]
    fn reentrant_acquire_is_a_true_no_op() {
        let mut conn = conn();
        let tx = conn.transaction().unwrap();
        let mut dirty = DirtySet::default();
        let id = new_stash(&tx, &mut dirty, StashType::Lock);

        let first = acquire(&tx, &mut dirty, &id, "alice").unwrap();
        let second = acquire(&tx, &mut dirty, &id, "alice").unwrap();
        assert_eq!(first.version, second.version, "reentrant acquire must not bump version");

        let history = fetch_history(&tx, &id).unwrap();
        assert_eq!(history.len(), 2, "create + one acquire, no duplicate history row");
    }

    #[test]
    fn acquire_by_other_holder_is_rejected() {
        let mut conn = conn();
        let tx = conn.transaction().unwrap();
        let mut dirty = DirtySet::default();
        let id = new_stash(&tx, &mut dirty, StashType::Lock);

        acquire(&tx, &mut dirty, &id, "alice").unwrap();
        let err = acquire(&tx, &mut dirty, &id, "bob").unwrap_err();
        assert!(matches!(err, CupboardError::LockHeld));
    }

    #[test]
    fn release_by_non_holder_is_rejected() {
        let mut conn = conn();
        let tx = conn.transaction().unwrap();
        let mut dirty = DirtySet::default();
        let id = new_stash(&tx, &mut dirty, StashType::Lock);

        acquire(&tx, &mut dirty, &id, "alice").unwrap();
        let err = release(&tx, &mut dirty, &id, "bob").unwrap_err();
        assert!(matches!(err, CupboardError::NotLockHolder));
    }

    #[test]
    fn set_value_rejected_for_counter() {
        let mut conn = conn();
        let tx = conn.transaction().unwrap();
        let mut dirty = DirtySet::default();
        let id = new_stash(&tx, &mut dirty, StashType::Counter);

        let err = set_value(&tx, &mut dirty, &id, serde_json::json!("x")).unwrap_err();
        assert!(matches!(err, CupboardError::InvalidStashType(_)));
    }
}
