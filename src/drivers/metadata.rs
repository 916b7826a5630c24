//! Metadata driver (spec.md §4.8): free-form content tied to a crumb,
//! discriminated by `table_name` (e.g. "comments").

use crate::dirty::DirtySet;
use crate::error::{CupboardError, Result};
use crate::filter::{paginate, Filter};
use crate::hash::content_hash;
use crate::id::new_id;
use crate::model::Metadata;
use chrono::Utc;
use rusqlite::{params, Transaction};

pub const TABLE: &str = "metadata";
pub const FILTER_KEYS: &[&str] = &["crumb_id", "table_name"];

fn row_to_metadata(row: &rusqlite::Row) -> rusqlite::Result<Metadata> {
    Ok(Metadata {
        metadata_id: row.get("metadata_id")?,
        crumb_id: row.get("crumb_id")?,
        table_name: row.get("table_name")?,
        content: row.get("content")?,
        created_at: row.get::<_, String>("created_at")?.parse().unwrap_or_else(|_| Utc::now()),
    })
}

pub fn get(tx: &Transaction, id: &str) -> Result<Metadata> {
    if id.is_empty() {
        return Err(CupboardError::InvalidID);
    }
    tx.query_row("SELECT * FROM metadata WHERE metadata_id = ?1", params![id], row_to_metadata)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => CupboardError::NotFound,
            other => other.into(),
        })
}

pub fn list_all(tx: &Transaction) -> Result<Vec<Metadata>> {
    let mut stmt = tx.prepare("SELECT * FROM metadata ORDER BY created_at ASC, metadata_id ASC")?;
    let rows = stmt.query_map([], row_to_metadata)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn fetch(tx: &Transaction, filter: &Filter) -> Result<Vec<Metadata>> {
    filter.validate_keys(FILTER_KEYS)?;
    let crumb_id = filter.string("crumb_id")?;
    let table_name = filter.string("table_name")?;
    let mut rows = list_all(tx)?;
    if let Some(crumb_id) = crumb_id {
        rows.retain(|m| m.crumb_id == crumb_id);
    }
    if let Some(table_name) = table_name {
        rows.retain(|m| m.table_name == table_name);
    }
    Ok(paginate(rows, filter.offset()?, filter.limit()?))
}

pub fn set(tx: &Transaction, dirty: &mut DirtySet, id: Option<String>, input: Metadata) -> Result<String> {
    if input.content.trim().is_empty() {
        return Err(CupboardError::InvalidContent);
    }
    match id {
        None => {
            let row = Metadata {
                metadata_id: new_id(),
                crumb_id: input.crumb_id,
                table_name: input.table_name,
                content: input.content,
                created_at: Utc::now(),
            };
            let hash = content_hash(&serde_json::to_value(&row)?);
            tx.execute(
                "INSERT INTO metadata (metadata_id, crumb_id, table_name, content, created_at, content_hash) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![row.metadata_id, row.crumb_id, row.table_name, row.content, row.created_at.to_rfc3339(), hash],
            )?;
            dirty.insert(TABLE);
            Ok(row.metadata_id)
        }
        Some(id) => {
            if id.is_empty() {
                return Err(CupboardError::InvalidID);
            }
            let existing = get(tx, &id)?;
            let hash = content_hash(&serde_json::to_value(&input)?);
            tx.execute(
                "UPDATE metadata SET crumb_id = ?2, table_name = ?3, content = ?4, content_hash = ?5 WHERE metadata_id = ?1",
                params![id, input.crumb_id, input.table_name, input.content, hash],
            )?;
            let _ = existing;
            dirty.insert(TABLE);
            Ok(id)
        }
    }
}

pub fn delete(tx: &Transaction, dirty: &mut DirtySet, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(CupboardError::InvalidID);
    }
    get(tx, id)?;
    tx.execute("DELETE FROM metadata WHERE metadata_id = ?1", params![id])?;
    dirty.insert(TABLE);
    Ok(())
}

pub fn delete_by_crumb(tx: &Transaction, dirty: &mut DirtySet, crumb_id: &str) -> Result<()> {
    let changed = tx.execute("DELETE FROM metadata WHERE crumb_id = ?1", params![crumb_id])?;
    if changed > 0 {
        dirty.insert(TABLE);
    }
    Ok(())
}

/// Load a row straight from JSONL into the index store, bypassing
/// content validation. See `crumbs::restore` for why.
pub(crate) fn restore(tx: &Transaction, row: &Metadata) -> Result<()> {
    let hash = content_hash(&serde_json::to_value(row)?);
    tx.execute(
        "INSERT OR REPLACE INTO metadata (metadata_id, crumb_id, table_name, content, created_at, content_hash) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![row.metadata_id, row.crumb_id, row.table_name, row.content, row.created_at.to_rfc3339(), hash],
    )?;
    Ok(())
}
