//! CrumbProperties driver (spec.md §3): the materialized
//! `(crumb_id, property_id) -> value` mirror of each crumb's in-memory
//! `properties` map, kept so the JSONL log records property history
//! independently of the crumb row.

use crate::dirty::DirtySet;
use crate::error::{CupboardError, Result};
use crate::filter::{paginate, Filter};
use crate::hash::content_hash;
use crate::model::CrumbProperty;
use rusqlite::{params, Transaction};

pub const TABLE: &str = "crumb_properties";
pub const FILTER_KEYS: &[&str] = &["crumb_id", "property_id"];

fn row_to_crumb_property(row: &rusqlite::Row) -> rusqlite::Result<CrumbProperty> {
    let value_json: String = row.get("value")?;
    Ok(CrumbProperty {
        crumb_id: row.get("crumb_id")?,
        property_id: row.get("property_id")?,
        value: serde_json::from_str(&value_json).unwrap_or(serde_json::Value::Null),
    })
}

pub fn list_all(tx: &Transaction) -> Result<Vec<CrumbProperty>> {
    let mut stmt = tx.prepare(
        "SELECT * FROM crumb_properties ORDER BY crumb_id ASC, property_id ASC",
    )?;
    let rows = stmt.query_map([], row_to_crumb_property)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn fetch(tx: &Transaction, filter: &Filter) -> Result<Vec<CrumbProperty>> {
    filter.validate_keys(FILTER_KEYS)?;
    let crumb_id = filter.string("crumb_id")?;
    let property_id = filter.string("property_id")?;
    let mut rows = list_all(tx)?;
    if let Some(crumb_id) = crumb_id {
        rows.retain(|r| r.crumb_id == crumb_id);
    }
    if let Some(property_id) = property_id {
        rows.retain(|r| r.property_id == property_id);
    }
    Ok(paginate(rows, filter.offset()?, filter.limit()?))
}

/// Upsert one `(crumb_id, property_id) -> value` row. Not directly
/// caller-facing — driven by the crumb-create and property-create
/// backfill cascades.
pub fn upsert(tx: &Transaction, dirty: &mut DirtySet, crumb_id: &str, property_id: &str, value: &serde_json::Value) -> Result<()> {
    let hash = content_hash(value);
    let value_json = serde_json::to_string(value)?;
    tx.execute(
        "INSERT INTO crumb_properties (crumb_id, property_id, value, content_hash)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(crumb_id, property_id) DO UPDATE SET value = excluded.value, content_hash = excluded.content_hash",
        params![crumb_id, property_id, value_json, hash],
    )?;
    dirty.insert(TABLE);
    Ok(())
}

pub fn delete_by_crumb(tx: &Transaction, dirty: &mut DirtySet, crumb_id: &str) -> Result<()> {
    let changed = tx.execute("DELETE FROM crumb_properties WHERE crumb_id = ?1", params![crumb_id])?;
    if changed > 0 {
        dirty.insert(TABLE);
    }
    Ok(())
}

pub fn delete_by_property(tx: &Transaction, dirty: &mut DirtySet, property_id: &str) -> Result<()> {
    let changed = tx.execute("DELETE FROM crumb_properties WHERE property_id = ?1", params![property_id])?;
    if changed > 0 {
        dirty.insert(TABLE);
    }
    Ok(())
}

#[allow(dead_code)]
pub fn get(id: &str) -> Result<CrumbProperty> {
    // CrumbProperty rows are keyed by a composite (crumb_id, property_id),
    // not a single id; the uniform `get(id)` contract does not apply to
    // this table the way it does to id-keyed tables.
    Err(CupboardError::InvalidID)
}
