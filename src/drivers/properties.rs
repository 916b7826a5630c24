//! Properties driver (spec.md §4.5): typed attribute definitions and the
//! backfill cascade that keeps every crumb's `properties` map complete.

use crate::cascade;
use crate::dirty::DirtySet;
use crate::error::{CupboardError, Result};
use crate::filter::{paginate, Filter};
use crate::hash::content_hash;
use crate::id::new_id;
use crate::model::{Property, ValueType};
use chrono::Utc;
use rusqlite::{params, Transaction};
use std::str::FromStr;

pub const TABLE: &str = "properties";
pub const FILTER_KEYS: &[&str] = &["name", "value_type"];

fn row_to_property(row: &rusqlite::Row) -> rusqlite::Result<Property> {
    let value_type_str: String = row.get("value_type")?;
    Ok(Property {
        property_id: row.get("property_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        value_type: ValueType::from_str(&value_type_str).unwrap_or_default(),
        created_at: row.get::<_, String>("created_at")?.parse().unwrap_or_else(|_| Utc::now()),
    })
}

pub fn get(tx: &Transaction, id: &str) -> Result<Property> {
    if id.is_empty() {
        return Err(CupboardError::InvalidID);
    }
    tx.query_row("SELECT * FROM properties WHERE property_id = ?1", params![id], row_to_property)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => CupboardError::NotFound,
            other => other.into(),
        })
}

pub fn list_all(tx: &Transaction) -> Result<Vec<Property>> {
    let mut stmt = tx.prepare("SELECT * FROM properties ORDER BY created_at ASC, property_id ASC")?;
    let rows = stmt.query_map([], row_to_property)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn fetch(tx: &Transaction, filter: &Filter) -> Result<Vec<Property>> {
    filter.validate_keys(FILTER_KEYS)?;
    let name = filter.string("name")?;
    let value_type = filter.string("value_type")?.and_then(|s| ValueType::from_str(&s).ok());
    let mut rows = list_all(tx)?;
    if let Some(name) = name {
        rows.retain(|p| p.name == name);
    }
    if let Some(vt) = value_type {
        rows.retain(|p| p.value_type == vt);
    }
    Ok(paginate(rows, filter.offset()?, filter.limit()?))
}

fn name_exists(tx: &Transaction, name: &str) -> Result<bool> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM properties WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn set(tx: &Transaction, dirty: &mut DirtySet, id: Option<String>, input: Property) -> Result<String> {
    if id.is_some() {
        // Properties have no update semantics in spec.md §4.5 beyond
        // creation; treat as a no-op existence check.
        let id = id.unwrap();
        get(tx, &id)?;
        return Ok(id);
    }
    if input.name.trim().is_empty() {
        return Err(CupboardError::InvalidName);
    }
    if name_exists(tx, &input.name)? {
        return Err(CupboardError::DuplicateName(input.name));
    }

    let property = Property {
        property_id: new_id(),
        name: input.name,
        description: input.description,
        value_type: input.value_type,
        created_at: Utc::now(),
    };
    let hash = content_hash(&serde_json::to_value(&property)?);
    tx.execute(
        "INSERT INTO properties (property_id, name, description, value_type, created_at, content_hash) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            property.property_id,
            property.name,
            property.description,
            property.value_type.as_str(),
            property.created_at.to_rfc3339(),
            hash,
        ],
    )?;
    dirty.insert(TABLE);

    cascade::on_property_created(tx, dirty, &property)?;

    Ok(property.property_id)
}

/// Delete cascades: categories, crumb_properties, and the map entry on
/// every crumb (spec.md §4.5).
pub fn delete(tx: &Transaction, dirty: &mut DirtySet, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(CupboardError::InvalidID);
    }
    get(tx, id)?;
    tx.execute("DELETE FROM properties WHERE property_id = ?1", params![id])?;
    dirty.insert(TABLE);
    cascade::on_property_deleted(tx, dirty, id)?;
    Ok(())
}

/// Load a row straight from JSONL into the index store, bypassing the
/// uniqueness check and backfill cascade. See `crumbs::restore` for why.
pub(crate) fn restore(tx: &Transaction, row: &Property) -> Result<()> {
    let hash = content_hash(&serde_json::to_value(row)?);
    tx.execute(
        "INSERT OR REPLACE INTO properties (property_id, name, description, value_type, created_at, content_hash) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![row.property_id, row.name, row.description, row.value_type.as_str(), row.created_at.to_rfc3339(), hash],
    )?;
    Ok(())
}
