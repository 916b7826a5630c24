//! Categories driver (spec.md §4.6): ordered labels for categorical
//! properties.

use crate::dirty::DirtySet;
use crate::error::{CupboardError, Result};
use crate::filter::{paginate, Filter};
use crate::hash::content_hash;
use crate::id::new_id;
use crate::model::Category;
use rusqlite::{params, Transaction};

pub const TABLE: &str = "categories";
pub const FILTER_KEYS: &[&str] = &["property_id"];

fn row_to_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
    Ok(Category {
        category_id: row.get("category_id")?,
        property_id: row.get("property_id")?,
        name: row.get("name")?,
        ordinal: row.get("ordinal")?,
    })
}

pub fn get(tx: &Transaction, id: &str) -> Result<Category> {
    if id.is_empty() {
        return Err(CupboardError::InvalidID);
    }
    tx.query_row("SELECT * FROM categories WHERE category_id = ?1", params![id], row_to_category)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => CupboardError::NotFound,
            other => other.into(),
        })
}

pub fn list_all(tx: &Transaction) -> Result<Vec<Category>> {
    let mut stmt = tx.prepare("SELECT * FROM categories ORDER BY property_id ASC, ordinal ASC, category_id ASC")?;
    let rows = stmt.query_map([], row_to_category)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn fetch(tx: &Transaction, filter: &Filter) -> Result<Vec<Category>> {
    filter.validate_keys(FILTER_KEYS)?;
    let property_id = filter.string("property_id")?;
    let mut rows = list_all(tx)?;
    if let Some(property_id) = property_id {
        rows.retain(|c| c.property_id == property_id);
    }
    Ok(paginate(rows, filter.offset()?, filter.limit()?))
}

pub fn set(tx: &Transaction, dirty: &mut DirtySet, id: Option<String>, input: Category) -> Result<String> {
    if let Some(id) = id {
        if id.is_empty() {
            return Err(CupboardError::InvalidID);
        }
        get(tx, &id)?;
        return Ok(id);
    }
    if input.ordinal < 0 {
        return Err(CupboardError::InvalidOrdinal);
    }
    let exists: i64 = tx.query_row(
        "SELECT COUNT(*) FROM categories WHERE property_id = ?1 AND name = ?2",
        params![input.property_id, input.name],
        |row| row.get(0),
    )?;
    if exists > 0 {
        return Err(CupboardError::DuplicateName(input.name));
    }
    let category = Category {
        category_id: new_id(),
        property_id: input.property_id,
        name: input.name,
        ordinal: input.ordinal,
    };
    let hash = content_hash(&serde_json::to_value(&category)?);
    tx.execute(
        "INSERT INTO categories (category_id, property_id, name, ordinal, content_hash) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![category.category_id, category.property_id, category.name, category.ordinal, hash],
    )?;
    dirty.insert(TABLE);
    Ok(category.category_id)
}

pub fn delete(tx: &Transaction, dirty: &mut DirtySet, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(CupboardError::InvalidID);
    }
    get(tx, id)?;
    tx.execute("DELETE FROM categories WHERE category_id = ?1", params![id])?;
    dirty.insert(TABLE);
    Ok(())
}

/// Delete every category for `property_id`. Used by the property-delete
/// cascade.
pub fn delete_by_property(tx: &Transaction, dirty: &mut DirtySet, property_id: &str) -> Result<()> {
    let changed = tx.execute("DELETE FROM categories WHERE property_id = ?1", params![property_id])?;
    if changed > 0 {
        dirty.insert(TABLE);
    }
    Ok(())
}

/// Load a row straight from JSONL into the index store, bypassing the
/// ordinal and uniqueness checks. See `crumbs::restore` for why.
pub(crate) fn restore(tx: &Transaction, row: &Category) -> Result<()> {
    let hash = content_hash(&serde_json::to_value(row)?);
    tx.execute(
        "INSERT OR REPLACE INTO categories (category_id, property_id, name, ordinal, content_hash) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![row.category_id, row.property_id, row.name, row.ordinal, hash],
    )?;
    Ok(())
}
