//! Crumbs driver (spec.md §4.3): the primary unit-of-work entity, its
//! state machine, and the `properties` map invariant.

use crate::cascade;
use crate::dirty::DirtySet;
use crate::error::{CupboardError, Result};
use crate::filter::{paginate, Filter};
use crate::hash::content_hash;
use crate::id::new_id;
use crate::model::{default_for, Crumb, CrumbState, ValueType};
use chrono::Utc;
use rusqlite::{params, Transaction};
use std::collections::BTreeMap;
use std::str::FromStr;

pub const TABLE: &str = "crumbs";
pub const FILTER_KEYS: &[&str] = &["states"];

fn row_to_crumb(row: &rusqlite::Row) -> rusqlite::Result<Crumb> {
    let state_str: String = row.get("state")?;
    let properties_json: String = row.get("properties")?;
    Ok(Crumb {
        crumb_id: row.get("crumb_id")?,
        name: row.get("name")?,
        state: CrumbState::from_str(&state_str).unwrap_or_default(),
        created_at: row.get::<_, String>("created_at")?.parse().unwrap_or_else(|_| Utc::now()),
        updated_at: row.get::<_, String>("updated_at")?.parse().unwrap_or_else(|_| Utc::now()),
        properties: serde_json::from_str(&properties_json).unwrap_or_default(),
    })
}

pub(crate) fn upsert(tx: &Transaction, dirty: &mut DirtySet, crumb: &Crumb) -> Result<()> {
    let properties_json = serde_json::to_string(&crumb.properties)?;
    let hash = content_hash(&serde_json::to_value(crumb)?);
    tx.execute(
        "INSERT INTO crumbs (crumb_id, name, state, created_at, updated_at, properties, content_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(crumb_id) DO UPDATE SET
            name = excluded.name,
            state = excluded.state,
            updated_at = excluded.updated_at,
            properties = excluded.properties,
            content_hash = excluded.content_hash",
        params![
            crumb.crumb_id,
            crumb.name,
            crumb.state.as_str(),
            crumb.created_at.to_rfc3339(),
            crumb.updated_at.to_rfc3339(),
            properties_json,
            hash,
        ],
    )?;
    dirty.insert(TABLE);
    Ok(())
}

pub fn get(tx: &Transaction, id: &str) -> Result<Crumb> {
    if id.is_empty() {
        return Err(CupboardError::InvalidID);
    }
    tx.query_row("SELECT * FROM crumbs WHERE crumb_id = ?1", params![id], row_to_crumb)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => CupboardError::NotFound,
            other => other.into(),
        })
}

pub fn list_all(tx: &Transaction) -> Result<Vec<Crumb>> {
    let mut stmt = tx.prepare("SELECT * FROM crumbs ORDER BY created_at ASC, crumb_id ASC")?;
    let rows = stmt.query_map([], row_to_crumb)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn fetch(tx: &Transaction, filter: &Filter) -> Result<Vec<Crumb>> {
    filter.validate_keys(FILTER_KEYS)?;
    let states = filter.string_set("states")?;
    let mut rows = list_all(tx)?;
    if let Some(states) = states {
        let wanted: Vec<CrumbState> = states.iter().filter_map(|s| CrumbState::from_str(s).ok()).collect();
        rows.retain(|c| wanted.contains(&c.state));
    }
    Ok(paginate(rows, filter.offset()?, filter.limit()?))
}

/// Default property values for every currently-defined property, used
/// both at crumb creation and by `properties::set` backfill.
fn default_properties(tx: &Transaction) -> Result<BTreeMap<String, serde_json::Value>> {
    let mut stmt = tx.prepare("SELECT property_id, value_type FROM properties")?;
    let mut out = BTreeMap::new();
    let rows = stmt.query_map([], |row| {
        let property_id: String = row.get(0)?;
        let value_type: String = row.get(1)?;
        Ok((property_id, value_type))
    })?;
    for row in rows {
        let (property_id, value_type) = row?;
        let vt = ValueType::from_str(&value_type).unwrap_or_default();
        let first_category = first_category_id(tx, &property_id)?;
        out.insert(property_id, default_for(vt, first_category.as_deref()));
    }
    Ok(out)
}

fn first_category_id(tx: &Transaction, property_id: &str) -> Result<Option<String>> {
    let mut stmt = tx.prepare(
        "SELECT category_id FROM categories WHERE property_id = ?1 ORDER BY ordinal ASC LIMIT 1",
    )?;
    let mut rows = stmt.query(params![property_id])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row.get(0)?))
    } else {
        Ok(None)
    }
}

/// `set(id, entity)`: create when `id` is empty, update otherwise.
pub fn set(tx: &Transaction, dirty: &mut DirtySet, id: Option<String>, input: Crumb) -> Result<String> {
    match id {
        None => {
            if input.name.trim().is_empty() {
                return Err(CupboardError::InvalidName);
            }
            let now = Utc::now();
            let crumb = Crumb {
                crumb_id: new_id(),
                name: input.name,
                state: CrumbState::Draft,
                created_at: now,
                updated_at: now,
                properties: default_properties(tx)?,
            };
            let id = crumb.crumb_id.clone();
            upsert(tx, dirty, &crumb)?;
            Ok(id)
        }
        Some(id) => {
            if id.is_empty() {
                return Err(CupboardError::InvalidID);
            }
            let existing = get(tx, &id)?;
            if input.name.trim().is_empty() {
                return Err(CupboardError::InvalidName);
            }
            if existing.state != input.state && !existing.state.can_transition_to(input.state) {
                return Err(CupboardError::InvalidTransition {
                    from: existing.state.as_str().to_string(),
                    to: input.state.as_str().to_string(),
                });
            }
            let updated = Crumb {
                crumb_id: id.clone(),
                name: input.name,
                state: input.state,
                created_at: existing.created_at,
                updated_at: Utc::now(),
                properties: input.properties,
            };
            upsert(tx, dirty, &updated)?;
            Ok(id)
        }
    }
}

/// Delete cascades: remove metadata, crumb_properties, and links touching
/// this crumb (spec.md §4.3).
pub fn delete(tx: &Transaction, dirty: &mut DirtySet, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(CupboardError::InvalidID);
    }
    get(tx, id)?;
    tx.execute("DELETE FROM crumbs WHERE crumb_id = ?1", params![id])?;
    dirty.insert(TABLE);
    cascade::on_crumb_deleted(tx, dirty, id)?;
    Ok(())
}

/// Load a row straight from JSONL into the index store, bypassing
/// create/update validation. Used only when rebuilding the index from
/// the JSONL log on attach (spec.md §2) — the log is the trusted source
/// of truth, so rows it already holds need no re-validation.
pub(crate) fn restore(tx: &Transaction, row: &Crumb) -> Result<()> {
    let mut dirty = DirtySet::default();
    upsert(tx, &mut dirty, row)
}
