//! Links driver (spec.md §4.7): directed typed edges with per-type
//! semantic constraints and triple uniqueness.

use crate::dirty::DirtySet;
use crate::drivers::{crumbs, stashes, trails};
use crate::error::{CupboardError, Result};
use crate::filter::{paginate, Filter};
use crate::hash::content_hash;
use crate::id::new_id;
use crate::model::{Link, LinkType};
use chrono::Utc;
use rusqlite::{params, Transaction};
use std::str::FromStr;

pub const TABLE: &str = "links";
pub const FILTER_KEYS: &[&str] = &["link_type", "from_id", "to_id"];

fn row_to_link(row: &rusqlite::Row) -> rusqlite::Result<Link> {
    let link_type_str: String = row.get("link_type")?;
    Ok(Link {
        link_id: row.get("link_id")?,
        link_type: LinkType::from_str(&link_type_str).unwrap_or_default(),
        from_id: row.get("from_id")?,
        to_id: row.get("to_id")?,
        created_at: row.get::<_, String>("created_at")?.parse().unwrap_or_else(|_| Utc::now()),
    })
}

pub fn get(tx: &Transaction, id: &str) -> Result<Link> {
    if id.is_empty() {
        return Err(CupboardError::InvalidID);
    }
    tx.query_row("SELECT * FROM links WHERE link_id = ?1", params![id], row_to_link)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => CupboardError::NotFound,
            other => other.into(),
        })
}

pub fn list_all(tx: &Transaction) -> Result<Vec<Link>> {
    let mut stmt = tx.prepare("SELECT * FROM links ORDER BY created_at ASC, link_id ASC")?;
    let rows = stmt.query_map([], row_to_link)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn fetch(tx: &Transaction, filter: &Filter) -> Result<Vec<Link>> {
    filter.validate_keys(FILTER_KEYS)?;
    let link_type = filter.string("link_type")?.and_then(|s| LinkType::from_str(&s).ok());
    let from_id = filter.string("from_id")?;
    let to_id = filter.string("to_id")?;
    let mut rows = list_all(tx)?;
    if let Some(lt) = link_type {
        rows.retain(|l| l.link_type == lt);
    }
    if let Some(from_id) = from_id {
        rows.retain(|l| l.from_id == from_id);
    }
    if let Some(to_id) = to_id {
        rows.retain(|l| l.to_id == to_id);
    }
    Ok(paginate(rows, filter.offset()?, filter.limit()?))
}

/// Per-type semantic constraints (spec.md §3): `from`/`to` must reference
/// the right kind of entity, plus the "at most one" cardinality rules.
fn validate_semantics(tx: &Transaction, link_type: LinkType, from_id: &str, to_id: &str) -> Result<()> {
    match link_type {
        LinkType::BelongsTo => {
            crumbs::get(tx, from_id)?;
            trails::get(tx, to_id)?;
            let existing = fetch(tx, &Filter::new().with("link_type", "belongs_to").with("from_id", from_id))?;
            if !existing.is_empty() {
                return Err(CupboardError::DuplicateName(
                    "crumb already has a belongs_to link".to_string(),
                ));
            }
        }
        LinkType::ChildOf => {
            crumbs::get(tx, from_id)?;
            crumbs::get(tx, to_id)?;
        }
        LinkType::BranchesFrom => {
            trails::get(tx, from_id)?;
            crumbs::get(tx, to_id)?;
            let existing = fetch(tx, &Filter::new().with("link_type", "branches_from").with("from_id", from_id))?;
            if !existing.is_empty() {
                return Err(CupboardError::DuplicateName(
                    "trail already has a branches_from link".to_string(),
                ));
            }
        }
        LinkType::ScopedTo => {
            stashes::get(tx, from_id)?;
            trails::get(tx, to_id)?;
            let existing = fetch(tx, &Filter::new().with("link_type", "scoped_to").with("from_id", from_id))?;
            if !existing.is_empty() {
                return Err(CupboardError::DuplicateName(
                    "stash already has a scoped_to link".to_string(),
                ));
            }
        }
    }
    Ok(())
}

pub fn set(tx: &Transaction, dirty: &mut DirtySet, id: Option<String>, input: Link) -> Result<String> {
    if id.as_deref().is_some_and(str::is_empty) {
        return Err(CupboardError::InvalidID);
    }
    if let Some(existing_id) = &id {
        // Links have no update semantics beyond existence; treat a
        // non-empty id as a no-op refresh after validating it exists.
        get(tx, existing_id)?;
        return Ok(existing_id.clone());
    }

    validate_semantics(tx, input.link_type, &input.from_id, &input.to_id)?;

    let dup = fetch(
        tx,
        &Filter::new()
            .with("link_type", input.link_type.as_str())
            .with("from_id", input.from_id.clone())
            .with("to_id", input.to_id.clone()),
    )?;
    if !dup.is_empty() {
        return Err(CupboardError::DuplicateName(format!(
            "({}, {}, {}) already exists",
            input.link_type.as_str(),
            input.from_id,
            input.to_id
        )));
    }

    let link = Link {
        link_id: new_id(),
        link_type: input.link_type,
        from_id: input.from_id,
        to_id: input.to_id,
        created_at: Utc::now(),
    };
    let hash = content_hash(&serde_json::to_value(&link)?);
    tx.execute(
        "INSERT INTO links (link_id, link_type, from_id, to_id, created_at, content_hash) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![link.link_id, link.link_type.as_str(), link.from_id, link.to_id, link.created_at.to_rfc3339(), hash],
    )?;
    dirty.insert(TABLE);
    Ok(link.link_id)
}

pub fn delete(tx: &Transaction, dirty: &mut DirtySet, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(CupboardError::InvalidID);
    }
    get(tx, id)?;
    tx.execute("DELETE FROM links WHERE link_id = ?1", params![id])?;
    dirty.insert(TABLE);
    Ok(())
}

/// Delete every link matching `link_type`/`from_id`/`to_id` (any may be
/// `None` to mean "any"). Used by cascades, not exposed to callers.
pub fn delete_matching(
    tx: &Transaction,
    dirty: &mut DirtySet,
    link_type: Option<LinkType>,
    from_id: Option<&str>,
    to_id: Option<&str>,
) -> Result<Vec<Link>> {
    let all = list_all(tx)?;
    let matched: Vec<Link> = all
        .into_iter()
        .filter(|l| link_type.is_none_or(|lt| l.link_type == lt))
        .filter(|l| from_id.is_none_or(|f| l.from_id == f))
        .filter(|l| to_id.is_none_or(|t| l.to_id == t))
        .collect();
    for link in &matched {
        tx.execute("DELETE FROM links WHERE link_id = ?1", params![link.link_id])?;
    }
    if !matched.is_empty() {
        dirty.insert(TABLE);
    }
    Ok(matched)
}

/// Load a row straight from JSONL into the index store, bypassing the
/// semantic-constraint and uniqueness checks `set` enforces. See
/// `crumbs::restore` for why.
pub(crate) fn restore(tx: &Transaction, row: &Link) -> Result<()> {
    let hash = content_hash(&serde_json::to_value(row)?);
    tx.execute(
        "INSERT OR REPLACE INTO links (link_id, link_type, from_id, to_id, created_at, content_hash) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![row.link_id, row.link_type.as_str(), row.from_id, row.to_id, row.created_at.to_rfc3339(), hash],
    )?;
    Ok(())
}
