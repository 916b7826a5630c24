//! Trails driver (spec.md §4.4): the epic/container entity and its
//! completion/abandonment cascades.

use crate::cascade;
use crate::dirty::DirtySet;
use crate::error::{CupboardError, Result};
use crate::filter::{paginate, Filter};
use crate::hash::content_hash;
use crate::id::new_id;
use crate::model::{Trail, TrailState};
use chrono::Utc;
use rusqlite::{params, Transaction};
use std::str::FromStr;

pub const TABLE: &str = "trails";
pub const FILTER_KEYS: &[&str] = &["state"];

fn row_to_trail(row: &rusqlite::Row) -> rusqlite::Result<Trail> {
    let state_str: String = row.get("state")?;
    Ok(Trail {
        trail_id: row.get("trail_id")?,
        state: TrailState::from_str(&state_str).unwrap_or_default(),
        created_at: row.get::<_, String>("created_at")?.parse().unwrap_or_else(|_| Utc::now()),
    })
}

pub(crate) fn upsert(tx: &Transaction, dirty: &mut DirtySet, trail: &Trail) -> Result<()> {
    let hash = content_hash(&serde_json::to_value(trail)?);
    tx.execute(
        "INSERT INTO trails (trail_id, state, created_at, content_hash)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(trail_id) DO UPDATE SET state = excluded.state, content_hash = excluded.content_hash",
        params![trail.trail_id, trail.state.as_str(), trail.created_at.to_rfc3339(), hash],
    )?;
    dirty.insert(TABLE);
    Ok(())
}

pub fn get(tx: &Transaction, id: &str) -> Result<Trail> {
    if id.is_empty() {
        return Err(CupboardError::InvalidID);
    }
    tx.query_row("SELECT * FROM trails WHERE trail_id = ?1", params![id], row_to_trail)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => CupboardError::NotFound,
            other => other.into(),
        })
}

pub fn list_all(tx: &Transaction) -> Result<Vec<Trail>> {
    let mut stmt = tx.prepare("SELECT * FROM trails ORDER BY created_at ASC, trail_id ASC")?;
    let rows = stmt.query_map([], row_to_trail)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn fetch(tx: &Transaction, filter: &Filter) -> Result<Vec<Trail>> {
    filter.validate_keys(FILTER_KEYS)?;
    let state = filter.string("state")?;
    let mut rows = list_all(tx)?;
    if let Some(state) = state {
        let wanted = TrailState::from_str(&state).ok();
        rows.retain(|t| Some(t.state) == wanted);
    }
    Ok(paginate(rows, filter.offset()?, filter.limit()?))
}

pub fn set(tx: &Transaction, dirty: &mut DirtySet, id: Option<String>, input: Trail) -> Result<String> {
    match id {
        None => {
            let now = Utc::now();
            let trail = Trail {
                trail_id: new_id(),
                state: TrailState::Draft,
                created_at: now,
            };
            let id = trail.trail_id.clone();
            upsert(tx, dirty, &trail)?;
            Ok(id)
        }
        Some(id) => {
            if id.is_empty() {
                return Err(CupboardError::InvalidID);
            }
            let existing = get(tx, &id)?;
            if existing.state != input.state && !existing.state.can_transition_to(input.state) {
                return Err(CupboardError::InvalidTransition {
                    from: existing.state.as_str().to_string(),
                    to: input.state.as_str().to_string(),
                });
            }
            let transitioned = existing.state != input.state;
            let updated = Trail {
                trail_id: id.clone(),
                state: input.state,
                created_at: existing.created_at,
            };
            upsert(tx, dirty, &updated)?;
            if transitioned {
                cascade::on_trail_transitioned(tx, dirty, &id, input.state)?;
            }
            Ok(id)
        }
    }
}

/// Delete is independent of state changes and cascades all links
/// touching the trail (spec.md §4.4).
pub fn delete(tx: &Transaction, dirty: &mut DirtySet, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(CupboardError::InvalidID);
    }
    get(tx, id)?;
    tx.execute("DELETE FROM trails WHERE trail_id = ?1", params![id])?;
    dirty.insert(TABLE);
    cascade::on_trail_deleted(tx, dirty, id)?;
    Ok(())
}

/// Load a row straight from JSONL into the index store, bypassing the
/// state-transition contract. See `crumbs::restore` for why.
pub(crate) fn restore(tx: &Transaction, row: &Trail) -> Result<()> {
    let mut dirty = DirtySet::default();
    upsert(tx, &mut dirty, row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{crumbs, links};
    use crate::model::{Crumb, CrumbState, Link, LinkType};
    use crate::storage::schema::apply_schema;
    use rusqlite::Connection;
    use std::collections::BTreeMap;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn completing_a_trail_clears_belongs_to_links_but_keeps_crumbs() {
        let mut conn = conn();
        let tx = conn.transaction().unwrap();
        let mut dirty = DirtySet::default();

        let trail_id = set(&tx, &mut dirty, None, Trail { trail_id: String::new(), state: TrailState::Draft, created_at: Utc::now() }).unwrap();
        set(&tx, &mut dirty, Some(trail_id.clone()), Trail { trail_id: trail_id.clone(), state: TrailState::Active, created_at: Utc::now() }).unwrap();

        let c1 = crumbs::set(&tx, &mut dirty, None, Crumb { crumb_id: String::new(), name: "A".into(), state: CrumbState::Draft, created_at: Utc::now(), updated_at: Utc::now(), properties: BTreeMap::new() }).unwrap();
        let c2 = crumbs::set(&tx, &mut dirty, None, Crumb { crumb_id: String::new(), name: "B".into(), state: CrumbState::Draft, created_at: Utc::now(), updated_at: Utc::now(), properties: BTreeMap::new() }).unwrap();

        links::set(&tx, &mut dirty, None, Link { link_id: String::new(), link_type: LinkType::BelongsTo, from_id: c1.clone(), to_id: trail_id.clone(), created_at: Utc::now() }).unwrap();
        links::set(&tx, &mut dirty, None, Link { link_id: String::new(), link_type: LinkType::BelongsTo, from_id: c2.clone(), to_id: trail_id.clone(), created_at: Utc::now() }).unwrap();

        set(&tx, &mut dirty, Some(trail_id.clone()), Trail { trail_id: trail_id.clone(), state: TrailState::Completed, created_at: Utc::now() }).unwrap();

        let remaining_crumbs = crumbs::list_all(&tx).unwrap();
        assert_eq!(remaining_crumbs.len(), 2, "completing retains crumbs");
        let remaining_links = links::list_all(&tx).unwrap();
        assert!(remaining_links.is_empty(), "completing clears belongs_to links to the trail");
    }

    #[test]
    fn abandoning_a_trail_deletes_member_crumbs() {
        let mut conn = conn();
        let tx = conn.transaction().unwrap();
        let mut dirty = DirtySet::default();

        let trail_id = set(&tx, &mut dirty, None, Trail { trail_id: String::new(), state: TrailState::Draft, created_at: Utc::now() }).unwrap();
        set(&tx, &mut dirty, Some(trail_id.clone()), Trail { trail_id: trail_id.clone(), state: TrailState::Active, created_at: Utc::now() }).unwrap();

        let c1 = crumbs::set(&tx, &mut dirty, None, Crumb { crumb_id: String::new(), name: "A".into(), state: CrumbState::Draft, created_at: Utc::now(), updated_at: Utc::now(), properties: BTreeMap::new() }).unwrap();
        links::set(&tx, &mut dirty, None, Link { link_id: String::new(), link_type: LinkType::BelongsTo, from_id: c1.clone(), to_id: trail_id.clone(), created_at: Utc::now() }).unwrap();

        set(&tx, &mut dirty, Some(trail_id.clone()), Trail { trail_id: trail_id.clone(), state: TrailState::Abandoned, created_at: Utc::now() }).unwrap();

        assert!(crumbs::list_all(&tx).unwrap().is_empty());
        assert!(links::list_all(&tx).unwrap().is_empty());
        let trail = get(&tx, &trail_id).unwrap();
        assert_eq!(trail.state, TrailState::Abandoned);
    }
}
