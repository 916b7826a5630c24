//! Cross-table cascades (spec.md §3, §4): rewrite rules triggered by
//! entity transitions or deletions, always executed inside the same
//! transaction as the triggering mutation so the JSONL writeback sees a
//! single consistent snapshot.

use crate::dirty::DirtySet;
use crate::drivers::{categories, crumb_properties, crumbs, links, metadata, stashes};
use crate::error::Result;
use crate::model::{LinkType, Property, TrailState};
use rusqlite::{params, Transaction};

/// A crumb was deleted: drop its metadata, its property values, and any
/// link touching it in either direction.
pub fn on_crumb_deleted(tx: &Transaction, dirty: &mut DirtySet, crumb_id: &str) -> Result<()> {
    metadata::delete_by_crumb(tx, dirty, crumb_id)?;
    crumb_properties::delete_by_crumb(tx, dirty, crumb_id)?;
    links::delete_matching(tx, dirty, None, Some(crumb_id), None)?;
    links::delete_matching(tx, dirty, None, None, Some(crumb_id))?;
    Ok(())
}

/// A trail changed state. Completing clears its `belongs_to` links
/// without touching member crumbs; abandoning deletes the member crumbs
/// (which in turn cascades their own links) before clearing what's left.
pub fn on_trail_transitioned(tx: &Transaction, dirty: &mut DirtySet, trail_id: &str, new_state: TrailState) -> Result<()> {
    match new_state {
        TrailState::Completed => {
            links::delete_matching(tx, dirty, Some(LinkType::BelongsTo), None, Some(trail_id))?;
        }
        TrailState::Abandoned => {
            let member_links = links::delete_matching(tx, dirty, Some(LinkType::BelongsTo), None, Some(trail_id))?;
            for link in member_links {
                // The crumb may already be gone if cascades ran out of
                // order within the same transaction; ignore NotFound.
                let _ = crumbs::delete(tx, dirty, &link.from_id);
            }
        }
        TrailState::Draft | TrailState::Active => {}
    }
    Ok(())
}

/// A trail was deleted outright: clear every link touching it, in
/// either direction, of any type.
pub fn on_trail_deleted(tx: &Transaction, dirty: &mut DirtySet, trail_id: &str) -> Result<()> {
    links::delete_matching(tx, dirty, None, Some(trail_id), None)?;
    links::delete_matching(tx, dirty, None, None, Some(trail_id))?;
    Ok(())
}

/// A property was created: backfill every existing crumb's `properties`
/// map with the property's default value (spec.md §4.5).
pub fn on_property_created(tx: &Transaction, dirty: &mut DirtySet, property: &Property) -> Result<()> {
    let first_category = tx.query_row(
        "SELECT category_id FROM categories WHERE property_id = ?1 ORDER BY ordinal ASC LIMIT 1",
        params![property.property_id],
        |row| row.get::<_, String>(0),
    ).ok();
    let default_value = crate::model::default_for(property.value_type, first_category.as_deref());

    for crumb in crumbs::list_all(tx)? {
        let mut updated = crumb.clone();
        updated.properties.insert(property.property_id.clone(), default_value.clone());
        crumbs_set_properties(tx, dirty, &updated)?;
        crumb_properties::upsert(tx, dirty, &crumb.crumb_id, &property.property_id, &default_value)?;
    }
    Ok(())
}

/// A property was deleted: drop its categories, its crumb_properties
/// rows, and its entry in every crumb's `properties` map.
pub fn on_property_deleted(tx: &Transaction, dirty: &mut DirtySet, property_id: &str) -> Result<()> {
    categories::delete_by_property(tx, dirty, property_id)?;
    crumb_properties::delete_by_property(tx, dirty, property_id)?;

    for crumb in crumbs::list_all(tx)? {
        if crumb.properties.contains_key(property_id) {
            let mut updated = crumb.clone();
            updated.properties.remove(property_id);
            crumbs_set_properties(tx, dirty, &updated)?;
        }
    }
    Ok(())
}

/// A stash was deleted: drop its whole history.
pub fn on_stash_deleted(tx: &Transaction, dirty: &mut DirtySet, stash_id: &str) -> Result<()> {
    stashes::delete_history_by_stash(tx, dirty, stash_id)?;
    Ok(())
}

/// Cascades patch a crumb's `properties` map directly rather than going
/// through `crumbs::set`, since that entry point enforces name/state
/// rules that don't apply to a properties-only backfill rewrite.
fn crumbs_set_properties(tx: &Transaction, dirty: &mut DirtySet, crumb: &crate::model::Crumb) -> Result<()> {
    let properties_json = serde_json::to_string(&crumb.properties)?;
    let hash = crate::hash::content_hash(&serde_json::to_value(crumb)?);
    tx.execute(
        "UPDATE crumbs SET properties = ?2, content_hash = ?3 WHERE crumb_id = ?1",
        params![crumb.crumb_id, properties_json, hash],
    )?;
    dirty.insert(crumbs::TABLE);
    Ok(())
}
