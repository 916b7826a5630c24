//! The generic table router (spec.md §9): callers that want to address a
//! table by name — rather than through one of the typed driver modules
//! directly — go through [`Table::parse`] and the JSON-valued methods on
//! [`crate::storage::Cupboard`].
//!
//! Per the design notes in spec.md §9, this crate picks "one handle type
//! per table exposing concretely typed operations" (the `drivers` modules)
//! as the primary API, and layers this name-keyed, JSON-valued router on
//! top of it for callers who only know a table name at runtime (e.g. a
//! future CLI or RPC surface).

use crate::dirty::DirtySet;
use crate::drivers::{categories, crumb_properties, crumbs, links, metadata, properties, stashes, trails};
use crate::error::{CupboardError, Result};
use crate::filter::Filter;
use rusqlite::Transaction;
use serde_json::Value;

/// One of the nine tables a cupboard understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Crumbs,
    Trails,
    Links,
    Properties,
    Categories,
    CrumbProperties,
    Metadata,
    Stashes,
    StashHistory,
}

impl Table {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Crumbs => "crumbs",
            Self::Trails => "trails",
            Self::Links => "links",
            Self::Properties => "properties",
            Self::Categories => "categories",
            Self::CrumbProperties => "crumb_properties",
            Self::Metadata => "metadata",
            Self::Stashes => "stashes",
            Self::StashHistory => "stash_history",
        }
    }

    /// Look up a table by its name. Returns `TableNotFound` for anything
    /// not in [`TABLE_NAMES`].
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "crumbs" => Ok(Self::Crumbs),
            "trails" => Ok(Self::Trails),
            "links" => Ok(Self::Links),
            "properties" => Ok(Self::Properties),
            "categories" => Ok(Self::Categories),
            "crumb_properties" => Ok(Self::CrumbProperties),
            "metadata" => Ok(Self::Metadata),
            "stashes" => Ok(Self::Stashes),
            "stash_history" => Ok(Self::StashHistory),
            other => Err(CupboardError::TableNotFound(other.to_string())),
        }
    }
}

pub(crate) fn get(tx: &Transaction, table: Table, id: &str) -> Result<Value> {
    Ok(match table {
        Table::Crumbs => serde_json::to_value(crumbs::get(tx, id)?)?,
        Table::Trails => serde_json::to_value(trails::get(tx, id)?)?,
        Table::Links => serde_json::to_value(links::get(tx, id)?)?,
        Table::Properties => serde_json::to_value(properties::get(tx, id)?)?,
        Table::Categories => serde_json::to_value(categories::get(tx, id)?)?,
        Table::CrumbProperties => return crumb_properties::get(id).map(|_| Value::Null),
        Table::Metadata => serde_json::to_value(metadata::get(tx, id)?)?,
        Table::Stashes => serde_json::to_value(stashes::get(tx, id)?)?,
        Table::StashHistory => return Err(CupboardError::InvalidID),
    })
}

pub(crate) fn fetch(tx: &Transaction, table: Table, filter: &Filter) -> Result<Vec<Value>> {
    Ok(match table {
        Table::Crumbs => crumbs::fetch(tx, filter)?.into_iter().map(|r| serde_json::to_value(r).unwrap_or(Value::Null)).collect(),
        Table::Trails => trails::fetch(tx, filter)?.into_iter().map(|r| serde_json::to_value(r).unwrap_or(Value::Null)).collect(),
        Table::Links => links::fetch(tx, filter)?.into_iter().map(|r| serde_json::to_value(r).unwrap_or(Value::Null)).collect(),
        Table::Properties => properties::fetch(tx, filter)?.into_iter().map(|r| serde_json::to_value(r).unwrap_or(Value::Null)).collect(),
        Table::Categories => categories::fetch(tx, filter)?.into_iter().map(|r| serde_json::to_value(r).unwrap_or(Value::Null)).collect(),
        Table::CrumbProperties => crumb_properties::fetch(tx, filter)?.into_iter().map(|r| serde_json::to_value(r).unwrap_or(Value::Null)).collect(),
        Table::Metadata => metadata::fetch(tx, filter)?.into_iter().map(|r| serde_json::to_value(r).unwrap_or(Value::Null)).collect(),
        Table::Stashes => stashes::fetch(tx, filter)?.into_iter().map(|r| serde_json::to_value(r).unwrap_or(Value::Null)).collect(),
        Table::StashHistory => return Err(CupboardError::InvalidFilter("stash_history has no table-level fetch; use Cupboard::stash_history".to_string())),
    })
}

pub(crate) fn set(tx: &Transaction, dirty: &mut DirtySet, table: Table, id: Option<String>, value: Value) -> Result<String> {
    match table {
        Table::Crumbs => crumbs::set(tx, dirty, id, serde_json::from_value(value)?),
        Table::Trails => trails::set(tx, dirty, id, serde_json::from_value(value)?),
        Table::Links => links::set(tx, dirty, id, serde_json::from_value(value)?),
        Table::Properties => properties::set(tx, dirty, id, serde_json::from_value(value)?),
        Table::Categories => categories::set(tx, dirty, id, serde_json::from_value(value)?),
        Table::CrumbProperties => Err(CupboardError::InvalidFilter("crumb_properties is written through crumb/property cascades, not directly".to_string())),
        Table::Metadata => metadata::set(tx, dirty, id, serde_json::from_value(value)?),
        Table::Stashes => stashes::set(tx, dirty, id, serde_json::from_value(value)?),
        Table::StashHistory => Err(CupboardError::InvalidFilter("stash_history is append-only".to_string())),
    }
}

/// The storage-engine-internal `content_hash` bookkeeping column for a
/// row, keyed by the table's single-column id. A diagnostic accessor,
/// not part of the public entity structs (SPEC_FULL.md §3 supplement).
pub(crate) fn content_hash(tx: &Transaction, table: Table, id: &str) -> Result<String> {
    if id.is_empty() {
        return Err(CupboardError::InvalidID);
    }
    let sql = match table {
        Table::Crumbs => "SELECT content_hash FROM crumbs WHERE crumb_id = ?1",
        Table::Trails => "SELECT content_hash FROM trails WHERE trail_id = ?1",
        Table::Links => "SELECT content_hash FROM links WHERE link_id = ?1",
        Table::Properties => "SELECT content_hash FROM properties WHERE property_id = ?1",
        Table::Categories => "SELECT content_hash FROM categories WHERE category_id = ?1",
        Table::Metadata => "SELECT content_hash FROM metadata WHERE metadata_id = ?1",
        Table::Stashes => "SELECT content_hash FROM stashes WHERE stash_id = ?1",
        Table::StashHistory => "SELECT content_hash FROM stash_history WHERE history_id = ?1",
        Table::CrumbProperties => return Err(CupboardError::InvalidID),
    };
    tx.query_row(sql, [id], |row| row.get::<_, Option<String>>(0))
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => CupboardError::NotFound,
            other => other.into(),
        })?
        .ok_or(CupboardError::NotFound)
}

pub(crate) fn delete(tx: &Transaction, dirty: &mut DirtySet, table: Table, id: &str) -> Result<()> {
    match table {
        Table::Crumbs => crumbs::delete(tx, dirty, id),
        Table::Trails => trails::delete(tx, dirty, id),
        Table::Links => links::delete(tx, dirty, id),
        Table::Properties => properties::delete(tx, dirty, id),
        Table::Categories => categories::delete(tx, dirty, id),
        Table::CrumbProperties => Err(CupboardError::InvalidID),
        Table::Metadata => metadata::delete(tx, dirty, id),
        Table::Stashes => stashes::delete(tx, dirty, id),
        Table::StashHistory => Err(CupboardError::InvalidFilter("stash_history is append-only".to_string())),
    }
}
