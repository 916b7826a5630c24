//! `cupboard`: an embedded, multi-table entity store.
//!
//! A cupboard holds nine tables — crumbs, trails, links, properties,
//! categories, crumb_properties, metadata, stashes, and stash_history —
//! behind a dual-store consistency model: an append-structured JSONL log
//! per table is the durable source of truth, and a SQLite index is a
//! disposable cache rebuilt from that log on every attach. See
//! [`storage::Cupboard`] for the lifecycle and [`drivers`] for the
//! per-table CRUD contract.

pub mod cascade;
pub mod dirty;
pub mod drivers;
pub mod error;
pub mod filter;
pub mod hash;
pub mod id;
pub mod jsonl;
pub mod logging;
pub mod model;
pub mod storage;
pub mod table;

pub use error::{CupboardError, Result};
pub use filter::Filter;
pub use storage::{Backend, Config, Cupboard};
pub use table::Table;

pub use model::{
    Category, Crumb, CrumbProperty, CrumbState, Link, LinkType, Metadata, Property, Stash,
    StashHistory, StashOperation, StashType, Trail, TrailState, ValueType,
};
