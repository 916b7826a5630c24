//! Index store schema and per-table JSONL registry.
//!
//! The index store is a pure, rebuildable cache: its schema matches the
//! declared attributes of each table (see spec.md §4.11) so that a row
//! read back out of SQLite round-trips through the same struct the JSONL
//! log uses. Column order and storage engine are implementation-private;
//! only the JSONL field set is part of the durable contract.

use rusqlite::{Connection, Result as SqlResult};

pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Every table name the router understands, in the order their JSONL
/// files are created on attach.
pub const TABLE_NAMES: &[&str] = &[
    "crumbs",
    "trails",
    "links",
    "properties",
    "categories",
    "crumb_properties",
    "metadata",
    "stashes",
    "stash_history",
];

/// The JSONL file name for a table, under `data_dir`.
#[must_use]
pub fn jsonl_file_name(table: &str) -> String {
    format!("{table}.jsonl")
}

/// The complete index-store schema. Matches the declared JSONL attributes
/// of each table plus the secondary indexes spec.md §9 requires.
pub const SCHEMA_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS crumbs (
        crumb_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        state TEXT NOT NULL DEFAULT 'draft',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        properties TEXT NOT NULL DEFAULT '{}',
        content_hash TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_crumbs_state ON crumbs(state);
    CREATE INDEX IF NOT EXISTS idx_crumbs_created_at ON crumbs(created_at);

    CREATE TABLE IF NOT EXISTS trails (
        trail_id TEXT PRIMARY KEY,
        state TEXT NOT NULL DEFAULT 'draft',
        created_at TEXT NOT NULL,
        content_hash TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_trails_state ON trails(state);
    CREATE INDEX IF NOT EXISTS idx_trails_created_at ON trails(created_at);

    CREATE TABLE IF NOT EXISTS links (
        link_id TEXT PRIMARY KEY,
        link_type TEXT NOT NULL,
        from_id TEXT NOT NULL,
        to_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        content_hash TEXT,
        UNIQUE(link_type, from_id, to_id)
    );
    CREATE INDEX IF NOT EXISTS idx_links_type_from_to ON links(link_type, from_id, to_id);
    CREATE INDEX IF NOT EXISTS idx_links_from ON links(from_id);
    CREATE INDEX IF NOT EXISTS idx_links_to ON links(to_id);
    CREATE INDEX IF NOT EXISTS idx_links_created_at ON links(created_at);

    CREATE TABLE IF NOT EXISTS properties (
        property_id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        value_type TEXT NOT NULL,
        created_at TEXT NOT NULL,
        content_hash TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_properties_created_at ON properties(created_at);

    CREATE TABLE IF NOT EXISTS categories (
        category_id TEXT PRIMARY KEY,
        property_id TEXT NOT NULL,
        name TEXT NOT NULL,
        ordinal INTEGER NOT NULL,
        content_hash TEXT,
        UNIQUE(property_id, name)
    );
    CREATE INDEX IF NOT EXISTS idx_categories_property ON categories(property_id);

    CREATE TABLE IF NOT EXISTS crumb_properties (
        crumb_id TEXT NOT NULL,
        property_id TEXT NOT NULL,
        value TEXT NOT NULL,
        content_hash TEXT,
        PRIMARY KEY (crumb_id, property_id)
    );
    CREATE INDEX IF NOT EXISTS idx_crumb_properties_crumb ON crumb_properties(crumb_id);
    CREATE INDEX IF NOT EXISTS idx_crumb_properties_property ON crumb_properties(property_id);

    CREATE TABLE IF NOT EXISTS metadata (
        metadata_id TEXT PRIMARY KEY,
        crumb_id TEXT NOT NULL,
        table_name TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        content_hash TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_metadata_crumb ON metadata(crumb_id);
    CREATE INDEX IF NOT EXISTS idx_metadata_table_name ON metadata(table_name);
    CREATE INDEX IF NOT EXISTS idx_metadata_created_at ON metadata(created_at);

    CREATE TABLE IF NOT EXISTS stashes (
        stash_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        stash_type TEXT NOT NULL,
        value TEXT NOT NULL DEFAULT 'null',
        version INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        last_operation TEXT NOT NULL DEFAULT 'create',
        content_hash TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_stashes_type ON stashes(stash_type);
    CREATE INDEX IF NOT EXISTS idx_stashes_name ON stashes(name);
    CREATE INDEX IF NOT EXISTS idx_stashes_created_at ON stashes(created_at);

    CREATE TABLE IF NOT EXISTS stash_history (
        history_id TEXT PRIMARY KEY,
        stash_id TEXT NOT NULL,
        version INTEGER NOT NULL,
        operation TEXT NOT NULL,
        value TEXT NOT NULL DEFAULT 'null',
        created_at TEXT NOT NULL,
        content_hash TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_stash_history_stash_version ON stash_history(stash_id, version);
";

/// Apply the index-store schema. Idempotent: every statement uses
/// `IF NOT EXISTS`, matching the rebuild-on-attach contract of spec.md §2.
///
/// # Errors
/// Returns an error if the DDL batch or pragma updates fail.
pub fn apply_schema(conn: &Connection) -> SqlResult<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "OFF")?;
    Ok(())
}
