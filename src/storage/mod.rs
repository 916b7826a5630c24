//! Engine lifecycle: attach/detach and the dual-store consistency model
//! (spec.md §2, §5, §6). Every mutation runs inside [`Cupboard::with_txn`],
//! which keeps the SQLite index and the JSONL log consistent by rewriting
//! each touched table's JSONL file from the just-committed index-store
//! contents before the index transaction itself commits.

pub mod schema;
pub mod seed;

use crate::dirty::DirtySet;
use crate::drivers::{categories, crumb_properties, crumbs, links, metadata, properties, stashes, trails};
use crate::error::{CupboardError, Result};
use crate::filter::Filter;
use crate::jsonl;
use crate::storage::schema::{apply_schema, jsonl_file_name, TABLE_NAMES};
use crate::table::{self, Table};
use rusqlite::{Connection, Transaction};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Which physical index store backs a `Cupboard`. SQLite is the only
/// backend this engine ships; the enum exists so `Config` has a real
/// extension point rather than a stringly-typed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Sqlite,
}

impl std::str::FromStr for Backend {
    type Err = CupboardError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(Self::Sqlite),
            other => Err(CupboardError::BackendUnknown(other.to_string())),
        }
    }
}

/// Where a cupboard's durable state lives and which backend indexes it.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,
    pub data_dir: PathBuf,
}

impl Config {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { backend: Backend::Sqlite, data_dir: data_dir.into() }
    }
}

const INDEX_FILE_NAME: &str = "index.db";

struct EngineState {
    data_dir: PathBuf,
    conn: Connection,
}

/// The storage engine handle. A `Cupboard` starts detached; call
/// [`Cupboard::attach`] before issuing any table operation.
///
/// `Connection` is not `Sync`, so every attached cupboard is guarded by a
/// single mutex rather than a finer-grained lock: reads and writes both
/// take it, trading the "reads don't block writes" aspiration of a
/// multi-reader design for a correct, simple single-writer one.
pub struct Cupboard {
    state: Mutex<Option<EngineState>>,
}

impl Cupboard {
    #[must_use]
    pub fn new() -> Self {
        Self { state: Mutex::new(None) }
    }

    /// Attach to `config.data_dir`: ensure every table's JSONL file
    /// exists, rebuild the SQLite index store from the JSONL contents,
    /// and seed built-in properties/categories on a fresh cupboard
    /// (spec.md §2).
    ///
    /// # Errors
    /// `AlreadyAttached` if a cupboard is already attached,
    /// `BackendEmpty`/`BackendUnknown` for a malformed config, or `Io`
    /// for a filesystem or index-rebuild failure.
    pub fn attach(&self, config: &Config) -> Result<()> {
        let mut guard = self.state.lock().expect("cupboard mutex poisoned");
        if guard.is_some() {
            return Err(CupboardError::AlreadyAttached);
        }
        if config.data_dir.as_os_str().is_empty() {
            return Err(CupboardError::BackendEmpty);
        }
        if config.backend != Backend::Sqlite {
            return Err(CupboardError::BackendUnknown(format!("{:?}", config.backend)));
        }

        std::fs::create_dir_all(&config.data_dir)?;

        // The index is a pure cache: always rebuilt from scratch on
        // attach so a stale index.db left over from an unclean shutdown
        // never shadows the JSONL log (spec.md §2).
        let index_path = config.data_dir.join(INDEX_FILE_NAME);
        if index_path.exists() {
            std::fs::remove_file(&index_path)?;
        }
        let mut conn = Connection::open(&index_path)?;
        apply_schema(&conn)?;
        rebuild_index_from_jsonl(&mut conn, &config.data_dir)?;

        let mut state = EngineState { data_dir: config.data_dir.clone(), conn };
        let tx = state.conn.transaction()?;
        let dirty = seed::ensure_seeded(&tx)?;
        for table in &dirty {
            write_back_table(&tx, &state.data_dir, table)?;
        }
        tx.commit()?;

        tracing::info!(data_dir = %config.data_dir.display(), "cupboard attached");
        *guard = Some(state);
        Ok(())
    }

    /// Detach: drop the SQLite connection and delete the index file,
    /// leaving the JSONL log as the sole durable state (spec.md §2).
    ///
    /// # Errors
    /// `CupboardDetached` if no cupboard is attached.
    pub fn detach(&self) -> Result<()> {
        let mut guard = self.state.lock().expect("cupboard mutex poisoned");
        let state = guard.take().ok_or(CupboardError::CupboardDetached)?;
        drop(state.conn);
        for suffix in ["", "-wal", "-shm"] {
            let path = state.data_dir.join(format!("{INDEX_FILE_NAME}{suffix}"));
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }
        tracing::info!("cupboard detached");
        Ok(())
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.state.lock().expect("cupboard mutex poisoned").is_some()
    }

    /// Run `f` inside one index-store transaction, then rewrite the
    /// JSONL file for every table `f` marked dirty before committing.
    /// A panic or error inside `f` rolls the transaction back and
    /// touches no JSONL file.
    ///
    /// # Errors
    /// `CupboardDetached` if no cupboard is attached; otherwise whatever
    /// `f` returns, or `Io` if a JSONL rewrite or the commit fails.
    pub fn with_txn<T>(&self, f: impl FnOnce(&Transaction, &mut DirtySet) -> Result<T>) -> Result<T> {
        let mut guard = self.state.lock().expect("cupboard mutex poisoned");
        let state = guard.as_mut().ok_or(CupboardError::CupboardDetached)?;

        let tx = state.conn.transaction()?;
        let mut dirty = DirtySet::default();
        let result = f(&tx, &mut dirty)?;

        for table in &dirty {
            write_back_table(&tx, &state.data_dir, table)?;
        }
        tx.commit()?;
        Ok(result)
    }

    /// Fetch one row by id from a table addressed by name (spec.md §9's
    /// generic router). Prefer the typed `drivers` modules when the
    /// table is known at compile time.
    ///
    /// # Errors
    /// `CupboardDetached`, `TableNotFound`, `InvalidID`, or `NotFound`.
    pub fn get(&self, table: Table, id: &str) -> Result<Value> {
        self.with_txn(|tx, _dirty| table::get(tx, table, id))
    }

    /// Query a table addressed by name with a generic [`Filter`].
    ///
    /// # Errors
    /// `CupboardDetached`, `TableNotFound`, or `InvalidFilter`.
    pub fn fetch(&self, table: Table, filter: &Filter) -> Result<Vec<Value>> {
        self.with_txn(|tx, _dirty| table::fetch(tx, table, filter))
    }

    /// Create (when `id` is `None`) or update a row in a table addressed
    /// by name, from a JSON value shaped like that table's entity struct.
    ///
    /// # Errors
    /// `CupboardDetached`, `TableNotFound`, or whatever validation error
    /// the target table's `set` raises.
    pub fn set(&self, table: Table, id: Option<String>, value: Value) -> Result<String> {
        self.with_txn(|tx, dirty| table::set(tx, dirty, table, id, value))
    }

    /// Delete a row (and run its cascades) in a table addressed by name.
    ///
    /// # Errors
    /// `CupboardDetached`, `TableNotFound`, `InvalidID`, or `NotFound`.
    pub fn delete(&self, table: Table, id: &str) -> Result<()> {
        self.with_txn(|tx, dirty| table::delete(tx, dirty, table, id))
    }

    /// The storage-engine-internal `content_hash` bookkeeping value for a
    /// row, keyed by the table's single-column id. Diagnostic only: not
    /// part of any public entity struct.
    ///
    /// # Errors
    /// `CupboardDetached`, `InvalidID` (composite-keyed tables have no
    /// single id), or `NotFound`.
    pub fn content_hash(&self, table: Table, id: &str) -> Result<String> {
        self.with_txn(|tx, _dirty| table::content_hash(tx, table, id))
    }

    /// Append-only history for a stash, oldest version first.
    ///
    /// # Errors
    /// `CupboardDetached`, `InvalidID`, or `NotFound` if the stash
    /// doesn't exist.
    pub fn stash_history(&self, stash_id: &str) -> Result<Vec<crate::model::StashHistory>> {
        self.with_txn(|tx, _dirty| {
            stashes::get(tx, stash_id)?;
            stashes::fetch_history(tx, stash_id)
        })
    }

    /// `set_value(stash_id, value)`: resource/artifact/context stashes only.
    ///
    /// # Errors
    /// `CupboardDetached`, `NotFound`, or `InvalidStashType`.
    pub fn stash_set_value(&self, stash_id: &str, value: Value) -> Result<crate::model::Stash> {
        self.with_txn(|tx, dirty| stashes::set_value(tx, dirty, stash_id, value))
    }

    /// `increment(stash_id, delta)`: counter stashes only.
    ///
    /// # Errors
    /// `CupboardDetached`, `NotFound`, or `InvalidStashType`.
    pub fn stash_increment(&self, stash_id: &str, delta: i64) -> Result<crate::model::Stash> {
        self.with_txn(|tx, dirty| stashes::increment(tx, dirty, stash_id, delta))
    }

    /// `acquire(stash_id, holder)`: lock stashes only. A reentrant
    /// re-acquire by the current holder is a no-op.
    ///
    /// # Errors
    /// `CupboardDetached`, `NotFound`, `InvalidStashType`, `InvalidHolder`,
    /// or `LockHeld`.
    pub fn stash_acquire(&self, stash_id: &str, holder: &str) -> Result<crate::model::Stash> {
        self.with_txn(|tx, dirty| stashes::acquire(tx, dirty, stash_id, holder))
    }

    /// `release(stash_id, holder)`: lock stashes only.
    ///
    /// # Errors
    /// `CupboardDetached`, `NotFound`, `InvalidStashType`, or
    /// `NotLockHolder`.
    pub fn stash_release(&self, stash_id: &str, holder: &str) -> Result<crate::model::Stash> {
        self.with_txn(|tx, dirty| stashes::release(tx, dirty, stash_id, holder))
    }
}

impl Default for Cupboard {
    fn default() -> Self {
        Self::new()
    }
}

/// Rebuild every table's index-store rows from its JSONL file. Tolerant:
/// malformed JSONL lines are skipped, never fatal (spec.md §7).
fn rebuild_index_from_jsonl(conn: &mut Connection, data_dir: &Path) -> Result<()> {
    let tx = conn.transaction()?;
    for table in TABLE_NAMES {
        let path = data_dir.join(jsonl_file_name(table));
        jsonl::ensure_exists(&path)?;
        load_table(&tx, table, &path)?;
    }
    tx.commit()?;
    Ok(())
}

fn load_table(tx: &Transaction, table: &str, path: &Path) -> Result<()> {
    match table {
        "crumbs" => for row in jsonl::load(path)? { crumbs::restore(tx, &row)?; },
        "trails" => for row in jsonl::load(path)? { trails::restore(tx, &row)?; },
        "links" => for row in jsonl::load(path)? { links::restore(tx, &row)?; },
        "properties" => for row in jsonl::load(path)? { properties::restore(tx, &row)?; },
        "categories" => for row in jsonl::load(path)? { categories::restore(tx, &row)?; },
        "crumb_properties" => for row in jsonl::load::<crate::model::CrumbProperty>(path)? {
            crumb_properties::upsert(tx, &mut DirtySet::default(), &row.crumb_id, &row.property_id, &row.value)?;
        },
        "metadata" => for row in jsonl::load(path)? { metadata::restore(tx, &row)?; },
        "stashes" => for row in jsonl::load(path)? { stashes::restore(tx, &row)?; },
        "stash_history" => for row in jsonl::load(path)? { stashes::restore_history(tx, &row)?; },
        other => return Err(CupboardError::TableNotFound(other.to_string())),
    }
    Ok(())
}

/// Rewrite one table's JSONL file from the index store's current,
/// uncommitted-but-visible transaction state (spec.md §6.1).
fn write_back_table(tx: &Transaction, data_dir: &Path, table: &str) -> Result<()> {
    let path = data_dir.join(jsonl_file_name(table));
    match table {
        "crumbs" => jsonl::rewrite(&path, &crumbs::list_all(tx)?)?,
        "trails" => jsonl::rewrite(&path, &trails::list_all(tx)?)?,
        "links" => jsonl::rewrite(&path, &links::list_all(tx)?)?,
        "properties" => jsonl::rewrite(&path, &properties::list_all(tx)?)?,
        "categories" => jsonl::rewrite(&path, &categories::list_all(tx)?)?,
        "crumb_properties" => jsonl::rewrite(&path, &crumb_properties::list_all(tx)?)?,
        "metadata" => jsonl::rewrite(&path, &metadata::list_all(tx)?)?,
        "stashes" => jsonl::rewrite(&path, &stashes::list_all(tx)?)?,
        "stash_history" => {
            let mut all = Vec::new();
            for stash in stashes::list_all(tx)? {
                all.extend(stashes::fetch_history(tx, &stash.stash_id)?);
            }
            jsonl::rewrite(&path, &all)?;
        }
        other => return Err(CupboardError::TableNotFound(other.to_string())),
    }
    Ok(())
}
