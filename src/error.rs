//! Stable error surface exposed to callers of the storage engine.
//!
//! Internal plumbing (SQL statement prep, path IO) is free to propagate
//! `anyhow::Error`; it gets mapped to [`CupboardError::Io`] (or a more
//! specific kind, where the call site knows one) at the module boundary so
//! that every public operation returns one of these stable, matchable
//! variants.

use thiserror::Error;

/// Stable, distinguishable error kinds returned by every public operation.
#[derive(Debug, Error)]
pub enum CupboardError {
    #[error("cupboard is already attached")]
    AlreadyAttached,

    #[error("cupboard is not attached")]
    CupboardDetached,

    #[error("backend data directory is empty")]
    BackendEmpty,

    #[error("unknown storage backend: {0}")]
    BackendUnknown(String),

    #[error("unknown table: {0}")]
    TableNotFound(String),

    #[error("id must not be empty")]
    InvalidID,

    #[error("no row with that id")]
    NotFound,

    #[error("name must not be empty")]
    InvalidName,

    #[error("content must not be empty")]
    InvalidContent,

    #[error("holder must not be empty")]
    InvalidHolder,

    #[error("ordinal must be non-negative")]
    InvalidOrdinal,

    #[error("duplicate name: {0}")]
    DuplicateName(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("stash operation not valid for stash type {0}")]
    InvalidStashType(String),

    #[error("lock is held by another holder")]
    LockHeld,

    #[error("caller does not hold the lock")]
    NotLockHolder,

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("durability failure: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, CupboardError>;

impl From<std::io::Error> for CupboardError {
    fn from(e: std::io::Error) -> Self {
        CupboardError::Io(e.to_string())
    }
}

impl From<rusqlite::Error> for CupboardError {
    fn from(e: rusqlite::Error) -> Self {
        CupboardError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CupboardError {
    fn from(e: serde_json::Error) -> Self {
        CupboardError::Io(e.to_string())
    }
}

/// Maps an internal `anyhow::Error` onto the stable surface when no more
/// specific kind applies at the call site.
pub fn io_err(e: anyhow::Error) -> CupboardError {
    CupboardError::Io(e.to_string())
}
