//! Content-hash bookkeeping (SPEC_FULL.md §3 supplement).
//!
//! Not part of the public entity structs; a storage-engine-internal
//! column used for incremental-export hooks, the same role
//! `content_hash`/`get_jsonl_file_hash` play in the teacher's schema.

use sha2::{Digest, Sha256};

/// Sixteen-hex-char digest of a row's declared JSONL representation.
#[must_use]
pub fn content_hash(value: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(value).unwrap_or_default());
    format!("{:x}", hasher.finalize())[..16].to_string()
}
