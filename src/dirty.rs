//! The set of tables touched within one logical transaction.
//!
//! Every driver mutation and every cascade step records which table(s) it
//! touched here; at commit time the engine rewrites the JSONL file for
//! each dirty table from the just-committed index-store contents.

pub type DirtySet = std::collections::HashSet<&'static str>;
