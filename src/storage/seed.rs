//! Built-in seed properties (spec.md §4.5, "well-known" properties every
//! fresh cupboard starts with). Seeding goes through the normal
//! `properties::set`/`categories::set` entry points so the property-create
//! backfill cascade runs exactly as it would for a caller-defined
//! property, and is skipped entirely once any property already exists —
//! attach is idempotent, not destructive.

use crate::dirty::DirtySet;
use crate::drivers::{categories, properties};
use crate::error::Result;
use crate::model::{Category, Property, ValueType};
use chrono::Utc;
use rusqlite::Transaction;

struct SeedCategory {
    name: &'static str,
    ordinal: i64,
}

struct SeedProperty {
    name: &'static str,
    description: &'static str,
    value_type: ValueType,
    categories: &'static [SeedCategory],
}

const SEED_PROPERTIES: &[SeedProperty] = &[
    SeedProperty {
        name: "priority",
        description: "relative urgency",
        value_type: ValueType::Categorical,
        categories: &[
            SeedCategory { name: "highest", ordinal: 0 },
            SeedCategory { name: "high", ordinal: 1 },
            SeedCategory { name: "medium", ordinal: 2 },
            SeedCategory { name: "low", ordinal: 3 },
            SeedCategory { name: "lowest", ordinal: 4 },
        ],
    },
    SeedProperty {
        name: "type",
        description: "kind of work",
        value_type: ValueType::Categorical,
        categories: &[
            SeedCategory { name: "task", ordinal: 0 },
            SeedCategory { name: "bug", ordinal: 1 },
            SeedCategory { name: "chore", ordinal: 2 },
        ],
    },
    SeedProperty { name: "description", description: "free-form detail", value_type: ValueType::Text, categories: &[] },
    SeedProperty { name: "owner", description: "assignee", value_type: ValueType::Text, categories: &[] },
    SeedProperty { name: "labels", description: "free-form tags", value_type: ValueType::List, categories: &[] },
];

/// Seed the built-in properties if the properties table is empty.
/// Returns the set of tables the seed touched, for the caller to write
/// back to JSONL.
pub(crate) fn ensure_seeded(tx: &Transaction) -> Result<DirtySet> {
    let mut dirty = DirtySet::default();
    let existing_count: i64 = tx.query_row("SELECT COUNT(*) FROM properties", [], |row| row.get(0))?;
    if existing_count > 0 {
        return Ok(dirty);
    }

    for seed in SEED_PROPERTIES {
        let property_id = properties::set(
            tx,
            &mut dirty,
            None,
            Property {
                property_id: String::new(),
                name: seed.name.to_string(),
                description: seed.description.to_string(),
                value_type: seed.value_type,
                created_at: Utc::now(),
            },
        )?;
        for category in seed.categories {
            categories::set(
                tx,
                &mut dirty,
                None,
                Category {
                    category_id: String::new(),
                    property_id: property_id.clone(),
                    name: category.name.to_string(),
                    ordinal: category.ordinal,
                },
            )?;
        }
    }

    Ok(dirty)
}
