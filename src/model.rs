//! Entity schemas and state machines.
//!
//! Every struct here is the shape a caller gets back from `Table::get`/
//! `Table::fetch` and the shape the JSONL log persists (minus
//! storage-engine bookkeeping fields, which never leave this crate). Field
//! names are snake_case on the wire; `#[serde(default)]` on every field is
//! the tolerant-decode contract from spec.md §4.11 — a field missing from
//! an older or newer generation's JSONL line decodes to its type default
//! rather than failing the whole line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_else(Utc::now)
}

/// Crumb state machine: `draft -> {pending, ready, taken, dust}`, etc.
/// See spec.md §3 for the full transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrumbState {
    #[default]
    Draft,
    Pending,
    Ready,
    Taken,
    Pebble,
    Dust,
}

impl CrumbState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Taken => "taken",
            Self::Pebble => "pebble",
            Self::Dust => "dust",
        }
    }

    /// Whether `self -> to` is an allowed transition.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        use CrumbState::{Dust, Pebble, Pending, Ready, Taken};
        if to == Dust {
            return !matches!(self, Pebble | Dust);
        }
        matches!(
            (self, to),
            (Self::Draft, Pending | Ready | Taken)
                | (Pending, Ready | Taken)
                | (Ready, Taken)
                | (Taken, Pebble)
        )
    }
}

impl std::str::FromStr for CrumbState {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "ready" => Ok(Self::Ready),
            "taken" => Ok(Self::Taken),
            "pebble" => Ok(Self::Pebble),
            "dust" => Ok(Self::Dust),
            _ => Err(()),
        }
    }
}

/// Trail state machine: `draft -> active -> {completed, abandoned}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrailState {
    #[default]
    Draft,
    Active,
    Completed,
    Abandoned,
}

impl TrailState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Draft, Self::Active)
                | (Self::Active, Self::Completed | Self::Abandoned)
        )
    }
}

impl std::str::FromStr for TrailState {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "abandoned" => Ok(Self::Abandoned),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    #[default]
    BelongsTo,
    ChildOf,
    BranchesFrom,
    ScopedTo,
}

impl LinkType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BelongsTo => "belongs_to",
            Self::ChildOf => "child_of",
            Self::BranchesFrom => "branches_from",
            Self::ScopedTo => "scoped_to",
        }
    }
}

impl std::str::FromStr for LinkType {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "belongs_to" => Ok(Self::BelongsTo),
            "child_of" => Ok(Self::ChildOf),
            "branches_from" => Ok(Self::BranchesFrom),
            "scoped_to" => Ok(Self::ScopedTo),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    Categorical,
    Text,
    Integer,
    Boolean,
    Timestamp,
    List,
}

impl ValueType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Categorical => "categorical",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
            Self::List => "list",
        }
    }
}

impl std::str::FromStr for ValueType {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "categorical" => Ok(Self::Categorical),
            "text" => Ok(Self::Text),
            "integer" => Ok(Self::Integer),
            "boolean" => Ok(Self::Boolean),
            "timestamp" => Ok(Self::Timestamp),
            "list" => Ok(Self::List),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StashType {
    #[default]
    Resource,
    Artifact,
    Context,
    Counter,
    Lock,
}

impl StashType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Artifact => "artifact",
            Self::Context => "context",
            Self::Counter => "counter",
            Self::Lock => "lock",
        }
    }
}

impl std::str::FromStr for StashType {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resource" => Ok(Self::Resource),
            "artifact" => Ok(Self::Artifact),
            "context" => Ok(Self::Context),
            "counter" => Ok(Self::Counter),
            "lock" => Ok(Self::Lock),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StashOperation {
    #[default]
    Create,
    Set,
    Increment,
    Acquire,
    Release,
}

impl StashOperation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Set => "set",
            Self::Increment => "increment",
            Self::Acquire => "acquire",
            Self::Release => "release",
        }
    }
}

impl std::str::FromStr for StashOperation {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "set" => Ok(Self::Set),
            "increment" => Ok(Self::Increment),
            "acquire" => Ok(Self::Acquire),
            "release" => Ok(Self::Release),
            _ => Err(()),
        }
    }
}

/// A unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crumb {
    #[serde(default)]
    pub crumb_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: CrumbState,
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "epoch")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// A container/epic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trail {
    #[serde(default)]
    pub trail_id: String,
    #[serde(default)]
    pub state: TrailState,
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
}

/// A directed typed edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub link_id: String,
    #[serde(default)]
    pub link_type: LinkType,
    #[serde(default)]
    pub from_id: String,
    #[serde(default)]
    pub to_id: String,
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
}

/// A definition of a typed crumb attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(default)]
    pub property_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
}

/// An ordered label for a categorical property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub property_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ordinal: i64,
}

/// A materialized `(crumb_id, property_id) -> value` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrumbProperty {
    #[serde(default)]
    pub crumb_id: String,
    #[serde(default)]
    pub property_id: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Free-form content tied to a crumb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub metadata_id: String,
    #[serde(default)]
    pub crumb_id: String,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
}

/// A typed shared cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stash {
    #[serde(default)]
    pub stash_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stash_type: StashType,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default = "one")]
    pub version: i64,
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_operation: StashOperation,
}

fn one() -> i64 {
    1
}

/// Append-only snapshot of a stash mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StashHistory {
    #[serde(default)]
    pub history_id: String,
    #[serde(default)]
    pub stash_id: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub operation: StashOperation,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
}

impl Stash {
    /// `set_value(v)`: resource/artifact/context only (spec.md §4.9).
    pub fn apply_set_value(&mut self, value: serde_json::Value) -> crate::error::Result<()> {
        use crate::error::CupboardError;
        match self.stash_type {
            StashType::Resource | StashType::Artifact | StashType::Context => {
                self.value = value;
                self.version += 1;
                self.last_operation = StashOperation::Set;
                Ok(())
            }
            other => Err(CupboardError::InvalidStashType(other.as_str().to_string())),
        }
    }

    /// `increment(delta)`: counter only. Returns the new value.
    pub fn apply_increment(&mut self, delta: i64) -> crate::error::Result<i64> {
        use crate::error::CupboardError;
        if self.stash_type != StashType::Counter {
            return Err(CupboardError::InvalidStashType(self.stash_type.as_str().to_string()));
        }
        let current = self
            .value
            .get("value")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0);
        let next = current + delta;
        self.value = serde_json::json!({ "value": next });
        self.version += 1;
        self.last_operation = StashOperation::Increment;
        Ok(next)
    }

    /// `acquire(holder)`: lock only. Returns `true` if state actually
    /// changed (a reentrant re-acquire by the current holder is a
    /// true no-op: no version bump, no history row).
    pub fn apply_acquire(&mut self, holder: &str) -> crate::error::Result<bool> {
        use crate::error::CupboardError;
        if self.stash_type != StashType::Lock {
            return Err(CupboardError::InvalidStashType(self.stash_type.as_str().to_string()));
        }
        if holder.trim().is_empty() {
            return Err(CupboardError::InvalidHolder);
        }
        match self.value.get("holder").and_then(|v| v.as_str()) {
            None => {
                self.value = serde_json::json!({ "holder": holder, "acquired_at": Utc::now().to_rfc3339() });
                self.version += 1;
                self.last_operation = StashOperation::Acquire;
                Ok(true)
            }
            Some(current) if current == holder => Ok(false),
            Some(_) => Err(CupboardError::LockHeld),
        }
    }

    /// `release(holder)`: lock only.
    pub fn apply_release(&mut self, holder: &str) -> crate::error::Result<()> {
        use crate::error::CupboardError;
        if self.stash_type != StashType::Lock {
            return Err(CupboardError::InvalidStashType(self.stash_type.as_str().to_string()));
        }
        match self.value.get("holder").and_then(|v| v.as_str()) {
            Some(current) if current == holder => {
                self.value = serde_json::Value::Null;
                self.version += 1;
                self.last_operation = StashOperation::Release;
                Ok(())
            }
            _ => Err(CupboardError::NotLockHolder),
        }
    }
}

/// Default value for a property's value type, used both when backfilling
/// existing crumbs on property creation and when populating a freshly
/// created crumb's `properties` map.
#[must_use]
pub fn default_for(value_type: ValueType, first_category_id: Option<&str>) -> serde_json::Value {
    match value_type {
        ValueType::Categorical => {
            serde_json::Value::String(first_category_id.unwrap_or("").to_string())
        }
        ValueType::Text => serde_json::Value::String(String::new()),
        ValueType::Integer => serde_json::Value::from(0),
        ValueType::Boolean => serde_json::Value::Bool(false),
        ValueType::Timestamp => serde_json::Value::String(epoch().to_rfc3339()),
        ValueType::List => serde_json::Value::Array(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crumb_state_transitions() {
        assert!(CrumbState::Draft.can_transition_to(CrumbState::Taken));
        assert!(CrumbState::Taken.can_transition_to(CrumbState::Pebble));
        assert!(!CrumbState::Draft.can_transition_to(CrumbState::Pebble));
        assert!(!CrumbState::Pebble.can_transition_to(CrumbState::Dust));
        assert!(CrumbState::Ready.can_transition_to(CrumbState::Dust));
    }

    #[test]
    fn trail_state_transitions() {
        assert!(TrailState::Draft.can_transition_to(TrailState::Active));
        assert!(TrailState::Active.can_transition_to(TrailState::Completed));
        assert!(!TrailState::Completed.can_transition_to(TrailState::Active));
    }

    #[test]
    fn tolerant_decode_ignores_unknown_fields_and_defaults_missing() {
        let line = r#"{"crumb_id":"abc","name":"X","state":"draft","future_field":"ignored","tags":["a","b"]}"#;
        let crumb: Crumb = serde_json::from_str(line).unwrap();
        assert_eq!(crumb.crumb_id, "abc");
        assert_eq!(crumb.name, "X");
        assert_eq!(crumb.state, CrumbState::Draft);
        assert!(crumb.properties.is_empty());
    }

    fn stash(stash_type: StashType) -> Stash {
        Stash {
            stash_id: "s1".into(),
            name: "s".into(),
            stash_type,
            value: serde_json::Value::Null,
            version: 1,
            created_at: epoch(),
            last_operation: StashOperation::Create,
        }
    }

    #[test]
    fn increment_rejects_non_counter_stashes() {
        let mut s = stash(StashType::Lock);
        assert!(matches!(s.apply_increment(1), Err(crate::error::CupboardError::InvalidStashType(_))));
    }

    #[test]
    fn acquire_rejects_empty_holder() {
        let mut s = stash(StashType::Lock);
        assert!(matches!(s.apply_acquire(""), Err(crate::error::CupboardError::InvalidHolder)));
    }

    #[test]
    fn release_without_prior_acquire_is_rejected() {
        let mut s = stash(StashType::Lock);
        assert!(matches!(s.apply_release("alice"), Err(crate::error::CupboardError::NotLockHolder)));
    }
}
