//! Filter grammar (spec.md §6.4): a mapping from recognized string keys to
//! scalar (equality) or list (membership OR) values, AND-combined across
//! keys, with optional `limit`/`offset` applied after ordering.

use crate::error::{CupboardError, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// A filter is a mapping from string keys to scalar or list values.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    fields: BTreeMap<String, Value>,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    #[must_use]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Reject any key not in `allowed` (plus the always-allowed `limit`/
    /// `offset`) with `InvalidFilter`.
    pub fn validate_keys(&self, allowed: &[&str]) -> Result<()> {
        for key in self.fields.keys() {
            if key == "limit" || key == "offset" {
                continue;
            }
            if !allowed.contains(&key.as_str()) {
                return Err(CupboardError::InvalidFilter(format!(
                    "unrecognized filter key: {key}"
                )));
            }
        }
        Ok(())
    }

    /// Extract a non-negative integer key (`limit`/`offset`), validating
    /// its shape.
    pub fn non_negative_int(&self, key: &str) -> Result<Option<u64>> {
        match self.fields.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| CupboardError::InvalidFilter(format!("{key} must be a non-negative integer"))),
            Some(_) => Err(CupboardError::InvalidFilter(format!(
                "{key} must be a non-negative integer"
            ))),
        }
    }

    pub fn limit(&self) -> Result<Option<u64>> {
        self.non_negative_int("limit")
    }

    pub fn offset(&self) -> Result<Option<u64>> {
        self.non_negative_int("offset")
    }

    /// Values for `key` as a set of strings for OR-membership matching; a
    /// scalar value is treated as a singleton set.
    pub fn string_set(&self, key: &str) -> Result<Option<Vec<String>>> {
        match self.fields.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => out.push(s.clone()),
                        _ => {
                            return Err(CupboardError::InvalidFilter(format!(
                                "{key} list entries must be strings"
                            )))
                        }
                    }
                }
                Ok(Some(out))
            }
            Some(_) => Err(CupboardError::InvalidFilter(format!(
                "{key} must be a string or list of strings"
            ))),
        }
    }

    /// A single scalar string value for `key`; lists are rejected.
    pub fn string(&self, key: &str) -> Result<Option<String>> {
        match self.fields.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(CupboardError::InvalidFilter(format!("{key} must be a string"))),
        }
    }
}

/// Apply `limit`/`offset` to an already-ordered row set.
pub fn paginate<T>(mut rows: Vec<T>, offset: Option<u64>, limit: Option<u64>) -> Vec<T> {
    if let Some(offset) = offset {
        let offset = offset as usize;
        if offset >= rows.len() {
            return Vec::new();
        }
        rows.drain(..offset);
    }
    if let Some(limit) = limit {
        rows.truncate(limit as usize);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_keys() {
        let f = Filter::new().with("bogus", "x");
        assert!(f.validate_keys(&["state"]).is_err());
    }

    #[test]
    fn accepts_limit_offset_always() {
        let f = Filter::new().with("limit", 5).with("offset", 2);
        assert!(f.validate_keys(&["state"]).is_ok());
        assert_eq!(f.limit().unwrap(), Some(5));
        assert_eq!(f.offset().unwrap(), Some(2));
    }

    #[test]
    fn string_set_handles_scalar_and_list() {
        let f = Filter::new().with("states", "draft");
        assert_eq!(f.string_set("states").unwrap(), Some(vec!["draft".to_string()]));

        let f = Filter::new().with("states", serde_json::json!(["draft", "ready"]));
        assert_eq!(
            f.string_set("states").unwrap(),
            Some(vec!["draft".to_string(), "ready".to_string()])
        );
    }

    #[test]
    fn paginate_applies_offset_then_limit() {
        let rows = vec![1, 2, 3, 4, 5];
        assert_eq!(paginate(rows.clone(), Some(1), Some(2)), vec![2, 3]);
        assert_eq!(paginate(rows.clone(), Some(10), None), Vec::<i32>::new());
        assert_eq!(paginate(rows, None, Some(2)), vec![1, 2]);
    }
}
