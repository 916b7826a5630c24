//! Time-ordered unique identifiers (UUIDv7 semantics).
//!
//! Every entity id is a UUIDv7 string: a 48-bit millisecond timestamp
//! prefix followed by a counter-seeded random tail. Hyphenated string
//! form sorts lexically in creation order at millisecond granularity,
//! with ties broken by the monotonic counter `uuid::ContextV7` keeps for
//! ids minted within the same millisecond.

use std::sync::Mutex;
use uuid::{ContextV7, Timestamp, Uuid};

static CONTEXT: Mutex<ContextV7> = Mutex::new(ContextV7::new());

/// Generate a fresh time-ordered identifier.
#[must_use]
pub fn new_id() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let context = CONTEXT.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let ts = Timestamp::from_unix(&*context, now.as_secs(), now.subsec_nanos());
    Uuid::new_v7(ts).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
    }

    #[test]
    fn ids_sort_in_creation_order() {
        let mut ids = Vec::new();
        for _ in 0..200 {
            ids.push(new_id());
        }
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted, "UUIDv7 ids should already be lexically sorted");
    }
}
