//! Property-based coverage for the crumb/trail state-machine transition
//! closure and link uniqueness (SPEC_FULL.md §8 "[AMBIENT] Test tooling").

use cupboard::{Backend, Config, Cupboard, CrumbState, Table, TrailState};
use proptest::prelude::*;
use tempfile::TempDir;

fn any_crumb_state() -> impl Strategy<Value = CrumbState> {
    prop_oneof![
        Just(CrumbState::Draft),
        Just(CrumbState::Pending),
        Just(CrumbState::Ready),
        Just(CrumbState::Taken),
        Just(CrumbState::Pebble),
        Just(CrumbState::Dust),
    ]
}

fn any_trail_state() -> impl Strategy<Value = TrailState> {
    prop_oneof![
        Just(TrailState::Draft),
        Just(TrailState::Active),
        Just(TrailState::Completed),
        Just(TrailState::Abandoned),
    ]
}

proptest! {
    /// `pebble` and `dust` are terminal: no state reachable from either.
    #[test]
    fn crumb_pebble_and_dust_have_no_outgoing_transitions(to in any_crumb_state()) {
        prop_assert!(!CrumbState::Pebble.can_transition_to(to));
        prop_assert!(!CrumbState::Dust.can_transition_to(to));
    }

    /// Every non-terminal crumb state can reach `dust`; terminal states
    /// cannot reach anything, `dust` included.
    #[test]
    fn crumb_dust_is_reachable_from_every_non_terminal_state(from in any_crumb_state()) {
        let expected = !matches!(from, CrumbState::Pebble | CrumbState::Dust);
        prop_assert_eq!(from.can_transition_to(CrumbState::Dust), expected);
    }

    /// The transition relation is irreflexive: a state never transitions
    /// to itself.
    #[test]
    fn crumb_transitions_are_irreflexive(s in any_crumb_state()) {
        prop_assert!(!s.can_transition_to(s));
    }

    #[test]
    fn trail_transitions_are_irreflexive(s in any_trail_state()) {
        prop_assert!(!s.can_transition_to(s));
    }

    /// `completed` and `abandoned` are terminal trail states.
    #[test]
    fn trail_completed_and_abandoned_have_no_outgoing_transitions(to in any_trail_state()) {
        prop_assert!(!TrailState::Completed.can_transition_to(to));
        prop_assert!(!TrailState::Abandoned.can_transition_to(to));
    }

    /// At most one `belongs_to` link survives per crumb, regardless of how
    /// many trails contend to claim it (spec.md §3's cardinality rule).
    #[test]
    fn belongs_to_allows_at_most_one_survivor_per_crumb(trail_count in 1usize..6) {
        let dir = TempDir::new().unwrap();
        let cupboard = Cupboard::new();
        cupboard.attach(&Config { backend: Backend::Sqlite, data_dir: dir.path().to_path_buf() }).unwrap();

        let crumb_id = cupboard.set(Table::Crumbs, None, serde_json::json!({ "name": "contended" })).unwrap();
        let mut successes = 0;
        for _ in 0..trail_count {
            let trail_id = cupboard.set(Table::Trails, None, serde_json::json!({})).unwrap();
            let result = cupboard.set(
                Table::Links,
                None,
                serde_json::json!({ "link_type": "belongs_to", "from_id": crumb_id, "to_id": trail_id }),
            );
            if result.is_ok() {
                successes += 1;
            }
        }

        prop_assert_eq!(successes, 1, "exactly the first belongs_to link should survive");
        cupboard.detach().unwrap();
    }
}
