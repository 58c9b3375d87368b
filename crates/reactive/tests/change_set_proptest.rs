//! Property-based tests for ChangeSet computation.

use grantview_reactive::ChangeSet;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Builds an ordered snapshot of distinct ids, each with a version.
fn snapshot() -> impl Strategy<Value = Vec<(u64, u64)>> {
    prop::collection::btree_set(0u64..40, 0..25).prop_flat_map(|ids| {
        let ids: Vec<u64> = ids.into_iter().collect();
        let len = ids.len();
        (
            Just(ids).prop_shuffle(),
            prop::collection::vec(1u64..3, len),
        )
            .prop_map(|(ids, versions)| ids.into_iter().zip(versions).collect::<Vec<(u64, u64)>>())
    })
}

proptest! {
    /// Replaying the change set over the old ids yields the new ids.
    #[test]
    fn replay_reconstructs_new_order(old in snapshot(), new in snapshot()) {
        let changes = ChangeSet::between(&old, &new);
        let old_ids: Vec<u64> = old.iter().map(|(id, _)| *id).collect();
        let new_ids: Vec<u64> = new.iter().map(|(id, _)| *id).collect();

        let replayed = changes.apply(&old_ids, |index| new_ids[index]);
        prop_assert_eq!(replayed, new_ids);
    }

    /// Indices are strictly increasing and within the bounds of their state.
    #[test]
    fn indices_are_sorted_and_in_bounds(old in snapshot(), new in snapshot()) {
        let changes = ChangeSet::between(&old, &new);

        for window in changes.deletions.windows(2) {
            prop_assert!(window[0] < window[1]);
        }
        for window in changes.insertions.windows(2) {
            prop_assert!(window[0] < window[1]);
        }
        prop_assert!(changes.deletions.iter().all(|&i| i < old.len()));
        prop_assert!(changes.modifications.iter().all(|&i| i < old.len()));
        prop_assert!(changes.insertions.iter().all(|&i| i < new.len()));
        prop_assert!(changes.modifications_new.iter().all(|&i| i < new.len()));
        prop_assert_eq!(changes.modifications.len(), changes.modifications_new.len());

        // Surviving count is consistent on both sides.
        prop_assert_eq!(
            old.len() - changes.deletions.len(),
            new.len() - changes.insertions.len()
        );
    }

    /// Rows that exist on only one side are always reported.
    #[test]
    fn pure_additions_and_removals_are_reported(old in snapshot(), new in snapshot()) {
        let changes = ChangeSet::between(&old, &new);
        let old_set: BTreeSet<u64> = old.iter().map(|(id, _)| *id).collect();
        let new_set: BTreeSet<u64> = new.iter().map(|(id, _)| *id).collect();

        for (index, (id, _)) in old.iter().enumerate() {
            if !new_set.contains(id) {
                prop_assert!(changes.deletions.contains(&index));
            }
        }
        for (index, (id, _)) in new.iter().enumerate() {
            if !old_set.contains(id) {
                prop_assert!(changes.insertions.contains(&index));
            }
        }
    }
}
