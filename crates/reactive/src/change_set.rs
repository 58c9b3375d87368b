//! Change set for tracking view result changes.
//!
//! A ChangeSet represents the difference between two ordered states of a
//! result view, expressed purely in terms of positions:
//!
//! - `deletions` are indices into the *previous* state
//! - `insertions` are indices into the *current* state
//! - `modifications` are indices into the previous state of rows that are
//!   still present, kept their relative position and changed content;
//!   `modifications_new` holds the same rows' indices in the current state
//!
//! A row whose position relative to the other surviving rows changed is
//! reported as a deletion at its old index plus an insertion at its new one.

use grantview_core::RowId;
use hashbrown::HashMap;

/// A set of index-level changes between two consecutive states of a view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Indices (previous state) of rows that were removed
    pub deletions: Vec<usize>,
    /// Indices (current state) of rows that were added
    pub insertions: Vec<usize>,
    /// Indices (previous state) of rows that were updated in place
    pub modifications: Vec<usize>,
    /// Indices (current state) of rows that were updated in place
    pub modifications_new: Vec<usize>,
}

impl ChangeSet {
    /// Creates a new empty change set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the change set between two ordered snapshots.
    ///
    /// Each snapshot is the view's sequence of `(row id, row version)` pairs.
    /// A surviving row counts as modified when its version differs.
    pub fn between(old: &[(RowId, u64)], new: &[(RowId, u64)]) -> Self {
        let mut changes = Self::new();

        let old_positions: HashMap<RowId, usize> = old
            .iter()
            .enumerate()
            .map(|(index, (id, _))| (*id, index))
            .collect();
        let new_ids: HashMap<RowId, ()> = new.iter().map(|(id, _)| (*id, ())).collect();

        for (index, (id, _)) in old.iter().enumerate() {
            if !new_ids.contains_key(id) {
                changes.deletions.push(index);
            }
        }

        // Surviving rows in current order: (new index, old index, modified)
        let mut survivors: Vec<(usize, usize, bool)> = Vec::new();
        for (new_index, (id, version)) in new.iter().enumerate() {
            match old_positions.get(id) {
                Some(&old_index) => {
                    let modified = old[old_index].1 != *version;
                    survivors.push((new_index, old_index, modified));
                }
                None => changes.insertions.push(new_index),
            }
        }

        let old_order: Vec<usize> = survivors.iter().map(|(_, old_index, _)| *old_index).collect();
        let stable = longest_increasing_subsequence(&old_order);
        let mut stable_iter = stable.iter().peekable();

        for (position, (new_index, old_index, modified)) in survivors.iter().enumerate() {
            let in_place = stable_iter.peek() == Some(&&position);
            if in_place {
                stable_iter.next();
                if *modified {
                    changes.modifications.push(*old_index);
                    changes.modifications_new.push(*new_index);
                }
            } else {
                changes.deletions.push(*old_index);
                changes.insertions.push(*new_index);
            }
        }

        changes.deletions.sort_unstable();
        changes.insertions.sort_unstable();
        changes.modifications.sort_unstable();
        changes.modifications_new.sort_unstable();
        changes
    }

    /// Returns true if there are no changes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.insertions.is_empty() && self.modifications.is_empty()
    }

    /// Returns the total number of changes.
    #[inline]
    pub fn len(&self) -> usize {
        self.deletions.len() + self.insertions.len() + self.modifications.len()
    }

    /// Replays this change set over `old`, producing the current sequence.
    ///
    /// `new_row` supplies the value at an inserted or modified position of
    /// the current state.
    pub fn apply<T, F>(&self, old: &[T], mut new_row: F) -> Vec<T>
    where
        T: Clone,
        F: FnMut(usize) -> T,
    {
        let mut rows: Vec<Option<T>> = old.iter().cloned().map(Some).collect();
        for &index in &self.deletions {
            if let Some(slot) = rows.get_mut(index) {
                *slot = None;
            }
        }
        let mut rows: Vec<T> = rows.into_iter().flatten().collect();
        for &index in &self.insertions {
            let index_clamped = index.min(rows.len());
            rows.insert(index_clamped, new_row(index));
        }
        for &index in &self.modifications_new {
            if index < rows.len() {
                rows[index] = new_row(index);
            }
        }
        rows
    }
}

/// Returns the positions (ascending) of one longest strictly increasing
/// subsequence of `values`.
fn longest_increasing_subsequence(values: &[usize]) -> Vec<usize> {
    // tails[k] = position of the smallest tail of an increasing run of length k+1
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; values.len()];

    for (position, value) in values.iter().enumerate() {
        let slot = tails.partition_point(|&tail| values[tail] < *value);
        if slot > 0 {
            previous[position] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(position);
        } else {
            tails[slot] = position;
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(position) = cursor {
        result.push(position);
        cursor = previous[position];
    }
    result.reverse();
    result
}
