//! Engine rows.
//!
//! A `Row` is what the engine hands out for a single record: a stable
//! identifier, a version bumped on every write, and the cell values in
//! schema column order. Change detection compares `(id, version)` pairs,
//! so two rows with the same id and different versions are the same
//! record in different states.

use crate::value::Value;
use alloc::vec::Vec;

/// Stable identifier of a record for the lifetime of its table.
pub type RowId = u64;

#[derive(Clone, Debug)]
pub struct Row {
    id: RowId,
    version: u64,
    values: Vec<Value>,
}

impl Row {
    /// Creates a freshly inserted row at version 1.
    pub fn new(id: RowId, values: Vec<Value>) -> Self {
        Self::new_with_version(id, 1, values)
    }

    pub fn new_with_version(id: RowId, version: u64, values: Vec<Value>) -> Self {
        Self { id, version, values }
    }

    #[inline]
    pub fn id(&self) -> RowId {
        self.id
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The `(id, version)` pair used to diff result snapshots.
    #[inline]
    pub fn stamp(&self) -> (RowId, u64) {
        (self.id, self.version)
    }

    /// Marks the row as written and returns the new version.
    #[inline]
    pub fn increment_version(&mut self) -> u64 {
        self.version = self.version.wrapping_add(1);
        self.version
    }

    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Cell at column position `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Overwrites the cell at `index`. Returns false when the row has no
    /// such column; the version is left alone either way.
    pub fn set(&mut self, index: usize, value: Value) -> bool {
        match self.values.get_mut(index) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Rows are equal when they hold the same record with the same cells,
/// whatever their versions.
impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.values == other.values
    }
}

impl Eq for Row {}
