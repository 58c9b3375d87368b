//! Write batches and their undo journal.

use super::Store;
use grantview_core::{EngineError, Result, Row, RowId, Value};

/// A single undo record.
#[derive(Clone, Debug)]
enum JournalEntry {
    /// A row was inserted; undo removes it.
    Insert { row_id: RowId },
    /// A row was updated; undo restores `old`.
    Update { old: Row },
    /// A row was deleted; undo puts it back.
    Delete { row: Row },
}

/// The set of writes applied by one [`MemoryEngine::advance`] call.
///
/// Values are validated against the schema as they are written. If the
/// closure passed to `advance` fails, every write already made through the
/// batch is rolled back and no notification is sent.
///
/// [`MemoryEngine::advance`]: super::MemoryEngine::advance
pub struct Batch<'a> {
    store: &'a mut Store,
    journal: Vec<JournalEntry>,
}

impl<'a> Batch<'a> {
    pub(super) fn new(store: &'a mut Store) -> Self {
        Self {
            store,
            journal: Vec::new(),
        }
    }

    /// Inserts a row and returns its id.
    pub fn insert(&mut self, values: Vec<Value>) -> Result<RowId> {
        let values = self.store.validate(values)?;
        let row_id = self.store.next_id;
        self.store.next_id += 1;
        self.store.rows.insert(row_id, Row::new(row_id, values));
        self.journal.push(JournalEntry::Insert { row_id });
        Ok(row_id)
    }

    /// Replaces every value of an existing row.
    pub fn update(&mut self, row_id: RowId, values: Vec<Value>) -> Result<()> {
        let values = self.store.validate(values)?;
        let row = self.store.rows.get_mut(&row_id).ok_or_else(|| missing(row_id))?;
        let old = row.clone();
        let mut updated = Row::new_with_version(row_id, old.version(), values);
        updated.increment_version();
        *row = updated;
        self.journal.push(JournalEntry::Update { old });
        Ok(())
    }

    /// Sets one column of an existing row.
    pub fn set(&mut self, row_id: RowId, column: &str, value: Value) -> Result<()> {
        let column = self.store.schema.require_column(column)?;
        let value = Store::validate_cell(column, value)?;
        let index = column.index();
        let row = self.store.rows.get_mut(&row_id).ok_or_else(|| missing(row_id))?;
        let old = row.clone();
        row.set(index, value);
        row.increment_version();
        self.journal.push(JournalEntry::Update { old });
        Ok(())
    }

    /// Deletes a row.
    pub fn delete(&mut self, row_id: RowId) -> Result<()> {
        let row = self.store.rows.remove(&row_id).ok_or_else(|| missing(row_id))?;
        self.journal.push(JournalEntry::Delete { row });
        Ok(())
    }

    /// Undoes every write in reverse order.
    pub(super) fn rollback(self, next_id: RowId) {
        for entry in self.journal.into_iter().rev() {
            match entry {
                JournalEntry::Insert { row_id } => {
                    self.store.rows.remove(&row_id);
                }
                JournalEntry::Update { old } => {
                    self.store.rows.insert(old.id(), old);
                }
                JournalEntry::Delete { row } => {
                    self.store.rows.insert(row.id(), row);
                }
            }
        }
        self.store.next_id = next_id;
    }

    /// Number of writes made through the batch.
    pub(super) fn writes(&self) -> usize {
        self.journal.len()
    }
}

fn missing(row_id: RowId) -> EngineError {
    EngineError::invalid_operation(format!("Row {} does not exist", row_id))
}
