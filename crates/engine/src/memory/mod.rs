//! In-memory reference engine.
//!
//! Rows live in a single table keyed by a monotonically increasing id, so
//! the natural (unsorted) order of every result set is insertion order.
//! Writers call [`MemoryEngine::advance`]; each successful advance bumps the
//! store generation, recomputes the snapshot of every registered change
//! callback and invokes the callbacks whose results changed.

mod batch;
mod results;

pub use batch::Batch;

use crate::handle::{ChangeCallback, QueryRoot, ResultHandle};
use crate::predicate::Predicate;
use crate::sort::SortOrder;
use grantview_core::schema::{Column, Table};
use grantview_core::{EngineError, Result, Row, RowId, Value};
use grantview_reactive::ChangeSet;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use results::MemoryResults;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Row storage guarded by the engine lock.
pub(crate) struct Store {
    schema: Arc<Table>,
    rows: BTreeMap<RowId, Row>,
    next_id: RowId,
    /// Bumped by every advance that wrote something
    generation: u64,
    closed: bool,
}

impl Store {
    fn new(schema: Table) -> Self {
        Self {
            schema: Arc::new(schema),
            rows: BTreeMap::new(),
            next_id: 1,
            generation: 0,
            closed: false,
        }
    }

    /// Checks a full row of values against the schema, coercing each cell
    /// to its column type.
    fn validate(&self, values: Vec<Value>) -> Result<Vec<Value>> {
        let columns = self.schema.columns();
        if values.len() != columns.len() {
            return Err(EngineError::invalid_operation(format!(
                "Expected {} values for table {}, got {}",
                columns.len(),
                self.schema.name(),
                values.len()
            )));
        }
        columns
            .iter()
            .zip(values)
            .map(|(column, value)| Self::validate_cell(column, value))
            .collect()
    }

    fn validate_cell(column: &Column, value: Value) -> Result<Value> {
        if value.is_null() {
            return if column.is_nullable() {
                Ok(Value::Null)
            } else {
                Err(EngineError::invalid_operation(format!(
                    "Column {} is not nullable",
                    column.name()
                )))
            };
        }
        value.coerce_to(column.data_type()).ok_or_else(|| {
            EngineError::type_mismatch(
                column.data_type(),
                value.data_type().unwrap_or(column.data_type()),
            )
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(EngineError::invalidated("Engine has been closed"))
        } else {
            Ok(())
        }
    }
}

/// A filter/sort pipeline over the table.
#[derive(Clone, Debug, Default)]
pub(crate) struct Query {
    filters: Vec<Predicate>,
    order: SortOrder,
}

impl Query {
    fn filtered(&self, predicate: &Predicate) -> Self {
        let mut query = self.clone();
        query.filters.push(predicate.clone());
        query
    }

    fn sorted(&self, order: SortOrder) -> Self {
        Self {
            filters: self.filters.clone(),
            order: order.then(&self.order),
        }
    }

    /// Matching rows in result order.
    fn evaluate<'s>(&self, store: &'s Store) -> Vec<&'s Row> {
        let mut rows: Vec<&Row> = store
            .rows
            .values()
            .filter(|row| self.filters.iter().all(|p| p.eval(row)))
            .collect();
        self.order.sort(&mut rows);
        rows
    }

    fn snapshot(&self, store: &Store) -> Vec<(RowId, u64)> {
        self.evaluate(store)
            .into_iter()
            .map(|row| row.stamp())
            .collect()
    }
}

struct Registration {
    id: u64,
    query: Query,
    snapshot: Vec<(RowId, u64)>,
    callback: ChangeCallback,
}

pub(crate) struct EngineInner {
    store: RwLock<Store>,
    registrations: Mutex<Vec<Registration>>,
    next_registration: AtomicU64,
    /// Serializes advances with the callbacks they trigger
    dispatch: ReentrantMutex<()>,
}

impl EngineInner {
    /// Registers a callback for `query`. Lock order: store, then
    /// registrations.
    fn register(&self, query: &Query, callback: ChangeCallback) -> Result<u64> {
        let store = self.store.read();
        store.ensure_open()?;
        let id = self.next_registration.fetch_add(1, Ordering::Relaxed);
        let snapshot = query.snapshot(&store);
        self.registrations.lock().push(Registration {
            id,
            query: query.clone(),
            snapshot,
            callback,
        });
        tracing::trace!(registration = id, "change callback registered");
        Ok(id)
    }

    fn unregister(&self, id: u64) -> bool {
        let mut registrations = self.registrations.lock();
        let before = registrations.len();
        registrations.retain(|registration| registration.id != id);
        let removed = registrations.len() != before;
        if removed {
            tracing::trace!(registration = id, "change callback removed");
        }
        removed
    }
}

/// An in-memory table that implements the engine interfaces.
///
/// Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct MemoryEngine {
    inner: Arc<EngineInner>,
}

impl MemoryEngine {
    /// Creates an empty engine for `schema`.
    pub fn new(schema: Table) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store: RwLock::new(Store::new(schema)),
                registrations: Mutex::new(Vec::new()),
                next_registration: AtomicU64::new(1),
                dispatch: ReentrantMutex::new(()),
            }),
        }
    }

    /// Returns the table schema.
    pub fn schema(&self) -> Arc<Table> {
        self.inner.store.read().schema.clone()
    }

    /// Returns the number of rows in the table.
    pub fn row_count(&self) -> usize {
        self.inner.store.read().rows.len()
    }

    /// Returns the current generation; it increases with every advance that
    /// wrote at least one row.
    pub fn generation(&self) -> u64 {
        self.inner.store.read().generation
    }

    /// Returns the number of registered change callbacks.
    pub fn callback_count(&self) -> usize {
        self.inner.registrations.lock().len()
    }

    /// Returns a copy of a row.
    pub fn get(&self, row_id: RowId) -> Option<Row> {
        self.inner.store.read().rows.get(&row_id).cloned()
    }

    /// Applies a batch of writes atomically, then notifies change callbacks.
    ///
    /// Callbacks run on the calling thread after the store lock is released,
    /// in registration order. If `apply` fails, its writes are rolled back
    /// and the error is returned without notifying anyone.
    pub fn advance<T, F>(&self, apply: F) -> Result<T>
    where
        F: FnOnce(&mut Batch<'_>) -> Result<T>,
    {
        let _dispatch = self.inner.dispatch.lock();

        let (value, generation, writes, deliveries) = {
            let mut store = self.inner.store.write();
            store.ensure_open()?;
            let next_id = store.next_id;

            let mut batch = Batch::new(&mut store);
            let value = match apply(&mut batch) {
                Ok(value) => value,
                Err(err) => {
                    let writes = batch.writes();
                    batch.rollback(next_id);
                    tracing::warn!(writes, error = %err, "advance rolled back");
                    return Err(err);
                }
            };
            let writes = batch.writes();
            if writes == 0 {
                return Ok(value);
            }

            store.generation += 1;
            let mut registrations = self.inner.registrations.lock();
            let deliveries: Vec<(ChangeCallback, ChangeSet)> = registrations
                .iter_mut()
                .filter_map(|registration| {
                    let snapshot = registration.query.snapshot(&store);
                    let changes = ChangeSet::between(&registration.snapshot, &snapshot);
                    registration.snapshot = snapshot;
                    (!changes.is_empty()).then(|| (registration.callback.clone(), changes))
                })
                .collect();
            (value, store.generation, writes, deliveries)
        };

        tracing::debug!(
            generation,
            writes,
            notified = deliveries.len(),
            "engine advanced"
        );
        for (callback, changes) in &deliveries {
            callback(Ok(changes));
        }
        Ok(value)
    }

    /// Inserts one row.
    pub fn insert(&self, values: Vec<Value>) -> Result<RowId> {
        self.advance(|batch| batch.insert(values))
    }

    /// Replaces one row.
    pub fn update(&self, row_id: RowId, values: Vec<Value>) -> Result<()> {
        self.advance(|batch| batch.update(row_id, values))
    }

    /// Sets one column of one row.
    pub fn set(&self, row_id: RowId, column: &str, value: Value) -> Result<()> {
        self.advance(|batch| batch.set(row_id, column, value))
    }

    /// Deletes one row.
    pub fn delete(&self, row_id: RowId) -> Result<()> {
        self.advance(|batch| batch.delete(row_id))
    }

    /// Delivers `error` to every registered change callback.
    ///
    /// Used by the sync layer when it cannot compute a change set, for
    /// example when a permission change was rejected.
    pub fn report_error(&self, error: EngineError) {
        let _dispatch = self.inner.dispatch.lock();
        let callbacks: Vec<ChangeCallback> = self
            .inner
            .registrations
            .lock()
            .iter()
            .map(|registration| registration.callback.clone())
            .collect();
        tracing::warn!(error = %error, callbacks = callbacks.len(), "reporting engine error");
        for callback in &callbacks {
            callback(Err(&error));
        }
    }

    /// Closes the engine: every result handle becomes invalid and all
    /// change callbacks are dropped.
    pub fn close(&self) {
        let mut store = self.inner.store.write();
        if store.closed {
            return;
        }
        store.closed = true;
        let dropped = std::mem::take(&mut *self.inner.registrations.lock());
        drop(store);
        tracing::debug!(callbacks = dropped.len(), "engine closed");
    }

    /// Returns whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.store.read().closed
    }
}

impl QueryRoot for MemoryEngine {
    fn results(&self) -> Result<Arc<dyn ResultHandle>> {
        self.inner.store.read().ensure_open()?;
        Ok(Arc::new(MemoryResults::new(
            Arc::clone(&self.inner),
            Query::default(),
        )))
    }
}

impl core::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let store = self.inner.store.read();
        f.debug_struct("MemoryEngine")
            .field("table", &store.schema.name())
            .field("rows", &store.rows.len())
            .field("generation", &store.generation)
            .field("closed", &store.closed)
            .finish()
    }
}
