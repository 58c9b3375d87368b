//! Result handles and callback tokens of the in-memory engine.

use super::{EngineInner, Query, Store};
use crate::handle::{ChangeCallback, EngineToken, ResultHandle, SortColumn};
use crate::predicate::Predicate;
use crate::sort::SortOrder;
use grantview_core::schema::Table;
use grantview_core::{EngineError, Result, Row, RowId};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Ordered row ids of a query, valid for one store generation.
struct CachedOrder {
    generation: u64,
    ids: Arc<Vec<RowId>>,
}

/// A live view of the table through a filter/sort pipeline.
pub(crate) struct MemoryResults {
    engine: Arc<EngineInner>,
    query: Query,
    cache: Mutex<Option<CachedOrder>>,
}

impl MemoryResults {
    pub(crate) fn new(engine: Arc<EngineInner>, query: Query) -> Self {
        Self {
            engine,
            query,
            cache: Mutex::new(None),
        }
    }

    fn derive(&self, query: Query) -> Arc<dyn ResultHandle> {
        Arc::new(Self::new(Arc::clone(&self.engine), query))
    }

    /// Returns the ordered ids for the store's current generation.
    /// Lock order: store, then cache.
    fn ordered_ids(&self, store: &Store) -> Arc<Vec<RowId>> {
        let mut cache = self.cache.lock();
        if let Some(cached) = cache.as_ref() {
            if cached.generation == store.generation {
                return Arc::clone(&cached.ids);
            }
        }
        let ids: Arc<Vec<RowId>> = Arc::new(
            self.query
                .evaluate(store)
                .into_iter()
                .map(|row| row.id())
                .collect(),
        );
        *cache = Some(CachedOrder {
            generation: store.generation,
            ids: Arc::clone(&ids),
        });
        ids
    }
}

impl ResultHandle for MemoryResults {
    fn schema(&self) -> Arc<Table> {
        self.engine.store.read().schema.clone()
    }

    fn is_valid(&self) -> bool {
        !self.engine.store.read().closed
    }

    fn count(&self) -> Result<usize> {
        let store = self.engine.store.read();
        store.ensure_open()?;
        Ok(self.ordered_ids(&store).len())
    }

    fn row_at(&self, index: usize) -> Result<Row> {
        let store = self.engine.store.read();
        store.ensure_open()?;
        let ids = self.ordered_ids(&store);
        ids.get(index)
            .and_then(|id| store.rows.get(id))
            .cloned()
            .ok_or_else(|| EngineError::index_out_of_bounds(index, ids.len()))
    }

    fn filter(&self, predicate: &Predicate) -> Result<Arc<dyn ResultHandle>> {
        self.engine.store.read().ensure_open()?;
        Ok(self.derive(self.query.filtered(predicate)))
    }

    fn sort(&self, keys: &[SortColumn]) -> Result<Arc<dyn ResultHandle>> {
        let store = self.engine.store.read();
        store.ensure_open()?;
        let order = SortOrder::resolve(keys, &store.schema)?;
        Ok(self.derive(self.query.sorted(order)))
    }

    fn index_of(&self, predicate: &Predicate) -> Result<Option<usize>> {
        let store = self.engine.store.read();
        store.ensure_open()?;
        let ids = self.ordered_ids(&store);
        Ok(ids
            .iter()
            .position(|id| store.rows.get(id).map_or(false, |row| predicate.eval(row))))
    }

    fn add_change_callback(&self, callback: ChangeCallback) -> Result<Box<dyn EngineToken>> {
        let id = self.engine.register(&self.query, callback)?;
        Ok(Box::new(MemoryToken {
            engine: Arc::downgrade(&self.engine),
            id,
        }))
    }
}

/// Registration token returned by [`MemoryResults::add_change_callback`].
struct MemoryToken {
    engine: Weak<EngineInner>,
    id: u64,
}

impl EngineToken for MemoryToken {
    fn cancel(&self) {
        if let Some(engine) = self.engine.upgrade() {
            engine.unregister(self.id);
        }
    }
}
