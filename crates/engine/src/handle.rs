//! Engine interfaces consumed by result views.

use crate::predicate::Predicate;
use grantview_core::schema::Table;
use grantview_core::{EngineError, Result, Row};
use grantview_reactive::ChangeSet;
use std::sync::Arc;

/// Callback invoked by the engine after each advance that changed a result
/// handle, or with the failure that prevented it from computing one.
///
/// Engines invoke callbacks from whatever thread advanced the data, in
/// advance order, and never concurrently with each other.
pub type ChangeCallback =
    Arc<dyn Fn(core::result::Result<&ChangeSet, &EngineError>) + Send + Sync>;

/// Wraps a closure as a [`ChangeCallback`].
pub fn change_callback<F>(callback: F) -> ChangeCallback
where
    F: Fn(core::result::Result<&ChangeSet, &EngineError>) + Send + Sync + 'static,
{
    Arc::new(callback)
}

/// One ordering key of a sort request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortColumn {
    /// Column name in the handle's schema.
    pub column: String,
    pub ascending: bool,
}

impl SortColumn {
    pub fn new(column: impl Into<String>, ascending: bool) -> Self {
        Self {
            column: column.into(),
            ascending,
        }
    }
}

/// Releases a change callback registration.
pub trait EngineToken: Send + Sync {
    /// Stops further invocations of the callback. Idempotent.
    fn cancel(&self);
}

/// A live result set owned by the engine.
///
/// Every read is evaluated against the engine's current data; nothing is
/// frozen at creation time.
pub trait ResultHandle: Send + Sync {
    /// Schema of the rows in this result set.
    fn schema(&self) -> Arc<Table>;

    /// Returns false once the handle can no longer be read.
    fn is_valid(&self) -> bool;

    /// Current number of rows.
    fn count(&self) -> Result<usize>;

    /// Row at `index` in the current order.
    fn row_at(&self, index: usize) -> Result<Row>;

    /// A new handle restricted to rows matching `predicate`.
    fn filter(&self, predicate: &Predicate) -> Result<Arc<dyn ResultHandle>>;

    /// A new handle ordered by `keys`, with this handle's order breaking ties.
    fn sort(&self, keys: &[SortColumn]) -> Result<Arc<dyn ResultHandle>>;

    /// Index of the first row matching `predicate`.
    fn index_of(&self, predicate: &Predicate) -> Result<Option<usize>>;

    /// Registers a change callback for this handle.
    fn add_change_callback(&self, callback: ChangeCallback) -> Result<Box<dyn EngineToken>>;
}

/// Entry point handing out the root result set of a table.
pub trait QueryRoot {
    fn results(&self) -> Result<Arc<dyn ResultHandle>>;
}

/// Compiles predicate text against a schema.
pub trait PredicateCompiler: Send + Sync {
    fn compile(&self, expression: &str, schema: &Table) -> core::result::Result<Predicate, EngineError>;
}
