//! Grantview Engine - the storage/query engine seam.
//!
//! Views never talk to storage directly. They go through the traits in
//! [`handle`]:
//!
//! - [`QueryRoot`] hands out the root [`ResultHandle`] of a table
//! - [`ResultHandle`] is a live, ordered, filterable result set
//! - [`EngineToken`] releases a change callback registration
//! - [`PredicateCompiler`] turns predicate text into a [`Predicate`]
//!
//! [`MemoryEngine`] is an in-memory implementation of all of them. Its
//! contents are advanced in atomic batches (typically by a background sync
//! thread) and every advance notifies registered callbacks with a
//! [`ChangeSet`](grantview_reactive::ChangeSet) per result handle.
//!
//! # Example
//!
//! ```
//! use grantview_core::{DataType, Value};
//! use grantview_core::schema::TableBuilder;
//! use grantview_engine::{ExpressionCompiler, MemoryEngine, PredicateCompiler, QueryRoot};
//!
//! let schema = TableBuilder::new("permission")
//!     .unwrap()
//!     .add_column("path", DataType::String)
//!     .unwrap()
//!     .build();
//! let engine = MemoryEngine::new(schema);
//! engine.insert(vec![Value::from("/~/a")]).unwrap();
//! engine.insert(vec![Value::from("/shared/b")]).unwrap();
//!
//! let results = engine.results().unwrap();
//! let predicate = ExpressionCompiler
//!     .compile("path BEGINSWITH '/~/'", &results.schema())
//!     .unwrap();
//! assert_eq!(results.filter(&predicate).unwrap().count().unwrap(), 1);
//! ```

pub mod handle;
pub mod memory;
pub mod predicate;
mod sort;

pub use handle::{change_callback, ChangeCallback, EngineToken, PredicateCompiler, QueryRoot, ResultHandle, SortColumn};
pub use memory::{Batch, MemoryEngine};
pub use predicate::{Condition, ExpressionCompiler, Operator, Predicate};
