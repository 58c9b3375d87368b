//! Grantview Permissions - a live, observable view over synchronized
//! permission records.
//!
//! [`PermissionResults`] wraps an engine result handle and exposes it as a
//! read-only collection of [`PermissionValue`]s:
//!
//! - indexed access, materialized one element at a time from current data
//! - filtering with the engine's predicate language
//! - sorting restricted to the [`SortKey`] allow-list
//! - change notifications delivered on a [`NotificationContext`]
//!
//! Engine failures are translated into [`Error`] at this crate's boundary.
//!
//! # Example
//!
//! ```
//! use grantview_engine::MemoryEngine;
//! use grantview_permissions::{
//!     permission_table, AccessLevel, PermissionResults, PermissionValue, SORT_PATH,
//! };
//! use grantview_reactive::NotificationContext;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let engine = MemoryEngine::new(permission_table());
//! let context = NotificationContext::new("main");
//! let view = PermissionResults::open(&engine, context.clone()).unwrap();
//!
//! let inserted = Arc::new(AtomicUsize::new(0));
//! let counter = inserted.clone();
//! let subscription = view.subscribe(move |change| {
//!     let (_view, changes) = change.unwrap();
//!     counter.fetch_add(changes.insertions.len(), Ordering::SeqCst);
//! });
//!
//! let grant = PermissionValue::new("/~/notes", "alice", AccessLevel::Write, 0);
//! engine.insert(grant.to_values()).unwrap();
//! context.run_pending();
//!
//! assert_eq!(inserted.load(Ordering::SeqCst), 1);
//! assert_eq!(view.sorted_by_key_path(SORT_PATH, true).unwrap().first().unwrap(), Some(grant));
//! subscription.cancel();
//! ```

mod config;
mod enumerate;
mod error;
mod materialize;
mod results;
mod sort;
mod value;

pub use config::ViewConfig;
pub use enumerate::{Enumerator, Iter};
pub use error::{translate, translate_query, translate_row_access, Error, Result};
pub use materialize::{materialize, Materializer};
pub use results::PermissionResults;
pub use sort::{
    validate, SortDescriptor, SortKey, SortSpec, SORT_PATH, SORT_UPDATED_AT, SORT_USER_ID,
};
pub use value::{permission_table, AccessLevel, PermissionValue, PERMISSION_TABLE};

pub use grantview_reactive::{ChangeSet, NotificationContext, Subscription, SubscriptionState};
