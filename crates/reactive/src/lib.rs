//! Grantview Reactive - change notification plumbing for live result views.
//!
//! A view over engine data is observed by registering a callback. Each time
//! the engine advances, the callback receives a `ChangeSet` describing the
//! index-level difference between the view's previous and current contents.
//!
//! # Core Concepts
//!
//! - `ChangeSet`: deletions, insertions and modifications between two
//!   ordered snapshots of a view
//! - `Subscription`: cancellable handle owned by the caller
//! - `SubscriptionManager`: registry of the subscriptions a view owns, so
//!   they can all be cancelled when the view goes away
//! - `NotificationContext`: FIFO queue on which callbacks actually run,
//!   drained by the thread that owns it (or by a `Dispatcher` thread)
//!
//! # Example
//!
//! ```
//! use grantview_reactive::{ChangeSet, NotificationContext};
//! use std::sync::{Arc, Mutex};
//!
//! let context = NotificationContext::new("main");
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let old = [(1, 1), (2, 1)];
//! let new = [(1, 1), (3, 1), (2, 1)];
//! let changes = ChangeSet::between(&old, &new);
//!
//! let sink = seen.clone();
//! context.post(Box::new(move || sink.lock().unwrap().push(changes)));
//! assert_eq!(context.run_pending(), 1);
//! assert_eq!(seen.lock().unwrap()[0].insertions, vec![1]);
//! ```

pub mod change_set;
pub mod notify;
pub mod subscription;

pub use change_set::ChangeSet;
pub use notify::{Dispatcher, Job, NotificationContext};
pub use subscription::{
    Subscription, SubscriptionCell, SubscriptionId, SubscriptionManager, SubscriptionState,
    Unsubscribe,
};
