//! Subscription handles and the registry a view keeps of them.
//!
//! A subscription is a two-state machine, `Active -> Cancelled`. The state
//! lives in a shared [`SubscriptionCell`]: the caller holds it through a
//! [`Subscription`], the owning view holds it through its
//! [`SubscriptionManager`], and the delivery path checks it right before
//! invoking a callback. Cancelling from any of those places is idempotent.
//!
//! Cancellation is best-effort, at most once after cancel. A delivery whose
//! check has not run yet is suppressed. A callback that is already running
//! finishes. A cancel from another thread can land between the check and
//! the call, so one more callback may still start after `cancel` returns;
//! deliveries are drained one at a time, so there is never more than one.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// An owned one-shot closure that releases the engine-side registration.
pub type Unsubscribe = Box<dyn FnOnce() + Send>;

/// Lifecycle state of a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    Cancelled,
}

/// Shared cancellation state of one subscription.
pub struct SubscriptionCell {
    id: SubscriptionId,
    cancelled: AtomicBool,
    on_cancel: Mutex<Option<Unsubscribe>>,
}

impl SubscriptionCell {
    /// Creates an active cell.
    pub fn new(id: SubscriptionId) -> Arc<Self> {
        Arc::new(Self {
            id,
            cancelled: AtomicBool::new(false),
            on_cancel: Mutex::new(None),
        })
    }

    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns whether this subscription may still deliver.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::Acquire)
    }

    /// Returns the current state.
    pub fn state(&self) -> SubscriptionState {
        if self.is_active() {
            SubscriptionState::Active
        } else {
            SubscriptionState::Cancelled
        }
    }

    /// Installs the hook that releases the engine registration.
    ///
    /// If the cell was cancelled before the hook arrived, the hook runs
    /// immediately on the calling thread.
    pub fn attach(&self, hook: Unsubscribe) {
        let mut slot = self.on_cancel.lock();
        if self.is_active() {
            *slot = Some(hook);
            return;
        }
        drop(slot);
        hook();
    }

    /// Moves the cell to `Cancelled` and runs the release hook once.
    ///
    /// Returns true if this call performed the transition.
    pub fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        let hook = self.on_cancel.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        tracing::debug!(subscription = self.id, "subscription cancelled");
        true
    }
}

impl core::fmt::Debug for SubscriptionCell {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscriptionCell")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Caller-side handle for a registered change callback.
///
/// Dropping the handle cancels the subscription.
#[must_use = "dropping a Subscription cancels it"]
#[derive(Debug)]
pub struct Subscription {
    cell: Arc<SubscriptionCell>,
}

impl Subscription {
    /// Wraps a cell in a caller handle.
    pub fn new(cell: Arc<SubscriptionCell>) -> Self {
        Self { cell }
    }

    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.cell.id()
    }

    /// Returns whether this subscription is active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.cell.is_active()
    }

    /// Returns the current state.
    #[inline]
    pub fn state(&self) -> SubscriptionState {
        self.cell.state()
    }

    /// Stops further deliveries. Safe to call any number of times, from any
    /// thread, before or after the owning view is gone.
    pub fn cancel(&self) {
        self.cell.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cell.cancel();
    }
}

/// Manages the subscriptions owned by one view.
pub struct SubscriptionManager {
    /// Registered subscriptions
    subscriptions: Mutex<HashMap<SubscriptionId, Arc<SubscriptionCell>>>,
    /// Next subscription ID to assign
    next_id: AtomicU64,
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    /// Creates a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a new active subscription and returns its cell.
    ///
    /// Cells cancelled since the last registration are dropped from the map.
    pub fn register(&self) -> Arc<SubscriptionCell> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cell = SubscriptionCell::new(id);
        let mut subscriptions = self.subscriptions.lock();
        subscriptions.retain(|_, existing| existing.is_active());
        subscriptions.insert(id, Arc::clone(&cell));
        cell
    }

    /// Returns the number of active subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions
            .lock()
            .values()
            .filter(|cell| cell.is_active())
            .count()
    }

    /// Returns true if there are no active subscriptions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancels every subscription. Returns how many were still active.
    ///
    /// Release hooks run after the registry lock is dropped.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Arc<SubscriptionCell>> =
            self.subscriptions.lock().drain().map(|(_, cell)| cell).collect();
        drained.iter().filter(|cell| cell.cancel()).count()
    }
}
