//! Change notification delivery and subscription lifecycle.

use grantview_core::EngineError;
use grantview_engine::{
    ChangeCallback, EngineToken, MemoryEngine, Predicate, QueryRoot, ResultHandle, SortColumn,
};
use grantview_permissions::{
    permission_table, AccessLevel, ChangeSet, Error, NotificationContext, PermissionResults,
    PermissionValue, SubscriptionState,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

type Log = Arc<Mutex<Vec<core::result::Result<ChangeSet, Error>>>>;

fn grant(path: &str, user: &str, updated_at: i64) -> PermissionValue {
    PermissionValue::new(path, user, AccessLevel::Read, updated_at)
}

fn setup() -> (MemoryEngine, NotificationContext, PermissionResults) {
    let engine = MemoryEngine::new(permission_table());
    let context = NotificationContext::new("notifications");
    let view = PermissionResults::open(&engine, context.clone()).unwrap();
    (engine, context, view)
}

fn record(log: &Log) -> impl Fn(core::result::Result<(&PermissionResults, &ChangeSet), &Error>) + Send + Sync + 'static {
    let log = log.clone();
    move |outcome| {
        log.lock()
            .push(outcome.map(|(_, changes)| changes.clone()).map_err(Error::clone));
    }
}

#[test]
fn test_insert_delivers_one_change_set() {
    let (engine, context, view) = setup();
    engine.insert(grant("/a", "alice", 1).to_values()).unwrap();
    engine.insert(grant("/c", "carol", 2).to_values()).unwrap();

    let sorted = view.sorted_by_key_path("path", true).unwrap();
    let log: Log = Arc::default();
    let _subscription = sorted.subscribe(record(&log));

    // Nothing is delivered for the initial state
    assert_eq!(context.run_pending(), 0);

    engine.insert(grant("/b", "bob", 3).to_values()).unwrap();
    context.run_pending();

    let log = log.lock();
    assert_eq!(log.len(), 1);
    let changes = log[0].as_ref().unwrap();
    assert_eq!(changes.insertions, vec![1]);
    assert!(changes.deletions.is_empty());
    assert!(changes.modifications.is_empty());
    assert_eq!(sorted.at(1).unwrap().path(), "/b");
}

#[test]
fn test_callback_receives_current_view() {
    let (engine, context, view) = setup();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _subscription = view.subscribe(move |outcome| {
        let (view, changes) = outcome.unwrap();
        for &index in &changes.insertions {
            sink.lock().push(view.at(index).unwrap());
        }
    });

    engine.insert(grant("/x", "xavier", 9).to_values()).unwrap();
    context.run_pending();
    assert_eq!(*seen.lock(), vec![grant("/x", "xavier", 9)]);
}

#[test]
fn test_deliveries_follow_advance_order() {
    let (engine, context, view) = setup();
    let log: Log = Arc::default();
    let _subscription = view.subscribe(record(&log));

    let id = engine.insert(grant("/a", "alice", 1).to_values()).unwrap();
    engine.set(id, "accessLevel", AccessLevel::Admin.as_i32().into()).unwrap();
    engine.delete(id).unwrap();
    // No-op advance
    engine.advance(|_| Ok(())).unwrap();
    context.run_pending();

    let log = log.lock();
    assert_eq!(log.len(), 3);
    assert_eq!(log[0].as_ref().unwrap().insertions, vec![0]);
    assert_eq!(log[1].as_ref().unwrap().modifications, vec![0]);
    assert_eq!(log[2].as_ref().unwrap().deletions, vec![0]);
}

#[test]
fn test_cancel_stops_deliveries() {
    let (engine, context, view) = setup();
    let log: Log = Arc::default();
    let subscription = view.subscribe(record(&log));

    engine.insert(grant("/a", "alice", 1).to_values()).unwrap();
    context.run_pending();
    assert_eq!(log.lock().len(), 1);

    subscription.cancel();
    subscription.cancel();
    assert_eq!(subscription.state(), SubscriptionState::Cancelled);
    assert_eq!(engine.callback_count(), 0);

    engine.insert(grant("/b", "bob", 2).to_values()).unwrap();
    context.run_pending();
    assert_eq!(log.lock().len(), 1);
}

#[test]
fn test_cancel_suppresses_queued_delivery() {
    let (engine, context, view) = setup();
    let log: Log = Arc::default();
    let subscription = view.subscribe(record(&log));

    engine.insert(grant("/a", "alice", 1).to_values()).unwrap();
    assert_eq!(context.pending(), 1);
    subscription.cancel();
    context.run_pending();
    assert!(log.lock().is_empty());
}

#[test]
fn test_dropping_subscription_cancels() {
    let (engine, context, view) = setup();
    let log: Log = Arc::default();
    drop(view.subscribe(record(&log)));

    assert_eq!(view.subscription_count(), 0);
    engine.insert(grant("/a", "alice", 1).to_values()).unwrap();
    context.run_pending();
    assert!(log.lock().is_empty());
}

#[test]
fn test_dropping_view_cancels_subscriptions() {
    let (engine, context, view) = setup();
    let log: Log = Arc::default();
    let subscription = view.subscribe(record(&log));
    assert_eq!(engine.callback_count(), 1);

    drop(view);
    assert_eq!(subscription.state(), SubscriptionState::Cancelled);
    assert_eq!(engine.callback_count(), 0);

    engine.insert(grant("/a", "alice", 1).to_values()).unwrap();
    context.run_pending();
    assert!(log.lock().is_empty());
    // Cancelling after the view is gone is still fine
    subscription.cancel();
}

#[test]
fn test_engine_failures_arrive_through_callback() {
    let (engine, context, view) = setup();
    let log: Log = Arc::default();
    let _subscription = view.subscribe(record(&log));

    engine.report_error(EngineError::permission_change(89, "Permission denied"));
    engine.report_error(EngineError::invalid_operation("sync session stopped"));
    context.run_pending();

    let log = log.lock();
    assert_eq!(
        log[0],
        Err(Error::Permission {
            code: 89,
            message: "Permission denied".into()
        })
    );
    assert_eq!(
        log[1],
        Err(Error::generic("Invalid operation: sync session stopped"))
    );
}

/// A handle whose engine refuses callback registration.
struct RefusingHandle(Arc<dyn ResultHandle>);

impl ResultHandle for RefusingHandle {
    fn schema(&self) -> Arc<grantview_core::schema::Table> {
        self.0.schema()
    }
    fn is_valid(&self) -> bool {
        self.0.is_valid()
    }
    fn count(&self) -> grantview_core::Result<usize> {
        self.0.count()
    }
    fn row_at(&self, index: usize) -> grantview_core::Result<grantview_core::Row> {
        self.0.row_at(index)
    }
    fn filter(&self, predicate: &Predicate) -> grantview_core::Result<Arc<dyn ResultHandle>> {
        self.0.filter(predicate)
    }
    fn sort(&self, keys: &[SortColumn]) -> grantview_core::Result<Arc<dyn ResultHandle>> {
        self.0.sort(keys)
    }
    fn index_of(&self, predicate: &Predicate) -> grantview_core::Result<Option<usize>> {
        self.0.index_of(predicate)
    }
    fn add_change_callback(
        &self,
        _callback: ChangeCallback,
    ) -> grantview_core::Result<Box<dyn EngineToken>> {
        Err(EngineError::permission_change(7, "Notifications are not available"))
    }
}

struct RefusingRoot(MemoryEngine);

impl QueryRoot for RefusingRoot {
    fn results(&self) -> grantview_core::Result<Arc<dyn ResultHandle>> {
        Ok(Arc::new(RefusingHandle(self.0.results()?)))
    }
}

#[test]
fn test_refused_registration_reports_error() {
    let root = RefusingRoot(MemoryEngine::new(permission_table()));
    let context = NotificationContext::new("refused");
    let view = PermissionResults::open(&root, context.clone()).unwrap();
    let log: Log = Arc::default();
    let subscription = view.subscribe(record(&log));

    context.run_pending();
    assert_eq!(
        *log.lock(),
        vec![Err(Error::Permission {
            code: 7,
            message: "Notifications are not available".into()
        })]
    );
    assert!(subscription.is_active());
}

#[test]
fn test_dispatcher_delivers_off_thread() {
    let (engine, context, view) = setup();
    let dispatcher = context.spawn_dispatcher().unwrap();
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let _subscription = view.subscribe(move |outcome| {
        let (_, changes) = outcome.unwrap();
        let _ = tx
            .lock()
            .send((thread::current().name().map(String::from), changes.clone()));
    });

    let writer = {
        let engine = engine.clone();
        thread::spawn(move || {
            engine.insert(grant("/a", "alice", 1).to_values()).unwrap();
        })
    };
    writer.join().unwrap();

    let (name, changes) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(name.as_deref(), Some("notifications"));
    assert_eq!(changes.insertions, vec![0]);
    drop(dispatcher);
}

#[test]
fn test_panicking_subscriber_does_not_starve_others() {
    let (engine, context, view) = setup();
    let dispatcher = context.spawn_dispatcher().unwrap();

    let faulty_calls = Arc::new(AtomicUsize::new(0));
    let counter = faulty_calls.clone();
    let _faulty = view.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        panic!("subscriber bug");
    });
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let _healthy = view.subscribe(move |outcome| {
        let (_, changes) = outcome.unwrap();
        let _ = tx.lock().send(changes.insertions.clone());
    });

    for n in 0..3 {
        engine
            .insert(grant(&format!("/p{}", n), "alice", n).to_values())
            .unwrap();
    }
    for _ in 0..3 {
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }
    assert_eq!(faulty_calls.load(Ordering::SeqCst), 3);
    assert_eq!(context.pending(), 0);
    drop(dispatcher);
}

#[test]
fn test_view_dropped_while_callback_in_flight() {
    let (engine, context, view) = setup();
    let dispatcher = context.spawn_dispatcher().unwrap();

    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let release_rx = Mutex::new(release_rx);
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    let subscription = view.subscribe(move |outcome| {
        let (view, _) = outcome.unwrap();
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = entered_tx.lock().send(());
        let _ = release_rx.lock().recv_timeout(Duration::from_secs(5));
        // The view passed in stays usable even if the caller dropped theirs
        let _ = view.count();
    });

    engine.insert(grant("/a", "alice", 1).to_values()).unwrap();
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    // Callback is running on the dispatcher: drop everything from here
    drop(view);
    drop(subscription);
    release_tx.send(()).unwrap();

    for n in 0..5 {
        engine
            .insert(grant(&format!("/after{}", n), "bob", n).to_values())
            .unwrap();
    }
    thread::sleep(Duration::from_millis(100));
    drop(dispatcher);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.callback_count(), 0);
}

#[test]
fn test_concurrent_cancel_and_advance() {
    let (engine, context, view) = setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let subscription = view.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let writer = {
        let engine = engine.clone();
        thread::spawn(move || {
            for n in 0..200 {
                engine.insert(grant("/p", "u", n).to_values()).unwrap();
            }
        })
    };
    thread::sleep(Duration::from_millis(1));
    subscription.cancel();
    let delivered_before = calls.load(Ordering::SeqCst);
    writer.join().unwrap();
    context.run_pending();

    // Everything queued after cancel is suppressed
    assert_eq!(calls.load(Ordering::SeqCst), delivered_before);
}
