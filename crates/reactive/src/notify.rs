//! Notification contexts.
//!
//! A `NotificationContext` is the place where change callbacks actually run.
//! Engine activity (for example a background sync writer) only *posts* jobs;
//! whoever owns the context drains them, either explicitly with
//! [`NotificationContext::run_pending`] from its own loop or by handing the
//! context to a [`Dispatcher`] thread.
//!
//! Jobs run in the order they were posted. Draining is serialized across
//! threads, so two drainers never interleave jobs from the same context. The
//! drain lock is reentrant: a callback may drain its own context. A job that
//! panics is logged and skipped; the jobs behind it still run.

use parking_lot::{Condvar, Mutex, ReentrantMutex};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A unit of work posted to a context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    name: String,
    queue: Mutex<VecDeque<Job>>,
    ready: Condvar,
    drain: ReentrantMutex<()>,
    closed: AtomicBool,
}

/// A FIFO execution context for change notifications.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct NotificationContext {
    shared: Arc<Shared>,
}

impl NotificationContext {
    /// Creates a new, empty context.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                queue: Mutex::new(VecDeque::new()),
                ready: Condvar::new(),
                drain: ReentrantMutex::new(()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the context name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Queues a job. Jobs posted after [`close`](Self::close) are dropped.
    pub fn post(&self, job: Job) {
        if self.is_closed() {
            tracing::trace!(context = %self.shared.name, "dropping job posted to closed context");
            return;
        }
        self.shared.queue.lock().push_back(job);
        self.shared.ready.notify_all();
    }

    /// Returns the number of queued jobs.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Returns whether the context has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Runs every job that was queued when the call started.
    ///
    /// Jobs posted by those jobs wait for the next drain. Returns the number
    /// of jobs run.
    pub fn run_pending(&self) -> usize {
        let _drain = self.shared.drain.lock();
        let budget = self.pending();
        let mut ran = 0;
        while ran < budget {
            let job = self.shared.queue.lock().pop_front();
            match job {
                Some(job) => {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                        tracing::error!(
                            context = %self.shared.name,
                            panic = panic_message(payload.as_ref()),
                            "notification job panicked"
                        );
                    }
                    ran += 1;
                }
                None => break,
            }
        }
        if ran > 0 {
            tracing::trace!(context = %self.shared.name, jobs = ran, "drained notifications");
        }
        ran
    }

    /// Blocks until a job is queued, the context is closed, or `timeout`
    /// elapses. Returns true if jobs are pending.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut queue = self.shared.queue.lock();
        while queue.is_empty() && !self.is_closed() {
            if self.shared.ready.wait_until(&mut queue, deadline).timed_out() {
                break;
            }
        }
        !queue.is_empty()
    }

    /// Drains jobs as they arrive until none shows up for `idle`.
    /// Returns the total number of jobs run.
    pub fn run_until_idle(&self, idle: Duration) -> usize {
        let mut total = 0;
        loop {
            total += self.run_pending();
            if !self.wait(idle) {
                return total;
            }
        }
    }

    /// Closes the context: queued jobs are discarded and later posts are
    /// ignored. Wakes any waiting dispatcher.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        let discarded: Vec<Job> = self.shared.queue.lock().drain(..).collect();
        self.shared.ready.notify_all();
        drop(discarded);
    }

    /// Starts a thread, named after the context, that drains it until the
    /// returned guard is dropped or the context is closed.
    pub fn spawn_dispatcher(&self) -> std::io::Result<Dispatcher> {
        let stop = Arc::new(AtomicBool::new(false));
        let context = self.clone();
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(self.shared.name.clone())
            .spawn(move || {
                tracing::debug!(context = %context.name(), "dispatcher started");
                while !thread_stop.load(Ordering::Acquire) && !context.is_closed() {
                    if context.wait(Duration::from_millis(50)) {
                        context.run_pending();
                    }
                }
                tracing::debug!(context = %context.name(), "dispatcher stopped");
            })?;
        Ok(Dispatcher {
            context: self.clone(),
            stop,
            handle: Some(handle),
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic>"
    }
}

impl core::fmt::Debug for NotificationContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NotificationContext")
            .field("name", &self.shared.name)
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Guard for a thread draining a [`NotificationContext`].
///
/// Dropping it stops the thread after the job in progress, if any.
pub struct Dispatcher {
    context: NotificationContext,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Returns the context this dispatcher drains.
    pub fn context(&self) -> &NotificationContext {
        &self.context
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.context.shared.ready.notify_all();
        if let Some(handle) = self.handle.take() {
            // Dropped from one of its own callbacks: the loop exits on its own.
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                tracing::error!(context = %self.context.name(), "dispatcher thread panicked");
            }
        }
    }
}
