//! Deferred calls.
//!
//! Connections flagged [`ConnectFlags::DEFERRED`](crate::ConnectFlags::DEFERRED)
//! and [`Object::call_deferred`](crate::Object::call_deferred) do not run
//! inline. They are handed to a [`CallQueue`] and run later, usually on one
//! designated thread that drains the queue.
//!
//! - [`MessageQueue`] is the in-process queue. Drain it by calling
//!   [`flush()`](MessageQueue::flush) from your main loop, or
//! - spawn a [`QueueLoop`] that wakes up whenever calls are pushed and
//!   flushes the queue on its own thread.
//!
//! ```ignore
//! // Flush from the main loop
//! object.emit_signal("changed", &[])?;
//! MessageQueue::global().flush();
//!
//! // Or drain on a background thread
//! QueueLoop::new(Arc::clone(MessageQueue::global()))
//!     .debounce(Duration::from_millis(1))
//!     .spawn();
//! ```
//!
//! Queued calls cannot be cancelled. A call whose target died before the
//! flush fails with [`CallError::InstanceIsNull`](crate::CallError::InstanceIsNull)
//! and is counted in the flush report.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, LazyLock, OnceLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::callable::Callable;
use crate::id::ObjectId;
use crate::variant::Variant;

/// Receiver of deferred calls.
pub trait CallQueue: Send + Sync {
    /// Queue `callable` to be invoked later with `args`.
    fn push_callable(&self, callable: Callable, args: Vec<Variant>);

    /// Queue a method call on the object named by `target`.
    fn push_call(&self, target: ObjectId, method: &str, args: Vec<Variant>) {
        self.push_callable(Callable::method(target, method), args);
    }
}

/// A call waiting in a [`MessageQueue`].
#[derive(Debug, Clone)]
pub struct DeferredCall {
    /// What to invoke.
    pub callable: Callable,
    /// Arguments captured at push time.
    pub args: Vec<Variant>,
}

/// Outcome of draining a [`MessageQueue`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Calls that returned successfully.
    pub executed: usize,
    /// Calls that returned an error.
    pub failed: usize,
}

/// FIFO queue of deferred calls.
#[derive(Debug, Default)]
pub struct MessageQueue {
    calls: Mutex<VecDeque<DeferredCall>>,
    /// Wakes a [`QueueLoop`] draining this queue, if one was spawned.
    notifier: OnceLock<Sender<()>>,
}

/// Queue used by objects that were not given one explicitly.
static GLOBAL_QUEUE: LazyLock<Arc<MessageQueue>> = LazyLock::new(|| Arc::new(MessageQueue::new()));

impl MessageQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide default queue.
    pub fn global() -> &'static Arc<MessageQueue> {
        &GLOBAL_QUEUE
    }

    /// Number of queued calls.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Whether no calls are queued.
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    /// Run queued calls in FIFO order on the current thread.
    ///
    /// Calls pushed while flushing (for example by a deferred handler that
    /// emits another deferred signal) run in the same flush.
    pub fn flush(&self) -> FlushReport {
        let mut report = FlushReport::default();
        loop {
            // Pop under the lock, call without it.
            let Some(call) = self.calls.lock().pop_front() else {
                break;
            };
            match call.callable.call(&call.args) {
                Ok(_) => report.executed += 1,
                Err(error) => {
                    report.failed += 1;
                    tracing::error!(callable = %call.callable, %error, "deferred call failed");
                }
            }
        }
        if report.executed + report.failed > 0 {
            tracing::trace!(executed = report.executed, failed = report.failed, "flushed deferred calls");
        }
        report
    }

    fn notify(&self) {
        if let Some(sender) = self.notifier.get() {
            // Receiver dropped means the loop has stopped.
            let _ = sender.send(());
        }
    }
}

impl CallQueue for MessageQueue {
    fn push_callable(&self, callable: Callable, args: Vec<Variant>) {
        self.calls.lock().push_back(DeferredCall { callable, args });
        self.notify();
    }
}

/// Default debounce delay before a [`QueueLoop`] flushes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1);

/// Maximum time a [`QueueLoop`] keeps debouncing under constant pushes.
pub const DEFAULT_MAX_DEBOUNCE: Duration = Duration::from_millis(16);

/// Builder for a thread that drains a [`MessageQueue`].
///
/// The loop sleeps until a call is pushed, waits for the debounce period
/// (restarted by every further push, capped by `max_debounce`), then flushes.
/// It stops once the queue itself is dropped.
#[allow(clippy::type_complexity)]
pub struct QueueLoop {
    queue: Arc<MessageQueue>,
    debounce: Duration,
    max_debounce: Duration,
    spawn_fn: Option<Box<dyn FnOnce(Box<dyn FnOnce() + Send>) -> JoinHandle<()> + Send>>,
}

impl QueueLoop {
    /// A loop draining `queue` with default settings.
    pub fn new(queue: Arc<MessageQueue>) -> Self {
        Self {
            queue,
            debounce: DEFAULT_DEBOUNCE,
            max_debounce: DEFAULT_MAX_DEBOUNCE,
            spawn_fn: None,
        }
    }

    /// Set the debounce delay.
    ///
    /// Default: 1ms
    pub fn debounce(mut self, duration: Duration) -> Self {
        self.debounce = duration;
        self
    }

    /// Set the maximum debounce wait.
    ///
    /// Default: 16ms
    pub fn max_debounce(mut self, duration: Duration) -> Self {
        self.max_debounce = duration;
        self
    }

    /// Use a custom function to spawn the loop thread (to set its name,
    /// stack size, ...).
    pub fn spawn_fn<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Box<dyn FnOnce() + Send>) -> JoinHandle<()> + Send + 'static,
    {
        self.spawn_fn = Some(Box::new(f));
        self
    }

    /// Start the loop.
    ///
    /// Returns `None` if a loop was already spawned for this queue.
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        let (tx, rx) = mpsc::channel::<()>();
        if self.queue.notifier.set(tx).is_err() {
            tracing::warn!("a queue loop is already draining this queue");
            return None;
        }

        // Calls pushed before the loop existed never sent a wake-up.
        if !self.queue.is_empty() {
            self.queue.notify();
        }

        let queue = Arc::downgrade(&self.queue);
        let debounce = self.debounce;
        let max_debounce = self.max_debounce;
        let loop_fn: Box<dyn FnOnce() + Send> = Box::new(move || {
            queue_loop(queue, rx, debounce, max_debounce);
        });

        Some(match self.spawn_fn {
            Some(spawn_fn) => spawn_fn(loop_fn),
            None => thread::spawn(loop_fn),
        })
    }
}

fn queue_loop(
    queue: Weak<MessageQueue>,
    rx: Receiver<()>,
    debounce: Duration,
    max_debounce: Duration,
) {
    loop {
        if rx.recv().is_err() {
            break;
        }

        let started = Instant::now();
        loop {
            let elapsed = started.elapsed();
            if elapsed >= max_debounce {
                break;
            }
            match rx.recv_timeout(debounce.min(max_debounce - elapsed)) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }

        loop {
            match rx.try_recv() {
                Ok(()) => continue,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return,
            }
        }

        let Some(queue) = queue.upgrade() else {
            break;
        };
        queue.flush();
    }
    tracing::debug!("queue loop stopped");
}
