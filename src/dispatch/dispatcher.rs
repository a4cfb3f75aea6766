//! Batched listener dispatch.

use crate::error::TrackError;
use crate::subscriptions::Listener;
use crate::types::Value;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::scheduler::Scheduler;

/// Callback receiving listener faults caught during a flush.
pub type ErrorHook = Arc<dyn Fn(&TrackError) + Send + Sync>;

/// Listener invocations waiting for the next flush.
#[derive(Default)]
struct PendingBatch {
    entries: Vec<(Listener, Value)>,
    /// A flush task is already scheduled for this window.
    scheduled: bool,
}

/// Outcome of one flush window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Listeners that returned normally.
    pub delivered: usize,
    /// Listeners that panicked.
    pub failed: usize,
}

/// Cumulative dispatcher counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub flushes: u64,
    pub delivered: u64,
    pub failed: u64,
}

/// State shared between the dispatcher and its scheduled flush tasks.
#[derive(Default)]
struct Shared {
    pending: Mutex<PendingBatch>,
    error_hook: RwLock<Option<ErrorHook>>,
    last_flush: Mutex<FlushReport>,
    flushes: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl Shared {
    fn flush(&self) -> FlushReport {
        let entries = {
            let mut batch = self.pending.lock();
            batch.scheduled = false;
            std::mem::take(&mut batch.entries)
        };
        let hook = self.error_hook.read().clone();

        let mut report = FlushReport::default();
        for (listener, payload) in entries {
            match catch_unwind(AssertUnwindSafe(|| listener(&payload))) {
                Ok(()) => report.delivered += 1,
                Err(panic) => {
                    report.failed += 1;
                    let error = TrackError::ListenerPanicked {
                        message: panic_message(panic.as_ref()),
                    };
                    tracing::error!(%error, "listener failed during flush");
                    if let Some(hook) = &hook {
                        if catch_unwind(AssertUnwindSafe(|| hook(&error))).is_err() {
                            tracing::error!("listener error hook panicked");
                        }
                    }
                }
            }
        }

        *self.last_flush.lock() = report;
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.failed.fetch_add(report.failed as u64, Ordering::Relaxed);
        tracing::trace!(
            delivered = report.delivered,
            failed = report.failed,
            "flushed listener batch"
        );
        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Coalesces listener invocations into one deferred flush per window.
///
/// The first enqueue of a window schedules a flush on the [`Scheduler`];
/// later enqueues in the same window only append. The flush takes the whole
/// batch and clears the scheduled flag before running anything, so listeners
/// that mutate tracked state open the next window.
pub struct Dispatcher {
    shared: Arc<Shared>,
    scheduler: Arc<dyn Scheduler>,
}

impl Dispatcher {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            scheduler,
        }
    }

    /// Queue every listener with the same payload.
    pub fn enqueue(&self, listeners: Vec<Listener>, payload: &Value) {
        if listeners.is_empty() {
            return;
        }

        let needs_flush = {
            let mut batch = self.shared.pending.lock();
            batch
                .entries
                .extend(listeners.into_iter().map(|l| (l, payload.clone())));
            !std::mem::replace(&mut batch.scheduled, true)
        };

        // Scheduled outside the lock in case the scheduler runs tasks eagerly.
        if needs_flush {
            let shared = Arc::clone(&self.shared);
            self.scheduler.schedule(Box::new(move || {
                shared.flush();
            }));
        }
    }

    /// Install the callback that receives listener faults.
    pub fn set_error_hook(&self, hook: ErrorHook) {
        *self.shared.error_hook.write() = Some(hook);
    }

    /// Number of invocations waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.shared.pending.lock().entries.len()
    }

    /// Whether a flush is scheduled and has not run yet.
    pub fn is_scheduled(&self) -> bool {
        self.shared.pending.lock().scheduled
    }

    /// Report of the most recent flush.
    pub fn last_flush(&self) -> FlushReport {
        *self.shared.last_flush.lock()
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            flushes: self.shared.flushes.load(Ordering::Relaxed),
            delivered: self.shared.delivered.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.pending())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::MicrotaskQueue;

    fn recording(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Listener {
        let log = Arc::clone(log);
        Arc::new(move |value: &Value| log.lock().push(format!("{}={:?}", name, value)))
    }

    #[test]
    fn test_single_flush_per_window() {
        let queue = Arc::new(MicrotaskQueue::new());
        let dispatcher = Dispatcher::new(queue.clone());
        let log = Arc::new(Mutex::new(Vec::new()));

        dispatcher.enqueue(vec![recording(&log, "a")], &Value::from(1));
        dispatcher.enqueue(vec![recording(&log, "b")], &Value::from(2));

        assert_eq!(queue.pending(), 1);
        assert_eq!(dispatcher.pending(), 2);
        assert!(log.lock().is_empty());

        assert_eq!(queue.run_until_idle(), 1);
        assert_eq!(*log.lock(), vec!["a=1", "b=2"]);
        assert_eq!(dispatcher.stats().flushes, 1);
        assert!(!dispatcher.is_scheduled());
    }

    #[test]
    fn test_empty_enqueue_schedules_nothing() {
        let queue = Arc::new(MicrotaskQueue::new());
        let dispatcher = Dispatcher::new(queue.clone());

        dispatcher.enqueue(Vec::new(), &Value::Null);

        assert_eq!(queue.pending(), 0);
        assert!(!dispatcher.is_scheduled());
    }

    #[test]
    fn test_panicking_listener_does_not_stop_siblings() {
        let queue = Arc::new(MicrotaskQueue::new());
        let dispatcher = Dispatcher::new(queue.clone());
        let log = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&errors);
        dispatcher.set_error_hook(Arc::new(move |e: &TrackError| sink.lock().push(e.clone())));

        let boom: Listener = Arc::new(|_: &Value| panic!("boom"));
        dispatcher.enqueue(
            vec![recording(&log, "before"), boom, recording(&log, "after")],
            &Value::from(true),
        );
        queue.run_until_idle();

        assert_eq!(*log.lock(), vec!["before=true", "after=true"]);
        assert_eq!(
            *errors.lock(),
            vec![TrackError::ListenerPanicked {
                message: "boom".to_string()
            }]
        );
        let stats = dispatcher.stats();
        assert_eq!((stats.delivered, stats.failed), (2, 1));
        assert_eq!(
            dispatcher.last_flush(),
            FlushReport {
                delivered: 2,
                failed: 1
            }
        );
    }
}
