//! Deferred task scheduling.

use crossbeam_channel::{unbounded, Receiver, Sender};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks after the current synchronous work completes.
///
/// Implementations must not run the task inside `schedule`; the dispatcher
/// relies on the flush happening after the mutating call stack unwinds.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, task: Task);
}

/// FIFO microtask queue drained by the host at its idle points.
///
/// Tasks scheduled while the queue is draining run in the same
/// [`run_until_idle`](MicrotaskQueue::run_until_idle) call.
pub struct MicrotaskQueue {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
}

impl MicrotaskQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Run queued tasks until the queue is empty. Returns the number run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        ran
    }
}

impl Default for MicrotaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for MicrotaskQueue {
    fn schedule(&self, task: Task) {
        // Cannot fail: the queue owns its receiver.
        if self.sender.send(task).is_err() {
            tracing::warn!("microtask queue closed, dropping task");
        }
    }
}
