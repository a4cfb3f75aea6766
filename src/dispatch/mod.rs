//! Batched, deferred delivery of change notifications.
//!
//! Mutations never call listeners directly. The registry hands matching
//! listeners to the [`Dispatcher`], which accumulates them for the current
//! synchronous window and flushes them together in one deferred task:
//! - invocation order within a flush is enqueue order;
//! - at most one flush is scheduled per window;
//! - a panicking listener is logged and reported, and its siblings still run.
//!
//! The deferral point is pluggable through [`Scheduler`]. The default
//! [`MicrotaskQueue`] is drained explicitly by the host:
//!
//! ```ignore
//! let queue = Arc::new(MicrotaskQueue::new());
//! let dispatcher = Dispatcher::new(queue.clone());
//!
//! dispatcher.enqueue(listeners, &Value::from(1));
//! queue.run_until_idle(); // listeners run here
//! ```

mod dispatcher;
mod scheduler;

pub use dispatcher::{DispatchStats, Dispatcher, ErrorHook, FlushReport};
pub use scheduler::{MicrotaskQueue, Scheduler, Task};
