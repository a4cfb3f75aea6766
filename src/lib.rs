//! # Reactive State
//!
//! Mutation tracking for plain maps and lists. Wrap a root object once,
//! subscribe to property paths, and mutate through the wrapper: listeners
//! are notified of real changes without anyone emitting events by hand.
//!
//! ## Core Concepts
//!
//! - **Façades**: tracked views that wrap nested maps and lists on read and
//!   run change detection on write
//! - **Canonical identity**: every tracked object has one [`ObjectRef`];
//!   all façades over it share one notification stream
//! - **Registry**: weak, owner-keyed listener lists per property path, plus a
//!   self-marker path for subscriptions redirected from a parent
//! - **Batched dispatch**: notifications raised in one synchronous window are
//!   flushed together in a single deferred task
//!
//! ## Example
//!
//! ```ignore
//! use reactive_state::{Tracker, TrackerConfig};
//! use serde_json::json;
//!
//! let tracker = Tracker::new(TrackerConfig::default());
//! let state = tracker.track(json!({"count": 0, "user": {"name": "ada"}}))?;
//!
//! let disposer = state.subscribe("count", |value| println!("count = {:?}", value));
//! state.set("count", 1);
//! state.set("count", 1); // no-op, equal value
//!
//! tracker.run_until_idle(); // prints "count = 1" once
//! disposer.dispose();
//! ```
//!
//! ## Deliberate behaviors
//!
//! - Deleting a property never notifies.
//! - Disposing a subscription clears every listener on its path.
//! - A subscription to a path holding an object watches that object's own
//!   properties, one level deep.

pub mod dispatch;
pub mod equality;
pub mod error;
pub mod facade;
pub mod identity;
pub mod subscriptions;
pub mod tracker;
pub mod types;

// Re-exports
pub use dispatch::{DispatchStats, Dispatcher, FlushReport, MicrotaskQueue, Scheduler, Task};
pub use equality::{deep_equal, deep_equal_skipping, identical, DEFAULT_SKIP_KEY};
pub use error::{Result, TrackError};
pub use facade::{Facade, Tracked};
pub use identity::{canonical, Canonical};
pub use subscriptions::{Disposer, Listener, PathKey, Registry};
pub use tracker::{global, run_until_idle, subscribe, track, unwrap, wrap, Tracker, TrackerConfig};
pub use types::{
    Key, ObjectId, ObjectKind, ObjectRef, Opaque, Value, WeakObjectRef, LENGTH_KEY,
    MAX_LIST_LENGTH,
};
