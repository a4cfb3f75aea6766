//! Subscription registry for tracked objects.
//!
//! The registry maps each tracked object's canonical identity to per-path
//! listener lists:
//! - [`PathKey::Concrete`] lists fire when that property of the owner is
//!   written with a new value;
//! - [`PathKey::SelfMarker`] lists fire on any property write to the owner.
//!
//! Entries hold their owner weakly and are swept once it is dropped, so
//! subscribing never extends an object's lifetime.
//!
//! # Example
//!
//! ```ignore
//! let registry = Registry::new();
//! let owner = ObjectRef::new_map();
//!
//! registry.add_listener(&owner, PathKey::Concrete("count".into()), listener);
//! registry.notify(&owner, &"count".into(), &Value::from(1), &dispatcher);
//! ```

mod registry;
mod types;

pub use registry::{Registry, DEFAULT_SWEEP_INTERVAL};
pub use types::{Disposer, Listener, PathKey};
