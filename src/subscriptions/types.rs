//! Subscription types: path keys, listeners and disposers.

use crate::types::{Key, ObjectRef, Value, WeakObjectRef};
use std::fmt;
use std::sync::Arc;

use super::registry::Registry;

/// Path a listener is registered under in a registry entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathKey {
    /// A concrete property of the owner.
    Concrete(Key),
    /// Any direct property change of the owner. Used for subscriptions that
    /// reached the owner through a parent's property.
    SelfMarker,
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Concrete(key) => write!(f, "{}", key),
            PathKey::SelfMarker => f.write_str("<self>"),
        }
    }
}

/// Change handler. Receives the newly written value.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Removes a subscription's path from the registry.
///
/// Disposing clears the whole listener list at the path the subscription was
/// registered under, including listeners added by other subscribers to the
/// same path. The disposer holds the owner weakly; disposing after the owner
/// is gone does nothing.
///
/// Listeners themselves are held strongly. A listener that captures a façade
/// over its own owner keeps the owner alive, so its registry entry is never
/// swept until the subscription is disposed.
#[must_use = "dropping a Disposer keeps the subscription active"]
pub struct Disposer {
    registry: Arc<Registry>,
    owner: WeakObjectRef,
    path: PathKey,
}

impl Disposer {
    pub(crate) fn new(registry: Arc<Registry>, owner: &ObjectRef, path: PathKey) -> Self {
        Self {
            registry,
            owner: owner.downgrade(),
            path,
        }
    }

    /// Path the subscription was registered under.
    pub fn path(&self) -> &PathKey {
        &self.path
    }

    /// Object whose registry entry holds the subscription, if still alive.
    pub fn owner(&self) -> Option<ObjectRef> {
        self.owner.upgrade()
    }

    /// Clear every listener at this subscription's path.
    pub fn dispose(self) {
        match self.owner.upgrade() {
            Some(owner) => {
                let removed = self.registry.clear(&owner, &self.path);
                tracing::debug!(path = %self.path, removed, "disposed subscription");
            }
            None => tracing::debug!(path = %self.path, "owner already reclaimed"),
        }
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("owner", &self.owner)
            .field("path", &self.path)
            .finish()
    }
}
