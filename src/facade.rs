//! Tracked views over plain maps and lists.

use crate::equality::identical;
use crate::error::{Result, TrackError};
use crate::subscriptions::Disposer;
use crate::tracker::Tracker;
use crate::types::{Key, ObjectKind, ObjectRef, Value};
use std::fmt;

/// A tracked view of a trackable object.
///
/// Reads of nested maps and lists return façades over them; writes run
/// change detection and notify subscribers before committing. Façades are
/// cheap handles: any number of them over one object share its registry
/// entry, and converting a façade into a [`Value`] yields the unwrapped
/// object.
#[derive(Clone)]
pub struct Facade {
    target: ObjectRef,
    tracker: Tracker,
}

/// Result of reading a property through a façade.
#[derive(Clone, Debug)]
pub enum Tracked {
    /// A nested map or list, wrapped.
    Object(Facade),
    /// A primitive or opaque value, as stored.
    Value(Value),
}

impl Facade {
    pub(crate) fn new(target: ObjectRef, tracker: Tracker) -> Self {
        Self { target, tracker }
    }

    /// The tracker this façade reports to.
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// The canonical object behind this façade.
    pub fn original(&self) -> ObjectRef {
        self.target.clone()
    }

    /// True if both façades view the same object.
    pub fn ptr_eq(&self, other: &Facade) -> bool {
        self.target.ptr_eq(&other.target)
    }

    pub fn kind(&self) -> ObjectKind {
        self.target.kind()
    }

    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    pub fn keys(&self) -> Vec<Key> {
        self.target.keys()
    }

    pub fn contains(&self, key: impl Into<Key>) -> bool {
        self.target.contains(key)
    }

    /// Read a property. Nested maps and lists come back wrapped and
    /// registered.
    pub fn get(&self, key: impl Into<Key>) -> Option<Tracked> {
        let raw = self.target.get(key)?;
        Some(self.tracker.wrap_value(raw, true))
    }

    /// Read a property without wrapping.
    pub fn get_raw(&self, key: impl Into<Key>) -> Option<Value> {
        self.target.get(key)
    }

    /// Write a property.
    ///
    /// Subscribers are notified unless the new value is identical or deeply
    /// equal to the current one. The write itself always happens.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) {
        let value = value.into();
        let (key, prev, accepted) = {
            let data = self.target.read();
            let key = data.canonical_key(&key.into());
            let prev = data.get(&key);
            let accepted = data.accepts(&key, &value);
            (key, prev, accepted)
        };

        if !accepted {
            tracing::debug!(
                key = %key,
                kind = self.target.kind().as_str(),
                "ignoring write to unsupported key"
            );
            return;
        }

        let changed = match &prev {
            None => true,
            Some(prev) if identical(prev, &value) => false,
            Some(prev) => !self.tracker.values_equal(prev, &value),
        };
        if changed {
            self.tracker.notify(&self.target, &key, &value);
        }

        self.target.write().insert(&key, value);
    }

    /// Remove a property without notifying anyone. On a list the slot is
    /// left as Null.
    pub fn delete(&self, key: impl Into<Key>) -> Option<Value> {
        let key = key.into();
        let removed = self.target.remove(&key);
        tracing::trace!(key = %key, removed = removed.is_some(), "deleted property");
        removed
    }

    /// Append to a list, notifying like a write at index `len`.
    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        match self.target.kind() {
            ObjectKind::List => {
                self.set(self.target.len(), value);
                Ok(())
            }
            kind => Err(TrackError::KindMismatch {
                expected: ObjectKind::List.as_str(),
                got: kind.as_str(),
            }),
        }
    }

    /// Subscribe to `key` on this object.
    pub fn subscribe<F>(&self, key: impl Into<Key>, handler: F) -> Disposer
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.tracker.subscribe(self, key, handler)
    }

    /// Subscribe to any direct property change of this object.
    pub fn subscribe_self<F>(&self, handler: F) -> Disposer
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.tracker.subscribe_self(self, handler)
    }

    /// Structural copy of the underlying object, untracked.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.target.clone()).deep_clone()
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Value::Object(self.target.clone()).to_json()
    }
}

impl fmt::Debug for Facade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Facade").field(&self.target).finish()
    }
}

impl From<Facade> for Value {
    fn from(facade: Facade) -> Self {
        Value::Object(facade.target)
    }
}

impl From<&Facade> for Value {
    fn from(facade: &Facade) -> Self {
        Value::Object(facade.original())
    }
}

impl Tracked {
    pub fn is_object(&self) -> bool {
        matches!(self, Tracked::Object(_))
    }

    pub fn as_facade(&self) -> Option<&Facade> {
        match self {
            Tracked::Object(facade) => Some(facade),
            Tracked::Value(_) => None,
        }
    }

    pub fn into_facade(self) -> Option<Facade> {
        match self {
            Tracked::Object(facade) => Some(facade),
            Tracked::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Tracked::Object(_) => None,
            Tracked::Value(value) => Some(value),
        }
    }

    /// Unwrapped value, whether or not it was tracked.
    pub fn into_value(self) -> Value {
        match self {
            Tracked::Object(facade) => facade.into(),
            Tracked::Value(value) => value,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_value().and_then(Value::as_f64)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_value().and_then(Value::as_bool)
    }
}

impl From<Tracked> for Value {
    fn from(tracked: Tracked) -> Self {
        tracked.into_value()
    }
}
