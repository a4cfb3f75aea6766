//! Canonical identity resolution.
//!
//! Every trackable object has exactly one canonical handle, the
//! [`ObjectRef`] behind all of its façades. The subscription registry keys on
//! it, so any number of façades over one object share a notification stream.

use crate::facade::{Facade, Tracked};
use crate::types::{ObjectRef, Value};

/// Resolves a wrapped or unwrapped value to its canonical object.
pub trait Canonical {
    /// The canonical object, or `None` for primitives and opaque values.
    fn canonical(&self) -> Option<ObjectRef>;
}

impl Canonical for ObjectRef {
    fn canonical(&self) -> Option<ObjectRef> {
        Some(self.clone())
    }
}

impl Canonical for Facade {
    fn canonical(&self) -> Option<ObjectRef> {
        Some(self.original())
    }
}

impl Canonical for Value {
    fn canonical(&self) -> Option<ObjectRef> {
        self.as_object().cloned()
    }
}

impl Canonical for Tracked {
    fn canonical(&self) -> Option<ObjectRef> {
        match self {
            Tracked::Object(facade) => facade.canonical(),
            Tracked::Value(value) => value.canonical(),
        }
    }
}

impl<T: Canonical> Canonical for Option<T> {
    fn canonical(&self) -> Option<ObjectRef> {
        self.as_ref().and_then(Canonical::canonical)
    }
}

/// Free-function form of [`Canonical::canonical`].
pub fn canonical<T: Canonical + ?Sized>(value: &T) -> Option<ObjectRef> {
    value.canonical()
}
