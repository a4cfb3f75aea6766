//! Tracker tying the registry, dispatcher and scheduler together.

use crate::dispatch::{Dispatcher, MicrotaskQueue, Scheduler};
use crate::equality::{deep_equal_skipping, DEFAULT_SKIP_KEY};
use crate::error::{Result, TrackError};
use crate::facade::{Facade, Tracked};
use crate::identity::canonical;
use crate::subscriptions::{Disposer, PathKey, Registry, DEFAULT_SWEEP_INTERVAL};
use crate::types::{Key, ObjectRef, Value};
use std::sync::{Arc, OnceLock};

/// Tracker configuration.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// Map key whose value deep equality ignores.
    pub equality_skip_key: Option<String>,

    /// Whether wrapping a root object also registers it. Nested objects
    /// are always registered when read.
    pub register_roots: bool,

    /// New registry entries between sweeps of reclaimed owners.
    pub sweep_interval: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            equality_skip_key: Some(DEFAULT_SKIP_KEY.to_string()),
            register_roots: false,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

struct Inner {
    config: TrackerConfig,
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    /// Set when the tracker owns its scheduler.
    queue: Option<Arc<MicrotaskQueue>>,
}

/// The mutation tracker.
///
/// Provides a unified interface for:
/// - Wrapping plain maps and lists into [`Facade`]s
/// - Subscribing to property paths
/// - Driving deferred notification flushes
///
/// Cloning a tracker is cheap and shares all state.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<Inner>,
}

impl Tracker {
    /// Create a tracker that flushes on its own [`MicrotaskQueue`]. Call
    /// [`run_until_idle`](Tracker::run_until_idle) to deliver notifications.
    pub fn new(config: TrackerConfig) -> Self {
        let queue = Arc::new(MicrotaskQueue::new());
        Self::build(config, queue.clone(), Some(queue))
    }

    /// Create a tracker that flushes through a host-provided scheduler.
    pub fn with_scheduler(config: TrackerConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::build(config, scheduler, None)
    }

    fn build(
        config: TrackerConfig,
        scheduler: Arc<dyn Scheduler>,
        queue: Option<Arc<MicrotaskQueue>>,
    ) -> Self {
        let registry = Arc::new(Registry::with_sweep_interval(config.sweep_interval));
        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                dispatcher: Dispatcher::new(scheduler),
                queue,
            }),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    // --- Wrapping ---

    /// Wrap a root value. Maps and lists come back as façades; anything else
    /// passes through unchanged.
    pub fn wrap(&self, value: impl Into<Value>) -> Tracked {
        self.wrap_value(value.into(), self.inner.config.register_roots)
    }

    /// Wrap a root object.
    pub fn wrap_object(&self, object: &ObjectRef) -> Facade {
        self.wrap_with(object.clone(), self.inner.config.register_roots)
    }

    /// Wrap a root value that must be a map or list.
    pub fn track(&self, value: impl Into<Value>) -> Result<Facade> {
        match self.wrap(value) {
            Tracked::Object(facade) => Ok(facade),
            Tracked::Value(other) => Err(TrackError::NotTrackable(other.type_name())),
        }
    }

    /// The canonical object behind a façade.
    pub fn unwrap(&self, facade: &Facade) -> ObjectRef {
        facade.original()
    }

    pub(crate) fn wrap_value(&self, value: Value, register: bool) -> Tracked {
        match value {
            Value::Object(object) => Tracked::Object(self.wrap_with(object, register)),
            other => Tracked::Value(other),
        }
    }

    fn wrap_with(&self, object: ObjectRef, register: bool) -> Facade {
        if register {
            self.inner.registry.register(&object);
        }
        Facade::new(object, self.clone())
    }

    // --- Subscriptions ---

    /// Subscribe `handler` to `key` on `target`.
    ///
    /// If `target[key]` currently holds a map or list, the subscription is
    /// redirected to that object's self-marker: it fires on any direct
    /// property write to the held object, and keeps watching that object
    /// even if `target[key]` is later reassigned. Otherwise it watches writes
    /// of `key` on `target` itself.
    ///
    /// Propagation is one level only: writes deeper inside the held object
    /// do not reach this handler.
    ///
    /// The registry holds `handler` strongly. A handler that captures a
    /// façade over its own owner keeps that owner, and this tracker, alive
    /// until the returned [`Disposer`] is disposed.
    pub fn subscribe<F>(&self, target: &Facade, key: impl Into<Key>, handler: F) -> Disposer
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let original_obj = target.original();
        let key = original_obj.canonical_key(key);
        let next_value = target.get(&key);

        let (owner, path) = match canonical(&next_value) {
            Some(original_next) => (original_next, PathKey::SelfMarker),
            None => (original_obj, PathKey::Concrete(key)),
        };

        tracing::debug!(owner = ?owner.id(), path = %path, "subscribing");
        self.inner
            .registry
            .add_listener(&owner, path.clone(), Arc::new(handler));
        Disposer::new(Arc::clone(&self.inner.registry), &owner, path)
    }

    /// Subscribe `handler` to every direct property write on `target`.
    pub fn subscribe_self<F>(&self, target: &Facade, handler: F) -> Disposer
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let owner = target.original();
        tracing::debug!(owner = ?owner.id(), path = %PathKey::SelfMarker, "subscribing");
        self.inner
            .registry
            .add_listener(&owner, PathKey::SelfMarker, Arc::new(handler));
        Disposer::new(Arc::clone(&self.inner.registry), &owner, PathKey::SelfMarker)
    }

    /// Install a callback for listener panics caught during flushes.
    pub fn on_listener_error<F>(&self, hook: F)
    where
        F: Fn(&TrackError) + Send + Sync + 'static,
    {
        self.inner.dispatcher.set_error_hook(Arc::new(hook));
    }

    // --- Dispatch ---

    /// Drain the tracker's own queue, delivering pending notifications.
    /// Returns the number of flushes run; always 0 for trackers built with
    /// [`with_scheduler`](Tracker::with_scheduler).
    pub fn run_until_idle(&self) -> usize {
        self.inner
            .queue
            .as_ref()
            .map_or(0, |queue| queue.run_until_idle())
    }

    pub(crate) fn values_equal(&self, a: &Value, b: &Value) -> bool {
        deep_equal_skipping(a, b, self.inner.config.equality_skip_key.as_deref())
    }

    pub(crate) fn notify(&self, owner: &ObjectRef, key: &Key, value: &Value) {
        self.inner
            .registry
            .notify(owner, key, value, &self.inner.dispatcher);
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("config", &self.inner.config)
            .field("registered", &self.inner.registry.len())
            .field("dispatcher", &self.inner.dispatcher)
            .finish()
    }
}

// --- Process-wide tracker ---

/// The process-wide tracker used by the free functions in this module.
pub fn global() -> &'static Tracker {
    static GLOBAL: OnceLock<Tracker> = OnceLock::new();
    GLOBAL.get_or_init(Tracker::default)
}

/// Wrap a root value with the global tracker.
pub fn wrap(value: impl Into<Value>) -> Tracked {
    global().wrap(value)
}

/// Wrap a root map or list with the global tracker.
pub fn track(value: impl Into<Value>) -> Result<Facade> {
    global().track(value)
}

/// Subscribe through the tracker that owns `target`.
pub fn subscribe<F>(target: &Facade, key: impl Into<Key>, handler: F) -> Disposer
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    target.tracker().subscribe(target, key, handler)
}

/// The canonical object behind a façade.
pub fn unwrap(facade: &Facade) -> ObjectRef {
    facade.original()
}

/// Deliver pending notifications of the global tracker.
pub fn run_until_idle() -> usize {
    global().run_until_idle()
}
