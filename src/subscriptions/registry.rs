//! Owner-keyed listener registry.

use crate::dispatch::Dispatcher;
use crate::types::{Key, ObjectId, ObjectRef, Value, WeakObjectRef};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::types::{Listener, PathKey};

/// Default number of new entries between sweeps of reclaimed owners.
pub const DEFAULT_SWEEP_INTERVAL: usize = 256;

/// Listener lists for one tracked object.
struct RegistryEntry {
    owner: WeakObjectRef,
    paths: HashMap<PathKey, Vec<Listener>>,
}

impl RegistryEntry {
    fn new(owner: &ObjectRef) -> Self {
        Self {
            owner: owner.downgrade(),
            paths: HashMap::new(),
        }
    }
}

struct Entries {
    by_owner: HashMap<ObjectId, RegistryEntry>,
    /// Entries created since the last sweep.
    created: usize,
}

impl Entries {
    /// Live entry for `owner`, created if missing.
    ///
    /// An entry whose owner was dropped may still sit under a reused address;
    /// it is replaced rather than inherited.
    fn entry_for(&mut self, owner: &ObjectRef) -> &mut RegistryEntry {
        match self.by_owner.entry(owner.id()) {
            Entry::Occupied(slot) => {
                let slot = slot.into_mut();
                if !slot.owner.refers_to(owner) {
                    *slot = RegistryEntry::new(owner);
                    self.created += 1;
                }
                slot
            }
            Entry::Vacant(slot) => {
                self.created += 1;
                slot.insert(RegistryEntry::new(owner))
            }
        }
    }

    fn live_entry(&self, owner: &ObjectRef) -> Option<&RegistryEntry> {
        self.by_owner
            .get(&owner.id())
            .filter(|entry| entry.owner.refers_to(owner))
    }

    fn sweep(&mut self) -> Vec<RegistryEntry> {
        self.created = 0;
        let dead: Vec<ObjectId> = self
            .by_owner
            .iter()
            .filter(|(_, entry)| !entry.owner.is_alive())
            .map(|(id, _)| *id)
            .collect();
        dead.iter()
            .filter_map(|id| self.by_owner.remove(id))
            .collect()
    }
}

/// Process-wide map from tracked objects to their per-path listeners.
///
/// Keys are canonical identities held weakly. Entries whose owner has been
/// dropped are removed by [`sweep`](Registry::sweep), which also runs
/// automatically every `sweep_interval` new entries.
pub struct Registry {
    entries: Mutex<Entries>,
    sweep_interval: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }

    pub fn with_sweep_interval(sweep_interval: usize) -> Self {
        Self {
            entries: Mutex::new(Entries {
                by_owner: HashMap::new(),
                created: 0,
            }),
            sweep_interval: sweep_interval.max(1),
        }
    }

    /// Ensure `owner` has an entry. Idempotent.
    pub fn register(&self, owner: &ObjectRef) {
        let reclaimed = {
            let mut entries = self.entries.lock();
            let reclaimed = self.maybe_sweep(&mut entries);
            entries.entry_for(owner);
            reclaimed
        };
        drop(reclaimed);
    }

    /// Append a listener to `owner`'s list at `path`.
    pub fn add_listener(&self, owner: &ObjectRef, path: PathKey, listener: Listener) {
        let reclaimed = {
            let mut entries = self.entries.lock();
            let reclaimed = self.maybe_sweep(&mut entries);
            entries
                .entry_for(owner)
                .paths
                .entry(path)
                .or_default()
                .push(listener);
            reclaimed
        };
        drop(reclaimed);
    }

    /// Drop every listener at `path` on `owner`. Returns how many were removed.
    pub fn clear(&self, owner: &ObjectRef, path: &PathKey) -> usize {
        let removed = {
            let mut entries = self.entries.lock();
            match entries.by_owner.get_mut(&owner.id()) {
                Some(entry) if entry.owner.refers_to(owner) => entry.paths.remove(path),
                _ => None,
            }
        };
        // Listener captures are dropped outside the lock.
        removed.map_or(0, |listeners| listeners.len())
    }

    /// Listeners interested in a write of `key` on `owner`: the concrete
    /// path's list followed by the self-marker list.
    pub fn listeners_for(&self, owner: &ObjectRef, key: &Key) -> Vec<Listener> {
        let entries = self.entries.lock();
        let Some(entry) = entries.live_entry(owner) else {
            return Vec::new();
        };

        let concrete = entry.paths.get(&PathKey::Concrete(key.clone()));
        let self_marker = entry.paths.get(&PathKey::SelfMarker);
        concrete
            .into_iter()
            .chain(self_marker)
            .flatten()
            .cloned()
            .collect()
    }

    /// Hand the listeners for a write of `key` on `owner` to the dispatcher.
    pub fn notify(&self, owner: &ObjectRef, key: &Key, value: &Value, dispatcher: &Dispatcher) {
        let listeners = self.listeners_for(owner, key);
        tracing::trace!(
            owner = ?owner.id(),
            key = %key,
            listeners = listeners.len(),
            "property changed"
        );
        dispatcher.enqueue(listeners, value);
    }

    /// Whether `owner` has a live entry.
    pub fn contains(&self, owner: &ObjectRef) -> bool {
        self.entries.lock().live_entry(owner).is_some()
    }

    /// Number of listeners on `owner` at `path`.
    pub fn listener_count(&self, owner: &ObjectRef, path: &PathKey) -> usize {
        self.entries
            .lock()
            .live_entry(owner)
            .and_then(|entry| entry.paths.get(path))
            .map_or(0, Vec::len)
    }

    /// Number of entries whose owner is still alive.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .by_owner
            .values()
            .filter(|entry| entry.owner.is_alive())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove entries whose owner has been dropped. Returns how many were
    /// removed.
    pub fn sweep(&self) -> usize {
        let reclaimed = self.entries.lock().sweep();
        if !reclaimed.is_empty() {
            tracing::debug!(reclaimed = reclaimed.len(), "swept registry");
        }
        reclaimed.len()
    }

    fn maybe_sweep(&self, entries: &mut Entries) -> Vec<RegistryEntry> {
        if entries.created < self.sweep_interval {
            return Vec::new();
        }
        entries.sweep()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
