//! Dependency Store
//!
//! The store is the subscription graph: for every observed target, a map from
//! dependency key to the set of effects that read it.
//!
//! # How It Works
//!
//! 1. `track` looks up (or creates) the [`Dep`] for a (target, key) pair and
//!    adds the active effect to it. The effect keeps the `Arc<Dep>` too, so it
//!    can leave every set it belongs to before its next run.
//!
//! 2. `trigger` looks up the deps touched by a write and snapshots their
//!    subscribers. The store lock is never held while effects run.
//!
//! 3. When a target is dropped, its entry is removed with [`forget`] and
//!    every dep in it is cleared. The effects the deps held are released.
//!
//! Refs and computeds own a private [`Dep`] outside the store: they have a
//! single trackable slot.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use super::effect::{EffectId, ReactiveEffect};
use crate::value::{Identity, Key, TargetId};

/// What a dependency is keyed by within one target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// A property of an object or array (`length` included).
    Prop(Key),
    /// One key of a Map, Set, WeakMap or WeakSet.
    Entry(Identity),
    /// The key set as a whole.
    Iterate,
    /// The key set of a Map, as seen by `keys()`.
    MapKeyIterate,
}

impl From<Key> for DepKey {
    fn from(key: Key) -> Self {
        DepKey::Prop(key)
    }
}

/// An ordered, de-duplicating set of subscribed effects.
pub struct Dep {
    subscribers: Mutex<IndexMap<EffectId, ReactiveEffect>>,
}

impl Dep {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: Mutex::new(IndexMap::new()),
        })
    }

    /// Add `effect`; returns false if it was already subscribed.
    pub(crate) fn insert(&self, effect: &ReactiveEffect) -> bool {
        let mut subscribers = self.subscribers.lock();
        if subscribers.contains_key(&effect.id()) {
            return false;
        }
        subscribers.insert(effect.id(), effect.clone());
        true
    }

    pub(crate) fn remove(&self, id: EffectId) {
        let removed = self.subscribers.lock().shift_remove(&id);
        drop(removed);
    }

    pub(crate) fn snapshot(&self) -> Vec<ReactiveEffect> {
        self.subscribers.lock().values().cloned().collect()
    }

    /// Unsubscribe everything.
    pub(crate) fn clear(&self) {
        let removed = std::mem::take(&mut *self.subscribers.lock());
        drop(removed);
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("subscribers", &self.len())
            .finish()
    }
}

type DepsMap = HashMap<DepKey, Arc<Dep>>;

static STORE: OnceLock<RwLock<HashMap<TargetId, DepsMap>>> = OnceLock::new();

fn get_store() -> &'static RwLock<HashMap<TargetId, DepsMap>> {
    STORE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// The dep for `(target, key)`, created on first use.
pub(crate) fn dep_for(target: TargetId, key: DepKey) -> Arc<Dep> {
    if let Some(dep) = get_store()
        .read()
        .get(&target)
        .and_then(|deps| deps.get(&key))
    {
        return dep.clone();
    }

    get_store()
        .write()
        .entry(target)
        .or_default()
        .entry(key)
        .or_insert_with(Dep::new)
        .clone()
}

/// Run `f` over the target's deps. `None` if the target was never tracked.
pub(crate) fn with_deps<R>(target: TargetId, f: impl FnOnce(&DepsMap) -> R) -> Option<R> {
    get_store().read().get(&target).map(f)
}

/// Remove the target's entry and clear every dep it held.
pub(crate) fn forget(target: TargetId) {
    let removed = get_store().write().remove(&target);
    if let Some(deps) = removed {
        for dep in deps.values() {
            dep.clear();
        }
    }
}

/// Targets that currently have an entry in the store.
pub fn tracked_targets() -> Vec<TargetId> {
    get_store().read().keys().copied().collect()
}

/// Number of dependency keys recorded for `target`.
pub fn dep_count(target: TargetId) -> usize {
    with_deps(target, HashMap::len).unwrap_or(0)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
