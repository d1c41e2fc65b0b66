//! Collection Methods
//!
//! Map, Set, WeakMap and WeakSet keep their data behind methods rather than
//! properties, so they are observed through method instrumentation instead of
//! the property traps.
//!
//! # How It Works
//!
//! A collection proxy delegates reads to the layer below it. For
//! `readonly(reactive(map))` that layer is the reactive proxy, which still
//! tracks the read. Writes always go to the raw target at the bottom and
//! trigger against it.
//!
//! Lookups try the key as given and then its raw form, so a map keyed by a
//! raw object answers for that object's proxy too.
//!
//! Results are wrapped on the way out to match the proxy flavour. Iterators
//! snapshot the entries when created and wrap each item as it is yielded.

use std::fmt;

use smallvec::SmallVec;
use tracing::warn;

use super::dep::DepKey;
use super::operations::{track, trigger, TrackOp, TriggerOp};
use super::proxy::{to_raw, to_reactive, to_readonly, ProxyFlags, ProxyKind};
use crate::value::{has_changed, Target, Value};

/// Wrap a value read out of a collection to match the proxy flavour.
fn wrap(flags: ProxyFlags, value: Value) -> Value {
    if flags.shallow {
        value
    } else if flags.readonly {
        to_readonly(value)
    } else {
        to_reactive(value)
    }
}

/// Which collection kinds an operation applies to.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Supports {
    Any,
    /// Map and WeakMap.
    Keyed,
    /// Set and WeakSet.
    Unkeyed,
    /// Map and Set; weak collections cannot be sized or iterated.
    Strong,
}

enum Collection {
    Raw(Target),
    Proxy {
        /// The layer this proxy delegates reads to.
        inner: Value,
        raw: Target,
        flags: ProxyFlags,
    },
}

fn collection(value: &Value, op: &'static str, supports: Supports) -> Option<Collection> {
    let collection = match value {
        Value::Object(target) => Collection::Raw(target.clone()),
        Value::Proxy(proxy) => match proxy.kind() {
            ProxyKind::Reactive { target, raw, flags } => Collection::Proxy {
                inner: target.to_value(),
                raw: raw.clone(),
                flags: *flags,
            },
            ProxyKind::RefUnwrap { source } => return collection(source, op, supports),
        },
        _ => {
            warn!(op, ?value, "not a collection");
            return None;
        }
    };

    let kind = match &collection {
        Collection::Raw(target) | Collection::Proxy { raw: target, .. } => target.kind(),
    };
    let supported = kind.is_collection()
        && match supports {
            Supports::Any => true,
            Supports::Keyed => kind.is_keyed(),
            Supports::Unkeyed => !kind.is_keyed(),
            Supports::Strong => !kind.is_weak(),
        };
    if !supported {
        warn!(op, ?kind, "operation not supported by this target");
        return None;
    }
    Some(collection)
}

/// Weak collections only hold object keys.
fn check_key(target: &Target, key: &Value, op: &'static str) -> bool {
    if target.kind().is_weak() && !key.is_object() {
        warn!(op, id = %target.id(), ?key, "invalid value used as weak collection key");
        return false;
    }
    true
}

fn entry(key: &Value) -> DepKey {
    DepKey::Entry(key.identity())
}

/// Track a keyed read under the key and, when it differs, its raw form.
fn track_key(raw: &Target, op: TrackOp, key: &Value, raw_key: &Value) {
    if key.identity() != raw_key.identity() {
        track(raw, op, entry(key));
    }
    track(raw, op, entry(raw_key));
}

/// Resolve the stored form of `key`: as given if present, else its raw form.
fn stored_key(raw: &Target, key: Value) -> (Value, bool) {
    if raw.entry_has(&key) {
        return (key, true);
    }
    let raw_key = to_raw(&key);
    let had_key = raw.entry_has(&raw_key);
    (raw_key, had_key)
}

/// What an iterator yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Keys,
    Values,
    Pairs,
}

/// Iterator over a snapshot of a collection's entries.
///
/// Every proxy layer the iterator was created through adds a wrapping step,
/// applied innermost first as items are yielded. Pairs are yielded as
/// two-element arrays.
pub struct CollectionIter {
    entries: std::vec::IntoIter<(Value, Value)>,
    shape: Shape,
    wraps: SmallVec<[ProxyFlags; 2]>,
}

impl CollectionIter {
    fn new(entries: Vec<(Value, Value)>, shape: Shape) -> Self {
        Self {
            entries: entries.into_iter(),
            shape,
            wraps: SmallVec::new(),
        }
    }

    fn empty() -> Self {
        Self::new(Vec::new(), Shape::Values)
    }

    fn wrapped(mut self, flags: ProxyFlags) -> Self {
        self.wraps.push(flags);
        self
    }

    fn apply(&self, value: Value) -> Value {
        self.wraps.iter().fold(value, |value, flags| wrap(*flags, value))
    }
}

impl Iterator for CollectionIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let (key, value) = self.entries.next()?;
        Some(match self.shape {
            Shape::Keys => self.apply(key),
            Shape::Values => self.apply(value),
            Shape::Pairs => Value::array(vec![self.apply(key), self.apply(value)]),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for CollectionIter {}

impl fmt::Debug for CollectionIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionIter")
            .field("shape", &self.shape)
            .field("remaining", &self.entries.len())
            .field("layers", &self.wraps.len())
            .finish()
    }
}

#[derive(Clone, Copy)]
enum Method {
    Keys,
    Values,
    Entries,
    Default,
}

impl Value {
    /// `Map.prototype.get`.
    pub fn map_get(&self, key: impl Into<Value>) -> Value {
        let key = key.into();
        match collection(self, "get", Supports::Keyed) {
            None => Value::Undefined,
            Some(Collection::Raw(target)) => target.entry_get(&key).unwrap_or_default(),
            Some(Collection::Proxy { inner, raw, flags }) => {
                let raw_key = to_raw(&key);
                if !flags.readonly {
                    track_key(&raw, TrackOp::Get, &key, &raw_key);
                }
                if raw.entry_has(&key) {
                    wrap(flags, inner.map_get(key))
                } else if raw.entry_has(&raw_key) {
                    wrap(flags, inner.map_get(raw_key))
                } else {
                    if matches!(inner, Value::Proxy(_)) {
                        // Let the inner layer record the miss.
                        inner.map_get(key);
                    }
                    Value::Undefined
                }
            }
        }
    }

    /// `Map.prototype.set`. Returns `self` for chaining.
    pub fn map_set(&self, key: impl Into<Value>, value: impl Into<Value>) -> Value {
        let (key, value) = (key.into(), value.into());
        match collection(self, "set", Supports::Keyed) {
            None => {}
            Some(Collection::Raw(target)) => {
                if check_key(&target, &key, "set") {
                    target.entry_insert(key, Some(value));
                }
            }
            Some(Collection::Proxy { raw, flags, .. }) if flags.readonly => {
                warn!(id = %raw.id(), "set operation failed: collection is readonly");
            }
            Some(Collection::Proxy { raw, .. }) => {
                let value = to_raw(&value);
                let (key, had_key) = stored_key(&raw, key);
                if check_key(&raw, &key, "set") {
                    let old_value = raw.entry_get(&key).unwrap_or_default();
                    raw.entry_insert(key.clone(), Some(value.clone()));
                    if !had_key {
                        trigger(&raw, TriggerOp::Add, Some(entry(&key)), Some(&value), None);
                    } else if has_changed(&value, &old_value) {
                        trigger(
                            &raw,
                            TriggerOp::Set,
                            Some(entry(&key)),
                            Some(&value),
                            Some(&old_value),
                        );
                    }
                }
            }
        }
        self.clone()
    }

    /// `Set.prototype.add`. Returns `self` for chaining.
    pub fn add(&self, value: impl Into<Value>) -> Value {
        let value = value.into();
        match collection(self, "add", Supports::Unkeyed) {
            None => {}
            Some(Collection::Raw(target)) => {
                if check_key(&target, &value, "add") {
                    target.entry_insert(value, None);
                }
            }
            Some(Collection::Proxy { raw, flags, .. }) if flags.readonly => {
                warn!(id = %raw.id(), "add operation failed: collection is readonly");
            }
            Some(Collection::Proxy { raw, .. }) => {
                let value = to_raw(&value);
                if check_key(&raw, &value, "add") && !raw.entry_has(&value) {
                    raw.entry_insert(value.clone(), None);
                    trigger(&raw, TriggerOp::Add, Some(entry(&value)), Some(&value), None);
                }
            }
        }
        self.clone()
    }

    /// `has` of a Map, Set, WeakMap or WeakSet.
    pub fn contains(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        match collection(self, "has", Supports::Any) {
            None => false,
            Some(Collection::Raw(target)) => target.entry_has(&key),
            Some(Collection::Proxy { inner, raw, flags }) => {
                let raw_key = to_raw(&key);
                if !flags.readonly {
                    track_key(&raw, TrackOp::Has, &key, &raw_key);
                }
                if key.identity() == raw_key.identity() {
                    inner.contains(key)
                } else {
                    inner.contains(key) || inner.contains(raw_key)
                }
            }
        }
    }

    /// `delete` of a Map, Set, WeakMap or WeakSet; returns whether the key
    /// was present.
    pub fn remove(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        match collection(self, "delete", Supports::Any) {
            None => false,
            Some(Collection::Raw(target)) => target.entry_remove(&key),
            Some(Collection::Proxy { raw, flags, .. }) if flags.readonly => {
                warn!(id = %raw.id(), "delete operation failed: collection is readonly");
                false
            }
            Some(Collection::Proxy { raw, .. }) => {
                let (key, had_key) = stored_key(&raw, key);
                let old_value = raw.entry_get(&key);
                let removed = raw.entry_remove(&key);
                if had_key {
                    trigger(&raw, TriggerOp::Delete, Some(entry(&key)), None, old_value.as_ref());
                }
                removed
            }
        }
    }

    /// Remove every entry of a Map or Set.
    pub fn clear(&self) {
        match collection(self, "clear", Supports::Strong) {
            None => {}
            Some(Collection::Raw(target)) => {
                target.entry_clear();
            }
            Some(Collection::Proxy { raw, flags, .. }) if flags.readonly => {
                warn!(id = %raw.id(), "clear operation failed: collection is readonly");
            }
            Some(Collection::Proxy { raw, .. }) => {
                if raw.entry_clear() {
                    trigger(&raw, TriggerOp::Clear, None, None, None);
                }
            }
        }
    }

    /// Number of entries of a Map or Set.
    pub fn size(&self) -> usize {
        match collection(self, "size", Supports::Strong) {
            None => 0,
            Some(Collection::Raw(target)) => target.entry_count(),
            Some(Collection::Proxy { inner, raw, flags }) => {
                if !flags.readonly {
                    track(&raw, TrackOp::Iterate, DepKey::Iterate);
                }
                inner.size()
            }
        }
    }

    /// Call `f(value, key)` for every entry. Sets pass each value twice.
    pub fn for_each(&self, mut f: impl FnMut(Value, Value)) {
        self.for_each_entry(&mut f);
    }

    fn for_each_entry(&self, f: &mut dyn FnMut(Value, Value)) {
        match collection(self, "forEach", Supports::Strong) {
            None => {}
            Some(Collection::Raw(target)) => {
                for (key, value) in target.entries_snapshot() {
                    f(value, key);
                }
            }
            Some(Collection::Proxy { inner, raw, flags }) => {
                if !flags.readonly {
                    track(&raw, TrackOp::Iterate, DepKey::Iterate);
                }
                inner.for_each_entry(&mut |value, key| f(wrap(flags, value), wrap(flags, key)));
            }
        }
    }

    /// Keys of a Map, or values of a Set.
    pub fn keys(&self) -> CollectionIter {
        self.iterate(Method::Keys)
    }

    pub fn values(&self) -> CollectionIter {
        self.iterate(Method::Values)
    }

    /// `[key, value]` arrays; Sets yield `[value, value]`.
    pub fn entries(&self) -> CollectionIter {
        self.iterate(Method::Entries)
    }

    /// Default iteration: pairs for a Map, values for a Set.
    pub fn iter(&self) -> CollectionIter {
        self.iterate(Method::Default)
    }

    fn iterate(&self, method: Method) -> CollectionIter {
        match collection(self, "iterate", Supports::Strong) {
            None => CollectionIter::empty(),
            Some(Collection::Raw(target)) => {
                let shape = match method {
                    Method::Keys => Shape::Keys,
                    Method::Values => Shape::Values,
                    Method::Entries => Shape::Pairs,
                    Method::Default if target.is_map() => Shape::Pairs,
                    Method::Default => Shape::Values,
                };
                CollectionIter::new(target.entries_snapshot(), shape)
            }
            Some(Collection::Proxy { inner, raw, flags }) => {
                if !flags.readonly {
                    let key = match method {
                        Method::Keys if raw.is_map() => DepKey::MapKeyIterate,
                        _ => DepKey::Iterate,
                    };
                    track(&raw, TrackOp::Iterate, key);
                }
                inner.iterate(method).wrapped(flags)
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::reactive::{
        effect, is_reactive, is_readonly, reactive, readonly, shallow_reactive, stop, to_raw,
        tracked_targets,
    };
    use crate::value::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        (runs.clone(), runs)
    }

    #[test]
    fn map_get_tracks_its_key() {
        let map = reactive(Value::new_map());
        let (runs, runs_clone) = counter();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let (map_clone, seen_clone) = (map.clone(), seen.clone());
        let _runner = effect(move || {
            seen_clone.lock().push(map_clone.map_get("a"));
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        map.map_set("a", 1);
        map.map_set("a", 1);
        map.map_set("b", 2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(*seen.lock(), vec![Value::Undefined, Value::from(1)]);
    }

    #[test]
    fn map_stores_raw_values() {
        let map = reactive(Value::new_map());
        let child = reactive(Value::object());
        map.map_set("child", child.clone());
        assert_eq!(to_raw(&map).map_get("child"), to_raw(&child));
        assert_eq!(map.map_get("child"), child);
    }

    #[test]
    fn raw_key_lookup_answers_for_proxy_keys() {
        let key = Value::object();
        let map = reactive(Value::new_map());
        map.map_set(key.clone(), 1);
        assert_eq!(map.map_get(reactive(key.clone())), Value::from(1));
        assert!(map.contains(reactive(key.clone())));
        assert!(map.remove(reactive(key)));
        assert_eq!(map.size(), 0);
    }

    #[test]
    fn size_and_iteration_follow_structure() {
        let set = reactive(Value::new_set());
        let (runs, runs_clone) = counter();
        let set_clone = set.clone();
        let _runner = effect(move || {
            set_clone.size();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        set.add(1);
        set.add(1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        set.remove(1);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        set.remove(1);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        set.add(2);
        set.clear();
        assert_eq!(runs.load(Ordering::SeqCst), 5);
        // Clearing an empty set triggers nothing.
        set.clear();
        assert_eq!(runs.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn map_keys_ignore_value_updates() {
        let map = reactive(Value::new_map());
        map.map_set("a", 1);
        let (key_runs, key_clone) = counter();
        let (value_runs, value_clone) = counter();
        let (for_keys, for_values) = (map.clone(), map.clone());
        let _keys = effect(move || {
            for_keys.keys().count();
            key_clone.fetch_add(1, Ordering::SeqCst);
        });
        let _values = effect(move || {
            for_values.values().count();
            value_clone.fetch_add(1, Ordering::SeqCst);
        });

        map.map_set("a", 2);
        assert_eq!(key_runs.load(Ordering::SeqCst), 1);
        assert_eq!(value_runs.load(Ordering::SeqCst), 2);

        map.map_set("b", 3);
        assert_eq!(key_runs.load(Ordering::SeqCst), 2);
        assert_eq!(value_runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn iteration_wraps_nested_values() {
        let map = Value::new_map();
        map.map_set("a", Value::object());
        let pairs: Vec<Value> = reactive(map.clone()).iter().collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].get(0), Value::from("a"));
        assert!(is_reactive(&pairs[0].get(1)));

        let values: Vec<Value> = readonly(map.clone()).values().collect();
        assert!(is_readonly(&values[0]));

        let shallow: Vec<Value> = shallow_reactive(map).values().collect();
        assert!(!is_reactive(&shallow[0]));
    }

    #[test]
    fn for_each_wraps_and_tracks() {
        let map = reactive(Value::new_map());
        map.map_set("a", Value::object());
        let (runs, runs_clone) = counter();
        let map_clone = map.clone();
        let _runner = effect(move || {
            map_clone.for_each(|value, key| {
                assert!(is_reactive(&value));
                assert_eq!(key, Value::from("a"));
            });
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        map.map_set("a", Value::object());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn readonly_over_reactive_still_tracks() {
        let map = reactive(Value::new_map());
        let view = readonly(map.clone());
        let (runs, runs_clone) = counter();
        let _runner = effect(move || {
            view.map_get("a");
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        map.map_set("a", 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn readonly_collections_reject_writes() {
        let map = Value::new_map();
        map.map_set("a", 1);
        let locked = readonly(map);
        locked.map_set("a", 2);
        locked.map_set("b", 3);
        assert!(!locked.remove("a"));
        locked.clear();
        assert_eq!(locked.map_get("a"), Value::from(1));
        assert_eq!(locked.size(), 1);
    }

    #[test]
    fn weak_collections_take_object_keys_only() {
        let weak = reactive(Value::new_weak_map());
        let key = Value::object();
        weak.map_set(key.clone(), 1);
        weak.map_set("primitive", 2);
        assert_eq!(weak.map_get(key.clone()), Value::from(1));
        assert!(!weak.contains("primitive"));
        assert_eq!(weak.size(), 0);
        assert_eq!(weak.keys().count(), 0);

        let set = reactive(Value::new_weak_set());
        set.add(key.clone());
        assert!(set.contains(key));
    }

    #[test]
    fn weak_map_value_leaves_the_store_with_its_key() {
        let weak = reactive(Value::new_weak_map());
        let key = Value::object();
        let value = Value::object_from([("a", Value::from(1))]);
        let value_id = value.raw_target().unwrap().id();
        weak.map_set(key.clone(), value);

        let (weak_clone, key_clone) = (weak.clone(), key.clone());
        let reader = effect(move || {
            weak_clone.map_get(key_clone.clone()).get("a");
        });
        assert!(tracked_targets().contains(&value_id));

        stop(&reader);
        drop(reader);
        drop(key);
        assert!(!tracked_targets().contains(&value_id));
    }

    #[test]
    fn wrong_kind_is_a_noop() {
        let obj = reactive(Value::object());
        assert_eq!(obj.map_get("a"), Value::Undefined);
        assert_eq!(obj.size(), 0);
        let set = Value::new_set();
        set.map_set("a", 1);
        assert_eq!(set.size(), 0);
    }
}
