//! Raw Targets
//!
//! A [`Target`] is the raw, unobserved storage behind every reactive object.
//! The reactive layer never owns the data: proxies read and write through to
//! the target, and the target stays the source of truth for stored values.
//!
//! # Identity and Lifetime
//!
//! Every target gets a [`TargetId`] when it is created. The dependency store
//! and the proxy caches are keyed by that id rather than by a strong handle,
//! so they never keep a target alive. When the last handle is dropped the
//! target removes its own entries from both (see [`TargetInner`]'s `Drop`).
//!
//! Weak collections hold their keys weakly and their values strongly. Each
//! weak entry is registered against its key's id, and dropping the key
//! removes the entry (and so releases the value) from every weak collection
//! that held it.
//!
//! # Raw Operations
//!
//! The methods here are the equivalent of ordinary (non-intercepted) property
//! access: they never track or trigger. Proxy traps build on them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::warn;

use super::key::{Identity, Key, MAX_ARRAY_INDEX};
use super::Value;

/// Unique identifier of a raw target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The runtime shape of a target. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Object,
    Array,
    Map,
    Set,
    WeakMap,
    WeakSet,
}

impl TargetKind {
    /// Map, Set, WeakMap and WeakSet expose their data through methods.
    pub fn is_collection(self) -> bool {
        !matches!(self, TargetKind::Object | TargetKind::Array)
    }

    pub fn is_weak(self) -> bool {
        matches!(self, TargetKind::WeakMap | TargetKind::WeakSet)
    }

    /// Maps associate a value with each key (Map and WeakMap).
    pub fn is_keyed(self) -> bool {
        matches!(self, TargetKind::Map | TargetKind::WeakMap)
    }
}

type WeakKey = Weak<TargetInner>;

/// Key target id -> weak collections holding an entry under that key.
type WeakHolders = DashMap<TargetId, SmallVec<[(WeakKey, Identity); 2]>>;

static WEAK_HOLDERS: OnceLock<WeakHolders> = OnceLock::new();

fn weak_holders() -> &'static WeakHolders {
    WEAK_HOLDERS.get_or_init(DashMap::new)
}

fn register_weak_entry(key: TargetId, holder: &Target, identity: Identity) {
    let holder = holder.downgrade();
    let mut holders = weak_holders().entry(key).or_default();
    holders.retain(|(weak, _)| weak.strong_count() > 0);
    let known = holders
        .iter()
        .any(|(weak, known)| Weak::ptr_eq(weak, &holder) && *known == identity);
    if !known {
        holders.push((holder, identity));
    }
}

/// Drop the entries keyed by `key` from every weak collection holding one.
fn purge_weak_entries(key: TargetId) {
    let Some((_, holders)) = weak_holders().remove(&key) else {
        return;
    };
    for (holder, identity) in holders {
        if let Some(inner) = holder.upgrade() {
            Target(inner).purge_weak(&identity);
        }
    }
}

pub(crate) enum TargetData {
    Object(IndexMap<Key, Value>),
    Array {
        /// Sparse slots; an index below `length` with no slot is a hole.
        slots: BTreeMap<usize, Value>,
        length: usize,
        props: IndexMap<Key, Value>,
    },
    Map(IndexMap<Identity, (Value, Value)>),
    Set(IndexMap<Identity, Value>),
    WeakMap(HashMap<Identity, (WeakKey, Value)>),
    WeakSet(HashMap<Identity, WeakKey>),
}

impl TargetData {
    fn empty(kind: TargetKind) -> Self {
        match kind {
            TargetKind::Object => TargetData::Object(IndexMap::new()),
            TargetKind::Array => TargetData::Array {
                slots: BTreeMap::new(),
                length: 0,
                props: IndexMap::new(),
            },
            TargetKind::Map => TargetData::Map(IndexMap::new()),
            TargetKind::Set => TargetData::Set(IndexMap::new()),
            TargetKind::WeakMap => TargetData::WeakMap(HashMap::new()),
            TargetKind::WeakSet => TargetData::WeakSet(HashMap::new()),
        }
    }
}

pub(crate) struct TargetInner {
    id: TargetId,
    kind: TargetKind,
    data: RwLock<TargetData>,
    proto: RwLock<Option<Value>>,
    /// Raw-marked: never wrapped by a proxy. Permanent once set.
    skip: AtomicBool,
    extensible: AtomicBool,
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        purge_weak_entries(self.id);
        crate::reactive::forget_target(self.id);
    }
}

/// Handle to a raw target. Clones share the same storage.
#[derive(Clone)]
pub struct Target(Arc<TargetInner>);

impl Target {
    pub fn new(kind: TargetKind) -> Self {
        Self(Arc::new(TargetInner {
            id: TargetId::next(),
            kind,
            data: RwLock::new(TargetData::empty(kind)),
            proto: RwLock::new(None),
            skip: AtomicBool::new(false),
            extensible: AtomicBool::new(true),
        }))
    }

    /// Create an array target holding `items`.
    pub fn array(items: Vec<Value>) -> Self {
        let target = Self::new(TargetKind::Array);
        if let TargetData::Array { slots, length, .. } = &mut *target.0.data.write() {
            *length = items.len();
            *slots = items.into_iter().enumerate().collect();
        }
        target
    }

    /// Create an object target from `(key, value)` pairs, in order.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<Key>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let target = Self::new(TargetKind::Object);
        if let TargetData::Object(props) = &mut *target.0.data.write() {
            for (key, value) in entries {
                props.insert(key.into(), value);
            }
        }
        target
    }

    pub fn id(&self) -> TargetId {
        self.0.id
    }

    pub fn kind(&self) -> TargetKind {
        self.0.kind
    }

    pub fn is_array(&self) -> bool {
        self.0.kind == TargetKind::Array
    }

    pub fn is_map(&self) -> bool {
        self.0.kind == TargetKind::Map
    }

    pub fn is_collection(&self) -> bool {
        self.0.kind.is_collection()
    }

    pub fn ptr_eq(&self, other: &Target) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_extensible(&self) -> bool {
        self.0.extensible.load(Ordering::Acquire)
    }

    /// Forbid adding new properties. Existing properties stay writable.
    pub fn prevent_extensions(&self) {
        self.0.extensible.store(false, Ordering::Release);
    }

    pub(crate) fn is_skipped(&self) -> bool {
        self.0.skip.load(Ordering::Acquire)
    }

    /// Returns false if the target could not be marked (not extensible).
    pub(crate) fn mark_skip(&self) -> bool {
        if self.is_skipped() {
            return true;
        }
        if !self.is_extensible() {
            return false;
        }
        self.0.skip.store(true, Ordering::Release);
        true
    }

    pub(crate) fn downgrade(&self) -> WeakKey {
        Arc::downgrade(&self.0)
    }

    pub fn prototype(&self) -> Option<Value> {
        self.0.proto.read().clone()
    }

    /// Set the prototype. Refuses (returning false) to create a cycle.
    pub fn set_prototype(&self, proto: Option<Value>) -> bool {
        if let Some(proto) = &proto {
            let mut cursor = proto.raw_target();
            while let Some(target) = cursor {
                if target.ptr_eq(self) {
                    warn!(id = %self.id(), "cyclic prototype chain rejected");
                    return false;
                }
                cursor = target.prototype().and_then(|p| p.raw_target());
            }
        }
        let previous = std::mem::replace(&mut *self.0.proto.write(), proto);
        drop(previous);
        true
    }

    // ------------------------------------------------------------------
    // Objects and arrays
    // ------------------------------------------------------------------

    pub(crate) fn array_len(&self) -> Option<usize> {
        match &*self.0.data.read() {
            TargetData::Array { length, .. } => Some(*length),
            _ => None,
        }
    }

    pub(crate) fn get_own(&self, key: &Key) -> Option<Value> {
        match &*self.0.data.read() {
            TargetData::Object(props) => props.get(key).cloned(),
            TargetData::Array {
                slots,
                length,
                props,
            } => match key {
                Key::Index(index) => slots.get(index).cloned(),
                key if key.is_length() => Some(Value::Number(*length as f64)),
                key => props.get(key).cloned(),
            },
            _ => None,
        }
    }

    pub(crate) fn has_own(&self, key: &Key) -> bool {
        match &*self.0.data.read() {
            TargetData::Object(props) => props.contains_key(key),
            TargetData::Array { slots, props, .. } => match key {
                Key::Index(index) => slots.contains_key(index),
                key if key.is_length() => true,
                key => props.contains_key(key),
            },
            _ => false,
        }
    }

    /// `[[Get]]`: own property, then the prototype chain.
    pub(crate) fn get(&self, key: &Key, receiver: &Value) -> Value {
        if let Some(value) = self.get_own(key) {
            return value;
        }
        match self.prototype() {
            Some(proto) => proto.get_with_receiver(key, receiver),
            None => Value::Undefined,
        }
    }

    /// `[[HasProperty]]`: own property, then the prototype chain.
    pub(crate) fn has(&self, key: &Key) -> bool {
        if self.has_own(key) {
            return true;
        }
        match self.prototype() {
            Some(proto) => proto.has(key.clone()),
            None => false,
        }
    }

    /// `[[Set]]`: a key missing here is delegated to the prototype; the
    /// property itself is always created on the receiver.
    pub(crate) fn set(&self, key: Key, value: Value, receiver: &Value) -> bool {
        if !self.has_own(&key) {
            if let Some(proto) = self.prototype() {
                return proto.set_with_receiver(key, value, receiver);
            }
        }
        match receiver.raw_target() {
            Some(target) => target.define(key, value),
            None => false,
        }
    }

    /// Create or overwrite an own data property.
    pub(crate) fn define(&self, key: Key, value: Value) -> bool {
        let extensible = self.is_extensible();
        // Values displaced by the write are dropped after the lock is released.
        let mut displaced: Vec<Value> = Vec::new();
        {
            let mut data = self.0.data.write();
            match &mut *data {
                TargetData::Object(props) => {
                    if !extensible && !props.contains_key(&key) {
                        return false;
                    }
                    displaced.extend(props.insert(key, value));
                }
                TargetData::Array {
                    slots,
                    length,
                    props,
                } => match key {
                    Key::Index(index) if index > MAX_ARRAY_INDEX => {
                        warn!(id = %self.id(), index, "array index out of range");
                        return false;
                    }
                    Key::Index(index) => {
                        if !extensible && !slots.contains_key(&index) {
                            return false;
                        }
                        displaced.extend(slots.insert(index, value));
                        *length = (*length).max(index + 1);
                    }
                    key if key.is_length() => {
                        let Some(new_length) = value.as_array_length() else {
                            warn!(id = %self.id(), ?value, "invalid array length");
                            return false;
                        };
                        if new_length < *length {
                            displaced.extend(slots.split_off(&new_length).into_values());
                        }
                        *length = new_length;
                    }
                    key => {
                        if !extensible && !props.contains_key(&key) {
                            return false;
                        }
                        displaced.extend(props.insert(key, value));
                    }
                },
                _ => {
                    warn!(id = %self.id(), %key, "collections do not carry properties");
                    return false;
                }
            }
        }
        drop(displaced);
        true
    }

    /// `[[Delete]]`. Deleting an array index leaves a hole.
    pub(crate) fn delete(&self, key: &Key) -> bool {
        let removed = {
            let mut data = self.0.data.write();
            match &mut *data {
                TargetData::Object(props) => props.shift_remove(key),
                TargetData::Array { slots, props, .. } => match key {
                    Key::Index(index) => slots.remove(index),
                    key if key.is_length() => return false,
                    key => props.shift_remove(key),
                },
                _ => None,
            }
        };
        drop(removed);
        true
    }

    /// Own enumerable keys: indices ascending, then names and symbols in
    /// insertion order.
    pub(crate) fn own_keys(&self) -> Vec<Key> {
        match &*self.0.data.read() {
            TargetData::Object(props) => {
                let mut indices: Vec<usize> = props.keys().filter_map(Key::as_index).collect();
                indices.sort_unstable();
                let mut keys: Vec<Key> = indices.into_iter().map(Key::Index).collect();
                keys.extend(props.keys().filter(|k| matches!(k, Key::Name(_))).cloned());
                keys.extend(props.keys().filter(|k| matches!(k, Key::Symbol(_))).cloned());
                keys
            }
            TargetData::Array { slots, props, .. } => {
                let mut keys: Vec<Key> = slots.keys().copied().map(Key::Index).collect();
                keys.extend(props.keys().cloned());
                keys
            }
            _ => Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    /// Number of live entries. Weak collections report live entries only.
    pub(crate) fn entry_count(&self) -> usize {
        match &*self.0.data.read() {
            TargetData::Map(entries) => entries.len(),
            TargetData::Set(entries) => entries.len(),
            TargetData::WeakMap(entries) => entries
                .values()
                .filter(|(key, _)| key.strong_count() > 0)
                .count(),
            TargetData::WeakSet(entries) => {
                entries.values().filter(|key| key.strong_count() > 0).count()
            }
            _ => 0,
        }
    }

    pub(crate) fn entry_has(&self, key: &Value) -> bool {
        let identity = key.identity();
        match &*self.0.data.read() {
            TargetData::Map(entries) => entries.contains_key(&identity),
            TargetData::Set(entries) => entries.contains_key(&identity),
            TargetData::WeakMap(entries) => entries
                .get(&identity)
                .is_some_and(|(key, _)| key.strong_count() > 0),
            TargetData::WeakSet(entries) => entries
                .get(&identity)
                .is_some_and(|key| key.strong_count() > 0),
            _ => false,
        }
    }

    /// Value stored under `key` in a Map or WeakMap.
    pub(crate) fn entry_get(&self, key: &Value) -> Option<Value> {
        let identity = key.identity();
        match &*self.0.data.read() {
            TargetData::Map(entries) => entries.get(&identity).map(|(_, value)| value.clone()),
            TargetData::WeakMap(entries) => entries
                .get(&identity)
                .filter(|(key, _)| key.strong_count() > 0)
                .map(|(_, value)| value.clone()),
            _ => None,
        }
    }

    /// Insert into a Map/WeakMap (`value` is `Some`) or a Set/WeakSet.
    ///
    /// Returns false when the key is not usable as a weak key.
    pub(crate) fn entry_insert(&self, key: Value, value: Option<Value>) -> bool {
        let identity = key.identity();
        let weak_key = key.raw_target().filter(|_| self.kind().is_weak());
        let replaced = {
            let mut data = self.0.data.write();
            match &mut *data {
                TargetData::Map(entries) => {
                    let value = value.unwrap_or(Value::Undefined);
                    match entries.get_mut(&identity) {
                        Some(entry) => Some(std::mem::replace(&mut entry.1, value)),
                        None => {
                            entries.insert(identity.clone(), (key, value));
                            None
                        }
                    }
                }
                TargetData::Set(entries) => {
                    entries.entry(identity.clone()).or_insert(key);
                    None
                }
                TargetData::WeakMap(entries) => {
                    let Some(weak) = weak_key.as_ref().map(Target::downgrade) else {
                        return false;
                    };
                    entries
                        .insert(identity.clone(), (weak, value.unwrap_or(Value::Undefined)))
                        .map(|(_, old)| old)
                }
                TargetData::WeakSet(entries) => {
                    let Some(weak) = weak_key.as_ref().map(Target::downgrade) else {
                        return false;
                    };
                    entries.insert(identity.clone(), weak);
                    None
                }
                _ => return false,
            }
        };
        if let Some(key) = weak_key {
            register_weak_entry(key.id(), self, identity);
        }
        drop(replaced);
        true
    }

    /// Remove a weak entry whose key target is being dropped.
    fn purge_weak(&self, identity: &Identity) {
        let removed = {
            let mut data = self.0.data.write();
            match &mut *data {
                TargetData::WeakMap(entries) => entries.remove(identity).map(|(_, value)| value),
                TargetData::WeakSet(entries) => {
                    entries.remove(identity);
                    None
                }
                _ => None,
            }
        };
        drop(removed);
    }

    /// Remove `key`; returns whether it was present.
    pub(crate) fn entry_remove(&self, key: &Value) -> bool {
        let identity = key.identity();
        let removed: Option<Vec<Value>> = {
            let mut data = self.0.data.write();
            match &mut *data {
                TargetData::Map(entries) => {
                    entries.shift_remove(&identity).map(|(k, v)| vec![k, v])
                }
                TargetData::Set(entries) => entries.shift_remove(&identity).map(|v| vec![v]),
                TargetData::WeakMap(entries) => entries
                    .remove(&identity)
                    .filter(|(key, _)| key.strong_count() > 0)
                    .map(|(_, v)| vec![v]),
                TargetData::WeakSet(entries) => entries
                    .remove(&identity)
                    .filter(|key| key.strong_count() > 0)
                    .map(|_| Vec::new()),
                _ => None,
            }
        };
        removed.is_some()
    }

    /// Remove every entry; returns whether there was anything to remove.
    pub(crate) fn entry_clear(&self) -> bool {
        let removed = {
            let mut data = self.0.data.write();
            match &mut *data {
                TargetData::Map(entries) => {
                    let had = !entries.is_empty();
                    let old = std::mem::take(entries);
                    (had, old.into_values().flat_map(|(k, v)| [k, v]).collect::<Vec<_>>())
                }
                TargetData::Set(entries) => {
                    let had = !entries.is_empty();
                    let old = std::mem::take(entries);
                    (had, old.into_values().collect())
                }
                _ => (false, Vec::new()),
            }
        };
        removed.0
    }

    /// Snapshot of `(key, value)` pairs in insertion order. Sets yield
    /// `(value, value)`; weak collections are not iterable and yield nothing.
    pub(crate) fn entries_snapshot(&self) -> Vec<(Value, Value)> {
        match &*self.0.data.read() {
            TargetData::Map(entries) => entries.values().cloned().collect(),
            TargetData::Set(entries) => entries.values().map(|v| (v.clone(), v.clone())).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{}", self.kind(), self.id())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_ids_are_unique() {
        let a = Target::new(TargetKind::Object);
        let b = Target::new(TargetKind::Object);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn object_define_get_delete() {
        let target = Target::new(TargetKind::Object);
        assert!(target.define(Key::from("a"), Value::from(1)));
        assert_eq!(target.get_own(&Key::from("a")), Some(Value::from(1)));
        assert!(target.has_own(&Key::from("a")));
        assert!(target.delete(&Key::from("a")));
        assert!(!target.has_own(&Key::from("a")));
    }

    #[test]
    fn own_keys_put_indices_first() {
        let target = Target::object([
            ("b", Value::from(1)),
            ("2", Value::from(2)),
            ("a", Value::from(3)),
            ("1", Value::from(4)),
        ]);
        assert_eq!(
            target.own_keys(),
            vec![Key::Index(1), Key::Index(2), Key::from("b"), Key::from("a")]
        );
    }

    #[test]
    fn array_writes_past_the_end_leave_holes() {
        let target = Target::array(vec![Value::from(1)]);
        assert!(target.define(Key::Index(3), Value::from(4)));
        assert_eq!(target.array_len(), Some(4));
        assert!(!target.has_own(&Key::Index(2)));
        assert_eq!(target.own_keys(), vec![Key::Index(0), Key::Index(3)]);
    }

    #[test]
    fn far_writes_stay_sparse() {
        let target = Target::array(vec![Value::from(1)]);
        assert!(target.define(Key::from("4000000000"), Value::from(2)));
        assert_eq!(target.array_len(), Some(4_000_000_001));
        assert_eq!(target.own_keys(), vec![Key::Index(0), Key::Index(4_000_000_000)]);

        assert!(target.define(Key::from("10000000000000000000"), Value::from(3)));
        assert_eq!(target.array_len(), Some(4_000_000_001));
        assert_eq!(
            target.get_own(&Key::from("10000000000000000000")),
            Some(Value::from(3))
        );

        assert!(target.define(Key::length(), Value::from(u32::MAX as f64)));
        assert_eq!(target.array_len(), Some(u32::MAX as usize));
        assert!(target.define(Key::length(), Value::from(1)));
        assert_eq!(target.own_keys()[0], Key::Index(0));
        assert!(!target.has_own(&Key::Index(4_000_000_000)));
        assert!(!target.define(Key::Index(usize::MAX), Value::from(4)));
    }

    #[test]
    fn array_length_truncates_and_extends() {
        let target = Target::array(vec![Value::from(1), Value::from(2), Value::from(3)]);
        assert!(target.define(Key::length(), Value::from(1)));
        assert_eq!(target.array_len(), Some(1));
        assert!(target.define(Key::length(), Value::from(3)));
        assert_eq!(target.array_len(), Some(3));
        assert!(!target.has_own(&Key::Index(1)));
        assert!(!target.define(Key::length(), Value::from(-1)));
    }

    #[test]
    fn non_extensible_targets_reject_new_keys() {
        let target = Target::object([("a", Value::from(1))]);
        target.prevent_extensions();
        assert!(target.define(Key::from("a"), Value::from(2)));
        assert!(!target.define(Key::from("b"), Value::from(2)));
        assert!(!target.mark_skip());
    }

    #[test]
    fn prototype_lookup_and_cycle_rejection() {
        let parent = Target::object([("inherited", Value::from(1))]);
        let child = Target::new(TargetKind::Object);
        assert!(child.set_prototype(Some(Value::Object(parent.clone()))));

        let receiver = Value::Object(child.clone());
        assert_eq!(child.get(&Key::from("inherited"), &receiver), Value::from(1));
        assert!(child.has(&Key::from("inherited")));
        assert!(!child.has_own(&Key::from("inherited")));

        assert!(!parent.set_prototype(Some(Value::Object(child))));
    }

    #[test]
    fn weak_map_entries_die_with_their_key() {
        let map = Target::new(TargetKind::WeakMap);
        let key = Value::Object(Target::new(TargetKind::Object));
        assert!(map.entry_insert(key.clone(), Some(Value::from(1))));
        assert_eq!(map.entry_count(), 1);
        assert!(!map.entry_insert(Value::from(1), Some(Value::from(1))));

        drop(key);
        assert_eq!(map.entry_count(), 0);
    }

    #[test]
    fn weak_map_values_are_released_with_their_key() {
        let map = Target::new(TargetKind::WeakMap);
        let set = Target::new(TargetKind::WeakSet);
        let key = Value::Object(Target::new(TargetKind::Object));
        let value = Target::new(TargetKind::Object);
        let value_handle = value.downgrade();

        assert!(map.entry_insert(key.clone(), Some(Value::Object(value))));
        assert!(map.entry_insert(key.clone(), Some(Value::from(1))));
        assert!(set.entry_insert(key.clone(), None));
        assert!(value_handle.upgrade().is_none());

        let value = Target::new(TargetKind::Object);
        let value_handle = value.downgrade();
        assert!(map.entry_insert(key.clone(), Some(Value::Object(value))));
        assert!(value_handle.upgrade().is_some());

        drop(key);
        assert!(value_handle.upgrade().is_none());
        assert!(matches!(&*map.0.data.read(), TargetData::WeakMap(entries) if entries.is_empty()));
        assert!(matches!(&*set.0.data.read(), TargetData::WeakSet(entries) if entries.is_empty()));
    }

    #[test]
    fn set_entries_are_unique_by_identity() {
        let set = Target::new(TargetKind::Set);
        set.entry_insert(Value::from(1), None);
        set.entry_insert(Value::from(1.0), None);
        set.entry_insert(Value::from(f64::NAN), None);
        set.entry_insert(Value::from(f64::NAN), None);
        assert_eq!(set.entry_count(), 2);
        assert!(set.entry_clear());
        assert!(!set.entry_clear());
    }
}
