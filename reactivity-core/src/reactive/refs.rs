//! Refs
//!
//! A ref is a single observable slot. Reading `value()` tracks the slot and
//! writing it through `set_value` triggers its readers.
//!
//! # Flavours
//!
//! - Box refs from [`ref_`] and [`shallow_ref`] own their value and a private
//!   [`Dep`]. A deep box ref stores objects as reactive proxies.
//! - Property refs from [`to_ref_at`] and [`to_refs`] read and write one key
//!   of an object. They carry no dep of their own; the object's proxy tracks.
//! - Getter refs from [`to_ref`] of a function call it on every read and
//!   reject writes.
//! - Computed refs, see [`computed`](super::computed).
//!
//! Custom flavours implement [`RefImpl`] and are wrapped with [`Ref::new`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{trace, warn};

use super::dep::Dep;
use super::operations::{track_effects, trigger_effects};
use super::proxy::{is_proxy, is_reactive, is_readonly, is_shallow, to_raw, to_reactive, Proxy};
use crate::error::{ReactivityError, Result};
use crate::value::{has_changed, Function, Key, Value};

/// Unique identifier for a ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefId(u64);

impl RefId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Behaviour behind a [`Ref`].
pub trait RefImpl: Send + Sync {
    /// Read the value, tracking whatever the read depends on.
    fn get(&self) -> Value;

    fn set(&self, value: Value) -> Result<()>;

    fn is_shallow(&self) -> bool {
        false
    }

    fn is_readonly(&self) -> bool {
        false
    }
}

/// Handle to a ref. Clones share the same slot.
#[derive(Clone)]
pub struct Ref {
    id: RefId,
    inner: Arc<dyn RefImpl>,
}

impl Ref {
    pub fn new(imp: impl RefImpl + 'static) -> Self {
        Self::from_parts(RefId::next(), Arc::new(imp))
    }

    pub(crate) fn from_parts(id: RefId, inner: Arc<dyn RefImpl>) -> Self {
        Self { id, inner }
    }

    pub fn id(&self) -> RefId {
        self.id
    }

    pub fn value(&self) -> Value {
        self.inner.get()
    }

    pub fn set_value(&self, value: impl Into<Value>) -> Result<()> {
        self.inner.set(value.into())
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.is_shallow()
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.is_readonly()
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reading the value here would track it.
        write!(f, "Ref#{}", self.id.0)
    }
}

// ----------------------------------------------------------------------------
// Box refs
// ----------------------------------------------------------------------------

struct BoxRef {
    /// The value as written, unwrapped to raw unless shallow.
    raw: RwLock<Value>,
    /// The value handed to readers.
    value: RwLock<Value>,
    shallow: bool,
    dep: Arc<Dep>,
}

impl RefImpl for BoxRef {
    fn get(&self) -> Value {
        track_effects(&self.dep);
        self.value.read().clone()
    }

    fn set(&self, new_value: Value) -> Result<()> {
        let direct = self.shallow || is_shallow(&new_value) || is_readonly(&new_value);
        let new_value = if direct { new_value } else { to_raw(&new_value) };
        if !has_changed(&new_value, &self.raw.read()) {
            return Ok(());
        }

        let view = if direct {
            new_value.clone()
        } else {
            to_reactive(new_value.clone())
        };
        let old_raw = std::mem::replace(&mut *self.raw.write(), new_value);
        let old_view = std::mem::replace(&mut *self.value.write(), view);
        drop((old_raw, old_view));

        trace!(subscribers = self.dep.len(), "ref changed");
        trigger_effects(&self.dep);
        Ok(())
    }

    fn is_shallow(&self) -> bool {
        self.shallow
    }
}

impl Drop for BoxRef {
    fn drop(&mut self) {
        self.dep.clear();
    }
}

fn create_ref(value: Value, shallow: bool) -> Ref {
    if let Value::Ref(existing) = value {
        return existing;
    }
    let (raw, view) = if shallow {
        (value.clone(), value)
    } else {
        (to_raw(&value), to_reactive(value))
    };
    Ref::new(BoxRef {
        raw: RwLock::new(raw),
        value: RwLock::new(view),
        shallow,
        dep: Dep::new(),
    })
}

/// A deep ref: objects written to it are stored as reactive proxies.
///
/// A ref passed in is returned as-is.
pub fn ref_(value: impl Into<Value>) -> Ref {
    create_ref(value.into(), false)
}

/// A ref that stores values exactly as written.
pub fn shallow_ref(value: impl Into<Value>) -> Ref {
    create_ref(value.into(), true)
}

// ----------------------------------------------------------------------------
// Property and getter refs
// ----------------------------------------------------------------------------

struct PropertyRef {
    object: Value,
    key: Key,
    default: Option<Value>,
}

impl RefImpl for PropertyRef {
    fn get(&self) -> Value {
        let value = self.object.get(&self.key);
        match (&value, &self.default) {
            (Value::Undefined, Some(default)) => default.clone(),
            _ => value,
        }
    }

    fn set(&self, value: Value) -> Result<()> {
        self.object.set(self.key.clone(), value);
        Ok(())
    }
}

struct GetterRef(Function);

impl RefImpl for GetterRef {
    fn get(&self) -> Value {
        self.0.call(&[])
    }

    fn set(&self, _value: Value) -> Result<()> {
        Err(ReactivityError::ReadonlyRef)
    }

    fn is_readonly(&self) -> bool {
        true
    }
}

/// Normalise `source` to a ref: refs pass through, functions become
/// readonly getter refs, anything else is boxed with [`ref_`].
pub fn to_ref(source: impl Into<Value>) -> Ref {
    match source.into() {
        Value::Ref(r) => r,
        Value::Function(getter) => Ref::new(GetterRef(getter)),
        value => ref_(value),
    }
}

fn property_ref(object: &Value, key: Key, default: Option<Value>) -> Ref {
    match object.get(&key) {
        Value::Ref(existing) => existing,
        _ => Ref::new(PropertyRef {
            object: object.clone(),
            key,
            default,
        }),
    }
}

/// A ref that reads and writes `object[key]`.
pub fn to_ref_at(object: &Value, key: impl Into<Key>) -> Ref {
    property_ref(object, key.into(), None)
}

/// Like [`to_ref_at`], reading `default` while the property is `Undefined`.
pub fn to_ref_at_or(object: &Value, key: impl Into<Key>, default: impl Into<Value>) -> Ref {
    property_ref(object, key.into(), Some(default.into()))
}

/// One property ref per own key of `object`: an array of refs for arrays,
/// a plain object of refs otherwise.
pub fn to_refs(object: &Value) -> Value {
    if !is_proxy(object) {
        warn!(?object, "to_refs expects a reactive object");
    }
    if object.is_array() {
        let refs = (0..object.len())
            .map(|index| Value::Ref(to_ref_at(object, index)))
            .collect();
        return Value::array(refs);
    }
    Value::object_from(
        object
            .own_keys()
            .into_iter()
            .map(|key| (key.clone(), Value::Ref(to_ref_at(object, key)))),
    )
}

/// A view of `object` whose ref-valued properties read unwrapped.
///
/// Writing a plain value over a ref-valued property writes into the ref.
/// Reactive objects already unwrap and are returned as-is.
pub fn proxy_refs(object: impl Into<Value>) -> Value {
    let object = object.into();
    if is_reactive(&object) {
        return object;
    }
    Value::Proxy(Proxy::unwrapping(object))
}

pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// The ref's value, or the value itself.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(r) => r.value(),
        _ => value.clone(),
    }
}

/// Like [`unref`], but functions are called.
pub fn to_value(value: &Value) -> Value {
    match value {
        Value::Function(getter) => getter.call(&[]),
        _ => unref(value),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, reactive};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn ref_triggers_only_on_change() {
        let count = ref_(0);
        let runs = Arc::new(AtomicUsize::new(0));
        let (count_clone, runs_clone) = (count.clone(), runs.clone());
        let _runner = effect(move || {
            count_clone.value();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        count.set_value(1).unwrap();
        count.set_value(1).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        count.set_value(f64::NAN).unwrap();
        count.set_value(f64::NAN).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn deep_ref_wraps_objects_and_shallow_does_not() {
        let raw = Value::object();
        let deep = ref_(raw.clone());
        assert!(is_reactive(&deep.value()));
        assert!(!deep.is_shallow());

        let shallow = shallow_ref(raw.clone());
        assert_eq!(shallow.value(), raw);
        assert!(shallow.is_shallow());

        // Writing the proxy of the stored raw value is no change.
        let runs = Arc::new(AtomicUsize::new(0));
        let (deep_clone, runs_clone) = (deep.clone(), runs.clone());
        let _runner = effect(move || {
            deep_clone.value();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        deep.set_value(reactive(raw)).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn refs_are_not_rewrapped() {
        let r = ref_(1);
        assert!(ref_(Value::Ref(r.clone())).ptr_eq(&r));
        assert!(to_ref(Value::Ref(r.clone())).ptr_eq(&r));
        assert!(is_ref(&Value::Ref(r)));
        assert!(!is_ref(&Value::from(1)));
    }

    #[test]
    fn getter_refs_are_readonly() {
        let getter = to_ref(Value::function(|_| Value::from(42)));
        assert_eq!(getter.value(), Value::from(42));
        assert!(getter.is_readonly());
        assert!(matches!(getter.set_value(1), Err(ReactivityError::ReadonlyRef)));
    }

    #[test]
    fn property_refs_read_and_write_through() {
        let state = reactive(Value::object_from([("a", Value::from(1))]));
        let a = to_ref_at(&state, "a");
        assert_eq!(a.value(), Value::from(1));
        a.set_value(2).unwrap();
        assert_eq!(state.get("a"), Value::from(2));

        let missing = to_ref_at_or(&state, "missing", 7);
        assert_eq!(missing.value(), Value::from(7));
    }

    #[test]
    fn to_refs_covers_objects_and_arrays() {
        let state = reactive(Value::object_from([
            ("a", Value::from(1)),
            ("b", Value::from(2)),
        ]));
        let refs = to_refs(&state);
        let b = refs.get("b");
        b.as_ref().unwrap().set_value(3).unwrap();
        assert_eq!(state.get("b"), Value::from(3));

        let list = reactive(Value::array(vec![Value::from(1)]));
        let refs = to_refs(&list);
        assert!(refs.is_array());
        assert_eq!(unref(&refs.get(0)), Value::from(1));
    }

    #[test]
    fn proxy_refs_unwraps_and_writes_through() {
        let count = ref_(1);
        let view = proxy_refs(Value::object_from([
            ("count", Value::Ref(count.clone())),
            ("plain", Value::from(0)),
        ]));
        assert_eq!(view.get("count"), Value::from(1));

        view.set("count", 5);
        assert_eq!(count.value(), Value::from(5));

        let replacement = ref_(9);
        view.set("count", Value::Ref(replacement.clone()));
        assert_eq!(view.get("count"), Value::from(9));
        assert_eq!(count.value(), Value::from(5));

        let state = reactive(Value::object());
        assert_eq!(proxy_refs(state.clone()), state);
    }

    #[test]
    fn proxy_refs_refuses_writes_to_getter_refs() {
        let getter = to_ref(Value::function(|_| Value::from(42)));
        let view = proxy_refs(Value::object_from([("answer", Value::Ref(getter))]));
        assert_eq!(view.get("answer"), Value::from(42));

        assert!(!view.set("answer", 1));
        assert_eq!(view.get("answer"), Value::from(42));
    }

    #[test]
    fn to_value_calls_functions() {
        assert_eq!(to_value(&Value::function(|_| Value::from(3))), Value::from(3));
        assert_eq!(to_value(&Value::Ref(ref_(4))), Value::from(4));
        assert_eq!(to_value(&Value::from(5)), Value::from(5));
    }
}
