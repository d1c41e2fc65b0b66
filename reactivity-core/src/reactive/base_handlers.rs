//! Property traps for objects and arrays.
//!
//! These are the operations a caller performs on any object-like [`Value`].
//! On a raw target they act directly. On a reactive proxy they track the read
//! or trigger the write first. On a readonly proxy, writes are discarded with
//! a warning and report success.

use tracing::warn;

use super::dep::DepKey;
use super::operations::{track, trigger, TrackOp, TriggerOp};
use super::proxy::{
    is_readonly, is_shallow, readonly, reactive, to_raw, Proxy, ProxyFlags, ProxyKind,
    ProxyTarget,
};
use super::refs::unref;
use crate::value::{has_changed, Key, Target, Value};

pub(crate) const SKIP: &str = "__v_skip";
pub(crate) const IS_REACTIVE: &str = "__v_isReactive";
pub(crate) const IS_READONLY: &str = "__v_isReadonly";
pub(crate) const IS_SHALLOW: &str = "__v_isShallow";
pub(crate) const RAW: &str = "__v_raw";

fn is_builtin_symbol(key: &Key) -> bool {
    matches!(key, Key::Symbol(symbol) if symbol.is_well_known())
}

impl Value {
    /// Read a property, as `value[key]`.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        self.get_with_receiver(&key.into(), self)
    }

    /// Read a property with an explicit receiver (`Reflect.get`).
    pub fn get_with_receiver(&self, key: &Key, receiver: &Value) -> Value {
        match self {
            Value::Object(target) => {
                if key.as_name() == Some(SKIP) && target.is_skipped() {
                    return Value::Bool(true);
                }
                target.get(key, receiver)
            }
            Value::Proxy(proxy) => match proxy.kind() {
                ProxyKind::Reactive { target, raw, flags } => {
                    reactive_get(proxy, target, raw, *flags, key, receiver)
                }
                ProxyKind::RefUnwrap { source } => unref(&source.get_with_receiver(key, source)),
            },
            _ => Value::Undefined,
        }
    }

    /// Write a property, as `value[key] = new_value`.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        self.set_with_receiver(key.into(), value.into(), self)
    }

    /// Write a property with an explicit receiver (`Reflect.set`).
    pub fn set_with_receiver(&self, key: Key, value: Value, receiver: &Value) -> bool {
        match self {
            Value::Object(target) => target.set(key, value, receiver),
            Value::Proxy(proxy) => match proxy.kind() {
                ProxyKind::Reactive { flags, raw, .. } if flags.readonly => {
                    warn!(%key, id = %raw.id(), "set operation failed: target is readonly");
                    true
                }
                ProxyKind::Reactive { raw, flags, .. } => {
                    reactive_set(raw, *flags, key, value, receiver)
                }
                ProxyKind::RefUnwrap { source } => {
                    if let Value::Ref(old) = source.get(&key) {
                        if !matches!(value, Value::Ref(_)) {
                            return old.set_value(value).is_ok();
                        }
                    }
                    source.set_with_receiver(key, value, source)
                }
            },
            _ => false,
        }
    }

    /// Delete a property, as `delete value[key]`.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        match self {
            Value::Object(target) => target.delete(&key),
            Value::Proxy(proxy) => match proxy.kind() {
                ProxyKind::Reactive { flags, raw, .. } if flags.readonly => {
                    warn!(%key, id = %raw.id(), "delete operation failed: target is readonly");
                    true
                }
                ProxyKind::Reactive { raw, .. } => {
                    let had_key = raw.has_own(&key);
                    let old_value = raw.get_own(&key);
                    let result = raw.delete(&key);
                    if result && had_key {
                        trigger(raw, TriggerOp::Delete, Some(key.into()), None, old_value.as_ref());
                    }
                    result
                }
                ProxyKind::RefUnwrap { source } => source.delete(key),
            },
            _ => false,
        }
    }

    /// Whether the key is present here or on the prototype chain (`key in value`).
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        match self {
            Value::Object(target) => target.has(&key),
            Value::Proxy(proxy) => match proxy.kind() {
                ProxyKind::Reactive { target, raw, flags } => {
                    let result = match target {
                        ProxyTarget::Raw(target) => target.has(&key),
                        ProxyTarget::Proxy(inner) => Value::Proxy(inner.clone()).has(key.clone()),
                    };
                    if !flags.readonly && !raw.is_collection() && !is_builtin_symbol(&key) {
                        track(raw, TrackOp::Has, DepKey::Prop(key));
                    }
                    result
                }
                ProxyKind::RefUnwrap { source } => source.has(key),
            },
            _ => false,
        }
    }

    /// Whether the key is an own property (`hasOwnProperty`).
    pub fn has_own(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        match self {
            Value::Object(target) => target.has_own(&key),
            Value::Proxy(proxy) => match proxy.kind() {
                ProxyKind::Reactive { target, raw, flags } => {
                    let result = match target {
                        ProxyTarget::Raw(target) => target.has_own(&key),
                        ProxyTarget::Proxy(inner) => {
                            Value::Proxy(inner.clone()).has_own(key.clone())
                        }
                    };
                    if !flags.readonly && !raw.is_collection() {
                        track(raw, TrackOp::Has, DepKey::Prop(key));
                    }
                    result
                }
                ProxyKind::RefUnwrap { source } => source.has_own(key),
            },
            _ => false,
        }
    }

    /// Own enumerable keys (`Object.keys`, `for..in`).
    pub fn own_keys(&self) -> Vec<Key> {
        match self {
            Value::Object(target) => target.own_keys(),
            Value::Proxy(proxy) => match proxy.kind() {
                ProxyKind::Reactive { target, raw, flags } => {
                    if !flags.readonly && !raw.is_collection() {
                        let key = if raw.is_array() {
                            DepKey::Prop(Key::length())
                        } else {
                            DepKey::Iterate
                        };
                        track(raw, TrackOp::Iterate, key);
                    }
                    match target {
                        ProxyTarget::Raw(target) => target.own_keys(),
                        ProxyTarget::Proxy(inner) => Value::Proxy(inner.clone()).own_keys(),
                    }
                }
                ProxyKind::RefUnwrap { source } => source.own_keys(),
            },
            _ => Vec::new(),
        }
    }
}

/// Whether the raw-target flag may be answered for `receiver`: it must be
/// this proxy, or an object sharing the target's prototype.
fn receiver_matches(proxy: &Proxy, raw: &Target, receiver: &Value) -> bool {
    if let Value::Proxy(receiver) = receiver {
        if receiver.id() == proxy.id() {
            return true;
        }
    }
    let receiver_proto = receiver.raw_target().and_then(|target| target.prototype());
    match (raw.prototype(), receiver_proto) {
        (Some(own), Some(other)) => own.same_value(&other),
        _ => false,
    }
}

fn reactive_get(
    proxy: &Proxy,
    target: &ProxyTarget,
    raw: &Target,
    flags: ProxyFlags,
    key: &Key,
    receiver: &Value,
) -> Value {
    if let Some(name) = key.as_name() {
        match name {
            IS_REACTIVE => return Value::Bool(!flags.readonly),
            IS_READONLY => return Value::Bool(flags.readonly),
            IS_SHALLOW => return Value::Bool(flags.shallow),
            SKIP => return Value::Bool(raw.is_skipped()),
            RAW if receiver_matches(proxy, raw, receiver) => return target.to_value(),
            _ => {}
        }
    }

    let result = match target {
        ProxyTarget::Raw(target) => target.get(key, receiver),
        ProxyTarget::Proxy(inner) => Value::Proxy(inner.clone()).get_with_receiver(key, receiver),
    };

    if key.is_non_trackable() || raw.is_collection() {
        return result;
    }
    if !flags.readonly {
        track(raw, TrackOp::Get, DepKey::Prop(key.clone()));
    }
    if flags.shallow {
        return result;
    }

    if let Value::Ref(r) = &result {
        // Array slots keep their refs.
        if raw.is_array() && key.is_index() {
            return result;
        }
        return r.value();
    }
    if result.is_object() {
        return if flags.readonly {
            readonly(result)
        } else {
            reactive(result)
        };
    }
    result
}

fn reactive_set(raw: &Target, flags: ProxyFlags, key: Key, value: Value, receiver: &Value) -> bool {
    let mut value = value;
    let mut old_value = raw.get(&key, &Value::Object(raw.clone()));

    if !flags.shallow {
        if !is_shallow(&value) && !is_readonly(&value) {
            old_value = to_raw(&old_value);
            value = to_raw(&value);
        }
        if !raw.is_array() {
            if let Value::Ref(old_ref) = &old_value {
                if !matches!(value, Value::Ref(_)) {
                    if old_ref.is_readonly() {
                        warn!(%key, "set operation failed: ref is readonly");
                        return false;
                    }
                    return old_ref.set_value(value).is_ok();
                }
            }
        }
    }

    let had_key = match key {
        Key::Index(index) if raw.is_array() => index < raw.array_len().unwrap_or(0),
        _ => raw.has_own(&key),
    };
    let result = raw.set(key.clone(), value.clone(), receiver);

    // Writes that reached this target through a child's prototype chain are
    // triggered by the child.
    let own_write = receiver.raw_target().is_some_and(|target| target.ptr_eq(raw));
    if result && own_write {
        if !had_key {
            trigger(raw, TriggerOp::Add, Some(key.into()), Some(&value), None);
        } else if has_changed(&value, &old_value) {
            trigger(
                raw,
                TriggerOp::Set,
                Some(key.into()),
                Some(&value),
                Some(&old_value),
            );
        }
    }
    result
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, ref_, shallow_reactive};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn spy() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (calls.clone(), calls)
    }

    #[test]
    fn reserved_flags_are_answered() {
        let raw = Value::object();
        let proxy = reactive(raw.clone());
        assert_eq!(proxy.get(IS_REACTIVE), Value::Bool(true));
        assert_eq!(proxy.get(IS_READONLY), Value::Bool(false));
        assert_eq!(proxy.get(RAW), raw);
        assert_eq!(readonly(raw.clone()).get(IS_READONLY), Value::Bool(true));
        assert_eq!(shallow_reactive(raw).get(IS_SHALLOW), Value::Bool(true));
    }

    #[test]
    fn nested_objects_are_wrapped_lazily() {
        let state = reactive(Value::from(json!({"nested": {"a": 1}})));
        let nested = state.get("nested");
        assert!(crate::reactive::is_reactive(&nested));
        assert_eq!(state.get("nested"), nested);

        let locked = readonly(to_raw(&state));
        assert!(is_readonly(&locked.get("nested")));
    }

    #[test]
    fn set_stores_raw_values() {
        let state = reactive(Value::object());
        let child = reactive(Value::object());
        state.set("child", child.clone());

        let stored = to_raw(&state).get("child");
        assert_eq!(stored, to_raw(&child));
        assert_eq!(state.get("child"), child);
    }

    #[test]
    fn refs_unwrap_on_objects_but_not_in_arrays() {
        let count = ref_(1);
        let obj = reactive(Value::object_from([("count", Value::Ref(count.clone()))]));
        assert_eq!(obj.get("count"), Value::from(1));

        obj.set("count", 2);
        assert_eq!(count.value(), Value::from(2));

        let arr = reactive(Value::array(vec![Value::Ref(count.clone())]));
        assert_eq!(arr.get(0), Value::Ref(count));
    }

    #[test]
    fn writes_through_readonly_refs_fail() {
        let doubled = crate::reactive::computed(|| 2);
        let obj = reactive(Value::object_from([("doubled", Value::from(doubled.clone()))]));
        assert_eq!(obj.get("doubled"), Value::from(2));

        assert!(!obj.set("doubled", 5));
        assert_eq!(doubled.value(), Value::from(2));
        assert!(crate::reactive::is_ref(&to_raw(&obj).get("doubled")));
    }

    #[test]
    fn marked_nested_objects_stay_raw() {
        let inner = crate::reactive::mark_raw(Value::object_from([("a", Value::from(1))]));
        let state = reactive(Value::object_from([("inner", inner.clone())]));

        let read = state.get("inner");
        assert!(!crate::reactive::is_proxy(&read));
        assert_eq!(read, inner);
        assert!(!crate::reactive::is_proxy(&readonly(to_raw(&state)).get("inner")));
    }

    #[test]
    fn out_of_range_index_names_are_plain_properties() {
        let arr = reactive(Value::array(vec![Value::from(1)]));
        assert!(arr.set("10000000000000000000", 5));
        assert_eq!(arr.get("10000000000000000000"), Value::from(5));
        assert_eq!(arr.len(), 1);

        assert!(arr.set(1_000_000_000usize, 2));
        assert_eq!(arr.len(), 1_000_000_001);
        assert_eq!(arr.get(1_000_000_000usize), Value::from(2));
    }

    #[test]
    fn own_keys_follow_structure_only() {
        let state = reactive(Value::object());
        let (calls, calls_clone) = spy();

        let state_clone = state.clone();
        let _runner = effect(move || {
            state_clone.own_keys();
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        state.set("a", 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        state.set("a", 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        state.delete("a");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Deleting a missing key triggers nothing.
        state.delete("a");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn has_tracks_the_key() {
        let state = reactive(Value::object());
        let (calls, calls_clone) = spy();

        let state_clone = state.clone();
        let _runner = effect(move || {
            state_clone.has("a");
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        state.set("b", 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        state.set("a", 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn array_own_keys_track_length() {
        let list = reactive(Value::array(vec![Value::from(1)]));
        let (calls, calls_clone) = spy();

        let list_clone = list.clone();
        let _runner = effect(move || {
            list_clone.own_keys();
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        list.set(0, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        list.set(1, 6);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn readonly_discards_writes() {
        let locked = readonly(Value::object_from([("a", Value::from(1))]));
        assert!(locked.set("a", 2));
        assert!(locked.delete("a"));
        assert_eq!(locked.get("a"), Value::from(1));
    }

    #[test]
    fn has_own_ignores_the_prototype() {
        let parent = Value::object_from([("inherited", Value::from(1))]);
        let child = Value::object();
        child.set_prototype_of(Some(parent));
        let proxy = reactive(child);
        assert!(proxy.has("inherited"));
        assert!(!proxy.has_own("inherited"));
        assert_eq!(proxy.get("inherited"), Value::from(1));
    }
}
