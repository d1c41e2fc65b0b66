//! Reactive Proxies
//!
//! A [`Proxy`] is an interception layer over a raw target. Every property or
//! collection operation on a `Value::Proxy` goes through a trap (see
//! `base_handlers`, `array` and `collection_handlers`) that tracks reads and
//! triggers writes before delegating to the raw target.
//!
//! # Flavours
//!
//! Two independent flags give four flavours: [`reactive`], [`readonly`],
//! [`shallow_reactive`] and [`shallow_readonly`]. Each flavour has its own
//! identity cache, so wrapping the same target twice yields the same proxy.
//!
//! Readonly wrapping of a mutable proxy builds a readonly layer *over* that
//! proxy instead of over the raw target. Reads through the outer layer then
//! pass through the inner one and are still tracked there.
//!
//! # Identity
//!
//! A proxy's identity is its [`ProxyId`], derived from the target and the
//! flavour. Proxy equality and SameValueZero comparisons use it, so a proxy
//! rebuilt after every handle was dropped is still the "same" proxy.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::value::{Target, TargetId, Value};

/// The two independent wrapping flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProxyFlags {
    pub readonly: bool,
    pub shallow: bool,
}

impl ProxyFlags {
    pub const REACTIVE: Self = Self { readonly: false, shallow: false };
    pub const SHALLOW_REACTIVE: Self = Self { readonly: false, shallow: true };
    pub const READONLY: Self = Self { readonly: true, shallow: false };
    pub const SHALLOW_READONLY: Self = Self { readonly: true, shallow: true };

    fn cache_index(self) -> usize {
        usize::from(self.readonly) * 2 + usize::from(self.shallow)
    }
}

/// Identity of a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyId {
    /// A reactive layer. `over` is set when the layer wraps another proxy
    /// (readonly over a mutable proxy) and holds that proxy's flags.
    Reactive {
        target: TargetId,
        flags: ProxyFlags,
        over: Option<ProxyFlags>,
    },
    /// A ref-unwrapping layer from `proxy_refs`. Never cached.
    Unwrap(u64),
}

/// What a reactive layer delegates to.
pub(crate) enum ProxyTarget {
    Raw(Target),
    Proxy(Proxy),
}

impl ProxyTarget {
    pub(crate) fn to_value(&self) -> Value {
        match self {
            ProxyTarget::Raw(target) => Value::Object(target.clone()),
            ProxyTarget::Proxy(proxy) => Value::Proxy(proxy.clone()),
        }
    }
}

pub(crate) enum ProxyKind {
    Reactive {
        target: ProxyTarget,
        /// The raw target at the bottom of the layers.
        raw: Target,
        flags: ProxyFlags,
    },
    RefUnwrap {
        source: Value,
    },
}

struct ProxyInner {
    id: ProxyId,
    kind: ProxyKind,
}

/// Handle to a proxy. Clones share the same layer.
#[derive(Clone)]
pub struct Proxy(Arc<ProxyInner>);

impl Proxy {
    /// A layer that unwraps ref-valued properties of `source`.
    pub(crate) fn unwrapping(source: Value) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(Arc::new(ProxyInner {
            id: ProxyId::Unwrap(COUNTER.fetch_add(1, Ordering::Relaxed)),
            kind: ProxyKind::RefUnwrap { source },
        }))
    }

    pub fn id(&self) -> ProxyId {
        self.0.id
    }

    /// The wrapping flags; `None` for ref-unwrapping layers.
    pub fn flags(&self) -> Option<ProxyFlags> {
        match &self.0.kind {
            ProxyKind::Reactive { flags, .. } => Some(*flags),
            ProxyKind::RefUnwrap { .. } => None,
        }
    }

    /// The raw target behind every layer.
    pub fn raw_target(&self) -> Option<Target> {
        match &self.0.kind {
            ProxyKind::Reactive { raw, .. } => Some(raw.clone()),
            ProxyKind::RefUnwrap { source } => source.raw_target(),
        }
    }

    pub fn ptr_eq(&self, other: &Proxy) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn kind(&self) -> &ProxyKind {
        &self.0.kind
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            ProxyKind::Reactive { raw, flags, target } => {
                let over = matches!(target, ProxyTarget::Proxy(_));
                f.debug_struct("Proxy")
                    .field("target", raw)
                    .field("readonly", &flags.readonly)
                    .field("shallow", &flags.shallow)
                    .field("layered", &over)
                    .finish()
            }
            ProxyKind::RefUnwrap { source } => {
                f.debug_tuple("ProxyRefs").field(source).finish()
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Identity caches
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    target: TargetId,
    over: Option<ProxyFlags>,
}

type ProxyCache = DashMap<CacheKey, Weak<ProxyInner>>;

static CACHES: OnceLock<[ProxyCache; 4]> = OnceLock::new();

fn get_caches() -> &'static [ProxyCache; 4] {
    CACHES.get_or_init(|| std::array::from_fn(|_| DashMap::new()))
}

/// Drop every cache entry for a target that no longer exists.
pub(crate) fn evict(target: TargetId) {
    let Some(caches) = CACHES.get() else {
        return;
    };
    for cache in caches {
        for over in [None, Some(ProxyFlags::REACTIVE), Some(ProxyFlags::SHALLOW_REACTIVE)] {
            cache.remove(&CacheKey { target, over });
        }
    }
}

/// Number of live proxies cached for `target`, across all flavours.
pub fn cached_proxy_count(target: TargetId) -> usize {
    let Some(caches) = CACHES.get() else {
        return 0;
    };
    caches
        .iter()
        .flat_map(|cache| {
            [None, Some(ProxyFlags::REACTIVE), Some(ProxyFlags::SHALLOW_REACTIVE)]
                .into_iter()
                .filter(move |over| {
                    cache
                        .get(&CacheKey { target, over: *over })
                        .is_some_and(|weak| weak.strong_count() > 0)
                })
        })
        .count()
}

fn create_reactive_object(value: Value, flags: ProxyFlags) -> Value {
    let (target, raw, over) = match &value {
        Value::Proxy(proxy) => match proxy.kind() {
            ProxyKind::Reactive {
                raw, flags: inner, ..
            } => {
                // Only a readonly wrap of a mutable proxy adds a layer.
                if !(flags.readonly && !inner.readonly) {
                    return value;
                }
                (ProxyTarget::Proxy(proxy.clone()), raw.clone(), Some(*inner))
            }
            ProxyKind::RefUnwrap { .. } => return value,
        },
        Value::Object(target) => (ProxyTarget::Raw(target.clone()), target.clone(), None),
        _ => {
            warn!(?value, "value cannot be made reactive");
            return value;
        }
    };

    if raw.is_skipped() || !raw.is_extensible() {
        debug!(id = %raw.id(), "target is not observable");
        return value;
    }

    let key = CacheKey {
        target: raw.id(),
        over,
    };
    let cache = &get_caches()[flags.cache_index()];
    let build = |target, raw: Target| {
        Arc::new(ProxyInner {
            id: ProxyId::Reactive {
                target: raw.id(),
                flags,
                over,
            },
            kind: ProxyKind::Reactive { target, raw, flags },
        })
    };

    let inner = match cache.entry(key) {
        Entry::Occupied(mut entry) => match entry.get().upgrade() {
            Some(existing) => existing,
            None => {
                let inner = build(target, raw);
                entry.insert(Arc::downgrade(&inner));
                inner
            }
        },
        Entry::Vacant(entry) => {
            let inner = build(target, raw);
            entry.insert(Arc::downgrade(&inner));
            inner
        }
    };
    Value::Proxy(Proxy(inner))
}

/// Deep mutable proxy of `value`. Non-objects are returned unchanged.
pub fn reactive(value: impl Into<Value>) -> Value {
    create_reactive_object(value.into(), ProxyFlags::REACTIVE)
}

/// Deep readonly proxy of `value`.
pub fn readonly(value: impl Into<Value>) -> Value {
    create_reactive_object(value.into(), ProxyFlags::READONLY)
}

/// Proxy that observes only the first level of `value`.
pub fn shallow_reactive(value: impl Into<Value>) -> Value {
    create_reactive_object(value.into(), ProxyFlags::SHALLOW_REACTIVE)
}

/// Readonly at the first level; nested values are returned as stored.
pub fn shallow_readonly(value: impl Into<Value>) -> Value {
    create_reactive_object(value.into(), ProxyFlags::SHALLOW_READONLY)
}

/// Whether `value` is a mutable proxy, or a readonly layer over one.
pub fn is_reactive(value: &Value) -> bool {
    match value {
        Value::Proxy(proxy) => match proxy.kind() {
            ProxyKind::Reactive { flags, target, .. } if flags.readonly => match target {
                ProxyTarget::Proxy(inner) => is_reactive(&Value::Proxy(inner.clone())),
                ProxyTarget::Raw(_) => false,
            },
            ProxyKind::Reactive { .. } => true,
            ProxyKind::RefUnwrap { .. } => false,
        },
        _ => false,
    }
}

/// Whether `value` rejects writes: a readonly proxy or a readonly ref.
pub fn is_readonly(value: &Value) -> bool {
    match value {
        Value::Proxy(proxy) => proxy.flags().is_some_and(|flags| flags.readonly),
        Value::Ref(r) => r.is_readonly(),
        _ => false,
    }
}

pub fn is_shallow(value: &Value) -> bool {
    match value {
        Value::Proxy(proxy) => proxy.flags().is_some_and(|flags| flags.shallow),
        Value::Ref(r) => r.is_shallow(),
        _ => false,
    }
}

/// Whether `value` was produced by one of the four wrapping entry points.
pub fn is_proxy(value: &Value) -> bool {
    matches!(value, Value::Proxy(proxy) if proxy.flags().is_some())
}

/// The raw value behind a reactive proxy; anything else is returned as-is.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Proxy(proxy) => match proxy.kind() {
            ProxyKind::Reactive { raw, .. } => Value::Object(raw.clone()),
            ProxyKind::RefUnwrap { .. } => value.clone(),
        },
        _ => value.clone(),
    }
}

/// Mark the target behind `value` as never observable. Permanent.
///
/// A non-extensible target cannot be marked; that is a silent no-op.
pub fn mark_raw(value: Value) -> Value {
    if let Some(target) = value.raw_target() {
        if !target.mark_skip() {
            debug!(id = %target.id(), "non-extensible target left unmarked");
        }
    }
    value
}

/// `reactive(value)` for objects, `value` itself otherwise.
pub fn to_reactive(value: Value) -> Value {
    if value.is_object() {
        reactive(value)
    } else {
        value
    }
}

/// `readonly(value)` for objects, `value` itself otherwise.
pub fn to_readonly(value: Value) -> Value {
    if value.is_object() {
        readonly(value)
    } else {
        value
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
