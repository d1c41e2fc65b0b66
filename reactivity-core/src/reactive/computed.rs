//! Computed Values
//!
//! A computed is a cached, lazily evaluated ref over a getter.
//!
//! # How It Works
//!
//! 1. The getter runs inside a lazy effect, so its reads become the
//!    computed's dependencies. The computed starts dirty.
//!
//! 2. Reading `value()` tracks the computed's own dep. If dirty, the flag is
//!    cleared and the effect re-runs; the result is cached.
//!
//! 3. When a dependency changes, the effect's scheduler marks the computed
//!    dirty and triggers its dep. It does not recompute: readers that re-run
//!    pull the new value, and a computed nobody reads never recomputes.
//!
//! A computed chain therefore stays lazy end to end: marking an upstream
//! computed dirty marks the downstream one dirty through its dep.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{trace, warn};

use super::dep::Dep;
use super::effect::{EffectOptions, ReactiveEffect};
use super::operations::{track_effects, trigger_effects};
use super::refs::{Ref, RefId, RefImpl};
use crate::error::Result;
use crate::value::Value;

type Setter = Box<dyn Fn(Value) + Send + Sync>;

struct ComputedInner {
    value: RwLock<Value>,
    dirty: AtomicBool,
    effect: ReactiveEffect,
    dep: Arc<Dep>,
    setter: Option<Setter>,
}

impl ComputedInner {
    fn build<F>(getter: F, setter: Option<Setter>) -> Arc<Self>
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Arc::new_cyclic(|weak: &Weak<ComputedInner>| {
            let weak = weak.clone();
            let options = EffectOptions::new().lazy(true).scheduler(move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.invalidate();
                }
            });
            ComputedInner {
                value: RwLock::new(Value::Undefined),
                dirty: AtomicBool::new(true),
                effect: ReactiveEffect::new(getter, &options),
                dep: Dep::new(),
                setter,
            }
        })
    }

    fn invalidate(&self) {
        if !self.dirty.swap(true, Ordering::AcqRel) {
            trace!(effect = ?self.effect.id(), "computed invalidated");
            trigger_effects(&self.dep);
        }
    }

    fn value(&self) -> Value {
        track_effects(&self.dep);
        if self.dirty.swap(false, Ordering::AcqRel) {
            let fresh = self.effect.run();
            let stale = std::mem::replace(&mut *self.value.write(), fresh);
            drop(stale);
        }
        self.value.read().clone()
    }
}

impl RefImpl for ComputedInner {
    fn get(&self) -> Value {
        self.value()
    }

    fn set(&self, value: Value) -> Result<()> {
        match &self.setter {
            Some(setter) => setter(value),
            None => warn!("write operation failed: computed value is readonly"),
        }
        Ok(())
    }

    fn is_readonly(&self) -> bool {
        self.setter.is_none()
    }
}

impl Drop for ComputedInner {
    fn drop(&mut self) {
        self.effect.stop();
        self.dep.clear();
    }
}

/// Handle to a computed value. Clones share the cache.
#[derive(Clone)]
pub struct ComputedRef {
    id: RefId,
    inner: Arc<ComputedInner>,
}

impl ComputedRef {
    fn from_inner(inner: Arc<ComputedInner>) -> Self {
        Self {
            id: RefId::next(),
            inner,
        }
    }

    pub fn id(&self) -> RefId {
        self.id
    }

    /// The cached value, recomputed first if stale.
    pub fn value(&self) -> Value {
        self.inner.value()
    }

    /// Pass `value` to the setter. Without one, warn and ignore it.
    pub fn set_value(&self, value: impl Into<Value>) -> Result<()> {
        self.inner.set(value.into())
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.is_readonly()
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::Acquire)
    }

    pub fn effect(&self) -> &ReactiveEffect {
        &self.inner.effect
    }

    pub fn to_ref(&self) -> Ref {
        Ref::from_parts(self.id, self.inner.clone())
    }
}

impl fmt::Debug for ComputedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedRef")
            .field("id", &self.id)
            .field("dirty", &self.is_dirty())
            .field("readonly", &self.is_readonly())
            .finish()
    }
}

impl From<ComputedRef> for Ref {
    fn from(computed: ComputedRef) -> Self {
        computed.to_ref()
    }
}

impl From<ComputedRef> for Value {
    fn from(computed: ComputedRef) -> Self {
        Value::Ref(computed.to_ref())
    }
}

/// A readonly computed over `getter`.
pub fn computed<F, R>(getter: F) -> ComputedRef
where
    F: Fn() -> R + Send + Sync + 'static,
    R: Into<Value>,
{
    ComputedRef::from_inner(ComputedInner::build(move || getter().into(), None))
}

/// A computed whose writes are passed to `setter`.
pub fn writable_computed<G, R, S>(getter: G, setter: S) -> ComputedRef
where
    G: Fn() -> R + Send + Sync + 'static,
    R: Into<Value>,
    S: Fn(Value) + Send + Sync + 'static,
{
    ComputedRef::from_inner(ComputedInner::build(
        move || getter().into(),
        Some(Box::new(setter)),
    ))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
