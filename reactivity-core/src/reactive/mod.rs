//! Reactive Core
//!
//! Fine-grained reactivity over dynamically shaped data: reads inside an
//! effect are recorded, and writes re-run exactly the effects that read what
//! changed.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An effect is a re-runnable computation. While it runs, every observed read
//! subscribes it to the (target, key) pair that was read.
//!
//! ## Proxies
//!
//! [`reactive`] and its siblings wrap a raw object, array or collection in an
//! interception layer. The layer tracks reads and triggers writes, and wraps
//! nested objects lazily as they are read.
//!
//! ## Refs and Computeds
//!
//! A ref is a single observable slot. A computed is a ref whose value is
//! derived from a getter, cached, and recomputed only when read after one of
//! its inputs changed.
//!
//! # Implementation Notes
//!
//! The subscription graph lives in a process-wide store keyed by target id
//! (`dep`). The running-effect stack and the tracking switch are
//! thread-local (`context`). When the last handle to a target drops,
//! its store entry and its proxy-cache entries are removed.

mod array;
mod base_handlers;
mod collection_handlers;
mod computed;
mod context;
mod dep;
mod effect;
mod operations;
mod proxy;
mod refs;

pub use collection_handlers::CollectionIter;
pub use computed::{computed, writable_computed, ComputedRef};
pub use context::{
    enable_tracking, is_tracking, pause_tracking, reset_tracking, untracked, ReactiveContext,
    TrackingPause,
};
pub use dep::{dep_count, tracked_targets, Dep, DepKey};
pub use effect::{
    effect, effect_with, stop, EffectId, EffectOptions, ReactiveEffect, Runner, Scheduler,
};
pub use operations::{track, trigger, TrackOp, TriggerOp};
pub use proxy::{
    cached_proxy_count, is_proxy, is_reactive, is_readonly, is_shallow, mark_raw, reactive,
    readonly, shallow_reactive, shallow_readonly, to_raw, to_reactive, to_readonly, Proxy,
    ProxyFlags, ProxyId,
};
pub use refs::{
    is_ref, proxy_refs, ref_, shallow_ref, to_ref, to_ref_at, to_ref_at_or, to_refs, to_value,
    unref, Ref, RefId, RefImpl,
};

use crate::value::TargetId;

/// Tear down everything recorded for a target that no longer exists.
pub(crate) fn forget_target(id: TargetId) {
    dep::forget(id);
    proxy::evict(id);
}
