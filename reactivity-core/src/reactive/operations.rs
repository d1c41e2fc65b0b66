//! Track / Trigger
//!
//! `track` records "the active effect read (target, key)"; `trigger` finds
//! every effect that read what a write changed and re-runs it.
//!
//! # Trigger Rules
//!
//! A write always reaches the subscribers of its exact key. Structural
//! writes reach further:
//!
//! | operation                     | also triggers                          |
//! |-------------------------------|----------------------------------------|
//! | `Add` on a non-array          | `Iterate`, plus `MapKeyIterate` on Maps|
//! | `Add` of an index on an array | `length`                               |
//! | `Delete` on a non-array       | `Iterate`, plus `MapKeyIterate` on Maps|
//! | `Set` on a Map                | `Iterate`                              |
//! | array `length` write          | every index at or past the new length  |
//! | `Clear`                       | every dep of the target                |
//!
//! Every collected effect runs once, in subscription order. The effect that
//! is currently running is skipped.

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::trace;

use super::context::{is_tracking, ReactiveContext};
use super::dep::{self, Dep, DepKey};
use super::effect::{EffectId, ReactiveEffect};
use crate::value::{Key, Target, TargetKind, Value};

/// Kind of read being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// Kind of write being triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    Set,
    Add,
    Delete,
    Clear,
}

/// Record that the active effect depends on `(target, key)`.
pub fn track(target: &Target, op: TrackOp, key: DepKey) {
    if !is_tracking() {
        return;
    }
    let Some(effect) = ReactiveContext::active_effect() else {
        return;
    };
    trace!(id = %target.id(), ?op, ?key, "track");
    let dep = dep::dep_for(target.id(), key);
    subscribe(&effect, &dep);
}

/// Record that the active effect depends on `dep`.
pub(crate) fn track_effects(dep: &Arc<Dep>) {
    if !is_tracking() {
        return;
    }
    if let Some(effect) = ReactiveContext::active_effect() {
        subscribe(&effect, dep);
    }
}

/// Stopped effects never subscribe, even when stopped mid-run.
fn subscribe(effect: &ReactiveEffect, dep: &Arc<Dep>) {
    if !effect.is_active() {
        return;
    }
    if dep.insert(effect) {
        effect.add_dep(dep.clone());
    }
}

/// Re-run every effect affected by a write to `(target, key)`.
///
/// `key` is `None` only for [`TriggerOp::Clear`].
pub fn trigger(
    target: &Target,
    op: TriggerOp,
    key: Option<DepKey>,
    new_value: Option<&Value>,
    old_value: Option<&Value>,
) {
    let collected = dep::with_deps(target.id(), |deps| {
        collect_deps(deps, target.kind(), op, key.as_ref(), new_value)
    });
    let Some(deps) = collected else {
        return;
    };
    trace!(id = %target.id(), ?op, ?key, ?new_value, ?old_value, "trigger");
    run_effects(&deps);
}

/// Re-run every subscriber of `dep`.
pub(crate) fn trigger_effects(dep: &Arc<Dep>) {
    run_effects(std::slice::from_ref(dep));
}

fn collect_deps(
    deps: &std::collections::HashMap<DepKey, Arc<Dep>>,
    kind: TargetKind,
    op: TriggerOp,
    key: Option<&DepKey>,
    new_value: Option<&Value>,
) -> Vec<Arc<Dep>> {
    let is_array = kind == TargetKind::Array;
    let length = DepKey::Prop(Key::length());
    let iterate = DepKey::Iterate;
    let map_key_iterate = DepKey::MapKeyIterate;

    if op == TriggerOp::Clear {
        return deps.values().cloned().collect();
    }

    if is_array && key == Some(&length) {
        let new_length = new_value.and_then(Value::as_array_length);
        return deps
            .iter()
            .filter(|(dep_key, _)| {
                let truncated = match (dep_key, new_length) {
                    (DepKey::Prop(Key::Index(index)), Some(new_length)) => *index >= new_length,
                    _ => false,
                };
                *dep_key == &length || truncated
            })
            .map(|(_, dep)| dep.clone())
            .collect();
    }

    let mut keys: Vec<&DepKey> = Vec::with_capacity(3);
    if let Some(key) = key {
        keys.push(key);
    }
    match op {
        TriggerOp::Add | TriggerOp::Delete if !is_array => {
            keys.push(&iterate);
            if kind == TargetKind::Map {
                keys.push(&map_key_iterate);
            }
        }
        TriggerOp::Add if matches!(key, Some(DepKey::Prop(Key::Index(_)))) => keys.push(&length),
        TriggerOp::Set if kind == TargetKind::Map => keys.push(&iterate),
        _ => {}
    }

    keys.into_iter()
        .filter_map(|key| deps.get(key).cloned())
        .collect()
}

fn run_effects(deps: &[Arc<Dep>]) {
    let mut effects: IndexMap<EffectId, ReactiveEffect> = IndexMap::new();
    for dep in deps {
        for effect in dep.snapshot() {
            effects.entry(effect.id()).or_insert(effect);
        }
    }

    let running = ReactiveContext::active_effect_id();
    for effect in effects.into_values() {
        if Some(effect.id()) == running || !effect.is_active() {
            continue;
        }
        effect.notify();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::effect;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_effect<F>(read: F) -> Arc<AtomicUsize>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();
        let runner = effect(move || {
            read();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });
        // Kept alive by the deps it subscribed to.
        drop(runner);
        runs
    }

    #[test]
    fn track_outside_an_effect_is_a_noop() {
        let target = Target::new(TargetKind::Object);
        track(&target, TrackOp::Get, DepKey::Prop(Key::from("a")));
        assert_eq!(dep::dep_count(target.id()), 0);
    }

    #[test]
    fn trigger_without_deps_is_a_noop() {
        let target = Target::new(TargetKind::Object);
        trigger(&target, TriggerOp::Set, Some(Key::from("a").into()), None, None);
    }

    #[test]
    fn add_reaches_iterate_but_set_does_not() {
        let target = Target::new(TargetKind::Object);
        let tracked = target.clone();
        let runs = counting_effect(move || {
            track(&tracked, TrackOp::Iterate, DepKey::Iterate);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        trigger(&target, TriggerOp::Set, Some(Key::from("a").into()), None, None);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        trigger(&target, TriggerOp::Add, Some(Key::from("a").into()), None, None);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        trigger(&target, TriggerOp::Delete, Some(Key::from("a").into()), None, None);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn map_set_reaches_iterate_but_not_key_iterate() {
        let target = Target::new(TargetKind::Map);
        let (entries, keys) = (target.clone(), target.clone());
        let entry_runs = counting_effect(move || {
            track(&entries, TrackOp::Iterate, DepKey::Iterate);
        });
        let key_runs = counting_effect(move || {
            track(&keys, TrackOp::Iterate, DepKey::MapKeyIterate);
        });

        let key = DepKey::Entry(Value::from("k").identity());
        trigger(&target, TriggerOp::Set, Some(key.clone()), None, None);
        assert_eq!(entry_runs.load(Ordering::SeqCst), 2);
        assert_eq!(key_runs.load(Ordering::SeqCst), 1);

        trigger(&target, TriggerOp::Add, Some(key), None, None);
        assert_eq!(entry_runs.load(Ordering::SeqCst), 3);
        assert_eq!(key_runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn length_write_reaches_truncated_indices_only() {
        let target = Target::new(TargetKind::Array);
        let (low, high) = (target.clone(), target.clone());
        let low_runs = counting_effect(move || {
            track(&low, TrackOp::Get, Key::Index(0).into());
        });
        let high_runs = counting_effect(move || {
            track(&high, TrackOp::Get, Key::Index(3).into());
        });

        let new_length = Value::from(1);
        trigger(
            &target,
            TriggerOp::Set,
            Some(Key::length().into()),
            Some(&new_length),
            None,
        );
        assert_eq!(low_runs.load(Ordering::SeqCst), 1);
        assert_eq!(high_runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn index_add_reaches_length() {
        let target = Target::new(TargetKind::Array);
        let tracked = target.clone();
        let runs = counting_effect(move || {
            track(&tracked, TrackOp::Get, Key::length().into());
        });

        trigger(&target, TriggerOp::Add, Some(Key::Index(5).into()), None, None);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clear_reaches_everything() {
        let target = Target::new(TargetKind::Set);
        let (a, b) = (target.clone(), target.clone());
        let a_runs = counting_effect(move || {
            track(&a, TrackOp::Has, DepKey::Entry(Value::from(1).identity()));
        });
        let b_runs = counting_effect(move || {
            track(&b, TrackOp::Iterate, DepKey::Iterate);
        });

        trigger(&target, TriggerOp::Clear, None, None, None);
        assert_eq!(a_runs.load(Ordering::SeqCst), 2);
        assert_eq!(b_runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn paused_tracking_records_nothing() {
        let target = Target::new(TargetKind::Object);
        let tracked = target.clone();
        let _runs = counting_effect(move || {
            crate::reactive::untracked(|| {
                track(&tracked, TrackOp::Get, Key::from("a").into());
            });
        });
        assert_eq!(dep::dep_count(target.id()), 0);
    }
}
