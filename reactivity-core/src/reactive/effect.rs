//! Effect Implementation
//!
//! An effect is a re-runnable computation whose reads are recorded as
//! dependencies. Writing any of those dependencies runs it again.
//!
//! # How Effects Work
//!
//! 1. Unless created lazily, the effect runs once immediately to establish
//!    its initial dependencies.
//!
//! 2. Before every run it leaves every dep it joined last time. Conditional
//!    branches may read different keys on different runs, and a key read only
//!    by an abandoned branch must not trigger the effect any more.
//!
//! 3. While running, it is the active effect of the [`ReactiveContext`], so
//!    `track` attaches reads to it. Nested effects stack.
//!
//! 4. A run is refused while the same effect is already on the running
//!    chain. An effect that writes what it reads therefore runs exactly once
//!    per external trigger instead of recursing.
//!
//! # Scheduling
//!
//! With a scheduler, a trigger calls the scheduler instead of re-running.
//! Batching and deferral live entirely in the scheduler; computed values use
//! one to mark themselves stale without recomputing.
//!
//! # Stopping
//!
//! `stop()` is idempotent. It leaves every dep and calls `on_stop` once. A
//! stopped effect can still be run by hand; it then executes untracked.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::trace;

use super::context::{untracked, ReactiveContext};
use super::dep::Dep;
use crate::value::Value;

/// Unique identifier for an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Called instead of a direct re-run when a dependency changes.
pub type Scheduler = Arc<dyn Fn(&ReactiveEffect) + Send + Sync>;

type StopHook = Arc<dyn Fn() + Send + Sync>;

/// Options for [`effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    lazy: bool,
    scheduler: Option<Scheduler>,
    on_stop: Option<StopHook>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the immediate first run.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(&ReactiveEffect) + Send + Sync + 'static,
    {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    pub fn on_stop<F>(mut self, on_stop: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_stop = Some(Arc::new(on_stop));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

struct EffectInner {
    id: EffectId,
    func: Box<dyn Fn() -> Value + Send + Sync>,
    scheduler: Option<Scheduler>,
    on_stop: Option<StopHook>,
    /// Deps this effect is subscribed to; the reverse edge used by cleanup.
    deps: Mutex<SmallVec<[Arc<Dep>; 4]>>,
    active: AtomicBool,
    run_count: AtomicUsize,
}

/// Handle to an effect. Clones share state.
#[derive(Clone)]
pub struct ReactiveEffect(Arc<EffectInner>);

impl ReactiveEffect {
    pub(crate) fn new<F>(func: F, options: &EffectOptions) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(EffectInner {
            id: EffectId::next(),
            func: Box::new(func),
            scheduler: options.scheduler.clone(),
            on_stop: options.on_stop.clone(),
            deps: Mutex::new(SmallVec::new()),
            active: AtomicBool::new(true),
            run_count: AtomicUsize::new(0),
        }))
    }

    pub fn id(&self) -> EffectId {
        self.0.id
    }

    /// Run the computation and return its result.
    ///
    /// Returns `Undefined` without running if this effect is already running
    /// further up the stack.
    pub fn run(&self) -> Value {
        if !self.is_active() {
            return untracked(|| (self.0.func)());
        }
        if ReactiveContext::is_running(self.id()) {
            trace!(effect = ?self.id(), "re-entrant run skipped");
            return Value::Undefined;
        }

        self.cleanup();
        let _ctx = ReactiveContext::enter(self.clone());
        self.0.run_count.fetch_add(1, Ordering::Relaxed);
        trace!(effect = ?self.id(), "run");
        (self.0.func)()
    }

    /// Run through the scheduler if there is one, else run directly.
    pub(crate) fn notify(&self) {
        match &self.0.scheduler {
            Some(scheduler) => scheduler(self),
            None => {
                self.run();
            }
        }
    }

    /// Leave every dep and stop reacting. Idempotent.
    pub fn stop(&self) {
        if self.0.active.swap(false, Ordering::AcqRel) {
            self.cleanup();
            trace!(effect = ?self.id(), "stop");
            if let Some(on_stop) = &self.0.on_stop {
                on_stop();
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.0.active.load(Ordering::Acquire)
    }

    pub fn has_scheduler(&self) -> bool {
        self.0.scheduler.is_some()
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.0.run_count.load(Ordering::Relaxed)
    }

    /// Number of deps this effect is subscribed to.
    pub fn dep_count(&self) -> usize {
        self.0.deps.lock().len()
    }

    pub(crate) fn add_dep(&self, dep: Arc<Dep>) {
        self.0.deps.lock().push(dep);
    }

    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.0.deps.lock());
        for dep in &deps {
            dep.remove(self.id());
        }
    }
}

impl PartialEq for ReactiveEffect {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ReactiveEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .field("run_count", &self.run_count())
            .field("dep_count", &self.dep_count())
            .finish()
    }
}

/// The invokable handle returned by [`effect`].
#[derive(Clone, Debug)]
pub struct Runner {
    effect: ReactiveEffect,
}

impl Runner {
    /// Run the effect now and return its result.
    pub fn run(&self) -> Value {
        self.effect.run()
    }

    pub fn effect(&self) -> &ReactiveEffect {
        &self.effect
    }

    pub fn stop(&self) {
        self.effect.stop();
    }
}

/// Register `f` as an effect and run it once.
pub fn effect<F, R>(f: F) -> Runner
where
    F: Fn() -> R + Send + Sync + 'static,
    R: Into<Value>,
{
    effect_with(f, EffectOptions::default())
}

/// Register `f` as an effect with the given options.
pub fn effect_with<F, R>(f: F, options: EffectOptions) -> Runner
where
    F: Fn() -> R + Send + Sync + 'static,
    R: Into<Value>,
{
    let effect = ReactiveEffect::new(move || f().into(), &options);
    if !options.lazy {
        effect.run();
    }
    Runner { effect }
}

/// Stop the effect behind `runner`.
pub fn stop(runner: &Runner) {
    runner.stop();
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
