//! Reactive Context
//!
//! The reactive context tracks which effect is currently running and whether
//! reads should be recorded at all.
//!
//! # Implementation
//!
//! Two pieces of thread-local state:
//!
//! - The effect stack. Running an effect pushes it; the top of the stack is
//!   the active effect that `track` attaches reads to. Nested effects save
//!   and restore the outer one simply by stacking.
//! - The tracking switch, with its own save stack. `pause_tracking` turns
//!   recording off (array mutators use this), `enable_tracking` turns it on
//!   (every effect run does this), and `reset_tracking` restores whatever was
//!   in force before the matching pause/enable.
//!
//! Both are manipulated through guards that undo their change on drop, so the
//! stacks stay balanced even if the computation panics.

use std::cell::{Cell, RefCell};

use super::effect::{EffectId, ReactiveEffect};

thread_local! {
    static EFFECT_STACK: RefCell<Vec<ReactiveEffect>> = const { RefCell::new(Vec::new()) };
    static SHOULD_TRACK: Cell<bool> = const { Cell::new(true) };
    static TRACK_STACK: RefCell<Vec<bool>> = const { RefCell::new(Vec::new()) };
}

/// Guard that makes an effect the active one until dropped.
pub struct ReactiveContext {
    effect_id: EffectId,
}

impl ReactiveContext {
    /// Push `effect` as the active effect and enable tracking for its run.
    pub fn enter(effect: ReactiveEffect) -> Self {
        let effect_id = effect.id();
        EFFECT_STACK.with(|stack| stack.borrow_mut().push(effect));
        enable_tracking();
        Self { effect_id }
    }

    /// Check if an effect is currently running on this thread.
    pub fn is_active() -> bool {
        EFFECT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The innermost running effect.
    pub fn active_effect() -> Option<ReactiveEffect> {
        EFFECT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    pub(crate) fn active_effect_id() -> Option<EffectId> {
        EFFECT_STACK.with(|stack| stack.borrow().last().map(ReactiveEffect::id))
    }

    /// Whether `id` is anywhere on the running-effect chain.
    pub fn is_running(id: EffectId) -> bool {
        EFFECT_STACK.with(|stack| stack.borrow().iter().any(|effect| effect.id() == id))
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        reset_tracking();
        let popped = EFFECT_STACK.with(|stack| stack.borrow_mut().pop());

        if let Some(effect) = &popped {
            debug_assert_eq!(
                effect.id(),
                self.effect_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.effect_id,
                effect.id()
            );
        }
        // Dropped outside the borrow: this may be the last handle.
        drop(popped);
    }
}

/// Stop recording dependencies until the matching [`reset_tracking`].
pub fn pause_tracking() {
    TRACK_STACK.with(|stack| stack.borrow_mut().push(SHOULD_TRACK.with(Cell::get)));
    SHOULD_TRACK.with(|flag| flag.set(false));
}

/// Record dependencies until the matching [`reset_tracking`].
pub fn enable_tracking() {
    TRACK_STACK.with(|stack| stack.borrow_mut().push(SHOULD_TRACK.with(Cell::get)));
    SHOULD_TRACK.with(|flag| flag.set(true));
}

/// Restore the tracking switch saved by the last pause/enable.
pub fn reset_tracking() {
    let last = TRACK_STACK.with(|stack| stack.borrow_mut().pop());
    SHOULD_TRACK.with(|flag| flag.set(last.unwrap_or(true)));
}

/// Whether a read right now would be recorded.
pub fn is_tracking() -> bool {
    SHOULD_TRACK.with(Cell::get) && ReactiveContext::is_active()
}

/// Guard form of [`pause_tracking`].
pub struct TrackingPause(());

impl TrackingPause {
    pub fn new() -> Self {
        pause_tracking();
        Self(())
    }
}

impl Default for TrackingPause {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TrackingPause {
    fn drop(&mut self) {
        reset_tracking();
    }
}

/// Run `f` without recording any of its reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _pause = TrackingPause::new();
    f()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::{effect_with, EffectOptions};
    use crate::value::Value;

    fn lazy_effect() -> ReactiveEffect {
        effect_with(|| Value::Undefined, EffectOptions::new().lazy(true))
            .effect()
            .clone()
    }

    #[test]
    fn context_tracks_effect() {
        let effect = lazy_effect();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::active_effect().is_none());

        {
            let _ctx = ReactiveContext::enter(effect.clone());

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::active_effect_id(), Some(effect.id()));
            assert!(is_tracking());
        }

        assert!(!ReactiveContext::is_active());
        assert!(!is_tracking());
    }

    #[test]
    fn nested_contexts() {
        let outer = lazy_effect();
        let inner = lazy_effect();

        {
            let _ctx1 = ReactiveContext::enter(outer.clone());
            {
                let _ctx2 = ReactiveContext::enter(inner.clone());
                assert_eq!(ReactiveContext::active_effect_id(), Some(inner.id()));
                assert!(ReactiveContext::is_running(outer.id()));
            }
            assert_eq!(ReactiveContext::active_effect_id(), Some(outer.id()));
            assert!(!ReactiveContext::is_running(inner.id()));
        }

        assert!(ReactiveContext::active_effect().is_none());
    }

    #[test]
    fn pause_and_reset_nest() {
        let effect = lazy_effect();
        let _ctx = ReactiveContext::enter(effect);

        assert!(is_tracking());
        {
            let _outer = TrackingPause::new();
            assert!(!is_tracking());
            enable_tracking();
            assert!(is_tracking());
            reset_tracking();
            assert!(!is_tracking());
        }
        assert!(is_tracking());
        assert!(!untracked(is_tracking));
    }
}
