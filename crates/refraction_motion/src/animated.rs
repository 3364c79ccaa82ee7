//! Scheduler-driven springs
//!
//! [`SpringValue`] wraps any [`Animatable`] and steps it from the frame
//! scheduler. The frame callback is registered only while the spring is
//! moving: it removes itself once the spring settles and is re-registered on
//! the next retarget. Dropping the last clone revokes it.
//!
//! ```rust
//! use refraction_core::Scheduler;
//! use refraction_motion::{Spring, SpringConfig, SpringValue};
//!
//! let scheduler = Scheduler::new();
//! let opacity = SpringValue::new(scheduler.handle(), Spring::new(SpringConfig::stiff(), 1.0));
//!
//! opacity.set_target(0.0);
//! assert!(opacity.is_animating());
//!
//! for _ in 0..120 {
//!     scheduler.advance(1000.0 / 60.0);
//! }
//!
//! assert_eq!(opacity.with(|s| s.value()), 0.0);
//! assert_eq!(scheduler.pending_work(), 0);
//! ```

use crate::spring::Animatable;
use refraction_core::{FrameId, SchedulerHandle};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

struct Cell<S> {
    state: S,
    frame: Option<FrameId>,
}

struct Shared<S> {
    handle: SchedulerHandle,
    cell: Mutex<Cell<S>>,
}

impl<S> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, Cell<S>> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> Drop for Shared<S> {
    fn drop(&mut self) {
        let frame = self.lock().frame.take();
        if let Some(id) = frame {
            self.handle.cancel_frame(id);
        }
    }
}

/// A spring stepped by the scheduler's frame callbacks
///
/// Cloning shares the same spring. Use [`SpringValue::downgrade`] to retarget
/// it from a listener without keeping it alive.
pub struct SpringValue<S: Animatable> {
    shared: Arc<Shared<S>>,
}

impl<S: Animatable> SpringValue<S> {
    pub fn new(handle: SchedulerHandle, state: S) -> Self {
        Self {
            shared: Arc::new(Shared {
                handle,
                cell: Mutex::new(Cell { state, frame: None }),
            }),
        }
    }

    /// Retarget the spring; starts frame updates if it is at rest
    pub fn set_target(&self, target: S::Target) {
        retarget(&self.shared, target);
    }

    /// Read the current spring state
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.shared.lock().state)
    }

    /// Replace the spring state outright (e.g. snap to a value)
    pub fn update(&self, f: impl FnOnce(&mut S)) {
        let mut cell = self.shared.lock();
        f(&mut cell.state);
        let settled = cell.state.is_settled();
        drop(cell);
        if !settled {
            ensure_frame(&self.shared);
        }
    }

    /// True while a frame callback is stepping the spring
    pub fn is_animating(&self) -> bool {
        self.shared.lock().frame.is_some()
    }

    pub fn downgrade(&self) -> WeakSpringValue<S> {
        WeakSpringValue {
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl<S: Animatable> Clone for SpringValue<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// A non-owning reference to a [`SpringValue`]
pub struct WeakSpringValue<S: Animatable> {
    shared: Weak<Shared<S>>,
}

impl<S: Animatable> WeakSpringValue<S> {
    /// Retarget if the spring is still alive; returns whether it was
    pub fn set_target(&self, target: S::Target) -> bool {
        match self.shared.upgrade() {
            Some(shared) => {
                retarget(&shared, target);
                true
            }
            None => false,
        }
    }
}

impl<S: Animatable> Clone for WeakSpringValue<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

fn retarget<S: Animatable>(shared: &Arc<Shared<S>>, target: S::Target) {
    let settled = {
        let mut cell = shared.lock();
        cell.state.set_target(target);
        cell.state.is_settled()
    };
    if !settled {
        ensure_frame(shared);
    }
}

fn ensure_frame<S: Animatable>(shared: &Arc<Shared<S>>) {
    let mut cell = shared.lock();
    if cell.frame.is_some() {
        return;
    }

    let weak = Arc::downgrade(shared);
    cell.frame = shared.handle.on_frame(move |dt_ms| step_frame(&weak, dt_ms));
}

fn step_frame<S: Animatable>(weak: &Weak<Shared<S>>, dt_ms: f32) {
    let Some(shared) = weak.upgrade() else {
        return;
    };

    let finished = {
        let mut cell = shared.lock();
        cell.state.step(dt_ms / 1000.0);
        if cell.state.is_settled() {
            cell.frame.take()
        } else {
            None
        }
    };

    if let Some(id) = finished {
        shared.handle.cancel_frame(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spring::{Spring, Spring2D, SpringConfig};
    use refraction_core::Scheduler;

    const FRAME_MS: f32 = 1000.0 / 60.0;

    #[test]
    fn test_idle_spring_registers_nothing() {
        let scheduler = Scheduler::new();
        let value = SpringValue::new(scheduler.handle(), Spring::new(SpringConfig::stiff(), 5.0));

        assert!(!value.is_animating());
        value.set_target(5.0);
        assert!(!value.is_animating());
        assert_eq!(scheduler.pending_work(), 0);
    }

    #[test]
    fn test_spring_moves_then_unregisters() {
        let scheduler = Scheduler::new();
        let value = SpringValue::new(scheduler.handle(), Spring::new(SpringConfig::stiff(), 0.0));

        value.set_target(100.0);
        assert_eq!(scheduler.frame_callback_count(), 1);

        scheduler.advance(FRAME_MS);
        assert!(value.with(|s| s.value()) > 0.0);

        for _ in 0..200 {
            scheduler.advance(FRAME_MS);
        }

        assert!(!value.is_animating());
        assert_eq!(value.with(|s| s.value()), 100.0);
        assert_eq!(scheduler.pending_work(), 0);

        // Retarget after rest re-registers
        value.set_target(0.0);
        assert!(value.is_animating());
    }

    #[test]
    fn test_retarget_does_not_double_register() {
        let scheduler = Scheduler::new();
        let value = SpringValue::new(scheduler.handle(), Spring::new(SpringConfig::stiff(), 0.0));

        value.set_target(10.0);
        value.set_target(20.0);
        value.set_target(30.0);
        assert_eq!(scheduler.frame_callback_count(), 1);
    }

    #[test]
    fn test_drop_revokes_frame() {
        let scheduler = Scheduler::new();
        let value = SpringValue::new(
            scheduler.handle(),
            Spring2D::new(SpringConfig::magnetic(), (0.0, 0.0)),
        );
        let clone = value.clone();

        value.set_target((40.0, 40.0));
        scheduler.advance(FRAME_MS);

        drop(value);
        assert_eq!(scheduler.pending_work(), 1);

        drop(clone);
        assert_eq!(scheduler.pending_work(), 0);
    }

    #[test]
    fn test_weak_value() {
        let scheduler = Scheduler::new();
        let value = SpringValue::new(scheduler.handle(), Spring::new(SpringConfig::stiff(), 0.0));
        let weak = value.downgrade();

        assert!(weak.set_target(1.0));
        assert!(value.is_animating());

        drop(value);
        assert!(!weak.set_target(2.0));
        assert_eq!(scheduler.pending_work(), 0);
    }

    #[test]
    fn test_update_snaps() {
        let scheduler = Scheduler::new();
        let value = SpringValue::new(scheduler.handle(), Spring::new(SpringConfig::stiff(), 0.0));

        value.set_target(50.0);
        value.update(|s| s.snap_to(50.0));
        scheduler.advance(FRAME_MS);

        assert_eq!(value.with(|s| s.value()), 50.0);
        assert!(!value.is_animating());
    }
}
