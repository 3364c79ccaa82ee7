//! One-shot viewport entry
//!
//! An [`InViewTrigger`] runs its action the first time a region of the page
//! intersects the viewport, then stops listening to scroll.

use refraction_core::{ScrollInput, ScrollMetrics, Subscription};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Does the content span `top .. top + height` overlap the visible window?
pub fn intersects(metrics: &ScrollMetrics, top: f32, height: f32) -> bool {
    let bottom = top + height.max(0.0);
    let view_top = metrics.offset;
    let view_bottom = metrics.offset + metrics.viewport;
    top < view_bottom && bottom > view_top
}

type Action = Box<dyn FnOnce() + Send>;

struct TriggerState {
    action: Option<Action>,
    subscription: Option<Subscription>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fires an action once when a region scrolls into view
pub struct InViewTrigger {
    state: Arc<Mutex<TriggerState>>,
}

impl InViewTrigger {
    /// Watch the region at `top` (content coordinates) with `height`
    ///
    /// If the region is already visible the action runs before this returns.
    pub fn new<F>(input: &dyn ScrollInput, top: f32, height: f32, action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let state = Arc::new(Mutex::new(TriggerState {
            action: Some(Box::new(action)),
            subscription: None,
        }));

        if intersects(&input.metrics(), top, height) {
            fire(&state);
            return Self { state };
        }

        let weak = Arc::downgrade(&state);
        let subscription = input.subscribe(Box::new(move |metrics| {
            if intersects(metrics, top, height) {
                if let Some(state) = Weak::upgrade(&weak) {
                    fire(&state);
                }
            }
        }));
        lock(&state).subscription = Some(subscription);

        Self { state }
    }

    /// True once the action has run
    pub fn has_fired(&self) -> bool {
        lock(&self.state).action.is_none()
    }

    /// True while still listening for scroll
    pub fn is_watching(&self) -> bool {
        lock(&self.state).subscription.is_some()
    }
}

fn fire(state: &Arc<Mutex<TriggerState>>) {
    let (action, subscription) = {
        let mut state = lock(state);
        (state.action.take(), state.subscription.take())
    };
    // Release the scroll listener before running the action
    drop(subscription);
    if let Some(action) = action {
        tracing::trace!("region entered the viewport");
        action();
    }
}
