//! Timer and frame scheduler
//!
//! All suspension in Refraction is expressed as "call me after N
//! milliseconds" or "call me on the next frame". The [`Scheduler`] owns a
//! virtual millisecond clock, a set of pending timers and a set of frame
//! callbacks. Effects receive a weak [`SchedulerHandle`] and register work
//! through it; every registration returns an id (or a [`Subscription`]) that
//! revokes it.
//!
//! Time only moves when the owner says so:
//! - [`Scheduler::advance`] moves the clock by an explicit delta. Tests use
//!   it as a fake clock.
//! - [`Scheduler::tick`] measures the wall-clock delta since the previous
//!   tick and advances by that. Frame loops call it once per frame.
//!
//! Callbacks are invoked with no scheduler lock held, so they may schedule
//! or revoke work (including their own registration).
//!
//! ```rust
//! use refraction_core::Scheduler;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! let scheduler = Scheduler::new();
//! let fired = Arc::new(AtomicBool::new(false));
//!
//! let flag = Arc::clone(&fired);
//! scheduler.handle().set_timeout(100, move || flag.store(true, Ordering::SeqCst));
//!
//! scheduler.advance(99.0);
//! assert!(!fired.load(Ordering::SeqCst));
//! scheduler.advance(1.0);
//! assert!(fired.load(Ordering::SeqCst));
//! assert_eq!(scheduler.pending_work(), 0);
//! ```

use crate::subscription::{lock, Subscription};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

new_key_type! {
    /// Handle to a pending timeout or interval
    pub struct TimerId;
    /// Handle to a registered frame callback
    pub struct FrameId;
}

/// Callback run when a timer fires
pub type TimerCallback = Box<dyn FnMut() + Send>;

/// Callback run once per frame with the frame delta in milliseconds
pub type FrameCallback = Arc<Mutex<dyn FnMut(f32) + Send>>;

struct Timer {
    deadline_ms: f64,
    /// Scheduling order, breaks deadline ties
    seq: u64,
    /// Repeat period for intervals
    period_ms: Option<f64>,
    /// Taken out while the callback runs
    callback: Option<TimerCallback>,
}

struct SchedulerInner {
    now_ms: f64,
    next_seq: u64,
    timers: SlotMap<TimerId, Timer>,
    frames: SlotMap<FrameId, FrameCallback>,
    last_tick: Instant,
    frame_count: u64,
}

impl SchedulerInner {
    fn push_timer(
        &mut self,
        delay_ms: f64,
        period_ms: Option<f64>,
        callback: TimerCallback,
    ) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.insert(Timer {
            deadline_ms: self.now_ms + delay_ms,
            seq,
            period_ms,
            callback: Some(callback),
        })
    }

    /// Earliest runnable timer with a deadline at or before `until_ms`
    fn next_due(&self, until_ms: f64) -> Option<TimerId> {
        self.timers
            .iter()
            .filter(|(_, t)| t.callback.is_some() && t.deadline_ms <= until_ms)
            .min_by(|(_, a), (_, b)| {
                a.deadline_ms
                    .total_cmp(&b.deadline_ms)
                    .then(a.seq.cmp(&b.seq))
            })
            .map(|(id, _)| id)
    }
}

/// Owner of the virtual clock and all scheduled work
///
/// Dropping the scheduler invalidates every handle; later registrations
/// through a dead handle return `None` and do nothing.
pub struct Scheduler {
    inner: Arc<Mutex<SchedulerInner>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SchedulerInner {
                now_ms: 0.0,
                next_seq: 0,
                timers: SlotMap::with_key(),
                frames: SlotMap::with_key(),
                last_tick: Instant::now(),
                frame_count: 0,
            })),
        }
    }

    /// Get a handle to this scheduler for passing to effects
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Current virtual time in milliseconds
    pub fn now_ms(&self) -> f64 {
        lock(&self.inner).now_ms
    }

    /// Number of frames dispatched so far
    pub fn frame_count(&self) -> u64 {
        lock(&self.inner).frame_count
    }

    /// Advance the clock by `dt_ms` and dispatch one frame
    ///
    /// Timers fire in deadline order. A timer scheduled by a callback whose
    /// deadline falls inside this window fires within the same call, so
    /// chained timeouts complete deterministically however the window is
    /// sliced. Frame callbacks run once, after the timers, with `dt_ms`.
    pub fn advance(&self, dt_ms: f32) {
        let dt_ms = if dt_ms.is_finite() { dt_ms.max(0.0) } else { 0.0 };
        let until_ms = lock(&self.inner).now_ms + dt_ms as f64;

        self.run_timers_until(until_ms);

        {
            let mut inner = lock(&self.inner);
            inner.now_ms = until_ms;
            inner.frame_count += 1;
        }

        self.run_frames(dt_ms);
    }

    /// Advance by the wall-clock time elapsed since the previous tick
    ///
    /// Returns true if any work is still pending.
    pub fn tick(&self) -> bool {
        let dt_ms = {
            let mut inner = lock(&self.inner);
            let now = Instant::now();
            let dt = (now - inner.last_tick).as_secs_f32() * 1000.0;
            inner.last_tick = now;
            dt
        };
        self.advance(dt_ms);
        self.pending_work() > 0
    }

    fn run_timers_until(&self, until_ms: f64) {
        loop {
            let (id, mut callback, repeating) = {
                let mut inner = lock(&self.inner);
                let Some(id) = inner.next_due(until_ms) else {
                    break;
                };
                let seq = inner.next_seq;
                let timer = &mut inner.timers[id];
                let deadline = timer.deadline_ms;
                let callback = timer.callback.take();
                let repeating = match timer.period_ms {
                    Some(period) => {
                        timer.deadline_ms += period;
                        timer.seq = seq;
                        true
                    }
                    None => false,
                };
                if repeating {
                    inner.next_seq += 1;
                } else {
                    inner.timers.remove(id);
                }
                inner.now_ms = inner.now_ms.max(deadline);
                match callback {
                    Some(callback) => (id, callback, repeating),
                    None => continue,
                }
            };

            callback();

            if repeating {
                // Put the callback back unless the interval was cleared while it ran
                if let Some(timer) = lock(&self.inner).timers.get_mut(id) {
                    timer.callback = Some(callback);
                }
            }
        }
    }

    fn run_frames(&self, dt_ms: f32) {
        let frames: SmallVec<[(FrameId, FrameCallback); 8]> = lock(&self.inner)
            .frames
            .iter()
            .map(|(id, cb)| (id, Arc::clone(cb)))
            .collect();

        for (id, callback) in frames {
            // Skip callbacks cancelled earlier in this frame
            if !lock(&self.inner).frames.contains_key(id) {
                continue;
            }
            let mut callback = lock(&callback);
            (*callback)(dt_ms);
        }
    }

    /// Number of pending timers (timeouts and intervals)
    pub fn timer_count(&self) -> usize {
        lock(&self.inner).timers.len()
    }

    /// Number of registered frame callbacks
    pub fn frame_callback_count(&self) -> usize {
        lock(&self.inner).frames.len()
    }

    /// Total live registrations; zero means nothing will ever fire again
    pub fn pending_work(&self) -> usize {
        let inner = lock(&self.inner);
        inner.timers.len() + inner.frames.len()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let inner = lock(&self.inner);
        if !inner.timers.is_empty() || !inner.frames.is_empty() {
            tracing::debug!(
                "Scheduler dropped with {} timers and {} frame callbacks pending",
                inner.timers.len(),
                inner.frames.len()
            );
        }
    }
}

/// A weak handle to the scheduler
///
/// This is passed to effects that need to schedule work. It won't prevent
/// the scheduler from being dropped; operations on a dead handle are no-ops.
#[derive(Clone)]
pub struct SchedulerHandle {
    inner: Weak<Mutex<SchedulerInner>>,
}

impl SchedulerHandle {
    // =========================================================================
    // Timers
    // =========================================================================

    /// Run `callback` once, `delay_ms` from now
    pub fn set_timeout<F>(&self, delay_ms: u32, callback: F) -> Option<TimerId>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut callback = Some(callback);
        let boxed: TimerCallback = Box::new(move || {
            if let Some(callback) = callback.take() {
                callback();
            }
        });
        self.inner
            .upgrade()
            .map(|inner| lock(&inner).push_timer(delay_ms as f64, None, boxed))
    }

    /// Run `callback` every `period_ms` until cleared
    ///
    /// A zero period is treated as one millisecond.
    pub fn set_interval<F>(&self, period_ms: u32, callback: F) -> Option<TimerId>
    where
        F: FnMut() + Send + 'static,
    {
        let period = period_ms.max(1) as f64;
        self.inner
            .upgrade()
            .map(|inner| lock(&inner).push_timer(period, Some(period), Box::new(callback)))
    }

    /// Revoke a timeout or interval; returns whether it was still pending
    pub fn clear_timer(&self, id: TimerId) -> bool {
        self.inner
            .upgrade()
            .map(|inner| lock(&inner).timers.remove(id).is_some())
            .unwrap_or(false)
    }

    /// Check if a timer is still pending
    pub fn has_timer(&self, id: TimerId) -> bool {
        self.inner
            .upgrade()
            .map(|inner| lock(&inner).timers.contains_key(id))
            .unwrap_or(false)
    }

    // =========================================================================
    // Frames
    // =========================================================================

    /// Run `callback` on every frame with the frame delta in milliseconds
    pub fn on_frame<F>(&self, callback: F) -> Option<FrameId>
    where
        F: FnMut(f32) + Send + 'static,
    {
        let callback: FrameCallback = Arc::new(Mutex::new(callback));
        self.inner
            .upgrade()
            .map(|inner| lock(&inner).frames.insert(callback))
    }

    /// Remove a frame callback; returns whether it was registered
    pub fn cancel_frame(&self, id: FrameId) -> bool {
        self.inner
            .upgrade()
            .map(|inner| lock(&inner).frames.remove(id).is_some())
            .unwrap_or(false)
    }

    /// Register a frame callback that is removed when the guard drops
    pub fn frame_subscription<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(f32) + Send + 'static,
    {
        match self.on_frame(callback) {
            Some(id) => {
                let handle = self.clone();
                Subscription::new(move || {
                    handle.cancel_frame(id);
                })
            }
            None => Subscription::empty(),
        }
    }

    // =========================================================================
    // Clock
    // =========================================================================

    /// Current virtual time, or `None` if the scheduler is gone
    pub fn now_ms(&self) -> Option<f64> {
        self.inner.upgrade().map(|inner| lock(&inner).now_ms)
    }

    /// Check if the scheduler is still alive
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}
