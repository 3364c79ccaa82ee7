//! Pointer-driven spring displacement
//!
//! [`PointerOffsetTracker`] pulls an element toward the pointer while the
//! pointer hovers it (the "magnetic button"). [`CursorFollower`] trails the
//! pointer across the whole viewport.
//!
//! Both register one listener with an injected [`PointerInput`] and drive a
//! [`SpringValue`]; dropping them releases the listener and any frame
//! callback still stepping the spring.

use crate::animated::SpringValue;
use crate::spring::{Spring2D, SpringConfig};
use refraction_core::{
    ConfigError, Point, PointerEvent, PointerInput, Rect, Result, SchedulerHandle, Subscription,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Fraction of the pointer's distance from center applied as displacement
pub const DEFAULT_PULL_FACTOR: f32 = 0.3;

/// Offset subtracted from the pointer so a 384px glow stays centered on it
pub const DEFAULT_CURSOR_OFFSET: Point = Point { x: 192.0, y: 192.0 };

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Magnetic offset
// ============================================================================

struct TrackerState {
    region: Rect,
    factor: f32,
    hovering: bool,
    last_pointer: Option<Point>,
}

impl TrackerState {
    /// Spring target for the current pointer and region
    fn target(&mut self) -> (f32, f32) {
        match self.last_pointer {
            Some(p) if self.region.contains(p) => {
                self.hovering = true;
                let center = self.region.center();
                (
                    (p.x - center.x) * self.factor,
                    (p.y - center.y) * self.factor,
                )
            }
            _ => {
                self.hovering = false;
                (0.0, 0.0)
            }
        }
    }
}

/// Displaces an element toward the pointer while it hovers the element
pub struct PointerOffsetTracker {
    state: Arc<Mutex<TrackerState>>,
    spring: SpringValue<Spring2D>,
    _listener: Subscription,
}

impl PointerOffsetTracker {
    /// Track `region` with the default pull factor and the magnetic spring
    pub fn new(handle: &SchedulerHandle, input: &dyn PointerInput, region: Rect) -> Self {
        Self::build(
            handle,
            input,
            region,
            DEFAULT_PULL_FACTOR,
            SpringConfig::magnetic(),
        )
    }

    /// Track `region` with a custom pull factor in `(0, 1]` and spring
    pub fn with_factor(
        handle: &SchedulerHandle,
        input: &dyn PointerInput,
        region: Rect,
        factor: f32,
        config: SpringConfig,
    ) -> Result<Self> {
        if !factor.is_finite() || factor <= 0.0 || factor > 1.0 {
            return Err(ConfigError::InvalidPullFactor(factor));
        }
        Ok(Self::build(handle, input, region, factor, config))
    }

    fn build(
        handle: &SchedulerHandle,
        input: &dyn PointerInput,
        region: Rect,
        factor: f32,
        config: SpringConfig,
    ) -> Self {
        let mut initial = TrackerState {
            region,
            factor,
            hovering: false,
            last_pointer: input.position(),
        };
        let start = initial.target();

        let state = Arc::new(Mutex::new(initial));
        let spring = SpringValue::new(handle.clone(), Spring2D::new(config, start));

        let listener_state = Arc::clone(&state);
        let weak = spring.downgrade();
        let listener = input.subscribe(Box::new(move |event| {
            let target = {
                let mut state = lock(&listener_state);
                state.last_pointer = match event {
                    PointerEvent::Move(p) => Some(*p),
                    PointerEvent::Leave => None,
                };
                state.target()
            };
            weak.set_target(target);
        }));

        Self {
            state,
            spring,
            _listener: listener,
        }
    }

    /// Move or resize the tracked region (e.g. after layout)
    pub fn set_region(&self, region: Rect) {
        let target = {
            let mut state = lock(&self.state);
            state.region = region;
            state.target()
        };
        self.spring.set_target(target);
    }

    pub fn region(&self) -> Rect {
        lock(&self.state).region
    }

    /// Current displacement from the element's resting position
    pub fn offset(&self) -> (f32, f32) {
        self.spring.with(|s| s.position())
    }

    pub fn velocity(&self) -> (f32, f32) {
        self.spring.with(|s| s.velocity())
    }

    /// Displacement the spring is heading toward
    pub fn target(&self) -> (f32, f32) {
        self.spring.with(|s| s.target())
    }

    pub fn is_hovering(&self) -> bool {
        lock(&self.state).hovering
    }

    pub fn is_animating(&self) -> bool {
        self.spring.is_animating()
    }
}

// ============================================================================
// Cursor follower
// ============================================================================

/// A spring trailing the absolute pointer position
pub struct CursorFollower {
    spring: SpringValue<Spring2D>,
    offset: Point,
    _listener: Subscription,
}

impl CursorFollower {
    pub fn new(handle: &SchedulerHandle, input: &dyn PointerInput) -> Self {
        Self::with_offset(handle, input, DEFAULT_CURSOR_OFFSET, SpringConfig::cursor())
    }

    pub fn with_offset(
        handle: &SchedulerHandle,
        input: &dyn PointerInput,
        offset: Point,
        config: SpringConfig,
    ) -> Self {
        let start = input.position().unwrap_or(Point::ZERO);
        let spring = SpringValue::new(
            handle.clone(),
            Spring2D::new(config, (start.x - offset.x, start.y - offset.y)),
        );

        // Leaving the viewport keeps the last target; the glow rests where
        // the pointer was last seen.
        let weak = spring.downgrade();
        let listener = input.subscribe(Box::new(move |event| {
            if let PointerEvent::Move(p) = event {
                weak.set_target((p.x - offset.x, p.y - offset.y));
            }
        }));

        Self {
            spring,
            offset,
            _listener: listener,
        }
    }

    /// Current top-left position of the follower
    pub fn position(&self) -> (f32, f32) {
        self.spring.with(|s| s.position())
    }

    pub fn velocity(&self) -> (f32, f32) {
        self.spring.with(|s| s.velocity())
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn is_animating(&self) -> bool {
        self.spring.is_animating()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refraction_core::{ManualPointer, Scheduler};

    const FRAME_MS: f32 = 1000.0 / 60.0;

    fn run_frames(scheduler: &Scheduler, frames: usize) {
        for _ in 0..frames {
            scheduler.advance(FRAME_MS);
        }
    }

    fn button() -> Rect {
        Rect::new(100.0, 100.0, 200.0, 60.0)
    }

    #[test]
    fn test_pull_toward_pointer() {
        let scheduler = Scheduler::new();
        let pointer = ManualPointer::new();
        let tracker = PointerOffsetTracker::new(&scheduler.handle(), &pointer, button());

        assert_eq!(tracker.offset(), (0.0, 0.0));
        assert!(!tracker.is_hovering());

        // Center is (200, 130)
        pointer.move_to(280.0, 150.0);
        assert!(tracker.is_hovering());
        let (tx, ty) = tracker.target();
        assert!((tx - 24.0).abs() < 1e-4);
        assert!((ty - 6.0).abs() < 1e-4);

        run_frames(&scheduler, 300);
        assert_eq!(tracker.offset(), tracker.target());
        assert!(!tracker.is_animating());
    }

    #[test]
    fn test_outside_region_does_not_pull() {
        let scheduler = Scheduler::new();
        let pointer = ManualPointer::new();
        let tracker = PointerOffsetTracker::new(&scheduler.handle(), &pointer, button());

        pointer.move_to(10.0, 10.0);
        assert!(!tracker.is_hovering());
        assert_eq!(tracker.target(), (0.0, 0.0));
        assert_eq!(scheduler.pending_work(), 0);
    }

    #[test]
    fn test_leave_resets_to_rest() {
        let scheduler = Scheduler::new();
        let pointer = ManualPointer::new();
        let tracker = PointerOffsetTracker::new(&scheduler.handle(), &pointer, button());

        pointer.move_to(120.0, 110.0);
        run_frames(&scheduler, 10);
        assert_ne!(tracker.offset(), (0.0, 0.0));

        // Moving off the button
        pointer.move_to(500.0, 500.0);
        assert!(!tracker.is_hovering());
        assert_eq!(tracker.target(), (0.0, 0.0));

        pointer.move_to(120.0, 110.0);
        // Leaving the window entirely
        pointer.leave();
        assert_eq!(tracker.target(), (0.0, 0.0));

        run_frames(&scheduler, 300);
        assert_eq!(tracker.offset(), (0.0, 0.0));
    }

    #[test]
    fn test_magnetic_spring_overshoots() {
        let scheduler = Scheduler::new();
        let pointer = ManualPointer::new();
        let tracker = PointerOffsetTracker::new(&scheduler.handle(), &pointer, button());

        pointer.move_to(300.0, 130.0); // dx = 100 * 0.3 = 30
        let mut peak: f32 = 0.0;
        for _ in 0..120 {
            scheduler.advance(FRAME_MS);
            peak = peak.max(tracker.offset().0);
        }
        assert!(peak > 30.0);
    }

    #[test]
    fn test_set_region_retargets() {
        let scheduler = Scheduler::new();
        let pointer = ManualPointer::new();
        let tracker = PointerOffsetTracker::new(&scheduler.handle(), &pointer, button());

        pointer.move_to(280.0, 150.0);
        assert!(tracker.is_hovering());

        tracker.set_region(Rect::new(600.0, 600.0, 50.0, 50.0));
        assert!(!tracker.is_hovering());
        assert_eq!(tracker.target(), (0.0, 0.0));
        assert_eq!(tracker.region(), Rect::new(600.0, 600.0, 50.0, 50.0));
    }

    #[test]
    fn test_invalid_factor() {
        let scheduler = Scheduler::new();
        let pointer = ManualPointer::new();
        for factor in [0.0, -0.5, 1.5, f32::NAN] {
            let result = PointerOffsetTracker::with_factor(
                &scheduler.handle(),
                &pointer,
                button(),
                factor,
                SpringConfig::magnetic(),
            );
            assert!(matches!(result, Err(ConfigError::InvalidPullFactor(_))));
        }
        assert!(PointerOffsetTracker::with_factor(
            &scheduler.handle(),
            &pointer,
            button(),
            1.0,
            SpringConfig::magnetic(),
        )
        .is_ok());
    }

    #[test]
    fn test_cursor_follower_trails_pointer() {
        let scheduler = Scheduler::new();
        let pointer = ManualPointer::new();
        let follower = CursorFollower::new(&scheduler.handle(), &pointer);

        assert_eq!(follower.position(), (-192.0, -192.0));

        pointer.move_to(400.0, 300.0);
        run_frames(&scheduler, 30);
        let (x, _) = follower.position();
        assert!(x > -192.0 && x < 208.0);

        // Leaving keeps heading to the last seen position
        pointer.leave();
        run_frames(&scheduler, 900);
        assert_eq!(follower.position(), (208.0, 108.0));
        assert_eq!(scheduler.pending_work(), 0);
    }

    #[test]
    fn test_cursor_follower_settles_at_screen_coordinates() {
        let scheduler = Scheduler::new();
        let pointer = ManualPointer::new();
        let follower = CursorFollower::new(&scheduler.handle(), &pointer);

        pointer.move_to(1400.0, 900.0);
        run_frames(&scheduler, 1200);

        assert_eq!(follower.position(), (1208.0, 708.0));
        assert_eq!(follower.velocity(), (0.0, 0.0));
        assert!(!follower.is_animating());
        assert_eq!(scheduler.pending_work(), 0);
    }

    #[test]
    fn test_teardown_releases_listener_and_frame() {
        let scheduler = Scheduler::new();
        let pointer = ManualPointer::new();
        let tracker = PointerOffsetTracker::new(&scheduler.handle(), &pointer, button());
        let follower = CursorFollower::new(&scheduler.handle(), &pointer);

        pointer.move_to(150.0, 120.0);
        scheduler.advance(FRAME_MS);
        assert_eq!(pointer.listener_count(), 2);
        assert_eq!(scheduler.frame_callback_count(), 2);

        drop(tracker);
        drop(follower);

        assert_eq!(pointer.listener_count(), 0);
        assert_eq!(scheduler.pending_work(), 0);

        // Later events reach nobody
        pointer.move_to(10.0, 10.0);
        assert_eq!(scheduler.pending_work(), 0);
    }
}
