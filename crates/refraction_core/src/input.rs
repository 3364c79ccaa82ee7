//! Input sources
//!
//! Pointer and scroll position are process-wide ambient signals. Effects
//! never read them from global state; they depend on the [`PointerInput`]
//! and [`ScrollInput`] capabilities instead, and observe them read-only.
//! [`ManualPointer`] and [`ManualScroll`] are driven explicitly, for tests
//! and for hosts that forward platform events themselves.

use crate::subscription::{lock, Listeners, Subscription};
use std::sync::Mutex;

/// A point in viewport coordinates (pixels)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in viewport coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Inclusive hit test
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

/// A change of the global pointer
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    /// Pointer moved to an absolute viewport position
    Move(Point),
    /// Pointer left the viewport entirely
    Leave,
}

/// Read-only access to the global pointer
pub trait PointerInput: Send + Sync {
    /// Last known pointer position, `None` when outside the viewport
    fn position(&self) -> Option<Point>;

    /// Observe pointer events until the subscription is dropped
    fn subscribe(&self, listener: Box<dyn Fn(&PointerEvent) + Send + Sync>) -> Subscription;
}

/// Scroll geometry of one scrollable region (or the document)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollMetrics {
    /// Distance scrolled from the top
    pub offset: f32,
    /// Visible height
    pub viewport: f32,
    /// Total content height
    pub content: f32,
}

impl ScrollMetrics {
    pub fn new(offset: f32, viewport: f32, content: f32) -> Self {
        Self {
            offset,
            viewport,
            content,
        }
    }

    /// Largest reachable offset
    pub fn max_offset(&self) -> f32 {
        (self.content - self.viewport).max(0.0)
    }
}

/// Read-only access to a scroll position
pub trait ScrollInput: Send + Sync {
    fn metrics(&self) -> ScrollMetrics;

    /// Observe raw scroll events until the subscription is dropped
    fn subscribe(&self, listener: Box<dyn Fn(&ScrollMetrics) + Send + Sync>) -> Subscription;
}

// ============================================================================
// Manual sources
// ============================================================================

/// A pointer driven by explicit calls
#[derive(Default)]
pub struct ManualPointer {
    position: Mutex<Option<Point>>,
    listeners: Listeners<PointerEvent>,
}

impl ManualPointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&self, x: f32, y: f32) {
        let p = Point::new(x, y);
        *lock(&self.position) = Some(p);
        self.listeners.emit(&PointerEvent::Move(p));
    }

    pub fn leave(&self) {
        *lock(&self.position) = None;
        self.listeners.emit(&PointerEvent::Leave);
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl PointerInput for ManualPointer {
    fn position(&self) -> Option<Point> {
        *lock(&self.position)
    }

    fn subscribe(&self, listener: Box<dyn Fn(&PointerEvent) + Send + Sync>) -> Subscription {
        self.listeners.subscribe(listener)
    }
}

/// A scroll position driven by explicit calls
pub struct ManualScroll {
    metrics: Mutex<ScrollMetrics>,
    listeners: Listeners<ScrollMetrics>,
}

impl ManualScroll {
    pub fn new(viewport: f32, content: f32) -> Self {
        Self {
            metrics: Mutex::new(ScrollMetrics::new(0.0, viewport, content)),
            listeners: Listeners::new(),
        }
    }

    /// Scroll to `offset`, clamped to the scrollable range
    pub fn scroll_to(&self, offset: f32) {
        let metrics = {
            let mut metrics = lock(&self.metrics);
            metrics.offset = offset.clamp(0.0, metrics.max_offset());
            *metrics
        };
        self.listeners.emit(&metrics);
    }

    pub fn scroll_by(&self, delta: f32) {
        let offset = lock(&self.metrics).offset;
        self.scroll_to(offset + delta);
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl ScrollInput for ManualScroll {
    fn metrics(&self) -> ScrollMetrics {
        *lock(&self.metrics)
    }

    fn subscribe(&self, listener: Box<dyn Fn(&ScrollMetrics) + Send + Sync>) -> Subscription {
        self.listeners.subscribe(listener)
    }
}
