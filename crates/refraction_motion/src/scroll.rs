//! Scroll-linked progress and transforms
//!
//! A [`ScrollProgressSource`] turns a [`ScrollInput`] into a normalized
//! `[0, 1]` progress for one region. Raw scroll events only record the latest
//! metrics; the progress is recomputed at most once per frame and published
//! only when it moved by more than a tolerance.
//!
//! A [`ScrollTransform`] smooths that progress through an optional spring and
//! maps it through named [`Breakpoints`] into presentational values.
//!
//! ```rust
//! use refraction_core::{ManualScroll, Scheduler};
//! use refraction_motion::scroll::{ScrollProgressSource, ScrollRegion, ScrollTransform};
//! use std::sync::Arc;
//!
//! let scheduler = Scheduler::new();
//! let page = Arc::new(ManualScroll::new(800.0, 4800.0));
//! let source = ScrollProgressSource::new(&scheduler.handle(), page.as_ref(), ScrollRegion::Document);
//! let nav = ScrollTransform::nav_backdrop(&scheduler.handle(), &source);
//!
//! page.scroll_to(200.0); // 5% of the page
//! scheduler.advance(16.0);
//!
//! assert!((source.progress() - 0.05).abs() < 1e-6);
//! assert!((nav.value("opacity").unwrap() - 0.5).abs() < 1e-5);
//! ```

use crate::animated::SpringValue;
use crate::interpolate::Breakpoints;
use crate::spring::{Spring, SpringConfig};
use refraction_core::{
    ConfigError, Listeners, Result, ScrollInput, ScrollMetrics, SchedulerHandle, Subscription,
};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default change below which progress is not republished
pub const DEFAULT_TOLERANCE: f32 = 1e-4;

// ============================================================================
// Anchors
// ============================================================================

/// A position along an element or the viewport
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Edge {
    Start,
    Center,
    End,
    /// Fraction from the start (0.0) to the end (1.0), clamped to that range
    At(f32),
}

impl Edge {
    fn fraction(self) -> f32 {
        match self {
            Edge::Start => 0.0,
            Edge::Center => 0.5,
            Edge::End => 1.0,
            Edge::At(f) if f.is_nan() => 0.0,
            Edge::At(f) => f.clamp(0.0, 1.0),
        }
    }
}

/// "This edge of the element meets that edge of the viewport"
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Anchor {
    pub element: Edge,
    pub viewport: Edge,
}

impl Anchor {
    pub const fn new(element: Edge, viewport: Edge) -> Self {
        Self { element, viewport }
    }

    /// Element top reaches the viewport bottom
    pub const fn enters() -> Self {
        Self::new(Edge::Start, Edge::End)
    }

    /// Element bottom reaches the viewport top
    pub const fn exits() -> Self {
        Self::new(Edge::End, Edge::Start)
    }

    /// Scroll offset at which this anchor is met
    fn offset(&self, top: f32, height: f32, viewport: f32) -> f32 {
        top + self.element.fraction() * height - self.viewport.fraction() * viewport
    }
}

/// The two anchor events bounding a region's traversal
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollAnchors {
    pub start: Anchor,
    pub end: Anchor,
}

impl Default for ScrollAnchors {
    fn default() -> Self {
        Self {
            start: Anchor::enters(),
            end: Anchor::exits(),
        }
    }
}

/// What a progress source observes
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScrollRegion {
    /// The whole scrollable content, from top to the last reachable offset
    Document,
    /// An element at `top` (content coordinates) with `height`
    Element {
        top: f32,
        height: f32,
        anchors: ScrollAnchors,
    },
}

impl ScrollRegion {
    /// Element region traversed from entering to exiting the viewport
    pub fn element(top: f32, height: f32) -> Self {
        ScrollRegion::Element {
            top,
            height,
            anchors: ScrollAnchors::default(),
        }
    }

    /// Normalized traversal for the given scroll metrics
    ///
    /// Coincident anchors act as a step: 1 once the offset reaches them.
    /// Inverted anchors (end before start) map linearly in reverse, so
    /// progress falls from 1 to 0 between the end and start offsets.
    pub fn progress(&self, metrics: &ScrollMetrics) -> f32 {
        let (start, end) = match *self {
            ScrollRegion::Document => {
                let max = metrics.max_offset();
                // A page that fits its viewport never scrolls
                if max <= 0.0 {
                    return 0.0;
                }
                (0.0, max)
            }
            ScrollRegion::Element {
                top,
                height,
                anchors,
            } => (
                anchors.start.offset(top, height, metrics.viewport),
                anchors.end.offset(top, height, metrics.viewport),
            ),
        };

        let span = end - start;
        if span.abs() <= f32::EPSILON {
            return if metrics.offset >= end { 1.0 } else { 0.0 };
        }

        ((metrics.offset - start) / span).clamp(0.0, 1.0)
    }
}

// ============================================================================
// Progress source
// ============================================================================

struct SourceState {
    latest: ScrollMetrics,
    dirty: bool,
    progress: f32,
    publications: u64,
}

struct SourceInner {
    state: Arc<Mutex<SourceState>>,
    listeners: Listeners<f32>,
    _input: Subscription,
    _frame: Subscription,
}

/// Normalized scroll progress for one region, updated once per frame
///
/// Clones share the same source; the input listener and frame callback are
/// released when the last clone drops.
#[derive(Clone)]
pub struct ScrollProgressSource {
    inner: Arc<SourceInner>,
}

impl ScrollProgressSource {
    pub fn new(handle: &SchedulerHandle, input: &dyn ScrollInput, region: ScrollRegion) -> Self {
        Self::build(handle, input, region, DEFAULT_TOLERANCE)
    }

    /// Use a custom republish tolerance
    pub fn with_tolerance(
        handle: &SchedulerHandle,
        input: &dyn ScrollInput,
        region: ScrollRegion,
        tolerance: f32,
    ) -> Result<Self> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ConfigError::InvalidTolerance(tolerance));
        }
        Ok(Self::build(handle, input, region, tolerance))
    }

    fn build(
        handle: &SchedulerHandle,
        input: &dyn ScrollInput,
        region: ScrollRegion,
        tolerance: f32,
    ) -> Self {
        let initial = input.metrics();
        let state = Arc::new(Mutex::new(SourceState {
            latest: initial,
            dirty: false,
            progress: region.progress(&initial),
            publications: 0,
        }));
        let listeners = Listeners::new();

        let input_state = Arc::clone(&state);
        let input_sub = input.subscribe(Box::new(move |metrics| {
            let mut state = lock(&input_state);
            state.latest = *metrics;
            state.dirty = true;
        }));

        let frame_state = Arc::clone(&state);
        let frame_listeners = listeners.clone();
        let frame_sub = handle.frame_subscription(move |_dt| {
            let published = {
                let mut state = lock(&frame_state);
                if !state.dirty {
                    return;
                }
                state.dirty = false;

                let next = region.progress(&state.latest);
                let delta = (next - state.progress).abs();
                let reached_end = next != state.progress && (next == 0.0 || next == 1.0);
                if delta > tolerance || reached_end {
                    state.progress = next;
                    state.publications += 1;
                    Some(next)
                } else {
                    None
                }
            };

            if let Some(progress) = published {
                frame_listeners.emit(&progress);
            }
        });

        Self {
            inner: Arc::new(SourceInner {
                state,
                listeners,
                _input: input_sub,
                _frame: frame_sub,
            }),
        }
    }

    /// Last published progress
    pub fn progress(&self) -> f32 {
        lock(&self.inner.state).progress
    }

    /// Number of times a new progress was published
    pub fn publications(&self) -> u64 {
        lock(&self.inner.state).publications
    }

    /// Observe published progress values
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&f32) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(listener)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Transforms
// ============================================================================

/// Hero content drifts up as the page scrolls
pub fn hero_offset_y() -> Breakpoints {
    Breakpoints::from_sorted(vec![(0.0, 0.0), (0.2, -100.0)])
}

/// Hero content fades out early
pub fn hero_opacity() -> Breakpoints {
    Breakpoints::from_sorted(vec![(0.0, 1.0), (0.15, 0.0)])
}

/// Hero content shrinks slightly
pub fn hero_scale() -> Breakpoints {
    Breakpoints::from_sorted(vec![(0.0, 1.0), (0.2, 0.95)])
}

/// Navigation backdrop fades in over the first tenth of the page
pub fn nav_backdrop_opacity() -> Breakpoints {
    Breakpoints::from_sorted(vec![(0.0, 0.0), (0.1, 1.0)])
}

/// Values handed to the presentation layer
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScrollSnapshot {
    pub progress: f32,
    pub derived: FxHashMap<String, f32>,
}

/// Progress (optionally spring-smoothed) mapped into named values
pub struct ScrollTransform {
    source: ScrollProgressSource,
    smoothing: Option<SpringValue<Spring>>,
    maps: Vec<(String, Breakpoints)>,
    _link: Option<Subscription>,
}

impl ScrollTransform {
    /// Follow `source` directly, or through a spring when `smoothing` is set
    pub fn new(
        handle: &SchedulerHandle,
        source: &ScrollProgressSource,
        smoothing: Option<SpringConfig>,
    ) -> Self {
        let smoothing = smoothing.map(|config| {
            SpringValue::new(handle.clone(), Spring::new(config, source.progress()))
        });
        let link = smoothing.as_ref().map(|spring| {
            let weak = spring.downgrade();
            source.subscribe(move |progress| {
                weak.set_target(*progress);
            })
        });

        Self {
            source: source.clone(),
            smoothing,
            maps: Vec::new(),
            _link: link,
        }
    }

    /// Add a named breakpoint map
    pub fn map(mut self, name: impl Into<String>, breakpoints: Breakpoints) -> Self {
        self.maps.push((name.into(), breakpoints));
        self
    }

    /// The hero section: smoothed drift, fade and shrink
    pub fn hero(handle: &SchedulerHandle, source: &ScrollProgressSource) -> Self {
        Self::new(handle, source, Some(SpringConfig::scroll_smoothing()))
            .map("offset_y", hero_offset_y())
            .map("opacity", hero_opacity())
            .map("scale", hero_scale())
    }

    /// The navigation backdrop, tied directly to raw progress
    pub fn nav_backdrop(handle: &SchedulerHandle, source: &ScrollProgressSource) -> Self {
        Self::new(handle, source, None).map("opacity", nav_backdrop_opacity())
    }

    /// Unsmoothed progress of the underlying source
    pub fn raw_progress(&self) -> f32 {
        self.source.progress()
    }

    /// Progress driving the maps (smoothed if a spring is attached)
    pub fn progress(&self) -> f32 {
        match &self.smoothing {
            Some(spring) => spring.with(|s| s.value()),
            None => self.source.progress(),
        }
    }

    /// Sample one named map at the current progress
    pub fn value(&self, name: &str) -> Option<f32> {
        let progress = self.progress();
        self.maps
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, bp)| bp.sample(progress))
    }

    pub fn snapshot(&self) -> ScrollSnapshot {
        let progress = self.progress();
        ScrollSnapshot {
            progress,
            derived: self
                .maps
                .iter()
                .map(|(name, bp)| (name.clone(), bp.sample(progress)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refraction_core::{ManualScroll, Scheduler};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FRAME_MS: f32 = 1000.0 / 60.0;

    #[test]
    fn test_document_progress() {
        let region = ScrollRegion::Document;
        assert_eq!(region.progress(&ScrollMetrics::new(0.0, 800.0, 1800.0)), 0.0);
        assert_eq!(region.progress(&ScrollMetrics::new(500.0, 800.0, 1800.0)), 0.5);
        assert_eq!(region.progress(&ScrollMetrics::new(1000.0, 800.0, 1800.0)), 1.0);
        // Nothing to scroll
        assert_eq!(region.progress(&ScrollMetrics::new(0.0, 800.0, 400.0)), 0.0);
    }

    #[test]
    fn test_element_progress_enter_to_exit() {
        // Element at 1000..1200 in a 600px viewport: enters at offset 400, exits at 1200
        let region = ScrollRegion::element(1000.0, 200.0);
        let at = |offset| region.progress(&ScrollMetrics::new(offset, 600.0, 5000.0));

        assert_eq!(at(0.0), 0.0);
        assert_eq!(at(400.0), 0.0);
        assert_eq!(at(800.0), 0.5);
        assert_eq!(at(1200.0), 1.0);
        assert_eq!(at(3000.0), 1.0);
    }

    #[test]
    fn test_custom_anchors() {
        // From element top at viewport top until element bottom at viewport bottom
        let region = ScrollRegion::Element {
            top: 1000.0,
            height: 1000.0,
            anchors: ScrollAnchors {
                start: Anchor::new(Edge::Start, Edge::Start),
                end: Anchor::new(Edge::End, Edge::End),
            },
        };
        let at = |offset| region.progress(&ScrollMetrics::new(offset, 600.0, 5000.0));
        assert_eq!(at(1000.0), 0.0);
        assert_eq!(at(1200.0), 0.5);
        assert_eq!(at(1400.0), 1.0);
    }

    #[test]
    fn test_coincident_anchors_step_at_their_offset() {
        // Element top meets viewport top at both anchors: a step at offset 0
        let region = ScrollRegion::Element {
            top: 0.0,
            height: 300.0,
            anchors: ScrollAnchors {
                start: Anchor::new(Edge::Start, Edge::Start),
                end: Anchor::new(Edge::Start, Edge::Start),
            },
        };
        let at = |offset| region.progress(&ScrollMetrics::new(offset, 600.0, 5000.0));
        assert_eq!(at(0.0), 1.0);
        assert_eq!(at(500.0), 1.0);

        // Same step further down the page
        let region = ScrollRegion::Element {
            top: 900.0,
            height: 300.0,
            anchors: ScrollAnchors {
                start: Anchor::new(Edge::Center, Edge::Center),
                end: Anchor::new(Edge::Center, Edge::Center),
            },
        };
        // Anchor offset: 900 + 150 - 300 = 750
        let at = |offset| region.progress(&ScrollMetrics::new(offset, 600.0, 5000.0));
        assert_eq!(at(749.0), 0.0);
        assert_eq!(at(750.0), 1.0);
        assert_eq!(at(2000.0), 1.0);
    }

    #[test]
    fn test_inverted_anchors_run_backwards() {
        // Element shorter than the viewport: its bottom meets the viewport
        // bottom (offset -300) before its top meets the viewport top (100)
        let region = ScrollRegion::Element {
            top: 100.0,
            height: 200.0,
            anchors: ScrollAnchors {
                start: Anchor::new(Edge::Start, Edge::Start),
                end: Anchor::new(Edge::End, Edge::End),
            },
        };
        let at = |offset| region.progress(&ScrollMetrics::new(offset, 600.0, 5000.0));
        assert_eq!(at(-300.0), 1.0);
        assert_eq!(at(-100.0), 0.5);
        assert_eq!(at(0.0), 0.25);
        assert_eq!(at(100.0), 0.0);
        assert_eq!(at(400.0), 0.0);
        assert_eq!(at(2000.0), 0.0);
    }

    #[test]
    fn test_fractional_edges_are_clamped() {
        let region = |start: Edge, end: Edge| ScrollRegion::Element {
            top: 1000.0,
            height: 1000.0,
            anchors: ScrollAnchors {
                start: Anchor::new(start, Edge::Start),
                end: Anchor::new(end, Edge::End),
            },
        };
        let clamped = region(Edge::At(f32::NAN), Edge::At(2.5));
        let exact = region(Edge::Start, Edge::End);
        for offset in [900.0, 1000.0, 1200.0, 1400.0, 1600.0] {
            let metrics = ScrollMetrics::new(offset, 600.0, 5000.0);
            assert_eq!(clamped.progress(&metrics), exact.progress(&metrics));
        }
    }

    #[test]
    fn test_source_coalesces_per_frame() {
        let scheduler = Scheduler::new();
        let page = ManualScroll::new(1000.0, 2000.0);
        let source =
            ScrollProgressSource::new(&scheduler.handle(), &page, ScrollRegion::Document);

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let _sub = source.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for offset in 1..=50 {
            page.scroll_to(offset as f32 * 10.0);
        }
        // No frame yet: nothing published
        assert_eq!(source.progress(), 0.0);
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        scheduler.advance(FRAME_MS);
        assert_eq!(source.progress(), 0.5);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(source.publications(), 1);

        // A quiet frame publishes nothing
        scheduler.advance(FRAME_MS);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_source_skips_changes_within_tolerance() {
        let scheduler = Scheduler::new();
        let page = ManualScroll::new(1000.0, 2000.0);
        let source = ScrollProgressSource::with_tolerance(
            &scheduler.handle(),
            &page,
            ScrollRegion::Document,
            0.01,
        )
        .unwrap();

        page.scroll_to(5.0); // 0.005
        scheduler.advance(FRAME_MS);
        assert_eq!(source.publications(), 0);

        page.scroll_to(20.0); // 0.02
        scheduler.advance(FRAME_MS);
        assert_eq!(source.publications(), 1);
        assert_eq!(source.progress(), 0.02);

        // Landing exactly on the end always publishes
        page.scroll_to(995.0);
        scheduler.advance(FRAME_MS);
        page.scroll_to(1000.0);
        scheduler.advance(FRAME_MS);
        assert_eq!(source.progress(), 1.0);
    }

    #[test]
    fn test_invalid_tolerance() {
        let scheduler = Scheduler::new();
        let page = ManualScroll::new(1000.0, 2000.0);
        let result = ScrollProgressSource::with_tolerance(
            &scheduler.handle(),
            &page,
            ScrollRegion::Document,
            -1.0,
        );
        assert!(matches!(result, Err(ConfigError::InvalidTolerance(_))));
    }

    #[test]
    fn test_hero_transform_is_smoothed() {
        let scheduler = Scheduler::new();
        let page = ManualScroll::new(1000.0, 11000.0);
        let source =
            ScrollProgressSource::new(&scheduler.handle(), &page, ScrollRegion::Document);
        let hero = ScrollTransform::hero(&scheduler.handle(), &source);

        let initial = hero.snapshot();
        assert_eq!(initial.progress, 0.0);
        assert_eq!(initial.derived["opacity"], 1.0);
        assert_eq!(initial.derived["scale"], 1.0);
        assert_eq!(initial.derived["offset_y"], 0.0);

        page.scroll_to(1000.0); // raw progress 0.1
        scheduler.advance(FRAME_MS);

        // Spring lags behind the raw value
        assert_eq!(hero.raw_progress(), 0.1);
        assert!(hero.progress() < 0.1);

        for _ in 0..300 {
            scheduler.advance(FRAME_MS);
        }

        assert!((hero.progress() - 0.1).abs() < 0.01);
        let settled = hero.snapshot();
        assert!((settled.derived["offset_y"] - -50.0).abs() < 0.5);
        assert!((settled.derived["scale"] - 0.975).abs() < 0.001);
    }

    #[test]
    fn test_teardown_releases_everything() {
        let scheduler = Scheduler::new();
        let page = ManualScroll::new(1000.0, 11000.0);
        let source =
            ScrollProgressSource::new(&scheduler.handle(), &page, ScrollRegion::Document);
        let hero = ScrollTransform::hero(&scheduler.handle(), &source);
        let nav = ScrollTransform::nav_backdrop(&scheduler.handle(), &source);

        page.scroll_to(3000.0);
        scheduler.advance(FRAME_MS);
        assert!(scheduler.pending_work() > 0);
        assert_eq!(page.listener_count(), 1);

        drop(hero);
        drop(nav);
        drop(source);

        assert_eq!(scheduler.pending_work(), 0);
        assert_eq!(page.listener_count(), 0);
    }
}
