//! Text scramble reveal
//!
//! Random glyphs resolve into a target string from left to right. Character
//! `i` of an `n`-character target is revealed once `elapsed / total > i / n`;
//! at `elapsed >= total` the display is exactly the target and stays there.
//!
//! Three forms share the same rule:
//!
//! - [`ScrambleState`]: the `(state, dt) -> state` core
//! - [`Scramble`]: a finite iterator of frames spaced `tick_ms` apart
//! - [`ScrambleText`]: a state driven by a scheduler interval
//!
//! ```rust
//! use rand::{rngs::StdRng, SeedableRng};
//! use refraction_motion::scramble::{Scramble, ScrambleConfig};
//!
//! let rng = StdRng::seed_from_u64(7);
//! let frames: Vec<String> = Scramble::with_rng("READY", ScrambleConfig::default(), rng).collect();
//!
//! assert_eq!(frames.len(), 26);
//! assert_eq!(frames.last().map(String::as_str), Some("READY"));
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use refraction_core::{ConfigError, Listeners, Result, SchedulerHandle, Subscription, TimerId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Glyphs shown before a character resolves
pub const DEFAULT_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*";

/// Milliseconds between scramble frames
pub const DEFAULT_TICK_MS: u32 = 40;

/// Time for the whole string to resolve
pub const DEFAULT_TOTAL_MS: u32 = 1000;

/// Timing and glyph set of a scramble
#[derive(Clone, Debug, PartialEq)]
pub struct ScrambleConfig {
    total_ms: u32,
    tick_ms: u32,
    alphabet: Vec<char>,
}

impl ScrambleConfig {
    pub fn new(total_ms: u32, tick_ms: u32, alphabet: &str) -> Result<Self> {
        if total_ms == 0 {
            return Err(ConfigError::ZeroScrambleDuration);
        }
        if tick_ms == 0 {
            return Err(ConfigError::ZeroScrambleTick);
        }
        let alphabet: Vec<char> = alphabet.chars().collect();
        if alphabet.is_empty() {
            return Err(ConfigError::EmptyAlphabet);
        }
        Ok(Self {
            total_ms,
            tick_ms,
            alphabet,
        })
    }

    pub fn total_ms(&self) -> u32 {
        self.total_ms
    }

    pub fn tick_ms(&self) -> u32 {
        self.tick_ms
    }

    pub fn alphabet(&self) -> &[char] {
        &self.alphabet
    }
}

impl Default for ScrambleConfig {
    fn default() -> Self {
        Self {
            total_ms: DEFAULT_TOTAL_MS,
            tick_ms: DEFAULT_TICK_MS,
            alphabet: DEFAULT_ALPHABET.chars().collect(),
        }
    }
}

// ============================================================================
// State
// ============================================================================

/// Progress of one scramble toward its target
pub struct ScrambleState<R: Rng = StdRng> {
    target: Vec<char>,
    config: ScrambleConfig,
    elapsed_ms: f64,
    source: String,
    display: String,
    rng: R,
}

impl ScrambleState<StdRng> {
    /// Scramble with an entropy-seeded generator
    pub fn new(target: &str, config: ScrambleConfig) -> Self {
        Self::with_rng(target, config, StdRng::from_entropy())
    }

    /// Scramble with a reproducible generator
    pub fn with_seed(target: &str, config: ScrambleConfig, seed: u64) -> Self {
        Self::with_rng(target, config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ScrambleState<R> {
    pub fn with_rng(target: &str, config: ScrambleConfig, rng: R) -> Self {
        let mut state = Self {
            target: target.chars().collect(),
            config,
            elapsed_ms: 0.0,
            source: String::new(),
            display: String::new(),
            rng,
        };
        state.source = state.frame_at(0.0);
        state.display = state.source.clone();
        state
    }

    /// Render the string as it looks `elapsed_ms` into the reveal
    ///
    /// Unrevealed characters draw fresh glyphs on every call.
    pub fn frame_at(&mut self, elapsed_ms: f64) -> String {
        let total = self.config.total_ms as f64;
        if elapsed_ms >= total {
            return self.target.iter().collect();
        }

        let progress = elapsed_ms.max(0.0) / total;
        let len = self.target.len() as f64;
        let alphabet = &self.config.alphabet;
        let rng = &mut self.rng;

        self.target
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                if c.is_whitespace() || progress > i as f64 / len {
                    c
                } else {
                    alphabet[rng.gen_range(0..alphabet.len())]
                }
            })
            .collect()
    }

    /// Advance by `dt_ms`; returns whether the display changed
    ///
    /// Once complete, further ticks leave the display on the target.
    pub fn tick(&mut self, dt_ms: f64) -> bool {
        if self.is_complete() {
            return false;
        }
        if dt_ms.is_finite() && dt_ms > 0.0 {
            self.elapsed_ms += dt_ms;
        }
        self.display = self.frame_at(self.elapsed_ms);
        true
    }

    /// Rewind to the start with a fresh initial frame
    pub fn reset(&mut self) {
        self.elapsed_ms = 0.0;
        self.source = self.frame_at(0.0);
        self.display = self.source.clone();
    }

    pub fn is_complete(&self) -> bool {
        self.target.is_empty() || self.elapsed_ms >= self.config.total_ms as f64
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    /// The first frame shown
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> String {
        self.target.iter().collect()
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn config(&self) -> &ScrambleConfig {
        &self.config
    }
}

// ============================================================================
// Iterator
// ============================================================================

/// Every frame of one scramble, `tick_ms` apart, ending with the target
///
/// Exhausted after the target is yielded; build a new one to replay.
pub struct Scramble<R: Rng = StdRng> {
    state: ScrambleState<R>,
    started: bool,
    finished: bool,
}

impl Scramble<StdRng> {
    pub fn new(target: &str, config: ScrambleConfig) -> Self {
        Self::from_state(ScrambleState::new(target, config))
    }
}

impl<R: Rng> Scramble<R> {
    pub fn with_rng(target: &str, config: ScrambleConfig, rng: R) -> Self {
        Self::from_state(ScrambleState::with_rng(target, config, rng))
    }

    /// Iterate the frames of an existing state from its current point
    pub fn from_state(state: ScrambleState<R>) -> Self {
        Self {
            state,
            started: false,
            finished: false,
        }
    }
}

impl<R: Rng> Iterator for Scramble<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.finished {
            return None;
        }
        if !self.started {
            self.started = true;
        } else {
            let tick = self.state.config.tick_ms as f64;
            self.state.tick(tick);
        }
        if self.state.is_complete() {
            self.finished = true;
        }
        Some(self.state.display.clone())
    }
}

// ============================================================================
// Scheduled text
// ============================================================================

struct TextInner<R: Rng> {
    state: ScrambleState<R>,
    timer: Option<TimerId>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A scramble stepped by a scheduler interval every `tick_ms`
///
/// The interval is revoked once the text resolves, on [`ScrambleText::restart`]
/// and on drop.
pub struct ScrambleText<R: Rng + Send + 'static = StdRng> {
    inner: Arc<Mutex<TextInner<R>>>,
    handle: SchedulerHandle,
    listeners: Listeners<String>,
}

impl ScrambleText<StdRng> {
    /// Start scrambling `target` right away
    pub fn new(handle: &SchedulerHandle, target: &str, config: ScrambleConfig) -> Self {
        Self::from_state(handle, ScrambleState::new(target, config))
    }
}

impl<R: Rng + Send + 'static> ScrambleText<R> {
    pub fn from_state(handle: &SchedulerHandle, state: ScrambleState<R>) -> Self {
        let text = Self {
            inner: Arc::new(Mutex::new(TextInner { state, timer: None })),
            handle: handle.clone(),
            listeners: Listeners::new(),
        };
        text.schedule();
        text
    }

    /// Scramble again from the beginning
    pub fn restart(&self) {
        {
            let mut inner = lock(&self.inner);
            if let Some(id) = inner.timer.take() {
                self.handle.clear_timer(id);
            }
            inner.state.reset();
        }
        self.schedule();
        self.listeners.emit(&self.display());
    }

    fn schedule(&self) {
        let mut inner = lock(&self.inner);
        if inner.state.is_complete() {
            return;
        }

        let tick_ms = inner.state.config.tick_ms;
        let weak = Arc::downgrade(&self.inner);
        let handle = self.handle.clone();
        let listeners = self.listeners.clone();
        inner.timer = self.handle.set_interval(tick_ms, move || {
            tick_text(&weak, &handle, &listeners, tick_ms);
        });
    }

    pub fn display(&self) -> String {
        lock(&self.inner).state.display.clone()
    }

    pub fn is_complete(&self) -> bool {
        lock(&self.inner).state.is_complete()
    }

    /// True while the interval is pending
    pub fn is_running(&self) -> bool {
        lock(&self.inner).timer.is_some()
    }

    /// Observe each new display string
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&String) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }
}

fn tick_text<R: Rng>(
    weak: &Weak<Mutex<TextInner<R>>>,
    handle: &SchedulerHandle,
    listeners: &Listeners<String>,
    tick_ms: u32,
) {
    let Some(inner) = weak.upgrade() else {
        return;
    };

    let (frame, finished) = {
        let mut inner = lock(&inner);
        if !inner.state.tick(tick_ms as f64) {
            return;
        }
        let finished = if inner.state.is_complete() {
            inner.timer.take()
        } else {
            None
        };
        (inner.state.display.clone(), finished)
    };

    if let Some(id) = finished {
        tracing::trace!("scramble resolved to {:?}", frame);
        handle.clear_timer(id);
    }
    listeners.emit(&frame);
}

impl<R: Rng + Send + 'static> Drop for ScrambleText<R> {
    fn drop(&mut self) {
        if let Some(id) = lock(&self.inner).timer.take() {
            self.handle.clear_timer(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refraction_core::Scheduler;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ready(seed: u64) -> ScrambleState {
        ScrambleState::with_seed("READY", ScrambleConfig::default(), seed)
    }

    #[test]
    fn test_ready_converges() {
        let mut state = ready(42);
        let alphabet = DEFAULT_ALPHABET;

        let start = state.frame_at(0.0);
        assert_eq!(start.chars().count(), 5);
        assert!(start.chars().all(|c| alphabet.contains(c)));

        assert_eq!(state.frame_at(1000.0), "READY");
        assert_eq!(state.frame_at(1000.0), "READY");
        assert_eq!(state.frame_at(5000.0), "READY");
    }

    #[test]
    fn test_reveals_left_to_right() {
        let mut state = ready(1);
        // 0.5 > 0/5, 1/5, 2/5
        let half = state.frame_at(500.0);
        assert!(half.starts_with("REA"));

        // 0.9 > 4/5
        let late = state.frame_at(900.0);
        assert_eq!(late, "READY");
    }

    #[test]
    fn test_tick_is_idempotent_after_completion() {
        let mut state = ready(3);
        assert!(!state.is_complete());

        assert!(state.tick(600.0));
        assert!(state.tick(600.0));
        assert!(state.is_complete());
        assert_eq!(state.display(), "READY");

        assert!(!state.tick(40.0));
        assert_eq!(state.display(), "READY");
        assert_eq!(state.elapsed_ms(), 1200.0);
    }

    #[test]
    fn test_whitespace_is_preserved() {
        let mut state = ScrambleState::with_seed("A B  C", ScrambleConfig::default(), 9);
        let frame = state.frame_at(0.0);
        let chars: Vec<char> = frame.chars().collect();
        assert_eq!(chars[1], ' ');
        assert_eq!(chars[3], ' ');
        assert_eq!(chars[4], ' ');
    }

    #[test]
    fn test_seeded_runs_match() {
        let a: Vec<String> =
            Scramble::with_rng("HYPERSPEED", ScrambleConfig::default(), StdRng::seed_from_u64(11))
                .collect();
        let b: Vec<String> =
            Scramble::with_rng("HYPERSPEED", ScrambleConfig::default(), StdRng::seed_from_u64(11))
                .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_iterator_is_finite() {
        let config = ScrambleConfig::new(100, 40, "#").unwrap();
        let frames: Vec<String> =
            Scramble::with_rng("OK", config, StdRng::seed_from_u64(0)).collect();

        // 0, 40, 80, 120 ms
        assert_eq!(frames, vec!["##", "O#", "OK", "OK"]);
    }

    #[test]
    fn test_empty_target_is_complete() {
        let frames: Vec<String> = Scramble::new("", ScrambleConfig::default()).collect();
        assert_eq!(frames, vec![String::new()]);
    }

    #[test]
    fn test_invalid_config() {
        assert_eq!(
            ScrambleConfig::new(0, 40, "AB"),
            Err(ConfigError::ZeroScrambleDuration)
        );
        assert_eq!(
            ScrambleConfig::new(1000, 0, "AB"),
            Err(ConfigError::ZeroScrambleTick)
        );
        assert_eq!(
            ScrambleConfig::new(1000, 40, ""),
            Err(ConfigError::EmptyAlphabet)
        );
    }

    #[test]
    fn test_scheduled_text_resolves_and_stops() {
        let scheduler = Scheduler::new();
        let text = ScrambleText::from_state(&scheduler.handle(), ready(5));

        let updates = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&updates);
        let _sub = text.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(text.is_running());
        scheduler.advance(960.0);
        assert!(!text.is_complete());

        scheduler.advance(40.0);
        assert!(text.is_complete());
        assert!(!text.is_running());
        assert_eq!(text.display(), "READY");
        assert_eq!(updates.load(Ordering::SeqCst), 25);
        assert_eq!(scheduler.pending_work(), 0);
    }

    #[test]
    fn test_last_published_frame_is_the_target() {
        let scheduler = Scheduler::new();
        let text = ScrambleText::from_state(&scheduler.handle(), ready(11));

        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&frames);
        let _sub = text.subscribe(move |frame| {
            lock(&sink).push(frame.clone());
        });

        scheduler.advance(2000.0);

        let frames = lock(&frames);
        assert_eq!(frames.last().map(String::as_str), Some("READY"));
        assert_eq!(frames.len(), 25);
    }

    #[test]
    fn test_restart_replays() {
        let scheduler = Scheduler::new();
        let text = ScrambleText::from_state(&scheduler.handle(), ready(8));

        scheduler.advance(1000.0);
        assert_eq!(text.display(), "READY");

        text.restart();
        assert!(text.is_running());
        assert!(!text.is_complete());

        scheduler.advance(1000.0);
        assert_eq!(text.display(), "READY");
        assert_eq!(scheduler.pending_work(), 0);
    }

    #[test]
    fn test_drop_revokes_interval() {
        let scheduler = Scheduler::new();
        let text = ScrambleText::new(&scheduler.handle(), "HYPERSPEED", ScrambleConfig::default());

        scheduler.advance(200.0);
        assert_eq!(scheduler.timer_count(), 1);

        drop(text);
        assert_eq!(scheduler.pending_work(), 0);
    }
}
