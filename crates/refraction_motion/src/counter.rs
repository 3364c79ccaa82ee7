//! Count-up numbers
//!
//! A [`CountUp`] climbs from 0 to its value in unit steps spread evenly over
//! the duration. Step `k` lands `round(k * duration / value)` ms after the
//! start, so the final value is shown exactly when the duration elapses.

use refraction_core::{ConfigError, Listeners, Result, SchedulerHandle, Subscription, TimerId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Time for a counter to reach its value
pub const DEFAULT_COUNT_MS: u32 = 2000;

/// A headline number with its unit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stat {
    pub value: u32,
    pub suffix: &'static str,
    pub label: &'static str,
}

impl Stat {
    /// Render `count` with this stat's suffix
    pub fn format(&self, count: u32) -> String {
        format!("{}{}", count, self.suffix)
    }
}

/// The stats strip of the landing page
pub fn landing_stats() -> Vec<Stat> {
    vec![
        Stat {
            value: 150,
            suffix: "ms",
            label: "Avg. Extraction Time",
        },
        Stat {
            value: 99,
            suffix: "%",
            label: "Accuracy Rate",
        },
        Stat {
            value: 50,
            suffix: "K+",
            label: "Components Generated",
        },
        Stat {
            value: 24,
            suffix: "/7",
            label: "System Uptime",
        },
    ]
}

struct CountState {
    value: u32,
    duration_ms: u32,
    current: u32,
    started: bool,
    timer: Option<TimerId>,
}

impl CountState {
    /// Milliseconds from the start at which step `k` lands
    fn landing_ms(&self, k: u32) -> u64 {
        let value = self.value as u64;
        (k as u64 * self.duration_ms as u64 + value / 2) / value
    }
}

struct Shared {
    handle: SchedulerHandle,
    listeners: Listeners<u32>,
    state: Mutex<CountState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CountState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An integer animated from 0 to a value once started
pub struct CountUp {
    shared: Arc<Shared>,
}

impl CountUp {
    pub fn new(handle: &SchedulerHandle, value: u32, duration_ms: u32) -> Result<Self> {
        if duration_ms == 0 && value > 0 {
            return Err(ConfigError::ZeroCounterDuration);
        }
        Ok(Self {
            shared: Arc::new(Shared {
                handle: handle.clone(),
                listeners: Listeners::new(),
                state: Mutex::new(CountState {
                    value,
                    duration_ms,
                    current: 0,
                    started: false,
                    timer: None,
                }),
            }),
        })
    }

    /// Begin counting; returns false if already started
    pub fn start(&self) -> bool {
        let mut state = self.shared.lock();
        if state.started {
            return false;
        }
        state.started = true;

        if state.value == 0 {
            tracing::trace!("counter has nothing to count");
            return true;
        }
        arm(&self.shared, &mut state, 1);
        true
    }

    /// Number currently shown
    pub fn current(&self) -> u32 {
        self.shared.lock().current
    }

    pub fn value(&self) -> u32 {
        self.shared.lock().value
    }

    pub fn is_started(&self) -> bool {
        self.shared.lock().started
    }

    pub fn is_complete(&self) -> bool {
        let state = self.shared.lock();
        state.started && state.current == state.value
    }

    /// Observe each new count
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&u32) + Send + Sync + 'static,
    {
        self.shared.listeners.subscribe(listener)
    }
}

impl Drop for CountUp {
    fn drop(&mut self) {
        if let Some(id) = self.shared.lock().timer.take() {
            self.shared.handle.clear_timer(id);
        }
    }
}

/// Schedule step `k` relative to step `k - 1`
fn arm(shared: &Arc<Shared>, state: &mut CountState, k: u32) {
    let delay = state.landing_ms(k) - state.landing_ms(k - 1);
    let weak = Arc::downgrade(shared);
    state.timer = shared
        .handle
        .set_timeout(delay as u32, move || on_step(&weak, k));
}

fn on_step(weak: &Weak<Shared>, k: u32) {
    let Some(shared) = weak.upgrade() else {
        return;
    };

    {
        let mut state = shared.lock();
        state.current = k;
        if k < state.value {
            arm(&shared, &mut state, k + 1);
        } else {
            state.timer = None;
        }
    }
    shared.listeners.emit(&k);
}
