//! Timed phase sequencing
//!
//! [`Sequence`] is a plain state machine: `Idle -> Running -> Completed`, or
//! `Running -> Cancelled`. Each `start()` opens a new run identified by a
//! [`RunId`]; a timeout only advances the sequence if it carries the current
//! run's id, so work scheduled for a superseded run can never apply.
//!
//! [`PhaseSequencer`] drives a `Sequence` from scheduler timeouts and tells
//! subscribers about every transition.
//!
//! ```rust
//! use refraction_core::Scheduler;
//! use refraction_motion::sequencer::{Phase, PhaseSequencer, SequenceStatus};
//!
//! let scheduler = Scheduler::new();
//! let sequencer = PhaseSequencer::new(
//!     &scheduler.handle(),
//!     vec![Phase::new("Scanning", 300), Phase::new("Extracting", 500)],
//! )
//! .unwrap();
//!
//! sequencer.start();
//! scheduler.advance(300.0);
//! assert_eq!(sequencer.current_index(), 1);
//!
//! scheduler.advance(500.0);
//! assert_eq!(sequencer.status(), SequenceStatus::Completed);
//! ```

use refraction_core::{ConfigError, Listeners, Result, SchedulerHandle, Subscription, TimerId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// One labeled, timed step
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Phase {
    pub label: String,
    pub duration_ms: u32,
}

impl Phase {
    pub fn new(label: impl Into<String>, duration_ms: u32) -> Self {
        Self {
            label: label.into(),
            duration_ms,
        }
    }
}

/// Lifecycle of a sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SequenceStatus {
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl SequenceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SequenceStatus::Completed | SequenceStatus::Cancelled)
    }
}

/// Generation of one `start()`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(u64);

/// A timeout the owner must schedule for the current phase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseTimeout {
    pub run: RunId,
    pub delay_ms: u32,
}

/// Result of a phase timeout that belonged to the current run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Moved to the next phase; schedule this timeout
    Next(PhaseTimeout),
    /// Past the last phase
    Completed,
}

/// What observers see after each transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceSnapshot {
    pub current_index: usize,
    pub status: SequenceStatus,
    /// Label of the phase at `current_index`, if there is one and the
    /// sequence has been started
    pub label: Option<String>,
}

// ============================================================================
// State machine
// ============================================================================

/// Ordered phases and the progress through them
#[derive(Clone, Debug)]
pub struct Sequence {
    phases: Vec<Phase>,
    current_index: usize,
    status: SequenceStatus,
    run: RunId,
}

impl Sequence {
    /// Rejects an empty list and zero-length phases
    pub fn new(phases: Vec<Phase>) -> Result<Self> {
        if phases.is_empty() {
            return Err(ConfigError::EmptyPhases);
        }
        if let Some(phase) = phases.iter().find(|p| p.duration_ms == 0) {
            return Err(ConfigError::ZeroPhaseDuration {
                label: phase.label.clone(),
            });
        }
        Ok(Self {
            phases,
            current_index: 0,
            status: SequenceStatus::Idle,
            run: RunId::default(),
        })
    }

    /// Begin a new run at the first phase
    ///
    /// Any previous run, finished or not, is superseded.
    pub fn start(&mut self) -> PhaseTimeout {
        self.run = RunId(self.run.0 + 1);
        self.current_index = 0;
        self.status = SequenceStatus::Running;
        PhaseTimeout {
            run: self.run,
            delay_ms: self.phases[0].duration_ms,
        }
    }

    /// Handle the timeout of the current phase
    ///
    /// Returns `None` for a timeout from another run or when not running.
    pub fn fire(&mut self, run: RunId) -> Option<Step> {
        if run != self.run || self.status != SequenceStatus::Running {
            return None;
        }

        self.current_index += 1;
        match self.phases.get(self.current_index) {
            Some(phase) => Some(Step::Next(PhaseTimeout {
                run,
                delay_ms: phase.duration_ms,
            })),
            None => {
                self.status = SequenceStatus::Completed;
                Some(Step::Completed)
            }
        }
    }

    /// Stop a running sequence; returns whether it was running
    pub fn cancel(&mut self) -> bool {
        if self.status != SequenceStatus::Running {
            return false;
        }
        self.status = SequenceStatus::Cancelled;
        true
    }

    /// Return to `Idle` at the first phase, invalidating the current run
    pub fn reset(&mut self) {
        self.run = RunId(self.run.0 + 1);
        self.current_index = 0;
        self.status = SequenceStatus::Idle;
    }

    pub fn status(&self) -> SequenceStatus {
        self.status
    }

    /// Index of the phase in progress; equals `phases().len()` once completed
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_phase(&self) -> Option<&Phase> {
        match self.status {
            SequenceStatus::Idle => None,
            _ => self.phases.get(self.current_index),
        }
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn run(&self) -> RunId {
        self.run
    }

    /// Sum of every phase duration
    pub fn total_ms(&self) -> u64 {
        self.phases.iter().map(|p| p.duration_ms as u64).sum()
    }

    pub fn snapshot(&self) -> SequenceSnapshot {
        SequenceSnapshot {
            current_index: self.current_index,
            status: self.status,
            label: self.current_phase().map(|p| p.label.clone()),
        }
    }
}

// ============================================================================
// Scheduled sequencer
// ============================================================================

struct Bound {
    sequence: Sequence,
    pending: Option<TimerId>,
}

struct Shared {
    handle: SchedulerHandle,
    listeners: Listeners<SequenceSnapshot>,
    state: Mutex<Bound>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Bound> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A [`Sequence`] advanced by scheduler timeouts
///
/// Dropping the sequencer revokes its pending timeout.
pub struct PhaseSequencer {
    shared: Arc<Shared>,
}

impl PhaseSequencer {
    pub fn new(handle: &SchedulerHandle, phases: Vec<Phase>) -> Result<Self> {
        Ok(Self::from_sequence(handle, Sequence::new(phases)?))
    }

    pub fn from_sequence(handle: &SchedulerHandle, sequence: Sequence) -> Self {
        Self {
            shared: Arc::new(Shared {
                handle: handle.clone(),
                listeners: Listeners::new(),
                state: Mutex::new(Bound {
                    sequence,
                    pending: None,
                }),
            }),
        }
    }

    /// Start from the first phase, superseding any run in progress
    pub fn start(&self) {
        let snapshot = {
            let mut bound = self.shared.lock();
            if let Some(id) = bound.pending.take() {
                self.shared.handle.clear_timer(id);
                tracing::debug!("superseding run {:?}", bound.sequence.run());
            }
            let timeout = bound.sequence.start();
            arm(&self.shared, &mut bound, timeout);
            tracing::debug!(
                "sequence started ({} phases, run {:?})",
                bound.sequence.phases().len(),
                timeout.run
            );
            bound.sequence.snapshot()
        };
        self.shared.listeners.emit(&snapshot);
    }

    /// Stop the current run; returns whether one was running
    pub fn cancel(&self) -> bool {
        let snapshot = {
            let mut bound = self.shared.lock();
            if !bound.sequence.cancel() {
                tracing::trace!("cancel ignored in {:?}", bound.sequence.status());
                return false;
            }
            if let Some(id) = bound.pending.take() {
                self.shared.handle.clear_timer(id);
            }
            tracing::debug!("sequence cancelled at phase {}", bound.sequence.current_index());
            bound.sequence.snapshot()
        };
        self.shared.listeners.emit(&snapshot);
        true
    }

    /// Back to `Idle`, revoking any pending timeout
    pub fn reset(&self) {
        let snapshot = {
            let mut bound = self.shared.lock();
            if let Some(id) = bound.pending.take() {
                self.shared.handle.clear_timer(id);
            }
            bound.sequence.reset();
            bound.sequence.snapshot()
        };
        self.shared.listeners.emit(&snapshot);
    }

    pub fn status(&self) -> SequenceStatus {
        self.shared.lock().sequence.status()
    }

    pub fn current_index(&self) -> usize {
        self.shared.lock().sequence.current_index()
    }

    pub fn snapshot(&self) -> SequenceSnapshot {
        self.shared.lock().sequence.snapshot()
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.shared.lock().sequence.phases().to_vec()
    }

    /// True while a phase timeout is scheduled
    pub fn has_pending_timeout(&self) -> bool {
        self.shared.lock().pending.is_some()
    }

    /// Observe every transition
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SequenceSnapshot) + Send + Sync + 'static,
    {
        self.shared.listeners.subscribe(listener)
    }
}

impl Drop for PhaseSequencer {
    fn drop(&mut self) {
        if let Some(id) = self.shared.lock().pending.take() {
            self.shared.handle.clear_timer(id);
        }
    }
}

/// Schedule `timeout` for the current run
fn arm(shared: &Arc<Shared>, bound: &mut Bound, timeout: PhaseTimeout) {
    let weak = Arc::downgrade(shared);
    bound.pending = shared.handle.set_timeout(timeout.delay_ms, move || {
        on_timeout(&weak, timeout.run);
    });
}

fn on_timeout(weak: &Weak<Shared>, run: RunId) {
    let Some(shared) = weak.upgrade() else {
        return;
    };

    let snapshot = {
        let mut bound = shared.lock();
        match bound.sequence.fire(run) {
            None => {
                tracing::trace!("stale phase timeout for run {:?}", run);
                return;
            }
            Some(Step::Next(timeout)) => {
                arm(&shared, &mut bound, timeout);
                tracing::debug!(
                    "phase {} started: {}",
                    bound.sequence.current_index(),
                    bound.sequence.phases()[bound.sequence.current_index()].label
                );
            }
            Some(Step::Completed) => {
                bound.pending = None;
                tracing::debug!("sequence completed");
            }
        }
        bound.sequence.snapshot()
    };
    shared.listeners.emit(&snapshot);
}

/// The simulated extraction run shown while a page is being processed
pub fn extraction_phases() -> Vec<Phase> {
    vec![
        Phase::new("Scanning page structure", 800),
        Phase::new("Analyzing components", 1000),
        Phase::new("Extracting styles and assets", 1200),
        Phase::new("Generating code", 1000),
        Phase::new("Finalizing", 600),
    ]
}
