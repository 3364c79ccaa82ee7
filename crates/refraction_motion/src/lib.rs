//! Refraction Motion
//!
//! Scroll, pointer and time driven effects built on the `refraction_core`
//! scheduler.
//!
//! # Features
//!
//! - **Springs**: RK4-integrated springs with presets tuned for magnetic
//!   buttons, cursor glows and scroll smoothing
//! - **Scroll Progress**: anchor-based region progress, recomputed at most
//!   once per frame, mapped through piecewise-linear breakpoints
//! - **Pointer Tracking**: spring-damped displacement toward the pointer
//! - **Text Scramble**: random glyphs resolving into a target string
//! - **Phase Sequencing**: labeled timed phases with cancellation and
//!   supersession by run id
//! - **Page Effects**: count-up numbers, one-shot in-view triggers and copy
//!   feedback
//!
//! Every effect owns its scheduled work. Dropping it revokes its timers,
//! frame callbacks and input listeners.

pub mod animated;
pub mod clipboard;
pub mod counter;
pub mod in_view;
pub mod interpolate;
pub mod pointer;
pub mod scramble;
pub mod scroll;
pub mod sequencer;
pub mod spring;

pub use animated::{SpringValue, WeakSpringValue};
pub use clipboard::CopyIndicator;
pub use counter::{landing_stats, CountUp, Stat};
pub use in_view::InViewTrigger;
pub use interpolate::{Breakpoints, Interpolate};
pub use pointer::{CursorFollower, PointerOffsetTracker};
pub use scramble::{Scramble, ScrambleConfig, ScrambleState, ScrambleText};
pub use scroll::{
    Anchor, Edge, ScrollAnchors, ScrollProgressSource, ScrollRegion, ScrollSnapshot,
    ScrollTransform,
};
pub use sequencer::{
    extraction_phases, Phase, PhaseSequencer, PhaseTimeout, RunId, Sequence, SequenceSnapshot,
    SequenceStatus, Step,
};
pub use spring::{Animatable, Spring, Spring2D, SpringConfig};
