//! Configuration errors
//!
//! Every effect validates its constants when it is constructed. Runtime
//! misuse (cancelling an idle sequencer, talking to a dropped scheduler) is
//! never an error; those calls are silent no-ops.

use thiserror::Error;

/// A rejected effect configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("phase sequence must contain at least one phase")]
    EmptyPhases,

    #[error("phase '{label}' has a zero duration")]
    ZeroPhaseDuration { label: String },

    #[error("spring stiffness must be finite and non-negative, got {0}")]
    InvalidStiffness(f32),

    #[error("spring damping must be finite and non-negative, got {0}")]
    InvalidDamping(f32),

    #[error("spring mass must be finite and positive, got {0}")]
    InvalidMass(f32),

    #[error("pointer pull factor must be in (0, 1], got {0}")]
    InvalidPullFactor(f32),

    #[error("scramble alphabet is empty")]
    EmptyAlphabet,

    #[error("scramble duration must be positive")]
    ZeroScrambleDuration,

    #[error("scramble frame interval must be positive")]
    ZeroScrambleTick,

    #[error("interpolation needs at least one breakpoint")]
    EmptyBreakpoints,

    #[error("breakpoint {index} is out of order or not finite")]
    UnsortedBreakpoints { index: usize },

    #[error("scroll tolerance must be finite and non-negative, got {0}")]
    InvalidTolerance(f32),

    #[error("counter duration must be positive")]
    ZeroCounterDuration,
}

pub type Result<T> = std::result::Result<T, ConfigError>;
