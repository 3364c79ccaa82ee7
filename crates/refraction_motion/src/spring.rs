//! Spring physics
//!
//! RK4-integrated damped springs that ease a value toward a target. Every
//! pointer and scroll effect smooths its driving signal through one of
//! these. Constants are fixed per use site and validated at construction.

use refraction_core::{ConfigError, Result};

/// Largest integration step; longer frames are subdivided
const MAX_STEP_SECS: f32 = 1.0 / 120.0;

/// Distance from target considered at rest
const REST_DELTA: f32 = 0.001;

/// Speed considered at rest
const REST_SPEED: f32 = 0.001;

/// Configuration for a spring
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringConfig {
    pub stiffness: f32,
    pub damping: f32,
    pub mass: f32,
}

impl SpringConfig {
    /// Create a validated spring configuration
    ///
    /// Stiffness and damping must be finite and non-negative; mass must be
    /// finite and positive.
    pub fn new(stiffness: f32, damping: f32, mass: f32) -> Result<Self> {
        if !stiffness.is_finite() || stiffness < 0.0 {
            return Err(ConfigError::InvalidStiffness(stiffness));
        }
        if !damping.is_finite() || damping < 0.0 {
            return Err(ConfigError::InvalidDamping(damping));
        }
        if !mass.is_finite() || mass <= 0.0 {
            return Err(ConfigError::InvalidMass(mass));
        }
        Ok(Self {
            stiffness,
            damping,
            mass,
        })
    }

    /// Magnetic button pull (underdamped, a little bounce)
    pub const fn magnetic() -> Self {
        Self {
            stiffness: 150.0,
            damping: 15.0,
            mass: 1.0,
        }
    }

    /// Glowing cursor follower (heavily damped, lags behind the pointer)
    pub const fn cursor() -> Self {
        Self {
            stiffness: 50.0,
            damping: 30.0,
            mass: 1.0,
        }
    }

    /// Scroll progress smoothing
    pub const fn scroll_smoothing() -> Self {
        Self {
            stiffness: 100.0,
            damping: 30.0,
            mass: 1.0,
        }
    }

    /// Fast general-purpose spring for fades and small UI values
    pub const fn stiff() -> Self {
        Self {
            stiffness: 400.0,
            damping: 30.0,
            mass: 1.0,
        }
    }

    /// Calculate critical damping for this spring's stiffness and mass
    pub fn critical_damping(&self) -> f32 {
        2.0 * (self.stiffness * self.mass).sqrt()
    }

    /// Check if the spring is underdamped (will oscillate)
    pub fn is_underdamped(&self) -> bool {
        self.damping < self.critical_damping()
    }

    /// Check if the spring is overdamped (slow settling, no oscillation)
    pub fn is_overdamped(&self) -> bool {
        self.damping > self.critical_damping()
    }
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self::stiff()
    }
}

/// Something a frame loop can step toward rest
pub trait Animatable: Send + 'static {
    type Target: Copy + Send + 'static;

    fn set_target(&mut self, target: Self::Target);

    /// Advance by `dt` seconds
    fn step(&mut self, dt: f32);

    fn is_settled(&self) -> bool;
}

/// A one-dimensional spring
///
/// State is kept as the displacement from the target, so precision scales
/// with the remaining distance rather than with the magnitude of the target.
#[derive(Clone, Copy, Debug)]
pub struct Spring {
    config: SpringConfig,
    displacement: f32,
    velocity: f32,
    target: f32,
}

impl Spring {
    pub fn new(config: SpringConfig, initial: f32) -> Self {
        Self {
            config,
            displacement: 0.0,
            velocity: 0.0,
            target: initial,
        }
    }

    pub fn config(&self) -> SpringConfig {
        self.config
    }

    pub fn value(&self) -> f32 {
        self.target + self.displacement
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// Retarget without touching velocity, so an interrupted spring keeps
    /// its momentum
    pub fn set_target(&mut self, target: f32) {
        self.displacement = self.value() - target;
        self.target = target;
    }

    /// Jump to `value` and stop
    pub fn snap_to(&mut self, value: f32) {
        self.displacement = 0.0;
        self.target = value;
        self.velocity = 0.0;
    }

    /// Check if the spring has settled (within epsilon of target with minimal velocity)
    pub fn is_settled(&self) -> bool {
        self.displacement.abs() < REST_DELTA && self.velocity.abs() < REST_SPEED
    }

    /// Step the spring simulation by `dt` seconds
    ///
    /// Frames longer than 1/120 s are split into equal sub-steps. Once the
    /// spring is at rest it snaps exactly onto the target.
    pub fn step(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }

        let steps = (dt / MAX_STEP_SECS).ceil().max(1.0) as u32;
        let h = dt / steps as f32;
        for _ in 0..steps {
            if self.is_settled() {
                break;
            }
            self.integrate(h);
        }

        if self.is_settled() {
            self.displacement = 0.0;
            self.velocity = 0.0;
        }
    }

    /// One RK4 step on the displacement
    fn integrate(&mut self, dt: f32) {
        let x = self.displacement;
        let v = self.velocity;

        let k1_v = self.acceleration(x, v);
        let k1_x = v;

        let k2_v = self.acceleration(x + k1_x * dt * 0.5, v + k1_v * dt * 0.5);
        let k2_x = v + k1_v * dt * 0.5;

        let k3_v = self.acceleration(x + k2_x * dt * 0.5, v + k2_v * dt * 0.5);
        let k3_x = v + k2_v * dt * 0.5;

        let k4_v = self.acceleration(x + k3_x * dt, v + k3_v * dt);
        let k4_x = v + k3_v * dt;

        self.velocity += (k1_v + 2.0 * k2_v + 2.0 * k3_v + k4_v) * dt / 6.0;
        self.displacement += (k1_x + 2.0 * k2_x + 2.0 * k3_x + k4_x) * dt / 6.0;
    }

    fn acceleration(&self, x: f32, v: f32) -> f32 {
        let spring_force = -self.config.stiffness * x;
        let damping_force = -self.config.damping * v;
        (spring_force + damping_force) / self.config.mass
    }
}

impl Animatable for Spring {
    type Target = f32;

    fn set_target(&mut self, target: f32) {
        Spring::set_target(self, target);
    }

    fn step(&mut self, dt: f32) {
        Spring::step(self, dt);
    }

    fn is_settled(&self) -> bool {
        Spring::is_settled(self)
    }
}

/// Two independent springs driving an `(x, y)` displacement
#[derive(Clone, Copy, Debug)]
pub struct Spring2D {
    pub x: Spring,
    pub y: Spring,
}

impl Spring2D {
    pub fn new(config: SpringConfig, initial: (f32, f32)) -> Self {
        Self {
            x: Spring::new(config, initial.0),
            y: Spring::new(config, initial.1),
        }
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x.value(), self.y.value())
    }

    pub fn velocity(&self) -> (f32, f32) {
        (self.x.velocity(), self.y.velocity())
    }

    pub fn target(&self) -> (f32, f32) {
        (self.x.target(), self.y.target())
    }
}

impl Animatable for Spring2D {
    type Target = (f32, f32);

    fn set_target(&mut self, target: (f32, f32)) {
        self.x.set_target(target.0);
        self.y.set_target(target.1);
    }

    fn step(&mut self, dt: f32) {
        self.x.step(dt);
        self.y.step(dt);
    }

    fn is_settled(&self) -> bool {
        self.x.is_settled() && self.y.is_settled()
    }
}
