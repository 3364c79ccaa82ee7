//! Piecewise-linear value mapping
//!
//! Maps a progress value onto a presentational value through a list of
//! `(progress, value)` breakpoints, clamping outside the covered range.

use refraction_core::{ConfigError, Result};

/// Trait for values that can be linearly interpolated
pub trait Interpolate: Clone {
    /// Linearly interpolate between self and other by factor t (0.0 to 1.0)
    fn lerp(&self, other: &Self, t: f32) -> Self;
}

impl Interpolate for f32 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Interpolate for (f32, f32) {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        (self.0.lerp(&other.0, t), self.1.lerp(&other.1, t))
    }
}

/// Sorted `(progress, value)` pairs
#[derive(Clone, Debug, PartialEq)]
pub struct Breakpoints<T: Interpolate = f32> {
    points: Vec<(f32, T)>,
}

impl<T: Interpolate> Breakpoints<T> {
    /// Build from points sorted by progress
    ///
    /// Progress values must be finite and non-decreasing. Two points at the
    /// same progress make a step: the later one wins from that progress on.
    pub fn new(points: Vec<(f32, T)>) -> Result<Self> {
        if points.is_empty() {
            return Err(ConfigError::EmptyBreakpoints);
        }
        for (index, window) in points.windows(2).enumerate() {
            if window[1].0 < window[0].0 {
                return Err(ConfigError::UnsortedBreakpoints { index: index + 1 });
            }
        }
        if let Some(index) = points.iter().position(|(p, _)| !p.is_finite()) {
            return Err(ConfigError::UnsortedBreakpoints { index });
        }
        Ok(Self { points })
    }

    /// Map `progress` to a value
    pub fn sample(&self, progress: f32) -> T {
        let first = &self.points[0];
        let last = &self.points[self.points.len() - 1];

        if progress.is_nan() || progress <= first.0 {
            return first.1.clone();
        }
        if progress >= last.0 {
            return last.1.clone();
        }

        // First point strictly past `progress`; its predecessor brackets it
        let upper = self.points.partition_point(|(p, _)| *p <= progress);
        let (p0, v0) = &self.points[upper - 1];
        let (p1, v1) = &self.points[upper];

        if (p1 - p0).abs() < f32::EPSILON {
            return v1.clone();
        }

        let t = (progress - p0) / (p1 - p0);
        v0.lerp(v1, t)
    }

    pub fn points(&self) -> &[(f32, T)] {
        &self.points
    }

    /// For constant tables already known to be sorted
    pub(crate) fn from_sorted(points: Vec<(f32, T)>) -> Self {
        debug_assert!(!points.is_empty());
        Self { points }
    }
}

impl Breakpoints<f32> {
    /// Two-point map, the shape every hero transform uses
    pub fn linear(from: (f32, f32), to: (f32, f32)) -> Result<Self> {
        Self::new(vec![from, to])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_float_interpolation() {
        assert!(approx(0.0_f32.lerp(&1.0, 0.5), 0.5));
        assert!(approx(10.0_f32.lerp(&20.0, 0.25), 12.5));
    }

    #[test]
    fn test_fade_out_breakpoints() {
        let opacity = Breakpoints::linear((0.0, 1.0), (0.2, 0.0)).unwrap();

        assert!(approx(opacity.sample(0.1), 0.5));
        assert_eq!(opacity.sample(0.3), 0.0);
        assert_eq!(opacity.sample(-1.0), 1.0);
        assert_eq!(opacity.sample(0.0), 1.0);
        assert_eq!(opacity.sample(0.2), 0.0);
    }

    #[test]
    fn test_multi_segment() {
        let bp = Breakpoints::<f32>::new(vec![(0.0, 0.0), (0.5, 10.0), (1.0, 0.0)]).unwrap();
        assert!(approx(bp.sample(0.25), 5.0));
        assert!(approx(bp.sample(0.5), 10.0));
        assert!(approx(bp.sample(0.75), 5.0));
    }

    #[test]
    fn test_step_at_duplicate_progress() {
        let bp = Breakpoints::<f32>::new(vec![(0.0, 0.0), (0.5, 0.0), (0.5, 1.0), (1.0, 1.0)]).unwrap();
        assert_eq!(bp.sample(0.49), 0.0);
        assert_eq!(bp.sample(0.5), 1.0);
        assert_eq!(bp.sample(0.51), 1.0);
    }

    #[test]
    fn test_single_point_is_constant() {
        let bp = Breakpoints::<f32>::new(vec![(0.3, 7.0)]).unwrap();
        assert_eq!(bp.sample(0.0), 7.0);
        assert_eq!(bp.sample(1.0), 7.0);
    }

    #[test]
    fn test_tuple_values() {
        let bp = Breakpoints::<(f32, f32)>::new(vec![(0.0, (0.0, 0.0)), (1.0, (10.0, -10.0))]).unwrap();
        let (x, y) = bp.sample(0.5);
        assert!(approx(x, 5.0) && approx(y, -5.0));
    }

    #[test]
    fn test_invalid_breakpoints() {
        assert_eq!(
            Breakpoints::<f32>::new(vec![]),
            Err(ConfigError::EmptyBreakpoints)
        );
        assert_eq!(
            Breakpoints::<f32>::new(vec![(0.5, 1.0), (0.2, 0.0)]),
            Err(ConfigError::UnsortedBreakpoints { index: 1 })
        );
        assert!(Breakpoints::<f32>::new(vec![(f32::NAN, 1.0)]).is_err());
    }
}
