//! Ramp sequences forming continuous trajectories.

use nalgebra::DVector;

use crate::error::TrajError;
use crate::limits::Limits;
use crate::ramp::RampNd;
use crate::{EPSILON_V, EPSILON_X};

/// An ordered sequence of [`RampNd`]s forming a continuous trajectory.
///
/// Consecutive ramps join with matching position and velocity (C⁰ and C¹
/// continuity within the crate tolerances); [`Self::validate_continuity`]
/// verifies the property. The path carries the limits it was built with.
///
/// # Example
///
/// ```
/// use nalgebra::DVector;
/// use traj_types::{DynamicPath, Limits, RampNd};
///
/// let mut path = DynamicPath::new(Limits::uniform(1, 1.0, 1.0));
/// let zero = DVector::zeros(1);
/// let one = DVector::from_vec(vec![1.0]);
/// path.push(RampNd::from_pos_vel_time(zero, DVector::zeros(1), one, DVector::from_vec(vec![1.0]), 2.0).unwrap()).unwrap();
/// assert_eq!(path.len(), 1);
/// assert!((path.total_time() - 2.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct DynamicPath {
    ramps: Vec<RampNd>,
    limits: Limits,
}

impl DynamicPath {
    /// Creates an empty path carrying the given limits.
    #[must_use]
    pub const fn new(limits: Limits) -> Self {
        Self {
            ramps: Vec::new(),
            limits,
        }
    }

    /// Creates a path from an existing ramp sequence.
    ///
    /// # Errors
    ///
    /// Returns [`TrajError::DofMismatch`] when a ramp disagrees with the
    /// limits in axis count.
    pub fn with_ramps(limits: Limits, ramps: Vec<RampNd>) -> Result<Self, TrajError> {
        for ramp in &ramps {
            if ramp.dof() != limits.dof() {
                return Err(TrajError::DofMismatch {
                    expected: limits.dof(),
                    actual: ramp.dof(),
                });
            }
        }
        Ok(Self { ramps, limits })
    }

    /// The limits this path was built with.
    #[must_use]
    pub const fn limits(&self) -> &Limits {
        &self.limits
    }

    /// The ramp sequence.
    #[must_use]
    pub fn ramps(&self) -> &[RampNd] {
        &self.ramps
    }

    /// Mutable access to the ramp sequence for splice operations.
    #[must_use]
    pub fn ramps_mut(&mut self) -> &mut Vec<RampNd> {
        &mut self.ramps
    }

    /// Number of ramps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ramps.len()
    }

    /// Whether the path holds no ramps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ramps.is_empty()
    }

    /// Number of axes.
    #[must_use]
    pub fn dof(&self) -> usize {
        self.limits.dof()
    }

    /// Sum of all ramp durations.
    #[must_use]
    pub fn total_time(&self) -> f64 {
        self.ramps.iter().map(RampNd::duration).sum()
    }

    /// Appends a ramp.
    ///
    /// # Errors
    ///
    /// Returns [`TrajError::DofMismatch`] when the ramp disagrees with
    /// the limits in axis count.
    pub fn push(&mut self, ramp: RampNd) -> Result<(), TrajError> {
        if ramp.dof() != self.limits.dof() {
            return Err(TrajError::DofMismatch {
                expected: self.limits.dof(),
                actual: ramp.dof(),
            });
        }
        self.ramps.push(ramp);
        Ok(())
    }

    /// Recomputes per-ramp start times into `out` and returns the total.
    pub fn start_times(&self, out: &mut Vec<f64>) -> f64 {
        out.clear();
        out.reserve(self.ramps.len());
        let mut t = 0.0;
        for ramp in &self.ramps {
            out.push(t);
            t += ramp.duration();
        }
        t
    }

    /// Evaluates the configuration at global time `t`.
    ///
    /// Times beyond the ends clamp to the first/last configuration.
    #[must_use]
    pub fn evaluate(&self, t: f64) -> Option<DVector<f64>> {
        if self.ramps.is_empty() {
            return None;
        }
        let mut local = t.max(0.0);
        for ramp in &self.ramps {
            if local <= ramp.duration() {
                return Some(ramp.evaluate(local));
            }
            local -= ramp.duration();
        }
        self.ramps.last().map(|r| r.x1().clone())
    }

    /// Verifies C⁰/C¹ continuity at every ramp join.
    ///
    /// # Errors
    ///
    /// Returns [`TrajError::Discontinuity`] naming the first offending
    /// join.
    pub fn validate_continuity(&self) -> Result<(), TrajError> {
        for (index, pair) in self.ramps.windows(2).enumerate() {
            let mut position_gap = 0.0_f64;
            let mut velocity_gap = 0.0_f64;
            for axis in 0..self.dof() {
                position_gap = position_gap.max((pair[0].x1()[axis] - pair[1].x0()[axis]).abs());
                velocity_gap = velocity_gap.max((pair[0].v1()[axis] - pair[1].v0()[axis]).abs());
            }
            if position_gap > EPSILON_X || velocity_gap > EPSILON_V {
                return Err(TrajError::Discontinuity {
                    index,
                    position_gap,
                    velocity_gap,
                });
            }
        }
        Ok(())
    }
}
