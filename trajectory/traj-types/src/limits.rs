//! Per-axis kinematic limits.

use nalgebra::DVector;

use crate::error::TrajError;

/// Velocity, acceleration, and position limits for every axis.
///
/// Limits are immutable once constructed; a [`crate::DynamicPath`] carries
/// the limits it was built with for its whole lifetime.
///
/// # Example
///
/// ```
/// use nalgebra::DVector;
/// use traj_types::Limits;
///
/// let limits = Limits::new(
///     DVector::from_vec(vec![1.0, 2.0]),
///     DVector::from_vec(vec![4.0, 4.0]),
///     DVector::from_vec(vec![-10.0, -10.0]),
///     DVector::from_vec(vec![10.0, 10.0]),
/// ).unwrap();
/// assert_eq!(limits.dof(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Limits {
    velocity: DVector<f64>,
    acceleration: DVector<f64>,
    lower: DVector<f64>,
    upper: DVector<f64>,
}

impl Limits {
    /// Creates limits from per-axis bound vectors.
    ///
    /// # Errors
    ///
    /// Returns [`TrajError::DofMismatch`] when the vectors disagree in
    /// length, and [`TrajError::InvalidLimits`] when a velocity or
    /// acceleration bound is not strictly positive or a position interval
    /// is inverted.
    pub fn new(
        velocity: DVector<f64>,
        acceleration: DVector<f64>,
        lower: DVector<f64>,
        upper: DVector<f64>,
    ) -> Result<Self, TrajError> {
        let dof = velocity.len();
        for other in [acceleration.len(), lower.len(), upper.len()] {
            if other != dof {
                return Err(TrajError::DofMismatch {
                    expected: dof,
                    actual: other,
                });
            }
        }
        for i in 0..dof {
            if !(velocity[i] > 0.0 && velocity[i].is_finite()) {
                return Err(TrajError::invalid_limits(format!(
                    "velocity limit for axis {i} must be positive, got {}",
                    velocity[i]
                )));
            }
            if !(acceleration[i] > 0.0 && acceleration[i].is_finite()) {
                return Err(TrajError::invalid_limits(format!(
                    "acceleration limit for axis {i} must be positive, got {}",
                    acceleration[i]
                )));
            }
            if lower[i] > upper[i] {
                return Err(TrajError::invalid_limits(format!(
                    "position interval for axis {i} is inverted: [{}, {}]",
                    lower[i], upper[i]
                )));
            }
        }
        Ok(Self {
            velocity,
            acceleration,
            lower,
            upper,
        })
    }

    /// Creates uniform limits with unbounded positions.
    ///
    /// Convenient for tests and for spaces without joint limits.
    #[must_use]
    pub fn uniform(dof: usize, velocity: f64, acceleration: f64) -> Self {
        Self {
            velocity: DVector::from_element(dof, velocity),
            acceleration: DVector::from_element(dof, acceleration),
            lower: DVector::from_element(dof, f64::NEG_INFINITY),
            upper: DVector::from_element(dof, f64::INFINITY),
        }
    }

    /// Number of axes.
    #[must_use]
    pub fn dof(&self) -> usize {
        self.velocity.len()
    }

    /// Per-axis velocity magnitude bounds.
    #[must_use]
    pub const fn velocity(&self) -> &DVector<f64> {
        &self.velocity
    }

    /// Per-axis acceleration magnitude bounds.
    #[must_use]
    pub const fn acceleration(&self) -> &DVector<f64> {
        &self.acceleration
    }

    /// Per-axis position lower bounds.
    #[must_use]
    pub const fn lower(&self) -> &DVector<f64> {
        &self.lower
    }

    /// Per-axis position upper bounds.
    #[must_use]
    pub const fn upper(&self) -> &DVector<f64> {
        &self.upper
    }

    /// Whether `q` lies inside the position bounds with tolerance `tol`.
    #[must_use]
    pub fn contains_position(&self, q: &DVector<f64>, tol: f64) -> bool {
        (0..self.dof()).all(|i| q[i] >= self.lower[i] - tol && q[i] <= self.upper[i] + tol)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform() {
        let limits = Limits::uniform(3, 1.0, 2.0);
        assert_eq!(limits.dof(), 3);
        assert_eq!(limits.velocity()[2], 1.0);
        assert_eq!(limits.acceleration()[0], 2.0);
        assert!(limits.lower()[1].is_infinite());
    }

    #[test]
    fn test_rejects_nonpositive_velocity() {
        let err = Limits::new(
            DVector::from_vec(vec![0.0]),
            DVector::from_vec(vec![1.0]),
            DVector::from_vec(vec![-1.0]),
            DVector::from_vec(vec![1.0]),
        );
        assert!(matches!(err, Err(TrajError::InvalidLimits(_))));
    }

    #[test]
    fn test_rejects_inverted_interval() {
        let err = Limits::new(
            DVector::from_vec(vec![1.0]),
            DVector::from_vec(vec![1.0]),
            DVector::from_vec(vec![2.0]),
            DVector::from_vec(vec![-2.0]),
        );
        assert!(matches!(err, Err(TrajError::InvalidLimits(_))));
    }

    #[test]
    fn test_rejects_dof_mismatch() {
        let err = Limits::new(
            DVector::from_vec(vec![1.0, 1.0]),
            DVector::from_vec(vec![1.0]),
            DVector::from_vec(vec![-1.0, -1.0]),
            DVector::from_vec(vec![1.0, 1.0]),
        );
        assert!(matches!(err, Err(TrajError::DofMismatch { .. })));
    }

    #[test]
    fn test_contains_position() {
        let limits = Limits::new(
            DVector::from_vec(vec![1.0]),
            DVector::from_vec(vec![1.0]),
            DVector::from_vec(vec![-1.0]),
            DVector::from_vec(vec![1.0]),
        )
        .unwrap();
        assert!(limits.contains_position(&DVector::from_vec(vec![0.5]), 0.0));
        assert!(!limits.contains_position(&DVector::from_vec(vec![1.5]), 0.0));
        assert!(limits.contains_position(&DVector::from_vec(vec![1.5]), 0.6));
    }
}
