//! Waypoint-level trajectory containers.
//!
//! [`Trajectory`] is the wire format at both ends of the smoother: the
//! input is a waypoint sequence with optional timing and velocities, and
//! the output is a fully timed sequence whose positions interpolate
//! quadratically and velocities linearly between waypoints.

use nalgebra::DVector;

use crate::error::TrajError;

/// Interpolation tag for a trajectory group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Interpolation {
    /// Straight-line interpolation between samples.
    Linear,
    /// Piecewise-quadratic (constant-acceleration) interpolation.
    Quadratic,
    /// The value holds until the next sample.
    Next,
}

impl std::fmt::Display for Interpolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Quadratic => write!(f, "quadratic"),
            Self::Next => write!(f, "next"),
        }
    }
}

/// One waypoint of a [`Trajectory`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrajectoryPoint {
    /// Configuration at this waypoint.
    pub positions: DVector<f64>,
    /// Velocity at this waypoint, when the trajectory carries one.
    pub velocities: Option<DVector<f64>>,
    /// Elapsed time since the previous waypoint (zero for the first).
    pub delta_time: f64,
    /// Whether this sample is an original path waypoint rather than an
    /// expanded acceleration switch.
    pub is_waypoint: bool,
}

impl TrajectoryPoint {
    /// A bare positional waypoint with no timing.
    #[must_use]
    pub const fn new(positions: DVector<f64>) -> Self {
        Self {
            positions,
            velocities: None,
            delta_time: 0.0,
            is_waypoint: true,
        }
    }
}

/// A waypoint sequence with per-group interpolation metadata.
///
/// # Example
///
/// ```
/// use nalgebra::DVector;
/// use traj_types::{Interpolation, Trajectory};
///
/// let traj = Trajectory::from_positions(
///     2,
///     vec![
///         DVector::from_vec(vec![0.0, 0.0]),
///         DVector::from_vec(vec![1.0, 0.0]),
///     ],
/// )
/// .unwrap();
/// assert_eq!(traj.len(), 2);
/// assert_eq!(traj.interpolation(), Interpolation::Linear);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trajectory {
    dof: usize,
    interpolation: Interpolation,
    points: Vec<TrajectoryPoint>,
}

impl Trajectory {
    /// Creates an empty trajectory with the given configuration width
    /// and position-group interpolation tag.
    #[must_use]
    pub const fn new(dof: usize, interpolation: Interpolation) -> Self {
        Self {
            dof,
            interpolation,
            points: Vec::new(),
        }
    }

    /// Creates an untimed, linearly interpolated waypoint sequence.
    ///
    /// # Errors
    ///
    /// Returns [`TrajError::DofMismatch`] when a waypoint disagrees with
    /// `dof` in length.
    pub fn from_positions(
        dof: usize,
        positions: Vec<DVector<f64>>,
    ) -> Result<Self, TrajError> {
        let mut traj = Self::new(dof, Interpolation::Linear);
        for q in positions {
            traj.push(TrajectoryPoint::new(q))?;
        }
        Ok(traj)
    }

    /// Configuration width.
    #[must_use]
    pub const fn dof(&self) -> usize {
        self.dof
    }

    /// Interpolation tag of the position group.
    #[must_use]
    pub const fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Number of waypoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the trajectory holds no waypoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The waypoint sequence.
    #[must_use]
    pub fn points(&self) -> &[TrajectoryPoint] {
        &self.points
    }

    /// Appends a waypoint.
    ///
    /// # Errors
    ///
    /// Returns [`TrajError::DofMismatch`] when the waypoint disagrees in
    /// width with the trajectory.
    pub fn push(&mut self, point: TrajectoryPoint) -> Result<(), TrajError> {
        if point.positions.len() != self.dof {
            return Err(TrajError::DofMismatch {
                expected: self.dof,
                actual: point.positions.len(),
            });
        }
        if let Some(v) = &point.velocities {
            if v.len() != self.dof {
                return Err(TrajError::DofMismatch {
                    expected: self.dof,
                    actual: v.len(),
                });
            }
        }
        self.points.push(point);
        Ok(())
    }

    /// Total duration: the sum of all `delta_time` values.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.points.iter().map(|p| p.delta_time).sum()
    }

    /// Whether every waypoint carries a velocity.
    #[must_use]
    pub fn has_velocities(&self) -> bool {
        !self.points.is_empty() && self.points.iter().all(|p| p.velocities.is_some())
    }
}
