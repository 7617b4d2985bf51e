//! Error types for trajectory data structures.
//!
//! This module defines the [`TrajError`] enum which represents all
//! construction and validation failures of the trajectory data model.

/// Errors raised by trajectory type construction and validation.
///
/// This enum covers dimensional mismatches, invalid bounds, and broken
/// structural invariants such as ramp-join continuity.
///
/// # Example
///
/// ```
/// use traj_types::TrajError;
///
/// let error = TrajError::DofMismatch {
///     expected: 6,
///     actual: 7,
/// };
///
/// assert!(error.to_string().contains("expected 6"));
/// ```
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TrajError {
    /// Two related vectors disagree in length.
    ///
    /// Check that limits, resolutions, and waypoints were all built for
    /// the same configuration space.
    #[error("dof mismatch: expected {expected}, got {actual}")]
    DofMismatch {
        /// The expected number of axes.
        expected: usize,
        /// The offending number of axes.
        actual: usize,
    },

    /// A limit vector fails validation.
    ///
    /// Velocity, acceleration, and resolution bounds must be strictly
    /// positive and position intervals must not be inverted; the
    /// message names the offending axis and value.
    #[error("invalid limits: {0}")]
    InvalidLimits(String),

    /// A duration is negative or not finite.
    ///
    /// Ramp and segment durations must be finite and non-negative.
    #[error("invalid duration: {0}")]
    InvalidDuration(f64),

    /// Per-axis ramps bundled into one segment disagree in duration.
    ///
    /// Solve every axis for one shared duration before combining them
    /// into a multi-axis ramp.
    #[error("ramp durations disagree: {min} vs {max}")]
    MismatchedDurations {
        /// Shortest axis duration.
        min: f64,
        /// Longest axis duration.
        max: f64,
    },

    /// Adjacent ramps do not join continuously.
    ///
    /// Usually indicates a splice that forgot to snap the join
    /// endpoints onto each other.
    #[error(
        "path discontinuity at ramp join {index}: \
         position gap {position_gap:.3e}, velocity gap {velocity_gap:.3e}"
    )]
    Discontinuity {
        /// Index of the earlier ramp of the discontinuous join.
        index: usize,
        /// Largest per-axis position gap at the join.
        position_gap: f64,
        /// Largest per-axis velocity gap at the join.
        velocity_gap: f64,
    },

    /// An operation needs at least one element.
    ///
    /// Provide at least one waypoint or ramp.
    #[error("empty waypoint or ramp sequence")]
    EmptyPath,
}

impl TrajError {
    /// Creates an invalid-limits error with the given message.
    ///
    /// # Example
    ///
    /// ```
    /// use traj_types::TrajError;
    ///
    /// let error = TrajError::invalid_limits("velocity must be positive");
    /// assert!(error.to_string().contains("velocity must be positive"));
    /// ```
    #[must_use]
    pub fn invalid_limits(message: impl Into<String>) -> Self {
        Self::InvalidLimits(message.into())
    }

    /// Returns `true` if this is a continuity violation.
    ///
    /// # Example
    ///
    /// ```
    /// use traj_types::TrajError;
    ///
    /// let error = TrajError::Discontinuity {
    ///     index: 3,
    ///     position_gap: 1e-3,
    ///     velocity_gap: 0.0,
    /// };
    /// assert!(error.is_discontinuity());
    /// assert!(!TrajError::EmptyPath.is_discontinuity());
    /// ```
    #[must_use]
    pub const fn is_discontinuity(&self) -> bool {
        matches!(self, Self::Discontinuity { .. })
    }
}
