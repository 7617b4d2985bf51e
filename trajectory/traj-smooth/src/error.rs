//! Error types for the smoother core.
//!
//! This module defines the [`SmoothError`] enum which represents all
//! unrecoverable failures of a smoothing run.

use traj_types::{CheckFlags, TrajError};

/// Errors that end a smoothing run.
///
/// Transient problems (a rejected state set during a shortcut attempt,
/// a segment that fails a constraint class) are handled internally by
/// skipping or slowing down; only unrecoverable conditions surface here.
///
/// # Example
///
/// ```
/// use traj_smooth::SmoothError;
/// use traj_types::CheckFlags;
///
/// let error = SmoothError::EmissionFailed {
///     ramp: 3,
///     flags: CheckFlags::ENV_COLLISIONS,
/// };
///
/// assert!(error.is_emission_failure());
/// assert!(error.to_string().contains("ramp 3"));
/// ```
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SmoothError {
    /// The input trajectory holds no waypoints.
    ///
    /// Provide a trajectory with at least one waypoint.
    #[error("input trajectory has no waypoints")]
    EmptyInput,

    /// An initial ramp could not satisfy the constraints after the
    /// bounded number of slow-down retries.
    ///
    /// The code names the constraint class that kept rejecting the
    /// segment even at the slowest attempted timing.
    #[error("initial ramp {segment} failed constraint checks (code {flags})")]
    InitialRampFailed {
        /// Index of the waypoint pair that failed.
        segment: usize,
        /// The failing constraint code.
        flags: CheckFlags,
    },

    /// The oracle rejected setting the state at a waypoint.
    ///
    /// This happens during initial-path conditioning, where a refused
    /// state cannot be skipped the way a shortcut attempt can.
    #[error("could not set state at waypoint {waypoint}")]
    StateSetting {
        /// Index of the offending waypoint.
        waypoint: usize,
    },

    /// The manifold projection rejected a midpoint.
    ///
    /// The waypoint pair straddles a region the projection cannot
    /// handle; check the input path against the constraint manifold.
    #[error("midpoint projection failed at waypoint {waypoint}")]
    ProjectionFailed {
        /// Index of the waypoint pair whose midpoint was rejected.
        waypoint: usize,
    },

    /// Midpoint insertion kept splitting without converging.
    ///
    /// The manifold bends too sharply for midpoint subdivision near
    /// this waypoint; add intermediate input waypoints there.
    #[error("too many consecutive projection insertions near waypoint {waypoint}")]
    ProjectionDiverged {
        /// Index of the waypoint where splitting diverged.
        waypoint: usize,
    },

    /// A ramp failed its emission re-check and no time dilation up to
    /// roughly two times the duration passed.
    ///
    /// The offending ramp was part of the unverified input; smoothing
    /// cannot certify it at any nearby timing.
    #[error("ramp {ramp} failed emission checks (code {flags}), no dilation passed")]
    EmissionFailed {
        /// Index of the failing ramp.
        ramp: usize,
        /// The failing constraint code.
        flags: CheckFlags,
    },

    /// The emitted waypoint timing disagrees with the accumulated ramp
    /// durations.
    ///
    /// Indicates inconsistent ramp timing, usually from malformed input
    /// timestamps.
    #[error("emitted duration {emitted:.6} deviates from expected {expected:.6}")]
    DurationMismatch {
        /// Sum of the emitted ramp durations.
        expected: f64,
        /// Duration of the emitted trajectory.
        emitted: f64,
    },

    /// A data-model error from the types layer.
    ///
    /// See [`TrajError`] for the structural invariant that failed.
    #[error(transparent)]
    Types(#[from] TrajError),
}

impl SmoothError {
    /// Returns `true` if this is an emission failure.
    ///
    /// # Example
    ///
    /// ```
    /// use traj_smooth::SmoothError;
    /// use traj_types::CheckFlags;
    ///
    /// let error = SmoothError::EmissionFailed {
    ///     ramp: 0,
    ///     flags: CheckFlags::ALL,
    /// };
    /// assert!(error.is_emission_failure());
    /// assert!(!SmoothError::EmptyInput.is_emission_failure());
    /// ```
    #[must_use]
    pub const fn is_emission_failure(&self) -> bool {
        matches!(
            self,
            Self::EmissionFailed { .. } | Self::DurationMismatch { .. }
        )
    }

    /// Returns `true` if this failure came from initial ramp
    /// construction rather than a later phase.
    ///
    /// # Example
    ///
    /// ```
    /// use traj_smooth::SmoothError;
    /// use traj_types::CheckFlags;
    ///
    /// let error = SmoothError::InitialRampFailed {
    ///     segment: 1,
    ///     flags: CheckFlags::TIME_BASED,
    /// };
    /// assert!(error.is_initial_ramp_failure());
    /// assert!(!SmoothError::EmptyInput.is_initial_ramp_failure());
    /// ```
    #[must_use]
    pub const fn is_initial_ramp_failure(&self) -> bool {
        matches!(
            self,
            Self::InitialRampFailed { .. }
                | Self::StateSetting { .. }
                | Self::ProjectionFailed { .. }
                | Self::ProjectionDiverged { .. }
        )
    }
}
