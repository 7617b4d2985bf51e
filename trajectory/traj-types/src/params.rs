//! Smoother configuration parameters.
//!
//! # Example
//!
//! ```
//! use nalgebra::DVector;
//! use traj_types::{Limits, SmootherParams};
//!
//! let params = SmootherParams::new(
//!     Limits::uniform(2, 1.0, 1.0),
//!     DVector::from_element(2, 0.01),
//! )
//! .unwrap()
//! .with_max_iterations(200)
//! .with_seed(42);
//! assert_eq!(params.max_iterations(), 200);
//! ```

use nalgebra::DVector;

use crate::error::TrajError;
use crate::limits::Limits;

/// Multi-axis interpolation mode for the ramp solvers.
///
/// Selects how the per-axis parabolic timings relate to each other when a
/// whole configuration is interpolated at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InterpMode {
    /// Each axis keeps its own switch times under the shared duration.
    #[default]
    PerAxis,
    /// All axes share the same switch times where the boundary
    /// velocities allow it; falls back to per-axis timing otherwise.
    Synchronized,
}

/// Configuration for the parabolic smoother.
///
/// Owns the kinematic [`Limits`], the per-axis sampling resolution, and
/// the scalar knobs of the shortcut loop. Scalars have the planner's
/// defaults and can be adjusted through the `with_*` builders.
#[derive(Debug, Clone)]
pub struct SmootherParams {
    limits: Limits,
    resolution: DVector<f64>,
    point_tolerance: f64,
    max_iterations: u32,
    step_length: f64,
    interp: InterpMode,
    has_timestamps: bool,
    output_accel_changes: bool,
    verify_initial_path: bool,
    search_vel_accel_mult: f64,
    seed: u64,
}

impl SmootherParams {
    /// Creates parameters from limits and per-axis resolution.
    ///
    /// # Errors
    ///
    /// Returns [`TrajError::DofMismatch`] when the resolution length
    /// disagrees with the limits, and [`TrajError::InvalidLimits`] when
    /// a resolution entry is not strictly positive.
    pub fn new(limits: Limits, resolution: DVector<f64>) -> Result<Self, TrajError> {
        if resolution.len() != limits.dof() {
            return Err(TrajError::DofMismatch {
                expected: limits.dof(),
                actual: resolution.len(),
            });
        }
        for (i, &r) in resolution.iter().enumerate() {
            if !(r > 0.0 && r.is_finite()) {
                return Err(TrajError::invalid_limits(format!(
                    "resolution for axis {i} must be positive, got {r}"
                )));
            }
        }
        Ok(Self {
            limits,
            resolution,
            point_tolerance: 10.0,
            max_iterations: 100,
            step_length: 0.001,
            interp: InterpMode::default(),
            has_timestamps: false,
            output_accel_changes: true,
            verify_initial_path: true,
            search_vel_accel_mult: 0.8,
            seed: 0,
        })
    }

    /// Sets the shortcut iteration cap.
    #[must_use]
    pub const fn with_max_iterations(mut self, iterations: u32) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Sets the controller step length.
    #[must_use]
    pub const fn with_step_length(mut self, step_length: f64) -> Self {
        self.step_length = step_length;
        self
    }

    /// Sets the switch-point sampling density multiplier.
    #[must_use]
    pub const fn with_point_tolerance(mut self, point_tolerance: f64) -> Self {
        self.point_tolerance = point_tolerance;
        self
    }

    /// Sets the multi-axis interpolation mode.
    #[must_use]
    pub const fn with_interp_mode(mut self, interp: InterpMode) -> Self {
        self.interp = interp;
        self
    }

    /// Declares whether the input trajectory carries usable timing.
    #[must_use]
    pub const fn with_timestamps(mut self, has_timestamps: bool) -> Self {
        self.has_timestamps = has_timestamps;
        self
    }

    /// Selects per-switch output waypoints (default) or ramp ends only.
    #[must_use]
    pub const fn with_output_accel_changes(mut self, output: bool) -> Self {
        self.output_accel_changes = output;
        self
    }

    /// Enables collision verification of the initial ramps.
    #[must_use]
    pub const fn with_verify_initial_path(mut self, verify: bool) -> Self {
        self.verify_initial_path = verify;
        self
    }

    /// Sets the recovery gain applied after a successful shortcut.
    #[must_use]
    pub const fn with_search_vel_accel_mult(mut self, mult: f64) -> Self {
        self.search_vel_accel_mult = mult;
        self
    }

    /// Sets the planning random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Kinematic limits.
    #[must_use]
    pub const fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Per-axis sampling resolution.
    #[must_use]
    pub const fn resolution(&self) -> &DVector<f64> {
        &self.resolution
    }

    /// Number of axes.
    #[must_use]
    pub fn dof(&self) -> usize {
        self.limits.dof()
    }

    /// Switch-point sampling density multiplier.
    #[must_use]
    pub const fn point_tolerance(&self) -> f64 {
        self.point_tolerance
    }

    /// Shortcut iteration cap.
    #[must_use]
    pub const fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Controller step length.
    #[must_use]
    pub const fn step_length(&self) -> f64 {
        self.step_length
    }

    /// Minimum duration improvement a shortcut must achieve.
    #[must_use]
    pub fn min_time_step(&self) -> f64 {
        self.step_length * 0.99
    }

    /// Multi-axis interpolation mode.
    #[must_use]
    pub const fn interp_mode(&self) -> InterpMode {
        self.interp
    }

    /// Whether the input trajectory carries usable timing.
    #[must_use]
    pub const fn has_timestamps(&self) -> bool {
        self.has_timestamps
    }

    /// Whether acceleration switches become output waypoints.
    #[must_use]
    pub const fn output_accel_changes(&self) -> bool {
        self.output_accel_changes
    }

    /// Whether the initial ramps are collision-verified.
    #[must_use]
    pub const fn verify_initial_path(&self) -> bool {
        self.verify_initial_path
    }

    /// Recovery gain applied after a successful shortcut.
    #[must_use]
    pub const fn search_vel_accel_mult(&self) -> f64 {
        self.search_vel_accel_mult
    }

    /// Planning random seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Per-axis switch-point sampling tolerance:
    /// `resolution[i] * point_tolerance`.
    #[must_use]
    pub fn sampling_tolerance(&self) -> DVector<f64> {
        &self.resolution * self.point_tolerance
    }
}
