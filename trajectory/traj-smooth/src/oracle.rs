//! The constraint-oracle boundary.
//!
//! The smoother never inspects the environment itself: collision
//! checking, closed-chain projection, and manipulator limits live behind
//! [`ConstraintOracle`]. The core calls it with candidate segments and
//! reacts to the returned [`CheckFlags`] codes.

use nalgebra::DVector;

use traj_types::{CheckFlags, CheckReturn, ConstraintReturn, Interval, RampNd};

/// An error raised inside a constraint oracle.
///
/// The checker treats any oracle error as a total failure of that call
/// (code [`CheckFlags::ALL`]) and the surrounding iteration moves on.
#[derive(Debug, thiserror::Error)]
#[error("constraint oracle error: {0}")]
pub struct OracleError(pub String);

impl OracleError {
    /// Creates an oracle error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// External feasibility and projection callbacks.
///
/// Only [`Self::dof`] and [`Self::check_all_constraints`] are required;
/// every hook defaults to a permissive no-op so simple spaces implement
/// exactly as much as they have.
pub trait ConstraintOracle {
    /// Number of configuration axes this oracle checks.
    fn dof(&self) -> usize;

    /// Checks the straight/quadratic segment from `(a, da)` to `(b, db)`
    /// lasting `elapsed` against the constraint classes in `flags`.
    ///
    /// A zero `elapsed` checks the single configuration `a`. Returns the
    /// failing constraint bits, [`CheckFlags::NONE`] on success. When
    /// `flags` contains [`CheckFlags::FILL_CHECKED`] and the oracle
    /// substitutes projected configurations, it records them in `fill`.
    ///
    /// # Errors
    ///
    /// Implementations may fail arbitrarily; the caller converts errors
    /// to [`CheckFlags::ALL`].
    #[allow(clippy::too_many_arguments)]
    fn check_all_constraints(
        &mut self,
        a: &DVector<f64>,
        b: &DVector<f64>,
        da: &DVector<f64>,
        db: &DVector<f64>,
        elapsed: f64,
        interval: Interval,
        flags: CheckFlags,
        fill: Option<&mut ConstraintReturn>,
    ) -> Result<CheckFlags, OracleError>;

    /// Pushes a configuration into the oracle's world state.
    ///
    /// # Errors
    ///
    /// A rejected state set makes the caller skip the current shortcut
    /// attempt.
    fn set_state(&mut self, _q: &DVector<f64>) -> Result<(), OracleError> {
        Ok(())
    }

    /// Canonicalizes a configuration in place (for example, re-reading
    /// the state after the oracle snapped it onto a manifold).
    fn filter_state(&self, _q: &mut DVector<f64>) {}

    /// Whether the oracle supports state setting at all. Shortcutting is
    /// skipped when it does not.
    fn has_state_hooks(&self) -> bool {
        true
    }

    /// Projects `q + delta` onto the constraint manifold, writing the
    /// result into `q`. Returning `false` rejects the neighbor.
    ///
    /// # Errors
    ///
    /// Implementations may fail arbitrarily; during initial-path
    /// conditioning an error aborts the plan.
    fn neighbor_state(
        &mut self,
        q: &mut DVector<f64>,
        delta: &DVector<f64>,
        _hard_only: bool,
    ) -> Result<bool, OracleError> {
        *q += delta;
        Ok(true)
    }

    /// Whether [`Self::neighbor_state`] does real projection. Initial
    /// waypoint conditioning only runs when it does.
    fn has_neighbor_state(&self) -> bool {
        false
    }

    /// Whether the oracle needs velocities alongside configurations.
    fn needs_derivative(&self) -> bool {
        true
    }

    /// Whether checked segments may come back with substituted
    /// (projected) configurations, so the checker should request fills.
    fn projects_configurations(&self) -> bool {
        false
    }

    /// Whether manipulator Cartesian speed/acceleration constraints are
    /// active.
    fn has_manip_constraints(&self) -> bool {
        false
    }

    /// Tightens `vel`/`accel` in place for the manipulator constraint at
    /// the current state moving with `dx`.
    fn max_velocities_accelerations(
        &mut self,
        _dx: &DVector<f64>,
        _vel: &mut DVector<f64>,
        _accel: &mut DVector<f64>,
    ) {
    }

    /// Checks manipulator constraints over already-validated ramps.
    ///
    /// # Errors
    ///
    /// Implementations may fail arbitrarily; the caller converts errors
    /// to [`CheckFlags::ALL`].
    fn check_manip_ramps(&mut self, _ramps: &[RampNd]) -> Result<CheckReturn, OracleError> {
        Ok(CheckReturn::passed())
    }
}

/// An oracle with no constraints at all.
///
/// Accepts every configuration and segment; useful for smoothing in
/// free space and as a baseline in tests.
///
/// # Example
///
/// ```
/// use traj_smooth::{ConstraintOracle, UnconstrainedOracle};
///
/// let oracle = UnconstrainedOracle::new(6);
/// assert_eq!(oracle.dof(), 6);
/// assert!(!oracle.has_neighbor_state());
/// ```
#[derive(Debug, Clone)]
pub struct UnconstrainedOracle {
    dof: usize,
}

impl UnconstrainedOracle {
    /// Creates an unconstrained oracle for `dof` axes.
    #[must_use]
    pub const fn new(dof: usize) -> Self {
        Self { dof }
    }
}

impl ConstraintOracle for UnconstrainedOracle {
    fn dof(&self) -> usize {
        self.dof
    }

    fn check_all_constraints(
        &mut self,
        _a: &DVector<f64>,
        _b: &DVector<f64>,
        _da: &DVector<f64>,
        _db: &DVector<f64>,
        _elapsed: f64,
        _interval: Interval,
        _flags: CheckFlags,
        _fill: Option<&mut ConstraintReturn>,
    ) -> Result<CheckFlags, OracleError> {
        Ok(CheckFlags::NONE)
    }
}
