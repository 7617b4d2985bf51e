//! Multi-axis ramp solvers.
//!
//! Axes are coupled only through time: the minimum-duration solve finds
//! the slowest axis and re-times every other axis to that shared
//! duration. Straight-line profiles additionally share switch times by
//! construction, since every axis is a scaled copy of one path-parameter
//! ramp.

use nalgebra::DVector;
use tracing::trace;

use traj_types::{InterpMode, Limits, Ramp1d, RampNd, TrajError, EPSILON, EPSILON_T, EPSILON_V, EPSILON_X};

use crate::ramp1d::{solve_fixed_time_1d, solve_min_time_1d};

/// Growth factor applied when a shared duration falls inside an axis's
/// infeasible window.
const SYNC_GROWTH: f64 = 1.05;

/// Maximum number of shared-duration growth retries.
const MAX_SYNC_TRIES: usize = 32;

/// Borrowed per-axis bounds for the multi-axis solvers.
///
/// The velocity and acceleration vectors are often locally scaled copies
/// of the global limits, while the position bounds stay global, so the
/// four are borrowed independently.
#[derive(Debug, Clone, Copy)]
pub struct Bounds<'a> {
    /// Per-axis velocity magnitude bounds.
    pub vel: &'a DVector<f64>,
    /// Per-axis acceleration magnitude bounds.
    pub accel: &'a DVector<f64>,
    /// Per-axis position lower bounds.
    pub lower: &'a DVector<f64>,
    /// Per-axis position upper bounds.
    pub upper: &'a DVector<f64>,
}

impl<'a> Bounds<'a> {
    /// Bundles independently borrowed bound vectors.
    #[must_use]
    pub const fn new(
        vel: &'a DVector<f64>,
        accel: &'a DVector<f64>,
        lower: &'a DVector<f64>,
        upper: &'a DVector<f64>,
    ) -> Self {
        Self {
            vel,
            accel,
            lower,
            upper,
        }
    }

    /// Borrows all four bound vectors from a [`Limits`].
    #[must_use]
    pub fn from_limits(limits: &'a Limits) -> Self {
        Self {
            vel: limits.velocity(),
            accel: limits.acceleration(),
            lower: limits.lower(),
            upper: limits.upper(),
        }
    }

    fn dof(&self) -> usize {
        self.vel.len()
    }
}

/// Solves the minimum-duration ramp between two configuration states.
///
/// Per-axis minimum times determine the shared duration; every axis is
/// then re-timed to it. When the shared duration falls inside an axis's
/// infeasible window it is grown geometrically a bounded number of
/// times. Candidates whose interior extrema exit the position bounds are
/// rejected.
///
/// Returns `None` when no bounded profile exists.
///
/// # Example
///
/// ```
/// use nalgebra::DVector;
/// use traj_ramp::{solve_min_time, Bounds};
/// use traj_types::{InterpMode, Limits};
///
/// let limits = Limits::uniform(2, 1.0, 1.0);
/// let ramp = solve_min_time(
///     &DVector::zeros(2),
///     &DVector::zeros(2),
///     &DVector::from_vec(vec![1.0, 1.0]),
///     &DVector::zeros(2),
///     Bounds::from_limits(&limits),
///     InterpMode::PerAxis,
/// )
/// .unwrap();
/// assert!((ramp.duration() - 2.0).abs() < 1e-9);
/// ```
#[must_use]
pub fn solve_min_time(
    x0: &DVector<f64>,
    v0: &DVector<f64>,
    x1: &DVector<f64>,
    v1: &DVector<f64>,
    bounds: Bounds<'_>,
    interp: InterpMode,
) -> Option<RampNd> {
    let dof = bounds.dof();
    if x0.len() != dof || v0.len() != dof || x1.len() != dof || v1.len() != dof {
        return None;
    }

    if interp == InterpMode::Synchronized {
        if let Some(ramp) = solve_synchronized(x0, v0, x1, v1, bounds) {
            return Some(ramp);
        }
        // Boundary velocities are not collinear with the displacement:
        // fall back to per-axis timing.
    }

    let mut t_shared = 0.0_f64;
    for i in 0..dof {
        let axis =
            solve_min_time_1d(x0[i], v0[i], x1[i], v1[i], bounds.vel[i], bounds.accel[i])?;
        t_shared = t_shared.max(axis.ttotal);
    }

    let mut t = t_shared;
    for attempt in 0..MAX_SYNC_TRIES {
        if let Some(ramps) = solve_all_axes_fixed(x0, v0, x1, v1, t, bounds) {
            let ramp = RampNd::from_axis_ramps(ramps).ok()?;
            return within_position_bounds(&ramp, bounds).then_some(ramp);
        }
        trace!(attempt, duration = t, "shared duration infeasible, growing");
        t = t * SYNC_GROWTH + EPSILON_T;
    }
    None
}

/// Re-times every axis to a caller-chosen duration.
///
/// This is the fixed-duration entry used by emission time dilation: it
/// returns the per-axis ramps rather than a combined bundle so the caller
/// can decide how to regroup them.
///
/// Returns `None` when any axis has no bounded profile of that duration
/// or a profile exits the position bounds.
#[must_use]
pub fn solve_accel_bounded(
    x0: &DVector<f64>,
    v0: &DVector<f64>,
    x1: &DVector<f64>,
    v1: &DVector<f64>,
    t_total: f64,
    bounds: Bounds<'_>,
    interp: InterpMode,
) -> Option<Vec<Ramp1d>> {
    let dof = bounds.dof();
    if x0.len() != dof || v0.len() != dof || x1.len() != dof || v1.len() != dof {
        return None;
    }
    if interp == InterpMode::Synchronized {
        if let Some(ramp) = solve_synchronized_fixed(x0, v0, x1, v1, t_total, bounds) {
            return Some(ramp.ramps().to_vec());
        }
    }
    let ramps = solve_all_axes_fixed(x0, v0, x1, v1, t_total, bounds)?;
    for (i, ramp) in ramps.iter().enumerate() {
        let (lo, hi) = ramp.position_extrema();
        if lo < bounds.lower[i] - EPSILON_X || hi > bounds.upper[i] + EPSILON_X {
            return None;
        }
    }
    Some(ramps)
}

/// Solves a zero-endpoint-velocity profile along the straight segment.
///
/// All axes share the switch times of one path-parameter ramp scaled per
/// axis, so the configuration never leaves the line from `x0` to `x1`.
/// A negligible displacement yields a constant ramp.
#[must_use]
pub fn solve_straight_line(
    x0: &DVector<f64>,
    x1: &DVector<f64>,
    bounds: Bounds<'_>,
) -> Option<RampNd> {
    let dof = bounds.dof();
    if x0.len() != dof || x1.len() != dof {
        return None;
    }
    let displacement = x1 - x0;
    if displacement.amax() <= EPSILON_X {
        return Some(RampNd::constant(x0.clone()));
    }

    // Limits along the path parameter s in [0, 1].
    let mut v_path = f64::INFINITY;
    let mut a_path = f64::INFINITY;
    for i in 0..dof {
        let d = displacement[i].abs();
        if d > EPSILON {
            v_path = v_path.min(bounds.vel[i] / d);
            a_path = a_path.min(bounds.accel[i] / d);
        }
    }

    let path_ramp = solve_min_time_1d(0.0, 0.0, 1.0, 0.0, v_path, a_path)?;
    scale_path_ramp(&path_ramp, x0, x1, &displacement).ok()
}

/// Expands a path-parameter ramp into per-axis ramps sharing its switch
/// times.
fn scale_path_ramp(
    path_ramp: &Ramp1d,
    x0: &DVector<f64>,
    x1: &DVector<f64>,
    displacement: &DVector<f64>,
) -> Result<RampNd, TrajError> {
    let ramps = (0..x0.len())
        .map(|i| Ramp1d {
            x0: x0[i],
            v0: path_ramp.v0 * displacement[i],
            x1: x1[i],
            v1: path_ramp.v1 * displacement[i],
            a1: path_ramp.a1 * displacement[i],
            a2: path_ramp.a2 * displacement[i],
            tswitch1: path_ramp.tswitch1,
            tswitch2: path_ramp.tswitch2,
            ttotal: path_ramp.ttotal,
        })
        .collect();
    RampNd::from_axis_ramps(ramps)
}

/// Shared-switch-time minimum-time solve.
///
/// Valid only when both boundary velocities are collinear with the
/// displacement; returns `None` otherwise so the caller can fall back.
fn solve_synchronized(
    x0: &DVector<f64>,
    v0: &DVector<f64>,
    x1: &DVector<f64>,
    v1: &DVector<f64>,
    bounds: Bounds<'_>,
) -> Option<RampNd> {
    let displacement = x1 - x0;
    let (s0, s1) = collinear_speeds(&displacement, v0, v1)?;
    let (v_path, a_path) = path_limits(&displacement, bounds)?;
    let path_ramp = solve_min_time_1d(0.0, s0, 1.0, s1, v_path, a_path)?;
    let ramp = scale_path_ramp(&path_ramp, x0, x1, &displacement).ok()?;
    within_position_bounds(&ramp, bounds).then_some(ramp)
}

/// Shared-switch-time fixed-duration solve; see [`solve_synchronized`].
fn solve_synchronized_fixed(
    x0: &DVector<f64>,
    v0: &DVector<f64>,
    x1: &DVector<f64>,
    v1: &DVector<f64>,
    t_total: f64,
    bounds: Bounds<'_>,
) -> Option<RampNd> {
    let displacement = x1 - x0;
    let (s0, s1) = collinear_speeds(&displacement, v0, v1)?;
    let (v_path, a_path) = path_limits(&displacement, bounds)?;
    let path_ramp = solve_fixed_time_1d(0.0, s0, 1.0, s1, t_total, v_path, a_path)?;
    let ramp = scale_path_ramp(&path_ramp, x0, x1, &displacement).ok()?;
    within_position_bounds(&ramp, bounds).then_some(ramp)
}

/// Path-parameter velocities when `v0` and `v1` are scaled copies of the
/// displacement.
fn collinear_speeds(
    displacement: &DVector<f64>,
    v0: &DVector<f64>,
    v1: &DVector<f64>,
) -> Option<(f64, f64)> {
    let norm_sq = displacement.norm_squared();
    if norm_sq <= EPSILON {
        return None;
    }
    let s0 = v0.dot(displacement) / norm_sq;
    let s1 = v1.dot(displacement) / norm_sq;
    for i in 0..displacement.len() {
        if (v0[i] - s0 * displacement[i]).abs() > EPSILON_V
            || (v1[i] - s1 * displacement[i]).abs() > EPSILON_V
        {
            return None;
        }
    }
    Some((s0, s1))
}

fn path_limits(displacement: &DVector<f64>, bounds: Bounds<'_>) -> Option<(f64, f64)> {
    let mut v_path = f64::INFINITY;
    let mut a_path = f64::INFINITY;
    for i in 0..displacement.len() {
        let d = displacement[i].abs();
        if d > EPSILON {
            v_path = v_path.min(bounds.vel[i] / d);
            a_path = a_path.min(bounds.accel[i] / d);
        }
    }
    (v_path.is_finite() && a_path.is_finite()).then_some((v_path, a_path))
}

fn solve_all_axes_fixed(
    x0: &DVector<f64>,
    v0: &DVector<f64>,
    x1: &DVector<f64>,
    v1: &DVector<f64>,
    t_total: f64,
    bounds: Bounds<'_>,
) -> Option<Vec<Ramp1d>> {
    (0..bounds.dof())
        .map(|i| {
            solve_fixed_time_1d(
                x0[i],
                v0[i],
                x1[i],
                v1[i],
                t_total,
                bounds.vel[i],
                bounds.accel[i],
            )
        })
        .collect()
}

fn within_position_bounds(ramp: &RampNd, bounds: Bounds<'_>) -> bool {
    ramp.ramps().iter().enumerate().all(|(i, axis)| {
        let (lo, hi) = axis.position_extrema();
        lo >= bounds.lower[i] - EPSILON_X && hi <= bounds.upper[i] + EPSILON_X
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn vec2(a: f64, b: f64) -> DVector<f64> {
        DVector::from_vec(vec![a, b])
    }

    #[test]
    fn test_min_time_synchronizes_axes() {
        let limits = Limits::uniform(2, 1.0, 1.0);
        // Axis 0 moves 2.0 (min time 3.0), axis 1 moves 1.0 (min time 2.0).
        let ramp = solve_min_time(
            &vec2(0.0, 0.0),
            &vec2(0.0, 0.0),
            &vec2(2.0, 1.0),
            &vec2(0.0, 0.0),
            Bounds::from_limits(&limits),
            InterpMode::PerAxis,
        )
        .unwrap();
        assert_relative_eq!(ramp.duration(), 3.0, epsilon = 1e-6);
        assert!(ramp.is_valid());
        // The faster axis was stretched, not the slower one truncated.
        assert_relative_eq!(ramp.evaluate(ramp.duration())[1], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_min_time_diagonal() {
        let limits = Limits::uniform(2, 1.0, 1.0);
        let ramp = solve_min_time(
            &vec2(0.0, 0.0),
            &vec2(0.0, 0.0),
            &vec2(1.0, 1.0),
            &vec2(0.0, 0.0),
            Bounds::from_limits(&limits),
            InterpMode::PerAxis,
        )
        .unwrap();
        assert_relative_eq!(ramp.duration(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_min_time_rejects_position_overshoot() {
        // Approaching the upper bound at full speed forces an overshoot.
        let limits = Limits::new(
            DVector::from_vec(vec![1.0]),
            DVector::from_vec(vec![1.0]),
            DVector::from_vec(vec![-1.0]),
            DVector::from_vec(vec![1.0]),
        )
        .unwrap();
        let result = solve_min_time(
            &DVector::from_vec(vec![0.9]),
            &DVector::from_vec(vec![1.0]),
            &DVector::from_vec(vec![0.9]),
            &DVector::from_vec(vec![-1.0]),
            Bounds::from_limits(&limits),
            InterpMode::PerAxis,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_straight_line_trapezoid() {
        let limits = Limits::uniform(2, 1.0, 1.0);
        let ramp = solve_straight_line(
            &vec2(0.0, 0.0),
            &vec2(2.0, 1.0),
            Bounds::from_limits(&limits),
        )
        .unwrap();
        assert!(ramp.is_valid());
        // Axis 0 is the binding one: path limits are 1/2 in velocity and
        // acceleration, so s(t) is a 0.5-limited trapezoid.
        assert_relative_eq!(ramp.derivative(0.0)[0], 0.0);
        let mid = ramp.evaluate(0.5 * ramp.duration());
        // Straight line: axis1 = axis0 / 2 everywhere.
        assert_relative_eq!(mid[1], mid[0] * 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_straight_line_constant_for_tiny_move() {
        let limits = Limits::uniform(2, 1.0, 1.0);
        let ramp = solve_straight_line(
            &vec2(1.0, 1.0),
            &vec2(1.0, 1.0 + 1e-12),
            Bounds::from_limits(&limits),
        )
        .unwrap();
        assert_relative_eq!(ramp.duration(), 0.0);
    }

    #[test]
    fn test_straight_line_shares_switch_times() {
        let limits = Limits::uniform(3, 2.0, 4.0);
        let x1 = DVector::from_vec(vec![1.0, -2.0, 0.5]);
        let ramp = solve_straight_line(
            &DVector::zeros(3),
            &x1,
            Bounds::from_limits(&limits),
        )
        .unwrap();
        let first = ramp.ramps()[0];
        for axis in ramp.ramps() {
            assert_relative_eq!(axis.tswitch1, first.tswitch1);
            assert_relative_eq!(axis.tswitch2, first.tswitch2);
        }
    }

    #[test]
    fn test_accel_bounded_dilation() {
        let limits = Limits::uniform(2, 1.0, 1.0);
        let ramps = solve_accel_bounded(
            &vec2(0.0, 0.0),
            &vec2(0.0, 0.0),
            &vec2(1.0, 1.0),
            &vec2(0.0, 0.0),
            3.0,
            Bounds::from_limits(&limits),
            InterpMode::PerAxis,
        )
        .unwrap();
        assert_eq!(ramps.len(), 2);
        for ramp in &ramps {
            assert!(ramp.is_valid());
            assert_relative_eq!(ramp.ttotal, 3.0);
            assert!(ramp.a1.abs() < 1.0);
        }
    }

    #[test]
    fn test_accel_bounded_rejects_too_short() {
        let limits = Limits::uniform(1, 1.0, 1.0);
        let result = solve_accel_bounded(
            &DVector::zeros(1),
            &DVector::zeros(1),
            &DVector::from_vec(vec![1.0]),
            &DVector::zeros(1),
            1.0,
            Bounds::from_limits(&limits),
            InterpMode::PerAxis,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_synchronized_collinear_velocities() {
        let limits = Limits::uniform(2, 2.0, 2.0);
        // Velocities parallel to the displacement: exact shared timing.
        let ramp = solve_min_time(
            &vec2(0.0, 0.0),
            &vec2(0.4, 0.2),
            &vec2(2.0, 1.0),
            &vec2(0.0, 0.0),
            Bounds::from_limits(&limits),
            InterpMode::Synchronized,
        )
        .unwrap();
        assert!(ramp.is_valid());
        let first = ramp.ramps()[0];
        for axis in ramp.ramps() {
            assert_relative_eq!(axis.tswitch1, first.tswitch1, epsilon = 1e-12);
            assert_relative_eq!(axis.tswitch2, first.tswitch2, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_synchronized_falls_back_when_not_collinear() {
        let limits = Limits::uniform(2, 1.0, 1.0);
        let ramp = solve_min_time(
            &vec2(0.0, 0.0),
            &vec2(0.5, -0.5),
            &vec2(1.0, 1.0),
            &vec2(0.0, 0.0),
            Bounds::from_limits(&limits),
            InterpMode::Synchronized,
        )
        .unwrap();
        assert!(ramp.is_valid());
    }
}
