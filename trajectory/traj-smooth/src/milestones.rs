//! Initial ramp construction from a waypoint sequence.
//!
//! Every waypoint pair becomes a straight-line, stop-at-each-end ramp
//! whose timing already satisfies the time-based constraints: a segment
//! flagged as too fast is re-solved under scaled-down limits until it
//! passes or the retry budget runs out.
//!
//! When the oracle projects onto a constraint manifold, the waypoint
//! sequence is conditioned first: any pair whose projected midpoint
//! strays from the Euclidean midpoint gets the projected point inserted
//! between them, so the straight segments stay near the manifold.

use nalgebra::DVector;
use tracing::{debug, trace};

use traj_ramp::{solve_straight_line, Bounds};
use traj_types::{CheckFlags, CheckReturn, RampNd, SmootherParams};

use crate::checker::RampChecker;
use crate::error::SmoothError;
use crate::oracle::ConstraintOracle;

/// Squared distance between the projected and Euclidean midpoints above
/// which a projected point is inserted.
const PROJECTION_SPLIT_THRESHOLD: f64 = 1e-5;

/// Bound on consecutive midpoint insertions before giving up.
const MAX_CONSECUTIVE_INSERTIONS: usize = 10;

/// Retry budget for slowing a segment down.
const MAX_SLOWDOWN_TRIES: usize = 30;

/// Builds the initial stop-at-each-waypoint ramp sequence.
///
/// A single waypoint yields one constant ramp. The returned ramps are
/// marked constraint-checked when initial-path verification is disabled,
/// except across freshly inserted projection points, which must be
/// verified on their first feasibility check.
///
/// # Errors
///
/// Fails when the oracle rejects a midpoint state or projection, when
/// midpoint insertion diverges, or when a segment cannot satisfy the
/// time-based constraints within the retry budget.
///
/// # Example
///
/// ```
/// use nalgebra::DVector;
/// use traj_smooth::{build_initial_ramps, RampChecker, UnconstrainedOracle};
/// use traj_types::{Limits, SmootherParams};
///
/// let params = SmootherParams::new(
///     Limits::uniform(2, 1.0, 1.0),
///     DVector::from_element(2, 0.01),
/// )
/// .unwrap();
/// let mut oracle = UnconstrainedOracle::new(2);
/// let checker = RampChecker::new(
///     params.sampling_tolerance(),
///     params.limits().velocity().clone(),
/// );
///
/// let ramps = build_initial_ramps(
///     &mut oracle,
///     &checker,
///     &params,
///     &[DVector::zeros(2), DVector::from_vec(vec![1.0, 0.0])],
/// )
/// .unwrap();
/// // One triangular ramp: 1 s accelerating, 1 s braking.
/// assert_eq!(ramps.len(), 1);
/// assert!((ramps[0].duration() - 2.0).abs() < 1e-9);
/// assert!(ramps[0].v0().norm() < 1e-12);
/// assert!(ramps[0].v1().norm() < 1e-12);
/// ```
pub fn build_initial_ramps<C: ConstraintOracle>(
    oracle: &mut C,
    checker: &RampChecker,
    params: &SmootherParams,
    waypoints: &[DVector<f64>],
) -> Result<Vec<RampNd>, SmoothError> {
    if waypoints.is_empty() {
        return Err(SmoothError::EmptyInput);
    }
    if waypoints.len() == 1 {
        return Ok(vec![RampNd::constant(waypoints[0].clone())]);
    }

    let (path, force_check) = condition_waypoints(oracle, params, waypoints)?;

    let mut flags = CheckFlags::TIME_BASED;
    if params.verify_initial_path() {
        flags |= CheckFlags::ENV_COLLISIONS | CheckFlags::SELF_COLLISIONS;
    }

    let limits = params.limits();
    let mut vel = limits.velocity().clone();
    let mut accel = limits.acceleration().clone();
    let mut outramps = Vec::new();
    let mut ramps = Vec::with_capacity(path.len() - 1);

    for i in 0..path.len() - 1 {
        vel.copy_from(limits.velocity());
        accel.copy_from(limits.acceleration());

        let mut solved: Option<RampNd> = None;
        let mut last = CheckReturn::failed(CheckFlags::ALL);
        for attempt in 0..MAX_SLOWDOWN_TRIES {
            let bounds = Bounds::new(&vel, &accel, limits.lower(), limits.upper());
            let Some(ramp) = solve_straight_line(&path[i], &path[i + 1], bounds) else {
                return Err(SmoothError::InitialRampFailed {
                    segment: i,
                    flags: CheckFlags::ALL,
                });
            };

            let mut times = Vec::new();
            ramp.collect_switch_times(&mut times, true);
            last = CheckReturn::passed();
            let mut q0 = ramp.evaluate(0.0);
            let mut dq0 = ramp.derivative(0.0);
            for pair in times.windows(2) {
                let q1 = ramp.evaluate(pair[1]);
                let dq1 = ramp.derivative(pair[1]);
                last = checker.segment_feasible(
                    oracle,
                    &q0,
                    &q1,
                    &dq0,
                    &dq1,
                    pair[1] - pair[0],
                    flags,
                    &mut outramps,
                );
                if !last.is_passed() {
                    break;
                }
                q0 = q1;
                dq0 = dq1;
            }

            if last.is_passed() {
                solved = Some(ramp);
                break;
            }
            if last.flags == CheckFlags::TIME_BASED {
                trace!(
                    segment = i,
                    attempt,
                    mult = last.time_based_surpass_mult,
                    "initial ramp too fast, scaling limits down"
                );
                vel *= last.time_based_surpass_mult;
                accel *= last.time_based_surpass_mult;
            } else {
                return Err(SmoothError::InitialRampFailed {
                    segment: i,
                    flags: last.flags,
                });
            }
        }

        let Some(mut ramp) = solved else {
            return Err(SmoothError::InitialRampFailed {
                segment: i,
                flags: last.flags,
            });
        };
        if !params.verify_initial_path() && !force_check[i] {
            ramp.set_constraint_checked(true);
        }
        ramps.push(ramp);
    }

    Ok(ramps)
}

/// Inserts projected midpoints wherever the manifold strays from the
/// straight segments. Returns the conditioned path and a per-waypoint
/// flag marking points that must be verified on first check.
fn condition_waypoints<C: ConstraintOracle>(
    oracle: &mut C,
    params: &SmootherParams,
    waypoints: &[DVector<f64>],
) -> Result<(Vec<DVector<f64>>, Vec<bool>), SmoothError> {
    let mut path: Vec<DVector<f64>> = waypoints.to_vec();
    let mut force_check = vec![false; path.len()];
    if !oracle.has_neighbor_state() {
        return Ok((path, force_check));
    }

    let dof = params.dof();
    let mut consecutive = 0usize;
    let mut i = 0usize;
    while i + 1 < path.len() {
        let delta = (&path[i + 1] - &path[i]) * 0.5;
        let mut mid = path[i].clone();
        if oracle.set_state(&mid).is_err() {
            return Err(SmoothError::StateSetting { waypoint: i });
        }
        match oracle.neighbor_state(&mut mid, &delta, true) {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                return Err(SmoothError::ProjectionFailed { waypoint: i });
            }
        }

        let mut dist_sq = 0.0;
        for axis in 0..dof {
            let expected = 0.5 * (path[i + 1][axis] + path[i][axis]);
            let gap = expected - mid[axis];
            dist_sq += gap * gap;
        }
        if dist_sq > PROJECTION_SPLIT_THRESHOLD {
            debug!(waypoint = i, dist_sq, "inserting projected midpoint");
            force_check[i + 1] = true;
            force_check.insert(i + 1, true);
            path.insert(i + 1, mid);
            consecutive += 2;
            if consecutive > MAX_CONSECUTIVE_INSERTIONS {
                return Err(SmoothError::ProjectionDiverged { waypoint: i });
            }
            continue;
        }
        consecutive = consecutive.saturating_sub(1);
        i += 1;
    }
    Ok((path, force_check))
}
