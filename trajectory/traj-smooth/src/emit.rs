//! Output trajectory emission.
//!
//! The final path is expanded into a timed waypoint sequence with one
//! sample per acceleration switch. Ramps that were never validated
//! against the full constraint mask are re-checked here; a failing ramp
//! is re-timed through a ladder of dilation factors before the whole
//! plan is declared failed.

use tracing::{debug, warn};

use traj_ramp::{solve_accel_bounded, Bounds};
use traj_types::{
    CheckFlags, DynamicPath, Interpolation, RampNd, SmootherParams, Trajectory, TrajectoryPoint,
    EPSILON_T,
};

use crate::checker::RampChecker;
use crate::error::SmoothError;
use crate::oracle::ConstraintOracle;
use crate::progress::{ProgressAction, ProgressTracker};

/// Dilation ladder: cumulative product just under 2x.
const DILATION_STEPS: usize = 5;

/// First dilation factor; each step adds 0.05.
const DILATION_BASE: f64 = 1.05;

/// Tolerated gap between the emitted and accumulated durations.
const DURATION_TOLERANCE: f64 = 0.01;

/// Result of the emission phase.
#[derive(Debug)]
pub enum EmitOutcome {
    /// The finished output trajectory.
    Trajectory(Trajectory),
    /// The progress callback requested interruption.
    Interrupted,
}

/// Expands `path` into a timed output trajectory.
///
/// Positions interpolate quadratically between emitted waypoints,
/// velocities linearly; the `is_waypoint` flag marks the last switch of
/// each ramp. Perturbation checking is disabled while re-verifying the
/// edge ramps, which connect to the unperturbed start and goal.
///
/// # Errors
///
/// Fails when an unchecked ramp keeps violating constraints through the
/// whole dilation ladder, or when the emitted timing disagrees with the
/// accumulated ramp durations.
///
/// # Example
///
/// ```
/// use nalgebra::DVector;
/// use traj_smooth::{
///     build_initial_ramps, emit_trajectory, EmitOutcome, ProgressTracker,
///     RampChecker, UnconstrainedOracle,
/// };
/// use traj_types::{DynamicPath, Interpolation, Limits, SmootherParams};
///
/// let params = SmootherParams::new(
///     Limits::uniform(1, 1.0, 1.0),
///     DVector::from_element(1, 0.01),
/// )
/// .unwrap();
/// let mut oracle = UnconstrainedOracle::new(1);
/// let mut checker = RampChecker::new(
///     params.sampling_tolerance(),
///     params.limits().velocity().clone(),
/// );
///
/// let ramps = build_initial_ramps(
///     &mut oracle,
///     &checker,
///     &params,
///     &[DVector::zeros(1), DVector::from_vec(vec![1.0])],
/// )
/// .unwrap();
/// let path = DynamicPath::with_ramps(params.limits().clone(), ramps).unwrap();
///
/// let mut progress = ProgressTracker::new(None);
/// let outcome =
///     emit_trajectory(&mut oracle, &mut checker, &params, &path, &mut progress).unwrap();
/// let EmitOutcome::Trajectory(trajectory) = outcome else {
///     unreachable!("no callback registered");
/// };
/// assert_eq!(trajectory.interpolation(), Interpolation::Quadratic);
/// // Origin plus the triangle's apex and end.
/// assert_eq!(trajectory.len(), 3);
/// assert!((trajectory.duration() - path.total_time()).abs() < 1e-6);
/// ```
pub fn emit_trajectory<C: ConstraintOracle>(
    oracle: &mut C,
    checker: &mut RampChecker,
    params: &SmootherParams,
    path: &DynamicPath,
    progress: &mut ProgressTracker<'_>,
) -> Result<EmitOutcome, SmoothError> {
    let Some(first) = path.ramps().first() else {
        return Err(SmoothError::EmptyInput);
    };

    let mut trajectory = Trajectory::new(path.dof(), Interpolation::Quadratic);
    trajectory.push(TrajectoryPoint {
        positions: first.x0().clone(),
        velocities: Some(first.v0().clone()),
        delta_time: 0.0,
        is_waypoint: true,
    })?;

    let trim_edges = 2.0 * params.step_length();
    let mut expected_duration = 0.0;
    let mut outramps = Vec::new();
    let mut switch_times = Vec::new();

    for (iramp, rampnd) in path.ramps().iter().enumerate() {
        let mut emitted: Vec<RampNd> = vec![rampnd.clone()];

        if !rampnd.constraint_checked() {
            // Edge ramps connect to the jittered start/goal: trim the
            // contact zone out of the re-check and skip perturbation.
            checker.set_use_perturbation(false);
            let mut trimmed = rampnd.clone();
            let mut was_trimmed = false;
            let mut should_check = true;
            if iramp == 0 {
                if rampnd.duration() <= trim_edges + EPSILON_T {
                    should_check = false;
                } else {
                    trimmed.trim_front(trim_edges);
                    was_trimmed = true;
                }
            } else if iramp + 1 == path.len() {
                if rampnd.duration() <= trim_edges + EPSILON_T {
                    should_check = false;
                } else {
                    trimmed.trim_back(trim_edges);
                    was_trimmed = true;
                }
            }

            if should_check {
                let ret = checker.check2(oracle, &mut trimmed, CheckFlags::ALL, &mut outramps);
                if !ret.is_passed() {
                    match dilate_ramp(
                        oracle, checker, params, rampnd, &trimmed, was_trimmed, &mut outramps,
                    ) {
                        Some(replacement) => emitted = replacement,
                        None => {
                            warn!(
                                ramp = iramp,
                                code = %ret.flags,
                                "ramp keeps violating constraints through dilation"
                            );
                            checker.set_use_perturbation(true);
                            return Err(SmoothError::EmissionFailed {
                                ramp: iramp,
                                flags: ret.flags,
                            });
                        }
                    }
                }
            }
            checker.set_use_perturbation(true);
            progress.advance();
            if progress.poll() == ProgressAction::Interrupt {
                return Ok(EmitOutcome::Interrupted);
            }
        }

        for ramp in &emitted {
            expected_duration += ramp.duration();
            if params.output_accel_changes() {
                ramp.collect_switch_times(&mut switch_times, false);
            } else {
                switch_times.clear();
                switch_times.push(ramp.duration());
            }
            let mut prev = 0.0;
            for (k, &t) in switch_times.iter().enumerate() {
                trajectory.push(TrajectoryPoint {
                    positions: ramp.evaluate(t),
                    velocities: Some(ramp.derivative(t)),
                    delta_time: t - prev,
                    is_waypoint: k + 1 == switch_times.len(),
                })?;
                prev = t;
            }
        }
    }

    let emitted_duration = trajectory.duration();
    if (expected_duration - emitted_duration).abs() >= DURATION_TOLERANCE {
        return Err(SmoothError::DurationMismatch {
            expected: expected_duration,
            emitted: emitted_duration,
        });
    }
    debug!(
        waypoints = trajectory.len(),
        duration = emitted_duration,
        "emitted output trajectory"
    );
    Ok(EmitOutcome::Trajectory(trajectory))
}

/// Walks the dilation ladder for a ramp that failed its re-check.
///
/// Each step grows the duration and re-times the *trimmed* ramp; once a
/// dilated version passes, the *untrimmed* ramp is re-timed to the same
/// duration and emitted. If that final re-solve fails the ladder stops
/// without trying larger factors.
fn dilate_ramp<C: ConstraintOracle>(
    oracle: &mut C,
    checker: &RampChecker,
    params: &SmootherParams,
    original: &RampNd,
    trimmed: &RampNd,
    was_trimmed: bool,
    outramps: &mut Vec<RampNd>,
) -> Option<Vec<RampNd>> {
    let limits = params.limits();
    let bounds = Bounds::from_limits(limits);
    let mut mult = DILATION_BASE;
    let mut end_time = trimmed.duration();

    for step in 0..DILATION_STEPS {
        end_time *= mult;
        let Some(axis_ramps) = solve_accel_bounded(
            trimmed.x0(),
            trimmed.v0(),
            trimmed.x1(),
            trimmed.v1(),
            end_time,
            bounds,
            params.interp_mode(),
        ) else {
            continue;
        };
        let Ok(mut candidate) = RampNd::from_axis_ramps(axis_ramps) else {
            continue;
        };
        debug!(step, end_time, "re-checking dilated ramp");
        if !checker
            .check2(oracle, &mut candidate, CheckFlags::ALL, outramps)
            .is_passed()
        {
            mult += 0.05;
            continue;
        }

        if was_trimmed {
            // The trimmed version passed: re-time the full ramp to the
            // same duration. If that fails, stop the ladder entirely.
            let axis_ramps = solve_accel_bounded(
                original.x0(),
                original.v0(),
                original.x1(),
                original.v1(),
                end_time,
                bounds,
                params.interp_mode(),
            )?;
            let full = RampNd::from_axis_ramps(axis_ramps).ok()?;
            return Some(vec![full]);
        }
        return Some(vec![candidate]);
    }
    None
}
