//! Randomized shortcutting.
//!
//! Each iteration samples two times on the current path, solves a
//! minimum-time ramp between the sampled states, validates it, and on
//! success splices it in place of the original sub-path. Time-based
//! rejections shrink the local velocity/acceleration limits and retry;
//! the last successful scale factor seeds the next iteration so the
//! search does not repeatedly probe limits the constraints cannot meet.

use nalgebra::DVector;
use rand::Rng;
use tracing::{debug, trace, warn};

use traj_ramp::{solve_min_time, Bounds};
use traj_types::{CheckFlags, CheckReturn, DynamicPath, RampNd, SmootherParams};

use crate::checker::RampChecker;
use crate::oracle::ConstraintOracle;
use crate::progress::{ProgressAction, ProgressTracker};

/// Slow-down retry budget inside one shortcut attempt.
const MAX_SLOWDOWN_TRIES: usize = 4;

/// Give up on an attempt once the cumulative scale drops below this.
const MIN_CUR_MULT: f64 = 0.01;

/// Tolerated duration deviation when re-solving a segment whose checked
/// terminal velocity differs from the requested one.
const RESOLVE_DURATION_TOLERANCE: f64 = 0.01;

/// Result of a shortcut run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutOutcome {
    /// The iteration budget ran out.
    Completed {
        /// Number of accepted shortcuts.
        shortcuts: usize,
        /// Number of slow-down retries across all iterations.
        slowdowns: usize,
    },
    /// The progress callback requested interruption.
    Interrupted,
}

/// Runs up to `params.max_iterations()` randomized shortcut attempts on
/// `path`, mutating it in place.
///
/// Iteration zero always attempts the full span, so a path that can be
/// replaced by a single minimum-time ramp is. The total duration never
/// increases; every accepted shortcut reduces it by at least
/// `params.min_time_step()`.
///
/// # Example
///
/// ```
/// use nalgebra::DVector;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
/// use traj_smooth::{
///     build_initial_ramps, shortcut_path, ProgressTracker, RampChecker,
///     ShortcutOutcome, UnconstrainedOracle,
/// };
/// use traj_types::{DynamicPath, Limits, SmootherParams};
///
/// let params = SmootherParams::new(
///     Limits::uniform(2, 1.0, 1.0),
///     DVector::from_element(2, 0.01),
/// )
/// .unwrap()
/// .with_max_iterations(1);
/// let mut oracle = UnconstrainedOracle::new(2);
/// let checker = RampChecker::new(
///     params.sampling_tolerance(),
///     params.limits().velocity().clone(),
/// );
///
/// // A stop-at-the-corner L: two 2 s ramps.
/// let waypoints = vec![
///     DVector::from_vec(vec![0.0, 0.0]),
///     DVector::from_vec(vec![1.0, 0.0]),
///     DVector::from_vec(vec![1.0, 1.0]),
/// ];
/// let ramps = build_initial_ramps(&mut oracle, &checker, &params, &waypoints).unwrap();
/// let mut path = DynamicPath::with_ramps(params.limits().clone(), ramps).unwrap();
/// assert!((path.total_time() - 4.0).abs() < 1e-9);
///
/// let mut rng = StdRng::seed_from_u64(0);
/// let mut progress = ProgressTracker::new(None);
/// let outcome = shortcut_path(
///     &mut oracle,
///     &checker,
///     &params,
///     &mut rng,
///     &mut path,
///     &mut progress,
/// );
/// assert!(matches!(
///     outcome,
///     ShortcutOutcome::Completed { shortcuts: 1, .. }
/// ));
/// // The whole corner is replaced by the 2 s diagonal.
/// assert!((path.total_time() - 2.0).abs() < 1e-6);
/// ```
pub fn shortcut_path<C, R>(
    oracle: &mut C,
    checker: &RampChecker,
    params: &SmootherParams,
    rng: &mut R,
    path: &mut DynamicPath,
    progress: &mut ProgressTracker<'_>,
) -> ShortcutOutcome
where
    C: ConstraintOracle,
    R: Rng,
{
    let dof = params.dof();
    let limits = params.limits().clone();
    let ramps = path.ramps_mut();

    let mut ramp_start = Vec::with_capacity(ramps.len());
    let mut end_time = 0.0;
    for ramp in ramps.iter() {
        ramp_start.push(end_time);
        end_time += ramp.duration();
    }

    let mut shortcuts = 0usize;
    let mut slowdowns = 0usize;
    let fi_search_mult = 1.0 / params.search_vel_accel_mult();
    let mut start_time_mult = 1.0_f64;
    let min_time_step = params.min_time_step();

    let mut x0 = DVector::zeros(dof);
    let mut x1 = DVector::zeros(dof);
    let mut dx0 = DVector::zeros(dof);
    let mut dx1 = DVector::zeros(dof);
    let mut vel_limits = limits.velocity().clone();
    let mut accel_limits = limits.acceleration().clone();
    let mut outramps: Vec<RampNd> = Vec::new();
    let mut accum: Vec<RampNd> = Vec::new();

    for iter in 0..params.max_iterations() {
        let (mut t1, mut t2) = if iter == 0 {
            (0.0, end_time)
        } else {
            (
                rng.gen_range(0.0..=end_time),
                rng.gen_range(0.0..=end_time),
            )
        };
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        let i1 = ramp_start.partition_point(|&s| s <= t1).saturating_sub(1);
        let i2 = ramp_start.partition_point(|&s| s <= t2).saturating_sub(1);
        let u1 = (t1 - ramp_start[i1]).clamp(0.0, ramps[i1].duration());
        let u2 = (t2 - ramp_start[i2]).clamp(0.0, ramps[i2].duration());

        ramps[i1].evaluate_into(u1, &mut x0);
        if oracle.set_state(&x0).is_err() {
            continue;
        }
        oracle.filter_state(&mut x0);
        ramps[i2].evaluate_into(u2, &mut x1);
        if oracle.set_state(&x1).is_err() {
            continue;
        }
        oracle.filter_state(&mut x1);
        ramps[i1].derivative_into(u1, &mut dx0);
        ramps[i2].derivative_into(u2, &mut dx1);
        progress.advance();

        // Local limits: the manipulator constraint tightens them, the
        // last successful scale seeds them, and the sampled velocities
        // floor them.
        vel_limits.copy_from(limits.velocity());
        accel_limits.copy_from(limits.acceleration());
        if oracle.has_manip_constraints() {
            if oracle.set_state(&x0).is_err() {
                trace!(iter, "state set error before manip limit query");
                continue;
            }
            oracle.max_velocities_accelerations(&dx0, &mut vel_limits, &mut accel_limits);
            if oracle.set_state(&x1).is_err() {
                trace!(iter, "state set error before manip limit query");
                continue;
            }
            oracle.max_velocities_accelerations(&dx1, &mut vel_limits, &mut accel_limits);
        }
        for j in 0..dof {
            let min_vel = dx0[j].abs().max(dx1[j].abs());
            if vel_limits[j] < min_vel {
                vel_limits[j] = min_vel;
            } else {
                let cap = min_vel.max(limits.velocity()[j] * start_time_mult);
                if vel_limits[j] > cap {
                    vel_limits[j] = cap;
                }
            }
            let cap = limits.acceleration()[j] * start_time_mult;
            if accel_limits[j] > cap {
                accel_limits[j] = cap;
            }
        }

        let mut cur_mult = start_time_mult;
        let mut success = false;
        accum.clear();
        for _slowdown in 0..MAX_SLOWDOWN_TRIES {
            let bounds = Bounds::new(
                &vel_limits,
                &accel_limits,
                limits.lower(),
                limits.upper(),
            );
            let Some(intermediate) =
                solve_min_time(&x0, &dx0, &x1, &dx1, bounds, params.interp_mode())
            else {
                break;
            };
            if intermediate.duration() + min_time_step > t2 - t1 {
                trace!(
                    iter,
                    t1,
                    t2,
                    duration = intermediate.duration(),
                    "shortcut makes no significant improvement"
                );
                break;
            }
            if progress.poll() == ProgressAction::Interrupt {
                return ShortcutOutcome::Interrupted;
            }

            accum.clear();
            let mut check = CheckReturn::passed();
            let mut pieces = vec![intermediate];
            for ipiece in 0..pieces.len() {
                if ipiece > 0 {
                    // Snap to the previous piece's terminal to cancel
                    // float drift.
                    let (prev_x1, prev_v1) =
                        (pieces[ipiece - 1].x1().clone(), pieces[ipiece - 1].v1().clone());
                    pieces[ipiece].set_initial(&prev_x1, &prev_v1);
                }
                if oracle.set_state(pieces[ipiece].x1()).is_err() {
                    check = CheckReturn::failed(CheckFlags::STATE_SETTING_ERROR);
                    break;
                }
                let mut terminal = pieces[ipiece].x1().clone();
                oracle.filter_state(&mut terminal);
                let terminal_vel = pieces[ipiece].v1().clone();
                pieces[ipiece].set_terminal(&terminal, &terminal_vel);

                check = checker.check2(oracle, &mut pieces[ipiece], CheckFlags::ALL, &mut outramps);
                if !check.is_passed() {
                    break;
                }

                if check.different_velocity && !outramps.is_empty() {
                    // The checked geometry ends at a different velocity:
                    // re-solve the last stretch for the requested
                    // terminal state.
                    let last = match outramps.last() {
                        Some(last) => last,
                        None => break,
                    };
                    let last_duration = last.duration();
                    let resolve_bounds = Bounds::new(
                        &vel_limits,
                        &accel_limits,
                        limits.lower(),
                        limits.upper(),
                    );
                    let resolved = solve_min_time(
                        last.x0(),
                        last.v0(),
                        pieces[ipiece].x1(),
                        pieces[ipiece].v1(),
                        resolve_bounds,
                        params.interp_mode(),
                    );
                    match resolved {
                        None => {
                            warn!(iter, "failed to re-solve for differing terminal velocity");
                            break;
                        }
                        Some(resolved) => {
                            if (resolved.duration() - last_duration).abs()
                                > RESOLVE_DURATION_TOLERANCE
                            {
                                debug!(
                                    iter,
                                    duration = resolved.duration(),
                                    "re-solved terminal ramp deviates too much"
                                );
                                check = CheckReturn::failed(CheckFlags::FINAL_VALUES_NOT_REACHED);
                                break;
                            }
                            outramps.pop();
                            outramps.push(resolved);
                        }
                    }
                }
                accum.append(&mut outramps);
            }

            if check.is_passed() {
                success = true;
                break;
            }
            if check.flags == CheckFlags::TIME_BASED {
                trace!(
                    iter,
                    mult = check.time_based_surpass_mult,
                    cur_mult,
                    "slowing shortcut down"
                );
                for j in 0..dof {
                    let min_vel = dx0[j].abs().max(dx1[j].abs());
                    vel_limits[j] = (vel_limits[j] * check.time_based_surpass_mult).max(min_vel);
                    accel_limits[j] *= check.time_based_surpass_mult;
                }
                cur_mult *= check.time_based_surpass_mult;
                if cur_mult < MIN_CUR_MULT {
                    debug!(iter, cur_mult, "scale too small, giving up on this attempt");
                    break;
                }
                slowdowns += 1;
            } else {
                trace!(iter, code = %check.flags, "shortcut rejected by constraints");
                break;
            }
        }

        if !success {
            continue;
        }
        if accum.is_empty() {
            warn!(iter, "accumulated shortcut ramps are empty");
            continue;
        }
        start_time_mult = (cur_mult * fi_search_mult).min(1.0);
        shortcuts += 1;

        // Splice: trim the boundary ramps to the sampled times, snap
        // their cut ends onto the replacement, drop everything between.
        let mut i2 = i2;
        if i1 == i2 {
            let duplicate = ramps[i1].clone();
            ramps.insert(i1, duplicate);
            i2 = i1 + 1;
        }
        let trim = ramps[i1].duration() - u1;
        ramps[i1].trim_back(trim);
        let (front_x0, front_v0) = (accum[0].x0().clone(), accum[0].v0().clone());
        ramps[i1].set_terminal(&front_x0, &front_v0);
        ramps[i2].trim_front(u2);
        let last = accum.len() - 1;
        let (back_x1, back_v1) = (accum[last].x1().clone(), accum[last].v1().clone());
        ramps[i2].set_initial(&back_x1, &back_v1);
        if i1 + 1 < i2 {
            ramps.drain(i1 + 1..i2);
        }
        let insert_at = i1 + 1;
        ramps.splice(insert_at..insert_at, accum.drain(..));

        #[cfg(debug_assertions)]
        for pair in ramps.windows(2) {
            for j in 0..dof {
                debug_assert!(
                    (pair[0].x1()[j] - pair[1].x0()[j]).abs() <= traj_types::EPSILON_X,
                    "position discontinuity after splice"
                );
                debug_assert!(
                    (pair[0].v1()[j] - pair[1].v0()[j]).abs() <= traj_types::EPSILON_V,
                    "velocity discontinuity after splice"
                );
            }
        }

        ramp_start.clear();
        end_time = 0.0;
        for ramp in ramps.iter() {
            ramp_start.push(end_time);
            end_time += ramp.duration();
        }
        debug!(iter, shortcuts, slowdowns, end_time, "accepted shortcut");
    }

    debug!(shortcuts, slowdowns, end_time, "shortcut loop finished");
    ShortcutOutcome::Completed {
        shortcuts,
        slowdowns,
    }
}
