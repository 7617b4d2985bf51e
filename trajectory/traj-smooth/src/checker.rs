//! Per-ramp feasibility checking.
//!
//! A ramp is validated in two phases: every configuration at an
//! acceleration-switch time is checked individually (midpoint first, to
//! reject hopeless ramps early), then each switch-to-switch segment is
//! handed to the oracle. A projecting oracle may substitute manifold
//! configurations for a segment; the checker then rebuilds the segment
//! as smaller linear-velocity ramps whose velocities are consistent with
//! the substituted geometry.

use nalgebra::DVector;
use tracing::{debug, trace, warn};

use traj_types::{
    CheckFlags, CheckReturn, ConstraintReturn, Interval, RampNd, EPSILON, EPSILON_T, EPSILON_V,
    EPSILON_X,
};

use crate::oracle::ConstraintOracle;

/// Slow-down factor reported when the oracle flags a time-based failure
/// without more specific information.
pub const DEFAULT_SURPASS_MULT: f64 = 0.8;

/// Floor for the slow-down factor derived from an over-limit projected
/// velocity.
const MIN_VELOCITY_SURPASS_MULT: f64 = 0.09;

/// Validates ramps against a [`ConstraintOracle`].
///
/// # Example
///
/// ```
/// use nalgebra::DVector;
/// use traj_smooth::{RampChecker, UnconstrainedOracle};
/// use traj_types::{CheckFlags, RampNd};
///
/// let checker = RampChecker::new(
///     DVector::from_element(1, 0.1),
///     DVector::from_element(1, 1.0),
/// );
/// let mut oracle = UnconstrainedOracle::new(1);
/// let mut ramp = RampNd::from_pos_vel_time(
///     DVector::zeros(1),
///     DVector::zeros(1),
///     DVector::from_vec(vec![1.0]),
///     DVector::from_vec(vec![1.0]),
///     2.0,
/// )
/// .unwrap();
/// let mut out = Vec::new();
/// let ret = checker.check2(&mut oracle, &mut ramp, CheckFlags::ALL, &mut out);
/// assert!(ret.is_passed());
/// assert!(ramp.constraint_checked());
/// ```
#[derive(Debug, Clone)]
pub struct RampChecker {
    tol: DVector<f64>,
    vel_limit: DVector<f64>,
    use_perturbation: bool,
}

impl RampChecker {
    /// Creates a checker with per-axis sampling tolerances and velocity
    /// limits.
    #[must_use]
    pub const fn new(tol: DVector<f64>, vel_limit: DVector<f64>) -> Self {
        Self {
            tol,
            vel_limit,
            use_perturbation: true,
        }
    }

    /// Enables or disables the perturbation bit on outgoing masks.
    ///
    /// Disabled while re-verifying the first and last ramp during
    /// emission, which connect to the unperturbed start and goal.
    pub const fn set_use_perturbation(&mut self, enabled: bool) {
        self.use_perturbation = enabled;
    }

    /// Whether outgoing masks carry the perturbation bit.
    #[must_use]
    pub const fn use_perturbation(&self) -> bool {
        self.use_perturbation
    }

    /// Checks a single configuration and velocity.
    pub fn config_feasible<C: ConstraintOracle>(
        &self,
        oracle: &mut C,
        q: &DVector<f64>,
        dq: &DVector<f64>,
        mut flags: CheckFlags,
    ) -> CheckReturn {
        if self.use_perturbation {
            flags |= CheckFlags::WITH_PERTURBATION;
        }
        match oracle.check_all_constraints(q, q, dq, dq, 0.0, Interval::OpenStart, flags, None) {
            Ok(code) if code.is_empty() => CheckReturn::passed(),
            Ok(code) if code == CheckFlags::TIME_BASED => {
                CheckReturn::time_based(DEFAULT_SURPASS_MULT)
            }
            Ok(code) => CheckReturn::failed(code),
            Err(err) => {
                warn!(error = %err, "constraint oracle failed during config check");
                CheckReturn::failed(CheckFlags::ALL)
            }
        }
    }

    /// Checks one switch-to-switch segment, emitting validated sub-ramps.
    ///
    /// When the oracle substitutes projected configurations, `outramps`
    /// receives one linear-velocity ramp per substituted sample and the
    /// final sub-ramp's terminal state may differ from `(b, db)`.
    #[allow(clippy::too_many_arguments)]
    pub fn segment_feasible<C: ConstraintOracle>(
        &self,
        oracle: &mut C,
        a: &DVector<f64>,
        b: &DVector<f64>,
        da: &DVector<f64>,
        db: &DVector<f64>,
        elapsed: f64,
        mut flags: CheckFlags,
        outramps: &mut Vec<RampNd>,
    ) -> CheckReturn {
        outramps.clear();
        if elapsed <= EPSILON {
            return self.config_feasible(oracle, a, da, flags);
        }
        if self.use_perturbation {
            flags |= CheckFlags::WITH_PERTURBATION;
        }

        let fill = oracle.projects_configurations();
        let mut constraint_ret = ConstraintReturn::new();
        let result = if fill {
            flags |= CheckFlags::FILL_CHECKED;
            oracle.check_all_constraints(
                a,
                b,
                da,
                db,
                elapsed,
                Interval::OpenStart,
                flags,
                Some(&mut constraint_ret),
            )
        } else {
            oracle.check_all_constraints(a, b, da, db, elapsed, Interval::OpenStart, flags, None)
        };
        let code = match result {
            Ok(code) => code,
            Err(err) => {
                warn!(error = %err, "constraint oracle failed during segment check");
                return CheckReturn::failed(CheckFlags::ALL);
            }
        };
        if !code.is_empty() {
            if code == CheckFlags::TIME_BASED {
                return CheckReturn::time_based(DEFAULT_SURPASS_MULT);
            }
            return CheckReturn::failed(code);
        }

        if fill && !constraint_ret.is_empty() {
            // The oracle walked a projected path: rebuild it as smaller
            // ramps whose velocities match the substituted positions.
            let mut cur_pos = a.clone();
            let mut cur_vel = da.clone();
            let mut cur_time = 0.0;
            for (t, q) in constraint_ret.iter() {
                let delta = t - cur_time;
                if delta <= EPSILON {
                    continue;
                }
                let inv = 1.0 / delta;
                let mut new_vel = DVector::zeros(a.len());
                for i in 0..a.len() {
                    new_vel[i] = 2.0 * inv * (q[i] - cur_pos[i]) - cur_vel[i];
                    if new_vel[i].abs() > self.vel_limit[i] + EPSILON {
                        let mult = (0.9 * self.vel_limit[i] / new_vel[i].abs())
                            .max(MIN_VELOCITY_SURPASS_MULT);
                        debug!(
                            axis = i,
                            velocity = new_vel[i],
                            limit = self.vel_limit[i],
                            "projected velocity exceeds limit"
                        );
                        return CheckReturn::time_based(mult);
                    }
                }
                match RampNd::from_pos_vel_time(
                    cur_pos.clone(),
                    cur_vel.clone(),
                    q.clone(),
                    new_vel.clone(),
                    delta,
                ) {
                    Ok(mut ramp) => {
                        ramp.set_constraint_checked(true);
                        outramps.push(ramp);
                    }
                    Err(_) => return CheckReturn::failed(CheckFlags::ALL),
                }
                cur_time = t;
                cur_pos.copy_from(q);
                cur_vel = new_vel;
            }
        }

        if outramps.is_empty() {
            match RampNd::from_pos_vel_time(a.clone(), da.clone(), b.clone(), db.clone(), elapsed)
            {
                Ok(mut ramp) => {
                    ramp.set_constraint_checked(true);
                    outramps.push(ramp);
                }
                Err(_) => return CheckReturn::failed(CheckFlags::ALL),
            }
        }

        if oracle.has_manip_constraints() && flags.contains(CheckFlags::TIME_BASED) {
            match oracle.check_manip_ramps(outramps) {
                Ok(ret) if !ret.is_passed() => return ret,
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "manipulator constraint check failed");
                    return CheckReturn::failed(CheckFlags::ALL);
                }
            }
        }

        CheckReturn::passed()
    }

    /// Validates a whole ramp: endpoints, every switch-time
    /// configuration, then every switch-to-switch segment.
    ///
    /// On success with the full constraint mask the ramp is memoized as
    /// constraint-checked. `outramps` receives the validated (possibly
    /// subdivided) ramps. A terminal position drift beyond tolerance
    /// fails with [`CheckFlags::FINAL_VALUES_NOT_REACHED`]; a terminal
    /// velocity drift passes but sets
    /// [`CheckReturn::different_velocity`].
    ///
    /// # Panics
    ///
    /// Panics when a sampling tolerance is not strictly positive or the
    /// ramp width disagrees with the checker.
    pub fn check2<C: ConstraintOracle>(
        &self,
        oracle: &mut C,
        rampnd: &mut RampNd,
        flags: CheckFlags,
        outramps: &mut Vec<RampNd>,
    ) -> CheckReturn {
        assert_eq!(self.tol.len(), rampnd.dof(), "tolerance width mismatch");
        assert!(
            self.tol.iter().all(|&t| t > 0.0),
            "sampling tolerances must be positive"
        );
        outramps.clear();
        let dof = rampnd.dof();

        let mut switch_times = Vec::new();
        rampnd.collect_switch_times(&mut switch_times, true);

        let ret = self.config_feasible(oracle, rampnd.x0(), rampnd.v0(), flags);
        if !ret.is_passed() {
            return ret;
        }
        let ret = self.config_feasible(oracle, rampnd.x1(), rampnd.v1(), flags);
        if !ret.is_passed() {
            return ret;
        }

        // Check every switch-time configuration, midpoint first: the
        // middle sample is the most informative rejection point.
        let mut order: Vec<usize> = (0..switch_times.len()).collect();
        let mid = order.len() / 2;
        order.swap(0, mid);
        let mut q = DVector::zeros(dof);
        let mut dq = DVector::zeros(dof);
        for &idx in &order {
            rampnd.evaluate_into(switch_times[idx], &mut q);
            if oracle.needs_derivative() {
                rampnd.derivative_into(switch_times[idx], &mut dq);
            }
            let ret = self.config_feasible(oracle, &q, &dq, flags);
            if !ret.is_passed() {
                return ret;
            }
        }

        // Sweep switch-to-switch segments, advancing through whatever
        // terminal states the oracle substituted.
        let mut q0 = rampnd.x0().clone();
        let mut dq0 = rampnd.v0().clone();
        let mut q1 = DVector::zeros(dof);
        let mut dq1 = DVector::zeros(dof);
        let mut segment_ramps = Vec::new();
        for iswitch in 1..switch_times.len() {
            rampnd.evaluate_into(switch_times[iswitch], &mut q1);
            let mut elapsed = switch_times[iswitch] - switch_times[iswitch - 1];

            if oracle.needs_derivative() {
                rampnd.derivative_into(switch_times[iswitch], &mut dq1);
                // Projection may have moved q0 off the analytic ramp, so
                // the sampled terminal velocity can disagree with the
                // actual segment. Re-derive the elapsed time from the
                // average velocities, weighting axes by how far they
                // moved, and recompute the terminal velocity from it.
                let mut expected = 0.0;
                let mut total_weight = 0.0;
                for i in 0..dof {
                    let avg = 0.5 * (dq0[i] + dq1[i]);
                    if avg.abs() > EPSILON {
                        let weight = (q1[i] - q0[i]).abs();
                        expected += weight * (q1[i] - q0[i]) / avg;
                        total_weight += weight;
                    }
                }
                if total_weight > EPSILON {
                    let new_elapsed = expected / total_weight;
                    if (elapsed - new_elapsed).abs() > EPSILON_T {
                        trace!(
                            old = elapsed,
                            new = new_elapsed,
                            "recomputing segment elapsed time"
                        );
                        elapsed = new_elapsed;
                        if elapsed > EPSILON {
                            let inv = 1.0 / elapsed;
                            for i in 0..dof {
                                dq1[i] = 2.0 * inv * (q1[i] - q0[i]) - dq0[i];
                            }
                        } else {
                            dq1.copy_from(&dq0);
                        }
                    }
                }
            }

            let ret = self.segment_feasible(
                oracle,
                &q0,
                &q1,
                &dq0,
                &dq1,
                elapsed,
                flags,
                &mut segment_ramps,
            );
            if !ret.is_passed() {
                return ret;
            }
            if let Some(last) = segment_ramps.last() {
                q0.copy_from(last.x1());
                dq0.copy_from(last.v1());
            }
            outramps.append(&mut segment_ramps);
        }

        // Terminal reconciliation against the requested endpoint.
        let mut different_velocity = false;
        for i in 0..dof {
            if (q0[i] - rampnd.x1()[i]).abs() > EPSILON_X {
                debug!(
                    axis = i,
                    gap = q0[i] - rampnd.x1()[i],
                    "sweep did not reach the terminal position"
                );
                return CheckReturn::failed(CheckFlags::FINAL_VALUES_NOT_REACHED);
            }
            if (dq0[i] - rampnd.v1()[i]).abs() > EPSILON_V {
                different_velocity = true;
            }
        }

        if flags.contains(CheckFlags::DEFAULT_MASK) {
            rampnd.set_constraint_checked(true);
        }
        let mut ret = CheckReturn::passed();
        ret.different_velocity = different_velocity;
        ret
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::oracle::{OracleError, UnconstrainedOracle};
    use approx::assert_relative_eq;

    fn checker(dof: usize) -> RampChecker {
        RampChecker::new(
            DVector::from_element(dof, 0.1),
            DVector::from_element(dof, 1.0),
        )
    }

    fn linear_ramp(x0: f64, v0: f64, x1: f64, v1: f64, t: f64) -> RampNd {
        RampNd::from_pos_vel_time(
            DVector::from_vec(vec![x0]),
            DVector::from_vec(vec![v0]),
            DVector::from_vec(vec![x1]),
            DVector::from_vec(vec![v1]),
            t,
        )
        .unwrap()
    }

    /// Rejects everything with a fixed code.
    struct RejectingOracle {
        code: CheckFlags,
    }

    impl ConstraintOracle for RejectingOracle {
        fn dof(&self) -> usize {
            1
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
            Ok(self.code)
        }
    }

    /// Substitutes a projected midpoint on every segment check.
    struct ProjectingOracle {
        offset: f64,
    }

    impl ConstraintOracle for ProjectingOracle {
        fn dof(&self) -> usize {
            1
        }

        fn check_all_constraints(
            &mut self,
            a: &DVector<f64>,
            b: &DVector<f64>,
            _da: &DVector<f64>,
            _db: &DVector<f64>,
            elapsed: f64,
            _interval: Interval,
            flags: CheckFlags,
            fill: Option<&mut ConstraintReturn>,
        ) -> Result<CheckFlags, OracleError> {
            if elapsed > 0.0 && flags.contains(CheckFlags::FILL_CHECKED) {
                if let Some(ret) = fill {
                    let mid = DVector::from_vec(vec![0.5 * (a[0] + b[0]) + self.offset]);
                    ret.push(0.5 * elapsed, mid);
                    ret.push(elapsed, b.clone());
                }
            }
            Ok(CheckFlags::NONE)
        }

        fn projects_configurations(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_check2_passes_and_memoizes() {
        let checker = checker(1);
        let mut oracle = UnconstrainedOracle::new(1);
        let mut ramp = linear_ramp(0.0, 0.0, 1.0, 1.0, 2.0);
        let mut out = Vec::new();
        let ret = checker.check2(&mut oracle, &mut ramp, CheckFlags::ALL, &mut out);
        assert!(ret.is_passed());
        assert!(!ret.different_velocity);
        assert!(ramp.constraint_checked());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_check2_partial_mask_does_not_memoize() {
        let checker = checker(1);
        let mut oracle = UnconstrainedOracle::new(1);
        let mut ramp = linear_ramp(0.0, 0.0, 1.0, 1.0, 2.0);
        let mut out = Vec::new();
        let ret = checker.check2(&mut oracle, &mut ramp, CheckFlags::TIME_BASED, &mut out);
        assert!(ret.is_passed());
        assert!(!ramp.constraint_checked());
    }

    #[test]
    fn test_check2_idempotent() {
        let checker = checker(1);
        let mut oracle = UnconstrainedOracle::new(1);
        let mut ramp = linear_ramp(0.0, 0.0, 1.0, 1.0, 2.0);
        let mut out1 = Vec::new();
        let mut out2 = Vec::new();
        let first = checker.check2(&mut oracle, &mut ramp, CheckFlags::ALL, &mut out1);
        let second = checker.check2(&mut oracle, &mut ramp, CheckFlags::ALL, &mut out2);
        assert_eq!(first.flags, second.flags);
        assert_eq!(out1.len(), out2.len());
        assert_relative_eq!(out1[0].duration(), out2[0].duration());
    }

    #[test]
    fn test_check2_propagates_rejection() {
        let checker = checker(1);
        let mut oracle = RejectingOracle {
            code: CheckFlags::ENV_COLLISIONS,
        };
        let mut ramp = linear_ramp(0.0, 0.0, 1.0, 1.0, 2.0);
        let mut out = Vec::new();
        let ret = checker.check2(&mut oracle, &mut ramp, CheckFlags::ALL, &mut out);
        assert_eq!(ret.flags, CheckFlags::ENV_COLLISIONS);
    }

    #[test]
    fn test_time_based_rejection_carries_surpass_mult() {
        let checker = checker(1);
        let mut oracle = RejectingOracle {
            code: CheckFlags::TIME_BASED,
        };
        let mut ramp = linear_ramp(0.0, 0.0, 1.0, 1.0, 2.0);
        let mut out = Vec::new();
        let ret = checker.check2(&mut oracle, &mut ramp, CheckFlags::ALL, &mut out);
        assert_eq!(ret.flags, CheckFlags::TIME_BASED);
        assert_relative_eq!(ret.time_based_surpass_mult, DEFAULT_SURPASS_MULT);
    }

    #[test]
    fn test_projection_subdivides_segment() {
        let checker = checker(1);
        let mut oracle = ProjectingOracle { offset: 0.0 };
        let mut ramp = linear_ramp(0.0, 0.0, 1.0, 1.0, 2.0);
        let mut out = Vec::new();
        let ret = checker.check2(&mut oracle, &mut ramp, CheckFlags::ALL, &mut out);
        assert!(ret.is_passed());
        // One segment split at its midpoint sample.
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(RampNd::constraint_checked));
        // Sub-ramps join continuously.
        assert_relative_eq!(out[0].x1()[0], out[1].x0()[0], epsilon = 1e-12);
        assert_relative_eq!(out[0].v1()[0], out[1].v0()[0], epsilon = 1e-12);
    }

    #[test]
    fn test_projection_far_from_ramp_is_different_velocity_or_slowdown() {
        let checker = checker(1);
        // A large sideways offset makes the reconstructed velocities
        // exceed the limit.
        let mut oracle = ProjectingOracle { offset: 2.0 };
        let mut ramp = linear_ramp(0.0, 0.0, 1.0, 1.0, 2.0);
        let mut out = Vec::new();
        let ret = checker.check2(&mut oracle, &mut ramp, CheckFlags::ALL, &mut out);
        assert_eq!(ret.flags, CheckFlags::TIME_BASED);
        assert!(ret.time_based_surpass_mult < 1.0);
        assert!(ret.time_based_surpass_mult >= MIN_VELOCITY_SURPASS_MULT);
    }

    #[test]
    fn test_segment_feasible_zero_elapsed_checks_config() {
        let checker = checker(1);
        let mut oracle = UnconstrainedOracle::new(1);
        let q = DVector::zeros(1);
        let mut out = Vec::new();
        let ret =
            checker.segment_feasible(&mut oracle, &q, &q, &q, &q, 0.0, CheckFlags::ALL, &mut out);
        assert!(ret.is_passed());
        assert!(out.is_empty());
    }
}
