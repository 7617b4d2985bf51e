//! The smoothing planner front-end.
//!
//! Ties the phases together: ingest the input waypoints into a
//! [`DynamicPath`], shortcut it, and emit the output trajectory. The
//! planner owns the oracle, the checker, and the seeded random source,
//! so repeated plans over the same input produce identical output.

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};

use traj_types::{
    DynamicPath, Interpolation, RampNd, SmootherParams, Trajectory, TrajError, EPSILON_T,
    EPSILON_X,
};

use crate::checker::RampChecker;
use crate::emit::{emit_trajectory, EmitOutcome};
use crate::error::SmoothError;
use crate::milestones::build_initial_ramps;
use crate::oracle::ConstraintOracle;
use crate::progress::{PlanProgress, ProgressAction, ProgressTracker};
use crate::shortcut::{shortcut_path, ShortcutOutcome};

/// Tolerance for collapsing collinear waypoint triples.
const COLLINEAR_TOLERANCE: f64 = 100.0 * EPSILON_X * EPSILON_X;

/// Statistics of a finished smoothing run.
#[derive(Debug, Clone, Copy)]
pub struct SmoothStats {
    /// Accepted shortcut count.
    pub shortcuts: usize,
    /// Duration of the initial ramp sequence.
    pub initial_duration: f64,
    /// Duration of the emitted trajectory.
    pub final_duration: f64,
    /// Ramp count of the final path.
    pub ramps: usize,
}

/// Outcome of [`ParabolicSmoother::plan`].
#[derive(Debug)]
pub enum PlanOutcome {
    /// Smoothing finished; the output trajectory is ready.
    Smoothed {
        /// The emitted trajectory.
        trajectory: Trajectory,
        /// Run statistics.
        stats: SmoothStats,
    },
    /// The progress callback requested interruption; no output was
    /// produced.
    Interrupted,
}

/// Shortcut-based parabolic trajectory smoother.
///
/// # Example
///
/// ```
/// use nalgebra::DVector;
/// use traj_smooth::{ParabolicSmoother, PlanOutcome, UnconstrainedOracle};
/// use traj_types::{Limits, SmootherParams, Trajectory};
///
/// let params = SmootherParams::new(
///     Limits::uniform(2, 1.0, 1.0),
///     DVector::from_element(2, 0.01),
/// )
/// .unwrap();
/// let mut smoother = ParabolicSmoother::new(params, UnconstrainedOracle::new(2)).unwrap();
///
/// let input = Trajectory::from_positions(
///     2,
///     vec![
///         DVector::from_vec(vec![0.0, 0.0]),
///         DVector::from_vec(vec![1.0, 0.0]),
///         DVector::from_vec(vec![1.0, 1.0]),
///     ],
/// )
/// .unwrap();
///
/// match smoother.plan(&input).unwrap() {
///     PlanOutcome::Smoothed { trajectory, stats } => {
///         assert!(stats.final_duration <= stats.initial_duration + 1e-9);
///         assert!(trajectory.len() >= 2);
///     }
///     PlanOutcome::Interrupted => unreachable!(),
/// }
/// ```
pub struct ParabolicSmoother<C: ConstraintOracle> {
    params: SmootherParams,
    oracle: C,
    checker: RampChecker,
    rng: StdRng,
    on_progress: Option<Box<dyn FnMut(&PlanProgress) -> ProgressAction>>,
}

impl<C: ConstraintOracle> ParabolicSmoother<C> {
    /// Creates a planner from parameters and a constraint oracle.
    ///
    /// # Errors
    ///
    /// Returns [`TrajError::DofMismatch`] when the oracle disagrees with
    /// the parameters in axis count.
    pub fn new(params: SmootherParams, oracle: C) -> Result<Self, SmoothError> {
        if oracle.dof() != params.dof() {
            return Err(TrajError::DofMismatch {
                expected: params.dof(),
                actual: oracle.dof(),
            }
            .into());
        }
        let checker = RampChecker::new(
            params.sampling_tolerance(),
            params.limits().velocity().clone(),
        );
        let rng = StdRng::seed_from_u64(params.seed());
        Ok(Self {
            params,
            oracle,
            checker,
            rng,
            on_progress: None,
        })
    }

    /// Registers a cancellation callback, polled throughout planning.
    pub fn set_progress_callback(
        &mut self,
        callback: impl FnMut(&PlanProgress) -> ProgressAction + 'static,
    ) {
        self.on_progress = Some(Box::new(callback));
    }

    /// Removes any registered cancellation callback.
    pub fn clear_progress_callback(&mut self) {
        self.on_progress = None;
    }

    /// The planner parameters.
    #[must_use]
    pub const fn params(&self) -> &SmootherParams {
        &self.params
    }

    /// The constraint oracle.
    #[must_use]
    pub const fn oracle(&self) -> &C {
        &self.oracle
    }

    /// Mutable access to the constraint oracle.
    pub const fn oracle_mut(&mut self) -> &mut C {
        &mut self.oracle
    }

    /// Smooths `input` into a minimum-time output trajectory.
    ///
    /// The random source is reseeded from the parameters on every call,
    /// so planning the same input twice yields the same output.
    ///
    /// # Errors
    ///
    /// Fails when the input is empty or mismatched, when initial ramp
    /// construction cannot satisfy the time-based constraints, or when
    /// emission cannot validate a ramp through the dilation ladder.
    pub fn plan(&mut self, input: &Trajectory) -> Result<PlanOutcome, SmoothError> {
        if input.is_empty() {
            return Err(SmoothError::EmptyInput);
        }
        if input.dof() != self.params.dof() {
            return Err(TrajError::DofMismatch {
                expected: self.params.dof(),
                actual: input.dof(),
            }
            .into());
        }
        self.rng = StdRng::seed_from_u64(self.params.seed());
        self.checker.set_use_perturbation(true);

        let timestamped = self.params.has_timestamps()
            && input.interpolation() == Interpolation::Quadratic
            && input.has_velocities();
        let ramps = if timestamped {
            debug!("consuming timestamped quadratic input verbatim");
            let mut ramps = ingest_timestamped(input)?;
            if !self.params.verify_initial_path() {
                for ramp in &mut ramps {
                    ramp.set_constraint_checked(true);
                }
            }
            ramps
        } else {
            let waypoints = collapse_waypoints(input);
            build_initial_ramps(&mut self.oracle, &self.checker, &self.params, &waypoints)?
        };
        if ramps.is_empty() {
            return Err(SmoothError::EmptyInput);
        }
        let mut path = DynamicPath::with_ramps(self.params.limits().clone(), ramps)?;
        let initial_duration = path.total_time();
        debug!(
            ramps = path.len(),
            duration = initial_duration,
            "initial ramp sequence ready"
        );

        let mut progress = ProgressTracker::new(
            self.on_progress
                .as_mut()
                .map(|cb| &mut **cb as &mut (dyn FnMut(&PlanProgress) -> ProgressAction + '_)),
        );
        if progress.poll() == ProgressAction::Interrupt {
            return Ok(PlanOutcome::Interrupted);
        }

        let mut shortcuts = 0;
        if self.oracle.has_state_hooks() {
            match shortcut_path(
                &mut self.oracle,
                &self.checker,
                &self.params,
                &mut self.rng,
                &mut path,
                &mut progress,
            ) {
                ShortcutOutcome::Interrupted => return Ok(PlanOutcome::Interrupted),
                ShortcutOutcome::Completed {
                    shortcuts: accepted,
                    ..
                } => shortcuts = accepted,
            }
        } else {
            debug!("oracle has no state hooks, skipping the shortcut phase");
        }

        progress.advance();
        if progress.poll() == ProgressAction::Interrupt {
            return Ok(PlanOutcome::Interrupted);
        }

        let trajectory = match emit_trajectory(
            &mut self.oracle,
            &mut self.checker,
            &self.params,
            &path,
            &mut progress,
        ) {
            Ok(EmitOutcome::Trajectory(trajectory)) => trajectory,
            Ok(EmitOutcome::Interrupted) => return Ok(PlanOutcome::Interrupted),
            Err(err) => {
                warn!(error = %err, input_waypoints = input.len(), "smoothing failed");
                return Err(err);
            }
        };

        let stats = SmoothStats {
            shortcuts,
            initial_duration,
            final_duration: trajectory.duration(),
            ramps: path.len(),
        };
        debug!(
            shortcuts,
            duration = stats.final_duration,
            waypoints = trajectory.len(),
            "smoothing finished"
        );
        Ok(PlanOutcome::Smoothed { trajectory, stats })
    }
}

impl<C: ConstraintOracle + std::fmt::Debug> std::fmt::Debug for ParabolicSmoother<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParabolicSmoother")
            .field("oracle", &self.oracle)
            .field("dof", &self.params.dof())
            .finish_non_exhaustive()
    }
}

/// Converts a timed quadratic input into ramps, one per segment.
///
/// Zero-duration segments are dropped (losing any embedded instantaneous
/// discontinuity); each drop is logged.
fn ingest_timestamped(input: &Trajectory) -> Result<Vec<RampNd>, SmoothError> {
    let dof = input.dof();
    let velocity_of = |point: &traj_types::TrajectoryPoint| {
        point
            .velocities
            .clone()
            .unwrap_or_else(|| DVector::zeros(dof))
    };
    let points = input.points();
    let mut prev_pos = points[0].positions.clone();
    let mut prev_vel = velocity_of(&points[0]);
    let mut ramps = Vec::with_capacity(points.len() - 1);
    for (index, point) in points.iter().enumerate().skip(1) {
        if point.delta_time <= EPSILON_T {
            warn!(index, "dropping zero-duration input segment");
            continue;
        }
        let ramp = RampNd::from_pos_vel_time(
            prev_pos.clone(),
            prev_vel.clone(),
            point.positions.clone(),
            velocity_of(point),
            point.delta_time,
        )?;
        prev_pos = point.positions.clone();
        prev_vel = velocity_of(point);
        ramps.push(ramp);
    }
    Ok(ramps)
}

/// Collapses collinear triples and duplicate waypoints.
fn collapse_waypoints(input: &Trajectory) -> Vec<DVector<f64>> {
    let dof = input.dof();
    let mut path: Vec<DVector<f64>> = Vec::with_capacity(input.len());
    for point in input.points() {
        let q = &point.positions;
        if path.len() >= 2 {
            let x0 = &path[path.len() - 2];
            let x1 = &path[path.len() - 1];
            let mut dot = 0.0;
            let mut len0 = 0.0;
            let mut len1 = 0.0;
            for i in 0..dof {
                let d0 = x0[i] - q[i];
                let d1 = x1[i] - q[i];
                dot += d0 * d1;
                len0 += d0 * d0;
                len1 += d1 * d1;
            }
            if (dot * dot - len0 * len1).abs() < COLLINEAR_TOLERANCE {
                let last = path.len() - 1;
                path[last] = q.clone();
                continue;
            }
        }
        if let Some(back) = path.last() {
            let manhattan: f64 = (0..dof).map(|i| (q[i] - back[i]).abs()).sum();
            if manhattan <= dof as f64 * f64::EPSILON {
                continue;
            }
        }
        path.push(q.clone());
    }
    path
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::oracle::UnconstrainedOracle;
    use approx::assert_relative_eq;
    use traj_types::{Limits, TrajectoryPoint};

    fn params(dof: usize) -> SmootherParams {
        SmootherParams::new(
            Limits::uniform(dof, 1.0, 1.0),
            DVector::from_element(dof, 0.01),
        )
        .unwrap()
    }

    #[test]
    fn test_collapse_collinear_and_duplicates() {
        let input = Trajectory::from_positions(
            1,
            vec![
                DVector::from_vec(vec![0.0]),
                DVector::from_vec(vec![0.0]), // duplicate
                DVector::from_vec(vec![1.0]),
                DVector::from_vec(vec![2.0]), // collinear
                DVector::from_vec(vec![3.0]), // collinear
            ],
        )
        .unwrap();
        let collapsed = collapse_waypoints(&input);
        assert_eq!(collapsed.len(), 2);
        assert_relative_eq!(collapsed[1][0], 3.0);
    }

    #[test]
    fn test_collapse_keeps_corners() {
        let input = Trajectory::from_positions(
            2,
            vec![
                DVector::from_vec(vec![0.0, 0.0]),
                DVector::from_vec(vec![1.0, 0.0]),
                DVector::from_vec(vec![1.0, 1.0]),
            ],
        )
        .unwrap();
        assert_eq!(collapse_waypoints(&input).len(), 3);
    }

    #[test]
    fn test_ingest_timestamped_drops_zero_segments() {
        let mut input = Trajectory::new(1, Interpolation::Quadratic);
        let mk = |x: f64, v: f64, dt: f64| TrajectoryPoint {
            positions: DVector::from_vec(vec![x]),
            velocities: Some(DVector::from_vec(vec![v])),
            delta_time: dt,
            is_waypoint: true,
        };
        input.push(mk(0.0, 0.0, 0.0)).unwrap();
        input.push(mk(0.0, 0.0, 0.0)).unwrap(); // zero-duration: dropped
        input.push(mk(1.0, 1.0, 2.0)).unwrap();
        let ramps = ingest_timestamped(&input).unwrap();
        assert_eq!(ramps.len(), 1);
        assert_relative_eq!(ramps[0].duration(), 2.0);
    }

    #[test]
    fn test_plan_rejects_empty_input() {
        let mut smoother =
            ParabolicSmoother::new(params(1), UnconstrainedOracle::new(1)).unwrap();
        let input = Trajectory::new(1, Interpolation::Linear);
        assert!(matches!(
            smoother.plan(&input),
            Err(SmoothError::EmptyInput)
        ));
    }

    #[test]
    fn test_plan_rejects_dof_mismatch() {
        let err = ParabolicSmoother::new(params(2), UnconstrainedOracle::new(3)).unwrap_err();
        assert!(matches!(
            err,
            SmoothError::Types(TrajError::DofMismatch { .. })
        ));
    }

    #[test]
    fn test_plan_single_waypoint() {
        let mut smoother =
            ParabolicSmoother::new(params(2), UnconstrainedOracle::new(2)).unwrap();
        let input =
            Trajectory::from_positions(2, vec![DVector::from_vec(vec![1.0, 2.0])]).unwrap();
        match smoother.plan(&input).unwrap() {
            PlanOutcome::Smoothed { trajectory, .. } => {
                assert_relative_eq!(trajectory.duration(), 0.0);
                assert_relative_eq!(trajectory.points()[0].positions[1], 2.0);
            }
            PlanOutcome::Interrupted => panic!("not interrupted"),
        }
    }

    #[test]
    fn test_plan_is_deterministic() {
        let input = Trajectory::from_positions(
            2,
            vec![
                DVector::from_vec(vec![0.0, 0.0]),
                DVector::from_vec(vec![1.0, 0.0]),
                DVector::from_vec(vec![1.0, 1.0]),
                DVector::from_vec(vec![0.0, 1.0]),
            ],
        )
        .unwrap();
        let run = || {
            let mut smoother = ParabolicSmoother::new(
                params(2).with_max_iterations(20).with_seed(11),
                UnconstrainedOracle::new(2),
            )
            .unwrap();
            match smoother.plan(&input).unwrap() {
                PlanOutcome::Smoothed { trajectory, .. } => trajectory,
                PlanOutcome::Interrupted => panic!("not interrupted"),
            }
        };
        let a = run();
        let b = run();
        assert_eq!(a.len(), b.len());
        assert_relative_eq!(a.duration(), b.duration(), epsilon = 1e-12);
    }
}
