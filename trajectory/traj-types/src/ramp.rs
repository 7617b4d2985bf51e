//! Parabolic ramp primitives.
//!
//! A ramp is a constant-acceleration motion segment. [`Ramp1d`] describes
//! one axis as three phases (accelerate, cruise, accelerate again), and
//! [`RampNd`] bundles one ramp per axis under a shared duration so a whole
//! configuration can be evaluated at any time.
//!
//! # Example
//!
//! ```
//! use traj_types::Ramp1d;
//!
//! // Accelerate at 1.0 for 1 s, decelerate at -1.0 for 1 s: moves 1.0.
//! let ramp = Ramp1d {
//!     x0: 0.0,
//!     v0: 0.0,
//!     x1: 1.0,
//!     v1: 0.0,
//!     a1: 1.0,
//!     a2: -1.0,
//!     tswitch1: 1.0,
//!     tswitch2: 1.0,
//!     ttotal: 2.0,
//! };
//! assert!(ramp.is_valid());
//! assert!((ramp.position(1.0) - 0.5).abs() < 1e-12);
//! assert!((ramp.velocity(1.0) - 1.0).abs() < 1e-12);
//! ```

use nalgebra::DVector;

use crate::error::TrajError;
use crate::{EPSILON, EPSILON_T, EPSILON_V, EPSILON_X};

/// A single-axis parabolic ramp.
///
/// The motion integrates `a1` on `[0, tswitch1]`, zero acceleration on
/// `[tswitch1, tswitch2]`, and `a2` on `[tswitch2, ttotal]`. The stored
/// terminal state `(x1, v1)` matches the integrated state at `ttotal`
/// for a well-formed ramp (see [`Ramp1d::is_valid`]).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ramp1d {
    /// Initial position.
    pub x0: f64,
    /// Initial velocity.
    pub v0: f64,
    /// Terminal position.
    pub x1: f64,
    /// Terminal velocity.
    pub v1: f64,
    /// Acceleration of the first phase.
    pub a1: f64,
    /// Acceleration of the last phase.
    pub a2: f64,
    /// End of the first phase.
    pub tswitch1: f64,
    /// Start of the last phase.
    pub tswitch2: f64,
    /// Total duration.
    pub ttotal: f64,
}

impl Ramp1d {
    /// A zero-duration ramp that holds a single position.
    #[must_use]
    pub const fn constant(x: f64) -> Self {
        Self {
            x0: x,
            v0: 0.0,
            x1: x,
            v1: 0.0,
            a1: 0.0,
            a2: 0.0,
            tswitch1: 0.0,
            tswitch2: 0.0,
            ttotal: 0.0,
        }
    }

    /// A ramp whose velocity varies linearly from `v0` to `v1` over `t`.
    ///
    /// The caller guarantees `x1 - x0 == 0.5 * (v0 + v1) * t` (the
    /// single-acceleration consistency condition); the stored endpoint is
    /// taken verbatim.
    #[must_use]
    pub fn pos_vel_time(x0: f64, v0: f64, x1: f64, v1: f64, t: f64) -> Self {
        let a = if t > EPSILON { (v1 - v0) / t } else { 0.0 };
        Self {
            x0,
            v0,
            x1,
            v1,
            a1: a,
            a2: a,
            tswitch1: 0.0,
            tswitch2: 0.0,
            ttotal: t,
        }
    }

    /// Position at time `t`, clamped to `[0, ttotal]`.
    #[must_use]
    pub fn position(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, self.ttotal);
        if t < self.tswitch1 {
            return self.x0 + self.v0 * t + 0.5 * self.a1 * t * t;
        }
        let xs1 = self.x0
            + self.v0 * self.tswitch1
            + 0.5 * self.a1 * self.tswitch1 * self.tswitch1;
        let vs = self.v0 + self.a1 * self.tswitch1;
        if t < self.tswitch2 {
            return xs1 + vs * (t - self.tswitch1);
        }
        let xs2 = xs1 + vs * (self.tswitch2 - self.tswitch1);
        let dt = t - self.tswitch2;
        xs2 + vs * dt + 0.5 * self.a2 * dt * dt
    }

    /// Velocity at time `t`, clamped to `[0, ttotal]`.
    #[must_use]
    pub fn velocity(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, self.ttotal);
        if t < self.tswitch1 {
            return self.v0 + self.a1 * t;
        }
        let vs = self.v0 + self.a1 * self.tswitch1;
        if t < self.tswitch2 {
            return vs;
        }
        vs + self.a2 * (t - self.tswitch2)
    }

    /// Acceleration at time `t`, clamped to `[0, ttotal]`.
    #[must_use]
    pub fn acceleration(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, self.ttotal);
        if t < self.tswitch1 {
            self.a1
        } else if t < self.tswitch2 {
            0.0
        } else {
            self.a2
        }
    }

    /// Smallest and largest position reached anywhere on the ramp.
    ///
    /// Interior extrema occur where a phase's velocity crosses zero.
    #[must_use]
    pub fn position_extrema(&self) -> (f64, f64) {
        let mut lo = self.position(0.0).min(self.position(self.ttotal));
        let mut hi = self.position(0.0).max(self.position(self.ttotal));
        for (t_start, t_end, v_start, a) in [
            (0.0, self.tswitch1, self.v0, self.a1),
            (
                self.tswitch2,
                self.ttotal,
                self.velocity(self.tswitch2),
                self.a2,
            ),
        ] {
            if a.abs() > EPSILON {
                let t_zero = t_start - v_start / a;
                if t_zero > t_start && t_zero < t_end {
                    let x = self.position(t_zero);
                    lo = lo.min(x);
                    hi = hi.max(x);
                }
            }
        }
        (lo, hi)
    }

    /// Checks phase ordering and endpoint consistency.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if self.tswitch1 < -EPSILON_T
            || self.tswitch2 < self.tswitch1 - EPSILON_T
            || self.ttotal < self.tswitch2 - EPSILON_T
        {
            return false;
        }
        (self.position(self.ttotal) - self.x1).abs() <= EPSILON_X
            && (self.velocity(self.ttotal) - self.v1).abs() <= EPSILON_V
    }

    /// Shifts the start of the ramp forward by `dt`, keeping the motion.
    pub fn trim_front(&mut self, dt: f64) {
        let dt = dt.clamp(0.0, self.ttotal);
        self.x0 = self.position(dt);
        self.v0 = self.velocity(dt);
        self.tswitch1 = (self.tswitch1 - dt).max(0.0);
        self.tswitch2 = (self.tswitch2 - dt).max(0.0);
        self.ttotal -= dt;
    }

    /// Shifts the end of the ramp backward by `dt`, keeping the motion.
    pub fn trim_back(&mut self, dt: f64) {
        let dt = dt.clamp(0.0, self.ttotal);
        let t_end = self.ttotal - dt;
        self.x1 = self.position(t_end);
        self.v1 = self.velocity(t_end);
        self.ttotal = t_end;
        self.tswitch1 = self.tswitch1.min(t_end);
        self.tswitch2 = self.tswitch2.min(t_end);
    }
}

/// A time-synchronized bundle of per-axis parabolic ramps.
///
/// Every axis shares the same total duration; evaluating all axes at `0`
/// yields `(x0, v0)` and at the duration yields `(x1, v1)`.
///
/// The `constraint_checked` flag memoizes "already validated against the
/// full constraint mask for its current geometry"; it is cleared by any
/// operation that changes the geometry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RampNd {
    x0: DVector<f64>,
    v0: DVector<f64>,
    x1: DVector<f64>,
    v1: DVector<f64>,
    ramps: Vec<Ramp1d>,
    duration: f64,
    constraint_checked: bool,
}

impl RampNd {
    /// A zero-duration ramp that holds a single configuration.
    #[must_use]
    pub fn constant(x: DVector<f64>) -> Self {
        let ramps = x.iter().map(|&xi| Ramp1d::constant(xi)).collect();
        let zero = DVector::zeros(x.len());
        Self {
            x0: x.clone(),
            v0: zero.clone(),
            x1: x,
            v1: zero,
            ramps,
            duration: 0.0,
            constraint_checked: false,
        }
    }

    /// Builds a ramp whose every axis interpolates velocity linearly.
    ///
    /// # Errors
    ///
    /// Returns [`TrajError::DofMismatch`] when the vectors disagree in
    /// length and [`TrajError::InvalidDuration`] when `t` is negative or
    /// non-finite.
    pub fn from_pos_vel_time(
        x0: DVector<f64>,
        v0: DVector<f64>,
        x1: DVector<f64>,
        v1: DVector<f64>,
        t: f64,
    ) -> Result<Self, TrajError> {
        let dof = x0.len();
        for other in [v0.len(), x1.len(), v1.len()] {
            if other != dof {
                return Err(TrajError::DofMismatch {
                    expected: dof,
                    actual: other,
                });
            }
        }
        if !t.is_finite() || t < 0.0 {
            return Err(TrajError::InvalidDuration(t));
        }
        let ramps = (0..dof)
            .map(|i| Ramp1d::pos_vel_time(x0[i], v0[i], x1[i], v1[i], t))
            .collect();
        Ok(Self {
            x0,
            v0,
            x1,
            v1,
            ramps,
            duration: t,
            constraint_checked: false,
        })
    }

    /// Builds a ramp from per-axis segments that share one duration.
    ///
    /// # Errors
    ///
    /// Returns [`TrajError::EmptyPath`] for an empty axis list and
    /// [`TrajError::MismatchedDurations`] when the axis durations differ
    /// by more than the switch-time tolerance.
    pub fn from_axis_ramps(mut ramps: Vec<Ramp1d>) -> Result<Self, TrajError> {
        if ramps.is_empty() {
            return Err(TrajError::EmptyPath);
        }
        let mut t_min = f64::INFINITY;
        let mut t_max = f64::NEG_INFINITY;
        for ramp in &ramps {
            t_min = t_min.min(ramp.ttotal);
            t_max = t_max.max(ramp.ttotal);
        }
        if t_max - t_min > EPSILON_T {
            return Err(TrajError::MismatchedDurations {
                min: t_min,
                max: t_max,
            });
        }
        for ramp in &mut ramps {
            ramp.ttotal = t_max;
            ramp.tswitch1 = ramp.tswitch1.min(t_max);
            ramp.tswitch2 = ramp.tswitch2.min(t_max);
        }
        let x0 = DVector::from_iterator(ramps.len(), ramps.iter().map(|r| r.x0));
        let v0 = DVector::from_iterator(ramps.len(), ramps.iter().map(|r| r.v0));
        let x1 = DVector::from_iterator(ramps.len(), ramps.iter().map(|r| r.x1));
        let v1 = DVector::from_iterator(ramps.len(), ramps.iter().map(|r| r.v1));
        Ok(Self {
            x0,
            v0,
            x1,
            v1,
            ramps,
            duration: t_max,
            constraint_checked: false,
        })
    }

    /// Number of axes.
    #[must_use]
    pub fn dof(&self) -> usize {
        self.ramps.len()
    }

    /// Total duration shared by every axis.
    #[must_use]
    pub const fn duration(&self) -> f64 {
        self.duration
    }

    /// Initial configuration.
    #[must_use]
    pub const fn x0(&self) -> &DVector<f64> {
        &self.x0
    }

    /// Initial velocity.
    #[must_use]
    pub const fn v0(&self) -> &DVector<f64> {
        &self.v0
    }

    /// Terminal configuration.
    #[must_use]
    pub const fn x1(&self) -> &DVector<f64> {
        &self.x1
    }

    /// Terminal velocity.
    #[must_use]
    pub const fn v1(&self) -> &DVector<f64> {
        &self.v1
    }

    /// Per-axis ramps.
    #[must_use]
    pub fn ramps(&self) -> &[Ramp1d] {
        &self.ramps
    }

    /// Whether this ramp has already passed the full constraint mask.
    #[must_use]
    pub const fn constraint_checked(&self) -> bool {
        self.constraint_checked
    }

    /// Marks or clears the memoized constraint-check state.
    pub const fn set_constraint_checked(&mut self, checked: bool) {
        self.constraint_checked = checked;
    }

    /// Overwrites the stored initial state without re-deriving the axes.
    ///
    /// Used to snap a join to its neighbor's terminal state and cancel
    /// float drift after a splice.
    pub fn set_initial(&mut self, x0: &DVector<f64>, v0: &DVector<f64>) {
        for (i, ramp) in self.ramps.iter_mut().enumerate() {
            ramp.x0 = x0[i];
            ramp.v0 = v0[i];
        }
        self.x0.copy_from(x0);
        self.v0.copy_from(v0);
    }

    /// Overwrites the stored terminal state without re-deriving the axes.
    pub fn set_terminal(&mut self, x1: &DVector<f64>, v1: &DVector<f64>) {
        for (i, ramp) in self.ramps.iter_mut().enumerate() {
            ramp.x1 = x1[i];
            ramp.v1 = v1[i];
        }
        self.x1.copy_from(x1);
        self.v1.copy_from(v1);
    }

    /// Writes the configuration at time `t` into `out`.
    pub fn evaluate_into(&self, t: f64, out: &mut DVector<f64>) {
        for (i, ramp) in self.ramps.iter().enumerate() {
            out[i] = ramp.position(t);
        }
    }

    /// Configuration at time `t`.
    #[must_use]
    pub fn evaluate(&self, t: f64) -> DVector<f64> {
        let mut out = DVector::zeros(self.dof());
        self.evaluate_into(t, &mut out);
        out
    }

    /// Writes the velocity at time `t` into `out`.
    pub fn derivative_into(&self, t: f64, out: &mut DVector<f64>) {
        for (i, ramp) in self.ramps.iter().enumerate() {
            out[i] = ramp.velocity(t);
        }
    }

    /// Velocity at time `t`.
    #[must_use]
    pub fn derivative(&self, t: f64) -> DVector<f64> {
        let mut out = DVector::zeros(self.dof());
        self.derivative_into(t, &mut out);
        out
    }

    /// Collects the sorted, deduplicated union of per-axis switch times.
    ///
    /// The total duration is always present; `0` is prepended when
    /// `include_zero` is set. Times closer than [`EPSILON_T`] to an
    /// already collected one are dropped.
    pub fn collect_switch_times(&self, times: &mut Vec<f64>, include_zero: bool) {
        times.clear();
        if include_zero {
            times.push(0.0);
        }
        times.push(self.duration);
        let mut insert = |t: f64| {
            if t <= EPSILON_T {
                return;
            }
            let idx = times.partition_point(|&x| x < t);
            let near_prev = idx > 0 && (t - times[idx - 1]).abs() <= EPSILON_T;
            let near_next = idx < times.len() && (times[idx] - t).abs() <= EPSILON_T;
            if !near_prev && !near_next {
                times.insert(idx, t);
            }
        };
        for ramp in &self.ramps {
            insert(ramp.tswitch1);
            if (ramp.tswitch2 - ramp.tswitch1).abs() > EPSILON_T {
                insert(ramp.tswitch2);
            }
            if (ramp.ttotal - ramp.tswitch2).abs() > EPSILON_T {
                insert(ramp.ttotal);
            }
        }
    }

    /// Sorted, deduplicated switch times including `0` and the duration.
    #[must_use]
    pub fn switch_times(&self) -> Vec<f64> {
        let mut times = Vec::new();
        self.collect_switch_times(&mut times, true);
        times
    }

    /// Shifts the start of the ramp forward by `dt`, keeping the motion.
    pub fn trim_front(&mut self, dt: f64) {
        let dt = dt.clamp(0.0, self.duration);
        for ramp in &mut self.ramps {
            ramp.trim_front(dt);
        }
        self.duration -= dt;
        for (i, ramp) in self.ramps.iter().enumerate() {
            self.x0[i] = ramp.x0;
            self.v0[i] = ramp.v0;
        }
    }

    /// Shifts the end of the ramp backward by `dt`, keeping the motion.
    pub fn trim_back(&mut self, dt: f64) {
        let dt = dt.clamp(0.0, self.duration);
        for ramp in &mut self.ramps {
            ramp.trim_back(dt);
        }
        self.duration -= dt;
        for (i, ramp) in self.ramps.iter().enumerate() {
            self.x1[i] = ramp.x1;
            self.v1[i] = ramp.v1;
        }
    }

    /// Checks per-axis validity and endpoint agreement.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if self.duration.is_finite() && self.duration >= 0.0 {
            self.ramps.iter().enumerate().all(|(i, ramp)| {
                ramp.is_valid()
                    && (ramp.ttotal - self.duration).abs() <= EPSILON_T
                    && (ramp.x0 - self.x0[i]).abs() <= EPSILON_X
                    && (ramp.x1 - self.x1[i]).abs() <= EPSILON_X
            })
        } else {
            false
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn trapezoid() -> Ramp1d {
        // Accelerate 1 s, cruise 1 s, decelerate 1 s: moves 2.0.
        Ramp1d {
            x0: 0.0,
            v0: 0.0,
            x1: 2.0,
            v1: 0.0,
            a1: 1.0,
            a2: -1.0,
            tswitch1: 1.0,
            tswitch2: 2.0,
            ttotal: 3.0,
        }
    }

    #[test]
    fn test_trapezoid_evaluation() {
        let ramp = trapezoid();
        assert!(ramp.is_valid());
        assert_relative_eq!(ramp.position(0.0), 0.0);
        assert_relative_eq!(ramp.position(1.0), 0.5);
        assert_relative_eq!(ramp.position(2.0), 1.5);
        assert_relative_eq!(ramp.position(3.0), 2.0);
        assert_relative_eq!(ramp.velocity(0.5), 0.5);
        assert_relative_eq!(ramp.velocity(1.5), 1.0);
        assert_relative_eq!(ramp.velocity(3.0), 0.0);
        assert_relative_eq!(ramp.acceleration(2.5), -1.0);
        assert_relative_eq!(ramp.acceleration(1.5), 0.0);
    }

    #[test]
    fn test_evaluation_clamps_time() {
        let ramp = trapezoid();
        assert_relative_eq!(ramp.position(-1.0), 0.0);
        assert_relative_eq!(ramp.position(10.0), 2.0);
        assert_relative_eq!(ramp.velocity(10.0), 0.0);
    }

    #[test]
    fn test_position_extrema_overshoot() {
        // Moving backward first: starts at 0 with v0 = -1, ends at 1.
        let ramp = Ramp1d {
            x0: 0.0,
            v0: -1.0,
            x1: 0.0,
            v1: 1.0,
            a1: 1.0,
            a2: 1.0,
            tswitch1: 0.0,
            tswitch2: 0.0,
            ttotal: 2.0,
        };
        assert!(ramp.is_valid());
        let (lo, hi) = ramp.position_extrema();
        assert_relative_eq!(lo, -0.5, epsilon = 1e-12);
        assert_relative_eq!(hi, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_trim_front_keeps_motion() {
        let mut ramp = trapezoid();
        let mid_pos = ramp.position(0.5);
        let mid_vel = ramp.velocity(0.5);
        ramp.trim_front(0.5);
        assert_relative_eq!(ramp.x0, mid_pos);
        assert_relative_eq!(ramp.v0, mid_vel);
        assert_relative_eq!(ramp.ttotal, 2.5);
        assert_relative_eq!(ramp.position(ramp.ttotal), 2.0, epsilon = 1e-12);
        assert!(ramp.is_valid());
    }

    #[test]
    fn test_trim_back_keeps_motion() {
        let mut ramp = trapezoid();
        let pos = ramp.position(2.5);
        let vel = ramp.velocity(2.5);
        ramp.trim_back(0.5);
        assert_relative_eq!(ramp.x1, pos);
        assert_relative_eq!(ramp.v1, vel);
        assert_relative_eq!(ramp.ttotal, 2.5);
        assert!(ramp.is_valid());
    }

    #[test]
    fn test_constant_ramp() {
        let ramp = Ramp1d::constant(1.5);
        assert!(ramp.is_valid());
        assert_relative_eq!(ramp.position(0.0), 1.5);
        assert_relative_eq!(ramp.ttotal, 0.0);
    }

    #[test]
    fn test_pos_vel_time_consistency() {
        // x1 - x0 = (v0 + v1)/2 * t = 1.5
        let ramp = Ramp1d::pos_vel_time(0.0, 1.0, 1.5, 2.0, 1.0);
        assert!(ramp.is_valid());
        assert_relative_eq!(ramp.velocity(0.5), 1.5);
    }

    #[test]
    fn test_rampnd_switch_times() {
        let axis_a = Ramp1d {
            tswitch1: 1.0,
            tswitch2: 2.0,
            ..trapezoid()
        };
        let axis_b = Ramp1d {
            x1: 1.125,
            a1: 0.5,
            a2: -0.5,
            tswitch1: 1.5,
            tswitch2: 1.5,
            ..trapezoid()
        };
        let nd = RampNd::from_axis_ramps(vec![axis_a, axis_b]).unwrap();
        let times = nd.switch_times();
        assert_eq!(times, vec![0.0, 1.0, 1.5, 2.0, 3.0]);
    }

    #[test]
    fn test_rampnd_switch_times_dedup() {
        let a = trapezoid();
        let b = Ramp1d {
            tswitch1: 1.0 + 1e-12,
            ..trapezoid()
        };
        let nd = RampNd::from_axis_ramps(vec![a, b]).unwrap();
        assert_eq!(nd.switch_times().len(), 4);
    }

    #[test]
    fn test_rampnd_from_axis_ramps_mismatched() {
        let a = trapezoid();
        let mut b = trapezoid();
        b.ttotal = 4.0;
        assert!(matches!(
            RampNd::from_axis_ramps(vec![a, b]),
            Err(TrajError::MismatchedDurations { .. })
        ));
    }

    #[test]
    fn test_rampnd_evaluate_endpoints() {
        let x0 = DVector::from_vec(vec![0.0, 1.0]);
        let v0 = DVector::from_vec(vec![0.0, 0.0]);
        let x1 = DVector::from_vec(vec![1.0, 3.0]);
        let v1 = DVector::from_vec(vec![1.0, 2.0]);
        let nd =
            RampNd::from_pos_vel_time(x0.clone(), v0.clone(), x1.clone(), v1.clone(), 2.0)
                .unwrap();
        assert_relative_eq!(nd.evaluate(0.0), x0, epsilon = 1e-12);
        assert_relative_eq!(nd.evaluate(2.0), x1, epsilon = 1e-12);
        assert_relative_eq!(nd.derivative(0.0), v0, epsilon = 1e-12);
        assert_relative_eq!(nd.derivative(2.0), v1, epsilon = 1e-12);
    }

    #[test]
    fn test_rampnd_constant() {
        let nd = RampNd::constant(DVector::from_vec(vec![1.0, -2.0]));
        assert_eq!(nd.dof(), 2);
        assert_relative_eq!(nd.duration(), 0.0);
        assert_relative_eq!(nd.evaluate(0.0)[1], -2.0);
        assert_eq!(nd.switch_times(), vec![0.0]);
    }

    #[test]
    fn test_rampnd_trim_clears_nothing_else() {
        let x0 = DVector::zeros(1);
        let v0 = DVector::zeros(1);
        let x1 = DVector::from_vec(vec![1.0]);
        let v1 = DVector::from_vec(vec![1.0]);
        let mut nd = RampNd::from_pos_vel_time(x0, v0, x1.clone(), v1.clone(), 2.0).unwrap();
        nd.trim_front(1.0);
        assert_relative_eq!(nd.duration(), 1.0);
        assert_relative_eq!(nd.x1()[0], 1.0);
        assert_relative_eq!(nd.evaluate(1.0)[0], 1.0, epsilon = 1e-12);
    }
}
