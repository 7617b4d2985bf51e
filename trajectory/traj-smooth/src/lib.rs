//! Shortcut-based parabolic trajectory smoothing.
//!
//! Takes a piecewise robot configuration path and produces a
//! minimum-time, dynamically feasible trajectory: velocity continuous,
//! acceleration piecewise constant, every sampled state inside the
//! velocity, acceleration, and position limits and accepted by an
//! external constraint oracle.
//!
//! # Overview
//!
//! Smoothing runs in three phases:
//!
//! 1. **Initial ramping** ([`build_initial_ramps`]): each waypoint pair
//!    becomes a straight-line, stop-at-each-end parabolic ramp whose
//!    timing already satisfies time-based constraints.
//! 2. **Shortcutting** ([`shortcut_path`]): random sub-paths are
//!    replaced with minimum-time ramps between the sampled states,
//!    validated by the [`RampChecker`], shrinking the total duration.
//! 3. **Emission** ([`emit_trajectory`]): the final path is expanded
//!    into a timed waypoint sequence, re-verifying (and if necessary
//!    time-dilating) any ramp never validated against the full
//!    constraint mask.
//!
//! [`ParabolicSmoother`] glues the phases together behind one `plan`
//! call; the phases are public for callers that need finer control.
//!
//! External feasibility lives behind the [`ConstraintOracle`] trait:
//! collision checking, closed-chain projection, and manipulator limits
//! are all supplied by the caller. [`UnconstrainedOracle`] smooths in
//! free space.
//!
//! # Example
//!
//! ```
//! use nalgebra::DVector;
//! use traj_smooth::{ParabolicSmoother, PlanOutcome, UnconstrainedOracle};
//! use traj_types::{Limits, SmootherParams, Trajectory};
//!
//! let params = SmootherParams::new(
//!     Limits::uniform(2, 1.0, 1.0),
//!     DVector::from_element(2, 0.01),
//! )
//! .unwrap()
//! .with_seed(42);
//!
//! let mut smoother = ParabolicSmoother::new(params, UnconstrainedOracle::new(2)).unwrap();
//! let input = Trajectory::from_positions(
//!     2,
//!     vec![
//!         DVector::from_vec(vec![0.0, 0.0]),
//!         DVector::from_vec(vec![1.0, 0.0]),
//!         DVector::from_vec(vec![1.0, 1.0]),
//!     ],
//! )
//! .unwrap();
//!
//! let PlanOutcome::Smoothed { trajectory, .. } = smoother.plan(&input).unwrap() else {
//!     unreachable!("no callback registered");
//! };
//! assert!(trajectory.duration() > 0.0);
//! ```

#![doc(html_root_url = "https://docs.rs/traj-smooth/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checker;
pub mod emit;
pub mod error;
pub mod milestones;
pub mod oracle;
pub mod planner;
pub mod progress;
pub mod shortcut;

// Re-export main types at crate root for convenience
pub use checker::{RampChecker, DEFAULT_SURPASS_MULT};
pub use emit::{emit_trajectory, EmitOutcome};
pub use error::SmoothError;
pub use milestones::build_initial_ramps;
pub use oracle::{ConstraintOracle, OracleError, UnconstrainedOracle};
pub use planner::{ParabolicSmoother, PlanOutcome, SmoothStats};
pub use progress::{PlanProgress, ProgressAction, ProgressTracker};
pub use shortcut::{shortcut_path, ShortcutOutcome};
