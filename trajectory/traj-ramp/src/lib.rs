//! Parabolic ramp solvers under velocity, acceleration, and position
//! bounds.
//!
//! This crate computes the time-optimal and fixed-duration
//! constant-acceleration profiles consumed by the trajectory smoother:
//!
//! - **Minimum time, one axis** ([`solve_min_time_1d`]): bang-bang with
//!   an optional cruise at the velocity bound
//! - **Fixed duration, one axis** ([`solve_fixed_time_1d`]):
//!   minimum-acceleration re-timing, used for dilation and axis
//!   synchronization
//! - **Minimum time, all axes** ([`solve_min_time`]): per-axis solves
//!   synchronized to the slowest axis
//! - **Fixed duration, all axes** ([`solve_accel_bounded`])
//! - **Straight-line profiles** ([`solve_straight_line`]): zero
//!   endpoint velocity, every axis a scaled copy of one path ramp
//!
//! # Example
//!
//! ```
//! use nalgebra::DVector;
//! use traj_ramp::{solve_straight_line, Bounds};
//! use traj_types::Limits;
//!
//! let limits = Limits::uniform(2, 1.0, 1.0);
//! let ramp = solve_straight_line(
//!     &DVector::zeros(2),
//!     &DVector::from_vec(vec![1.0, 1.0]),
//!     Bounds::from_limits(&limits),
//! )
//! .unwrap();
//! // Unit diagonal under unit limits: 1 s accelerating, 1 s braking.
//! assert!((ramp.duration() - 2.0).abs() < 1e-9);
//! ```

#![doc(html_root_url = "https://docs.rs/traj-ramp/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod ramp1d;
pub mod rampnd;

pub use ramp1d::{solve_fixed_time_1d, solve_min_time_1d};
pub use rampnd::{
    solve_accel_bounded, solve_min_time, solve_straight_line, Bounds,
};
