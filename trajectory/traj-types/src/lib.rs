//! Core types for parabolic trajectory smoothing.
//!
//! This crate provides the foundational types shared by the trajectory
//! domain: single-axis parabolic ramps, time-synchronized multi-axis
//! ramps, dynamic paths, per-axis kinematic limits, constraint-check
//! flags, and planner parameters.
//!
//! # Overview
//!
//! The trajectory domain is organized into several conceptual areas:
//!
//! - **Ramps**: Piecewise constant-acceleration segments for one axis
//!   ([`Ramp1d`]) and for a whole configuration ([`RampNd`])
//! - **Paths**: Ordered ramp sequences with continuity guarantees
//!   ([`DynamicPath`])
//! - **Limits**: Per-axis velocity, acceleration, and position bounds
//!   ([`Limits`])
//! - **Checking**: Constraint classes, failure codes, and oracle return
//!   payloads ([`CheckFlags`], [`CheckReturn`], [`ConstraintReturn`])
//! - **Trajectories**: Waypoint-level input/output containers
//!   ([`Trajectory`], [`TrajectoryPoint`])
//! - **Configuration**: Smoother parameters ([`SmootherParams`])
//!
//! # Example
//!
//! ```
//! use nalgebra::DVector;
//! use traj_types::{Limits, RampNd};
//!
//! let x0 = DVector::from_vec(vec![0.0, 0.0]);
//! let v0 = DVector::from_vec(vec![0.0, 0.0]);
//! let x1 = DVector::from_vec(vec![1.0, 2.0]);
//! let v1 = DVector::from_vec(vec![1.0, 2.0]);
//!
//! // A ramp whose velocity ramps linearly from v0 to v1 over 2 seconds.
//! let ramp = RampNd::from_pos_vel_time(x0, v0, x1, v1, 2.0).unwrap();
//! assert_eq!(ramp.dof(), 2);
//! assert!((ramp.evaluate(2.0)[0] - 1.0).abs() < 1e-9);
//! ```
//!
//! # Feature Flags
//!
//! - `serde`: Enables serialization/deserialization for all types

#![doc(html_root_url = "https://docs.rs/traj-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod check;
pub mod error;
pub mod limits;
pub mod params;
pub mod path;
pub mod ramp;
pub mod trajectory;

// Re-export main types at crate root for convenience
pub use check::{CheckFlags, CheckReturn, ConstraintReturn, Interval};
pub use error::TrajError;
pub use limits::Limits;
pub use params::{InterpMode, SmootherParams};
pub use path::DynamicPath;
pub use ramp::{Ramp1d, RampNd};
pub use trajectory::{Interpolation, Trajectory, TrajectoryPoint};

/// General floating-point tolerance for near-zero tests.
pub const EPSILON: f64 = 1e-12;

/// Tolerance used when comparing and deduplicating switch times.
pub const EPSILON_T: f64 = 1e-9;

/// Tolerance used when comparing configurations.
pub const EPSILON_X: f64 = 1e-9;

/// Tolerance used when comparing velocities.
pub const EPSILON_V: f64 = 1e-9;
