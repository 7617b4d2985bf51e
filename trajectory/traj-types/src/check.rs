//! Constraint-check flags and return payloads.
//!
//! Constraint classes are selected by a bit mask ([`CheckFlags`]); the
//! same bits double as failure codes, so a failed check reports exactly
//! which class rejected it. [`CheckReturn`] bundles the code with the
//! slow-down multiplier for time-based failures, and [`ConstraintReturn`]
//! carries configurations re-projected by the oracle.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use nalgebra::DVector;

/// Bit mask of constraint classes, doubling as a failure code.
///
/// A zero value means "no constraint selected" as a mask and "passed" as
/// a code.
///
/// # Example
///
/// ```
/// use traj_types::CheckFlags;
///
/// let mask = CheckFlags::TIME_BASED | CheckFlags::ENV_COLLISIONS;
/// assert!(mask.contains(CheckFlags::TIME_BASED));
/// assert_eq!(format!("{mask}"), "0x0005");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CheckFlags(u32);

impl CheckFlags {
    /// No constraint selected / check passed.
    pub const NONE: Self = Self(0);
    /// Environment collision checking.
    pub const ENV_COLLISIONS: Self = Self(0x1);
    /// Self collision checking.
    pub const SELF_COLLISIONS: Self = Self(0x2);
    /// Time-based (velocity/acceleration/dynamics) checking.
    pub const TIME_BASED: Self = Self(0x4);
    /// Re-test configurations with small random offsets.
    pub const WITH_PERTURBATION: Self = Self(0x20);
    /// Ask the oracle to fill re-projected configurations.
    pub const FILL_CHECKED: Self = Self(0x40);
    /// The oracle rejected setting the state.
    pub const STATE_SETTING_ERROR: Self = Self(0x1000);
    /// The checked segment did not reach its requested terminal values.
    pub const FINAL_VALUES_NOT_REACHED: Self = Self(0x2000);
    /// Every bit set; also the code used when the oracle errors out.
    pub const ALL: Self = Self(0xffff);

    /// The full constraint mask whose successful completion memoizes a
    /// ramp as constraint-checked.
    pub const DEFAULT_MASK: Self = Self(
        Self::ENV_COLLISIONS.0
            | Self::SELF_COLLISIONS.0
            | Self::TIME_BASED.0
            | Self::WITH_PERTURBATION.0,
    );

    /// Raw bit representation.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Reconstructs flags from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Whether every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any bit of `other` is set in `self`.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for CheckFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CheckFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for CheckFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for CheckFlags {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0 & Self::ALL.0)
    }
}

impl fmt::Display for CheckFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Interval interpretation for a path-segment check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Interval {
    /// Both endpoints included.
    Closed,
    /// Start excluded, end included.
    OpenStart,
    /// Start included, end excluded.
    OpenEnd,
    /// Both endpoints excluded.
    Open,
}

/// Outcome of a feasibility check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckReturn {
    /// Failure code; [`CheckFlags::NONE`] on success.
    pub flags: CheckFlags,
    /// For time-based failures, how much slower the segment must become
    /// to satisfy the constraint (in `(0, 1]`).
    pub time_based_surpass_mult: f64,
    /// The checked segment ends at a different velocity than requested;
    /// the caller may re-solve for the terminal state.
    pub different_velocity: bool,
}

impl CheckReturn {
    /// A passing result.
    #[must_use]
    pub const fn passed() -> Self {
        Self {
            flags: CheckFlags::NONE,
            time_based_surpass_mult: 1.0,
            different_velocity: false,
        }
    }

    /// A failure with the given code.
    #[must_use]
    pub const fn failed(flags: CheckFlags) -> Self {
        Self {
            flags,
            time_based_surpass_mult: 1.0,
            different_velocity: false,
        }
    }

    /// A time-based failure carrying a surpass multiplier.
    #[must_use]
    pub const fn time_based(surpass_mult: f64) -> Self {
        Self {
            flags: CheckFlags::TIME_BASED,
            time_based_surpass_mult: surpass_mult,
            different_velocity: false,
        }
    }

    /// Whether the check passed.
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        self.flags.is_empty()
    }
}

impl Default for CheckReturn {
    fn default() -> Self {
        Self::passed()
    }
}

/// Sampled configurations returned by a projecting oracle.
///
/// Times are in `(0, T]` of the checked segment (open at the start). The
/// list is non-empty only when the oracle performed configuration
/// projection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintReturn {
    times: Vec<f64>,
    configurations: Vec<DVector<f64>>,
}

impl ConstraintReturn {
    /// An empty return payload.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            times: Vec::new(),
            configurations: Vec::new(),
        }
    }

    /// Removes all recorded samples.
    pub fn clear(&mut self) {
        self.times.clear();
        self.configurations.clear();
    }

    /// Records a sampled configuration at segment-local time `t`.
    pub fn push(&mut self, t: f64, configuration: DVector<f64>) {
        self.times.push(t);
        self.configurations.push(configuration);
    }

    /// Number of recorded samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether no sample was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Sample times, open at the segment start.
    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Sampled configurations, aligned with [`Self::times`].
    #[must_use]
    pub fn configurations(&self) -> &[DVector<f64>] {
        &self.configurations
    }

    /// Iterates over `(time, configuration)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &DVector<f64>)> {
        self.times.iter().copied().zip(self.configurations.iter())
    }
}
