//! Single-axis parabolic ramp solvers.
//!
//! Two problems are solved here: the minimum-duration ramp between two
//! position/velocity states under velocity and acceleration bounds
//! (bang-bang with an optional cruise phase), and the minimum-acceleration
//! ramp of a *fixed* duration (used for time dilation and for
//! synchronizing axes under a shared duration).

// Algorithm uses standard mathematical variable names
#![allow(clippy::many_single_char_names)]

use traj_types::{Ramp1d, EPSILON, EPSILON_T, EPSILON_V, EPSILON_X};

/// Solves the minimum-time ramp from `(x0, v0)` to `(x1, v1)`.
///
/// Tries the accelerate-first and decelerate-first bang-bang profiles,
/// inserting a cruise phase at the velocity bound when the parabolic peak
/// would exceed it, and returns the faster feasible profile.
///
/// Returns `None` when no profile exists, in particular when a boundary
/// velocity already exceeds `v_max`.
///
/// # Example
///
/// ```
/// use traj_ramp::solve_min_time_1d;
///
/// // Rest-to-rest over 1.0 with unit limits: 1 s up, 1 s down.
/// let ramp = solve_min_time_1d(0.0, 0.0, 1.0, 0.0, 1.0, 1.0).unwrap();
/// assert!((ramp.ttotal - 2.0).abs() < 1e-9);
/// ```
#[must_use]
pub fn solve_min_time_1d(
    x0: f64,
    v0: f64,
    x1: f64,
    v1: f64,
    v_max: f64,
    a_max: f64,
) -> Option<Ramp1d> {
    if v_max <= 0.0 || a_max <= 0.0 {
        return None;
    }
    if v0.abs() > v_max + EPSILON_V || v1.abs() > v_max + EPSILON_V {
        return None;
    }

    let up = solve_min_time_up(x0, v0, x1, v1, v_max, a_max);
    let down = solve_min_time_up(-x0, -v0, -x1, -v1, v_max, a_max).map(mirror);

    match (up, down) {
        (Some(a), Some(b)) => Some(if a.ttotal <= b.ttotal { a } else { b }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// Accelerate-first profile: `+a_max`, optional cruise, `-a_max`.
fn solve_min_time_up(
    x0: f64,
    v0: f64,
    x1: f64,
    v1: f64,
    v_max: f64,
    a_max: f64,
) -> Option<Ramp1d> {
    let dx = x1 - x0;
    let peak_sq = 0.5 * (v0 * v0 + v1 * v1) + a_max * dx;
    if peak_sq < -EPSILON {
        return None;
    }
    let peak = peak_sq.max(0.0).sqrt();
    if peak < v0 - EPSILON_V || peak < v1 - EPSILON_V {
        return None;
    }

    if peak <= v_max + EPSILON_V {
        let t1 = ((peak - v0) / a_max).max(0.0);
        let t3 = ((peak - v1) / a_max).max(0.0);
        return Some(Ramp1d {
            x0,
            v0,
            x1,
            v1,
            a1: a_max,
            a2: -a_max,
            tswitch1: t1,
            tswitch2: t1,
            ttotal: t1 + t3,
        });
    }

    // Peak would exceed the velocity bound: cruise at v_max.
    let t1 = (v_max - v0) / a_max;
    let t3 = (v_max - v1) / a_max;
    let d1 = (v_max * v_max - v0 * v0) / (2.0 * a_max);
    let d3 = (v_max * v_max - v1 * v1) / (2.0 * a_max);
    let t2 = ((dx - d1 - d3) / v_max).max(0.0);
    Some(Ramp1d {
        x0,
        v0,
        x1,
        v1,
        a1: a_max,
        a2: -a_max,
        tswitch1: t1,
        tswitch2: t1 + t2,
        ttotal: t1 + t2 + t3,
    })
}

fn mirror(r: Ramp1d) -> Ramp1d {
    Ramp1d {
        x0: -r.x0,
        v0: -r.v0,
        x1: -r.x1,
        v1: -r.v1,
        a1: -r.a1,
        a2: -r.a2,
        ..r
    }
}

/// Solves a fixed-duration ramp from `(x0, v0)` to `(x1, v1)`.
///
/// Finds the minimum-acceleration two-parabola profile for the requested
/// duration, switching to a velocity-capped cruise profile when the
/// parabolic peak would exceed `v_max`. Returns `None` when the duration
/// lies below the minimum achievable time (or inside an infeasible
/// window) for the given bounds.
///
/// # Example
///
/// ```
/// use traj_ramp::solve_fixed_time_1d;
///
/// // Stretch a rest-to-rest unit move to 3 s: acceleration drops.
/// let ramp = solve_fixed_time_1d(0.0, 0.0, 1.0, 0.0, 3.0, 1.0, 1.0).unwrap();
/// assert!((ramp.ttotal - 3.0).abs() < 1e-12);
/// assert!(ramp.a1.abs() < 1.0);
/// ```
#[must_use]
pub fn solve_fixed_time_1d(
    x0: f64,
    v0: f64,
    x1: f64,
    v1: f64,
    t_total: f64,
    v_max: f64,
    a_max: f64,
) -> Option<Ramp1d> {
    if v_max <= 0.0 || a_max <= 0.0 || !t_total.is_finite() || t_total < 0.0 {
        return None;
    }
    if v0.abs() > v_max + EPSILON_V || v1.abs() > v_max + EPSILON_V {
        return None;
    }
    if t_total <= EPSILON_T {
        if (x1 - x0).abs() <= EPSILON_X && (v1 - v0).abs() <= EPSILON_V {
            return Some(Ramp1d {
                x0,
                v0,
                x1,
                v1,
                a1: 0.0,
                a2: 0.0,
                tswitch1: 0.0,
                tswitch2: 0.0,
                ttotal: t_total,
            });
        }
        return None;
    }

    let mut candidates = Vec::new();
    for (a, ts) in pp_candidates(x0, v0, x1, v1, t_total) {
        let peak = v0 + a * ts;
        if a.abs() <= a_max + EPSILON && peak.abs() <= v_max + EPSILON_V {
            candidates.push(Ramp1d {
                x0,
                v0,
                x1,
                v1,
                a1: a,
                a2: -a,
                tswitch1: ts,
                tswitch2: ts,
                ttotal: t_total,
            });
        }
    }

    if candidates.is_empty() {
        // The parabolic peak is out of reach: cruise at a velocity bound.
        for v_cruise in [v_max, -v_max] {
            candidates.extend(plp_candidate(x0, v0, x1, v1, t_total, v_cruise, a_max));
        }
    }

    candidates
        .into_iter()
        .min_by(|a, b| {
            a.a1.abs()
                .partial_cmp(&b.a1.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

/// Two-parabola candidates `(a, tswitch)` for a fixed duration.
///
/// The switch time solves `dv·ts² + 2(D − dv·T)·ts + (dv·T²/2 − D·T) = 0`
/// with `D = dx − v0·T`, obtained by eliminating the acceleration from
/// the boundary conditions.
fn pp_candidates(x0: f64, v0: f64, x1: f64, v1: f64, t: f64) -> Vec<(f64, f64)> {
    let dx = x1 - x0;
    let dv = v1 - v0;
    let d = dx - v0 * t;
    let mut out = Vec::new();

    if dv.abs() <= EPSILON_V {
        // Symmetric profile: switch at the midpoint.
        let ts = 0.5 * t;
        let a = 4.0 * d / (t * t);
        out.push((a, ts));
        return out;
    }

    let b = 2.0 * (d - dv * t);
    let c = dv * t * t / 2.0 - d * t;
    let disc = b * b - 4.0 * dv * c;
    if disc < 0.0 {
        return out;
    }
    let sqrt_disc = disc.max(0.0).sqrt();
    for ts in [
        (-b + sqrt_disc) / (2.0 * dv),
        (-b - sqrt_disc) / (2.0 * dv),
    ] {
        if !(-EPSILON_T..=t + EPSILON_T).contains(&ts) {
            continue;
        }
        let ts = ts.clamp(0.0, t);
        let denom = 2.0 * ts - t;
        let a = if denom.abs() > EPSILON {
            dv / denom
        } else {
            // Midpoint switch: recover the acceleration from the
            // position equation instead.
            let pos_denom = 2.0 * t * ts - ts * ts - t * t / 2.0;
            if pos_denom.abs() <= EPSILON {
                continue;
            }
            d / pos_denom
        };
        out.push((a, ts));
    }
    out
}

/// Velocity-capped candidate cruising at `v_cruise` for a fixed duration.
fn plp_candidate(
    x0: f64,
    v0: f64,
    x1: f64,
    v1: f64,
    t: f64,
    v_cruise: f64,
    a_max: f64,
) -> Option<Ramp1d> {
    let dx = x1 - x0;
    let denom = dx - v_cruise * t;

    if denom.abs() <= EPSILON {
        // Degenerate: the whole segment cruises at v_cruise.
        if (v0 - v_cruise).abs() <= EPSILON_V && (v1 - v_cruise).abs() <= EPSILON_V {
            return Some(Ramp1d {
                x0,
                v0,
                x1,
                v1,
                a1: 0.0,
                a2: 0.0,
                tswitch1: 0.0,
                tswitch2: t,
                ttotal: t,
            });
        }
        return None;
    }

    let d0 = v_cruise - v0;
    let d1 = v_cruise - v1;
    let a = -(d0 * d0 + d1 * d1) / (2.0 * denom);
    if a.abs() <= EPSILON || a.abs() > a_max + EPSILON {
        return None;
    }
    let t1 = d0 / a;
    let t3 = d1 / a;
    if t1 < -EPSILON_T || t3 < -EPSILON_T {
        return None;
    }
    let t2 = t - t1 - t3;
    if t2 < -EPSILON_T {
        return None;
    }
    let t1 = t1.max(0.0);
    let t2 = t2.max(0.0);
    Some(Ramp1d {
        x0,
        v0,
        x1,
        v1,
        a1: a,
        a2: -a,
        tswitch1: t1,
        tswitch2: t1 + t2,
        ttotal: t,
    })
}
