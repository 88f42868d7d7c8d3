//! Critical-current extraction via the corner-angle heuristic.
//!
//! On every branch the samples are sorted by `|I|` and normalized to the
//! branch extrema. At each sample the angle between the local differential
//! resistance and the chord resistance is
//!
//! ```text
//! phi = π + atan(1/R_diff) − atan(1/R_0)      wrapped into [−π, π)
//! ```
//!
//! and the corner is the sample whose angle is closest to π/2: the knee between
//! the near-vertical superconducting branch and the resistive branch.

use std::f64::consts::{FRAC_PI_2, PI};

use tracing::debug;

use crate::domain::{BranchCorner, CriticalCurrents, CurveType, Segment, Segments};
use crate::math::{argmin, argsort_by, moving_average_same};

/// Guards divisions in the resistance estimates.
const EPS: f64 = 1e-9;
/// Current rescaling for array sweeps, whose voltages are much larger.
pub const ARRAY_CURRENT_SCALE: f64 = 1e3;
/// Relative half-width of an Ic hint window.
pub const HINT_WINDOW: f64 = 0.15;
const MIN_HINT_POINTS: usize = 3;
/// Cap on outward corner rescans for overdamped junctions.
pub const MAX_RESCANS: usize = 10;

/// Corner angle at every sample but the last.
///
/// `current_scale` multiplies the current differences only.
pub fn corner_angles(current: &[f64], voltage: &[f64], current_scale: f64) -> Vec<f64> {
    current
        .windows(2)
        .zip(voltage.windows(2))
        .map(|(i, v)| {
            let r_diff = (v[1] - v[0]).abs() / ((i[1] - i[0]).abs() * current_scale + EPS) + EPS;
            let r_chord = (v[0] / (i[0] + EPS)).abs() + EPS;
            let phi = PI + (1.0 / r_diff).atan() - (1.0 / r_chord).atan();
            (phi + PI).rem_euclid(2.0 * PI) - PI
        })
        .collect()
}

/// Index and angle of the sample whose corner angle is closest to π/2.
///
/// `None` for fewer than two samples. Ties go to the lowest index.
pub fn corner_index(current: &[f64], voltage: &[f64], current_scale: f64) -> Option<(usize, f64)> {
    let phi = corner_angles(current, voltage, current_scale);
    let distance: Vec<f64> = phi.iter().map(|p| (p - FRAC_PI_2).abs()).collect();
    let idx = argmin(&distance)?;
    Some((idx, phi[idx]))
}

/// Smooth the voltage with a centered moving average and drop the
/// `ceil(w/2) - 1` edge samples at each end that the zero padding distorts.
pub fn smooth_branch(current: &[f64], voltage: &[f64], width: usize) -> (Vec<f64>, Vec<f64>) {
    if width <= 1 {
        return (current.to_vec(), voltage.to_vec());
    }
    let smoothed = moving_average_same(voltage, width);
    let trim = width.div_ceil(2) - 1;
    if 2 * trim >= current.len() {
        return (Vec::new(), Vec::new());
    }
    let end = current.len() - trim;
    (current[trim..end].to_vec(), smoothed[trim..end].to_vec())
}

/// Indices (ascending) of the samples inside `hint ± 15%`.
///
/// `physical` holds currents in amperes. When the window holds fewer than
/// three samples the three samples nearest the hint are used instead.
fn hint_window(physical: &[f64], hint: f64) -> Vec<usize> {
    let a = hint * (1.0 - HINT_WINDOW);
    let b = hint * (1.0 + HINT_WINDOW);
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let inside: Vec<usize> = physical
        .iter()
        .enumerate()
        .filter(|(_, x)| **x > lo && **x < hi)
        .map(|(k, _)| k)
        .collect();
    if inside.len() >= MIN_HINT_POINTS {
        return inside;
    }

    let distance: Vec<f64> = physical.iter().map(|x| (x - hint).abs()).collect();
    let mut nearest: Vec<usize> = argsort_by(&distance, |d| d).into_iter().take(MIN_HINT_POINTS).collect();
    nearest.sort_unstable();
    nearest
}

/// Move an overdamped corner outward while the tail dips below the sample
/// just after it.
///
/// The search stops when a rescan returns tail index 0 (after taking that
/// step), when no dip is found, or after `MAX_RESCANS` rounds.
fn rescan_overdamped(current: &[f64], voltage: &[f64], mut idx: usize, mut phi: f64) -> (usize, f64) {
    for round in 0..MAX_RESCANS {
        let tail = idx + 1;
        if tail >= voltage.len() {
            break;
        }
        let reference = voltage[tail].abs();
        let dips = voltage[tail..]
            .windows(2)
            .any(|w| w[0].abs() < reference && w[1].abs() < reference);
        if !dips {
            break;
        }
        let Some((offset, tail_phi)) = corner_index(&current[tail..], &voltage[tail..], 1.0) else {
            break;
        };
        idx = tail + offset;
        phi = tail_phi;
        debug!(round, idx, "overdamped corner moved outward");
        if offset == 0 {
            break;
        }
    }
    (idx, phi)
}

/// Corner of one branch, or `None` when the branch is too short to judge.
pub fn branch_corner(
    segment: &Segment,
    curve_type: CurveType,
    smoothing_width: usize,
    hint: Option<f64>,
) -> Option<BranchCorner> {
    if segment.len() <= 2 {
        return None;
    }

    let order = argsort_by(&segment.current, f64::abs);
    let i_norm = segment.current.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if i_norm == 0.0 {
        return None;
    }
    let v_max = segment.voltage.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let v_norm = if v_max > 0.0 { v_max } else { 1.0 };

    let current: Vec<f64> = order.iter().map(|&k| segment.current[k] / i_norm).collect();
    let voltage: Vec<f64> = order.iter().map(|&k| segment.voltage[k] / v_norm).collect();
    let (mut current, mut voltage) = smooth_branch(&current, &voltage, smoothing_width);

    if let Some(h) = hint {
        let physical: Vec<f64> = current.iter().map(|x| x * i_norm).collect();
        let keep = hint_window(&physical, h);
        current = keep.iter().map(|&k| current[k]).collect();
        voltage = keep.iter().map(|&k| voltage[k]).collect();
    }

    let scale = if curve_type == CurveType::JJa { ARRAY_CURRENT_SCALE } else { 1.0 };
    let (mut idx, mut phi) = corner_index(&current, &voltage, scale)?;
    if curve_type == CurveType::JJo {
        (idx, phi) = rescan_overdamped(&current, &voltage, idx, phi);
    }

    Some(BranchCorner {
        current: current[idx] * i_norm,
        phi,
    })
}

/// Critical currents for a segmented sweep.
///
/// Return branches of hysteretic sweeps carry no corner and inherit the
/// preceding branch's current (with angle 0). Per polarity the candidate with
/// the angle closest to π/2 wins, the earlier branch on a tie.
pub fn extract_critical_currents(
    segments: &Segments,
    curve_type: CurveType,
    smoothing_width: usize,
    hints: [Option<f64>; 2],
) -> CriticalCurrents {
    if curve_type == CurveType::R {
        return CriticalCurrents::default();
    }

    let mut corners = [BranchCorner::default(); 4];
    for (branch, segment) in segments.iter() {
        let k = branch.index();
        if curve_type.is_hysteretic() && branch.is_return() {
            corners[k] = BranchCorner {
                current: corners[k - 1].current,
                phi: 0.0,
            };
            continue;
        }
        let hint = if branch.is_positive() { hints[0] } else { hints[1] };
        if let Some(corner) = branch_corner(segment, curve_type, smoothing_width, hint) {
            corners[k] = corner;
        }
    }

    let pick = |a: BranchCorner, b: BranchCorner| {
        if (b.phi - FRAC_PI_2).abs() < (a.phi - FRAC_PI_2).abs() {
            b.current
        } else {
            a.current
        }
    };
    let critical = CriticalCurrents {
        ic_plus: pick(corners[0], corners[1]),
        ic_minus: pick(corners[2], corners[3]),
        branches: corners,
    };
    debug!(ic_plus = critical.ic_plus, ic_minus = critical.ic_minus, "critical currents");
    critical
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::segments::split_segments;

    fn knee(ic: f64, r: f64, step: f64, n: usize) -> Segment {
        let current: Vec<f64> = (0..=n).map(|k| k as f64 * step).collect();
        let voltage = current.iter().map(|&x| if x < ic { 0.0 } else { r * (x - ic) }).collect();
        Segment {
            start: 0,
            end: n,
            current,
            voltage,
        }
    }

    fn negate(seg: &Segment) -> Segment {
        Segment {
            start: seg.start,
            end: seg.end,
            current: seg.current.iter().map(|x| -x).collect(),
            voltage: seg.voltage.iter().map(|v| -v).collect(),
        }
    }

    #[test]
    fn angles_stay_in_wrapped_range() {
        let seg = knee(10e-6, 50.0, 0.25e-6, 800);
        let phi = corner_angles(&seg.current, &seg.voltage, 1.0);
        assert_eq!(phi.len(), seg.len() - 1);
        assert!(phi.iter().all(|p| (-PI..PI).contains(p)));
    }

    #[test]
    fn knee_is_found_within_one_sample() {
        let step = 0.25e-6;
        let seg = knee(10e-6, 50.0, step, 800);
        let corner = branch_corner(&seg, CurveType::JJo, 1, None).unwrap();
        assert!((corner.current - 10e-6).abs() <= step * 1.001, "{corner:?}");

        let neg = branch_corner(&negate(&seg), CurveType::JJo, 1, None).unwrap();
        assert!((neg.current + 10e-6).abs() <= step * 1.001, "{neg:?}");
    }

    #[test]
    fn knee_is_found_for_milliamp_junction() {
        let step = 1e-5;
        let seg = knee(1e-3, 10.0, step, 300);
        let corner = branch_corner(&seg, CurveType::JJu, 1, None).unwrap();
        assert!((corner.current - 1e-3).abs() <= step * 1.001);
    }

    #[test]
    fn hint_restricts_the_search_window() {
        // Two kinks: 10 µA onto 50 Ω, 50 µA onto 500 Ω.
        let current: Vec<f64> = (0..=100).map(|k| k as f64 * 1e-6).collect();
        let voltage: Vec<f64> = current
            .iter()
            .map(|&x| {
                if x < 10e-6 {
                    0.0
                } else if x < 50e-6 {
                    50.0 * (x - 10e-6)
                } else {
                    50.0 * 40e-6 + 500.0 * (x - 50e-6)
                }
            })
            .collect();
        let seg = Segment {
            start: 0,
            end: 100,
            current,
            voltage,
        };

        let free = branch_corner(&seg, CurveType::JJu, 1, None).unwrap();
        assert!((free.current - 50e-6).abs() < 1e-9);

        let hinted = branch_corner(&seg, CurveType::JJu, 1, Some(10e-6)).unwrap();
        assert!((hinted.current - 10e-6).abs() < 1e-9, "{hinted:?}");
    }

    #[test]
    fn narrow_hint_window_falls_back_to_three_nearest() {
        let physical = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(hint_window(&physical, 2.9), vec![2, 3, 4]);
        assert_eq!(hint_window(&[-3.0, -2.0, -1.0, 0.0], -2.0), vec![0, 1, 2]);
    }

    #[test]
    fn overdamped_rescan_skips_noise_spike() {
        // A single spike at 10 µA creates a premature corner; the real knee is at 50 µA.
        let mut seg = knee(50e-6, 50.0, 1e-6, 100);
        seg.voltage[10] = 0.3e-3;

        let jju = branch_corner(&seg, CurveType::JJu, 1, None).unwrap();
        assert!((jju.current - 9e-6).abs() < 1e-9, "{jju:?}");

        let jjo = branch_corner(&seg, CurveType::JJo, 1, None).unwrap();
        assert!((jjo.current - 50e-6).abs() < 1e-9, "{jjo:?}");
    }

    #[test]
    fn smoothing_trims_edges() {
        let i = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let v = [0.0, 0.0, 0.0, 1.0, 2.0, 3.0];
        let (ci, cv) = smooth_branch(&i, &v, 3);
        assert_eq!(ci, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(cv.len(), 4);
        assert!((cv[2] - 1.0).abs() < 1e-12);

        // Even width 2 trims nothing.
        let (ci, _) = smooth_branch(&i, &v, 2);
        assert_eq!(ci.len(), 6);
        // Too short to trim.
        let (ci, _) = smooth_branch(&i[..2], &v[..2], 5);
        assert!(ci.is_empty());
    }

    fn sweep(ic: f64, step: f64, n: usize) -> Segments {
        let mut current = Vec::new();
        for k in 0..n {
            current.push(k as f64 * step);
        }
        for k in 0..(2 * n) {
            current.push((n as f64 - k as f64) * step);
        }
        for k in 0..=n {
            current.push((k as f64 - n as f64) * step);
        }
        let voltage: Vec<f64> = current
            .iter()
            .map(|&x: &f64| if x.abs() < ic { 0.0 } else { x.signum() * 50.0 * (x.abs() - ic) })
            .collect();
        split_segments(&current, &voltage).unwrap()
    }

    #[test]
    fn ohmic_sweeps_have_no_critical_current() {
        let segs = sweep(10e-6, 1e-6, 100);
        assert_eq!(
            extract_critical_currents(&segs, CurveType::R, 1, [None, None]),
            CriticalCurrents::default()
        );
    }

    #[test]
    fn overdamped_sweep_gives_both_polarities() {
        let segs = sweep(10e-6, 1e-6, 100);
        let ic = extract_critical_currents(&segs, CurveType::JJo, 1, [None, None]);
        assert!((ic.ic_plus - 10e-6).abs() <= 1.001e-6, "{ic:?}");
        assert!((ic.ic_minus + 10e-6).abs() <= 1.001e-6, "{ic:?}");
    }

    #[test]
    fn hysteretic_return_branches_inherit() {
        let segs = sweep(10e-6, 1e-6, 100);
        let ic = extract_critical_currents(&segs, CurveType::JJu, 1, [None, None]);
        assert_eq!(ic.branches[1].current, ic.branches[0].current);
        assert_eq!(ic.branches[3].current, ic.branches[2].current);
        assert_eq!(ic.branches[1].phi, 0.0);
        assert_eq!(ic.ic_plus, ic.branches[0].current);
    }
}
