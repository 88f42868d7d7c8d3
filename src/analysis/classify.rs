//! Curve classification: Ohmic vs. the three junction regimes.
//!
//! 1. Regress V on I over the 20 lowest-|I| and the 20 highest-|I| samples.
//!    A low-current fit with r < 0.9 (or no fit at all) counts as slope 0.
//! 2. Slopes within 25% of each other: `R`.
//! 3. Otherwise measure the hysteresis as the largest voltage jump between
//!    current-ordered neighbours and compare it to the gap voltage:
//!    `> 1.5 V_g` is an array, `> V_g / 4` a hysteretic junction, else overdamped.
//!
//! Exact ties on any threshold fall through to the next branch of the list
//! (all comparisons are strict).

use tracing::debug;

use crate::domain::CurveType;
use crate::error::{IvError, IvResult};
use crate::math::{argsort_by, linear_regression};

/// Samples used at each end of the |I| range.
pub const CLASSIFY_WINDOW: usize = 20;
/// Minimum correlation for the low-current slope to be trusted.
const MIN_LOW_CURRENT_R: f64 = 0.9;
/// Relative slope agreement that makes a sweep Ohmic.
const OHMIC_SLOPE_TOLERANCE: f64 = 0.25;

/// Inputs and outcome of a classification, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub curve_type: CurveType,
    pub slope_low: f64,
    pub slope_high: f64,
    /// Largest neighbour voltage jump (V); 0 for Ohmic sweeps.
    pub hysteresis: f64,
}

pub fn classify_curve(current: &[f64], voltage: &[f64], gap_voltage: f64) -> IvResult<Classification> {
    if current.len() != voltage.len() {
        return Err(IvError::DataShape(format!(
            "current and voltage lengths differ ({} vs {})",
            current.len(),
            voltage.len()
        )));
    }
    if current.len() < 2 {
        return Err(IvError::DataShape(format!(
            "classification needs at least 2 samples, got {}",
            current.len()
        )));
    }

    let order = argsort_by(current, f64::abs);
    let window = CLASSIFY_WINDOW.min(order.len());
    let low = &order[..window];
    let high = &order[order.len() - window..];

    let slope_low = match group_fit(current, voltage, low) {
        Some((slope, r)) if r >= MIN_LOW_CURRENT_R => slope,
        _ => 0.0,
    };
    let slope_high = group_fit(current, voltage, high).map(|(s, _)| s).unwrap_or(0.0);

    let slope_scale = slope_low.abs().max(slope_high.abs());
    if (slope_low - slope_high).abs() < OHMIC_SLOPE_TOLERANCE * slope_scale {
        debug!(slope_low, slope_high, "classified as ohmic");
        return Ok(Classification {
            curve_type: CurveType::R,
            slope_low,
            slope_high,
            hysteresis: 0.0,
        });
    }

    let hysteresis = hysteresis_magnitude(current, voltage);
    let curve_type = if hysteresis > 1.5 * gap_voltage {
        CurveType::JJa
    } else if hysteresis > gap_voltage / 4.0 {
        CurveType::JJu
    } else {
        CurveType::JJo
    };
    debug!(slope_low, slope_high, hysteresis, curve_type = %curve_type, "classified junction sweep");

    Ok(Classification {
        curve_type,
        slope_low,
        slope_high,
        hysteresis,
    })
}

/// Largest absolute voltage difference between neighbours in current order.
pub fn hysteresis_magnitude(current: &[f64], voltage: &[f64]) -> f64 {
    let order = argsort_by(current, |v| v);
    order
        .windows(2)
        .map(|w| (voltage[w[1]] - voltage[w[0]]).abs())
        .fold(0.0, f64::max)
}

fn group_fit(current: &[f64], voltage: &[f64], idx: &[usize]) -> Option<(f64, f64)> {
    let i: Vec<f64> = idx.iter().map(|&k| current[k]).collect();
    let v: Vec<f64> = idx.iter().map(|&k| voltage[k]).collect();
    linear_regression(&i, &v).ok().map(|fit| (fit.slope, fit.r_value))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VG: f64 = 2.8e-3;

    /// Full sweep 0 → +imax → −imax → 0.
    fn sweep_currents(imax: f64, n_quarter: usize) -> Vec<f64> {
        let step = imax / n_quarter as f64;
        let mut out = Vec::new();
        for k in 0..n_quarter {
            out.push(k as f64 * step);
        }
        for k in 0..(2 * n_quarter) {
            out.push(imax - k as f64 * step);
        }
        for k in 0..=n_quarter {
            out.push(-imax + k as f64 * step);
        }
        out
    }

    /// Zero voltage below `ic`, then a jump of `jump` plus a 50 Ω slope.
    fn jump_sweep(jump: f64) -> (Vec<f64>, Vec<f64>) {
        let ic = 0.5e-3;
        let i = sweep_currents(1e-3, 100);
        let v = i
            .iter()
            .map(|&x| {
                if x.abs() < ic {
                    0.0
                } else {
                    x.signum() * (jump + 50.0 * (x.abs() - ic))
                }
            })
            .collect();
        (i, v)
    }

    #[test]
    fn linear_sweep_is_ohmic() {
        let i = sweep_currents(1e-3, 50);
        let v: Vec<f64> = i.iter().map(|x| 5.0 * x).collect();
        let c = classify_curve(&i, &v, VG).unwrap();
        assert_eq!(c.curve_type, CurveType::R);
        assert!((c.slope_low - 5.0).abs() < 1e-9);
    }

    #[test]
    fn large_jump_is_array() {
        let (i, v) = jump_sweep(2.0 * VG);
        assert_eq!(classify_curve(&i, &v, VG).unwrap().curve_type, CurveType::JJa);
    }

    #[test]
    fn half_gap_jump_is_hysteretic_junction() {
        let (i, v) = jump_sweep(0.5 * VG);
        let c = classify_curve(&i, &v, VG).unwrap();
        assert_eq!(c.curve_type, CurveType::JJu);
        assert!(c.hysteresis > VG / 4.0);
    }

    #[test]
    fn small_jump_is_overdamped_junction() {
        let (i, v) = jump_sweep(0.1 * VG);
        assert_eq!(classify_curve(&i, &v, VG).unwrap().curve_type, CurveType::JJo);
    }

    #[test]
    fn hysteresis_uses_current_order_not_sweep_order() {
        let i = [0.0, 2.0, 1.0];
        let v = [0.0, 1.0, 5.0];
        // Sorted by current: (0,0), (1,5), (2,1) -> jumps 5 and 4.
        assert!((hysteresis_magnitude(&i, &v) - 5.0).abs() < 1e-15);
    }
}
