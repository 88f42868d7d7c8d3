//! Normal-state and subgap resistance.
//!
//! The normal-state fit regresses V on I over the resistive part of each
//! polarity; which samples count as resistive depends on the regime:
//!
//! - `R`: the whole sweep, both polarities share one fit
//! - `JJu`: `V` beyond the midpoint of `1.1·V_g` and the voltage extremum
//! - `JJo`: `I` beyond the midpoint of `Ic` and the last current below `0.9·V_g`
//! - `JJa`: as `JJu` with `N·V_g` in place of `V_g`
//!
//! Polarity windows with fewer than three samples, or a degenerate regression,
//! leave that polarity at zero.

use tracing::{debug, warn};

use crate::domain::{
    Branch, CriticalCurrents, CurveType, ResistanceFit, Segment, Segments, SubgapPoint, SubgapResistance,
};
use crate::math::{argsort_by, linear_regression};

pub const MIN_FIT_POINTS: usize = 3;
/// Gap overshoot that marks the start of the resistive branch.
const GAP_MARGIN: f64 = 1.1;
/// Voltage fraction of V_g still counted as below the knee (JJo).
const KNEE_FRACTION: f64 = 0.9;

pub fn fit_resistance(
    current: &[f64],
    voltage: &[f64],
    curve_type: CurveType,
    gap_voltage: f64,
    critical: &CriticalCurrents,
    num_junctions: i64,
) -> ResistanceFit {
    let fit = match curve_type {
        CurveType::R => match linear_regression(current, voltage) {
            Ok(line) => ResistanceFit {
                r_plus: line.slope,
                r_minus: line.slope,
                v_intercept_plus: line.intercept,
                v_intercept_minus: line.intercept,
            },
            Err(err) => {
                warn!(%err, "ohmic resistance fit failed; resistance left at 0");
                ResistanceFit::default()
            }
        },
        CurveType::JJu => gap_referenced_fit(current, voltage, gap_voltage),
        CurveType::JJa => gap_referenced_fit(current, voltage, num_junctions as f64 * gap_voltage),
        CurveType::JJo => {
            let below_knee_max = current
                .iter()
                .zip(voltage)
                .filter(|(_, v)| **v < KNEE_FRACTION * gap_voltage)
                .map(|(i, _)| *i)
                .fold(None, |acc: Option<f64>, i| Some(acc.map_or(i, |m| m.max(i))));
            let above_knee_min = current
                .iter()
                .zip(voltage)
                .filter(|(_, v)| **v > -KNEE_FRACTION * gap_voltage)
                .map(|(i, _)| *i)
                .fold(None, |acc: Option<f64>, i| Some(acc.map_or(i, |m| m.min(i))));
            let i_plus = midpoint(critical.ic_plus, below_knee_max);
            let i_minus = midpoint(critical.ic_minus, above_knee_min);
            debug!(i_plus, i_minus, "overdamped fit limits");

            let (r_plus, v_intercept_plus) = polarity_fit(current, voltage, |i, _| i > i_plus, "positive");
            let (r_minus, v_intercept_minus) = polarity_fit(current, voltage, |i, _| i < i_minus, "negative");
            ResistanceFit {
                r_plus,
                r_minus,
                v_intercept_plus,
                v_intercept_minus,
            }
        }
    };
    debug!(r_plus = fit.r_plus, r_minus = fit.r_minus, curve_type = %curve_type, "resistance fit");
    fit
}

fn midpoint(ic: f64, edge: Option<f64>) -> f64 {
    match edge {
        Some(e) => 0.5 * (ic + e),
        None => ic,
    }
}

fn gap_referenced_fit(current: &[f64], voltage: &[f64], reference: f64) -> ResistanceFit {
    let v_max = voltage.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let v_min = voltage.iter().copied().fold(f64::INFINITY, f64::min);
    let v_plus = 0.5 * (GAP_MARGIN * reference + v_max);
    let v_minus = 0.5 * (-GAP_MARGIN * reference + v_min);
    debug!(v_plus, v_minus, "gap-referenced fit limits");

    let (r_plus, v_intercept_plus) = polarity_fit(current, voltage, |_, v| v > v_plus, "positive");
    let (r_minus, v_intercept_minus) = polarity_fit(current, voltage, |_, v| v < v_minus, "negative");
    ResistanceFit {
        r_plus,
        r_minus,
        v_intercept_plus,
        v_intercept_minus,
    }
}

/// Slope and intercept over the samples `keep` accepts, or zeros.
fn polarity_fit<F: Fn(f64, f64) -> bool>(current: &[f64], voltage: &[f64], keep: F, polarity: &str) -> (f64, f64) {
    let (i, v): (Vec<f64>, Vec<f64>) = current
        .iter()
        .zip(voltage)
        .filter(|(i, v)| keep(**i, **v))
        .map(|(i, v)| (*i, *v))
        .unzip();
    if i.len() < MIN_FIT_POINTS {
        warn!(polarity, points = i.len(), "too few resistive samples; resistance left at 0");
        return (0.0, 0.0);
    }
    match linear_regression(&i, &v) {
        Ok(line) => (line.slope, line.intercept),
        Err(err) => {
            warn!(polarity, %err, "resistance fit failed; resistance left at 0");
            (0.0, 0.0)
        }
    }
}

/// Subgap resistance `±V_sg / I(±V_sg)` on the return branches of a JJu sweep.
pub fn subgap_resistance(segments: &Segments, curve_type: CurveType, subgap_voltage: f64) -> SubgapResistance {
    if curve_type != CurveType::JJu {
        return SubgapResistance::default();
    }
    SubgapResistance {
        plus: subgap_point(segments.get(Branch::DecreasingToZero), subgap_voltage),
        minus: subgap_point(segments.get(Branch::IncreasingToZero), -subgap_voltage),
    }
}

fn subgap_point(segment: &Segment, v_sg: f64) -> SubgapPoint {
    if segment.len() < 2 {
        return SubgapPoint::default();
    }
    let order = argsort_by(&segment.voltage, |v| v);
    let v: Vec<f64> = order.iter().map(|&k| segment.voltage[k]).collect();
    let i: Vec<f64> = order.iter().map(|&k| segment.current[k]).collect();

    let (i_sg, v_low, v_high) = if let Some(k) = v.iter().position(|x| *x == v_sg) {
        (i[k], v_sg, v_sg)
    } else {
        let lower = v.iter().rposition(|x| *x < v_sg);
        let upper = v.iter().position(|x| *x > v_sg);
        let (Some(l), Some(u)) = (lower, upper) else {
            warn!(v_sg, "subgap voltage not bracketed by the return branch; Rsg left at 0");
            return SubgapPoint::default();
        };
        let i_sg = i[l] + (i[u] - i[l]) / (v[u] - v[l]) * (v_sg - v[l]);
        (i_sg, v[l], v[u])
    };

    if i_sg == 0.0 {
        warn!(v_sg, "zero current at the subgap voltage; Rsg left at 0");
        return SubgapPoint::default();
    }
    SubgapPoint {
        resistance: v_sg / i_sg,
        v_low,
        v_high,
    }
}
