//! Series-array analysis: junction count from quantized voltage steps.
//!
//! On the rising branch of an array sweep every switching event adds an
//! integer number of gap voltages. The analysis:
//!
//! 1. finds the window of switching steps (differences above `V_g/3`),
//! 2. picks the gap voltage in `V_g·(1 ± σ)` that makes all steps closest to
//!    integer multiples,
//! 3. rounds every step to a junction count and sums them.

use tracing::{debug, warn};

use crate::domain::{AnalysisConfig, ArrayAnalysis, Branch, CurveType, Segment, Segments};
use crate::error::{IvError, IvResult};
use crate::math::{DEFAULT_GRID_STEPS, argmax, argmin, diff, median, minimize_bounded, std_dev};

const EPS: f64 = 1e-9;
/// Differential-resistance outlier cut (in σ around the median).
const RDIFF_OUTLIER_SIGMA: f64 = 3.0;
/// Sub-threshold differences needed to close the step window.
const QUIET_RUN: usize = 3;

/// Single-junction gap voltage read off a return branch.
///
/// The voltage at the largest differential resistance, ignoring resistance
/// outliers (beyond 3σ of the median) and the last quarter of the branch.
pub fn estimate_gap_voltage(segment: &Segment) -> Option<f64> {
    if segment.len() < 2 {
        return None;
    }
    let mut r_diff: Vec<f64> = segment
        .current
        .windows(2)
        .zip(segment.voltage.windows(2))
        .map(|(i, v)| (v[1] - v[0]) / ((i[1] - i[0]) + EPS) + EPS)
        .collect();

    let med = median(&r_diff)?;
    let sd = std_dev(&r_diff)?;
    for r in r_diff.iter_mut() {
        if (*r - med).abs() > RDIFF_OUTLIER_SIGMA * sd {
            *r = f64::NAN;
        }
    }
    let n = r_diff.len();
    for r in &mut r_diff[n - n.div_ceil(4)..] {
        *r = f64::NAN;
    }

    argmax(&r_diff).map(|k| segment.voltage[k])
}

/// `[first, last]` sample indices of the switching-step window on `voltage`.
///
/// `gap_estimate` of 0 disables the estimate-based bounds.
pub fn find_step_window(voltage: &[f64], gap_voltage: f64, gap_estimate: f64) -> Option<(usize, usize)> {
    let threshold = gap_voltage / 3.0;
    let steps = diff(voltage);
    let first = steps.iter().position(|d| *d > threshold)?;

    let near_estimate = |n: usize| (voltage[n] - gap_estimate).abs() < gap_estimate / 4.0;
    let mut last = (first..steps.len().saturating_sub(QUIET_RUN))
        .find(|&n| steps[n..n + QUIET_RUN].iter().all(|d| *d < threshold) && near_estimate(n))
        .unwrap_or(steps.len() - 1);

    if gap_estimate != 0.0 {
        let distance: Vec<f64> = voltage.iter().map(|v| (v - gap_estimate).abs()).collect();
        if let Some(k) = argmin(&distance) {
            last = last.min(k);
        }
    }
    Some((first, last))
}

/// Gap voltage in `[V_g(1−σ), V_g(1+σ)]` minimizing `Σ |round(Δ/g) − Δ/g|`.
pub fn optimize_gap_voltage(steps: &[f64], gap_voltage: f64, sigma: f64) -> IvResult<f64> {
    let residual = |g: f64| steps.iter().map(|d| ((d / g).round() - d / g).abs()).sum::<f64>();
    let best = minimize_bounded(
        residual,
        gap_voltage * (1.0 - sigma),
        gap_voltage * (1.0 + sigma),
        DEFAULT_GRID_STEPS,
    )?;
    debug!(gap_voltage_optimal = best.x, residual = best.value, "array gap voltage");
    Ok(best.x)
}

pub fn analyze_array(segments: &Segments, curve_type: CurveType, config: &AnalysisConfig) -> IvResult<ArrayAnalysis> {
    if curve_type != CurveType::JJa {
        return Ok(ArrayAnalysis {
            num_junctions: if curve_type == CurveType::R { 0 } else { 1 },
            gap_voltage_optimal: config.gap_voltage,
            ..ArrayAnalysis::default()
        });
    }

    let gap_voltage_estimate = estimate_gap_voltage(segments.get(Branch::DecreasingToZero)).unwrap_or_else(|| {
        warn!("no usable return branch for the gap estimate; window bounded by the step pattern only");
        0.0
    });

    let rising = segments.get(Branch::Increasing);
    let (first, last) = find_step_window(&rising.voltage, config.gap_voltage, gap_voltage_estimate).ok_or_else(|| {
        IvError::FitDegenerate(format!(
            "no voltage step above V_g/3 = {:.3e} V on the rising branch",
            config.gap_voltage / 3.0
        ))
    })?;
    if last <= first {
        return Err(IvError::FitDegenerate(format!(
            "empty switching window [{first}, {last}] on the rising branch"
        )));
    }

    let steps = diff(&rising.voltage[first..=last]);
    let gap_voltage_optimal = optimize_gap_voltage(&steps, config.gap_voltage, config.array_sigma)?;
    let junction_counts_per_level: Vec<i64> = steps
        .iter()
        .map(|d| (d / gap_voltage_optimal).round() as i64)
        .collect();
    let num_junctions = junction_counts_per_level.iter().sum();
    let ic_levels = rising.current[first..last].to_vec();
    debug!(first, last, num_junctions, "array steps");

    Ok(ArrayAnalysis {
        num_junctions,
        gap_voltage_optimal,
        ic_levels,
        junction_counts_per_level,
        gap_voltage_estimate,
    })
}
