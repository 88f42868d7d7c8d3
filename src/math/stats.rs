//! Small array statistics shared by the analysis stages.
//!
//! Conventions:
//! - standard deviations are population (ddof = 0) deviations
//! - "argmin"/"argmax" return the first index on ties
//! - NaN entries never win an argmin/argmax

use std::cmp::Ordering;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Keep the values whose z-score magnitude is strictly below `limit`.
///
/// Returns `None` when the filter is undefined (zero or non-finite spread) or
/// would discard everything, so callers can keep their unfiltered set.
pub fn zscore_filter(values: &[f64], limit: f64) -> Option<Vec<f64>> {
    let m = mean(values)?;
    let sd = std_dev(values)?;
    if !(sd.is_finite() && sd > 0.0) {
        return None;
    }
    let kept: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| ((v - m) / sd).abs() < limit)
        .collect();
    if kept.is_empty() { None } else { Some(kept) }
}

/// Indices that sort `values` ascending by `key` (stable).
pub fn argsort_by<F>(values: &[f64], key: F) -> Vec<usize>
where
    F: Fn(f64) -> f64,
{
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| {
        key(values[a])
            .partial_cmp(&key(values[b]))
            .unwrap_or(Ordering::Equal)
    });
    idx
}

pub fn argmin(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some(b) if values[b] <= v => {}
            _ => best = Some(i),
        }
    }
    best
}

pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some(b) if values[b] >= v => {}
            _ => best = Some(i),
        }
    }
    best
}

/// First differences `values[i + 1] - values[i]`.
pub fn diff(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Piecewise-linear interpolation of `(xp, fp)` at `x`.
///
/// `xp` must be non-decreasing. Outside the table the end values are returned.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> Option<f64> {
    if xp.is_empty() || xp.len() != fp.len() {
        return None;
    }
    let last = xp.len() - 1;
    if x <= xp[0] {
        return Some(fp[0]);
    }
    if x >= xp[last] {
        return Some(fp[last]);
    }
    // First knot strictly above x; x lies in [xp[hi - 1], xp[hi]).
    let hi = xp.partition_point(|&v| v <= x);
    let lo = hi - 1;
    let span = xp[hi] - xp[lo];
    if span == 0.0 {
        return Some(fp[lo]);
    }
    Some(fp[lo] + (fp[hi] - fp[lo]) * (x - xp[lo]) / span)
}

/// Centered moving average with zero padding, output length equal to input.
///
/// For even widths the window leans one sample towards the past.
pub fn moving_average_same(values: &[f64], width: usize) -> Vec<f64> {
    if width <= 1 || values.is_empty() {
        return values.to_vec();
    }
    let n = values.len() as isize;
    let w = width as isize;
    let shift = (w - 1) / 2;
    (0..n)
        .map(|i| {
            let mut acc = 0.0;
            for j in 0..w {
                let k = i + shift - j;
                if (0..n).contains(&k) {
                    acc += values[k as usize];
                }
            }
            acc / width as f64
        })
        .collect()
}
