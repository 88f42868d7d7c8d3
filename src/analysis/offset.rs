//! Offset removal.
//!
//! Real instruments add a constant thermal-EMF-like voltage (and sometimes a
//! current) offset. Two estimators are provided:
//!
//! - `estimate_voltage_offset`: robust mean of the voltages measured at
//!   `|I| < 10 µA`, used on every sweep.
//! - `estimate_symmetric_offset`: pairs the positive and negative return
//!   branches of hysteretic sweeps and measures how far the curve is from
//!   point symmetry, first in voltage then in current.

use tracing::{debug, warn};

use crate::error::{IvError, IvResult};
use crate::math::{argsort_by, interp, mean, std_dev, zscore_filter};

/// Samples below this current magnitude feed the voltage offset (A).
pub const LOW_CURRENT_LIMIT: f64 = 10e-6;
/// Fallback sample count when no sample is below `LOW_CURRENT_LIMIT`.
const FALLBACK_SAMPLES: usize = 5;
/// Mirror window for the two-branch pairing: ±10% of the key magnitude.
const MIRROR_WINDOW: f64 = 0.1;
/// Outlier cut (in σ) on per-pair offset estimates.
const PAIR_OUTLIER_SIGMA: f64 = 2.0;

/// Result of the low-current voltage offset estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageOffset {
    /// Offset to subtract (0 when below the threshold).
    pub offset: f64,
    /// 3σ of the surviving sample set.
    pub noise: f64,
}

/// Robust voltage offset from the low-current samples.
pub fn estimate_voltage_offset(current: &[f64], voltage: &[f64], threshold: f64) -> IvResult<VoltageOffset> {
    check_shape(current, voltage)?;

    let mut set: Vec<f64> = current
        .iter()
        .zip(voltage)
        .filter(|(i, _)| i.abs() < LOW_CURRENT_LIMIT)
        .map(|(_, v)| *v)
        .collect();
    if set.is_empty() {
        debug!("no samples below 10 µA; using the {FALLBACK_SAMPLES} lowest-current samples");
        set = argsort_by(current, f64::abs)
            .into_iter()
            .take(FALLBACK_SAMPLES)
            .map(|k| voltage[k])
            .collect();
    }

    if let Some(kept) = zscore_filter(&set, 1.0) {
        set = kept;
    }
    if set.len() > 1 {
        if let Some(kept) = zscore_filter(&set, 2.0) {
            set = kept;
        }
    }

    let raw = mean(&set).unwrap_or(0.0);
    let offset = if raw.abs() < threshold { 0.0 } else { raw };
    let noise = 3.0 * std_dev(&set).unwrap_or(0.0);
    debug!(raw, offset, noise, samples = set.len(), "voltage offset estimate");

    Ok(VoltageOffset { offset, noise })
}

/// Whether the voltage sign must be flipped so that resistances come out positive.
///
/// True when the mean voltage over positive currents is negative, or the mean
/// over negative currents is positive. Polarities without samples are ignored.
pub fn needs_sign_flip(current: &[f64], voltage: &[f64]) -> bool {
    let pos: Vec<f64> = polarity_voltages(current, voltage, |i| i > 0.0);
    let neg: Vec<f64> = polarity_voltages(current, voltage, |i| i < 0.0);
    mean(&pos).is_some_and(|m| m < 0.0) || mean(&neg).is_some_and(|m| m > 0.0)
}

fn polarity_voltages<F: Fn(f64) -> bool>(current: &[f64], voltage: &[f64], keep: F) -> Vec<f64> {
    current
        .iter()
        .zip(voltage)
        .filter(|(i, _)| keep(**i))
        .map(|(_, v)| *v)
        .collect()
}

/// Offsets measured from branch point symmetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymmetricOffset {
    pub voltage_offset: f64,
    pub current_offset: f64,
}

/// Two-branch offset estimate.
///
/// `current`/`voltage` are the samples to compare (the return branches of a
/// hysteretic sweep, or the whole sweep otherwise). The voltage offset is
/// measured first; the current offset is then measured on the
/// voltage-corrected samples, so the order of the two steps matters.
pub fn estimate_symmetric_offset(
    current: &[f64],
    voltage: &[f64],
    voltage_threshold: f64,
) -> IvResult<SymmetricOffset> {
    check_shape(current, voltage)?;

    let n_pos = current.iter().filter(|i| **i > 0.0).count();
    let n_neg = current.iter().filter(|i| **i < 0.0).count();
    if n_pos < 2 || n_neg < 2 {
        return Ok(single_sided_offset(current, voltage, voltage_threshold));
    }

    // Only samples in the first/third quadrant take part.
    let (mut pos, mut neg): (Vec<(f64, f64)>, Vec<(f64, f64)>) = (Vec::new(), Vec::new());
    for (&i, &v) in current.iter().zip(voltage) {
        let same_sign = (i >= 0.0 && v >= 0.0) || (i <= 0.0 && v <= 0.0);
        if !same_sign {
            continue;
        }
        if i > 0.0 {
            pos.push((i, v));
        } else if i < 0.0 {
            neg.push((i, v));
        }
    }

    // The shorter polarity is the control group, the other gets interpolated.
    let (control, mut process) = if pos.len() <= neg.len() { (pos, neg) } else { (neg, pos) };

    process.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    let v_estimates = mirror_estimates(&control, &process, |p| p.0, |p| p.1);
    let voltage_offset = trimmed_mean(&v_estimates);
    debug!(voltage_offset, pairs = v_estimates.len(), "two-branch voltage offset");

    // Current offset on voltage-corrected samples, keyed by voltage.
    let control: Vec<(f64, f64)> = control.iter().map(|&(i, v)| (i, v - voltage_offset)).collect();
    let mut process: Vec<(f64, f64)> = process.iter().map(|&(i, v)| (i, v - voltage_offset)).collect();
    process.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    let i_estimates = mirror_estimates(&control, &process, |p| p.1, |p| p.0);
    let current_offset = trimmed_mean(&i_estimates);
    debug!(current_offset, pairs = i_estimates.len(), "two-branch current offset");

    Ok(SymmetricOffset {
        voltage_offset,
        current_offset,
    })
}

/// For every control sample, interpolate the process branch at the mirrored
/// key and average the two values. `process` must be sorted by `key`.
fn mirror_estimates<K, Y>(control: &[(f64, f64)], process: &[(f64, f64)], key: K, value: Y) -> Vec<f64>
where
    K: Fn(&(f64, f64)) -> f64,
    Y: Fn(&(f64, f64)) -> f64,
{
    let mut out = Vec::new();
    for c in control {
        let k = key(c);
        let lo = k.abs() * (1.0 - MIRROR_WINDOW);
        let hi = k.abs() * (1.0 + MIRROR_WINDOW);
        let (xp, fp): (Vec<f64>, Vec<f64>) = process
            .iter()
            .filter(|p| {
                let m = key(p).abs();
                m > lo && m < hi
            })
            .map(|p| (key(p), value(p)))
            .unzip();
        if xp.len() < 2 {
            continue;
        }
        if let Some(mirrored) = interp(-k, &xp, &fp) {
            out.push(0.5 * (value(c) + mirrored));
        }
    }
    out
}

/// Mean after dropping estimates further than 2σ from the mean.
fn trimmed_mean(estimates: &[f64]) -> f64 {
    let (Some(m), Some(sd)) = (mean(estimates), std_dev(estimates)) else {
        warn!("no mirrored pairs found; offset left at 0");
        return 0.0;
    };
    let kept: Vec<f64> = estimates
        .iter()
        .copied()
        .filter(|e| (e - m).abs() <= PAIR_OUTLIER_SIGMA * sd)
        .collect();
    mean(&kept).unwrap_or(0.0)
}

/// Single-polarity sweeps: average the two samples nearest zero current.
fn single_sided_offset(current: &[f64], voltage: &[f64], voltage_threshold: f64) -> SymmetricOffset {
    let nearest: Vec<f64> = argsort_by(current, f64::abs)
        .into_iter()
        .take(2)
        .map(|k| voltage[k])
        .collect();
    let raw = mean(&nearest).unwrap_or(0.0);
    let v_max = voltage.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let voltage_offset = if raw.abs() < voltage_threshold && raw.abs() < 0.01 * v_max {
        0.0
    } else {
        raw
    };
    debug!(voltage_offset, "single-sided sweep; offset from the two samples nearest zero current");
    SymmetricOffset {
        voltage_offset,
        current_offset: 0.0,
    }
}

fn check_shape(current: &[f64], voltage: &[f64]) -> IvResult<()> {
    if current.len() != voltage.len() {
        return Err(IvError::DataShape(format!(
            "current and voltage lengths differ ({} vs {})",
            current.len(),
            voltage.len()
        )));
    }
    if current.is_empty() {
        return Err(IvError::DataShape("offset estimate needs samples".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ohmic(offset_v: f64, offset_i: f64) -> (Vec<f64>, Vec<f64>) {
        // R = 100 Ω, currents -50..50 µA in 1 µA steps.
        let i_true: Vec<f64> = (-50..=50).map(|k| k as f64 * 1e-6).collect();
        let i = i_true.iter().map(|x| x + offset_i).collect();
        let v = i_true.iter().map(|x| 100.0 * x + offset_v).collect();
        (i, v)
    }

    #[test]
    fn low_current_offset_is_recovered() {
        // Flat superconducting branch at 0.5 mV near zero current.
        let i: Vec<f64> = (-40..=40).map(|k| k as f64 * 0.5e-6).collect();
        let v = vec![0.5e-3; i.len()];
        let off = estimate_voltage_offset(&i, &v, 2e-5).unwrap();
        assert!((off.offset - 0.5e-3).abs() < 1e-12);
        assert!(off.noise.abs() < 1e-12);
    }

    #[test]
    fn small_offset_is_ignored() {
        let i: Vec<f64> = (-40..=40).map(|k| k as f64 * 0.5e-6).collect();
        let v = vec![1e-5; i.len()];
        let off = estimate_voltage_offset(&i, &v, 2e-5).unwrap();
        assert_eq!(off.offset, 0.0);
    }

    #[test]
    fn rerun_after_correction_yields_zero() {
        let i: Vec<f64> = (-40..=40).map(|k| k as f64 * 0.5e-6).collect();
        let v: Vec<f64> = i
            .iter()
            .enumerate()
            .map(|(k, _)| 0.3e-3 + if k % 2 == 0 { 1e-6 } else { -1e-6 })
            .collect();
        let first = estimate_voltage_offset(&i, &v, 2e-5).unwrap();
        let corrected: Vec<f64> = v.iter().map(|x| x - first.offset).collect();
        let second = estimate_voltage_offset(&i, &corrected, 2e-5).unwrap();
        assert_eq!(second.offset, 0.0);
    }

    #[test]
    fn falls_back_to_nearest_samples_when_no_low_current_data() {
        let i = [1e-3, 2e-3, 3e-3, 4e-3, 5e-3, 6e-3, 7e-3];
        let v = [1e-3; 7];
        let off = estimate_voltage_offset(&i, &v, 2e-5).unwrap();
        assert!((off.offset - 1e-3).abs() < 1e-15);
    }

    #[test]
    fn sign_flip_detection() {
        let i = [-1.0, -0.5, 0.5, 1.0];
        assert!(!needs_sign_flip(&i, &[-2.0, -1.0, 1.0, 2.0]));
        assert!(needs_sign_flip(&i, &[2.0, 1.0, -1.0, -2.0]));
        assert!(!needs_sign_flip(&[0.5, 1.0], &[1.0, 2.0]));
    }

    #[test]
    fn symmetric_offset_recovers_voltage_offset() {
        let (i, v) = ohmic(0.2e-3, 0.0);
        let off = estimate_symmetric_offset(&i, &v, 1e-5).unwrap();
        assert!((off.voltage_offset - 0.2e-3).abs() < 1e-9, "{off:?}");
        assert!(off.current_offset.abs() < 1e-9, "{off:?}");
    }

    #[test]
    fn symmetric_offset_recovers_current_offset() {
        let (i, v) = ohmic(0.0, 0.4e-6);
        let off = estimate_symmetric_offset(&i, &v, 1e-5).unwrap();
        // A pure current shift on a straight line is indistinguishable from a
        // voltage shift of -R·I_off; the estimator attributes it to voltage first.
        let combined = off.voltage_offset - 100.0 * off.current_offset;
        assert!((combined + 100.0 * 0.4e-6).abs() < 1e-9, "{off:?}");
    }

    #[test]
    fn single_sided_sweep_uses_two_nearest_samples() {
        let i = [0.0, 1e-6, 2e-6, 3e-6];
        let v = [1e-3, 1e-3, 2e-3, 3e-3];
        let off = estimate_symmetric_offset(&i, &v, 1e-5).unwrap();
        assert!((off.voltage_offset - 1e-3).abs() < 1e-15);
        assert_eq!(off.current_offset, 0.0);
    }

    #[test]
    fn trimmed_mean_drops_outlying_pair() {
        let mut estimates = vec![1.0; 9];
        estimates.push(10.0);
        assert_eq!(trimmed_mean(&estimates), 1.0);
        assert_eq!(trimmed_mean(&[2.0, 2.0, 2.0]), 2.0);
        assert_eq!(trimmed_mean(&[]), 0.0);
    }

    #[test]
    fn symmetric_offset_survives_noise_and_a_spike() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;
        use rand_distr::{Distribution, Normal};

        let (i, mut v) = ohmic(0.2e-3, 0.0);
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 2e-6).unwrap();
        for x in v.iter_mut() {
            *x += noise.sample(&mut rng);
        }
        v[60] += 5e-4;

        let off = estimate_symmetric_offset(&i, &v, 1e-5).unwrap();
        assert!((off.voltage_offset - 0.2e-3).abs() < 2e-6, "{off:?}");
        assert!(off.current_offset.abs() < 1e-7, "{off:?}");
    }
}
