//! Unit normalization: scale raw columns to amperes and volts.
//!
//! Unit labels are matched on their first character against the SI prefixes
//! `f p n u m k M G T` (`µ` is accepted as a spelling of `u`). Anything else,
//! including a bare `A`/`V` or an empty label, is the base unit.

use crate::error::{IvError, IvResult};

const PREFIXES: [(char, f64); 10] = [
    ('f', 1e-15),
    ('p', 1e-12),
    ('n', 1e-9),
    ('u', 1e-6),
    ('µ', 1e-6),
    ('m', 1e-3),
    ('k', 1e3),
    ('M', 1e6),
    ('G', 1e9),
    ('T', 1e12),
];

/// Multiplier that converts a value in `unit` to the base unit.
pub fn unit_multiplier(unit: &str) -> f64 {
    let Some(first) = unit.trim().chars().next() else {
        return 1.0;
    };
    PREFIXES
        .iter()
        .find(|(prefix, _)| *prefix == first)
        .map(|(_, m)| *m)
        .unwrap_or(1.0)
}

/// Scale raw current/voltage columns to A and V.
pub fn normalize_units(
    current_raw: &[f64],
    voltage_raw: &[f64],
    current_unit: &str,
    voltage_unit: &str,
) -> IvResult<(Vec<f64>, Vec<f64>)> {
    if current_raw.len() != voltage_raw.len() {
        return Err(IvError::DataShape(format!(
            "current and voltage lengths differ ({} vs {})",
            current_raw.len(),
            voltage_raw.len()
        )));
    }
    if current_raw.is_empty() {
        return Err(IvError::DataShape("sweep has no samples".into()));
    }
    if current_raw.iter().chain(voltage_raw).any(|v| !v.is_finite()) {
        return Err(IvError::DataShape("sweep contains non-finite samples".into()));
    }

    let i_scale = unit_multiplier(current_unit);
    let v_scale = unit_multiplier(voltage_unit);
    let current = current_raw.iter().map(|v| v * i_scale).collect();
    let voltage = voltage_raw.iter().map(|v| v * v_scale).collect();
    Ok((current, voltage))
}
