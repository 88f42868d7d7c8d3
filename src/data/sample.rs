//! Synthetic I–V sweep generation.
//!
//! Produces full bidirectional sweeps `0 → +Imax → 0 → −Imax → 0` for each
//! regime so the pipeline can be exercised without a cryostat.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{CurveType, DEFAULT_GAP_VOLTAGE, SweepInput};
use crate::error::AppError;

/// Parameters of one synthetic sweep (SI units).
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSpec {
    pub kind: CurveType,
    /// Sweep amplitude (A).
    pub i_max: f64,
    /// Samples per quarter sweep; the full sweep has `4n + 1` samples.
    pub points_per_quarter: usize,
    /// Switching current of a single junction (A).
    pub critical_current: f64,
    /// Normal-state resistance per junction (Ω).
    pub normal_resistance: f64,
    pub gap_voltage: f64,
    /// Slope of the retrapping branch below the gap (Ω).
    pub subgap_resistance: f64,
    /// Array switching levels: `(current, junctions switching there)`.
    pub array_levels: Vec<(f64, usize)>,
    /// Standard deviation of the Gaussian voltage noise (V).
    pub noise_std: f64,
    /// Constant voltage offset added to every sample (V).
    pub voltage_offset: f64,
    /// Sweep towards negative current first.
    pub reverse: bool,
    pub seed: u64,
}

impl SweepSpec {
    /// Defaults that every analysis stage resolves cleanly.
    pub fn for_kind(kind: CurveType) -> Self {
        let base = Self {
            kind,
            i_max: 300e-6,
            points_per_quarter: 300,
            critical_current: 100e-6,
            normal_resistance: 20.0,
            gap_voltage: DEFAULT_GAP_VOLTAGE,
            subgap_resistance: 400.0,
            array_levels: Vec::new(),
            noise_std: 0.0,
            voltage_offset: 0.0,
            reverse: false,
            seed: 42,
        };
        match kind {
            CurveType::R => Self {
                normal_resistance: 100.0,
                ..base
            },
            CurveType::JJo => Self {
                i_max: 200e-6,
                points_per_quarter: 800,
                critical_current: 10e-6,
                normal_resistance: 50.0,
                ..base
            },
            CurveType::JJu => base,
            CurveType::JJa => Self {
                array_levels: vec![(40e-6, 1), (60e-6, 2), (80e-6, 1), (100e-6, 3)],
                ..base
            },
        }
    }

    /// Junctions in the array (1 for single junctions).
    pub fn junction_count(&self) -> usize {
        match self.kind {
            CurveType::JJa => self.array_levels.iter().map(|(_, n)| n).sum(),
            _ => 1,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.points_per_quarter == 0 {
            return Err(AppError::new(2, "Points per quarter sweep must be > 0."));
        }
        let positive = [
            self.i_max,
            self.normal_resistance,
            self.gap_voltage,
            self.subgap_resistance,
        ];
        if positive.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
            return Err(AppError::new(
                2,
                "Sweep amplitude, resistances and gap voltage must be finite and > 0.",
            ));
        }
        if !(self.critical_current.is_finite() && self.critical_current >= 0.0) {
            return Err(AppError::new(2, "Critical current must be finite and >= 0."));
        }
        if !(self.noise_std.is_finite() && self.noise_std >= 0.0) || !self.voltage_offset.is_finite() {
            return Err(AppError::new(2, "Invalid noise or offset settings."));
        }
        if self.kind == CurveType::JJa && self.junction_count() == 0 {
            return Err(AppError::new(2, "Array sweeps need at least one switching level."));
        }
        Ok(())
    }
}

/// Generate one sweep, labelled in `A` / `V`.
pub fn generate_sweep(name: &str, spec: &SweepSpec) -> Result<SweepInput, AppError> {
    spec.validate()?;

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, spec.noise_std.max(f64::MIN_POSITIVE))
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let (current, rising) = sweep_currents(spec);
    let total = spec.junction_count();

    let voltage = current
        .iter()
        .zip(&rising)
        .map(|(&i, &up)| {
            let v = match spec.kind {
                CurveType::R => spec.normal_resistance * i,
                CurveType::JJo => {
                    if i.abs() < spec.critical_current {
                        0.0
                    } else {
                        i.signum() * spec.normal_resistance * (i.abs() - spec.critical_current)
                    }
                }
                CurveType::JJu => {
                    if up && i.abs() < spec.critical_current {
                        0.0
                    } else {
                        quasiparticle_voltage(spec, i)
                    }
                }
                CurveType::JJa => {
                    let switched: usize = if up {
                        spec.array_levels
                            .iter()
                            .filter(|(level, _)| i.abs() >= *level)
                            .map(|(_, n)| n)
                            .sum()
                    } else {
                        total
                    };
                    switched as f64 * quasiparticle_voltage(spec, i)
                }
            };
            let noise = if spec.noise_std > 0.0 { normal.sample(&mut rng) } else { 0.0 };
            v + noise + spec.voltage_offset
        })
        .collect();

    Ok(SweepInput {
        name: name.to_string(),
        current_raw: current,
        voltage_raw: voltage,
        current_unit: "A".to_string(),
        voltage_unit: "V".to_string(),
    })
}

/// Current samples plus whether each one is moving away from zero.
fn sweep_currents(spec: &SweepSpec) -> (Vec<f64>, Vec<bool>) {
    let n = spec.points_per_quarter;
    let step = spec.i_max / n as f64;
    let sign = if spec.reverse { -1.0 } else { 1.0 };

    let mut current = Vec::with_capacity(4 * n + 1);
    let mut rising = Vec::with_capacity(4 * n + 1);
    for k in 0..=n {
        current.push(sign * k as f64 * step);
        rising.push(true);
    }
    for k in 1..=n {
        current.push(sign * (n - k) as f64 * step);
        rising.push(false);
    }
    for k in 1..=n {
        current.push(-sign * k as f64 * step);
        rising.push(true);
    }
    for k in 1..=n {
        current.push(-sign * (n - k) as f64 * step);
        rising.push(false);
    }
    (current, rising)
}

/// Single-junction resistive state: subgap slope, then the gap plateau, then ohmic.
fn quasiparticle_voltage(spec: &SweepSpec, i: f64) -> f64 {
    let a = i.abs();
    let v = if a * spec.subgap_resistance < spec.gap_voltage {
        a * spec.subgap_resistance
    } else if a * spec.normal_resistance < spec.gap_voltage {
        spec.gap_voltage
    } else {
        a * spec.normal_resistance
    };
    if i < 0.0 { -v } else { v }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_sweep_has_single_extrema() {
        let spec = SweepSpec::for_kind(CurveType::R);
        let sweep = generate_sweep("r", &spec).unwrap();
        let n = spec.points_per_quarter;
        assert_eq!(sweep.current_raw.len(), 4 * n + 1);
        assert_eq!(sweep.current_raw[0], 0.0);
        assert_eq!(*sweep.current_raw.last().unwrap(), 0.0);

        let max = sweep.current_raw.iter().cloned().fold(f64::MIN, f64::max);
        let maxima = sweep.current_raw.iter().filter(|&&i| i == max).count();
        assert_eq!(maxima, 1);
        assert!((max - spec.i_max).abs() < 1e-12);
        assert!((sweep.voltage_raw[n] - 100.0 * spec.i_max).abs() < 1e-12);
    }

    #[test]
    fn reverse_sweeps_negative_first() {
        let spec = SweepSpec {
            reverse: true,
            ..SweepSpec::for_kind(CurveType::JJo)
        };
        let sweep = generate_sweep("jjo", &spec).unwrap();
        assert!(sweep.current_raw[1] < 0.0);
        assert!(sweep.voltage_raw[spec.points_per_quarter] < 0.0);
    }

    #[test]
    fn hysteretic_junction_switches_and_retraps() {
        let spec = SweepSpec::for_kind(CurveType::JJu);
        let sweep = generate_sweep("jju", &spec).unwrap();
        let n = spec.points_per_quarter;
        // 50 uA: superconducting on the way up, subgap on the way down.
        let up = n / 6;
        let down = 2 * n - up;
        assert!((sweep.current_raw[up] - sweep.current_raw[down]).abs() < 1e-15);
        assert_eq!(sweep.voltage_raw[up], 0.0);
        assert!(sweep.voltage_raw[down] > 0.0);
        assert!(sweep.voltage_raw[down] <= spec.gap_voltage);
    }

    #[test]
    fn array_counts_switched_junctions() {
        let spec = SweepSpec::for_kind(CurveType::JJa);
        assert_eq!(spec.junction_count(), 7);
        let sweep = generate_sweep("jja", &spec).unwrap();
        // 70 uA on the rising branch: 1 + 2 junctions on the gap plateau.
        let k = 70;
        assert!((sweep.current_raw[k] - 70e-6).abs() < 1e-12);
        assert!((sweep.voltage_raw[k] - 3.0 * spec.gap_voltage).abs() < 1e-12);
    }

    #[test]
    fn noise_is_seeded() {
        let spec = SweepSpec {
            noise_std: 1e-6,
            ..SweepSpec::for_kind(CurveType::R)
        };
        let a = generate_sweep("a", &spec).unwrap();
        let b = generate_sweep("b", &spec).unwrap();
        assert_eq!(a.voltage_raw, b.voltage_raw);

        let c = generate_sweep("c", &SweepSpec { seed: 7, ..spec.clone() }).unwrap();
        assert_ne!(a.voltage_raw, c.voltage_raw);
    }

    #[test]
    fn invalid_specs_are_rejected() {
        let spec = SweepSpec {
            points_per_quarter: 0,
            ..SweepSpec::for_kind(CurveType::R)
        };
        assert_eq!(generate_sweep("x", &spec).unwrap_err().exit_code(), 2);

        let spec = SweepSpec {
            array_levels: Vec::new(),
            ..SweepSpec::for_kind(CurveType::JJa)
        };
        assert_eq!(generate_sweep("x", &spec).unwrap_err().exit_code(), 2);
    }
}
