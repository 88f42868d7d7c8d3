//! Shared "analysis pipeline" logic used by the CLI and the integration tests.
//!
//! Keeping this in one place avoids duplicating the stage order:
//! units -> offset -> sign -> split -> classify -> (symmetric offset) ->
//! critical currents -> array -> resistance -> subgap -> report
//!
//! Callers can then focus on presentation (tables vs exports).

use rayon::prelude::*;
use tracing::debug;

use crate::domain::{AnalysisConfig, Sweep, SweepFailure, SweepInput, SweepReport};
use crate::error::{IvError, IvResult};

/// Run every stage on one sweep and return its report.
pub fn analyze_sweep(input: &SweepInput, config: &AnalysisConfig) -> IvResult<SweepReport> {
    config.validate()?;

    // 1) Units and low-current voltage offset.
    let mut sweep = Sweep::from_input(input, config)?;
    sweep.remove_voltage_offset(config.v_offset_threshold)?;
    sweep.correct_voltage_sign();

    // 2) Branches and regime.
    sweep.split()?;
    let curve_type = match config.curve_type_override {
        Some(forced) => {
            sweep.set_curve_type(forced);
            forced
        }
        None => sweep.classify()?,
    };

    // 3) Optional two-branch offset on hysteretic sweeps.
    if config.symmetric_offset && curve_type.is_hysteretic() {
        let offset = sweep.remove_symmetric_offset()?;
        debug!(
            sweep = %sweep.name,
            voltage_offset = offset.voltage_offset,
            current_offset = offset.current_offset,
            "symmetric offset removed"
        );
    }

    // 4) Characteristics. Array analysis feeds the resistance fit.
    sweep.find_critical_currents(config.smoothing_width, config.ic_estimates)?;
    sweep.analyze_array(config)?;
    sweep.fit_resistance()?;
    sweep.fit_subgap()?;

    sweep.into_report()
}

/// Analyze sweeps in parallel. Results keep the input order.
pub fn analyze_batch(inputs: &[SweepInput], config: &AnalysisConfig) -> Vec<IvResult<SweepReport>> {
    inputs.par_iter().map(|input| analyze_sweep(input, config)).collect()
}

/// Split batch results into reports and failures, keeping input order.
pub fn partition_results(
    inputs: &[SweepInput],
    results: Vec<IvResult<SweepReport>>,
) -> (Vec<SweepReport>, Vec<SweepFailure>) {
    let mut reports = Vec::new();
    let mut failures = Vec::new();
    for (input, result) in inputs.iter().zip(results) {
        match result {
            Ok(report) => reports.push(report),
            Err(err) => failures.push(failure(&input.name, &err)),
        }
    }
    (reports, failures)
}

fn failure(name: &str, err: &IvError) -> SweepFailure {
    SweepFailure {
        name: name.to_string(),
        error: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SweepSpec, generate_sweep};
    use crate::domain::CurveType;

    #[test]
    fn invalid_config_fails_before_any_stage() {
        let input = generate_sweep("r", &SweepSpec::for_kind(CurveType::R)).unwrap();
        let config = AnalysisConfig {
            subgap_voltage: 5e-3,
            ..AnalysisConfig::default()
        };
        let err = analyze_sweep(&input, &config).unwrap_err();
        assert!(matches!(err, IvError::Configuration(_)));
    }

    #[test]
    fn override_skips_classification() {
        let input = generate_sweep("r", &SweepSpec::for_kind(CurveType::R)).unwrap();
        let config = AnalysisConfig {
            curve_type_override: Some(CurveType::JJo),
            ..AnalysisConfig::default()
        };
        let report = analyze_sweep(&input, &config).unwrap();
        assert_eq!(report.curve_type, CurveType::JJo);
        assert_eq!(report.array.num_junctions, 1);
    }

    #[test]
    fn failures_are_partitioned_in_order() {
        let good = generate_sweep("good", &SweepSpec::for_kind(CurveType::R)).unwrap();
        let bad = SweepInput {
            name: "bad".into(),
            current_raw: vec![1.0, 2.0],
            voltage_raw: vec![1.0],
            current_unit: "A".into(),
            voltage_unit: "V".into(),
        };
        let inputs = vec![bad, good];
        let results = analyze_batch(&inputs, &AnalysisConfig::default());
        let (reports, failures) = partition_results(&inputs, results);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].name, "good");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "bad");
        assert!(failures[0].error.starts_with("data shape error"));
    }
}
