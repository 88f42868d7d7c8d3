//! Formatted terminal output.
//!
//! We keep formatting code in one place so the analysis code stays free of
//! presentation concerns and output changes are localized.

use crate::domain::{CurveType, SweepFailure, SweepReport};

use super::BatchSummary;

const LARGE: [(&str, f64); 5] = [("", 1.0), ("k", 1e3), ("M", 1e6), ("G", 1e9), ("T", 1e12)];
const SMALL: [(&str, f64); 6] = [("", 1.0), ("m", 1e-3), ("u", 1e-6), ("n", 1e-9), ("p", 1e-12), ("f", 1e-15)];

/// SI prefix and multiplier that bring `value` into `[1, 1000)`.
///
/// Zero and values beyond the prefix table keep the nearest table entry.
pub fn si_prefix(value: f64) -> (&'static str, f64) {
    let mut magnitude = value.abs();
    if magnitude >= 1.0 || magnitude == 0.0 || !magnitude.is_finite() {
        for (prefix, multiplier) in LARGE {
            if magnitude < 1000.0 {
                return (prefix, multiplier);
            }
            magnitude /= 1000.0;
        }
        LARGE[LARGE.len() - 1]
    } else {
        for (prefix, multiplier) in SMALL {
            if magnitude >= 1.0 {
                return (prefix, multiplier);
            }
            magnitude *= 1000.0;
        }
        SMALL[SMALL.len() - 1]
    }
}

/// `value` with an SI prefix, e.g. `10.00 uA`.
pub fn format_si(value: f64, unit: &str) -> String {
    let (prefix, multiplier) = si_prefix(value);
    format!("{:.2} {prefix}{unit}", value / multiplier)
}

/// Format the per-sweep summary table plus failures.
pub fn format_summary_table(reports: &[SweepReport], failures: &[SweepFailure]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<24} {:<4} {:>22} {:>20} {:>20} {:>20} {:>4}\n",
            "sweep", "type", "Ic+, Ic-", "R+, R- (Ohm)", "IcR+, IcR-", "Rsg+, Rsg- (Ohm)", "N"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<24} {:-<4} {:-<22} {:-<20} {:-<20} {:-<20} {:-<4}\n",
            "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for r in reports {
        let ic = format!(
            "{}, {}",
            format_si(r.critical.ic_plus, "A"),
            format_si(r.critical.ic_minus, "A")
        );
        let resistance = format!("{:.2}, {:.2}", r.resistance.r_plus, r.resistance.r_minus);
        let ic_r = format!(
            "{}, {}",
            format_si(r.ic_r_product[0], "V"),
            format_si(r.ic_r_product[1], "V")
        );
        let rsg = if r.curve_type == CurveType::JJu {
            format!("{:.1}, {:.1}", r.subgap.plus.resistance, r.subgap.minus.resistance)
        } else {
            "-".to_string()
        };
        out.push_str(
            format!(
                "{:<24} {:<4} {:>22} {:>20} {:>20} {:>20} {:>4}\n",
                truncate(&r.name, 24),
                r.curve_type.label(),
                ic,
                resistance,
                ic_r,
                rsg,
                r.array.num_junctions,
            )
            .trim_end(),
        );
        out.push('\n');
    }

    if !failures.is_empty() {
        out.push_str("\nFailed sweeps:\n");
        for f in failures {
            out.push_str(&format!("- {}: {}\n", f.name, f.error));
        }
    }
    out
}

/// One-line batch overview.
pub fn format_batch_summary(summary: &BatchSummary) -> String {
    format!(
        "Analyzed {}/{} sweeps (R={} JJu={} JJo={} JJa={}, failed={})",
        summary.analyzed,
        summary.total,
        summary.count(CurveType::R),
        summary.count(CurveType::JJu),
        summary.count(CurveType::JJo),
        summary.count(CurveType::JJa),
        summary.failed,
    )
}

/// Detailed block for one sweep: offsets, fit windows, array levels.
pub fn format_sweep_details(r: &SweepReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {} ({}) ===\n", r.name, r.curve_type));
    out.push_str(&format!(
        "Offsets: V={} (noise {}) | symmetric V={} I={}{}\n",
        format_si(r.offsets.voltage_offset, "V"),
        format_si(r.offsets.voltage_noise, "V"),
        format_si(r.offsets.symmetric_voltage_offset, "V"),
        format_si(r.offsets.current_offset, "A"),
        if r.offsets.voltage_sign_flipped { " | voltage sign flipped" } else { "" },
    ));
    out.push_str(&format!(
        "Intercepts: {}, {}\n",
        format_si(r.resistance.v_intercept_plus, "V"),
        format_si(r.resistance.v_intercept_minus, "V"),
    ));
    if r.curve_type == CurveType::JJu {
        out.push_str(&format!(
            "Rsg brackets: [{}, {}] / [{}, {}]\n",
            format_si(r.subgap.plus.v_low, "V"),
            format_si(r.subgap.plus.v_high, "V"),
            format_si(r.subgap.minus.v_low, "V"),
            format_si(r.subgap.minus.v_high, "V"),
        ));
    }
    if r.curve_type == CurveType::JJa {
        out.push_str(&format!(
            "Array: N={} | Vg_opt={} | Vg_est={}\n",
            r.array.num_junctions,
            format_si(r.array.gap_voltage_optimal, "V"),
            format_si(r.array.gap_voltage_estimate, "V"),
        ));
        for (ic, count) in r.array.ic_levels.iter().zip(&r.array.junction_counts_per_level) {
            out.push_str(&format!("  {:>12} x{count}\n", format_si(*ic, "A")));
        }
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArrayAnalysis, CriticalCurrents, OffsetCorrection, ResistanceFit, SubgapResistance};

    #[test]
    fn si_prefix_picks_engineering_range() {
        assert_eq!(si_prefix(1.23e-6), ("u", 1e-6));
        assert_eq!(si_prefix(2.8e-3), ("m", 1e-3));
        assert_eq!(si_prefix(-4.5e4), ("k", 1e3));
        assert_eq!(si_prefix(0.0), ("", 1.0));
        assert_eq!(si_prefix(12.0), ("", 1.0));
        assert_eq!(format_si(10e-6, "A"), "10.00 uA");
    }

    #[test]
    fn table_lists_every_sweep_and_failure() {
        let report = SweepReport {
            name: "a_very_long_sweep_name_that_overflows".into(),
            curve_type: CurveType::JJo,
            n_points: 10,
            offsets: OffsetCorrection::default(),
            critical: CriticalCurrents {
                ic_plus: 10e-6,
                ic_minus: -10e-6,
                ..CriticalCurrents::default()
            },
            resistance: ResistanceFit {
                r_plus: 50.0,
                r_minus: 50.0,
                ..ResistanceFit::default()
            },
            subgap: SubgapResistance::default(),
            array: ArrayAnalysis {
                num_junctions: 1,
                ..ArrayAnalysis::default()
            },
            ic_r_product: [0.0, 0.0],
        };
        let failures = vec![SweepFailure {
            name: "broken".into(),
            error: "data shape error: x".into(),
        }];
        let text = format_summary_table(&[report], &failures);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("sweep"));
        assert!(lines[2].starts_with("a_very_long_sweep_name_."));
        assert!(lines[2].contains("10.00 uA, -10.00 uA"));
        assert!(text.contains("- broken: data shape error: x"));
    }
}
