//! Export analysis results.
//!
//! - summary CSV: one row per sweep, easy to consume in spreadsheets
//! - report JSON: the full `SweepReport`s plus run metadata
//! - raw sweep columns, in the same two-column layout ingest reads

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;

use crate::domain::{AnalysisConfig, ReportFile, SweepFailure, SweepInput, SweepReport};
use crate::error::AppError;

use super::ingest::Delimiter;

/// Flat CSV row for one sweep.
#[derive(Debug, Clone, Serialize)]
struct SummaryRow<'a> {
    name: &'a str,
    curve_type: &'static str,
    n_points: usize,
    ic_plus: f64,
    ic_minus: f64,
    r_plus: f64,
    r_minus: f64,
    v_intercept_plus: f64,
    v_intercept_minus: f64,
    ic_r_plus: f64,
    ic_r_minus: f64,
    rsg_plus: f64,
    rsg_minus: f64,
    num_junctions: i64,
    gap_voltage_optimal: f64,
    voltage_offset: f64,
    current_offset: f64,
}

impl<'a> From<&'a SweepReport> for SummaryRow<'a> {
    fn from(r: &'a SweepReport) -> Self {
        Self {
            name: &r.name,
            curve_type: r.curve_type.label(),
            n_points: r.n_points,
            ic_plus: r.critical.ic_plus,
            ic_minus: r.critical.ic_minus,
            r_plus: r.resistance.r_plus,
            r_minus: r.resistance.r_minus,
            v_intercept_plus: r.resistance.v_intercept_plus,
            v_intercept_minus: r.resistance.v_intercept_minus,
            ic_r_plus: r.ic_r_product[0],
            ic_r_minus: r.ic_r_product[1],
            rsg_plus: r.subgap.plus.resistance,
            rsg_minus: r.subgap.minus.resistance,
            num_junctions: r.array.num_junctions,
            gap_voltage_optimal: r.array.gap_voltage_optimal,
            voltage_offset: r.offsets.voltage_offset + r.offsets.symmetric_voltage_offset,
            current_offset: r.offsets.current_offset,
        }
    }
}

/// Write the per-sweep summary CSV.
pub fn write_summary_csv(path: &Path, reports: &[SweepReport]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    for report in reports {
        writer
            .serialize(SummaryRow::from(report))
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

/// Write the JSON report.
pub fn write_report_json(
    path: &Path,
    reports: &[SweepReport],
    failures: &[SweepFailure],
    config: &AnalysisConfig,
) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create report JSON '{}': {e}", path.display())))?;

    let report = ReportFile {
        tool: "ivfit".to_string(),
        generated_at: Utc::now(),
        config: config.clone(),
        sweeps: reports.to_vec(),
        failures: failures.to_vec(),
    };

    serde_json::to_writer_pretty(file, &report)
        .map_err(|e| AppError::new(2, format!("Failed to write report JSON: {e}")))?;
    Ok(())
}

/// Read a JSON report written by [`write_report_json`].
pub fn read_report_json(path: &Path) -> Result<ReportFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open report JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid report JSON: {e}")))
}

/// Write a sweep as `current, voltage` rows under a one-line header.
pub fn write_sweep_columns<W: Write>(writer: W, sweep: &SweepInput, delimiter: Delimiter) -> Result<(), AppError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter.as_byte())
        .from_writer(writer);
    let header = [
        format!("I({})", sweep.current_unit),
        format!("V({})", sweep.voltage_unit),
    ];
    writer
        .write_record(&header)
        .map_err(|e| AppError::new(2, format!("Failed to write sweep header: {e}")))?;
    for (i, v) in sweep.current_raw.iter().zip(&sweep.voltage_raw) {
        writer
            .write_record([i.to_string(), v.to_string()])
            .map_err(|e| AppError::new(2, format!("Failed to write sweep row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush sweep data: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ArrayAnalysis, CriticalCurrents, CurveType, OffsetCorrection, ResistanceFit, SubgapResistance,
    };

    fn report(name: &str) -> SweepReport {
        SweepReport {
            name: name.to_string(),
            curve_type: CurveType::JJu,
            n_points: 400,
            offsets: OffsetCorrection::default(),
            critical: CriticalCurrents {
                ic_plus: 1e-4,
                ic_minus: -1e-4,
                ..CriticalCurrents::default()
            },
            resistance: ResistanceFit {
                r_plus: 20.0,
                r_minus: 20.5,
                ..ResistanceFit::default()
            },
            subgap: SubgapResistance::default(),
            array: ArrayAnalysis {
                num_junctions: 1,
                gap_voltage_optimal: 2.8e-3,
                ..ArrayAnalysis::default()
            },
            ic_r_product: [2e-3, -2e-3],
        }
    }

    #[test]
    fn summary_csv_has_header_and_one_row_per_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        write_summary_csv(&path, &[report("a"), report("b")]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("name,curve_type,n_points,ic_plus"));
        assert!(lines[1].starts_with("a,JJu,400,"));
    }

    #[test]
    fn sweep_columns_parse_back() {
        let sweep = SweepInput {
            name: "s".into(),
            current_raw: vec![0.0, 1e-6, -2.5e-6],
            voltage_raw: vec![0.0, 2e-3, -5e-3],
            current_unit: "A".into(),
            voltage_unit: "V".into(),
        };
        let mut buf = Vec::new();
        write_sweep_columns(&mut buf, &sweep, Delimiter::Tab).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("I(A)\tV(V)\n"));

        let format = crate::io::InputFormat {
            delimiter: Delimiter::Tab,
            ..crate::io::InputFormat::default()
        };
        let back = crate::io::parse_sweep("s", buf.as_slice(), &format).unwrap();
        assert_eq!(back.header_rows, 1);
        assert_eq!(back.input, sweep);
    }

    #[test]
    fn json_report_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let failures = vec![SweepFailure {
            name: "bad".into(),
            error: "data shape error: sweep has no samples".into(),
        }];
        write_report_json(&path, &[report("a")], &failures, &AnalysisConfig::default()).unwrap();

        let back = read_report_json(&path).unwrap();
        assert_eq!(back.tool, "ivfit");
        assert_eq!(back.sweeps, vec![report("a")]);
        assert_eq!(back.failures, failures);
        assert_eq!(back.config, AnalysisConfig::default());
    }
}
