//! Two-column sweep ingest.
//!
//! Measurement files are plain delimited text: a few lines of instrument
//! header, then one `(current, voltage)` or `(voltage, current)` pair per line.
//!
//! - Leading rows that do not parse as two numbers are skipped as header.
//! - After the first numeric row, bad rows are reported as row errors and
//!   skipped; they never abort the file.
//! - Units are not applied here; the unit labels travel with the sweep.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use clap::ValueEnum;
use csv::StringRecord;
use serde::{Deserialize, Serialize};

use crate::domain::{DataOrder, SweepInput};
use crate::error::AppError;

/// Field separator of a data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    Comma,
    Tab,
    /// One or more spaces.
    Space,
    Semicolon,
}

impl Delimiter {
    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Tab => b'\t',
            Delimiter::Space => b' ',
            Delimiter::Semicolon => b';',
        }
    }
}

/// How to read a data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputFormat {
    pub order: DataOrder,
    pub current_unit: String,
    pub voltage_unit: String,
    pub delimiter: Delimiter,
}

impl Default for InputFormat {
    fn default() -> Self {
        Self {
            order: DataOrder::Iv,
            current_unit: "A".to_string(),
            voltage_unit: "V".to_string(),
            delimiter: Delimiter::Comma,
        }
    }
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the raw sweep plus bookkeeping.
#[derive(Debug, Clone)]
pub struct IngestedSweep {
    pub input: SweepInput,
    pub header_rows: usize,
    pub row_errors: Vec<RowError>,
}

/// Load one sweep file. The sweep is named after the file stem.
pub fn read_sweep_file(path: &Path, format: &InputFormat) -> Result<IngestedSweep, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open data file '{}': {e}", path.display())))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_sweep(&name, file, format)
}

/// Parse sweep data from any reader.
pub fn parse_sweep<R: Read>(name: &str, reader: R, format: &InputFormat) -> Result<IngestedSweep, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(format.delimiter.as_byte())
        .from_reader(reader);

    let mut current_raw = Vec::new();
    let mut voltage_raw = Vec::new();
    let mut row_errors = Vec::new();
    let mut header_rows = 0usize;
    let mut in_data = false;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 1;
        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| parse_pair(&record));

        match parsed {
            Ok((first, second)) => {
                in_data = true;
                let (i, v) = match format.order {
                    DataOrder::Iv => (first, second),
                    DataOrder::Vi => (second, first),
                };
                current_raw.push(i);
                voltage_raw.push(v);
            }
            Err(_) if !in_data => header_rows += 1,
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if current_raw.is_empty() {
        return Err(AppError::new(
            3,
            format!("No numeric (current, voltage) rows found in '{name}'."),
        ));
    }

    Ok(IngestedSweep {
        input: SweepInput {
            name: name.to_string(),
            current_raw,
            voltage_raw,
            current_unit: format.current_unit.clone(),
            voltage_unit: format.voltage_unit.clone(),
        },
        header_rows,
        row_errors,
    })
}

/// First two non-empty fields as finite numbers.
///
/// Empty fields are dropped so runs of spaces behave as one separator.
fn parse_pair(record: &StringRecord) -> Result<(f64, f64), String> {
    let mut fields = record.iter().filter(|f| !f.is_empty());
    let (Some(a), Some(b)) = (fields.next(), fields.next()) else {
        return Err(format!("expected 2 columns, found {}", record.iter().filter(|f| !f.is_empty()).count()));
    };
    let a = parse_number(a)?;
    let b = parse_number(b)?;
    Ok((a, b))
}

fn parse_number(field: &str) -> Result<f64, String> {
    let value: f64 = field
        .parse()
        .map_err(|_| format!("'{field}' is not a number"))?;
    if !value.is_finite() {
        return Err(format!("'{field}' is not finite"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn header_lines_are_skipped_and_order_applied() {
        let text = "Keithley 2400\nI(uA),V(mV)\n1,0.5\n2,1.0\n-1,-0.5\n";
        let format = InputFormat {
            current_unit: "uA".into(),
            voltage_unit: "mV".into(),
            ..InputFormat::default()
        };
        let sweep = parse_sweep("s", text.as_bytes(), &format).unwrap();
        assert_eq!(sweep.header_rows, 2);
        assert!(sweep.row_errors.is_empty());
        assert_eq!(sweep.input.current_raw, vec![1.0, 2.0, -1.0]);
        assert_eq!(sweep.input.voltage_raw, vec![0.5, 1.0, -0.5]);
        assert_eq!(sweep.input.current_unit, "uA");

        let vi = InputFormat {
            order: DataOrder::Vi,
            ..InputFormat::default()
        };
        let swapped = parse_sweep("s", text.as_bytes(), &vi).unwrap();
        assert_eq!(swapped.input.current_raw, vec![0.5, 1.0, -0.5]);
    }

    #[test]
    fn bad_rows_after_data_are_reported() {
        let text = "1,2\noops,3\n4\n5,6\n";
        let sweep = parse_sweep("s", text.as_bytes(), &InputFormat::default()).unwrap();
        assert_eq!(sweep.input.current_raw, vec![1.0, 5.0]);
        let lines: Vec<usize> = sweep.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![2, 3]);
    }

    #[test]
    fn space_runs_act_as_one_separator() {
        let text = "  1.0e-6    2.0e-3\n2.0e-6 4.0e-3\n";
        let format = InputFormat {
            delimiter: Delimiter::Space,
            ..InputFormat::default()
        };
        let sweep = parse_sweep("s", text.as_bytes(), &format).unwrap();
        assert_eq!(sweep.input.current_raw, vec![1.0e-6, 2.0e-6]);
        assert_eq!(sweep.input.voltage_raw, vec![2.0e-3, 4.0e-3]);
    }

    #[test]
    fn file_without_numbers_is_rejected() {
        let err = parse_sweep("s", "a,b\nc,d\n".as_bytes(), &InputFormat::default()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn reads_from_disk_and_names_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jj_42.txt");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "0\t0\n1\t2").unwrap();
        drop(f);

        let format = InputFormat {
            delimiter: Delimiter::Tab,
            ..InputFormat::default()
        };
        let sweep = read_sweep_file(&path, &format).unwrap();
        assert_eq!(sweep.input.name, "jj_42");
        assert_eq!(sweep.input.voltage_raw, vec![0.0, 2.0]);
    }
}
