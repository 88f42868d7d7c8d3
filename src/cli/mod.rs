//! Command-line parsing for the I–V sweep analyzer.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the analysis code.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{ArgAction, Parser, Subcommand};

use crate::domain::{
    CurveType, DEFAULT_ARRAY_SIGMA, DEFAULT_GAP_VOLTAGE, DEFAULT_SUBGAP_VOLTAGE, DEFAULT_V_OFFSET_THRESHOLD,
    DataOrder,
};
use crate::io::Delimiter;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "ivfit", version, about = "I–V sweep analysis for superconducting tunnel junctions")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyze one or more two-column sweep files and print a summary table.
    Analyze(AnalyzeArgs),
    /// Write a synthetic sweep of the given regime.
    Simulate(SimulateArgs),
}

/// Options for analyzing sweep files.
#[derive(Debug, Parser, Clone)]
pub struct AnalyzeArgs {
    /// Sweep data files (one sweep per file).
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Column order of the data files (IV or VI).
    #[arg(long, default_value = "IV", value_parser = DataOrder::from_str)]
    pub order: DataOrder,

    /// Unit label of the current column (e.g. A, mA, uA).
    #[arg(long, default_value = "A")]
    pub current_unit: String,

    /// Unit label of the voltage column (e.g. V, mV, uV).
    #[arg(long, default_value = "V")]
    pub voltage_unit: String,

    /// Field separator.
    #[arg(long, value_enum, default_value_t = Delimiter::Comma)]
    pub delimiter: Delimiter,

    /// Junction gap voltage (V).
    #[arg(long, default_value_t = DEFAULT_GAP_VOLTAGE)]
    pub gap_voltage: f64,

    /// Voltage at which the subgap resistance is evaluated (V).
    #[arg(long, default_value_t = DEFAULT_SUBGAP_VOLTAGE)]
    pub subgap_voltage: f64,

    /// Moving-average width applied before corner detection (1 = off).
    #[arg(long, default_value_t = 1)]
    pub smoothing: usize,

    /// Ignore low-current voltage offsets smaller than this (V).
    #[arg(long, default_value_t = DEFAULT_V_OFFSET_THRESHOLD)]
    pub offset_threshold: f64,

    /// Relative search half-width for the array gap voltage.
    #[arg(long, default_value_t = DEFAULT_ARRAY_SIGMA)]
    pub array_sigma: f64,

    /// Also remove the two-branch voltage/current offset on hysteretic sweeps.
    #[arg(long)]
    pub symmetric_offset: bool,

    /// Expected positive critical current (A); narrows the corner search.
    #[arg(long, allow_hyphen_values = true)]
    pub ic_plus: Option<f64>,

    /// Expected negative critical current (A); narrows the corner search.
    #[arg(long, allow_hyphen_values = true)]
    pub ic_minus: Option<f64>,

    /// Skip classification and treat every sweep as this regime (R, JJu, JJo, JJa).
    #[arg(long, value_parser = CurveType::from_str)]
    pub curve_type: Option<CurveType>,

    /// Print offsets, fit intercepts and array levels per sweep.
    #[arg(long)]
    pub details: bool,

    /// Export the per-sweep summary to CSV.
    #[arg(long = "export-csv")]
    pub export_csv: Option<PathBuf>,

    /// Export the full report to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}

/// Options for generating a synthetic sweep.
#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Regime to simulate (R, JJu, JJo, JJa).
    #[arg(long, value_parser = CurveType::from_str)]
    pub kind: CurveType,

    /// Random seed for the voltage noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Gaussian voltage noise (V, standard deviation).
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Constant voltage offset (V).
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub offset: f64,

    /// Samples per quarter sweep (defaults depend on the regime).
    #[arg(long)]
    pub points: Option<usize>,

    /// Sweep towards negative current first.
    #[arg(long)]
    pub reverse: bool,

    /// Field separator of the written data.
    #[arg(long, value_enum, default_value_t = Delimiter::Comma)]
    pub delimiter: Delimiter,

    /// Output file (stdout when omitted).
    #[arg(long)]
    pub out: Option<PathBuf>,
}
