//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - reads sweep files
//! - runs the analysis pipeline over the batch
//! - prints reports and writes optional exports
//! - generates synthetic sweeps

use std::fs::File;
use std::io::{self, BufWriter};

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::cli::{AnalyzeArgs, Command, SimulateArgs};
use crate::data::{SweepSpec, generate_sweep};
use crate::domain::AnalysisConfig;
use crate::error::AppError;
use crate::io::{InputFormat, read_sweep_file, write_report_json, write_summary_csv, write_sweep_columns};

pub mod pipeline;

/// Entry point for the `ivfit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Analyze(args) => handle_analyze(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

/// Logs go to stderr so stdout stays parseable.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let config = config_from_args(&args);
    config.validate()?;
    let format = input_format_from_args(&args);

    let mut inputs = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let ingested = read_sweep_file(path, &format)?;
        for row in &ingested.row_errors {
            warn!(file = %path.display(), line = row.line, "skipped row: {}", row.message);
        }
        inputs.push(ingested.input);
    }

    let results = pipeline::analyze_batch(&inputs, &config);
    let (reports, failures) = pipeline::partition_results(&inputs, results);

    println!("{}", crate::report::format_summary_table(&reports, &failures));
    let summary = crate::report::summarize(&reports, failures.len());
    println!("{}", crate::report::format_batch_summary(&summary));

    if args.details {
        for report in &reports {
            println!();
            print!("{}", crate::report::format_sweep_details(report));
        }
    }

    // Optional exports.
    if let Some(path) = &args.export_csv {
        write_summary_csv(path, &reports)?;
    }
    if let Some(path) = &args.export_json {
        write_report_json(path, &reports, &failures, &config)?;
    }

    if reports.is_empty() {
        return Err(AppError::new(4, "No sweep could be analyzed."));
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let spec = sweep_spec_from_args(&args);
    let name = format!("sim_{}", args.kind.label().to_ascii_lowercase());
    let sweep = generate_sweep(&name, &spec)?;

    match &args.out {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))?;
            write_sweep_columns(BufWriter::new(file), &sweep, args.delimiter)
        }
        None => write_sweep_columns(io::stdout().lock(), &sweep, args.delimiter),
    }
}

pub fn config_from_args(args: &AnalyzeArgs) -> AnalysisConfig {
    AnalysisConfig {
        gap_voltage: args.gap_voltage,
        subgap_voltage: args.subgap_voltage,
        smoothing_width: args.smoothing,
        v_offset_threshold: args.offset_threshold,
        array_sigma: args.array_sigma,
        symmetric_offset: args.symmetric_offset,
        ic_estimates: [args.ic_plus, args.ic_minus],
        curve_type_override: args.curve_type,
    }
}

pub fn input_format_from_args(args: &AnalyzeArgs) -> InputFormat {
    InputFormat {
        order: args.order,
        current_unit: args.current_unit.clone(),
        voltage_unit: args.voltage_unit.clone(),
        delimiter: args.delimiter,
    }
}

pub fn sweep_spec_from_args(args: &SimulateArgs) -> SweepSpec {
    let base = SweepSpec::for_kind(args.kind);
    SweepSpec {
        points_per_quarter: args.points.unwrap_or(base.points_per_quarter),
        noise_std: args.noise,
        voltage_offset: args.offset,
        reverse: args.reverse,
        seed: args.seed,
        ..base
    }
}
