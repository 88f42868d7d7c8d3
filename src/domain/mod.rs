//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - configuration (`AnalysisConfig`, `DataOrder`)
//! - the per-sweep working record (`Sweep`) and its branches (`Segments`)
//! - stage outputs (`CriticalCurrents`, `ResistanceFit`, `ArrayAnalysis`, ...)
//! - the finished, exportable `SweepReport`

pub mod types;

pub use types::*;
