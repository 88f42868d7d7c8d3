//! `ivfit` library crate.
//!
//! The binary (`ivfit`) is a thin wrapper around this library so that:
//!
//! - the analysis core is testable without spawning processes
//! - the pipeline can be driven from other front-ends (notebooks, daemons)
//! - code stays easy to navigate as the project grows

pub mod analysis;
pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod report;
