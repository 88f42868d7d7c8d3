//! Input/output helpers.
//!
//! - two-column data ingest (`ingest`)
//! - result exports, summary CSV and report JSON (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
