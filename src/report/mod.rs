//! Reporting utilities: batch tallies and formatted terminal output.

use crate::domain::{CurveType, SweepReport};

pub mod format;

pub use format::*;

/// Batch outcome tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub analyzed: usize,
    pub failed: usize,
    /// Sweeps per regime, in `R, JJu, JJo, JJa` order.
    pub by_type: [usize; 4],
}

impl BatchSummary {
    pub fn count(&self, curve_type: CurveType) -> usize {
        self.by_type[type_slot(curve_type)]
    }
}

fn type_slot(curve_type: CurveType) -> usize {
    match curve_type {
        CurveType::R => 0,
        CurveType::JJu => 1,
        CurveType::JJo => 2,
        CurveType::JJa => 3,
    }
}

/// Tally successful reports and the number of failures.
pub fn summarize(reports: &[SweepReport], failed: usize) -> BatchSummary {
    let mut by_type = [0usize; 4];
    for r in reports {
        by_type[type_slot(r.curve_type)] += 1;
    }
    BatchSummary {
        total: reports.len() + failed,
        analyzed: reports.len(),
        failed,
        by_type,
    }
}
