//! Mathematical utilities: least squares, robust statistics, bounded minimization.

pub mod minimize;
pub mod ols;
pub mod stats;

pub use minimize::*;
pub use ols::*;
pub use stats::*;
