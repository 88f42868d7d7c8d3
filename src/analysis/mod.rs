//! Curve-analysis engine.
//!
//! One file per stage, leaves first:
//!
//! - `units`: raw columns to A and V
//! - `offset`: low-current and two-branch offset removal
//! - `segments`: four monotonic branches
//! - `classify`: Ohmic vs. junction regimes
//! - `critical`: corner-angle critical currents
//! - `resistance`: normal-state and subgap resistance
//! - `array`: junction count for series arrays
//!
//! The stage functions are free functions over slices; `sweep` wires them
//! onto the [`crate::domain::Sweep`] record.

pub mod array;
pub mod classify;
pub mod critical;
pub mod offset;
pub mod resistance;
pub mod segments;
pub mod sweep;
pub mod units;

pub use array::{analyze_array, estimate_gap_voltage, find_step_window, optimize_gap_voltage};
pub use classify::{Classification, classify_curve, hysteresis_magnitude};
pub use critical::{branch_corner, corner_angles, corner_index, extract_critical_currents};
pub use offset::{SymmetricOffset, VoltageOffset, estimate_symmetric_offset, estimate_voltage_offset, needs_sign_flip};
pub use resistance::{fit_resistance, subgap_resistance};
pub use segments::split_segments;
pub use sweep::ic_r_product;
pub use units::{normalize_units, unit_multiplier};
