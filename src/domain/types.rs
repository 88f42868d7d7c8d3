//! Shared domain types.
//!
//! These types are kept plain and serializable so they can be:
//!
//! - filled in stage by stage while a sweep moves through the pipeline
//! - exported to JSON/CSV once a sweep is finished
//! - consumed by external plotting or table layers without touching the core

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IvError;

/// Default junction gap voltage (V).
pub const DEFAULT_GAP_VOLTAGE: f64 = 2.8e-3;
/// Default subgap evaluation voltage (V).
pub const DEFAULT_SUBGAP_VOLTAGE: f64 = 2.0e-3;
/// Default threshold below which a computed voltage offset is ignored (V).
pub const DEFAULT_V_OFFSET_THRESHOLD: f64 = 0.2e-4;
/// Default relative search half-width for the array gap-voltage optimization.
pub const DEFAULT_ARRAY_SIGMA: f64 = 0.02;

/// Electrical regime of a sweep.
///
/// Labels parse case-insensitively (`jju`, `JJu`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveType {
    /// Ohmic (plain resistor).
    #[serde(rename = "R")]
    R,
    /// Hysteretic (underdamped) single junction.
    #[serde(rename = "JJu")]
    JJu,
    /// Overdamped single junction.
    #[serde(rename = "JJo")]
    JJo,
    /// Hysteretic series array.
    #[serde(rename = "JJa")]
    JJa,
}

impl CurveType {
    pub fn label(self) -> &'static str {
        match self {
            CurveType::R => "R",
            CurveType::JJu => "JJu",
            CurveType::JJo => "JJo",
            CurveType::JJa => "JJa",
        }
    }

    /// JJu and JJa sweeps have retrapping branches that carry no critical-current corner.
    pub fn is_hysteretic(self) -> bool {
        matches!(self, CurveType::JJu | CurveType::JJa)
    }
}

impl fmt::Display for CurveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CurveType {
    type Err = IvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r" => Ok(CurveType::R),
            "jju" => Ok(CurveType::JJu),
            "jjo" => Ok(CurveType::JJo),
            "jja" => Ok(CurveType::JJa),
            other => Err(IvError::Configuration(format!(
                "unknown curve type '{other}' (expected R, JJu, JJo or JJa)"
            ))),
        }
    }
}

/// Column order of a two-column data file, labelled `IV` or `VI`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataOrder {
    /// Current first, voltage second.
    #[serde(rename = "IV")]
    Iv,
    /// Voltage first, current second.
    #[serde(rename = "VI")]
    Vi,
}

impl FromStr for DataOrder {
    type Err = IvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IV" => Ok(DataOrder::Iv),
            "VI" => Ok(DataOrder::Vi),
            other => Err(IvError::Configuration(format!(
                "data order must be 'IV' or 'VI', got '{other}'"
            ))),
        }
    }
}

/// The four monotonic branches of a full bidirectional sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    /// Zero up to the positive extremum.
    Increasing,
    /// Positive extremum back down to zero.
    DecreasingToZero,
    /// Zero down to the negative extremum.
    Decreasing,
    /// Negative extremum back up to zero.
    IncreasingToZero,
}

impl Branch {
    pub const ALL: [Branch; 4] = [
        Branch::Increasing,
        Branch::DecreasingToZero,
        Branch::Decreasing,
        Branch::IncreasingToZero,
    ];

    pub fn index(self) -> usize {
        match self {
            Branch::Increasing => 0,
            Branch::DecreasingToZero => 1,
            Branch::Decreasing => 2,
            Branch::IncreasingToZero => 3,
        }
    }

    /// Branches 0/1 carry positive current, 2/3 negative current.
    pub fn is_positive(self) -> bool {
        matches!(self, Branch::Increasing | Branch::DecreasingToZero)
    }

    /// Branches walking from an extremum back towards zero current.
    pub fn is_return(self) -> bool {
        matches!(self, Branch::DecreasingToZero | Branch::IncreasingToZero)
    }
}

/// One monotonic branch: a closed index range of the sweep plus its samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// First sweep index covered (inclusive).
    pub start: usize,
    /// Last sweep index covered (inclusive).
    pub end: usize,
    pub current: Vec<f64>,
    pub voltage: Vec<f64>,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

/// The four branches of a sweep, in `Branch::ALL` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segments {
    pub branches: [Segment; 4],
}

impl Segments {
    pub fn get(&self, branch: Branch) -> &Segment {
        &self.branches[branch.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Branch, &Segment)> {
        Branch::ALL.into_iter().zip(self.branches.iter())
    }
}

/// Offsets removed from the analysis arrays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OffsetCorrection {
    /// Offset removed by the low-current voltage estimate (V).
    pub voltage_offset: f64,
    /// Residual noise estimate of the low-current set: 3σ (V).
    pub voltage_noise: f64,
    /// Additional voltage offset removed by the two-branch estimate (V).
    pub symmetric_voltage_offset: f64,
    /// Current offset removed by the two-branch estimate (A).
    pub current_offset: f64,
    /// Whether the voltage sign was flipped to keep resistances positive.
    pub voltage_sign_flipped: bool,
}

/// Corner found on one branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchCorner {
    /// Current at the corner (A).
    pub current: f64,
    /// Corner angle (rad, in [−π, π)).
    pub phi: f64,
}

/// Critical-current extraction result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticalCurrents {
    pub ic_plus: f64,
    pub ic_minus: f64,
    /// Per-branch candidates in `Branch::ALL` order.
    pub branches: [BranchCorner; 4],
}

/// Normal-state resistance fit per polarity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResistanceFit {
    pub r_plus: f64,
    pub r_minus: f64,
    pub v_intercept_plus: f64,
    pub v_intercept_minus: f64,
}

/// Subgap resistance at one polarity and the bracket voltages used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubgapPoint {
    pub resistance: f64,
    pub v_low: f64,
    pub v_high: f64,
}

/// Subgap resistance result (JJu only; zeros otherwise).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubgapResistance {
    pub plus: SubgapPoint,
    pub minus: SubgapPoint,
}

/// Series-array analysis result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayAnalysis {
    pub num_junctions: i64,
    pub gap_voltage_optimal: f64,
    /// Currents at which each voltage step occurs (A).
    pub ic_levels: Vec<f64>,
    /// Junctions switching at each level.
    pub junction_counts_per_level: Vec<i64>,
    /// Single-junction gap estimate from the retrapping branch (0 when unavailable).
    pub gap_voltage_estimate: f64,
}

/// Scalar analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Junction gap voltage V_g (V).
    pub gap_voltage: f64,
    /// Subgap evaluation voltage V_sg (V), below V_g.
    pub subgap_voltage: f64,
    /// Moving-average width applied before corner detection (1 disables smoothing).
    pub smoothing_width: usize,
    /// Low-current voltage offsets smaller than this are ignored (V).
    pub v_offset_threshold: f64,
    /// Relative half-width of the array gap-voltage search.
    pub array_sigma: f64,
    /// Also run the two-branch offset removal on JJu/JJa sweeps.
    pub symmetric_offset: bool,
    /// Optional critical-current hints `[positive, negative]` (A).
    pub ic_estimates: [Option<f64>; 2],
    /// Skip classification and force this regime.
    pub curve_type_override: Option<CurveType>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            gap_voltage: DEFAULT_GAP_VOLTAGE,
            subgap_voltage: DEFAULT_SUBGAP_VOLTAGE,
            smoothing_width: 1,
            v_offset_threshold: DEFAULT_V_OFFSET_THRESHOLD,
            array_sigma: DEFAULT_ARRAY_SIGMA,
            symmetric_offset: false,
            ic_estimates: [None, None],
            curve_type_override: None,
        }
    }
}

impl AnalysisConfig {
    /// Reject malformed scalars before any sweep is touched.
    pub fn validate(&self) -> Result<(), IvError> {
        if !(self.gap_voltage.is_finite() && self.gap_voltage > 0.0) {
            return Err(IvError::Configuration(format!(
                "gap voltage must be finite and > 0, got {}",
                self.gap_voltage
            )));
        }
        if !(self.subgap_voltage.is_finite()
            && self.subgap_voltage > 0.0
            && self.subgap_voltage < self.gap_voltage)
        {
            return Err(IvError::Configuration(format!(
                "subgap voltage must lie in (0, V_g={}), got {}",
                self.gap_voltage, self.subgap_voltage
            )));
        }
        if self.smoothing_width < 1 {
            return Err(IvError::Configuration("smoothing width must be >= 1".into()));
        }
        if !(self.v_offset_threshold.is_finite() && self.v_offset_threshold >= 0.0) {
            return Err(IvError::Configuration(format!(
                "offset threshold must be finite and >= 0, got {}",
                self.v_offset_threshold
            )));
        }
        if !(self.array_sigma.is_finite() && self.array_sigma > 0.0 && self.array_sigma < 1.0) {
            return Err(IvError::Configuration(format!(
                "array sigma must lie in (0, 1), got {}",
                self.array_sigma
            )));
        }
        if self.ic_estimates.iter().flatten().any(|v| !v.is_finite()) {
            return Err(IvError::Configuration("critical-current hints must be finite".into()));
        }
        Ok(())
    }
}

/// Raw sweep as handed over by an ingest layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepInput {
    pub name: String,
    pub current_raw: Vec<f64>,
    pub voltage_raw: Vec<f64>,
    /// Unit label of the current column (e.g. "uA").
    pub current_unit: String,
    /// Unit label of the voltage column (e.g. "mV").
    pub voltage_unit: String,
}

/// Per-sweep working record.
///
/// Created from raw data, then each pipeline stage fills in its own field.
/// A `None` field means the stage has not run (yet).
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    pub name: String,
    pub current_raw: Vec<f64>,
    pub voltage_raw: Vec<f64>,
    /// Analysis current (A) after unit conversion and offset removal.
    pub current: Vec<f64>,
    /// Analysis voltage (V) after unit conversion and offset removal.
    pub voltage: Vec<f64>,
    pub gap_voltage: f64,
    pub subgap_voltage: f64,
    pub offsets: OffsetCorrection,
    pub curve_type: Option<CurveType>,
    pub segments: Option<Segments>,
    pub critical: Option<CriticalCurrents>,
    pub array: Option<ArrayAnalysis>,
    pub resistance: Option<ResistanceFit>,
    pub subgap: Option<SubgapResistance>,
}

/// Terminal, read-only result of one sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub name: String,
    pub curve_type: CurveType,
    pub n_points: usize,
    pub offsets: OffsetCorrection,
    pub critical: CriticalCurrents,
    pub resistance: ResistanceFit,
    pub subgap: SubgapResistance,
    pub array: ArrayAnalysis,
    /// Ic·R products `[plus, minus]` (V); zero where not meaningful.
    pub ic_r_product: [f64; 2],
}

/// Portable JSON representation of an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub config: AnalysisConfig,
    pub sweeps: Vec<SweepReport>,
    /// Sweeps that failed, with the error message.
    pub failures: Vec<SweepFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub name: String,
    pub error: String,
}
