//! Stage methods on the per-sweep record.
//!
//! Each method fills one field of [`Sweep`]. Stages that depend on earlier
//! ones return [`IvError::MissingStage`] instead of recomputing silently.

use tracing::{debug, info};

use crate::domain::{
    AnalysisConfig, ArrayAnalysis, Branch, CriticalCurrents, CurveType, OffsetCorrection, ResistanceFit, Segments,
    SubgapResistance, Sweep, SweepInput, SweepReport,
};
use crate::error::{IvError, IvResult};

use super::array::analyze_array;
use super::classify::classify_curve;
use super::critical::extract_critical_currents;
use super::offset::{SymmetricOffset, VoltageOffset, estimate_symmetric_offset, estimate_voltage_offset, needs_sign_flip};
use super::resistance::{fit_resistance, subgap_resistance};
use super::segments::split_segments;
use super::units::normalize_units;

/// Voltage threshold for the two-branch offset (V).
const SYMMETRIC_V_THRESHOLD: f64 = 0.01e-3;

impl Sweep {
    /// Build a sweep from raw columns, converting to A and V.
    pub fn from_input(input: &SweepInput, config: &AnalysisConfig) -> IvResult<Self> {
        let (current, voltage) = normalize_units(
            &input.current_raw,
            &input.voltage_raw,
            &input.current_unit,
            &input.voltage_unit,
        )?;
        Ok(Self {
            name: input.name.clone(),
            current_raw: input.current_raw.clone(),
            voltage_raw: input.voltage_raw.clone(),
            current,
            voltage,
            gap_voltage: config.gap_voltage,
            subgap_voltage: config.subgap_voltage,
            offsets: OffsetCorrection::default(),
            curve_type: None,
            segments: None,
            critical: None,
            array: None,
            resistance: None,
            subgap: None,
        })
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Remove the low-current voltage offset.
    pub fn remove_voltage_offset(&mut self, threshold: f64) -> IvResult<VoltageOffset> {
        let offset = estimate_voltage_offset(&self.current, &self.voltage, threshold)?;
        if offset.offset != 0.0 {
            for v in &mut self.voltage {
                *v -= offset.offset;
            }
            self.invalidate_segments();
        }
        self.offsets.voltage_offset += offset.offset;
        self.offsets.voltage_noise = offset.noise;
        Ok(offset)
    }

    /// Negate the voltage if the sweep was recorded with reversed polarity.
    pub fn correct_voltage_sign(&mut self) -> bool {
        let flip = needs_sign_flip(&self.current, &self.voltage);
        if flip {
            debug!(sweep = %self.name, "voltage polarity reversed");
            for v in &mut self.voltage {
                *v = -*v;
            }
            self.offsets.voltage_sign_flipped = !self.offsets.voltage_sign_flipped;
            self.invalidate_segments();
        }
        flip
    }

    pub fn split(&mut self) -> IvResult<&Segments> {
        let segments = split_segments(&self.current, &self.voltage)?;
        Ok(self.segments.insert(segments))
    }

    /// Classify once; later calls keep the existing label.
    pub fn classify(&mut self) -> IvResult<CurveType> {
        if let Some(curve_type) = self.curve_type {
            return Ok(curve_type);
        }
        let classification = classify_curve(&self.current, &self.voltage, self.gap_voltage)?;
        self.curve_type = Some(classification.curve_type);
        Ok(classification.curve_type)
    }

    /// Explicit reclassification. Results derived from the old label are dropped.
    pub fn set_curve_type(&mut self, curve_type: CurveType) {
        if self.curve_type != Some(curve_type) {
            self.critical = None;
            self.array = None;
            self.resistance = None;
            self.subgap = None;
        }
        self.curve_type = Some(curve_type);
    }

    /// Two-branch offset removal; the sweep is re-segmented afterwards.
    ///
    /// Hysteretic sweeps compare their two return branches, other sweeps
    /// compare all samples.
    pub fn remove_symmetric_offset(&mut self) -> IvResult<SymmetricOffset> {
        let curve_type = self.require_curve_type()?;
        let segments = self.require_segments()?;

        let (current, voltage): (Vec<f64>, Vec<f64>) = if curve_type.is_hysteretic() {
            let plus = segments.get(Branch::DecreasingToZero);
            let minus = segments.get(Branch::IncreasingToZero);
            (
                plus.current.iter().chain(&minus.current).copied().collect(),
                plus.voltage.iter().chain(&minus.voltage).copied().collect(),
            )
        } else {
            (self.current.clone(), self.voltage.clone())
        };

        let offset = estimate_symmetric_offset(&current, &voltage, SYMMETRIC_V_THRESHOLD)?;
        for v in &mut self.voltage {
            *v -= offset.voltage_offset;
        }
        for i in &mut self.current {
            *i -= offset.current_offset;
        }
        self.offsets.symmetric_voltage_offset += offset.voltage_offset;
        self.offsets.current_offset += offset.current_offset;
        self.split()?;
        Ok(offset)
    }

    pub fn find_critical_currents(&mut self, smoothing_width: usize, hints: [Option<f64>; 2]) -> IvResult<CriticalCurrents> {
        let curve_type = self.require_curve_type()?;
        let segments = self.require_segments()?;
        let critical = extract_critical_currents(segments, curve_type, smoothing_width, hints);
        self.critical = Some(critical);
        Ok(critical)
    }

    pub fn analyze_array(&mut self, config: &AnalysisConfig) -> IvResult<&ArrayAnalysis> {
        let curve_type = self.require_curve_type()?;
        let segments = self.require_segments()?;
        let array = analyze_array(segments, curve_type, config)?;
        Ok(self.array.insert(array))
    }

    /// Normal-state resistance. JJo needs critical currents, JJa the array analysis.
    pub fn fit_resistance(&mut self) -> IvResult<ResistanceFit> {
        let curve_type = self.require_curve_type()?;
        let critical = match (curve_type, self.critical) {
            (CurveType::JJo, None) => return Err(IvError::MissingStage("critical-current extraction")),
            (_, critical) => critical.unwrap_or_default(),
        };
        let num_junctions = match (curve_type, &self.array) {
            (CurveType::JJa, None) => return Err(IvError::MissingStage("array analysis")),
            (_, Some(array)) => array.num_junctions,
            (_, None) => 1,
        };
        let fit = fit_resistance(
            &self.current,
            &self.voltage,
            curve_type,
            self.gap_voltage,
            &critical,
            num_junctions,
        );
        self.resistance = Some(fit);
        Ok(fit)
    }

    pub fn fit_subgap(&mut self) -> IvResult<SubgapResistance> {
        let curve_type = self.require_curve_type()?;
        let segments = self.require_segments()?;
        let subgap = subgap_resistance(segments, curve_type, self.subgap_voltage);
        self.subgap = Some(subgap);
        Ok(subgap)
    }

    /// Freeze the record into its terminal report.
    pub fn into_report(self) -> IvResult<SweepReport> {
        let curve_type = self.require_curve_type()?;
        let critical = self.critical.ok_or(IvError::MissingStage("critical-current extraction"))?;
        let resistance = self.resistance.ok_or(IvError::MissingStage("resistance fit"))?;
        let subgap = self.subgap.ok_or(IvError::MissingStage("subgap resistance"))?;
        let array = self.array.ok_or(IvError::MissingStage("array analysis"))?;

        let ic_r_product = ic_r_product(curve_type, &critical, &resistance, array.num_junctions);
        info!(
            sweep = %self.name,
            curve_type = %curve_type,
            ic_plus = critical.ic_plus,
            r_plus = resistance.r_plus,
            "sweep analyzed"
        );
        Ok(SweepReport {
            name: self.name,
            curve_type,
            n_points: self.current.len(),
            offsets: self.offsets,
            critical,
            resistance,
            subgap,
            array,
            ic_r_product,
        })
    }

    fn require_curve_type(&self) -> IvResult<CurveType> {
        self.curve_type.ok_or(IvError::MissingStage("classification"))
    }

    fn require_segments(&self) -> IvResult<&Segments> {
        self.segments.as_ref().ok_or(IvError::MissingStage("segmentation"))
    }

    fn invalidate_segments(&mut self) {
        self.segments = None;
    }
}

/// `Ic·R` per polarity: JJu uses `R+`, JJa the per-junction `R−/N`.
pub fn ic_r_product(curve_type: CurveType, critical: &CriticalCurrents, fit: &ResistanceFit, num_junctions: i64) -> [f64; 2] {
    match curve_type {
        CurveType::JJu => [critical.ic_plus * fit.r_plus, critical.ic_minus * fit.r_plus],
        CurveType::JJa if num_junctions > 0 => {
            let r = fit.r_minus / num_junctions as f64;
            [critical.ic_plus * r, critical.ic_minus * r]
        }
        _ => [0.0, 0.0],
    }
}
