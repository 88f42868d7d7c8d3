//! Bounded scalar minimization.
//!
//! The array analysis minimizes a piecewise-linear, non-smooth objective (sum of
//! fractional-step residuals) over a narrow interval. Gradient methods stall on
//! the kinks, so we use:
//!
//! 1. a deterministic grid scan over `[lo, hi]` (evaluated in parallel), then
//! 2. golden-section refinement inside the bracket around the best grid point.
//!
//! Both stages have fixed caps, so the search always terminates.

use rayon::prelude::*;

use crate::error::{IvError, IvResult};

/// Grid points used by the coarse scan.
pub const DEFAULT_GRID_STEPS: usize = 401;
/// Golden-section iteration cap.
const MAX_REFINE_ITERS: usize = 200;

const INV_PHI: f64 = 0.618_033_988_749_894_9;

/// Outcome of a bounded scalar minimization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarMinimum {
    pub x: f64,
    pub value: f64,
}

/// Generate `steps` evenly spaced points between `min` and `max` (inclusive).
pub fn lin_space(min: f64, max: f64, steps: usize) -> IvResult<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && max > min) {
        return Err(IvError::Configuration(format!(
            "invalid search interval: [{min}, {max}]"
        )));
    }
    if steps < 2 {
        return Err(IvError::Configuration("grid steps must be >= 2".into()));
    }
    let step = (max - min) / (steps as f64 - 1.0);
    Ok((0..steps).map(|i| min + step * i as f64).collect())
}

/// Minimize `f` over `[lo, hi]`.
pub fn minimize_bounded<F>(f: F, lo: f64, hi: f64, grid_steps: usize) -> IvResult<ScalarMinimum>
where
    F: Fn(f64) -> f64 + Sync,
{
    let grid = lin_space(lo, hi, grid_steps)?;

    let values: Vec<f64> = grid.par_iter().map(|&x| f(x)).collect();

    // Deterministic selection: minimum value, ties broken by grid index.
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            continue;
        }
        match best {
            Some(b) if values[b] <= v => {}
            _ => best = Some(i),
        }
    }
    let Some(best) = best else {
        return Err(IvError::FitDegenerate(
            "objective is non-finite over the whole search interval".into(),
        ));
    };

    let mut a = grid[best.saturating_sub(1)];
    let mut b = grid[(best + 1).min(grid.len() - 1)];
    let mut x1 = b - INV_PHI * (b - a);
    let mut x2 = a + INV_PHI * (b - a);
    let mut f1 = f(x1);
    let mut f2 = f(x2);
    let tol = 1e-12 * (hi - lo).abs().max(f64::MIN_POSITIVE);

    for _ in 0..MAX_REFINE_ITERS {
        if (b - a).abs() <= tol {
            break;
        }
        if f1 <= f2 {
            b = x2;
            x2 = x1;
            f2 = f1;
            x1 = b - INV_PHI * (b - a);
            f1 = f(x1);
        } else {
            a = x1;
            x1 = x2;
            f1 = f2;
            x2 = a + INV_PHI * (b - a);
            f2 = f(x2);
        }
    }

    let (x_ref, f_ref) = if f1 <= f2 { (x1, f1) } else { (x2, f2) };
    // Golden-section assumes unimodality inside the bracket; never return
    // something worse than the grid winner.
    if f_ref.is_finite() && f_ref <= values[best] {
        Ok(ScalarMinimum { x: x_ref, value: f_ref })
    } else {
        Ok(ScalarMinimum {
            x: grid[best],
            value: values[best],
        })
    }
}
