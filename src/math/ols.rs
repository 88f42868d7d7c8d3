//! Least squares regression.
//!
//! Every resistance estimate in this crate is a straight-line fit of voltage on
//! current:
//!
//! ```text
//! minimize Σ (V_i - (b + R I_i))^2
//! ```
//!
//! Implementation choices:
//! - We build the two-column design matrix `[1, I]` and solve it with SVD, which
//!   handles tall systems robustly.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - SVD happily returns a minimum-norm answer for a rank-deficient design, so
//!   constant-current inputs are rejected explicitly before solving.

use nalgebra::{DMatrix, DVector};

use crate::error::{IvError, IvResult};

/// Straight-line fit `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient. NaN when `y` is constant.
    pub r_value: f64,
}

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Ordinary least squares fit of `y` on `x`.
pub fn linear_regression(x: &[f64], y: &[f64]) -> IvResult<LinearFit> {
    if x.len() != y.len() {
        return Err(IvError::DataShape(format!(
            "regression inputs differ in length ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    let n = x.len();
    if n < 2 {
        return Err(IvError::FitDegenerate(format!("need at least 2 points, got {n}")));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(IvError::FitDegenerate("non-finite regression input".into()));
    }

    let n_f = n as f64;
    let x_mean = x.iter().sum::<f64>() / n_f;
    let y_mean = y.iter().sum::<f64>() / n_f;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let x_scale = x.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if sxx <= (x_scale * x_scale) * n_f * 1e-24 || sxx == 0.0 {
        return Err(IvError::FitDegenerate("regressor has no spread".into()));
    }

    // Standardize x so both design columns have unit scale: sweep currents are
    // often nA or below, far under the SVD cutoff.
    let x_std = (sxx / n_f).sqrt();
    let design = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { (x[i] - x_mean) / x_std });
    let rhs = DVector::from_column_slice(y);
    let beta = solve_least_squares(&design, &rhs)
        .ok_or_else(|| IvError::FitDegenerate("least squares solve failed".into()))?;

    let slope = beta[1] / x_std;
    let intercept = beta[0] - slope * x_mean;
    let r_value = if syy > 0.0 { sxy / (sxx * syy).sqrt() } else { f64::NAN };

    Ok(LinearFit {
        slope,
        intercept,
        r_value: r_value.clamp(-1.0, 1.0),
    })
}
