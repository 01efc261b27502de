//! Least squares solver for the global linear model.
//!
//! We solve
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! where `x_i` is an assembled feature row with a leading `1.0` for the intercept.
//!
//! Implementation choices:
//! - SVD rather than normal equations. One-hot indicator blocks plus an
//!   intercept are exactly collinear (the indicators of a field sum to 1), and
//!   SVD returns the minimum-norm solution instead of failing.
//! - Singular values are cut relative to the largest one. Day offsets run into
//!   the thousands, so a fixed cutoff would keep the rounding noise of the
//!   collinear directions and blow it up into large coefficients.
//! - Nalgebra's `QR::solve` is intended for square systems and panics on tall
//!   matrices, so it is not an option here.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);
    let scale = svd.singular_values.max();
    if !scale.is_finite() {
        return None;
    }

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol * scale) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
