//! Multivariate normal density evaluation.

use faer::{Col, Mat};

use crate::solvers::FitError;
use crate::utils::{qr_inverse, quadratic_form};

const LN_2PI: f64 = 1.837_877_066_409_345_3;

/// A multivariate normal with its covariance factored up front.
///
/// The inverse and log-determinant come from a column-pivoted QR of the
/// covariance, so repeated evaluation against many points costs one quadratic
/// form each.
#[derive(Debug, Clone)]
pub struct GaussianDensity {
    mean: Col<f64>,
    inverse: Mat<f64>,
    log_norm: f64,
}

impl GaussianDensity {
    /// Build the evaluator, failing with `SingularMatrix` when the covariance
    /// is rank deficient at `rank_tolerance`.
    pub fn new(mean: Col<f64>, covariance: &Mat<f64>, rank_tolerance: f64) -> Result<Self, FitError> {
        let d = mean.nrows();
        let factored = qr_inverse(covariance, rank_tolerance);
        if factored.rank < d {
            return Err(FitError::SingularMatrix);
        }
        Ok(Self {
            mean,
            inverse: factored.inverse,
            log_norm: -0.5 * (d as f64 * LN_2PI + factored.log_abs_det),
        })
    }

    /// Build the evaluator accepting a singular covariance.
    ///
    /// Rank-deficient directions are truncated out of the inverse, and the
    /// normalizer uses the numerical rank and pseudo-determinant in place of
    /// the full dimension. The factor analyzer's subsampled convergence check
    /// needs this for the reconstructed covariance Σ + ΦΦᵗ.
    pub fn new_allow_singular(mean: Col<f64>, covariance: &Mat<f64>, rank_tolerance: f64) -> Self {
        let factored = qr_inverse(covariance, rank_tolerance);
        Self {
            mean,
            inverse: factored.inverse,
            log_norm: -0.5 * (factored.rank as f64 * LN_2PI + factored.log_abs_det),
        }
    }

    /// Log-density of the observation stored in row `i` of `data`.
    pub fn log_density_at(&self, data: &Mat<f64>, i: usize) -> f64 {
        let diff = Col::from_fn(self.mean.nrows(), |j| data[(i, j)] - self.mean[j]);
        self.log_norm - 0.5 * quadratic_form(&self.inverse, &diff)
    }

    /// Density of the observation stored in row `i` of `data`.
    pub fn density_at(&self, data: &Mat<f64>, i: usize) -> f64 {
        self.log_density_at(data, i).exp()
    }
}

/// A diagonal covariance matrix stored as its variance entries.
///
/// The factor-analysis noise model constrains the covariance to be diagonal;
/// holding only the diagonal makes that invariant unrepresentable to break
/// rather than an incidental zeroing step, and makes the exact element-wise
/// inverse the only inverse available.
#[derive(Debug, Clone)]
pub struct DiagonalCovariance {
    variances: Col<f64>,
}

impl DiagonalCovariance {
    /// Wrap per-dimension variances.
    pub fn new(variances: Col<f64>) -> Self {
        Self { variances }
    }

    /// Dimension of the covariance.
    pub fn dim(&self) -> usize {
        self.variances.nrows()
    }

    /// The variance entries along the diagonal.
    pub fn variances(&self) -> &Col<f64> {
        &self.variances
    }

    /// Element-wise inverse of the diagonal, exact for this representation.
    pub fn inverse_diag(&self) -> Result<Col<f64>, FitError> {
        let n = self.variances.nrows();
        let mut inv = Col::zeros(n);
        for i in 0..n {
            let v = self.variances[i];
            if !(v > 0.0) {
                return Err(FitError::SingularMatrix);
            }
            inv[i] = 1.0 / v;
        }
        Ok(inv)
    }

    /// Materialize the dense D×D matrix (off-diagonal entries all zero).
    pub fn to_dense(&self) -> Mat<f64> {
        let n = self.variances.nrows();
        Mat::from_fn(n, n, |i, j| if i == j { self.variances[i] } else { 0.0 })
    }
}
