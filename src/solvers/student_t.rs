//! Multivariate Student-t fitting via EM.

use faer::{Col, Mat};
use statrs::function::gamma::{digamma, ln_gamma};

use crate::core::em::{run_em, EmStep, Schedule};
use crate::core::linesearch::minimize_scalar;
use crate::core::{FitOptions, FitSummary, OptionsError};
use crate::solvers::traits::{Estimator, FitError};
use crate::utils::{center_rows, column_means, population_covariance, qr_inverse, quadratic_form};

/// Inner stopping width for the ν line search, deliberately looser than any
/// sensible outer log-likelihood threshold.
const NU_SEARCH_TOLERANCE: f64 = 0.5;

/// Single multivariate Student-t estimator, robust to outliers.
///
/// The E-step computes per-point latent scale expectations from the current
/// Mahalanobis distances; the M-step reweights mean and scale by E[h] and
/// refits the degrees of freedom ν by a bounded line search over (0, ν_max].
/// A fitted ν near `nu_max` means the data shows no detectable heavy tails;
/// a small ν signals substantial outlier mass.
///
/// Initialization is moment-based (sample mean, population covariance,
/// ν = ν_max) and needs no random seed.
///
/// # Example
///
/// ```rust,ignore
/// use emfit::solvers::{Estimator, StudentT};
///
/// let fitted = StudentT::builder()
///     .nu_max(1000.0)
///     .tolerance(1e-6)
///     .build()
///     .fit(&data)?;
///
/// println!("nu = {}", fitted.nu);
/// ```
#[derive(Debug, Clone)]
pub struct StudentT {
    options: FitOptions,
    nu_max: f64,
}

impl StudentT {
    /// Create an estimator with the given ν upper bound and default options.
    pub fn new(nu_max: f64) -> Self {
        Self {
            options: FitOptions::default(),
            nu_max,
        }
    }

    /// Create a builder for configuring the estimator.
    pub fn builder() -> StudentTBuilder {
        StudentTBuilder::default()
    }
}

impl Estimator for StudentT {
    type Fitted = FittedStudentT;

    fn fit(&self, data: &Mat<f64>) -> Result<Self::Fitted, FitError> {
        self.options.validate()?;
        if !(self.nu_max > 0.0 && self.nu_max.is_finite()) {
            return Err(OptionsError::InvalidNuMax(self.nu_max).into());
        }

        let n_obs = data.nrows();
        let n_dims = data.ncols();
        if n_obs == 0 || n_dims == 0 {
            return Err(FitError::EmptyDataset);
        }

        let mean = column_means(data);
        let centered = center_rows(data, &mean);
        let scale = population_covariance(&centered);

        let mut model = StudentTEm {
            data,
            nu_max: self.nu_max,
            rank_tolerance: self.options.rank_tolerance,
            delta: Col::zeros(n_obs),
            log_det_scale: 0.0,
        };
        model.refresh_distances(&centered, &scale)?;

        let outcome = run_em(
            &mut model,
            TParams {
                mean,
                scale,
                nu: self.nu_max,
            },
            &Schedule::UntilConverged {
                tolerance: self.options.tolerance,
                max_iterations: self.options.max_iterations,
            },
        )?;

        Ok(FittedStudentT {
            mean: outcome.params.mean,
            scale: outcome.params.scale,
            nu: outcome.params.nu,
            summary: outcome.summary,
            rank_tolerance: self.options.rank_tolerance,
        })
    }
}

/// Builder for `StudentT`.
#[derive(Debug, Clone)]
pub struct StudentTBuilder {
    options: FitOptions,
    nu_max: f64,
}

impl Default for StudentTBuilder {
    fn default() -> Self {
        Self {
            options: FitOptions::default(),
            nu_max: 1000.0,
        }
    }
}

impl StudentTBuilder {
    /// Set the upper bound for the degrees of freedom ν.
    pub fn nu_max(mut self, nu_max: f64) -> Self {
        self.nu_max = nu_max;
        self
    }

    /// Set the log-likelihood stopping threshold.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.options.tolerance = tolerance;
        self
    }

    /// Set the iteration cap.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.options.max_iterations = max_iterations;
        self
    }

    /// Build the estimator.
    pub fn build(self) -> StudentT {
        StudentT {
            options: self.options,
            nu_max: self.nu_max,
        }
    }
}

/// A fitted multivariate Student-t distribution.
#[derive(Debug, Clone)]
pub struct FittedStudentT {
    /// Location vector μ.
    pub mean: Col<f64>,
    /// Symmetric positive semi-definite scale matrix Σ.
    pub scale: Mat<f64>,
    /// Degrees of freedom, within (0, ν_max].
    pub nu: f64,
    /// Iteration bookkeeping from the EM run.
    pub summary: FitSummary,
    rank_tolerance: f64,
}

impl FittedStudentT {
    /// Dimensionality of the fitted distribution.
    pub fn dim(&self) -> usize {
        self.mean.nrows()
    }

    /// Mahalanobis distance of every observation from the fitted center,
    /// scaled by the fitted Σ.
    pub fn mahalanobis(&self, data: &Mat<f64>) -> Result<Col<f64>, FitError> {
        let n_dims = self.dim();
        let inv = qr_inverse(&self.scale, self.rank_tolerance);
        if inv.rank < n_dims {
            return Err(FitError::SingularMatrix);
        }

        let centered = center_rows(data, &self.mean);
        Ok(Col::from_fn(data.nrows(), |i| {
            let row = Col::from_fn(n_dims, |j| centered[(i, j)]);
            quadratic_form(&inv.inverse, &row)
        }))
    }

    /// Data log-likelihood of `data` under the fitted distribution.
    pub fn log_likelihood(&self, data: &Mat<f64>) -> Result<f64, FitError> {
        let n_dims = self.dim();
        let inv = qr_inverse(&self.scale, self.rank_tolerance);
        if inv.rank < n_dims {
            return Err(FitError::SingularMatrix);
        }

        let centered = center_rows(data, &self.mean);
        let delta = Col::from_fn(data.nrows(), |i| {
            let row = Col::from_fn(n_dims, |j| centered[(i, j)]);
            quadratic_form(&inv.inverse, &row)
        });
        Ok(student_t_log_likelihood(
            self.nu,
            n_dims,
            inv.log_abs_det,
            &delta,
        ))
    }
}

pub(crate) struct TParams {
    mean: Col<f64>,
    scale: Mat<f64>,
    nu: f64,
}

struct StudentTEm<'a> {
    data: &'a Mat<f64>,
    nu_max: f64,
    rank_tolerance: f64,
    /// Mahalanobis distances δ under the parameters last seen by the loop;
    /// seeded from the initial moments and refreshed at the end of each
    /// M-step so both the next E-step and the log-likelihood reuse them.
    delta: Col<f64>,
    log_det_scale: f64,
}

impl StudentTEm<'_> {
    fn refresh_distances(&mut self, centered: &Mat<f64>, scale: &Mat<f64>) -> Result<(), FitError> {
        let n_dims = self.data.ncols();
        let inv = qr_inverse(scale, self.rank_tolerance);
        if inv.rank < n_dims {
            return Err(FitError::SingularMatrix);
        }

        for i in 0..self.data.nrows() {
            let row = Col::from_fn(n_dims, |j| centered[(i, j)]);
            self.delta[i] = quadratic_form(&inv.inverse, &row);
        }
        self.log_det_scale = inv.log_abs_det;
        Ok(())
    }
}

impl EmStep for StudentTEm<'_> {
    type Params = TParams;

    fn update(&mut self, params: TParams) -> Result<TParams, FitError> {
        let data = self.data;
        let n_obs = data.nrows();
        let n_dims = data.ncols();
        let d = n_dims as f64;
        let count = n_obs as f64;
        let nu = params.nu;

        // E-step: expected latent scales from the cached distances.
        let e_h = Col::from_fn(n_obs, |i| (nu + d) / (nu + self.delta[i]));
        let e_log_h =
            Col::from_fn(n_obs, |i| digamma(0.5 * (nu + d)) - (0.5 * (nu + self.delta[i])).ln());

        // M-step: scale-weighted mean, then scale-weighted scatter around it.
        let sum_e_h: f64 = (0..n_obs).map(|i| e_h[i]).sum();
        let mean = Col::from_fn(n_dims, |j| {
            let weighted: f64 = (0..n_obs).map(|i| e_h[i] * data[(i, j)]).sum();
            weighted / sum_e_h
        });

        let centered = center_rows(data, &mean);
        let mut scale: Mat<f64> = Mat::zeros(n_dims, n_dims);
        for i in 0..n_obs {
            for a in 0..n_dims {
                for b in 0..n_dims {
                    scale[(a, b)] += e_h[i] * centered[(i, a)] * centered[(i, b)];
                }
            }
        }
        for a in 0..n_dims {
            for b in 0..n_dims {
                scale[(a, b)] /= sum_e_h;
            }
        }

        // ν update: minimize the negative expected complete-data
        // log-likelihood term over the bound interval.
        let diff_sum: f64 = (0..n_obs).map(|i| e_log_h[i] - e_h[i]).sum();
        let cost = move |nu: f64| {
            let half = 0.5 * nu;
            -(-count * ln_gamma(half) + count * half * half.ln() + half * diff_sum)
        };
        let mut nu = minimize_scalar(&cost, (0.0, self.nu_max), NU_SEARCH_TOLERANCE)?;
        // With light-tailed data the cost decreases all the way to the upper
        // bound and the search lands on a slightly different interior point
        // every sweep. Pinning ν to the bound whenever it scores at least as
        // well keeps successive sweeps identical so the outer stopping
        // criterion can fire.
        if cost(self.nu_max) <= cost(nu) {
            nu = self.nu_max;
        }

        self.refresh_distances(&centered, &scale)?;

        Ok(TParams { mean, scale, nu })
    }

    fn log_likelihood(&mut self, params: &TParams) -> Result<f64, FitError> {
        Ok(student_t_log_likelihood(
            params.nu,
            self.data.ncols(),
            self.log_det_scale,
            &self.delta,
        ))
    }
}

/// Closed-form multivariate Student-t log-likelihood given precomputed
/// Mahalanobis distances and log det Σ.
fn student_t_log_likelihood(nu: f64, n_dims: usize, log_det_scale: f64, delta: &Col<f64>) -> f64 {
    let d = n_dims as f64;
    let count = delta.nrows() as f64;

    let constant = count
        * (ln_gamma(0.5 * (nu + d))
            - 0.5 * d * (nu * std::f64::consts::PI).ln()
            - 0.5 * log_det_scale
            - ln_gamma(0.5 * nu));
    let tail: f64 = (0..delta.nrows()).map(|i| (delta[i] / nu).ln_1p()).sum();
    constant - 0.5 * (nu + d) * tail
}
