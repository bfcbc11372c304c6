//! Linear Gaussian factor analysis fitting via EM.

use faer::{Col, Mat};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::core::em::{run_em, EmStep, Schedule};
use crate::core::{DiagonalCovariance, FitOptions, FitSummary, GaussianDensity, OptionsError};
use crate::solvers::traits::{Estimator, FitError};
use crate::utils::{center_rows, column_means, qr_inverse, standard_normal_mat, subsample_indices};

/// Low-rank-plus-diagonal covariance estimator (factor analysis).
///
/// Models the data covariance as ΦΦᵗ + Σ with a D×K loading matrix Φ and a
/// diagonal noise covariance Σ. The mean is the sample mean and stays fixed;
/// EM alternates closed-form latent-factor posteriors with loading and noise
/// updates over the full dataset.
///
/// The convergence check deliberately scores only a fixed random subsample of
/// points against the reconstructed covariance, which keeps the check cheap
/// on large datasets. Supplying `fixed_iterations` skips the check entirely
/// and runs an exact number of sweeps.
///
/// # Example
///
/// ```rust,ignore
/// use emfit::solvers::{Estimator, FactorAnalyzer};
///
/// let fitted = FactorAnalyzer::builder()
///     .n_factors(3)
///     .subsample_size(25)
///     .build()
///     .fit(&data)?;
///
/// let reconstructed = fitted.full_covariance();
/// ```
#[derive(Debug, Clone)]
pub struct FactorAnalyzer {
    options: FitOptions,
    n_factors: usize,
    subsample_size: usize,
    fixed_iterations: Option<usize>,
}

impl FactorAnalyzer {
    /// Create an estimator with the given factor count and default options.
    pub fn new(n_factors: usize) -> Self {
        Self {
            options: FitOptions::default(),
            n_factors,
            subsample_size: 25,
            fixed_iterations: None,
        }
    }

    /// Create a builder for configuring the estimator.
    pub fn builder() -> FactorAnalyzerBuilder {
        FactorAnalyzerBuilder::default()
    }
}

impl Estimator for FactorAnalyzer {
    type Fitted = FittedFactorAnalyzer;

    fn fit(&self, data: &Mat<f64>) -> Result<Self::Fitted, FitError> {
        self.options.validate()?;
        if self.n_factors < 1 {
            return Err(OptionsError::InvalidFactorCount(self.n_factors).into());
        }
        if self.subsample_size < 1 {
            return Err(OptionsError::InvalidSubsampleSize(self.subsample_size).into());
        }
        if let Some(0) = self.fixed_iterations {
            return Err(OptionsError::InvalidFixedIterations(0).into());
        }

        let n_obs = data.nrows();
        let n_dims = data.ncols();
        if n_obs == 0 || n_dims == 0 {
            return Err(FitError::EmptyDataset);
        }

        let mean = column_means(data);
        let centered = center_rows(data, &mean);

        // Per-dimension mean squared deviation seeds the diagonal noise.
        let noise = DiagonalCovariance::new(Col::from_fn(n_dims, |j| {
            let sum: f64 = (0..n_obs).map(|i| centered[(i, j)] * centered[(i, j)]).sum();
            sum / n_obs as f64
        }));

        let mut rng = StdRng::seed_from_u64(self.options.seed);
        let loadings = standard_normal_mat(&mut rng, n_dims, self.n_factors);
        let subsample = subsample_indices(&mut rng, n_obs, self.subsample_size);

        let schedule = match self.fixed_iterations {
            Some(iterations) => Schedule::Fixed { iterations },
            None => Schedule::UntilConverged {
                tolerance: self.options.tolerance,
                max_iterations: self.options.max_iterations,
            },
        };

        let mut model = FactorEm {
            data,
            centered: &centered,
            mean: &mean,
            subsample,
            rank_tolerance: self.options.rank_tolerance,
        };
        let outcome = run_em(&mut model, FaParams { loadings, noise }, &schedule)?;

        Ok(FittedFactorAnalyzer {
            mean,
            loadings: outcome.params.loadings,
            noise: outcome.params.noise,
            summary: outcome.summary,
        })
    }
}

/// Builder for `FactorAnalyzer`.
#[derive(Debug, Clone)]
pub struct FactorAnalyzerBuilder {
    options: FitOptions,
    n_factors: usize,
    subsample_size: usize,
    fixed_iterations: Option<usize>,
}

impl Default for FactorAnalyzerBuilder {
    fn default() -> Self {
        Self {
            options: FitOptions::default(),
            n_factors: 1,
            subsample_size: 25,
            fixed_iterations: None,
        }
    }
}

impl FactorAnalyzerBuilder {
    /// Set the number of latent factors (columns of Φ).
    pub fn n_factors(mut self, k: usize) -> Self {
        self.n_factors = k;
        self
    }

    /// Set how many points the convergence check scores.
    pub fn subsample_size(mut self, n: usize) -> Self {
        self.subsample_size = n;
        self
    }

    /// Run exactly this many iterations instead of checking convergence.
    pub fn fixed_iterations(mut self, iterations: usize) -> Self {
        self.fixed_iterations = Some(iterations);
        self
    }

    /// Set the log-likelihood stopping threshold.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.options.tolerance = tolerance;
        self
    }

    /// Set the iteration cap for the convergence-checked mode.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.options.max_iterations = max_iterations;
        self
    }

    /// Set the initialization seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.options.seed = seed;
        self
    }

    /// Build the estimator.
    pub fn build(self) -> FactorAnalyzer {
        FactorAnalyzer {
            options: self.options,
            n_factors: self.n_factors,
            subsample_size: self.subsample_size,
            fixed_iterations: self.fixed_iterations,
        }
    }
}

/// A fitted factor analyzer.
#[derive(Debug, Clone)]
pub struct FittedFactorAnalyzer {
    /// Sample mean μ the model was centered on.
    pub mean: Col<f64>,
    /// Loading matrix Φ, D×K.
    pub loadings: Mat<f64>,
    /// Diagonal noise covariance Σ; the type itself carries the
    /// off-diagonals-are-zero invariant.
    pub noise: DiagonalCovariance,
    /// Iteration bookkeeping from the EM run.
    pub summary: FitSummary,
}

impl FittedFactorAnalyzer {
    /// Number of latent factors.
    pub fn n_factors(&self) -> usize {
        self.loadings.ncols()
    }

    /// Dimensionality of the observed space.
    pub fn dim(&self) -> usize {
        self.loadings.nrows()
    }

    /// Reconstruct the full model covariance Σ + ΦΦᵗ.
    pub fn full_covariance(&self) -> Mat<f64> {
        full_covariance(&self.noise, &self.loadings)
    }
}

pub(crate) struct FaParams {
    loadings: Mat<f64>,
    noise: DiagonalCovariance,
}

struct FactorEm<'a> {
    data: &'a Mat<f64>,
    centered: &'a Mat<f64>,
    mean: &'a Col<f64>,
    subsample: Vec<usize>,
    rank_tolerance: f64,
}

impl EmStep for FactorEm<'_> {
    type Params = FaParams;

    fn update(&mut self, params: FaParams) -> Result<FaParams, FitError> {
        let centered = self.centered;
        let n_obs = centered.nrows();
        let n_dims = centered.ncols();
        let k = params.loadings.ncols();
        let phi = &params.loadings;

        // E-step. The diagonal inverse is exact because the noise type only
        // stores a diagonal.
        let inv_noise = params.noise.inverse_diag()?;

        // Gain M = Φᵗ Σ⁻¹ (K×D) and posterior covariance V = (MΦ + I)⁻¹.
        let gain = Mat::from_fn(k, n_dims, |r, c| phi[(c, r)] * inv_noise[c]);
        let mut mphi_plus_i: Mat<f64> = Mat::zeros(k, k);
        for r in 0..k {
            for c in 0..k {
                for m in 0..n_dims {
                    mphi_plus_i[(r, c)] += gain[(r, m)] * phi[(m, c)];
                }
            }
            mphi_plus_i[(r, r)] += 1.0;
        }
        let posterior = qr_inverse(&mphi_plus_i, self.rank_tolerance);
        if posterior.rank < k {
            return Err(FitError::SingularMatrix);
        }
        let posterior_cov = posterior.inverse;

        // Projection V·M maps a centered observation to its expected factors.
        let mut projection: Mat<f64> = Mat::zeros(k, n_dims);
        for r in 0..k {
            for c in 0..n_dims {
                for m in 0..k {
                    projection[(r, c)] += posterior_cov[(r, m)] * gain[(m, c)];
                }
            }
        }

        let mut expected: Mat<f64> = Mat::zeros(n_obs, k);
        let mut sum_outer: Mat<f64> = Mat::zeros(k, k);
        let mut cross: Mat<f64> = Mat::zeros(n_dims, k);
        for i in 0..n_obs {
            for f in 0..k {
                let mut e = 0.0;
                for j in 0..n_dims {
                    e += projection[(f, j)] * centered[(i, j)];
                }
                expected[(i, f)] = e;
            }
            // E[h hᵗ] = V + E[h]E[h]ᵗ, accumulated directly into the M-step
            // sums.
            for a in 0..k {
                for b in 0..k {
                    sum_outer[(a, b)] += posterior_cov[(a, b)] + expected[(i, a)] * expected[(i, b)];
                }
            }
            for j in 0..n_dims {
                for f in 0..k {
                    cross[(j, f)] += centered[(i, j)] * expected[(i, f)];
                }
            }
        }

        // M-step: Φ_new = (Σ (x−μ)E[h]ᵗ)(Σ E[h hᵗ])⁻¹.
        let outer_inv = qr_inverse(&sum_outer, self.rank_tolerance);
        if outer_inv.rank < k {
            return Err(FitError::SingularMatrix);
        }
        let mut loadings: Mat<f64> = Mat::zeros(n_dims, k);
        for j in 0..n_dims {
            for f in 0..k {
                for m in 0..k {
                    loadings[(j, f)] += cross[(j, m)] * outer_inv.inverse[(m, f)];
                }
            }
        }

        // Noise update keeps only the diagonal of the residual scatter, per
        // the factor-analysis noise-independence model. Off-diagonal entries
        // are never formed.
        let noise = DiagonalCovariance::new(Col::from_fn(n_dims, |j| {
            let mut residual = 0.0;
            for i in 0..n_obs {
                let mut reconstructed = 0.0;
                for f in 0..k {
                    reconstructed += loadings[(j, f)] * expected[(i, f)];
                }
                residual += centered[(i, j)] * (centered[(i, j)] - reconstructed);
            }
            residual / n_obs as f64
        }));

        Ok(FaParams { loadings, noise })
    }

    fn log_likelihood(&mut self, params: &FaParams) -> Result<f64, FitError> {
        // Approximate check: score only the fixed subsample against the
        // reconstructed covariance, which may be numerically singular.
        let full = full_covariance(&params.noise, &params.loadings);
        let density = GaussianDensity::new_allow_singular(self.mean.clone(), &full, self.rank_tolerance);

        Ok(self
            .subsample
            .iter()
            .map(|&i| density.log_density_at(self.data, i))
            .sum())
    }
}

fn full_covariance(noise: &DiagonalCovariance, loadings: &Mat<f64>) -> Mat<f64> {
    let n_dims = loadings.nrows();
    let k = loadings.ncols();

    let mut full = noise.to_dense();
    for a in 0..n_dims {
        for b in 0..n_dims {
            for f in 0..k {
                full[(a, b)] += loadings[(a, f)] * loadings[(b, f)];
            }
        }
    }
    full
}
