//! Gaussian mixture model fitting via EM.

use faer::{Col, Mat};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::core::em::{run_em, EmStep, Schedule};
use crate::core::{FitOptions, FitSummary, GaussianDensity, OptionsError};
use crate::solvers::traits::{Estimator, FitError};
use crate::utils::standard_normal_mat;

/// K-component Gaussian mixture estimator.
///
/// Alternates computing responsibilities (the posterior over components for
/// each observation) with closed-form weight/mean/covariance updates, until
/// the data log-likelihood stabilizes.
///
/// Initialization is deterministic for a given seed: uniform weights, means
/// drawn from a standard normal, and each covariance built as AAᵗ for a
/// random matrix A so it starts positive semi-definite.
///
/// # Example
///
/// ```rust,ignore
/// use emfit::solvers::{Estimator, GaussianMixture};
/// use faer::Mat;
///
/// let fitted = GaussianMixture::builder()
///     .n_components(2)
///     .tolerance(1e-2)
///     .build()
///     .fit(&data)?;
///
/// println!("weights: {:?}", fitted.weights);
/// ```
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    options: FitOptions,
    n_components: usize,
}

impl GaussianMixture {
    /// Create a mixture estimator with the given component count and default
    /// options.
    pub fn new(n_components: usize) -> Self {
        Self {
            options: FitOptions::default(),
            n_components,
        }
    }

    /// Create a builder for configuring the estimator.
    pub fn builder() -> GaussianMixtureBuilder {
        GaussianMixtureBuilder::default()
    }
}

impl Estimator for GaussianMixture {
    type Fitted = FittedGaussianMixture;

    fn fit(&self, data: &Mat<f64>) -> Result<Self::Fitted, FitError> {
        self.options.validate()?;
        if self.n_components < 1 {
            return Err(OptionsError::InvalidComponentCount(self.n_components).into());
        }

        let n_obs = data.nrows();
        let n_dims = data.ncols();
        if n_obs == 0 || n_dims == 0 {
            return Err(FitError::EmptyDataset);
        }

        let k = self.n_components;
        let mut rng = StdRng::seed_from_u64(self.options.seed);

        let weights = Col::from_fn(k, |_| 1.0 / k as f64);
        let means = standard_normal_mat(&mut rng, k, n_dims);
        let covariances: Vec<Mat<f64>> = (0..k)
            .map(|_| {
                let a = standard_normal_mat(&mut rng, n_dims, n_dims);
                let mut cov: Mat<f64> = Mat::zeros(n_dims, n_dims);
                for r in 0..n_dims {
                    for c in 0..n_dims {
                        for m in 0..n_dims {
                            cov[(r, c)] += a[(r, m)] * a[(c, m)];
                        }
                    }
                }
                cov
            })
            .collect();

        let mut model = MixtureEm {
            data,
            rank_tolerance: self.options.rank_tolerance,
        };
        let outcome = run_em(
            &mut model,
            MixtureParams {
                weights,
                means,
                covariances,
            },
            &Schedule::UntilConverged {
                tolerance: self.options.tolerance,
                max_iterations: self.options.max_iterations,
            },
        )?;

        Ok(FittedGaussianMixture {
            weights: outcome.params.weights,
            means: outcome.params.means,
            covariances: outcome.params.covariances,
            summary: outcome.summary,
            rank_tolerance: self.options.rank_tolerance,
        })
    }
}

/// Builder for `GaussianMixture`.
#[derive(Debug, Clone)]
pub struct GaussianMixtureBuilder {
    options: FitOptions,
    n_components: usize,
}

impl Default for GaussianMixtureBuilder {
    fn default() -> Self {
        Self {
            options: FitOptions::default(),
            n_components: 1,
        }
    }
}

impl GaussianMixtureBuilder {
    /// Set the number of mixture components.
    pub fn n_components(mut self, k: usize) -> Self {
        self.n_components = k;
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

    /// Set the initialization seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.options.seed = seed;
        self
    }

    /// Build the estimator.
    pub fn build(self) -> GaussianMixture {
        GaussianMixture {
            options: self.options,
            n_components: self.n_components,
        }
    }
}

/// A fitted Gaussian mixture model.
#[derive(Debug, Clone)]
pub struct FittedGaussianMixture {
    /// Mixing weights λ, length K, non-negative, summing to 1.
    pub weights: Col<f64>,
    /// Component means, K×D with row k holding μ_k.
    pub means: Mat<f64>,
    /// Component covariances, K symmetric D×D matrices.
    pub covariances: Vec<Mat<f64>>,
    /// Iteration bookkeeping from the EM run.
    pub summary: FitSummary,
    rank_tolerance: f64,
}

impl FittedGaussianMixture {
    /// Number of mixture components.
    pub fn n_components(&self) -> usize {
        self.weights.nrows()
    }

    /// Dimensionality of the fitted model.
    pub fn dim(&self) -> usize {
        self.means.ncols()
    }

    /// Soft component assignments for `data`, one probability row per
    /// observation, normalized exactly as in the training E-step.
    pub fn responsibilities(&self, data: &Mat<f64>) -> Result<Mat<f64>, FitError> {
        let densities = self.component_densities()?;
        responsibilities_from(data, &densities)
    }

    /// Data log-likelihood of `data` under the fitted mixture.
    pub fn log_likelihood(&self, data: &Mat<f64>) -> Result<f64, FitError> {
        let densities = self.component_densities()?;
        Ok(mixture_log_likelihood(data, &self.weights, &densities))
    }

    fn component_densities(&self) -> Result<Vec<GaussianDensity>, FitError> {
        component_densities(&self.means, &self.covariances, self.rank_tolerance)
    }
}

pub(crate) struct MixtureParams {
    weights: Col<f64>,
    means: Mat<f64>,
    covariances: Vec<Mat<f64>>,
}

struct MixtureEm<'a> {
    data: &'a Mat<f64>,
    rank_tolerance: f64,
}

impl EmStep for MixtureEm<'_> {
    type Params = MixtureParams;

    fn update(&mut self, params: MixtureParams) -> Result<MixtureParams, FitError> {
        let data = self.data;
        let n_obs = data.nrows();
        let n_dims = data.ncols();
        let k = params.weights.nrows();

        // E-step: normalized responsibilities from per-component densities.
        let densities = component_densities(&params.means, &params.covariances, self.rank_tolerance)?;
        let resp = responsibilities_from(data, &densities)?;

        // M-step: effective counts, then weighted means and scatter.
        let mut weights = Col::zeros(k);
        let mut means: Mat<f64> = Mat::zeros(k, n_dims);
        let mut covariances = Vec::with_capacity(k);

        for comp in 0..k {
            let effective_count: f64 = (0..n_obs).map(|i| resp[(i, comp)]).sum();
            if effective_count == 0.0 {
                return Err(FitError::DegenerateResponsibility(format!(
                    "component {comp} has zero effective count"
                )));
            }
            weights[comp] = effective_count / n_obs as f64;

            for j in 0..n_dims {
                let weighted: f64 = (0..n_obs).map(|i| resp[(i, comp)] * data[(i, j)]).sum();
                means[(comp, j)] = weighted / effective_count;
            }

            let mut scatter: Mat<f64> = Mat::zeros(n_dims, n_dims);
            for i in 0..n_obs {
                let r = resp[(i, comp)];
                for a in 0..n_dims {
                    let da = data[(i, a)] - means[(comp, a)];
                    for b in 0..n_dims {
                        let db = data[(i, b)] - means[(comp, b)];
                        scatter[(a, b)] += r * da * db;
                    }
                }
            }
            for a in 0..n_dims {
                for b in 0..n_dims {
                    scatter[(a, b)] /= effective_count;
                }
            }
            covariances.push(scatter);
        }

        Ok(MixtureParams {
            weights,
            means,
            covariances,
        })
    }

    fn log_likelihood(&mut self, params: &MixtureParams) -> Result<f64, FitError> {
        let densities = component_densities(&params.means, &params.covariances, self.rank_tolerance)?;
        Ok(mixture_log_likelihood(self.data, &params.weights, &densities))
    }
}

fn component_densities(
    means: &Mat<f64>,
    covariances: &[Mat<f64>],
    rank_tolerance: f64,
) -> Result<Vec<GaussianDensity>, FitError> {
    let n_dims = means.ncols();
    covariances
        .iter()
        .enumerate()
        .map(|(k, cov)| {
            let mean = Col::from_fn(n_dims, |j| means[(k, j)]);
            GaussianDensity::new(mean, cov, rank_tolerance)
        })
        .collect()
}

fn responsibilities_from(
    data: &Mat<f64>,
    densities: &[GaussianDensity],
) -> Result<Mat<f64>, FitError> {
    let n_obs = data.nrows();
    let k = densities.len();

    let mut resp: Mat<f64> = Mat::zeros(n_obs, k);
    for i in 0..n_obs {
        let mut total = 0.0;
        for (comp, density) in densities.iter().enumerate() {
            let l = density.density_at(data, i);
            resp[(i, comp)] = l;
            total += l;
        }
        if total == 0.0 {
            return Err(FitError::DegenerateResponsibility(format!(
                "all component densities underflowed for observation {i}"
            )));
        }
        for comp in 0..k {
            resp[(i, comp)] /= total;
        }
    }
    Ok(resp)
}

fn mixture_log_likelihood(data: &Mat<f64>, weights: &Col<f64>, densities: &[GaussianDensity]) -> f64 {
    let n_obs = data.nrows();
    let mut total = 0.0;
    for i in 0..n_obs {
        let mut point_density = 0.0;
        for (comp, density) in densities.iter().enumerate() {
            point_density += weights[comp] * density.density_at(data, i);
        }
        total += point_density.ln();
    }
    total
}
