//! EM fitters for latent-variable models of multivariate continuous data.
//!
//! Three estimators share one algorithmic skeleton: alternate an expectation
//! step over latent variables with a closed-form maximization step, watching
//! the data log-likelihood for convergence.
//!
//! - [`solvers::GaussianMixture`]: finite mixture of K Gaussians.
//! - [`solvers::StudentT`]: a single heavy-tailed multivariate Student-t,
//!   robust to outliers, with the degrees of freedom fit by a bounded line
//!   search.
//! - [`solvers::FactorAnalyzer`]: low-rank-plus-diagonal covariance model
//!   with a subsampled convergence check.
//!
//! Fits are single-threaded, deterministic for a given seed, and either
//! complete fully or return a [`solvers::FitError`]; there are no partial
//! results.
//!
//! # Example
//!
//! ```rust,ignore
//! use emfit::prelude::*;
//! use faer::Mat;
//!
//! // One observation per row.
//! let data: Mat<f64> = load_points();
//!
//! let fitted = GaussianMixture::builder()
//!     .n_components(2)
//!     .tolerance(1e-2)
//!     .seed(0)
//!     .build()
//!     .fit(&data)?;
//!
//! println!("weights: {:?}", fitted.weights);
//! println!("converged in {} iterations", fitted.summary.iterations);
//! ```

pub mod core;
pub mod solvers;
pub mod utils;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{DiagonalCovariance, FitOptions, FitSummary, GaussianDensity, OptionsError};
    pub use crate::solvers::{
        Estimator, FactorAnalyzer, FitError, FittedFactorAnalyzer, FittedGaussianMixture,
        FittedStudentT, GaussianMixture, StudentT,
    };
}

pub use crate::core::{DiagonalCovariance, FitOptions, FitSummary, OptionsError};
pub use crate::solvers::{
    Estimator, FactorAnalyzer, FitError, FittedFactorAnalyzer, FittedGaussianMixture,
    FittedStudentT, GaussianMixture, StudentT,
};
