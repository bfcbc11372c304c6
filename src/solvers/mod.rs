//! EM solvers for the three latent-variable models.

mod factor_analyzer;
mod gaussian_mixture;
mod student_t;
mod traits;

pub use factor_analyzer::{FactorAnalyzer, FactorAnalyzerBuilder, FittedFactorAnalyzer};
pub use gaussian_mixture::{FittedGaussianMixture, GaussianMixture, GaussianMixtureBuilder};
pub use student_t::{FittedStudentT, StudentT, StudentTBuilder};
pub use traits::{Estimator, FitError};
