//! Core traits for EM estimators.

use faer::Mat;
use thiserror::Error;

/// Errors that can occur during an EM fit.
///
/// Every variant is unrecoverable for the current fit call: the inputs are
/// deterministic, so retrying internally would reproduce the same failure.
/// A fit either completes fully or returns one of these.
#[derive(Debug, Error)]
pub enum FitError {
    #[error("invalid options: {0}")]
    InvalidOptions(#[from] crate::core::OptionsError),

    #[error("dataset must have at least one observation and one dimension")]
    EmptyDataset,

    #[error("degenerate responsibilities: {0}")]
    DegenerateResponsibility(String),

    #[error("matrix is singular or nearly singular")]
    SingularMatrix,

    #[error("convergence failed after {iterations} iterations")]
    ConvergenceFailed { iterations: usize },

    #[error("line search failed: {0}")]
    LineSearch(String),
}

/// An estimator that can be fit to a dataset.
///
/// Follows the sklearn pattern: fitting consumes nothing and returns an
/// immutable fitted model snapshot. The dataset is an I×D matrix with one
/// observation per row.
pub trait Estimator {
    /// The type of the fitted model.
    type Fitted;

    /// Fit the model to the data.
    fn fit(&self, data: &Mat<f64>) -> Result<Self::Fitted, FitError>;
}
