//! Core types shared by the EM solvers.

pub(crate) mod em;
pub(crate) mod linesearch;

mod density;
mod options;
mod result;

pub use density::{DiagonalCovariance, GaussianDensity};
pub use options::{FitOptions, OptionsError};
pub use result::FitSummary;
