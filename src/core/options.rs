//! Shared fit options and configuration.

use thiserror::Error;

/// Configuration shared by every EM fitter.
///
/// Model-specific knobs (component count, factor count, ν bound, subsample
/// size) live on the individual fitters; this struct carries only the loop
/// controls common to all of them.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Stop when the absolute change in log-likelihood between consecutive
    /// iterations falls below this threshold (default: 1e-2).
    pub tolerance: f64,
    /// Liveness guard: abort with `ConvergenceFailed` after this many
    /// iterations without meeting the threshold (default: 1000).
    pub max_iterations: usize,
    /// Seed for the deterministic random initialization (default: 0).
    pub seed: u64,
    /// Tolerance used for rank determination in QR-based inverses.
    pub rank_tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-2,
            max_iterations: 1000,
            seed: 0,
            rank_tolerance: 1e-10,
        }
    }
}

impl FitOptions {
    /// Validate the options and return an error if invalid.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if !(self.tolerance > 0.0) {
            return Err(OptionsError::InvalidTolerance(self.tolerance));
        }
        if self.max_iterations < 1 {
            return Err(OptionsError::InvalidMaxIterations(self.max_iterations));
        }
        if !(self.rank_tolerance > 0.0) {
            return Err(OptionsError::InvalidRankTolerance(self.rank_tolerance));
        }
        Ok(())
    }
}

/// Errors that can occur when validating fitter configuration.
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("tolerance must be positive, got {0}")]
    InvalidTolerance(f64),
    #[error("max_iterations must be at least 1, got {0}")]
    InvalidMaxIterations(usize),
    #[error("rank_tolerance must be positive, got {0}")]
    InvalidRankTolerance(f64),
    #[error("n_components must be at least 1, got {0}")]
    InvalidComponentCount(usize),
    #[error("n_factors must be at least 1, got {0}")]
    InvalidFactorCount(usize),
    #[error("nu_max must be positive and finite, got {0}")]
    InvalidNuMax(f64),
    #[error("subsample_size must be at least 1, got {0}")]
    InvalidSubsampleSize(usize),
    #[error("fixed_iterations must be at least 1, got {0}")]
    InvalidFixedIterations(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        assert!(FitOptions::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_tolerance() {
        let mut options = FitOptions::default();
        options.tolerance = 0.0;
        assert!(matches!(
            options.validate(),
            Err(OptionsError::InvalidTolerance(_))
        ));

        options.tolerance = f64::NAN;
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_max_iterations() {
        let mut options = FitOptions::default();
        options.max_iterations = 0;
        assert!(matches!(
            options.validate(),
            Err(OptionsError::InvalidMaxIterations(0))
        ));
    }
}
