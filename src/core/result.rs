//! Fit summary shared by all fitted models.

/// Bookkeeping from an EM run, attached to every fitted model.
#[derive(Debug, Clone)]
pub struct FitSummary {
    /// Number of completed EM iterations.
    pub iterations: usize,
    /// Whether the log-likelihood threshold was met. Always `false` under a
    /// fixed-iteration schedule, which never evaluates the log-likelihood.
    pub converged: bool,
    /// Final tracked log-likelihood, `None` under a fixed-iteration schedule.
    pub log_likelihood: Option<f64>,
}
