//! Bounded scalar minimization.
//!
//! Thin wrapper over argmin's Brent minimizer, used by the Student-t fitter
//! for the degrees-of-freedom update. The cost closure captures whatever
//! fixed per-iteration statistics it needs.

use argmin::core::{CostFunction, Error, Executor, State};
use argmin::solver::brent::BrentOpt;

use crate::solvers::FitError;

struct ScalarCost<F> {
    f: F,
}

impl<F> CostFunction for ScalarCost<F>
where
    F: Fn(f64) -> f64,
{
    type Param = f64;
    type Output = f64;

    fn cost(&self, param: &f64) -> Result<f64, Error> {
        Ok((self.f)(*param))
    }
}

/// Minimize `cost` over the open-ended bound interval `(lo, hi)`.
///
/// `tolerance` is Brent's absolute stopping width; the solver only evaluates
/// interior points, so a cost that diverges at the boundary is acceptable.
pub(crate) fn minimize_scalar<F>(
    cost: F,
    bounds: (f64, f64),
    tolerance: f64,
) -> Result<f64, FitError>
where
    F: Fn(f64) -> f64,
{
    let (lo, hi) = bounds;
    let solver = BrentOpt::new(lo, hi).set_tolerance(f64::EPSILON.sqrt(), tolerance);

    let result = Executor::new(ScalarCost { f: cost }, solver)
        .configure(|state| state.max_iters(100))
        .run()
        .map_err(|e| FitError::LineSearch(e.to_string()))?;

    result
        .state()
        .get_best_param()
        .copied()
        .ok_or_else(|| FitError::LineSearch("solver produced no parameter".to_string()))
}
