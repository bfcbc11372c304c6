//! Seeded random draws for reproducible initialization.
//!
//! Every fitter that needs randomness constructs its own `StdRng` from an
//! explicit seed, so concurrent fits never share RNG state and a fixed seed
//! reproduces parameters bit for bit.

use faer::Mat;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

/// Draw a matrix of independent standard-normal entries, row-major order.
pub fn standard_normal_mat(rng: &mut StdRng, n_rows: usize, n_cols: usize) -> Mat<f64> {
    let mut mat = Mat::zeros(n_rows, n_cols);
    for i in 0..n_rows {
        for j in 0..n_cols {
            mat[(i, j)] = rng.sample(StandardNormal);
        }
    }
    mat
}

/// Sample `amount` distinct indices from `0..population` without replacement.
///
/// The amount is clamped to the population size, so asking for more indices
/// than there are observations degrades to using all of them.
pub fn subsample_indices(rng: &mut StdRng, population: usize, amount: usize) -> Vec<usize> {
    let amount = amount.min(population);
    rand::seq::index::sample(rng, population, amount).into_vec()
}
