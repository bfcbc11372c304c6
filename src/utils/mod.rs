//! Shared matrix helpers and seeded randomness.

mod matrix;
mod random;

pub use matrix::{
    center_rows, column_means, population_covariance, qr_inverse, quadratic_form, QrInverse,
};
pub use random::{standard_normal_mat, subsample_indices};
