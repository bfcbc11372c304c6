//! Shared data generators for the solver tests.
//!
//! Everything here is seeded so failures reproduce exactly.

use faer::Mat;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

/// Sample `n` points from an axis-aligned 2-D Gaussian.
pub fn sample_diagonal_gaussian(
    rng: &mut StdRng,
    mean: [f64; 2],
    variances: [f64; 2],
    n: usize,
) -> Mat<f64> {
    let sd = [variances[0].sqrt(), variances[1].sqrt()];
    let mut data = Mat::zeros(n, 2);
    for i in 0..n {
        for j in 0..2 {
            let z: f64 = rng.sample(StandardNormal);
            data[(i, j)] = mean[j] + sd[j] * z;
        }
    }
    data
}

/// Stack two datasets with the same column count vertically.
pub fn vstack(a: &Mat<f64>, b: &Mat<f64>) -> Mat<f64> {
    assert_eq!(a.ncols(), b.ncols());
    Mat::from_fn(a.nrows() + b.nrows(), a.ncols(), |i, j| {
        if i < a.nrows() {
            a[(i, j)]
        } else {
            b[(i - a.nrows(), j)]
        }
    })
}

/// Euclidean distance between a 2-D point and a target.
pub fn distance(point: [f64; 2], target: [f64; 2]) -> f64 {
    let dx = point[0] - target[0];
    let dy = point[1] - target[1];
    (dx * dx + dy * dy).sqrt()
}
