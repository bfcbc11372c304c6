//! Factor analyzer fitting tests.

use emfit::core::GaussianDensity;
use emfit::solvers::{Estimator, FactorAnalyzer, FitError};
use faer::Mat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Sample points from a single-factor model x = w·z + ε with isotropic noise.
fn sample_single_factor(rng: &mut StdRng, weights: &[f64], noise_sd: f64, n: usize) -> Mat<f64> {
    let d = weights.len();
    let mut data = Mat::zeros(n, d);
    for i in 0..n {
        let z: f64 = rng.sample(StandardNormal);
        for j in 0..d {
            let eps: f64 = rng.sample(StandardNormal);
            data[(i, j)] = weights[j] * z + noise_sd * eps;
        }
    }
    data
}

const LOADING: [f64; 4] = [1.0, -0.5, 0.8, 0.3];

// ============================================================================
// Fixed-Iteration Schedule
// ============================================================================

#[test]
fn test_fixed_iterations_runs_exactly_that_many() {
    let mut rng = StdRng::seed_from_u64(0);
    let data = sample_single_factor(&mut rng, &LOADING, 0.3, 200);

    let fitted = FactorAnalyzer::builder()
        .n_factors(1)
        .fixed_iterations(5)
        .seed(0)
        .build()
        .fit(&data)
        .expect("fit should succeed");

    // The fixed schedule never evaluates the subsampled log-likelihood.
    assert_eq!(fitted.summary.iterations, 5);
    assert!(!fitted.summary.converged);
    assert!(fitted.summary.log_likelihood.is_none());
}

#[test]
fn test_log_likelihood_is_non_decreasing_across_sweeps() {
    let mut rng = StdRng::seed_from_u64(1);
    let data = sample_single_factor(&mut rng, &LOADING, 0.3, 250);

    let full_data_ll = |iterations: usize| {
        let fitted = FactorAnalyzer::builder()
            .n_factors(1)
            .fixed_iterations(iterations)
            .seed(0)
            .build()
            .fit(&data)
            .expect("fit should succeed");
        let density =
            GaussianDensity::new_allow_singular(fitted.mean.clone(), &fitted.full_covariance(), 1e-10);
        (0..data.nrows()).map(|i| density.log_density_at(&data, i)).sum::<f64>()
    };

    // Same seed, so longer runs replay the shorter ones before continuing.
    let ll1 = full_data_ll(1);
    let ll3 = full_data_ll(3);
    let ll6 = full_data_ll(6);
    assert!(ll3 >= ll1 - 1e-6, "ll after 3 sweeps {ll3} < after 1 {ll1}");
    assert!(ll6 >= ll3 - 1e-6, "ll after 6 sweeps {ll6} < after 3 {ll3}");
}

// ============================================================================
// Convergence-Checked Mode
// ============================================================================

#[test]
fn test_recovers_single_factor_structure() {
    let mut rng = StdRng::seed_from_u64(2);
    let data = sample_single_factor(&mut rng, &LOADING, 0.3, 400);

    let fitted = FactorAnalyzer::builder()
        .n_factors(1)
        .subsample_size(25)
        .tolerance(1e-2)
        .seed(0)
        .build()
        .fit(&data)
        .expect("fit should succeed");

    assert!(fitted.summary.converged);
    assert!(fitted.summary.log_likelihood.is_some());
    assert_eq!(fitted.loadings.nrows(), 4);
    assert_eq!(fitted.loadings.ncols(), 1);

    // The fitted loading column should align with the generating weights up
    // to sign.
    let mut dot = 0.0;
    let mut phi_norm = 0.0;
    let mut w_norm = 0.0;
    for j in 0..4 {
        dot += fitted.loadings[(j, 0)] * LOADING[j];
        phi_norm += fitted.loadings[(j, 0)] * fitted.loadings[(j, 0)];
        w_norm += LOADING[j] * LOADING[j];
    }
    let cosine = dot.abs() / (phi_norm.sqrt() * w_norm.sqrt());
    assert!(cosine > 0.7, "loading direction off, |cos| = {cosine}");

    // Noise variances are positive.
    for j in 0..4 {
        assert!(fitted.noise.variances()[j] > 0.0);
    }
}

#[test]
fn test_noise_covariance_is_exactly_diagonal() {
    let mut rng = StdRng::seed_from_u64(3);
    let data = sample_single_factor(&mut rng, &LOADING, 0.5, 150);

    let fitted = FactorAnalyzer::builder()
        .n_factors(2)
        .fixed_iterations(4)
        .seed(0)
        .build()
        .fit(&data)
        .expect("fit should succeed");

    let dense = fitted.noise.to_dense();
    for a in 0..4 {
        for b in 0..4 {
            if a != b {
                assert_eq!(dense[(a, b)], 0.0);
            }
        }
    }
}

#[test]
fn test_oversized_subsample_uses_all_points() {
    let mut rng = StdRng::seed_from_u64(4);
    let data = sample_single_factor(&mut rng, &LOADING, 0.3, 60);

    // More subsample than observations degrades to the full dataset.
    let fitted = FactorAnalyzer::builder()
        .n_factors(1)
        .subsample_size(10_000)
        .tolerance(1e-2)
        .seed(0)
        .build()
        .fit(&data)
        .expect("fit should succeed");
    assert!(fitted.summary.converged);
}

// ============================================================================
// Determinism and Validation
// ============================================================================

#[test]
fn test_refit_is_bit_identical() {
    let mut rng = StdRng::seed_from_u64(5);
    let data = sample_single_factor(&mut rng, &LOADING, 0.3, 180);

    let build = || {
        FactorAnalyzer::builder()
            .n_factors(1)
            .fixed_iterations(8)
            .seed(9)
            .build()
            .fit(&data)
            .expect("fit should succeed")
    };
    let first = build();
    let second = build();

    for j in 0..4 {
        assert_eq!(first.mean[j], second.mean[j]);
        assert_eq!(first.loadings[(j, 0)], second.loadings[(j, 0)]);
        assert_eq!(first.noise.variances()[j], second.noise.variances()[j]);
    }
}

#[test]
fn test_zero_factors_is_invalid() {
    let data = Mat::<f64>::zeros(10, 4);
    let err = FactorAnalyzer::new(0).fit(&data).unwrap_err();
    assert!(matches!(err, FitError::InvalidOptions(_)));
}

#[test]
fn test_zero_fixed_iterations_is_invalid() {
    let mut rng = StdRng::seed_from_u64(6);
    let data = sample_single_factor(&mut rng, &LOADING, 0.3, 50);
    let err = FactorAnalyzer::builder()
        .n_factors(1)
        .fixed_iterations(0)
        .build()
        .fit(&data)
        .unwrap_err();
    assert!(matches!(err, FitError::InvalidOptions(_)));
}
