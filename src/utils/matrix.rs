//! Matrix utility functions shared by the EM solvers.

use faer::{Col, Mat};

/// Per-column means of a data matrix (the sample mean vector).
pub fn column_means(x: &Mat<f64>) -> Col<f64> {
    let n_rows = x.nrows();
    let n_cols = x.ncols();

    let mut means = Col::zeros(n_cols);
    if n_rows == 0 {
        return means;
    }

    for j in 0..n_cols {
        let sum: f64 = (0..n_rows).map(|i| x[(i, j)]).sum();
        means[j] = sum / n_rows as f64;
    }

    means
}

/// Subtract a row vector from every row of a data matrix.
pub fn center_rows(x: &Mat<f64>, mean: &Col<f64>) -> Mat<f64> {
    Mat::from_fn(x.nrows(), x.ncols(), |i, j| x[(i, j)] - mean[j])
}

/// Population covariance of pre-centered data (divisor I, not I-1).
///
/// Built as an accumulated scatter of row outer products, so the result is
/// symmetric by construction.
pub fn population_covariance(centered: &Mat<f64>) -> Mat<f64> {
    let n_rows = centered.nrows();
    let n_cols = centered.ncols();

    let mut cov: Mat<f64> = Mat::zeros(n_cols, n_cols);
    for i in 0..n_rows {
        for j in 0..n_cols {
            for k in 0..n_cols {
                cov[(j, k)] += centered[(i, j)] * centered[(i, k)];
            }
        }
    }

    let scale = 1.0 / n_rows as f64;
    for j in 0..n_cols {
        for k in 0..n_cols {
            cov[(j, k)] *= scale;
        }
    }

    cov
}

/// Quadratic form cᵗ M c.
pub fn quadratic_form(m: &Mat<f64>, c: &Col<f64>) -> f64 {
    let n = c.nrows();
    let mut total = 0.0;
    for j in 0..n {
        let mut row = 0.0;
        for k in 0..n {
            row += m[(j, k)] * c[k];
        }
        total += c[j] * row;
    }
    total
}

/// Inverse of a square matrix computed from a column-pivoted QR decomposition,
/// together with the rank and log |det| read off the R diagonal.
#[derive(Debug, Clone)]
pub struct QrInverse {
    /// The (pseudo-)inverse. Directions below the rank tolerance contribute
    /// zero, matching a truncated back-substitution.
    pub inverse: Mat<f64>,
    /// Sum of log |R_ii| over the retained diagonal entries. Since Q and the
    /// permutation have unit |det|, this is log |det| for full-rank input and
    /// the log pseudo-determinant otherwise.
    pub log_abs_det: f64,
    /// Number of diagonal entries of R above the rank tolerance.
    pub rank: usize,
}

/// Factor a square matrix by column-pivoted QR and invert it by
/// back-substitution, truncating diagonal entries below `rank_tolerance`.
///
/// Callers that require a true inverse must check `rank` against the matrix
/// dimension; the truncated result is only meaningful as a pseudo-inverse.
pub fn qr_inverse(m: &Mat<f64>, rank_tolerance: f64) -> QrInverse {
    let n = m.nrows();
    debug_assert_eq!(n, m.ncols());

    let qr = m.col_piv_qr();
    let q = qr.compute_Q();
    let r = qr.R().to_owned();
    let perm = qr.P();

    let mut rank = 0;
    let mut log_abs_det = 0.0;
    for i in 0..n {
        let d = r[(i, i)].abs();
        if d > rank_tolerance {
            rank += 1;
            log_abs_det += d.ln();
        }
    }

    let mut inverse: Mat<f64> = Mat::zeros(n, n);
    for col in 0..n {
        let mut e = Col::zeros(n);
        e[col] = 1.0;
        let qte = q.transpose() * e;

        let mut sol_perm = Col::zeros(n);
        for i in (0..n).rev() {
            let mut sum = qte[i];
            for j in (i + 1)..n {
                sum -= r[(i, j)] * sol_perm[j];
            }
            if r[(i, i)].abs() > rank_tolerance {
                sol_perm[i] = sum / r[(i, i)];
            } else {
                sol_perm[i] = 0.0;
            }
        }

        for i in 0..n {
            inverse[(perm.inverse().arrays().0[i], col)] = sol_perm[i];
        }
    }

    QrInverse {
        inverse,
        log_abs_det,
        rank,
    }
}
