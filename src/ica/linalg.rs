//! Symmetric-matrix helpers on top of `linfa-linalg`.
//!
//! Everything here works on `C × C` covariances or `k × k` Gram matrices.
use linfa_linalg::eigh::Eigh;
use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

/// Eigen-decomposition of a symmetric matrix, sorted by descending
/// eigenvalue; eigenvector `i` is column `i`.
pub fn symmetric_eigen(a: &Array2<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
    let (vals, vecs) = a.eigh().map_err(|e| Error::Linalg(e.to_string()))?;
    let mut order: Vec<usize> = (0..vals.len()).collect();
    order.sort_by(|&i, &j| vals[j].total_cmp(&vals[i]));
    let values = Array1::from_iter(order.iter().map(|&i| vals[i]));
    let vectors = Array2::from_shape_fn(vecs.raw_dim(), |(r, c)| vecs[[r, order[c]]]);
    Ok((values, vectors))
}

/// Symmetric decorrelation `W ← (W Wᵀ)^{-1/2} W`.
pub fn sym_decorrelation(w: &Array2<f64>) -> Result<Array2<f64>> {
    let (s, u) = symmetric_eigen(&w.dot(&w.t()))?;
    // Round-off can push tiny eigenvalues negative.
    let inv_sqrt = s.mapv(|x| 1.0 / x.max(f64::MIN_POSITIVE).sqrt());
    Ok((&u * &inv_sqrt).dot(&u.t()).dot(w))
}

/// Pseudo-inverse `V_r diag(1/λ) V_rᵀ` of a symmetric positive
/// semi-definite matrix from its sorted eigen-decomposition, keeping the
/// leading `rank` pairs.
pub fn psd_pinv_from(vals: &Array1<f64>, vecs: &Array2<f64>, rank: usize) -> Array2<f64> {
    let n = vecs.nrows();
    let mut out = Array2::<f64>::zeros((n, n));
    for i in 0..rank.min(vals.len()) {
        let v = vecs.column(i);
        let inv = 1.0 / vals[i];
        for r in 0..n {
            out.row_mut(r).scaled_add(inv * v[r], &v);
        }
    }
    out
}

/// [`psd_pinv_from`] dropping eigenvalues below `1e-12 · λ_max`.
pub fn psd_pinv(a: &Array2<f64>) -> Result<Array2<f64>> {
    let (vals, vecs) = symmetric_eigen(a)?;
    let cutoff = vals.iter().cloned().fold(0.0, f64::max) * 1e-12;
    let rank = vals.iter().filter(|&&l| l > cutoff).count();
    Ok(psd_pinv_from(&vals, &vecs, rank))
}

/// Numerical rank of `[T, C]` data from its column covariance eigenvalues.
///
/// Eigenvalues at or below `λ_max · max(T, C) · ε` count as zero.  The
/// covariance squares the condition number, so the tolerance is applied to
/// eigenvalues rather than singular values; round-off on a rank-deficient
/// covariance (e.g. after average referencing) stays far below it.
pub fn numerical_rank(cov_eigenvalues: &Array1<f64>, n_samples: usize) -> usize {
    let n_ch = cov_eigenvalues.len();
    let lmax = cov_eigenvalues.iter().cloned().fold(0.0, f64::max);
    let tol = lmax * n_samples.max(n_ch) as f64 * f64::EPSILON;
    cov_eigenvalues.iter().filter(|&&l| l > tol).count()
}
