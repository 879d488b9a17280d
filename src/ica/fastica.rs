//! Parallel FastICA with the logcosh contrast.
//!
//! The fixed-point fit is `linfa-ica`'s `FastIca` (centring, PCA whitening
//! to `k` components, `W ← symdecorr(E[g(WX)Xᵀ] − diag(E[g'(WX)]) W)` from a
//! seeded start).  Around it:
//!
//! 1. the requested `k` is checked against the numerical rank of the data;
//! 2. sources are scaled to unit variance;
//! 3. one further fixed-point step is taken at the solution; if it still
//!    moves the unmixing by `tol` or more the fit hit the iteration cap and
//!    is reported as a convergence error, never returned;
//! 4. mixing `A = XᵀS (SᵀS)⁻¹` and the minimum-norm unmixing `W` with
//!    `X Wᵀ = S` are solved from the data, so `S Aᵀ + mean` reproduces the
//!    input whenever `k` equals its rank.
use linfa::prelude::*;
use linfa_ica::fast_ica::FastIca;
use log::{debug, info};
use ndarray::{Array1, Array2, Axis};

use super::linalg::{numerical_rank, psd_pinv, psd_pinv_from, sym_decorrelation, symmetric_eigen};
use crate::error::{Error, Result};

/// FastICA settings.
#[derive(Debug, Clone)]
pub struct IcaParams {
    /// Number of sources; `None` uses one per channel.
    pub n_components: Option<usize>,
    pub seed: u64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for IcaParams {
    fn default() -> Self {
        Self { n_components: None, seed: 42, max_iter: 1000, tol: 1e-4 }
    }
}

/// Result of [`decompose`].  Never mutated; exclusion builds new signals.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    /// `[T, k]` unit-variance source activations.
    pub sources: Array2<f64>,
    /// `[C, k]` mixing matrix: channel `c` ≈ Σ_j sources[:, j] · mixing[c, j].
    pub mixing: Array2<f64>,
    /// `[k, C]` unmixing matrix applied to centred data.
    pub unmixing: Array2<f64>,
    /// `[C]` channel means removed before fitting.
    pub mean: Array1<f64>,
    /// Change a further fixed-point step makes at the solution (`< tol`).
    pub last_change: f64,
}

impl Decomposition {
    pub fn n_components(&self) -> usize {
        self.sources.ncols()
    }

    pub fn n_channels(&self) -> usize {
        self.mixing.nrows()
    }

    /// Back-project all sources: `sources · mixingᵀ + mean`.
    pub fn reconstruct(&self) -> Array2<f64> {
        reconstruct(&self.sources, &self.mixing, &self.mean)
    }

    /// Unmix new data of the same channel layout into source space.
    pub fn transform(&self, signal: &Array2<f64>) -> Array2<f64> {
        (signal - &self.mean).dot(&self.unmixing.t())
    }
}

/// `sources · mixingᵀ + mean`; the adjoint of [`decompose`].
pub fn reconstruct(sources: &Array2<f64>, mixing: &Array2<f64>, mean: &Array1<f64>) -> Array2<f64> {
    sources.dot(&mixing.t()) + mean
}

/// Back-project with the sources in `excluded` zeroed.
///
/// Indices outside `0..k` are ignored.  The decomposition is not touched.
pub fn reconstruct_excluding(decomp: &Decomposition, excluded: &[usize]) -> Array2<f64> {
    let mut sources = decomp.sources.clone();
    for &j in excluded {
        if j < sources.ncols() {
            sources.column_mut(j).fill(0.0);
        }
    }
    reconstruct(&sources, &decomp.mixing, &decomp.mean)
}

/// Estimate the numerical rank of `signal` (`[T, C]`).
pub fn estimate_rank(signal: &Array2<f64>) -> Result<usize> {
    let (n_t, _) = signal.dim();
    if n_t == 0 {
        return Ok(0);
    }
    let (vals, _) = symmetric_eigen(&covariance(&center(signal).0))?;
    Ok(numerical_rank(&vals, n_t))
}

/// Decompose `signal` (`[T, C]`) into `k` independent sources.
pub fn decompose(signal: &Array2<f64>, params: &IcaParams) -> Result<Decomposition> {
    let (n_t, n_ch) = signal.dim();
    let k = params.n_components.unwrap_or(n_ch);
    if k == 0 || k > n_ch {
        return Err(Error::InvalidParameter(format!(
            "n_components = {k} must be in 1..={n_ch}"
        )));
    }
    if n_t <= k {
        return Err(Error::InvalidParameter(format!(
            "{n_t} samples is too few to estimate {k} components"
        )));
    }
    if !(params.tol > 0.0) || params.max_iter == 0 {
        return Err(Error::InvalidParameter("tol must be > 0 and max_iter >= 1".into()));
    }

    // 1. Centre and check the rank.
    let (xc, mean) = center(signal);
    let (eigvals, eigvecs) = symmetric_eigen(&covariance(&xc))?;
    let rank = numerical_rank(&eigvals, n_t);
    if rank < k {
        return Err(Error::InvalidParameter(format!(
            "data rank {rank} is below the {k} requested components"
        )));
    }

    // 2. Fit.
    let model = FastIca::<f64>::params()
        .ncomponents(k)
        .max_iter(params.max_iter)
        .tol(params.tol)
        .random_state(params.seed as usize)
        .fit(&DatasetBase::from(xc.clone()))
        .map_err(|e| Error::Ica(e.to_string()))?;
    let raw: Array2<f64> = model.predict(&xc);

    // 3. Unit variance.
    let scale = raw.map_axis(Axis(0), |c| (c.iter().map(|v| v * v).sum::<f64>() / n_t as f64).sqrt());
    if let Some(j) = scale.iter().position(|&s| !(s > f64::EPSILON)) {
        return Err(Error::Ica(format!("source {j} is identically zero")));
    }
    let sources = raw / &scale;

    // 4. Convergence.
    let last_change = fixed_point_change(&sources)?;
    if !(last_change < params.tol) {
        return Err(Error::Convergence { iterations: params.max_iter, last_change, tol: params.tol });
    }
    info!("FastICA: {k} components converged (final change {last_change:.3e})");

    // 5. Mixing / unmixing.
    let cross = xc.t().dot(&sources) / n_t as f64; // [C, k]
    let gram = sources.t().dot(&sources) / n_t as f64; // [k, k]
    let mixing = cross.dot(&psd_pinv(&gram)?);
    let unmixing = psd_pinv_from(&eigvals, &eigvecs, rank).dot(&cross).t().to_owned();

    Ok(Decomposition { sources, mixing, unmixing, mean, last_change })
}

/// `max |1 − |diag(W₁)||` for one logcosh fixed-point step taken from the
/// identity in the space of unit-variance `sources`.
fn fixed_point_change(sources: &Array2<f64>) -> Result<f64> {
    let n_t = sources.nrows() as f64;
    let g = sources.mapv(f64::tanh);
    let g_prime = g.map_axis(Axis(0), |c| c.iter().map(|v| 1.0 - v * v).sum::<f64>() / n_t);
    let mut target = g.t().dot(sources) / n_t;
    for (i, mut row) in target.rows_mut().into_iter().enumerate() {
        row[i] -= g_prime[i];
    }
    let w1 = sym_decorrelation(&target)?;
    let change = w1.diag().iter().map(|d| (d.abs() - 1.0).abs()).fold(0.0, f64::max);
    debug!("FastICA fixed-point change at solution: {change:.3e}");
    Ok(change)
}

/// Subtract per-channel means; returns `(centred, means)`.
fn center(signal: &Array2<f64>) -> (Array2<f64>, Array1<f64>) {
    let mean = signal
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(signal.ncols()));
    (signal - &mean, mean)
}

/// `XᵀX / T` of centred `[T, C]` data.
fn covariance(xc: &Array2<f64>) -> Array2<f64> {
    xc.t().dot(xc) / xc.nrows() as f64
}
