//! Signal reconstruction from kept sources.
//!
//! 1. keep the sources whose predicted label equals `keep_label`;
//! 2. back-project with every other source zeroed;
//! 3. z-score each channel over time.
//!
//! Nothing is returned when no source qualifies; callers therefore never
//! persist a signal made of the mean alone.
use log::info;
use ndarray::Array2;

use crate::classify::{indices_with_label, Label, SourceLabel};
use crate::config::VariancePolicy;
use crate::error::{Error, Result};
use crate::ica::{reconstruct_excluding, Decomposition};
use crate::normalize::zscore_channels;

/// Cleaned `[T, C]` signal plus the source indices it was built from.
#[derive(Debug, Clone)]
pub struct Cleaned {
    pub signal: Array2<f64>,
    pub kept: Vec<usize>,
}

/// Rebuild the signal from sources labelled `keep_label`, then z-score it.
pub fn clean(
    decomp: &Decomposition,
    labels: &[SourceLabel],
    keep_label: Label,
    policy: VariancePolicy,
) -> Result<Cleaned> {
    let k = decomp.n_components();
    if labels.len() != k {
        return Err(Error::InvalidData(format!("{} labels for {k} sources", labels.len())));
    }
    let kept = indices_with_label(labels, keep_label);
    if kept.is_empty() {
        return Err(Error::NoNeuralSources(keep_label.to_string()));
    }
    let excluded: Vec<usize> = (0..k).filter(|j| !kept.contains(j)).collect();
    info!("Keeping {} of {k} sources ({keep_label}), excluding {excluded:?}", kept.len());

    let rebuilt = reconstruct_excluding(decomp, &excluded);
    let signal = zscore_channels(&rebuilt, policy)?;
    Ok(Cleaned { signal, kept })
}

/// `[T, k_kept]` activations of the kept sources, in source order.
pub fn kept_sources(decomp: &Decomposition, kept: &[usize]) -> Array2<f64> {
    let n_t = decomp.sources.nrows();
    let mut out = Array2::<f64>::zeros((n_t, kept.len()));
    for (dst, &j) in kept.iter().enumerate() {
        out.column_mut(dst).assign(&decomp.sources.column(j));
    }
    out
}
