//! Per-channel z-score normalisation.
//!
//! `zscore_channels` standardises a cleaned `[T, C]` signal over time:
//!   for each channel c:  x[:, c] = (x[:, c] - mean(x[:, c])) / std(x[:, c])
//! with the population std (ddof = 0).
//!
//! [`ChannelStats`] carries frozen per-channel means/stds (training-set
//! statistics of a windowed dataset) and applies them to `[C, T]` segments.
//!
//! Standard deviations below [`STD_EPSILON`] are degenerate: under
//! [`VariancePolicy::Floor`] they are raised to the epsilon with a warning,
//! under [`VariancePolicy::Fail`] they are an error.
use log::warn;
use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::config::{VariancePolicy, STD_EPSILON};
use crate::error::{Error, Result};

/// Frozen per-channel statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStats {
    pub means: Array1<f64>,
    pub stds: Array1<f64>,
}

impl ChannelStats {
    /// Mean 0 / std 1 for `n_channels`: normalisation becomes a no-op.
    pub fn identity(n_channels: usize) -> Self {
        Self { means: Array1::zeros(n_channels), stds: Array1::ones(n_channels) }
    }

    /// Statistics pooled over every sample of every `[C, T]` segment.
    ///
    /// No segments gives [`identity`](Self::identity).  Stds are floored at
    /// [`STD_EPSILON`].
    pub fn from_segments(segments: &[ArrayView2<f64>], n_channels: usize) -> Result<Self> {
        if let Some(s) = segments.iter().find(|s| s.nrows() != n_channels) {
            return Err(Error::InvalidData(format!(
                "segment has {} channels, expected {n_channels}",
                s.nrows()
            )));
        }
        let count: usize = segments.iter().map(|s| s.ncols()).sum();
        if count == 0 {
            return Ok(Self::identity(n_channels));
        }
        let n = count as f64;

        let mut means = Array1::<f64>::zeros(n_channels);
        for s in segments {
            means += &s.sum_axis(Axis(1));
        }
        means /= n;

        let mut vars = Array1::<f64>::zeros(n_channels);
        for s in segments {
            for (c, row) in s.outer_iter().enumerate() {
                vars[c] += row.iter().map(|v| (v - means[c]).powi(2)).sum::<f64>();
            }
        }
        let stds = vars.mapv(|v| (v / n).sqrt().max(STD_EPSILON));
        Ok(Self { means, stds })
    }

    pub fn n_channels(&self) -> usize {
        self.means.len()
    }

    /// `(x - mean) / std` per row of a `[C, T]` segment.
    pub fn normalize(&self, segment: &Array2<f64>) -> Array2<f64> {
        let mut out = segment.clone();
        for (c, mut row) in out.outer_iter_mut().enumerate() {
            let (m, s) = (self.means[c], self.stds[c]);
            row.mapv_inplace(|v| (v - m) / s);
        }
        out
    }

    /// Inverse of [`normalize`](Self::normalize).
    pub fn denormalize(&self, segment: &Array2<f64>) -> Array2<f64> {
        let mut out = segment.clone();
        for (c, mut row) in out.outer_iter_mut().enumerate() {
            let (m, s) = (self.means[c], self.stds[c]);
            row.mapv_inplace(|v| v * s + m);
        }
        out
    }
}

/// Z-score every column of a `[T, C]` signal over time.
pub fn zscore_channels(signal: &Array2<f64>, policy: VariancePolicy) -> Result<Array2<f64>> {
    let n_t = signal.nrows();
    if n_t == 0 {
        return Ok(signal.clone());
    }
    let mut out = signal.clone();
    for (c, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
        let mean = col.sum() / n_t as f64;
        let std = (col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n_t as f64).sqrt();
        let std = if std < STD_EPSILON {
            match policy {
                VariancePolicy::Fail => return Err(Error::DegenerateChannel(c.to_string())),
                VariancePolicy::Floor => {
                    warn!("channel {c}: std {std:.3e} floored to {STD_EPSILON:e}");
                    STD_EPSILON
                }
            }
        } else {
            std
        };
        col.mapv_inplace(|v| (v - mean) / std);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zscore_mean_zero_std_one_per_channel() {
        let data = Array2::from_shape_fn((512, 4), |(t, c)| {
            (c as f64 * 3.7 + t as f64 * 0.1).sin() * 50.0 + c as f64 * 10.0
        });
        let z = zscore_channels(&data, VariancePolicy::Floor).unwrap();
        for col in z.columns() {
            let n = col.len() as f64;
            let mean = col.sum() / n;
            let std = (col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
            approx::assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-10);
            approx::assert_abs_diff_eq!(std, 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn constant_channel_floored_or_rejected() {
        let mut data = Array2::from_shape_fn((128, 2), |(t, _)| (t as f64 * 0.3).sin());
        data.column_mut(1).fill(7.0);

        let z = zscore_channels(&data, VariancePolicy::Floor).unwrap();
        assert!(z.column(1).iter().all(|v| v.abs() < 1e-9));

        assert!(matches!(
            zscore_channels(&data, VariancePolicy::Fail),
            Err(Error::DegenerateChannel(_))
        ));
    }

    #[test]
    fn stats_pool_all_segments() {
        let a = Array2::from_shape_vec((2, 2), vec![0.0, 2.0, 10.0, 10.0]).unwrap();
        let b = Array2::from_shape_vec((2, 2), vec![4.0, 6.0, 10.0, 10.0]).unwrap();
        let stats = ChannelStats::from_segments(&[a.view(), b.view()], 2).unwrap();
        approx::assert_abs_diff_eq!(stats.means[0], 3.0);
        approx::assert_abs_diff_eq!(stats.stds[0], 5.0_f64.sqrt());
        approx::assert_abs_diff_eq!(stats.means[1], 10.0);
        approx::assert_abs_diff_eq!(stats.stds[1], STD_EPSILON);
    }

    #[test]
    fn no_segments_is_identity() {
        let stats = ChannelStats::from_segments(&[], 3).unwrap();
        assert_eq!(stats, ChannelStats::identity(3));
    }

    #[test]
    fn denormalize_inverts_normalize() {
        let stats = ChannelStats {
            means: Array1::from(vec![1.5, -2.0]),
            stds: Array1::from(vec![0.5, 3.0]),
        };
        let x = Array2::from_shape_fn((2, 16), |(c, t)| (t as f64 - c as f64).cos() * 4.0);
        let y = stats.denormalize(&stats.normalize(&x));
        for (a, b) in x.iter().zip(y.iter()) {
            approx::assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }
}
