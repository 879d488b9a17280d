//! Forecasting models consuming windowed datasets.
//!
//! A [`Forecaster`] maps a normalised `[C, past_len]` window to a
//! `[C, horizon]` prediction.  Two are provided:
//!
//! - [`PersistenceForecaster`]: repeats the last observed sample; the
//!   baseline any learned model has to beat.
//! - [`WaveNetForecaster`]: a stack of gated, dilated causal convolutions
//!   with residual and skip paths, predicting one step ahead and rolled out
//!   autoregressively.  Weights are drawn from a seeded `StdRng` with the
//!   `U(-1/√fan_in, 1/√fan_in)` initialisation of a fresh `Conv1d`; training
//!   happens elsewhere.
//!
//! [`evaluate_mse`] scores a forecaster over one split of a dataset.
use log::info;
use ndarray::{s, Array1, Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dataset::{Split, WindowedDataset};
use crate::error::{Error, Result};

/// Predicts the continuation of a `[C, T]` window.
pub trait Forecaster {
    fn forecast(&self, past: &Array2<f64>, horizon: usize) -> Result<Array2<f64>>;
}

/// Repeats the last sample of every channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistenceForecaster;

impl Forecaster for PersistenceForecaster {
    fn forecast(&self, past: &Array2<f64>, horizon: usize) -> Result<Array2<f64>> {
        let n_t = past.ncols();
        if n_t == 0 {
            return Err(Error::InvalidParameter("cannot forecast from an empty window".into()));
        }
        let last = past.column(n_t - 1);
        let mut out = Array2::<f64>::zeros((past.nrows(), horizon));
        for mut col in out.columns_mut() {
            col.assign(&last);
        }
        Ok(out)
    }
}

// ── Causal convolution ──────────────────────────────────────────────────────

/// 1-D convolution over `[C, T]` with left-only (causal) zero padding.
#[derive(Debug, Clone)]
struct CausalConv1d {
    /// `[out, in, kernel]`
    weight: Array3<f64>,
    bias: Array1<f64>,
    dilation: usize,
}

impl CausalConv1d {
    fn new(in_ch: usize, out_ch: usize, kernel: usize, dilation: usize, rng: &mut StdRng) -> Self {
        let bound = 1.0 / ((in_ch * kernel) as f64).sqrt();
        let weight = Array3::from_shape_simple_fn((out_ch, in_ch, kernel), || rng.gen_range(-bound..bound));
        let bias = Array1::from_shape_simple_fn(out_ch, || rng.gen_range(-bound..bound));
        Self { weight, bias, dilation }
    }

    /// `y[:, t] = b + Σ_j W[:, :, j] · x[:, t - (k-1-j)·d]`, zero before 0.
    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        let n_t = x.ncols();
        let k = self.weight.shape()[2];
        let mut y = Array2::<f64>::zeros((self.weight.shape()[0], n_t));
        for j in 0..k {
            let shift = (k - 1 - j) * self.dilation;
            if shift >= n_t {
                continue;
            }
            let w = self.weight.index_axis(Axis(2), j);
            let contrib = w.dot(&x.slice(s![.., ..n_t - shift]));
            let mut dst = y.slice_mut(s![.., shift..]);
            dst += &contrib;
        }
        y + &self.bias.view().insert_axis(Axis(1))
    }
}

// ── WaveNet ─────────────────────────────────────────────────────────────────

/// Shape of a [`WaveNetForecaster`].
#[derive(Debug, Clone)]
pub struct WaveNetConfig {
    pub in_channels: usize,
    pub residual_channels: usize,
    pub skip_channels: usize,
    pub kernel_size: usize,
    /// Dilations are `1, 2, 4, …, 2^(num_layers-1)`.
    pub num_layers: usize,
    pub seed: u64,
}

impl Default for WaveNetConfig {
    fn default() -> Self {
        Self {
            in_channels: 14,
            residual_channels: 32,
            skip_channels: 64,
            kernel_size: 2,
            num_layers: 8,
            seed: 0,
        }
    }
}

struct Layer {
    filter: CausalConv1d,
    gate: CausalConv1d,
    residual: CausalConv1d,
    skip: CausalConv1d,
}

/// Gated dilated causal convolution stack.
pub struct WaveNetForecaster {
    config: WaveNetConfig,
    input: CausalConv1d,
    layers: Vec<Layer>,
    output1: CausalConv1d,
    output2: CausalConv1d,
}

impl WaveNetForecaster {
    pub fn new(config: WaveNetConfig) -> Result<Self> {
        let WaveNetConfig { in_channels, residual_channels: r, skip_channels: sk, kernel_size: k, .. } = config;
        if in_channels == 0 || r == 0 || sk == 0 || k == 0 || config.num_layers == 0 {
            return Err(Error::InvalidParameter(format!("degenerate WaveNet shape {config:?}")));
        }
        let mut rng = StdRng::seed_from_u64(config.seed);
        let input = CausalConv1d::new(in_channels, r, 1, 1, &mut rng);
        let layers = (0..config.num_layers)
            .map(|i| {
                let dilation = 1 << i;
                Layer {
                    filter: CausalConv1d::new(r, r, k, dilation, &mut rng),
                    gate: CausalConv1d::new(r, r, k, dilation, &mut rng),
                    residual: CausalConv1d::new(r, r, 1, 1, &mut rng),
                    skip: CausalConv1d::new(r, sk, 1, 1, &mut rng),
                }
            })
            .collect();
        let output1 = CausalConv1d::new(sk, sk, 1, 1, &mut rng);
        let output2 = CausalConv1d::new(sk, in_channels, 1, 1, &mut rng);
        Ok(Self { config, input, layers, output1, output2 })
    }

    pub fn config(&self) -> &WaveNetConfig {
        &self.config
    }

    /// Samples of history that can influence one output sample.
    pub fn receptive_field(&self) -> usize {
        (self.config.kernel_size - 1) * ((1 << self.config.num_layers) - 1) + 1
    }

    /// `[C, T] → [C, T]`; output `t` is the one-step prediction after input `t`.
    pub fn forward(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.nrows() != self.config.in_channels {
            return Err(Error::InvalidData(format!(
                "WaveNet expects {} channels, got {}",
                self.config.in_channels,
                x.nrows()
            )));
        }
        let mut h = self.input.forward(x);
        let mut skip = Array2::<f64>::zeros((self.config.skip_channels, x.ncols()));
        for layer in &self.layers {
            let filt = layer.filter.forward(&h).mapv(f64::tanh);
            let gate = layer.gate.forward(&h).mapv(sigmoid);
            let out = filt * gate;
            skip += &layer.skip.forward(&out);
            h = layer.residual.forward(&out) + h;
        }
        let out = self.output1.forward(&skip.mapv(relu)).mapv(relu);
        Ok(self.output2.forward(&out))
    }
}

impl Forecaster for WaveNetForecaster {
    fn forecast(&self, past: &Array2<f64>, horizon: usize) -> Result<Array2<f64>> {
        let n_t = past.ncols();
        if n_t == 0 {
            return Err(Error::InvalidParameter("cannot forecast from an empty window".into()));
        }
        let rf = self.receptive_field();
        let mut context = past.slice(s![.., n_t.saturating_sub(rf)..]).to_owned();
        let mut out = Array2::<f64>::zeros((past.nrows(), horizon));
        for step in 0..horizon {
            let y = self.forward(&context)?;
            let next = y.column(y.ncols() - 1).to_owned();
            out.column_mut(step).assign(&next);
            context.push_column(next.view())?;
            if context.ncols() > rf {
                context = context.slice(s![.., 1..]).to_owned();
            }
        }
        Ok(out)
    }
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

fn relu(v: f64) -> f64 {
    v.max(0.0)
}

/// Mean squared error of `forecaster` over every (normalised) pair of `split`.
pub fn evaluate_mse(dataset: &WindowedDataset, split: Split, forecaster: &dyn Forecaster) -> Result<f64> {
    let n = dataset.len(split);
    if n == 0 {
        return Err(Error::InvalidParameter(format!("{split} split is empty")));
    }
    let (mut sum, mut count) = (0.0, 0usize);
    for i in 0..n {
        let (past, future) = dataset.get(split, i)?;
        let pred = forecaster.forecast(&past, future.ncols())?;
        sum += (&pred - &future).mapv(|e| e * e).sum();
        count += future.len();
    }
    let mse = sum / count.max(1) as f64;
    info!("{split} MSE over {n} windows: {mse:.4}");
    Ok(mse)
}
