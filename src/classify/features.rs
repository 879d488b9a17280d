//! Rule-based source classifier.
//!
//! Each source is summarised by a handful of features:
//!
//! | Feature       | Computed from                                        |
//! |---------------|------------------------------------------------------|
//! | `low`         | Welch power share in 0.5–4 Hz                        |
//! | `mid`         | power share in 4–25 Hz                               |
//! | `high`        | power share above 25 Hz (line bands excluded)        |
//! | `line`        | power share within ±2 Hz of 50 / 60 Hz               |
//! | `kurtosis`    | excess kurtosis of the activation                    |
//! | `periodicity` | peak autocorrelation at heartbeat lags (0.4–1.5 s)   |
//! | `frontal`     | share of topography energy on channels with `y > 0.5`|
//! | `lateral`     | share on channels with `|x| > 0.8`                   |
//! | `focality`    | largest single-channel share                         |
//!
//! Spectral shares are taken over 0.5 Hz to min(100 Hz, Nyquist).  Linear
//! scores per category go through a softmax to give confidences.
use std::f64::consts::PI;

use log::debug;
use ndarray::ArrayView1;
use rustfft::{num_complex::Complex, FftPlanner};

use super::{Label, SignalContext, SourceClassifier, SourceLabel};
use crate::error::{Error, Result};
use crate::ica::Decomposition;
use crate::montage::Position;

const LOW_EDGE: f64 = 0.5;
const LOW_MID_EDGE: f64 = 4.0;
const MID_HIGH_EDGE: f64 = 25.0;
const TOP_FREQ: f64 = 100.0;
const LINE_FREQS: [f64; 2] = [50.0, 60.0];
const LINE_HALF_WIDTH: f64 = 2.0;
const HEART_LAGS_S: (f64, f64) = (0.4, 1.5);

/// Classifies sources from spectral, temporal and topographic features.
#[derive(Debug, Clone)]
pub struct FeatureClassifier {
    /// Welch segment length in samples.
    pub segment_len: usize,
}

impl Default for FeatureClassifier {
    fn default() -> Self {
        Self { segment_len: 512 }
    }
}

/// Per-source feature vector; see the module table.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SourceFeatures {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
    pub line: f64,
    pub kurtosis: f64,
    pub periodicity: f64,
    pub frontal: f64,
    pub lateral: f64,
    pub focality: f64,
}

impl SourceFeatures {
    fn compute(
        source: ArrayView1<f64>,
        topography: ArrayView1<f64>,
        positions: &[Position],
        sfreq: f64,
        segment_len: usize,
        planner: &mut FftPlanner<f64>,
    ) -> Self {
        let n = source.len().max(1) as f64;
        let mean = source.sum() / n;
        let x: Vec<f64> = source.iter().map(|v| v - mean).collect();

        let seg = segment_len.min(x.len());
        let psd = welch_psd(&x, seg, planner);
        let mut f = SourceFeatures::default();
        if seg > 0 {
            f.band_shares(&psd, sfreq / seg as f64, sfreq / 2.0);
        }
        f.kurtosis = excess_kurtosis(&x);
        f.periodicity = periodicity(&x, sfreq, planner);
        f.topography_shares(topography, positions);
        f
    }

    fn band_shares(&mut self, psd: &[f64], df: f64, nyquist: f64) {
        let top = TOP_FREQ.min(nyquist);
        let (mut low, mut mid, mut high, mut line, mut total) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (i, &p) in psd.iter().enumerate() {
            let freq = i as f64 * df;
            if freq < LOW_EDGE || freq > top {
                continue;
            }
            total += p;
            if LINE_FREQS.iter().any(|lf| (freq - lf).abs() <= LINE_HALF_WIDTH) {
                line += p;
            } else if freq < LOW_MID_EDGE {
                low += p;
            } else if freq < MID_HIGH_EDGE {
                mid += p;
            } else {
                high += p;
            }
        }
        if total > 0.0 {
            self.low = low / total;
            self.mid = mid / total;
            self.high = high / total;
            self.line = line / total;
        }
    }

    fn topography_shares(&mut self, topography: ArrayView1<f64>, positions: &[Position]) {
        let energy: Vec<f64> = topography.iter().map(|a| a * a).collect();
        let total: f64 = energy.iter().sum();
        if total <= 0.0 {
            return;
        }
        for (e, p) in energy.iter().zip(positions) {
            let share = e / total;
            if p.y > 0.5 {
                self.frontal += share;
            }
            if p.x.abs() > 0.8 {
                self.lateral += share;
            }
            self.focality = self.focality.max(share);
        }
    }

    /// Category confidences, indexed by [`Label::index`]; they sum to 1.
    pub fn scores(&self) -> [f64; Label::COUNT] {
        let kurt = (self.kurtosis / 10.0).clamp(0.0, 1.0);
        let mut logits = [0.0; Label::COUNT];
        logits[Label::Brain.index()] =
            4.0 * self.mid - 2.0 * self.high - 2.0 * kurt - 2.0 * self.focality + 1.0;
        logits[Label::Muscle.index()] = 5.0 * self.high + 1.5 * self.lateral - 1.0;
        logits[Label::Eye.index()] = 4.0 * self.low + 3.0 * self.frontal + 2.0 * kurt - 3.0;
        logits[Label::Heart.index()] = 6.0 * self.periodicity * kurt - 2.0;
        logits[Label::LineNoise.index()] = 10.0 * self.line - 2.0;
        logits[Label::ChannelNoise.index()] = 10.0 * (self.focality - 0.5).max(0.0) - 1.0;
        logits[Label::Other.index()] = 0.0;
        softmax(logits)
    }
}

impl FeatureClassifier {
    /// Feature vectors for every source, in source order.
    pub fn features(&self, ctx: &SignalContext<'_>, decomp: &Decomposition) -> Result<Vec<SourceFeatures>> {
        let positions = ctx.check(decomp)?;
        if !(ctx.sfreq > 0.0) {
            return Err(Error::InvalidParameter(format!("sfreq = {} must be > 0", ctx.sfreq)));
        }
        let mut planner = FftPlanner::new();
        Ok((0..decomp.n_components())
            .map(|j| {
                SourceFeatures::compute(
                    decomp.sources.column(j),
                    decomp.mixing.column(j),
                    &positions,
                    ctx.sfreq,
                    self.segment_len,
                    &mut planner,
                )
            })
            .collect())
    }
}

impl SourceClassifier for FeatureClassifier {
    fn classify(&self, ctx: &SignalContext<'_>, decomp: &Decomposition) -> Result<Vec<SourceLabel>> {
        let features = self.features(ctx, decomp)?;
        Ok(features
            .iter()
            .enumerate()
            .map(|(j, f)| {
                debug!("source {j}: {f:?}");
                SourceLabel::from_scores(f.scores())
            })
            .collect())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Welch periodogram (periodic Hann, 50 % overlap, per-segment mean removed).
/// Unscaled; only ratios are used.
fn welch_psd(x: &[f64], seg: usize, planner: &mut FftPlanner<f64>) -> Vec<f64> {
    if seg < 4 {
        return Vec::new();
    }
    let step = seg / 2;
    let window: Vec<f64> = (0..seg)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / seg as f64).cos())
        .collect();
    let fft = planner.plan_fft_forward(seg);
    let mut psd = vec![0.0; seg / 2 + 1];
    let mut buf = vec![Complex::new(0.0, 0.0); seg];
    let mut start = 0;
    while start + seg <= x.len() {
        let chunk = &x[start..start + seg];
        let mean = chunk.iter().sum::<f64>() / seg as f64;
        for ((b, &v), &w) in buf.iter_mut().zip(chunk).zip(&window) {
            *b = Complex::new((v - mean) * w, 0.0);
        }
        fft.process(&mut buf);
        for (p, c) in psd.iter_mut().zip(&buf) {
            *p += c.norm_sqr();
        }
        start += step;
    }
    psd
}

/// `m4 / m2² − 3` of zero-mean data; 0 for a constant signal.
fn excess_kurtosis(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let n = x.len() as f64;
    let m2 = x.iter().map(|v| v * v).sum::<f64>() / n;
    let m4 = x.iter().map(|v| v.powi(4)).sum::<f64>() / n;
    if m2 <= 0.0 {
        0.0
    } else {
        m4 / (m2 * m2) - 3.0
    }
}

/// Largest normalised autocorrelation over heartbeat lags, via FFT.
fn periodicity(x: &[f64], sfreq: f64, planner: &mut FftPlanner<f64>) -> f64 {
    let n = x.len();
    let lo = (HEART_LAGS_S.0 * sfreq).round() as usize;
    let hi = ((HEART_LAGS_S.1 * sfreq).round() as usize).min(n.saturating_sub(1));
    if n < 2 || lo == 0 || lo > hi {
        return 0.0;
    }
    let size = (2 * n).next_power_of_two();
    let mut buf: Vec<Complex<f64>> = x.iter().map(|&v| Complex::new(v, 0.0)).collect();
    buf.resize(size, Complex::new(0.0, 0.0));
    planner.plan_fft_forward(size).process(&mut buf);
    for c in buf.iter_mut() {
        *c = Complex::new(c.norm_sqr(), 0.0);
    }
    planner.plan_fft_inverse(size).process(&mut buf);
    let r0 = buf[0].re;
    if r0 <= 0.0 {
        return 0.0;
    }
    buf[lo..=hi].iter().map(|c| c.re / r0).fold(0.0, f64::max).clamp(0.0, 1.0)
}

fn softmax(logits: [f64; Label::COUNT]) -> [f64; Label::COUNT] {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut out = logits.map(|l| (l - max).exp());
    let sum: f64 = out.iter().sum();
    for v in out.iter_mut() {
        *v /= sum;
    }
    out
}
