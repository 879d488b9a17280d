// Shared helpers for integration tests: synthetic recordings and comparisons.
use gal_eeg::{Modality, Session, SignalBlock};
use ndarray::Array2;
use std::f64::consts::PI;

pub const SFREQ: f64 = 500.0;

#[allow(unused)]
pub fn sine(freq: f64, sfreq: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| (2.0 * PI * freq * i as f64 / sfreq).sin()).collect()
}

#[allow(unused)]
/// Four in-band, non-Gaussian sources `[T, 4]`: 6 Hz sine, 2.5 Hz square,
/// 4 Hz sawtooth, 13 Hz sine.
pub fn sources(n: usize) -> Array2<f64> {
    Array2::from_shape_fn((n, 4), |(t, j)| {
        let ts = t as f64 / SFREQ;
        match j {
            0 => (2.0 * PI * 6.0 * ts).sin(),
            1 => (2.0 * PI * 2.5 * ts).sin().signum(),
            2 => 2.0 * (4.0 * ts - (4.0 * ts + 0.5).floor()),
            _ => (2.0 * PI * 13.0 * ts).sin(),
        }
    })
}

#[allow(unused)]
/// Fixed, well-conditioned 4 × 4 mixing matrix (channels × sources).
pub fn mixing4() -> Array2<f64> {
    Array2::from_shape_vec(
        (4, 4),
        vec![
            1.0, 0.4, 0.2, 0.1, //
            0.3, 1.0, 0.5, 0.2, //
            0.1, 0.3, 1.0, 0.4, //
            0.5, 0.1, 0.3, 1.0,
        ],
    )
    .unwrap()
}

#[allow(unused)]
/// `[T, 4]` mixture of [`sources`] through [`mixing4`].
pub fn mixed(n: usize) -> Array2<f64> {
    sources(n).dot(&mixing4().t())
}

#[allow(unused)]
/// A session whose EEG block has `names`; the first four columns carry
/// [`mixed`] signals, any others a slow ramp.
pub fn session_with(names: &[&str], n: usize) -> Session {
    let m = mixed(n);
    let data = Array2::from_shape_fn((n, names.len()), |(t, c)| {
        if c < 4 { m[[t, c]] } else { t as f64 * 1e-3 + c as f64 }
    });
    let names = names.iter().map(|s| s.to_string()).collect();
    let mut s = Session::new();
    s.insert(Modality::Eeg, SignalBlock::new(data, names, SFREQ).unwrap());
    s
}

#[allow(unused)]
/// `[C, T]` signal whose value encodes its position: `c * 10_000 + t`.
pub fn position_coded(c: usize, t: usize) -> Array2<f64> {
    Array2::from_shape_fn((c, t), |(ch, i)| (ch * 10_000 + i) as f64)
}

#[allow(unused)]
/// Maximum absolute difference between two arrays of equal shape.
pub fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    assert_eq!(a.dim(), b.dim());
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

#[allow(unused)]
/// Population standard deviation of a slice.
pub fn std(x: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    (x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}
