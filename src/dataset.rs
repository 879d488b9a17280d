//! Windowed dataset with a seeded train/test split.
//!
//! [`build`] shuffles the pair indices once with a seeded `StdRng`, assigns
//! the first `floor(train_fraction × N)` to training and the rest to test,
//! then freezes per-channel [`ChannelStats`] pooled over the past and future
//! segments of the training pairs only.  Every access normalises with those
//! statistics; with normalisation disabled they are mean 0 / std 1 and the
//! same code path runs.
use log::info;
use ndarray::{s, Array2, Array3, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Error, Result};
use crate::normalize::ChannelStats;
use crate::windows::WindowPair;

/// Which half of the split to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Split::Train => "train",
            Split::Test => "test",
        })
    }
}

/// `[B, C, past_len]` and `[B, C, future_len]` stacks of normalised pairs.
#[derive(Debug, Clone)]
pub struct Batch {
    pub past: Array3<f64>,
    pub future: Array3<f64>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.past.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Window pairs, their split, and the frozen training statistics.
#[derive(Debug, Clone)]
pub struct WindowedDataset {
    pairs: Vec<WindowPair>,
    train: Vec<usize>,
    test: Vec<usize>,
    stats: ChannelStats,
    normalized: bool,
}

/// Shuffle, split and compute training statistics.
pub fn build(
    pairs: Vec<WindowPair>,
    train_fraction: f64,
    seed: u64,
    normalize: bool,
) -> Result<WindowedDataset> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(Error::InvalidParameter(format!(
            "train_fraction = {train_fraction} must be in (0, 1)"
        )));
    }
    let n_channels = pairs.first().map_or(0, WindowPair::n_channels);
    if let Some(first) = pairs.first() {
        let (p, f) = (first.past.dim(), first.future.dim());
        if let Some(i) = pairs.iter().position(|w| w.past.dim() != p || w.future.dim() != f) {
            return Err(Error::InvalidData(format!(
                "window {i} has shape {:?}/{:?}, expected {p:?}/{f:?}",
                pairs[i].past.dim(),
                pairs[i].future.dim()
            )));
        }
        if f.0 != p.0 {
            return Err(Error::InvalidData(format!(
                "past has {} channels but future has {}",
                p.0, f.0
            )));
        }
    }

    let mut order: Vec<usize> = (0..pairs.len()).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let n_train = (train_fraction * pairs.len() as f64).floor() as usize;
    let test = order.split_off(n_train);
    let train = order;

    let stats = if normalize {
        let segments: Vec<ArrayView2<f64>> = train
            .iter()
            .flat_map(|&i| [pairs[i].past.view(), pairs[i].future.view()])
            .collect();
        ChannelStats::from_segments(&segments, n_channels)?
    } else {
        ChannelStats::identity(n_channels)
    };
    info!(
        "dataset: {} pairs, {} train / {} test, normalized = {normalize}",
        pairs.len(),
        train.len(),
        test.len()
    );

    Ok(WindowedDataset { pairs, train, test, stats, normalized: normalize })
}

impl WindowedDataset {
    pub fn len(&self, split: Split) -> usize {
        self.indices(split).len()
    }

    pub fn is_empty(&self, split: Split) -> bool {
        self.len(split) == 0
    }

    /// Indices into the original pair list, in split order.
    pub fn indices(&self, split: Split) -> &[usize] {
        match split {
            Split::Train => &self.train,
            Split::Test => &self.test,
        }
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    pub fn n_channels(&self) -> usize {
        self.stats.n_channels()
    }

    /// Un-normalised pair by original index.
    pub fn raw_pair(&self, original_index: usize) -> Option<&WindowPair> {
        self.pairs.get(original_index)
    }

    /// Normalised `(past, future)` of the `index`-th pair of `split`.
    pub fn get(&self, split: Split, index: usize) -> Result<(Array2<f64>, Array2<f64>)> {
        let indices = self.indices(split);
        let &i = indices
            .get(index)
            .ok_or_else(|| Error::IndexOutOfRange { index, len: indices.len() })?;
        let pair = &self.pairs[i];
        Ok((self.stats.normalize(&pair.past), self.stats.normalize(&pair.future)))
    }

    /// Undo the normalisation of a `[C, T]` segment.
    pub fn denormalize(&self, segment: &Array2<f64>) -> Array2<f64> {
        self.stats.denormalize(segment)
    }

    /// Consecutive batches of `batch_size` in split order; the last may be short.
    pub fn batches(&self, split: Split, batch_size: usize) -> Result<Vec<Batch>> {
        if batch_size == 0 {
            return Err(Error::InvalidParameter("batch_size must be >= 1".into()));
        }
        let indices = self.indices(split);
        let Some(&first) = indices.first() else {
            return Ok(Vec::new());
        };
        let (c, tp) = self.pairs[first].past.dim();
        let tf = self.pairs[first].future.ncols();

        let mut out = Vec::with_capacity(indices.len().div_ceil(batch_size));
        for (chunk_no, chunk) in indices.chunks(batch_size).enumerate() {
            let mut past = Array3::<f64>::zeros((chunk.len(), c, tp));
            let mut future = Array3::<f64>::zeros((chunk.len(), c, tf));
            for b in 0..chunk.len() {
                let (p, f) = self.get(split, chunk_no * batch_size + b)?;
                past.slice_mut(s![b, .., ..]).assign(&p);
                future.slice_mut(s![b, .., ..]).assign(&f);
            }
            out.push(Batch { past, future });
        }
        Ok(out)
    }
}
