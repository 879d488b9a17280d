//! Independent-source classification.
//!
//! Every source of a [`Decomposition`] receives one [`SourceLabel`]: a
//! predicted [`Label`] and the confidence of each category.  Classification
//! needs spatial context (channel positions from a [`Montage`]); a channel
//! the montage does not know is a hard failure.
//!
//! Two classifiers implement [`SourceClassifier`]:
//! - [`FeatureClassifier`]: spectral, temporal and topographic features
//!   scored per category.
//! - [`PrecomputedLabels`]: labels produced by an external labeller.
pub mod features;
pub mod precomputed;

use log::info;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ica::Decomposition;
use crate::montage::{Montage, Position};

pub use features::FeatureClassifier;
pub use precomputed::PrecomputedLabels;

/// Source categories, in the order used for score vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Label {
    Brain,
    #[serde(alias = "muscle artifact")]
    Muscle,
    #[serde(alias = "eye blink")]
    Eye,
    #[serde(alias = "heart beat")]
    Heart,
    #[serde(alias = "line noise")]
    LineNoise,
    #[serde(alias = "channel noise")]
    ChannelNoise,
    Other,
}

impl Label {
    pub const COUNT: usize = 7;
    pub const ALL: [Label; Label::COUNT] = [
        Label::Brain,
        Label::Muscle,
        Label::Eye,
        Label::Heart,
        Label::LineNoise,
        Label::ChannelNoise,
        Label::Other,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Brain => "brain",
            Label::Muscle => "muscle",
            Label::Eye => "eye",
            Label::Heart => "heart",
            Label::LineNoise => "line-noise",
            Label::ChannelNoise => "channel-noise",
            Label::Other => "other",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLabel {
    /// Predicted category (argmax of `scores`).
    pub label: Label,
    /// Confidence of the predicted category, in `[0, 1]`.
    pub probability: f64,
    /// Confidence per category, indexed by [`Label::index`].
    pub scores: [f64; Label::COUNT],
}

impl SourceLabel {
    /// Pick the argmax category of `scores`.  Ties go to the earlier label.
    pub fn from_scores(scores: [f64; Label::COUNT]) -> Self {
        let mut best = 0;
        for i in 1..Label::COUNT {
            if scores[i] > scores[best] {
                best = i;
            }
        }
        Self { label: Label::ALL[best], probability: scores[best], scores }
    }

    /// A label with a single known confidence (other categories zero).
    pub fn single(label: Label, probability: f64) -> Self {
        let mut scores = [0.0; Label::COUNT];
        scores[label.index()] = probability;
        Self { label, probability, scores }
    }
}

/// Everything a classifier may look at besides the decomposition.
#[derive(Debug, Clone, Copy)]
pub struct SignalContext<'a> {
    /// `[T, C]` signal the decomposition was fitted on.
    pub signal: &'a Array2<f64>,
    pub names: &'a [String],
    pub sfreq: f64,
    pub montage: &'a Montage,
}

impl<'a> SignalContext<'a> {
    pub fn new(
        signal: &'a Array2<f64>,
        names: &'a [String],
        sfreq: f64,
        montage: &'a Montage,
    ) -> Result<Self> {
        if signal.ncols() != names.len() {
            return Err(Error::InvalidData(format!(
                "{} signal columns but {} channel names",
                signal.ncols(),
                names.len()
            )));
        }
        Ok(Self { signal, names, sfreq, montage })
    }

    /// Scalp positions of every channel; the classifier precondition.
    pub fn positions(&self) -> Result<Vec<Position>> {
        self.montage.positions(self.names)
    }

    fn check(&self, decomp: &Decomposition) -> Result<Vec<Position>> {
        if decomp.n_channels() != self.names.len() {
            return Err(Error::InvalidData(format!(
                "decomposition has {} channels, context has {}",
                decomp.n_channels(),
                self.names.len()
            )));
        }
        self.positions()
    }
}

/// Labels each source of a decomposition, one entry per source column.
pub trait SourceClassifier {
    fn classify(&self, ctx: &SignalContext<'_>, decomp: &Decomposition) -> Result<Vec<SourceLabel>>;
}

/// Indices whose predicted label is `keep`.
pub fn indices_with_label(labels: &[SourceLabel], keep: Label) -> Vec<usize> {
    labels
        .iter()
        .enumerate()
        .filter(|(_, l)| l.label == keep)
        .map(|(i, _)| i)
        .collect()
}

/// Log one line per source, e.g. `Label 3: eye, Prob: 91%`.
pub fn log_labels(labels: &[SourceLabel]) {
    for (i, l) in labels.iter().enumerate() {
        info!("Label {}: {}, Prob: {}%", i + 1, l.label, (100.0 * l.probability) as i32);
    }
}
