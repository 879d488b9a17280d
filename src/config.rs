//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable parameter of the cleaning stages
//! (pick → reference → band-pass → ICA → classify → reconstruct) and
//! [`WindowConfig`] those of the windowing/dataset stages.  All defaults
//! match the settings used on the grasp-and-lift recordings (500 Hz EEG,
//! 1–40 Hz band, 14 sensorimotor channels).
//!
//! Both structs deserialize from TOML with missing keys falling back to the
//! defaults:
//!
//! ```
//! use gal_eeg::PipelineConfig;
//!
//! let cfg: PipelineConfig = toml::from_str("low_hz = 0.5\nica_seed = 42").unwrap();
//! assert_eq!(cfg.low_hz, 0.5);
//! assert_eq!(cfg.order, 5);
//! ```
use serde::Deserialize;
use std::path::Path;

use crate::classify::Label;
use crate::error::Result;
use crate::io::ARTIFACT_SUFFIX;

/// The 14 sensorimotor channels kept before ICA.
pub const MOTOR_CHANNELS: [&str; 14] = [
    "F3", "Fz", "F4",
    "FC5", "FC1", "FC2", "FC6",
    "C3", "Cz", "C4",
    "CP5", "CP1", "CP2", "CP6",
];

/// Floor applied to standard deviations before dividing.
pub const STD_EPSILON: f64 = 1e-6;

/// What to do with a channel whose standard deviation is zero when z-scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariancePolicy {
    /// Raise the std to [`STD_EPSILON`] and log a warning.
    #[default]
    Floor,
    /// Abort with [`Error::DegenerateChannel`](crate::Error::DegenerateChannel).
    Fail,
}

/// Configuration for the cleaning half of the pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Lower band-pass edge in Hz.
    ///
    /// Default: `1.0` Hz.
    pub low_hz: f64,

    /// Upper band-pass edge in Hz.  Must stay below Nyquist.
    ///
    /// Default: `40.0` Hz.
    pub high_hz: f64,

    /// Butterworth prototype order.  A band-pass of order `n` has `2n` poles
    /// and is applied as `n` second-order sections.
    ///
    /// Default: `5`.
    pub order: usize,

    /// Channels to keep before filtering, in recording order.  An empty list
    /// keeps every channel.
    ///
    /// Default: [`MOTOR_CHANNELS`].
    pub pick_channels: Vec<String>,

    /// Subtract the per-sample channel mean before ICA.
    ///
    /// Default: `true`.
    pub average_reference: bool,

    /// Number of independent components.  `None` uses the numerical rank of
    /// the filtered data (one less than the channel count after average
    /// referencing).
    pub n_components: Option<usize>,

    /// Seed for the initial unmixing matrix.
    ///
    /// Default: `97`.
    pub ica_seed: u64,

    /// FastICA iteration cap.  Exceeding it is a convergence error.
    ///
    /// Default: `1000`.
    pub ica_max_iter: usize,

    /// FastICA convergence tolerance on `max |1 - |diag(W_new · W_oldᵀ)||`.
    ///
    /// Default: `1e-4`.
    pub ica_tol: f64,

    /// Sources with this predicted label are kept; all others are zeroed.
    ///
    /// Default: [`Label::Brain`].
    pub keep_label: Label,

    /// Zero-variance handling in the post-reconstruction z-score.
    pub variance_policy: VariancePolicy,

    /// File-name suffix of the cleaned artifact, after the session stem.
    ///
    /// Default: [`ARTIFACT_SUFFIX`].
    pub artifact_suffix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            low_hz: 1.0,
            high_hz: 40.0,
            order: 5,
            pick_channels: MOTOR_CHANNELS.iter().map(|s| s.to_string()).collect(),
            average_reference: true,
            n_components: None,
            ica_seed: 97,
            ica_max_iter: 1000,
            ica_tol: 1e-4,
            keep_label: Label::Brain,
            variance_policy: VariancePolicy::Floor,
            artifact_suffix: ARTIFACT_SUFFIX.into(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

/// Configuration for event windowing and the windowed dataset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Nominal sampling rate for reporting window durations.  Event times
    /// are converted at each artifact's own stored rate.
    ///
    /// Default: `500.0` Hz.
    pub sfreq: f64,

    /// Samples before the event (2 s at 500 Hz).
    pub past_len: usize,

    /// Samples from the event onward (3 s at 500 Hz).
    pub future_len: usize,

    /// Fraction of shuffled windows assigned to training.
    ///
    /// Default: `0.8`.
    pub train_fraction: f64,

    /// Seed for the shuffle preceding the split.
    pub split_seed: u64,

    /// Apply training-set channel statistics on access.
    pub normalize: bool,

    /// File-name suffix of cleaned artifacts, after the session stem.
    ///
    /// Default: [`ARTIFACT_SUFFIX`].
    pub artifact_suffix: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            sfreq: 500.0,
            past_len: 1000,
            future_len: 1500,
            train_fraction: 0.8,
            split_seed: 0,
            normalize: true,
            artifact_suffix: ARTIFACT_SUFFIX.into(),
        }
    }
}

impl WindowConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Window lengths in seconds, `(past, future)`.
    pub fn durations(&self) -> (f64, f64) {
        (self.past_len as f64 / self.sfreq, self.future_len as f64 / self.sfreq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_recordings() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.pick_channels.len(), 14);
        assert_eq!(cfg.keep_label, Label::Brain);
        let w = WindowConfig::default();
        let (p, f) = w.durations();
        approx::assert_abs_diff_eq!(p, 2.0);
        approx::assert_abs_diff_eq!(f, 3.0);
    }

    #[test]
    fn toml_overrides_and_defaults() {
        let cfg: PipelineConfig = toml::from_str(
            "high_hz = 30.0\nkeep_label = \"eye\"\nvariance_policy = \"fail\"\npick_channels = []",
        )
        .unwrap();
        assert_eq!(cfg.high_hz, 30.0);
        assert_eq!(cfg.keep_label, Label::Eye);
        assert_eq!(cfg.variance_policy, VariancePolicy::Fail);
        assert!(cfg.pick_channels.is_empty());
        assert_eq!(cfg.ica_seed, 97);

        let w: WindowConfig = toml::from_str("past_len = 250\nnormalize = false").unwrap();
        assert_eq!(w.past_len, 250);
        assert_eq!(w.future_len, 1500);
        assert!(!w.normalize);
    }

    #[test]
    fn both_halves_agree_on_artifact_names() {
        assert_eq!(PipelineConfig::default().artifact_suffix, WindowConfig::default().artifact_suffix);
        let cfg: PipelineConfig = toml::from_str("artifact_suffix = \"_clean.safetensors\"").unwrap();
        assert_eq!(cfg.artifact_suffix, "_clean.safetensors");
    }
}
