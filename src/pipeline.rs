//! Per-session cleaning pipeline.
//!
//! ```text
//! Session (EEG block)
//!   │
//!   ├─ pick        keep cfg.pick_channels, recording order
//!   ├─ reference   per-sample channel mean removed (optional)
//!   ├─ filter      zero-phase Butterworth band-pass      → filtered_data
//!   ├─ decompose   FastICA, k = rank unless configured    → ica_components, ica_mixing_matrix
//!   ├─ classify    one label per source (montage required)
//!   └─ clean       keep-label sources only, z-scored      → reconstructed_data
//! ```
//!
//! Each stage output is recorded on the session as soon as it exists.  A
//! failing stage returns a [`StageError`] naming it; the outputs of earlier
//! stages stay on the session and nothing is recorded for the failed one.
use log::{info, warn};
use ndarray::Array2;
use thiserror::Error;

use crate::classify::{log_labels, SignalContext, SourceClassifier, SourceLabel};
use crate::clean::{clean, kept_sources};
use crate::config::PipelineConfig;
use crate::error::Error;
use crate::filter::bandpass_filter;
use crate::ica::{decompose, estimate_rank, IcaParams};
use crate::io::CleanedArtifact;
use crate::montage::Montage;
use crate::reference::average_reference_inplace;
use crate::session::{EegStage, Modality, Session};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pick,
    Reference,
    Filter,
    Decompose,
    Classify,
    Clean,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Pick => "pick",
            Stage::Reference => "reference",
            Stage::Filter => "filter",
            Stage::Decompose => "decompose",
            Stage::Classify => "classify",
            Stage::Clean => "clean",
        })
    }
}

/// A stage failure of one session.
#[derive(Debug, Error)]
#[error("session '{session}': {stage} stage failed: {source}")]
pub struct StageError {
    pub session: String,
    pub stage: Stage,
    #[source]
    pub source: Error,
}

/// Everything a successful run produces besides the recorded stages.
#[derive(Debug, Clone)]
pub struct CleanOutput {
    /// `[T, C]` cleaned, z-scored signal.
    pub signal: Array2<f64>,
    pub names: Vec<String>,
    pub sfreq: f64,
    pub labels: Vec<SourceLabel>,
    /// Indices of the kept sources.
    pub kept: Vec<usize>,
    /// `[T, kept]` activations of the kept sources.
    pub neural_sources: Array2<f64>,
    /// Numerical rank of the filtered data.
    pub rank: usize,
    /// Final FastICA fixed-point change (below the tolerance).
    pub last_change: f64,
}

impl CleanOutput {
    pub fn artifact(&self) -> CleanedArtifact {
        CleanedArtifact::from_time_major(&self.signal, self.sfreq, self.names.clone())
    }
}

/// Run pick → reference → filter → decompose → classify → clean on the EEG
/// block of `session`.  Previously recorded stages are cleared first.
pub fn clean_session(
    name: &str,
    session: &mut Session,
    classifier: &dyn SourceClassifier,
    cfg: &PipelineConfig,
) -> Result<CleanOutput, StageError> {
    let at = |stage: Stage| {
        move |source: Error| StageError { session: name.to_string(), stage, source }
    };
    session.eeg_stages.clear();

    // 1. Pick.
    let eeg = session.eeg().map_err(at(Stage::Pick))?;
    let block = if cfg.pick_channels.is_empty() {
        eeg.clone()
    } else {
        eeg.pick(&cfg.pick_channels).map_err(at(Stage::Pick))?
    };
    let sfreq = block.sampling_rate();
    let names = block.names().to_vec();
    info!("{name}: {} ch × {} samples @ {sfreq} Hz", block.n_channels(), block.n_samples());
    let mut data = block.data().clone();
    session.insert(Modality::Eeg, block);

    // 2. Reference.
    if cfg.average_reference {
        average_reference_inplace(&mut data);
    }

    // 3. Filter.
    let filtered =
        bandpass_filter(&data, cfg.low_hz, cfg.high_hz, sfreq, cfg.order).map_err(at(Stage::Filter))?;
    session
        .eeg_stages
        .record(EegStage::Filtered, filtered.clone())
        .map_err(at(Stage::Filter))?;

    // 4. Decompose.
    let rank = estimate_rank(&filtered).map_err(at(Stage::Decompose))?;
    let k = cfg.n_components.unwrap_or(rank);
    info!("{name}: data rank {rank}, fitting {k} components");
    if rank < k {
        warn!("{name}: rank {rank} is below the {k} requested components");
    }
    let params = IcaParams {
        n_components: Some(k),
        seed: cfg.ica_seed,
        max_iter: cfg.ica_max_iter,
        tol: cfg.ica_tol,
    };
    let decomp = decompose(&filtered, &params).map_err(at(Stage::Decompose))?;
    session
        .eeg_stages
        .record(EegStage::IcaComponents, decomp.sources.clone())
        .and_then(|_| session.eeg_stages.record(EegStage::IcaMixing, decomp.mixing.clone()))
        .map_err(at(Stage::Decompose))?;

    // 5. Classify.
    let montage = Montage::standard_1020();
    let labels = SignalContext::new(&filtered, &names, sfreq, &montage)
        .and_then(|ctx| classifier.classify(&ctx, &decomp))
        .map_err(at(Stage::Classify))?;
    log_labels(&labels);

    // 6. Clean.
    let cleaned = clean(&decomp, &labels, cfg.keep_label, cfg.variance_policy)
        .map_err(at(Stage::Clean))?;
    session
        .eeg_stages
        .record(EegStage::Reconstructed, cleaned.signal.clone())
        .map_err(at(Stage::Clean))?;

    let neural_sources = kept_sources(&decomp, &cleaned.kept);
    Ok(CleanOutput {
        signal: cleaned.signal,
        names,
        sfreq,
        labels,
        kept: cleaned.kept,
        neural_sources,
        rank,
        last_change: decomp.last_change,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Label, PrecomputedLabels};
    use crate::session::SignalBlock;

    fn session(names: &[&str]) -> Session {
        use std::f64::consts::PI;
        let n = 3000;
        let data = Array2::from_shape_fn((n, names.len()), |(t, c)| {
            let ts = t as f64 / 500.0;
            let s = [
                (2.0 * PI * 6.0 * ts).sin(),
                (2.0 * PI * 2.5 * ts).sin().signum(),
                (2.0 * PI * 17.0 * ts).sin(),
            ];
            let w = [[1.0, 0.5, 0.2], [0.3, 1.0, 0.4], [0.6, 0.2, 1.0]];
            (0..3).map(|j| w[c % 3][j] * s[j]).sum::<f64>()
        });
        let names = names.iter().map(|s| s.to_string()).collect();
        let mut s = Session::new();
        s.insert(Modality::Eeg, SignalBlock::new(data, names, 500.0).unwrap());
        s
    }

    #[test]
    fn unknown_channels_fail_at_classify_with_earlier_stages_kept() {
        let mut s = session(&["C3", "Cz", "X1"]);
        let cfg = PipelineConfig {
            pick_channels: vec![],
            average_reference: false,
            ..PipelineConfig::default()
        };
        let labels = PrecomputedLabels::new(vec![SourceLabel::single(Label::Brain, 0.9); 3]);
        let err = clean_session("P1_S1", &mut s, &labels, &cfg).unwrap_err();
        assert_eq!(err.stage, Stage::Classify);
        assert!(matches!(err.source, Error::InsufficientContext(_)));
        assert!(s.eeg_stages.get(EegStage::Filtered).is_some());
        assert!(s.eeg_stages.get(EegStage::IcaMixing).is_some());
        assert!(s.eeg_stages.get(EegStage::Reconstructed).is_none());
    }

    #[test]
    fn bad_band_fails_at_filter() {
        let mut s = session(&["C3", "C4"]);
        let cfg = PipelineConfig { high_hz: 400.0, pick_channels: vec![], ..PipelineConfig::default() };
        let labels = PrecomputedLabels::new(vec![]);
        let err = clean_session("P1_S1", &mut s, &labels, &cfg).unwrap_err();
        assert_eq!(err.stage, Stage::Filter);
        assert!(s.eeg_stages.is_empty());
    }

    #[test]
    fn missing_pick_channels_fail_at_pick() {
        let mut s = session(&["C3", "C4"]);
        let cfg = PipelineConfig { pick_channels: vec!["O1".into()], ..PipelineConfig::default() };
        let labels = PrecomputedLabels::new(vec![]);
        let err = clean_session("P1_S1", &mut s, &labels, &cfg).unwrap_err();
        assert_eq!(err.stage, Stage::Pick);
        assert!(err.to_string().contains("P1_S1"));
    }
}
