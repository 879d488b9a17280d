//! Labels produced by an external labeller.
//!
//! The JSON layout is the one ICLabel-style tools emit:
//!
//! ```json
//! { "labels": ["brain", "eye blink", "muscle artifact"],
//!   "y_pred_proba": [0.87, 0.93, 0.61] }
//! ```
//!
//! The montage precondition still applies, so a recording that could not
//! have been labelled spatially is rejected the same way.
use std::path::Path;

use serde::Deserialize;

use super::{Label, SignalContext, SourceClassifier, SourceLabel};
use crate::error::{Error, Result};
use crate::ica::Decomposition;

#[derive(Debug, Deserialize)]
struct LabelFile {
    labels: Vec<Label>,
    y_pred_proba: Vec<f64>,
}

/// A fixed label list, one entry per source.
#[derive(Debug, Clone)]
pub struct PrecomputedLabels {
    labels: Vec<SourceLabel>,
}

impl PrecomputedLabels {
    pub fn new(labels: Vec<SourceLabel>) -> Self {
        Self { labels }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let file: LabelFile = serde_json::from_str(s)?;
        if file.labels.len() != file.y_pred_proba.len() {
            return Err(Error::InvalidData(format!(
                "{} labels but {} probabilities",
                file.labels.len(),
                file.y_pred_proba.len()
            )));
        }
        if let Some(p) = file.y_pred_proba.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(Error::InvalidData(format!("probability {p} outside [0, 1]")));
        }
        let labels = file
            .labels
            .into_iter()
            .zip(file.y_pred_proba)
            .map(|(l, p)| SourceLabel::single(l, p))
            .collect();
        Ok(Self { labels })
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn labels(&self) -> &[SourceLabel] {
        &self.labels
    }
}

impl SourceClassifier for PrecomputedLabels {
    fn classify(&self, ctx: &SignalContext<'_>, decomp: &Decomposition) -> Result<Vec<SourceLabel>> {
        ctx.check(decomp)?;
        if self.labels.len() != decomp.n_components() {
            return Err(Error::InvalidData(format!(
                "{} precomputed labels for {} sources",
                self.labels.len(),
                decomp.n_components()
            )));
        }
        Ok(self.labels.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::montage::Montage;
    use ndarray::{Array1, Array2};

    fn decomp(k: usize, c: usize) -> Decomposition {
        Decomposition {
            sources: Array2::zeros((10, k)),
            mixing: Array2::zeros((c, k)),
            unmixing: Array2::zeros((k, c)),
            mean: Array1::zeros(c),
            last_change: 0.0,
        }
    }

    #[test]
    fn parses_iclabel_output() {
        let p = PrecomputedLabels::from_json_str(
            r#"{"labels": ["brain", "eye blink"], "y_pred_proba": [0.87, 0.93]}"#,
        )
        .unwrap();
        assert_eq!(p.labels()[0].label, Label::Brain);
        assert_eq!(p.labels()[1].label, Label::Eye);
        approx::assert_abs_diff_eq!(p.labels()[1].probability, 0.93);
    }

    #[test]
    fn length_mismatch_rejected() {
        let r = PrecomputedLabels::from_json_str(r#"{"labels": ["brain"], "y_pred_proba": []}"#);
        assert!(matches!(r, Err(Error::InvalidData(_))));
    }

    #[test]
    fn source_count_must_match() {
        let p = PrecomputedLabels::new(vec![SourceLabel::single(Label::Brain, 0.9)]);
        let names = vec!["C3".to_string(), "C4".to_string()];
        let signal = Array2::zeros((10, 2));
        let montage = Montage::standard_1020();
        let ctx = SignalContext::new(&signal, &names, 500.0, &montage).unwrap();
        assert!(p.classify(&ctx, &decomp(1, 2)).is_ok());
        assert!(matches!(p.classify(&ctx, &decomp(2, 2)), Err(Error::InvalidData(_))));
    }

    #[test]
    fn montage_precondition_applies() {
        let p = PrecomputedLabels::new(vec![SourceLabel::single(Label::Brain, 0.9)]);
        let names = vec!["C3".to_string(), "X9".to_string()];
        let signal = Array2::zeros((10, 2));
        let montage = Montage::standard_1020();
        let ctx = SignalContext::new(&signal, &names, 500.0, &montage).unwrap();
        assert!(matches!(p.classify(&ctx, &decomp(1, 2)), Err(Error::InsufficientContext(_))));
    }
}
