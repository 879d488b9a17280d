//! Interchange session documents.
//!
//! A session file is a JSON object keyed by modality (`EEG`, `EMG`, `KIN`,
//! `ENV`, `MISC`).  Each entry holds `data` (samples × channels), `names` and
//! `sampling_rate`.  The EEG entry additionally accumulates the outputs of
//! the cleaning stages (`filtered_data`, `ica_components`,
//! `ica_mixing_matrix`, `reconstructed_data`).
//!
//! On load every block goes through [`SignalBlock::new`], so ragged rows,
//! duplicate names or a non-positive sampling rate are rejected here rather
//! than at some later index operation.
use log::warn;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{Error, Result};

/// Recording modality.  Ordering follows the document's canonical key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Modality {
    Eeg,
    Emg,
    Kin,
    Env,
    Misc,
}

impl Modality {
    pub const ALL: [Modality; 5] = [Self::Eeg, Self::Emg, Self::Kin, Self::Env, Self::Misc];

    pub fn key(self) -> &'static str {
        match self {
            Self::Eeg => "EEG",
            Self::Emg => "EMG",
            Self::Kin => "KIN",
            Self::Env => "ENV",
            Self::Misc => "MISC",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.key() == key)
    }
}

/// One modality's samples, validated at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBlock {
    data: Array2<f64>,
    names: Vec<String>,
    sampling_rate: f64,
}

impl SignalBlock {
    /// `data` is `[T, C]` with `C == names.len()`.
    pub fn new(data: Array2<f64>, names: Vec<String>, sampling_rate: f64) -> Result<Self> {
        if data.ncols() != names.len() {
            return Err(Error::InvalidData(format!(
                "{} data columns but {} channel names",
                data.ncols(),
                names.len()
            )));
        }
        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(Error::InvalidData(format!(
                "sampling rate must be positive, got {sampling_rate}"
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for n in &names {
            if !seen.insert(n.as_str()) {
                return Err(Error::InvalidData(format!("duplicate channel name '{n}'")));
            }
        }
        Ok(Self { data, names, sampling_rate })
    }

    /// Build from row-major nested samples (`rows[t][c]`).
    pub fn from_rows(rows: &[Vec<f64>], names: Vec<String>, sampling_rate: f64) -> Result<Self> {
        let data = rows_to_array(rows, names.len())?;
        Self::new(data, names, sampling_rate)
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_channels(&self) -> usize {
        self.names.len()
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Keep the channels in `wanted` that exist, in recording order.
    ///
    /// Fails if none of them exist.  Missing names are logged.
    pub fn pick(&self, wanted: &[String]) -> Result<SignalBlock> {
        for w in wanted {
            if self.channel_index(w).is_none() {
                warn!("pick: channel '{w}' not present in recording");
            }
        }
        let idx: Vec<usize> = self
            .names
            .iter()
            .enumerate()
            .filter(|(_, n)| wanted.contains(n))
            .map(|(i, _)| i)
            .collect();
        if idx.is_empty() {
            return Err(Error::InvalidData("no requested channel is present".into()));
        }
        let data = self.data.select(ndarray::Axis(1), &idx);
        let names = idx.iter().map(|&i| self.names[i].clone()).collect();
        SignalBlock::new(data, names, self.sampling_rate)
    }
}

/// Stage outputs accumulated on the EEG block, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EegStage {
    Filtered,
    IcaComponents,
    IcaMixing,
    Reconstructed,
}

impl EegStage {
    pub fn key(self) -> &'static str {
        match self {
            Self::Filtered => "filtered_data",
            Self::IcaComponents => "ica_components",
            Self::IcaMixing => "ica_mixing_matrix",
            Self::Reconstructed => "reconstructed_data",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EegStages {
    slots: BTreeMap<EegStage, Array2<f64>>,
}

impl EegStages {
    pub fn get(&self, stage: EegStage) -> Option<&Array2<f64>> {
        self.slots.get(&stage)
    }

    /// Store a stage output.
    ///
    /// An earlier stage may not be written once a later stage exists, so a
    /// partially re-run pipeline never leaves later outputs that disagree
    /// with the inputs they were computed from.
    pub fn record(&mut self, stage: EegStage, data: Array2<f64>) -> Result<()> {
        if let Some(later) = self.slots.keys().copied().find(|&s| s > stage) {
            return Err(Error::InvalidData(format!(
                "cannot write '{}' after '{}' exists",
                stage.key(),
                later.key()
            )));
        }
        self.slots.insert(stage, data);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// A recording session: one [`SignalBlock`] per modality plus EEG stage outputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    blocks: BTreeMap<Modality, SignalBlock>,
    pub eeg_stages: EegStages,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, modality: Modality, block: SignalBlock) -> Option<SignalBlock> {
        self.blocks.insert(modality, block)
    }

    pub fn get(&self, modality: Modality) -> Option<&SignalBlock> {
        self.blocks.get(&modality)
    }

    pub fn eeg(&self) -> Result<&SignalBlock> {
        self.get(Modality::Eeg)
            .ok_or_else(|| Error::InvalidData("session has no EEG block".into()))
    }

    pub fn modalities(&self) -> impl Iterator<Item = Modality> + '_ {
        self.blocks.keys().copied()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let doc: BTreeMap<String, RawBlock> = serde_json::from_reader(reader)?;
        Self::from_document(doc)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let doc: BTreeMap<String, RawBlock> = serde_json::from_str(text)?;
        Self::from_document(doc)
    }

    fn from_document(doc: BTreeMap<String, RawBlock>) -> Result<Self> {
        let mut session = Session::new();
        for (key, raw) in doc {
            let Some(modality) = Modality::from_key(&key) else {
                warn!("ignoring unknown modality '{key}'");
                continue;
            };
            let Some(sfreq) = raw.sampling_rate else {
                if raw.data.is_empty() && raw.names.is_empty() {
                    warn!("{key}: empty block without sampling rate, skipped");
                    continue;
                }
                return Err(Error::InvalidData(format!("{key}: missing sampling_rate")));
            };
            let block = SignalBlock::from_rows(&raw.data, raw.names, sfreq)
                .map_err(|e| Error::InvalidData(format!("{key}: {e}")))?;

            if modality == Modality::Eeg {
                let stages = [
                    (EegStage::Filtered, raw.filtered_data),
                    (EegStage::IcaComponents, raw.ica_components),
                    (EegStage::IcaMixing, raw.ica_mixing_matrix),
                    (EegStage::Reconstructed, raw.reconstructed_data),
                ];
                for (stage, rows) in stages {
                    if let Some(rows) = rows {
                        let width = rows.first().map_or(0, Vec::len);
                        session.eeg_stages.record(stage, rows_to_array(&rows, width)?)?;
                    }
                }
            }
            session.insert(modality, block);
        }
        Ok(session)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &self.to_document())?;
        Ok(())
    }

    fn to_document(&self) -> BTreeMap<&'static str, RawBlock> {
        let mut doc = BTreeMap::new();
        for (&modality, block) in &self.blocks {
            let mut raw = RawBlock {
                data: array_to_rows(block.data()),
                names: block.names().to_vec(),
                sampling_rate: Some(block.sampling_rate()),
                ..RawBlock::default()
            };
            if modality == Modality::Eeg {
                let get = |s| self.eeg_stages.get(s).map(array_to_rows);
                raw.filtered_data = get(EegStage::Filtered);
                raw.ica_components = get(EegStage::IcaComponents);
                raw.ica_mixing_matrix = get(EegStage::IcaMixing);
                raw.reconstructed_data = get(EegStage::Reconstructed);
            }
            doc.insert(modality.key(), raw);
        }
        doc
    }
}

// ── Wire representation ───────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawBlock {
    #[serde(default)]
    data: Vec<Vec<f64>>,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    sampling_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filtered_data: Option<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ica_components: Option<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ica_mixing_matrix: Option<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reconstructed_data: Option<Vec<Vec<f64>>>,
}

fn rows_to_array(rows: &[Vec<f64>], width: usize) -> Result<Array2<f64>> {
    let mut flat = Vec::with_capacity(rows.len() * width);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(Error::InvalidData(format!(
                "row {i} has {} values, expected {width}",
                row.len()
            )));
        }
        flat.extend_from_slice(row);
    }
    Ok(Array2::from_shape_vec((rows.len(), width), flat)?)
}

fn array_to_rows(a: &Array2<f64>) -> Vec<Vec<f64>> {
    a.rows().into_iter().map(|r| r.to_vec()).collect()
}
