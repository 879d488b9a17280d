//! Safetensors I/O for cleaned signals, neural sources and datasets.
//!
//! The format is small enough to read and write by hand: an 8-byte
//! little-endian header length, a JSON header mapping tensor names to
//! `{dtype, shape, data_offsets}`, then the raw little-endian tensor bytes.
//!
//! Cleaned artifacts hold:
//!   `eeg`      F32 [C, T]
//!   `sfreq`    F32 [1]
//!   `ch_names` U8  [n]   (optional; newline-joined UTF-8)
//! and are named `<session><suffix>` (default suffix [`ARTIFACT_SUFFIX`]).
//! The run id is the number after the first `_S` in the file name.
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};
use ndarray::{Array2, Array3};
use serde::Deserialize;

use crate::dataset::{Split, WindowedDataset};
use crate::error::{Error, Result};
use crate::windows::SignalInstance;

/// Default file-name suffix of cleaned artifacts.
pub const ARTIFACT_SUFFIX: &str = "_eeg.safetensors";

// ── Low-level safetensors parser ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TensorEntry {
    dtype: String,
    shape: Vec<usize>,
    data_offsets: [usize; 2],
}

/// A parsed safetensors file.
struct StFile {
    bytes: Vec<u8>,
    entries: HashMap<String, TensorEntry>,
    data_start: usize,
}

impl StFile {
    fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        if bytes.len() < 8 {
            return Err(Error::InvalidData(format!("{}: file too small", path.display())));
        }
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[..8]);
        let data_start = usize::try_from(u64::from_le_bytes(len))
            .ok()
            .and_then(|n| n.checked_add(8))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| Error::InvalidData(format!("{}: truncated header", path.display())))?;
        let header = &bytes[8..data_start];
        let raw: HashMap<String, serde_json::Value> = serde_json::from_slice(header)?;
        let mut entries = HashMap::new();
        for (key, val) in raw {
            if key == "__metadata__" {
                continue;
            }
            entries.insert(key, serde_json::from_value(val)?);
        }
        Ok(Self { bytes, entries, data_start })
    }

    fn entry(&self, name: &str) -> Result<&TensorEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| Error::InvalidData(format!("missing '{name}' tensor")))
    }

    fn raw(&self, entry: &TensorEntry) -> Result<&[u8]> {
        let [s, e] = entry.data_offsets;
        self.data_start
            .checked_add(s)
            .zip(self.data_start.checked_add(e))
            .and_then(|(start, end)| self.bytes.get(start..end))
            .ok_or_else(|| Error::InvalidData("tensor offsets outside file".into()))
    }

    fn f32_tensor(&self, name: &str) -> Result<(Vec<f32>, Vec<usize>)> {
        let entry = self.entry(name)?;
        if entry.dtype != "F32" {
            return Err(Error::InvalidData(format!("'{name}' is {}, expected F32", entry.dtype)));
        }
        let data = self
            .raw(entry)?
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok((data, entry.shape.clone()))
    }

    fn string_list(&self, name: &str) -> Result<Option<Vec<String>>> {
        let Some(entry) = self.entries.get(name) else {
            return Ok(None);
        };
        let text = std::str::from_utf8(self.raw(entry)?)
            .map_err(|e| Error::InvalidData(format!("'{name}' is not UTF-8: {e}")))?;
        Ok(Some(text.split('\n').filter(|s| !s.is_empty()).map(String::from).collect()))
    }
}

// ── Generic safetensors builder ─────────────────────────────────────────────

/// Safetensors writer for F32, I32 and U8 tensors.
///
/// ```rust,no_run
/// use gal_eeg::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f32("signal", &[1.0f32, 2.0, 3.0], &[1, 3]);
/// w.add_i32("index", &[4, 5], &[2]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    /// Store an `f64` matrix as F32.
    pub fn add_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f32> = arr.iter().map(|&v| v as f32).collect();
        self.add_f32(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    /// Store an `f64` 3-D stack as F32.
    pub fn add_arr3(&mut self, name: &str, arr: &Array3<f64>) {
        let data: Vec<f32> = arr.iter().map(|&v| v as f32).collect();
        self.add_f32(name, &data, arr.shape());
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    /// Newline-joined UTF-8 strings as a U8 tensor.
    pub fn add_strings(&mut self, name: &str, strings: &[String]) {
        let bytes = strings.join("\n").into_bytes();
        let len = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![len]));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes
            .into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = std::fs::File::create(path)?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

// ── Cleaned artifact ────────────────────────────────────────────────────────

/// A cleaned EEG signal as persisted between the two halves of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedArtifact {
    /// `[C, T]`; stored as F32.
    pub eeg: Array2<f64>,
    pub sfreq: f64,
    /// Channel names; empty when the file carries none.
    pub ch_names: Vec<String>,
}

impl CleanedArtifact {
    /// From a `[T, C]` signal as produced by the cleaning stage.
    pub fn from_time_major(signal: &Array2<f64>, sfreq: f64, ch_names: Vec<String>) -> Self {
        Self { eeg: signal.t().to_owned(), sfreq, ch_names }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut w = StWriter::new();
        w.add_arr2("eeg", &self.eeg);
        w.add_f32("sfreq", &[self.sfreq as f32], &[1]);
        if !self.ch_names.is_empty() {
            w.add_strings("ch_names", &self.ch_names);
        }
        w.write(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let st = StFile::read(path)?;
        let (data, shape) = st.f32_tensor("eeg")?;
        let &[n_ch, n_t] = shape.as_slice() else {
            return Err(Error::InvalidData(format!("'eeg' must be 2-D, got shape {shape:?}")));
        };
        let eeg = Array2::from_shape_vec((n_ch, n_t), data)?.mapv(f64::from);

        let (sfreq, _) = st.f32_tensor("sfreq")?;
        let sfreq = sfreq
            .first()
            .map(|&v| f64::from(v))
            .ok_or_else(|| Error::InvalidData("empty 'sfreq' tensor".into()))?;
        if !(sfreq.is_finite() && sfreq > 0.0) {
            return Err(Error::InvalidData(format!("sfreq = {sfreq} must be > 0")));
        }

        let ch_names = st.string_list("ch_names")?.unwrap_or_default();
        if !ch_names.is_empty() && ch_names.len() != n_ch {
            return Err(Error::InvalidData(format!(
                "{} channel names for {n_ch} channels",
                ch_names.len()
            )));
        }
        Ok(Self { eeg, sfreq, ch_names })
    }
}

/// `<dir>/<session><suffix>`.
pub fn artifact_path(dir: &Path, session: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{session}{suffix}"))
}

/// Run number following the first `_S` in `name`, e.g. `P1_S3_eeg` → 3.
pub fn parse_run_id(name: &str) -> Option<u32> {
    name.match_indices("_S").find_map(|(i, _)| {
        let digits: String = name[i + 2..].chars().take_while(char::is_ascii_digit).collect();
        digits.parse().ok()
    })
}

/// Artifacts read by [`load_instances`].
#[derive(Debug, Default)]
pub struct LoadedInstances {
    /// In file-name order.
    pub instances: Vec<SignalInstance>,
    /// Files that matched but could not be read, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

/// Load every `*<suffix>` artifact in `dir` whose name carries a run id.
///
/// Files are visited in name order; names without a run id are skipped
/// with a warning, unreadable files are logged and listed in `failed`.
pub fn load_instances(dir: &Path, suffix: &str) -> Result<LoadedInstances> {
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(suffix))
        .collect();
    names.sort();

    let mut out = LoadedInstances::default();
    for name in names {
        let Some(run) = parse_run_id(&name) else {
            warn!("{name}: no run id (_S<digits>) in file name, skipped");
            continue;
        };
        let path = dir.join(&name);
        let artifact = match CleanedArtifact::load(&path) {
            Ok(a) => a,
            Err(e) => {
                warn!("{name}: {e}, skipped");
                out.failed.push((path, e.to_string()));
                continue;
            }
        };
        info!(
            "{name}: run {run}, {} ch × {} samples at {} Hz",
            artifact.eeg.nrows(),
            artifact.eeg.ncols(),
            artifact.sfreq
        );
        out.instances.push(SignalInstance { run, sfreq: artifact.sfreq, signal: artifact.eeg });
    }
    Ok(out)
}

// ── Other exports ───────────────────────────────────────────────────────────

/// Write kept-source activations (`sources` F32 [k, T]), their indices in
/// the full decomposition (`kept` I32 [k]) and `sfreq`.
pub fn write_neural_sources(path: &Path, sources: &Array2<f64>, kept: &[usize], sfreq: f64) -> Result<()> {
    let mut w = StWriter::new();
    w.add_arr2("sources", &sources.t().to_owned());
    let kept: Vec<i32> = kept.iter().map(|&k| k as i32).collect();
    w.add_i32("kept", &kept, &[kept.len()]);
    w.add_f32("sfreq", &[sfreq as f32], &[1]);
    w.write(path)
}

/// Write both splits of a dataset, normalised, plus the statistics:
///
///   `{train,test}_past`    F32 [N, C, past_len]
///   `{train,test}_future`  F32 [N, C, future_len]
///   `{train,test}_index`   I32 [N]   original pair indices
///   `means`, `stds`        F32 [C]
pub fn write_dataset(path: &Path, dataset: &WindowedDataset) -> Result<()> {
    let mut w = StWriter::new();
    for split in [Split::Train, Split::Test] {
        let n = dataset.len(split);
        if n > 0 {
            if let Some(batch) = dataset.batches(split, n)?.into_iter().next() {
                w.add_arr3(&format!("{split}_past"), &batch.past);
                w.add_arr3(&format!("{split}_future"), &batch.future);
            }
        }
        let idx: Vec<i32> = dataset.indices(split).iter().map(|&i| i as i32).collect();
        w.add_i32(&format!("{split}_index"), &idx, &[idx.len()]);
    }
    let stats = dataset.stats();
    let means: Vec<f32> = stats.means.iter().map(|&v| v as f32).collect();
    let stds: Vec<f32> = stats.stds.iter().map(|&v| v as f32).collect();
    w.add_f32("means", &means, &[means.len()]);
    w.add_f32("stds", &stds, &[stds.len()]);
    w.write(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_from_names() {
        assert_eq!(parse_run_id("P1_S3_eeg.safetensors"), Some(3));
        assert_eq!(parse_run_id("HS_P1_S12"), Some(12));
        assert_eq!(parse_run_id("P1_Sx_S4_eeg"), Some(4));
        assert_eq!(parse_run_id("P1_eeg"), None);
        assert_eq!(parse_run_id("P1_S"), None);
    }

    #[test]
    fn artifact_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_path(dir.path(), "P1_S2", ARTIFACT_SUFFIX);
        let signal = Array2::from_shape_fn((6, 2), |(t, c)| t as f64 * 0.5 - c as f64);
        let a = CleanedArtifact::from_time_major(&signal, 500.0, vec!["C3".into(), "C4".into()]);
        a.write(&path).unwrap();

        let b = CleanedArtifact::load(&path).unwrap();
        assert_eq!(b.eeg.dim(), (2, 6));
        assert_eq!(b.ch_names, vec!["C3", "C4"]);
        approx::assert_abs_diff_eq!(b.sfreq, 500.0);
        approx::assert_abs_diff_eq!(b.eeg[[1, 4]], 1.0);

        let loaded = load_instances(dir.path(), ARTIFACT_SUFFIX).unwrap();
        assert_eq!(loaded.instances.len(), 1);
        assert_eq!(loaded.instances[0].run, 2);
        approx::assert_abs_diff_eq!(loaded.instances[0].sfreq, 500.0);
        assert!(loaded.failed.is_empty());
    }

    fn write_raw(path: &Path, bytes: &[u8]) {
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn oversized_header_length_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.safetensors");
        write_raw(&path, &u64::MAX.to_le_bytes());
        assert!(matches!(CleanedArtifact::load(&path), Err(Error::InvalidData(_))));

        let mut bytes = (u64::MAX - 4).to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        write_raw(&path, &bytes);
        assert!(matches!(CleanedArtifact::load(&path), Err(Error::InvalidData(_))));
    }

    #[test]
    fn offsets_past_the_address_space_are_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.safetensors");
        let header = format!(
            r#"{{"eeg":{{"dtype":"F32","shape":[1,1],"data_offsets":[{m},{m}]}}}}"#,
            m = usize::MAX
        );
        let mut bytes = (header.len() as u64).to_le_bytes().to_vec();
        bytes.extend_from_slice(header.as_bytes());
        write_raw(&path, &bytes);
        assert!(matches!(CleanedArtifact::load(&path), Err(Error::InvalidData(_))));
    }

    #[test]
    fn non_positive_rate_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_path(dir.path(), "P1_S1", ARTIFACT_SUFFIX);
        let signal = Array2::zeros((4, 1));
        CleanedArtifact::from_time_major(&signal, 0.0, Vec::new()).write(&path).unwrap();
        assert!(matches!(CleanedArtifact::load(&path), Err(Error::InvalidData(_))));
    }

    #[test]
    fn unreadable_artifact_does_not_stop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let signal = Array2::from_shape_fn((10, 2), |(t, c)| (t + c) as f64);
        for session in ["P1_S1", "P1_S3"] {
            CleanedArtifact::from_time_major(&signal, 500.0, Vec::new())
                .write(&artifact_path(dir.path(), session, ARTIFACT_SUFFIX))
                .unwrap();
        }
        let broken = artifact_path(dir.path(), "P1_S2", ARTIFACT_SUFFIX);
        write_raw(&broken, &[16, 0, 0]);

        let loaded = load_instances(dir.path(), ARTIFACT_SUFFIX).unwrap();
        let runs: Vec<u32> = loaded.instances.iter().map(|i| i.run).collect();
        assert_eq!(runs, vec![1, 3]);
        assert_eq!(loaded.failed.len(), 1);
        assert_eq!(loaded.failed[0].0, broken);
    }

    #[test]
    fn missing_tensor_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.safetensors");
        let mut w = StWriter::new();
        w.add_f32("sfreq", &[500.0], &[1]);
        w.write(&path).unwrap();
        assert!(matches!(CleanedArtifact::load(&path), Err(Error::InvalidData(_))));
    }
}
