//! Event-locked window extraction.
//!
//! For an event at sample `t` of a `[C, T]` signal:
//!   past   = signal[:, t - past_len .. t]
//!   future = signal[:, t .. t + future_len]
//! The event is valid iff `t >= past_len` and `t + future_len <= T`; invalid
//! events are logged and counted, never fatal.
//!
//! Event times arrive in seconds and are converted with
//! `round(seconds × sfreq)` at each instance's own rate.  Negative,
//! non-finite or unaddressable times are invalid.
use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};
use ndarray::{s, Array2};

use crate::error::{Error, Result};

/// One past/future segment pair, each `[C, len]`.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowPair {
    pub past: Array2<f64>,
    pub future: Array2<f64>,
}

impl WindowPair {
    pub fn n_channels(&self) -> usize {
        self.past.nrows()
    }
}

/// A cleaned `[C, T]` signal belonging to one run.
#[derive(Debug, Clone)]
pub struct SignalInstance {
    pub run: u32,
    /// Sampling rate of `signal`, Hz.
    pub sfreq: f64,
    pub signal: Array2<f64>,
}

/// Windows from a set of runs plus what was dropped on the way.
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Ascending run, then ascending event time.
    pub windows: Vec<WindowPair>,
    /// `(run, event sample)` of each window, aligned with `windows`.
    pub origins: Vec<(u32, usize)>,
    /// Events whose window would leave the signal.
    pub skipped_bounds: usize,
    /// Events with a negative, non-finite or unaddressable time.
    pub skipped_invalid: usize,
    /// Marker runs with no signal instance.
    pub unmatched_runs: Vec<u32>,
    /// Signal instances with no marker events.
    pub unmatched_instances: Vec<u32>,
}

/// `round(seconds × sfreq)`, or `None` for negative / non-finite input and
/// for samples beyond `usize`.
pub fn seconds_to_sample(seconds: f64, sfreq: f64) -> Option<usize> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    let t = (seconds * sfreq).round();
    (t.is_finite() && t < usize::MAX as f64).then_some(t as usize)
}

/// `t - past_len >= 0` and `t + future_len <= n_t`, without overflow.
fn window_fits(t: usize, past_len: usize, future_len: usize, n_t: usize) -> bool {
    t >= past_len && t.checked_add(future_len).is_some_and(|end| end <= n_t)
}

fn validate_lengths(past_len: usize, future_len: usize) -> Result<()> {
    if past_len == 0 || future_len == 0 {
        return Err(Error::InvalidParameter(format!(
            "window lengths must be >= 1 (past {past_len}, future {future_len})"
        )));
    }
    Ok(())
}

/// Slice a window pair for every in-bounds event sample, in ascending time.
pub fn extract(
    signal: &Array2<f64>,
    events: &[usize],
    past_len: usize,
    future_len: usize,
) -> Result<Vec<WindowPair>> {
    validate_lengths(past_len, future_len)?;
    let n_t = signal.ncols();
    let mut sorted = events.to_vec();
    sorted.sort_unstable();

    let mut out = Vec::with_capacity(sorted.len());
    for t in sorted {
        if !window_fits(t, past_len, future_len, n_t) {
            warn!("event at sample {t} skipped: -{past_len}/+{future_len} window outside 0..{n_t}");
            continue;
        }
        out.push(WindowPair {
            past: signal.slice(s![.., t - past_len..t]).to_owned(),
            future: signal.slice(s![.., t..t + future_len]).to_owned(),
        });
    }
    Ok(out)
}

/// Pair each run's signal with its marker onsets (seconds) and extract.
///
/// Onsets are converted at each instance's own `sfreq`.
pub fn extract_runs(
    instances: &[SignalInstance],
    onsets_by_run: &BTreeMap<u32, Vec<f64>>,
    past_len: usize,
    future_len: usize,
) -> Result<ExtractionReport> {
    validate_lengths(past_len, future_len)?;
    if let Some(bad) = instances.iter().find(|i| !(i.sfreq > 0.0)) {
        return Err(Error::InvalidParameter(format!(
            "run {}: sfreq = {} must be > 0",
            bad.run, bad.sfreq
        )));
    }

    let mut order: Vec<&SignalInstance> = instances.iter().collect();
    order.sort_by_key(|i| i.run);

    let mut report = ExtractionReport::default();
    let instance_runs: BTreeSet<u32> = instances.iter().map(|i| i.run).collect();
    for &run in onsets_by_run.keys() {
        if !instance_runs.contains(&run) {
            warn!("run {run}: marker events but no signal");
            report.unmatched_runs.push(run);
        }
    }

    for inst in order {
        let Some(onsets) = onsets_by_run.get(&inst.run) else {
            warn!("run {}: signal but no marker events", inst.run);
            report.unmatched_instances.push(inst.run);
            continue;
        };
        let mut samples = Vec::with_capacity(onsets.len());
        for &sec in onsets {
            match seconds_to_sample(sec, inst.sfreq) {
                Some(t) => samples.push(t),
                None => {
                    warn!("run {}: invalid event time {sec}", inst.run);
                    report.skipped_invalid += 1;
                }
            }
        }
        samples.sort_unstable();

        let n_t = inst.signal.ncols();
        let valid: Vec<usize> = samples
            .iter()
            .copied()
            .filter(|&t| window_fits(t, past_len, future_len, n_t))
            .collect();
        let windows = extract(&inst.signal, &valid, past_len, future_len)?;
        report.skipped_bounds += samples.len() - valid.len();
        info!(
            "run {} ({} Hz): {} windows from {} events",
            inst.run,
            inst.sfreq,
            windows.len(),
            samples.len()
        );
        report.origins.extend(valid.iter().map(|&t| (inst.run, t)));
        report.windows.extend(windows);
    }

    if report.skipped_bounds + report.skipped_invalid > 0 {
        warn!(
            "skipped {} out-of-bounds and {} invalid events",
            report.skipped_bounds, report.skipped_invalid
        );
    }
    Ok(report)
}
