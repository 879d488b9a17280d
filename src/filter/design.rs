//! Butterworth band-pass design matching `scipy.signal.butter(order, [lo, hi], btype='band')`.
//!
//! Cutoffs are normalised by Nyquist (`0.5 · sfreq`) before design, and the
//! result is returned as second-order sections so that high orders stay
//! numerically stable when applied forward-backward.
use sci_rs::signal::filter::design::{
    butter_dyn, DigitalFilter, FilterBandType, FilterOutputType, Sos, SosFormatFilter,
};

use crate::error::{Error, Result};

/// Check band edges against Nyquist.
///
/// Rejects `low_hz <= 0`, `high_hz >= sfreq / 2`, `low_hz >= high_hz` and a
/// zero order.
pub fn validate_band(low_hz: f64, high_hz: f64, sfreq: f64, order: usize) -> Result<()> {
    let nyq = 0.5 * sfreq;
    if !(sfreq.is_finite() && sfreq > 0.0) {
        return Err(Error::InvalidParameter(format!("sampling rate {sfreq} Hz")));
    }
    if !(low_hz > 0.0) {
        return Err(Error::InvalidParameter(format!("low cutoff {low_hz} Hz must be > 0")));
    }
    if !(high_hz < nyq) {
        return Err(Error::InvalidParameter(format!(
            "high cutoff {high_hz} Hz must be below Nyquist ({nyq} Hz)"
        )));
    }
    if low_hz >= high_hz {
        return Err(Error::InvalidParameter(format!(
            "low cutoff {low_hz} Hz must be below high cutoff {high_hz} Hz"
        )));
    }
    if order == 0 {
        return Err(Error::InvalidParameter("filter order must be >= 1".into()));
    }
    Ok(())
}

/// Design a band-pass Butterworth filter of prototype order `order`.
///
/// Returns `order` second-order sections (`2 · order` poles).
pub fn design_bandpass(low_hz: f64, high_hz: f64, sfreq: f64, order: usize) -> Result<Vec<Sos<f64>>> {
    validate_band(low_hz, high_hz, sfreq, order)?;
    let nyq = 0.5 * sfreq;
    let wn = vec![low_hz / nyq, high_hz / nyq];

    let filter = butter_dyn(
        order,
        wn,
        Some(FilterBandType::Bandpass),
        Some(false),
        Some(FilterOutputType::Sos),
        None,
    );
    match filter {
        DigitalFilter::Sos(SosFormatFilter { sos }) => Ok(sos),
        _ => Err(Error::InvalidParameter(
            "Butterworth design did not produce second-order sections".into(),
        )),
    }
}

/// Minimum signal length accepted by forward-backward filtering with `n_sections`.
///
/// Mirrors scipy's `sosfiltfilt` default `padlen = 3 · (2 · n_sections + 1)`;
/// the signal must be strictly longer than the odd-reflection padding.
pub fn min_signal_len(n_sections: usize) -> usize {
    3 * (2 * n_sections + 1) + 1
}
