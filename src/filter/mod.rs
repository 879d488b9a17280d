//! Band-limiting filter.
//!
//! - [`design`]: Butterworth band-pass design as second-order sections,
//!   matching `scipy.signal.butter(..., btype='band', output='sos')`.
//! - [`apply`]: zero-phase forward-backward application along the time axis,
//!   matching `scipy.signal.sosfiltfilt(..., axis=0)`.

pub mod apply;
pub mod design;

pub use apply::{bandpass_filter, filter_1d, filtfilt_columns};
pub use design::{design_bandpass, min_signal_len, validate_band};
